use chrono::NaiveDate;

use crate::models::Record;
use crate::months::MonthBucket;

/// Inclusive overlap of `[start, effective end]` with `[window_start, window_end]`.
/// Every count, filter and lookup goes through this one predicate.
pub fn is_active(
    record: &Record,
    window_start: NaiveDate,
    window_end: NaiveDate,
    now: NaiveDate,
) -> bool {
    record.start <= window_end && record.effective_end(now) >= window_start
}

pub fn is_active_in(record: &Record, month: MonthBucket, now: NaiveDate) -> bool {
    let (start, end) = month.bounds();
    is_active(record, start, end, now)
}
