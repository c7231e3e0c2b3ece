use chrono::NaiveDate;
use serde::Serialize;

use crate::months::MonthBucket;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub name: Option<String>,
    pub institution: Option<String>,
    pub level: Option<String>,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl Record {
    pub fn new(start: NaiveDate, end: Option<NaiveDate>) -> Self {
        Self {
            name: None,
            institution: None,
            level: None,
            start,
            end,
        }
    }

    /// Explicit end date, or `now` for an ongoing record.
    pub fn effective_end(&self, now: NaiveDate) -> NaiveDate {
        self.end.unwrap_or(now)
    }

    pub fn is_ongoing(&self) -> bool {
        self.end.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonthlyCount {
    pub month: MonthBucket,
    pub active_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionRow {
    pub name: String,
    pub count: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleRow {
    pub name: String,
    pub institution: String,
    pub start_display: String,
    pub end_display: String,
}
