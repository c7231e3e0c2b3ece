use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Serialize, Serializer};
use thiserror::Error;

/// A calendar month, stored as its first day so ordering and arithmetic
/// come straight from `NaiveDate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthBucket(NaiveDate);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonthKeyError {
    #[error("month key {0:?} must look like YYYY-MM")]
    Malformed(String),
    #[error("month key {0:?} names a month outside the calendar")]
    OutOfRange(String),
}

impl MonthBucket {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Self)
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    /// Last day of the month, found by stepping to the next month and back
    /// one day so December rolls into the following year.
    pub fn last_day(&self) -> NaiveDate {
        self.0
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .unwrap_or(NaiveDate::MAX)
    }

    /// Inclusive `[first day, last day]` of the month.
    pub fn bounds(&self) -> (NaiveDate, NaiveDate) {
        (self.first_day(), self.last_day())
    }

    pub fn next(&self) -> Option<Self> {
        self.0.checked_add_months(Months::new(1)).map(Self)
    }

    pub fn january(year: i32) -> Option<Self> {
        Self::new(year, 1)
    }

    pub fn december(year: i32) -> Option<Self> {
        Self::new(year, 12)
    }

    pub fn clamp_to(self, first: MonthBucket, last: MonthBucket) -> Self {
        self.max(first).min(last)
    }
}

impl fmt::Display for MonthBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl FromStr for MonthBucket {
    type Err = MonthKeyError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key = raw.trim();
        let (year, month) = key
            .split_once('-')
            .ok_or_else(|| MonthKeyError::Malformed(key.to_string()))?;
        if year.len() != 4 || month.len() != 2 {
            return Err(MonthKeyError::Malformed(key.to_string()));
        }
        let year: i32 = year
            .parse()
            .map_err(|_| MonthKeyError::Malformed(key.to_string()))?;
        let month: u32 = month
            .parse()
            .map_err(|_| MonthKeyError::Malformed(key.to_string()))?;
        MonthBucket::new(year, month).ok_or_else(|| MonthKeyError::OutOfRange(key.to_string()))
    }
}

impl Serialize for MonthBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Canonical `YYYY-MM` key of the month containing `date`.
pub fn month_key(date: NaiveDate) -> String {
    MonthBucket::containing(date).to_string()
}

pub fn month_bounds(key: &str) -> Result<(NaiveDate, NaiveDate), MonthKeyError> {
    key.parse::<MonthBucket>().map(|bucket| bucket.bounds())
}

/// Absolute number of month steps between the months containing `a` and `b`.
pub fn months_between(a: NaiveDate, b: NaiveDate) -> u32 {
    let a = i64::from(a.year()) * 12 + i64::from(a.month0());
    let b = i64::from(b.year()) * 12 + i64::from(b.month0());
    u32::try_from((a - b).abs()).unwrap_or(u32::MAX)
}

/// Every month from the one containing `a` to the one containing `b`,
/// inclusive. Arguments may come in either order.
pub fn enumerate_months(a: NaiveDate, b: NaiveDate) -> Vec<MonthBucket> {
    enumerate_buckets(MonthBucket::containing(a), MonthBucket::containing(b))
}

pub fn enumerate_buckets(first: MonthBucket, last: MonthBucket) -> Vec<MonthBucket> {
    let (first, last) = if first <= last {
        (first, last)
    } else {
        (last, first)
    };

    let mut months = Vec::new();
    let mut cursor = Some(first);
    while let Some(month) = cursor {
        if month > last {
            break;
        }
        months.push(month);
        cursor = month.next();
    }
    months
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn keys_are_zero_padded() {
        assert_eq!(month_key(ymd(2024, 3, 15)), "2024-03");
        assert_eq!(month_key(ymd(987, 11, 1)), "0987-11");
        assert_eq!(MonthBucket::new(2024, 12).unwrap().to_string(), "2024-12");
    }

    #[test]
    fn bounds_cover_the_whole_month() {
        assert_eq!(
            month_bounds("2024-02").unwrap(),
            (ymd(2024, 2, 1), ymd(2024, 2, 29))
        );
        assert_eq!(
            month_bounds("2023-02").unwrap(),
            (ymd(2023, 2, 1), ymd(2023, 2, 28))
        );
        assert_eq!(
            month_bounds("2024-12").unwrap(),
            (ymd(2024, 12, 1), ymd(2024, 12, 31))
        );
    }

    #[test]
    fn december_rolls_into_next_year() {
        let december = MonthBucket::new(2024, 12).unwrap();
        assert_eq!(december.next(), MonthBucket::new(2025, 1));
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert!(matches!(
            "2024-3".parse::<MonthBucket>(),
            Err(MonthKeyError::Malformed(_))
        ));
        assert!(matches!(
            "March".parse::<MonthBucket>(),
            Err(MonthKeyError::Malformed(_))
        ));
        assert!(matches!(
            "2024-13".parse::<MonthBucket>(),
            Err(MonthKeyError::OutOfRange(_))
        ));
    }

    #[test]
    fn enumeration_spans_year_boundaries() {
        let months = enumerate_months(ymd(2023, 11, 20), ymd(2024, 2, 3));
        let keys: Vec<String> = months.iter().map(ToString::to_string).collect();
        assert_eq!(keys, ["2023-11", "2023-12", "2024-01", "2024-02"]);
    }

    #[test]
    fn enumeration_swaps_reversed_arguments() {
        assert_eq!(
            enumerate_months(ymd(2024, 4, 1), ymd(2024, 1, 31)),
            enumerate_months(ymd(2024, 1, 31), ymd(2024, 4, 1))
        );
    }

    #[test]
    fn same_month_yields_one_bucket() {
        let months = enumerate_months(ymd(2024, 3, 1), ymd(2024, 3, 31));
        assert_eq!(months, vec![MonthBucket::new(2024, 3).unwrap()]);
    }

    #[test]
    fn clamping_pins_to_the_nearest_end() {
        let first = MonthBucket::new(2024, 2).unwrap();
        let last = MonthBucket::new(2024, 6).unwrap();
        assert_eq!(MonthBucket::new(2023, 9).unwrap().clamp_to(first, last), first);
        assert_eq!(MonthBucket::new(2025, 1).unwrap().clamp_to(first, last), last);
        let inside = MonthBucket::new(2024, 4).unwrap();
        assert_eq!(inside.clamp_to(first, last), inside);
    }

    fn any_date() -> impl Strategy<Value = NaiveDate> {
        (1900i32..2200, 1u32..=12, 1u32..=28)
            .prop_map(|(year, month, day)| NaiveDate::from_ymd_opt(year, month, day).unwrap())
    }

    proptest! {
        #[test]
        fn enumeration_is_complete_and_gap_free(a in any_date(), b in any_date()) {
            let months = enumerate_months(a, b);
            prop_assert_eq!(months.len() as u32, months_between(a, b) + 1);
            for pair in months.windows(2) {
                prop_assert_eq!(pair[0].next(), Some(pair[1]));
            }
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert_eq!(months.first().copied(), Some(MonthBucket::containing(low)));
            prop_assert_eq!(months.last().copied(), Some(MonthBucket::containing(high)));
        }

        #[test]
        fn every_date_lies_within_its_bucket(date in any_date()) {
            let (start, end) = MonthBucket::containing(date).bounds();
            prop_assert!(start <= date && date <= end);
            prop_assert_eq!(end.succ_opt().map(MonthBucket::containing), MonthBucket::containing(date).next());
        }
    }
}
