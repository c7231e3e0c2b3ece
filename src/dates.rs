//! Normalization of heterogeneous spreadsheet cells into calendar dates.
//!
//! Text and numeric cells are tried against an ordered list of strategies.
//! The first strategy that succeeds wins; when none do, every strategy's
//! failure is kept on the error so callers can report why a value was refused.

use std::fmt;

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

/// A raw cell as produced by the import adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    /// Classifies a textual field the way a spreadsheet would: blank, numeric
    /// or free text.
    pub fn from_field(field: &str) -> Self {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return CellValue::Empty;
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => CellValue::Number(value),
            _ => CellValue::Text(trimmed.to_string()),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(text) => f.write_str(text),
            CellValue::Number(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    IsoDate,
    SpreadsheetSerial,
    CompactDate,
    Rfc3339,
    DateTime(&'static str),
    Pattern(&'static str),
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::IsoDate => f.write_str("iso-date"),
            Strategy::SpreadsheetSerial => f.write_str("spreadsheet-serial"),
            Strategy::CompactDate => f.write_str("yyyymmdd"),
            Strategy::Rfc3339 => f.write_str("rfc3339"),
            Strategy::DateTime(pattern) | Strategy::Pattern(pattern) => f.write_str(pattern),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    pub strategy: Strategy,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no date value supplied")]
    Missing,
    #[error("{raw:?} is not a recognised date ({})", describe_failures(.failures))]
    InvalidDate {
        raw: String,
        failures: Vec<StrategyFailure>,
    },
}

fn describe_failures(failures: &[StrategyFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{}: {}", failure.strategy, failure.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Day zero of the 1900 spreadsheet date system.
pub fn serial_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN)
}

/// Years a normalized date may fall in, so every month keys as `YYYY-MM`.
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// Strategies for numeric cells. Eight-digit values that are not a plausible
/// serial are read as `YYYYMMDD`.
const NUMERIC_STRATEGIES: &[Strategy] = &[Strategy::SpreadsheetSerial, Strategy::CompactDate];

/// Strategies for free text, tried in order. Slash and dash forms are read
/// day-first; month-first slashes are only tried once day-first fails.
const TEXT_STRATEGIES: &[Strategy] = &[
    Strategy::IsoDate,
    Strategy::SpreadsheetSerial,
    Strategy::CompactDate,
    Strategy::Rfc3339,
    Strategy::DateTime("%Y-%m-%d %H:%M:%S"),
    Strategy::DateTime("%Y-%m-%dT%H:%M:%S"),
    Strategy::Pattern("%Y/%m/%d"),
    Strategy::Pattern("%d/%m/%Y"),
    Strategy::Pattern("%m/%d/%Y"),
    Strategy::Pattern("%d-%m-%Y"),
    Strategy::Pattern("%d.%m.%Y"),
    Strategy::Pattern("%d %B %Y"),
    Strategy::Pattern("%d %b %Y"),
    Strategy::Pattern("%B %d, %Y"),
    Strategy::Pattern("%b %d, %Y"),
];

pub fn parse(cell: &CellValue) -> Result<NaiveDate, ParseError> {
    match cell {
        CellValue::Empty => Err(ParseError::Missing),
        CellValue::Number(_) => parse_with(&cell.to_string(), NUMERIC_STRATEGIES),
        CellValue::Text(text) => parse_text(text),
    }
}

/// Like [`parse`], but a blank cell is an absent date rather than an error.
pub fn parse_optional(cell: &CellValue) -> Result<Option<NaiveDate>, ParseError> {
    if cell.is_blank() {
        return Ok(None);
    }
    parse(cell).map(Some)
}

pub fn parse_text(raw: &str) -> Result<NaiveDate, ParseError> {
    parse_with(raw, TEXT_STRATEGIES)
}

fn parse_with(raw: &str, strategies: &[Strategy]) -> Result<NaiveDate, ParseError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ParseError::Missing);
    }

    let mut failures = Vec::new();
    for strategy in strategies {
        match apply(*strategy, text).and_then(within_year_range) {
            Ok(date) => return Ok(date),
            Err(reason) => failures.push(StrategyFailure {
                strategy: *strategy,
                reason,
            }),
        }
    }

    Err(ParseError::InvalidDate {
        raw: text.to_string(),
        failures,
    })
}

fn apply(strategy: Strategy, text: &str) -> Result<NaiveDate, String> {
    match strategy {
        Strategy::IsoDate => {
            NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|err| err.to_string())
        }
        Strategy::SpreadsheetSerial => {
            let value = text.parse::<f64>().map_err(|err| err.to_string())?;
            from_serial(value)
        }
        Strategy::CompactDate => {
            if text.len() != 8 || !text.bytes().all(|byte| byte.is_ascii_digit()) {
                return Err("expected exactly eight digits".to_string());
            }
            NaiveDate::parse_from_str(text, "%Y%m%d").map_err(|err| err.to_string())
        }
        Strategy::Rfc3339 => DateTime::parse_from_rfc3339(text)
            .map(|parsed| parsed.with_timezone(&Utc).date_naive())
            .map_err(|err| err.to_string()),
        Strategy::DateTime(pattern) => NaiveDateTime::parse_from_str(text, pattern)
            .map(|parsed| parsed.date())
            .map_err(|err| err.to_string()),
        Strategy::Pattern(pattern) => {
            NaiveDate::parse_from_str(text, pattern).map_err(|err| err.to_string())
        }
    }
}

/// Converts a spreadsheet serial day count. Any time-of-day fraction is
/// dropped before the whole days are added to the epoch.
pub fn from_serial(value: f64) -> Result<NaiveDate, String> {
    if !value.is_finite() {
        return Err(format!("serial {value} is not finite"));
    }
    let whole = value.floor();
    if whole.abs() > i64::MAX as f64 {
        return Err(format!("serial {value} is out of range"));
    }
    let days = whole as i64;
    let epoch = serial_epoch();
    let date = if days >= 0 {
        epoch.checked_add_days(Days::new(days.unsigned_abs()))
    } else {
        epoch.checked_sub_days(Days::new(days.unsigned_abs()))
    };
    date.ok_or_else(|| format!("serial {value} is outside the supported calendar"))
        .and_then(within_year_range)
}

fn within_year_range(date: NaiveDate) -> Result<NaiveDate, String> {
    if (MIN_YEAR..=MAX_YEAR).contains(&date.year()) {
        Ok(date)
    } else {
        Err(format!(
            "{date} falls outside years {MIN_YEAR}..={MAX_YEAR}"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn iso_text_is_taken_as_is() {
        assert_eq!(parse_text("2024-03-15").unwrap(), ymd(2024, 3, 15));
        assert_eq!(
            parse(&CellValue::Text(" 2024-12-31 ".to_string())).unwrap(),
            ymd(2024, 12, 31)
        );
    }

    #[test]
    fn serial_numbers_use_the_1899_epoch() {
        assert_eq!(from_serial(0.0).unwrap(), ymd(1899, 12, 30));
        assert_eq!(from_serial(45292.0).unwrap(), ymd(2024, 1, 1));
        assert_eq!(parse(&CellValue::Number(45366.0)).unwrap(), ymd(2024, 3, 15));
    }

    #[test]
    fn serial_time_fraction_does_not_shift_the_day() {
        assert_eq!(from_serial(45292.999).unwrap(), ymd(2024, 1, 1));
        assert_eq!(from_serial(45292.5).unwrap(), ymd(2024, 1, 1));
    }

    #[test]
    fn serial_rejects_non_finite_values() {
        assert!(from_serial(f64::NAN).is_err());
        assert!(from_serial(f64::INFINITY).is_err());
        assert!(from_serial(1e300).is_err());
    }

    #[test]
    fn serial_far_outside_four_digit_years_is_refused() {
        assert!(from_serial(20240315.0).is_err());
        assert!(from_serial(-700000.0).is_err());
        assert!(from_serial(2958465.0).is_ok());
        assert!(from_serial(2958466.0).is_err());
    }

    #[test]
    fn compact_numeric_cells_read_as_yyyymmdd() {
        let date = parse(&CellValue::from_field("20240315")).unwrap();
        assert_eq!(date, ymd(2024, 3, 15));
        assert_eq!(crate::months::month_key(date), "2024-03");
        assert_eq!(parse_text("20240315").unwrap(), ymd(2024, 3, 15));

        match parse(&CellValue::Number(99999999.0)).unwrap_err() {
            ParseError::InvalidDate { failures, .. } => {
                let strategies: Vec<Strategy> = failures.iter().map(|f| f.strategy).collect();
                assert_eq!(strategies, [Strategy::SpreadsheetSerial, Strategy::CompactDate]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn month_first_slashes_are_a_fallback() {
        assert_eq!(parse_text("03/15/2024").unwrap(), ymd(2024, 3, 15));
        assert_eq!(parse_text("03/04/2024").unwrap(), ymd(2024, 4, 3));
    }

    #[test]
    fn fallback_strategies_cover_common_spellings() {
        assert_eq!(parse_text("15/03/2024").unwrap(), ymd(2024, 3, 15));
        assert_eq!(parse_text("15-03-2024").unwrap(), ymd(2024, 3, 15));
        assert_eq!(parse_text("2024/03/15").unwrap(), ymd(2024, 3, 15));
        assert_eq!(parse_text("15 March 2024").unwrap(), ymd(2024, 3, 15));
        assert_eq!(parse_text("Mar 15, 2024").unwrap(), ymd(2024, 3, 15));
        assert_eq!(parse_text("2024-03-15 08:30:00").unwrap(), ymd(2024, 3, 15));
        assert_eq!(parse_text("45292").unwrap(), ymd(2024, 1, 1));
    }

    #[test]
    fn rfc3339_is_read_in_utc() {
        assert_eq!(
            parse_text("2024-03-01T02:00:00+07:00").unwrap(),
            ymd(2024, 2, 29)
        );
        assert_eq!(parse_text("2024-03-15T10:00:00Z").unwrap(), ymd(2024, 3, 15));
    }

    #[test]
    fn invalid_text_reports_every_strategy() {
        let err = parse_text("next tuesday").unwrap_err();
        match &err {
            ParseError::InvalidDate { raw, failures } => {
                assert_eq!(raw, "next tuesday");
                assert_eq!(failures.len(), TEXT_STRATEGIES.len());
                assert_eq!(failures[0].strategy, Strategy::IsoDate);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("iso-date"));
    }

    #[test]
    fn blank_cells_are_missing_or_absent() {
        assert_eq!(parse(&CellValue::Empty), Err(ParseError::Missing));
        assert_eq!(parse_text("   "), Err(ParseError::Missing));
        assert_eq!(parse_optional(&CellValue::Empty), Ok(None));
        assert_eq!(parse_optional(&CellValue::Text("  ".to_string())), Ok(None));
        assert_eq!(
            parse_optional(&CellValue::Text("2024-01-10".to_string())),
            Ok(Some(ymd(2024, 1, 10)))
        );
    }

    #[test]
    fn fields_are_classified_like_spreadsheet_cells() {
        assert_eq!(CellValue::from_field(""), CellValue::Empty);
        assert_eq!(CellValue::from_field("45292"), CellValue::Number(45292.0));
        assert_eq!(
            CellValue::from_field("2024-01-01"),
            CellValue::Text("2024-01-01".to_string())
        );
    }
}
