//! Level and temporal filtering, plus the selection state that drives it.
//!
//! The selection is a plain value updated by [`apply_selection`]; the
//! cross-clearing between year and custom period happens there and nowhere
//! else. [`apply_filters`] turns a selection's window into the record subset
//! every view is computed from.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::debug;

use crate::levels::{same_label, LevelVocabulary};
use crate::models::Record;
use crate::months::{enumerate_buckets, MonthBucket};
use crate::overlap::is_active;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TemporalWindow {
    Full,
    Year { year: i32 },
    Period { start: MonthBucket, end: MonthBucket },
}

impl TemporalWindow {
    /// First and last month of an explicit window, ordered. `None` for the
    /// full window and for a year the calendar cannot represent.
    pub fn month_range(&self) -> Option<(MonthBucket, MonthBucket)> {
        match *self {
            TemporalWindow::Full => None,
            TemporalWindow::Year { year } => {
                MonthBucket::january(year).zip(MonthBucket::december(year))
            }
            TemporalWindow::Period { start, end } if start <= end => Some((start, end)),
            TemporalWindow::Period { start, end } => Some((end, start)),
        }
    }

    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.month_range()
            .map(|(first, last)| (first.first_day(), last.last_day()))
    }

    /// Months to aggregate over. The full window spans whatever `records`
    /// cover, so callers pass the already filtered subset.
    pub fn months(&self, records: &[&Record], now: NaiveDate) -> Vec<MonthBucket> {
        let range = match self {
            TemporalWindow::Full => month_extent(records.iter().copied(), now),
            _ => self.month_range(),
        };
        range
            .map(|(first, last)| enumerate_buckets(first, last))
            .unwrap_or_default()
    }

    pub fn describe(&self) -> String {
        match self {
            TemporalWindow::Full => "all months".to_string(),
            TemporalWindow::Year { year } => format!("year {year}"),
            TemporalWindow::Period { .. } => match self.month_range() {
                Some((first, last)) => format!("{first} to {last}"),
                None => "an empty period".to_string(),
            },
        }
    }
}

/// Earliest start month to the latest month any record reaches.
pub fn month_extent<'a, I>(records: I, now: NaiveDate) -> Option<(MonthBucket, MonthBucket)>
where
    I: IntoIterator<Item = &'a Record>,
{
    records.into_iter().fold(None, |extent, record| {
        let first = MonthBucket::containing(record.start);
        let last = MonthBucket::containing(record.start.max(record.effective_end(now)));
        Some(match extent {
            None => (first, last),
            Some((low, high)) => (low.min(first), high.max(last)),
        })
    })
}

/// Options a dataset offers for selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatasetFacets {
    pub levels: Vec<String>,
    pub years: Vec<i32>,
    pub extent: Option<(MonthBucket, MonthBucket)>,
}

impl DatasetFacets {
    pub fn from_records(records: &[Record], vocabulary: &LevelVocabulary, now: NaiveDate) -> Self {
        let levels = vocabulary.sort_labels(records.iter().map(|record| vocabulary.classify(record)));

        let mut years = BTreeSet::new();
        for record in records {
            let end = record.start.max(record.effective_end(now));
            years.extend(record.start.year()..=end.year());
        }

        Self {
            levels,
            years: years.into_iter().collect(),
            extent: month_extent(records, now),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSelection {
    pub level: Option<String>,
    pub year: Option<i32>,
    pub period_start: Option<MonthBucket>,
    pub period_end: Option<MonthBucket>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEvent {
    SelectLevel(Option<String>),
    SelectYear(Option<i32>),
    SelectPeriodStart(Option<MonthBucket>),
    SelectPeriodEnd(Option<MonthBucket>),
    DatasetLoaded(DatasetFacets),
    Reset,
}

impl FilterSelection {
    /// The authoritative window. A year beats the displayed period; a period
    /// with one end missing is completed from the data extent.
    pub fn window(&self, extent: Option<(MonthBucket, MonthBucket)>) -> TemporalWindow {
        if let Some(year) = self.year {
            return TemporalWindow::Year { year };
        }
        let start = self.period_start.or(extent.map(|(first, _)| first));
        let end = self.period_end.or(extent.map(|(_, last)| last));
        match (self.period_start.or(self.period_end), start, end) {
            (None, _, _) => TemporalWindow::Full,
            (Some(_), Some(start), Some(end)) => TemporalWindow::Period { start, end },
            (Some(only), _, _) => TemporalWindow::Period {
                start: only,
                end: only,
            },
        }
    }
}

pub fn apply_selection(current: &FilterSelection, event: SelectionEvent) -> FilterSelection {
    let mut next = current.clone();
    match event {
        SelectionEvent::SelectLevel(level) => {
            next.level = level.filter(|label| !label.trim().is_empty());
        }
        SelectionEvent::SelectYear(Some(year)) => {
            next.year = Some(year);
            next.period_start = MonthBucket::january(year);
            next.period_end = MonthBucket::december(year);
        }
        SelectionEvent::SelectYear(None) => {
            if next.year.take().is_some() {
                next.period_start = None;
                next.period_end = None;
            }
        }
        SelectionEvent::SelectPeriodStart(month) => {
            next.year = None;
            next.period_start = month;
        }
        SelectionEvent::SelectPeriodEnd(month) => {
            next.year = None;
            next.period_end = month;
        }
        SelectionEvent::DatasetLoaded(facets) => reconcile(&mut next, &facets),
        SelectionEvent::Reset => next = FilterSelection::default(),
    }
    next
}

fn reconcile(selection: &mut FilterSelection, facets: &DatasetFacets) {
    let level_missing = selection
        .level
        .as_deref()
        .is_some_and(|level| !facets.levels.iter().any(|label| same_label(label, level)));
    if level_missing {
        let level = selection.level.take();
        debug!(?level, "selected level not present in dataset, clearing");
    }

    if let Some(year) = selection.year {
        if !facets.years.contains(&year) {
            debug!(year, "selected year not present in dataset, clearing");
            selection.year = None;
            selection.period_start = None;
            selection.period_end = None;
        }
        return;
    }

    match facets.extent {
        None => {
            selection.period_start = None;
            selection.period_end = None;
        }
        Some((first, last)) => {
            selection.period_start = selection.period_start.map(|month| month.clamp_to(first, last));
            selection.period_end = selection.period_end.map(|month| month.clamp_to(first, last));
        }
    }
}

/// Level stage followed by the temporal stage. Record order is preserved.
pub fn apply_filters<'a>(
    records: &'a [Record],
    level: Option<&str>,
    window: &TemporalWindow,
    vocabulary: &LevelVocabulary,
    now: NaiveDate,
) -> Vec<&'a Record> {
    let bounds = window.date_bounds();
    let filtered: Vec<&Record> = records
        .iter()
        .filter(|record| match level {
            Some(level) => same_label(&vocabulary.classify(record), level),
            None => true,
        })
        .filter(|record| match (window, bounds) {
            (TemporalWindow::Full, _) => true,
            (_, Some((start, end))) => is_active(record, start, end, now),
            (_, None) => false,
        })
        .collect();

    debug!(
        total = records.len(),
        kept = filtered.len(),
        window = %window.describe(),
        "filtered records"
    );
    filtered
}
