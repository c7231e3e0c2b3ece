use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::filter::{apply_filters, month_extent, FilterSelection, TemporalWindow};
use crate::levels::LevelVocabulary;
use crate::models::{DistributionRow, MonthlyCount, Record};
use crate::months::MonthBucket;
use crate::overlap::is_active_in;

pub const UNKNOWN_INSTITUTION: &str = "Unknown";
pub const DEFAULT_SAMPLE_LIMIT: usize = 10;

/// One entry per month of `window`, zero counts included.
pub fn monthly_series(
    records: &[&Record],
    window: &TemporalWindow,
    now: NaiveDate,
) -> Vec<MonthlyCount> {
    window
        .months(records, now)
        .into_iter()
        .map(|month| MonthlyCount {
            month,
            active_count: records
                .iter()
                .filter(|record| is_active_in(record, month, now))
                .count(),
        })
        .collect()
}

pub fn institution_distribution(records: &[&Record]) -> Vec<DistributionRow> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        let name = record
            .institution
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_INSTITUTION);
        *counts.entry(name.to_string()).or_insert(0) += 1;
    }

    let total = records.len();
    let mut rows: Vec<DistributionRow> = counts
        .into_iter()
        .map(|(name, count)| DistributionRow {
            name,
            count,
            percentage: if total == 0 {
                0.0
            } else {
                count as f64 / total as f64 * 100.0
            },
        })
        .collect();

    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    rows
}

/// Records active in `month`, in their original order, at most `limit`.
pub fn sample_rows_for_month<'a>(
    records: &[&'a Record],
    month: MonthBucket,
    now: NaiveDate,
    limit: usize,
) -> Vec<&'a Record> {
    records
        .iter()
        .copied()
        .filter(|record| is_active_in(record, month, now))
        .take(limit)
        .collect()
}

/// The filtered subset behind every view, together with the window and the
/// single `now` it was evaluated at.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    pub selection: FilterSelection,
    pub window: TemporalWindow,
    pub now: NaiveDate,
    pub records: Vec<&'a Record>,
}

impl<'a> FilteredView<'a> {
    /// Resolves the selection against the level-filtered records, so the
    /// default window is the extent of that subset, then applies the
    /// temporal stage.
    pub fn new(
        records: &'a [Record],
        selection: &FilterSelection,
        vocabulary: &LevelVocabulary,
        now: NaiveDate,
    ) -> Self {
        let level = selection.level.as_deref();
        let by_level = apply_filters(records, level, &TemporalWindow::Full, vocabulary, now);
        let extent = month_extent(by_level.iter().copied(), now);
        let window = selection.window(extent);
        let filtered = match window {
            TemporalWindow::Full => by_level,
            _ => apply_filters(records, level, &window, vocabulary, now),
        };

        debug!(
            records = filtered.len(),
            window = %window.describe(),
            %now,
            "built filtered view"
        );

        Self {
            selection: selection.clone(),
            window,
            now,
            records: filtered,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn monthly_series(&self) -> Vec<MonthlyCount> {
        monthly_series(&self.records, &self.window, self.now)
    }

    pub fn institution_distribution(&self) -> Vec<DistributionRow> {
        institution_distribution(&self.records)
    }

    pub fn sample_rows_for_month(&self, month: MonthBucket, limit: usize) -> Vec<&'a Record> {
        sample_rows_for_month(&self.records, month, self.now, limit)
    }

    /// Earliest month with the highest active count.
    pub fn peak_month(&self) -> Option<MonthlyCount> {
        self.monthly_series()
            .into_iter()
            .filter(|entry| entry.active_count > 0)
            .fold(None, |best: Option<MonthlyCount>, entry| match best {
                Some(best) if best.active_count >= entry.active_count => Some(best),
                _ => Some(entry),
            })
    }
}
