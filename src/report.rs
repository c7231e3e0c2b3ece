use std::fmt::Write;

use chrono::NaiveDate;
use serde::Serialize;

use crate::aggregate::FilteredView;
use crate::models::{DistributionRow, MonthlyCount, Record, SampleRow};
use crate::months::MonthBucket;

pub const ONGOING_LABEL: &str = "Ongoing";
const DISPLAY_DATE_FORMAT: &str = "%d %b %Y";

pub fn display_date(date: NaiveDate) -> String {
    date.format(DISPLAY_DATE_FORMAT).to_string()
}

pub fn sample_row(record: &Record) -> SampleRow {
    SampleRow {
        name: record.name.clone().unwrap_or_else(|| "-".to_string()),
        institution: record
            .institution
            .clone()
            .unwrap_or_else(|| "-".to_string()),
        start_display: display_date(record.start),
        end_display: record
            .end
            .map(display_date)
            .unwrap_or_else(|| ONGOING_LABEL.to_string()),
    }
}

pub fn sample_rows(records: &[&Record]) -> Vec<SampleRow> {
    records.iter().map(|record| sample_row(record)).collect()
}

pub fn build_report(
    source: &str,
    view: &FilteredView<'_>,
    sample_month: Option<MonthBucket>,
    sample_limit: usize,
) -> String {
    let series = view.monthly_series();
    let distribution = view.institution_distribution();
    let level_label = view.selection.level.as_deref().unwrap_or("all levels");

    let mut output = String::new();
    let _ = writeln!(output, "# Internship Activity Report");
    let _ = writeln!(
        output,
        "Generated from {} for {}, {} (as of {})",
        source,
        level_label,
        view.window.describe(),
        view.now
    );
    let _ = writeln!(output, "{} internships match this selection.", view.len());
    let _ = writeln!(output);
    let _ = writeln!(output, "## Active Internships per Month");

    if series.is_empty() {
        let _ = writeln!(output, "No internships recorded for this window.");
    } else {
        let _ = writeln!(output, "| Month | Active |");
        let _ = writeln!(output, "|-------|--------|");
        for entry in series.iter() {
            let _ = writeln!(output, "| {} | {} |", entry.month, entry.active_count);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Institution Mix");

    if distribution.is_empty() {
        let _ = writeln!(output, "No institutions recorded for this window.");
    } else {
        for row in distribution.iter() {
            let _ = writeln!(
                output,
                "- {}: {} internships ({:.1}%)",
                row.name, row.count, row.percentage
            );
        }
    }

    let month = sample_month.or_else(|| view.peak_month().map(|entry| entry.month));
    let _ = writeln!(output);
    match month {
        Some(month) => {
            let _ = writeln!(output, "## Sample Internships in {month}");
            let rows = sample_rows(&view.sample_rows_for_month(month, sample_limit));
            if rows.is_empty() {
                let _ = writeln!(output, "No internships active in {month}.");
            }
            for row in rows.iter() {
                let _ = writeln!(
                    output,
                    "- {} ({}) from {} to {}",
                    row.name, row.institution, row.start_display, row.end_display
                );
            }
        }
        None => {
            let _ = writeln!(output, "## Sample Internships");
            let _ = writeln!(output, "No internships active in this window.");
        }
    }

    output
}

#[derive(Serialize)]
struct SeriesCsvRow {
    month: String,
    active_count: usize,
}

pub fn write_series_csv<W: std::io::Write>(writer: W, series: &[MonthlyCount]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for entry in series {
        writer.serialize(SeriesCsvRow {
            month: entry.month.to_string(),
            active_count: entry.active_count,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_distribution_csv<W: std::io::Write>(
    writer: W,
    rows: &[DistributionRow],
) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
