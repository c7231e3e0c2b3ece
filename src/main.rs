use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use internship_activity::aggregate::{FilteredView, DEFAULT_SAMPLE_LIMIT};
use internship_activity::filter::{apply_selection, DatasetFacets, FilterSelection, SelectionEvent};
use internship_activity::levels::LevelVocabulary;
use internship_activity::months::MonthBucket;
use internship_activity::{dates, import, report};

#[derive(Parser)]
#[command(name = "internship-activity")]
#[command(about = "Monthly activity analysis for internship rosters", long_about = None)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,
    #[command(flatten)]
    filters: FilterArgs,
    /// Print machine readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// CSV export of the internship roster
    #[arg(long, global = true)]
    input: Option<PathBuf>,
    /// Reference date for ongoing internships (defaults to INTERNSHIP_NOW, then today)
    #[arg(long, global = true)]
    now: Option<NaiveDate>,
    /// JSON file overriding the built-in level vocabulary
    #[arg(long, global = true)]
    vocabulary: Option<PathBuf>,
}

#[derive(Args)]
struct FilterArgs {
    /// Only count internships of this level (e.g. SMK, Universitas)
    #[arg(long, global = true)]
    level: Option<String>,
    /// Only count internships active during this calendar year
    #[arg(long, global = true, conflicts_with_all = ["from", "to"])]
    year: Option<i32>,
    /// First month of a custom period (YYYY-MM)
    #[arg(long, global = true)]
    from: Option<MonthBucket>,
    /// Last month of a custom period (YYYY-MM)
    #[arg(long, global = true)]
    to: Option<MonthBucket>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportKind {
    Series,
    Distribution,
}

#[derive(Subcommand)]
enum Commands {
    /// Active internships per month
    Series,
    /// Internships per institution
    Distribution,
    /// Internships active in one month
    Samples {
        /// Month to inspect (defaults to the busiest month)
        #[arg(long)]
        month: Option<MonthBucket>,
        #[arg(long, default_value_t = DEFAULT_SAMPLE_LIMIT)]
        limit: usize,
    },
    /// Levels, years and month range available in the roster
    Facets,
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[arg(long)]
        month: Option<MonthBucket>,
    },
    /// Write a view as CSV
    Export {
        #[arg(long, value_enum, default_value_t = ExportKind::Series)]
        what: ExportKind,
        #[arg(long, default_value = "activity.csv")]
        out: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let input = cli
        .source
        .input
        .clone()
        .context("--input must point at a CSV export of the roster")?;
    let now = resolve_now(cli.source.now)?;
    let vocabulary = match &cli.source.vocabulary {
        Some(path) => LevelVocabulary::from_json_file(path)?,
        None => LevelVocabulary::default(),
    };

    let rows = import::read_csv_file(&input)?;
    let outcome = import::normalize_rows(&rows);
    if outcome.records.is_empty() {
        bail!("no valid rows in {}", input.display());
    }
    if !outcome.rejected.is_empty() {
        warn!(
            rejected = outcome.rejected.len(),
            "some rows were skipped because their start date could not be read"
        );
    }
    let records = outcome.records;
    info!(records = records.len(), %now, "roster loaded");

    let facets = DatasetFacets::from_records(&records, &vocabulary, now);
    let selection = build_selection(&cli.filters, &facets);

    match cli.command {
        Commands::Facets => {
            if cli.json {
                println!("{}", report::to_json(&facets)?);
            } else {
                println!("Levels: {}", facets.levels.join(", "));
                let years: Vec<String> = facets.years.iter().map(ToString::to_string).collect();
                println!("Years: {}", years.join(", "));
                if let Some((first, last)) = facets.extent {
                    println!("Months: {first} to {last}");
                }
            }
        }
        Commands::Series => {
            let view = FilteredView::new(&records, &selection, &vocabulary, now);
            let series = view.monthly_series();
            if cli.json {
                println!("{}", report::to_json(&series)?);
            } else if series.is_empty() {
                println!("No internships found for this selection.");
            } else {
                println!("Active internships per month ({}):", view.window.describe());
                for entry in series.iter() {
                    println!("- {}: {}", entry.month, entry.active_count);
                }
            }
        }
        Commands::Distribution => {
            let view = FilteredView::new(&records, &selection, &vocabulary, now);
            let rows = view.institution_distribution();
            if cli.json {
                println!("{}", report::to_json(&rows)?);
            } else if rows.is_empty() {
                println!("No internships found for this selection.");
            } else {
                println!("Internships per institution:");
                for row in rows.iter() {
                    println!("- {}: {} ({:.1}%)", row.name, row.count, row.percentage);
                }
            }
        }
        Commands::Samples { month, limit } => {
            let view = FilteredView::new(&records, &selection, &vocabulary, now);
            let Some(month) = month.or_else(|| view.peak_month().map(|entry| entry.month)) else {
                println!("No internships found for this selection.");
                return Ok(());
            };
            let rows = report::sample_rows(&view.sample_rows_for_month(month, limit));
            if cli.json {
                println!("{}", report::to_json(&rows)?);
            } else {
                println!("Internships active in {month}:");
                for row in rows.iter() {
                    println!(
                        "- {} ({}) from {} to {}",
                        row.name, row.institution, row.start_display, row.end_display
                    );
                }
            }
        }
        Commands::Report { out, month } => {
            let view = FilteredView::new(&records, &selection, &vocabulary, now);
            let source = input.display().to_string();
            let markdown = report::build_report(&source, &view, month, DEFAULT_SAMPLE_LIMIT);
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { what, out } => {
            let view = FilteredView::new(&records, &selection, &vocabulary, now);
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            match what {
                ExportKind::Series => report::write_series_csv(file, &view.monthly_series())?,
                ExportKind::Distribution => {
                    report::write_distribution_csv(file, &view.institution_distribution())?
                }
            }
            println!("Export written to {}.", out.display());
        }
    }

    Ok(())
}

fn resolve_now(flag: Option<NaiveDate>) -> anyhow::Result<NaiveDate> {
    if let Some(now) = flag {
        return Ok(now);
    }
    match std::env::var("INTERNSHIP_NOW") {
        Ok(raw) => dates::parse_text(&raw).context("INTERNSHIP_NOW must be a date such as 2024-04-01"),
        Err(_) => Ok(Utc::now().date_naive()),
    }
}

/// Replays the command line choices through the selection reducer, then
/// reconciles them with what the roster actually contains.
fn build_selection(filters: &FilterArgs, facets: &DatasetFacets) -> FilterSelection {
    let events = [
        SelectionEvent::SelectLevel(filters.level.clone()),
        SelectionEvent::SelectYear(filters.year),
        SelectionEvent::SelectPeriodStart(filters.from),
        SelectionEvent::SelectPeriodEnd(filters.to),
    ];
    let requested = events
        .into_iter()
        .filter(|event| !is_noop(event))
        .fold(FilterSelection::default(), |selection, event| {
            apply_selection(&selection, event)
        });

    let reconciled = apply_selection(&requested, SelectionEvent::DatasetLoaded(facets.clone()));
    if reconciled != requested {
        warn!(?requested, ?reconciled, "selection adjusted to the roster's contents");
    }
    reconciled
}

fn is_noop(event: &SelectionEvent) -> bool {
    matches!(
        event,
        SelectionEvent::SelectLevel(None)
            | SelectionEvent::SelectYear(None)
            | SelectionEvent::SelectPeriodStart(None)
            | SelectionEvent::SelectPeriodEnd(None)
    )
}
