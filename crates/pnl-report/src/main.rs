mod bootstrap;
mod report;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use pnl_core::benchmarks::generate_insights;
use pnl_core::models::{MonthKey, SourceKind};
use pnl_core::settings::{NormalizerConfig, Settings};
use pnl_data::aggregator::RangeAggregator;
use pnl_data::normalizer::Normalizer;
use pnl_data::reader;
use pnl_data::store::FinancialStore;

use crate::report::Report;

fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("P&L report v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = settings.config_file();
    let config = NormalizerConfig::load_from(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let reference_date = settings.reference_date_or(chrono::Local::now().date_naive())?;
    let normalizer = Normalizer::new(config);

    let mut store = FinancialStore::new();
    let mut warnings = Vec::new();

    if let Some(path) = &settings.seed {
        store.seed(reader::load_seed(path)?);
    }
    if let Some(path) = &settings.backend {
        for (month, patch) in reader::parse_backend_payload(&read_json(path)?)? {
            store.apply(month, &patch);
        }
    }
    if let Some(path) = &settings.payroll {
        for (month, patch) in normalizer.normalize_payroll_feed(&read_json(path)?)? {
            store.apply(month, &patch);
        }
    }

    for (path, kind) in collect_exports(&settings) {
        if let Err(e) = ingest_export(&normalizer, &mut store, &path, kind, reference_date, &mut warnings)
        {
            tracing::error!("Failed to ingest {}: {}", path.display(), e);
            warnings.push(format!("{}: {}", path.display(), e));
        }
    }

    let months = store.months();
    let (start, end) = match settings.month_range()? {
        Some(range) => range,
        None => match (months.first(), months.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => anyhow::bail!(
                "no data loaded; pass --seed, --backend, --payroll, --revenue, --expenses or --inbox"
            ),
        },
    };

    let summary = RangeAggregator::aggregate_calendar(&store, start, end)?;
    let insights = if settings.insights {
        generate_insights(&summary, &normalizer.config().benchmarks)
    } else {
        Vec::new()
    };
    let trends = if settings.trends {
        RangeAggregator::monthly_trends(&store, &MonthKey::span(start, end))
    } else {
        Vec::new()
    };

    let report = Report {
        summary,
        insights,
        trends,
        warnings,
    };

    if settings.wants_json() {
        println!("{}", serde_json::to_string_pretty(&report.to_json())?);
    } else {
        print!("{}", report.to_text());
    }

    Ok(())
}

/// Explicit `--revenue`/`--expenses` files first, then everything in the inbox.
fn collect_exports(settings: &Settings) -> Vec<(PathBuf, SourceKind)> {
    let mut exports: Vec<(PathBuf, SourceKind)> = settings
        .revenue
        .iter()
        .map(|p| (p.clone(), SourceKind::PosRevenue))
        .chain(
            settings
                .expenses
                .iter()
                .map(|p| (p.clone(), SourceKind::AccountingExpenses)),
        )
        .collect();

    let inbox = settings.inbox.clone().or_else(bootstrap::discover_inbox);
    if let Some(dir) = inbox {
        for path in reader::find_exports(&dir) {
            if let Some(kind) = reader::detect_source_kind(&path) {
                exports.push((path, kind));
            }
        }
    }
    exports
}

fn ingest_export(
    normalizer: &Normalizer,
    store: &mut FinancialStore,
    path: &Path,
    kind: SourceKind,
    reference_date: NaiveDate,
    warnings: &mut Vec<String>,
) -> Result<()> {
    let raw = reader::read_export(path)?;
    let file_name = path.file_name().and_then(|n| n.to_str());
    let normalized = normalizer.normalize(&raw, kind, file_name, reference_date)?;

    if normalized.looks_empty() {
        tracing::warn!(
            "{} had {} rows but produced a zero total for {}",
            path.display(),
            normalized.report.data_rows(),
            normalized.month
        );
        warnings.push(format!(
            "{}: no amounts retained for {}",
            path.display(),
            normalized.month
        ));
    }

    store.apply(normalized.month, &normalized.patch);
    Ok(())
}

fn read_json(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}
