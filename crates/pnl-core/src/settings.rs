use chrono::NaiveDate;
use clap::Parser;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::benchmarks::IndustryBenchmarks;
use crate::error::{PnlError, Result};
use crate::models::MonthKey;

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Restaurant profit and loss report from POS and accounting exports
#[derive(Parser, Debug, Clone)]
#[command(
    name = "pnl-report",
    about = "Restaurant profit and loss report from POS and accounting exports",
    version
)]
pub struct Settings {
    /// Month-keyed JSON dataset to start from
    #[arg(long)]
    pub seed: Option<PathBuf>,

    /// Combined back-end payload (revenue, expenses, payroll) as JSON
    #[arg(long)]
    pub backend: Option<PathBuf>,

    /// Payroll feed payload as JSON
    #[arg(long)]
    pub payroll: Option<PathBuf>,

    /// POS "sales by payment type" export (repeatable)
    #[arg(long)]
    pub revenue: Vec<PathBuf>,

    /// Accounting profit and loss export, CSV or XLSX (repeatable)
    #[arg(long)]
    pub expenses: Vec<PathBuf>,

    /// Directory scanned recursively for exports
    #[arg(long)]
    pub inbox: Option<PathBuf>,

    /// First month of the report, e.g. "July 2024" or "2024-07"
    #[arg(long)]
    pub from: Option<String>,

    /// Last month of the report
    #[arg(long)]
    pub to: Option<String>,

    /// Date used to attribute POS exports without a dated filename (YYYY-MM-DD)
    #[arg(long)]
    pub reference_date: Option<String>,

    /// Normalizer configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Include benchmark insights
    #[arg(long)]
    pub insights: bool,

    /// Include the month-by-month trend table
    #[arg(long)]
    pub trends: bool,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Settings {
    /// Parse CLI arguments and apply the `--debug` override.
    pub fn load() -> Self {
        Self::load_from_args(std::env::args_os())
    }

    /// Same as [`Settings::load`] with an explicit argument list.
    pub fn load_from_args<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let mut settings = Settings::parse_from(args);
        // --debug overrides log level.
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// The `--from`/`--to` pair as month keys.
    ///
    /// A lone `--from` or `--to` selects that single month. `None` when
    /// neither is given.
    pub fn month_range(&self) -> Result<Option<(MonthKey, MonthKey)>> {
        let from = self.from.as_deref().map(str::parse::<MonthKey>).transpose()?;
        let to = self.to.as_deref().map(str::parse::<MonthKey>).transpose()?;
        Ok(match (from, to) {
            (Some(f), Some(t)) => Some((f, t)),
            (Some(f), None) => Some((f, f)),
            (None, Some(t)) => Some((t, t)),
            (None, None) => None,
        })
    }

    /// `--reference-date`, or `today` when not given.
    pub fn reference_date_or(&self, today: NaiveDate) -> Result<NaiveDate> {
        match &self.reference_date {
            Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
                PnlError::Config(format!("invalid --reference-date {raw:?}: {e}"))
            }),
            None => Ok(today),
        }
    }

    /// `--config`, or the default location under the home directory.
    pub fn config_file(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(NormalizerConfig::config_path)
    }

    pub fn wants_json(&self) -> bool {
        self.format == "json"
    }
}

// ── NormalizerConfig ───────────────────────────────────────────────────────────

/// Vendor literals and thresholds used during ingestion, persisted to
/// `~/.pnl-report/config.json`. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// VAT included in POS amounts, as a fraction.
    pub vat_rate: Decimal,
    /// POS rows whose label contains one of these (case-insensitive) are dropped.
    pub wastage_substrings: Vec<String>,
    /// Net-amount column used when no header cell matches `pos_net_amount_header`.
    pub pos_net_amount_column: usize,
    pub pos_net_amount_header: String,
    /// Attribute undated POS exports to the reference date's month.
    pub reference_month_fallback: bool,
    pub cogs_label: String,
    pub subtotal_prefix: String,
    pub summary_labels: Vec<String>,
    pub payroll_substrings: Vec<String>,
    pub rent_substrings: Vec<String>,
    pub benchmarks: IndustryBenchmarks,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            vat_rate: Decimal::new(7, 2),
            wastage_substrings: vec!["wastage".to_string()],
            pos_net_amount_column: 5,
            pos_net_amount_header: "Net amount".to_string(),
            reference_month_fallback: true,
            cogs_label: "Cost of Goods Sold".to_string(),
            subtotal_prefix: "Total for".to_string(),
            summary_labels: [
                "Operating Income",
                "Operating Expense",
                "Gross Profit",
                "Operating Profit",
                "Net Profit/Loss",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            payroll_substrings: ["salaries", "employee wages", "payroll"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rent_substrings: vec!["rent".to_string()],
            benchmarks: IndustryBenchmarks::default(),
        }
    }
}

impl NormalizerConfig {
    /// Default config path, `~/.pnl-report/config.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// The config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(".pnl-report").join("config.json")
    }

    /// Load from `path`. A missing file yields the defaults; a file that
    /// exists but is not valid config is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(PnlError::FileRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| PnlError::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        tracing::debug!("Loaded normalizer config from {}", path.display());
        Ok(config)
    }

    /// Atomically write the config, creating parent directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.vat_rate < Decimal::ZERO || self.vat_rate >= Decimal::ONE {
            return Err(PnlError::Config(format!(
                "vat_rate must be in [0, 1), got {}",
                self.vat_rate
            )));
        }
        if self.cogs_label.trim().is_empty() {
            return Err(PnlError::Config("cogs_label must not be empty".to_string()));
        }
        Ok(())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
