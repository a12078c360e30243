//! Vendor export normalization.
//!
//! Turns one POS "sales by payment type" export or one accounting profit and
//! loss export into the month it belongs to plus a [`RecordPatch`] for that
//! month's revenue or expense fields.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info, warn};

use pnl_core::calculations::{parse_amount, remove_vat, round_amount};
use pnl_core::error::{PnlError, Result};
use pnl_core::models::{MonthKey, RecordPatch, SourceKind, RENT_EXPENSE_KEY};
use pnl_core::settings::NormalizerConfig;

// ── Patterns ──────────────────────────────────────────────────────────────────

/// `From 01/07/2024 To 31/07/2024`, day first.
fn date_range_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)from\s+(\d{1,2})/(\d{1,2})/(\d{4})\s+to\s+(\d{1,2})/(\d{1,2})/(\d{4})")
            .expect("regex is valid")
    })
}

/// `2024-07-01-2024-07-31` anywhere in a file name.
fn dated_file_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\d{4}-\d{2}-\d{2})-(\d{4}-\d{2}-\d{2})").expect("regex is valid")
    })
}

// ── IngestReport ──────────────────────────────────────────────────────────────

/// A data row that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line in the source text.
    pub line: usize,
    pub reason: String,
}

/// Row accounting for one ingestion call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Rows that contributed to the patch.
    pub rows_processed: usize,
    /// Rows dropped by a rule (wastage, subtotals, payroll lines, non-positive amounts).
    pub rows_excluded: usize,
    /// Rows whose amount could not be parsed.
    pub skipped: Vec<SkippedRow>,
}

impl IngestReport {
    /// Every non-blank data row seen, whatever happened to it.
    pub fn data_rows(&self) -> usize {
        self.rows_processed + self.rows_excluded + self.skipped.len()
    }

    fn skip(&mut self, err: PnlError) {
        match err {
            PnlError::Parse { line, message } => self.skipped.push(SkippedRow {
                line,
                reason: message,
            }),
            other => self.skipped.push(SkippedRow {
                line: 0,
                reason: other.to_string(),
            }),
        }
    }
}

/// Output of [`Normalizer::normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub month: MonthKey,
    pub patch: RecordPatch,
    pub report: IngestReport,
}

impl Normalized {
    /// The file had data rows yet produced a zero total.
    ///
    /// A soft signal for the caller to surface, since genuinely empty months
    /// exist.
    pub fn looks_empty(&self) -> bool {
        let total = match &self.patch {
            RecordPatch::Revenue { total_revenue, .. } => *total_revenue,
            RecordPatch::Expenses {
                cogs,
                operating_expenses,
                ..
            } => cogs.saturating_add(*operating_expenses),
            RecordPatch::Payroll { payroll, .. } => *payroll,
        };
        self.report.data_rows() > 0 && total.is_zero()
    }
}

// ── Normalizer ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Normalize one export.
    ///
    /// * `raw` – the file as delimited text (spreadsheets already flattened).
    /// * `file_name` – consulted for the month of POS exports.
    /// * `reference_date` – month fallback for undated POS exports.
    ///
    /// Unreadable rows are skipped and listed in the report. A missing
    /// accounting header or date range fails with [`PnlError::MissingHeader`].
    pub fn normalize(
        &self,
        raw: &str,
        kind: SourceKind,
        file_name: Option<&str>,
        reference_date: NaiveDate,
    ) -> Result<Normalized> {
        let normalized = match kind {
            SourceKind::PosRevenue => self.normalize_pos(raw, file_name, reference_date)?,
            SourceKind::AccountingExpenses => self.normalize_accounting(raw)?,
        };

        info!(
            "Normalized {} export{} for {}: {} rows processed, {} excluded, {} skipped",
            kind,
            file_name.map(|n| format!(" {n}")).unwrap_or_default(),
            normalized.month,
            normalized.report.rows_processed,
            normalized.report.rows_excluded,
            normalized.report.skipped.len()
        );
        if !normalized.report.skipped.is_empty() {
            warn!(
                "Skipped {} unreadable rows: {}",
                normalized.report.skipped.len(),
                normalized
                    .report
                    .skipped
                    .iter()
                    .map(|s| format!("line {} ({})", s.line, s.reason))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        Ok(normalized)
    }

    // ── POS revenue ───────────────────────────────────────────────────────────

    fn normalize_pos(
        &self,
        raw: &str,
        file_name: Option<&str>,
        reference_date: NaiveDate,
    ) -> Result<Normalized> {
        let month = self.pos_month(file_name, reference_date)?;

        let mut report = IngestReport::default();
        let mut breakdown: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut total = Decimal::ZERO;
        let mut amount_column = self.config.pos_net_amount_column;

        let mut header_seen = false;
        for (index, row) in csv_rows(raw).into_iter().enumerate() {
            let line = row.line.unwrap_or(index + 1);
            let cells = match row.cells {
                Ok(cells) => cells,
                Err(message) => {
                    report.skip(PnlError::Parse { line, message });
                    continue;
                }
            };
            if cells.iter().all(|c| c.is_empty()) {
                continue;
            }

            if !header_seen {
                header_seen = true;
                if let Some(col) = cells
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(&self.config.pos_net_amount_header))
                {
                    amount_column = col;
                }
                debug!("POS net amount column: {amount_column}");
                continue;
            }

            let label = cells[0].as_str();
            if label.is_empty() {
                report.skip(PnlError::Parse {
                    line,
                    message: "missing payment type".to_string(),
                });
                continue;
            }

            if self.is_wastage(label) {
                debug!("Excluding wastage row {line}: {label}");
                report.rows_excluded += 1;
                continue;
            }

            let amount = match read_amount(&cells, amount_column, line) {
                Ok(a) => a,
                Err(e) => {
                    report.skip(e);
                    continue;
                }
            };
            if amount < Decimal::ZERO {
                report.skip(PnlError::Parse {
                    line,
                    message: format!("negative net amount {amount}"),
                });
                continue;
            }

            let vat_excluded = remove_vat(amount, self.config.vat_rate);
            let Some(next_total) = total.checked_add(vat_excluded) else {
                report.skip(overflow(line, label, vat_excluded));
                continue;
            };
            debug!("POS {label}: {amount} -> {vat_excluded} (VAT excluded)");
            total = next_total;
            // Entries are non-negative, so none can exceed the total.
            *breakdown.entry(label.to_string()).or_default() += vat_excluded;
            report.rows_processed += 1;
        }

        Ok(Normalized {
            month,
            patch: RecordPatch::Revenue {
                total_revenue: total,
                payment_type_breakdown: breakdown,
            },
            report,
        })
    }

    fn pos_month(&self, file_name: Option<&str>, reference_date: NaiveDate) -> Result<MonthKey> {
        if let Some(date) = file_name.and_then(month_from_file_name) {
            return Ok(MonthKey::from_date(date));
        }
        if self.config.reference_month_fallback {
            debug!("No dated file name, using reference date {reference_date}");
            return Ok(MonthKey::from_date(reference_date));
        }
        Err(PnlError::MissingHeader(format!(
            "no YYYY-MM-DD-YYYY-MM-DD date range in file name {:?}",
            file_name.unwrap_or("")
        )))
    }

    fn is_wastage(&self, label: &str) -> bool {
        contains_any(label, &self.config.wastage_substrings)
    }

    // ── Accounting expenses ───────────────────────────────────────────────────

    fn normalize_accounting(&self, raw: &str) -> Result<Normalized> {
        let month = month_from_date_range(raw)?;
        let rows = csv_rows(raw);

        let (header_index, account_column, total_column) = rows
            .iter()
            .enumerate()
            .find_map(|(i, row)| {
                let cells = row.cells.as_ref().ok()?;
                let account = header_column(cells, "account", None)?;
                let total = header_column(cells, "total", Some(account))?;
                Some((i, account, total))
            })
            .ok_or_else(|| {
                PnlError::MissingHeader("no row with Account and Total columns".to_string())
            })?;
        debug!(
            "Accounting header on row {}: account column {account_column}, total column {total_column}",
            header_index + 1
        );

        let mut report = IngestReport::default();
        let mut cogs = Decimal::ZERO;
        let mut operating_expenses = Decimal::ZERO;
        let mut detail: BTreeMap<String, Decimal> = BTreeMap::new();

        for (index, row) in rows.iter().enumerate().skip(header_index + 1) {
            let line = row.line.unwrap_or(index + 1);
            let cells = match &row.cells {
                Ok(cells) => cells,
                Err(message) => {
                    report.skip(PnlError::Parse {
                        line,
                        message: message.clone(),
                    });
                    continue;
                }
            };

            let label = cells.get(account_column).map(String::as_str).unwrap_or("");
            let raw_amount = cells.get(total_column).map(String::as_str).unwrap_or("");
            if label.is_empty() {
                // Section headings and blank spacer rows.
                continue;
            }
            if raw_amount.is_empty() {
                report.rows_excluded += 1;
                continue;
            }

            let amount = match parse_amount(raw_amount) {
                Ok(a) => round_amount(a),
                Err(_) => {
                    report.skip(PnlError::Parse {
                        line,
                        message: format!("invalid amount {raw_amount:?} for {label:?}"),
                    });
                    continue;
                }
            };
            if amount <= Decimal::ZERO {
                report.rows_excluded += 1;
                continue;
            }

            let (running, detail_key) = match self.classify_account(label) {
                AccountClass::Cogs => (&mut cogs, None),
                AccountClass::Rent => (&mut operating_expenses, Some(RENT_EXPENSE_KEY)),
                AccountClass::Operating => (&mut operating_expenses, Some(label)),
                AccountClass::Excluded(why) => {
                    debug!("Excluding {why} row {line}: {label}");
                    report.rows_excluded += 1;
                    continue;
                }
            };
            let Some(next) = running.checked_add(amount) else {
                report.skip(overflow(line, label, amount));
                continue;
            };
            *running = next;
            match detail_key {
                Some(key) => {
                    debug!("Operating expense {label} ({key}): {amount}");
                    *detail.entry(key.to_string()).or_default() += amount;
                }
                None => debug!("COGS: {amount}"),
            }
            report.rows_processed += 1;
        }

        Ok(Normalized {
            month,
            patch: RecordPatch::Expenses {
                cogs,
                operating_expenses,
                operating_expense_detail: detail,
            },
            report,
        })
    }

    /// First matching rule wins.
    fn classify_account(&self, label: &str) -> AccountClass {
        let lower = label.to_lowercase();

        if label == self.config.cogs_label {
            return AccountClass::Cogs;
        }
        if lower.starts_with(&self.config.subtotal_prefix.to_lowercase())
            || self
                .config
                .summary_labels
                .iter()
                .any(|s| s.eq_ignore_ascii_case(label))
        {
            return AccountClass::Excluded("subtotal");
        }
        if contains_any(label, &self.config.payroll_substrings) {
            return AccountClass::Excluded("payroll");
        }
        if contains_any(label, &self.config.rent_substrings) {
            return AccountClass::Rent;
        }
        if lower.contains("income") || lower.contains("profit") {
            return AccountClass::Excluded("income");
        }
        AccountClass::Operating
    }

    // ── Payroll feed ──────────────────────────────────────────────────────────

    /// Read the payroll service payload,
    /// `{"success": true, "data": {"June 2025": {"payroll": .., "active_staff": ..}}}`,
    /// or a bare month map, into one payroll patch per month.
    pub fn normalize_payroll_feed(&self, json: &str) -> Result<Vec<(MonthKey, RecordPatch)>> {
        let value: Value = serde_json::from_str(json)?;
        let data = unwrap_envelope(value)?;
        let patches = payroll_patches(&data)?;
        info!("Normalized payroll feed: {} months", patches.len());
        Ok(patches)
    }
}

enum AccountClass {
    Cogs,
    Rent,
    Operating,
    Excluded(&'static str),
}

// ── Shared helpers ────────────────────────────────────────────────────────────

struct CsvRow {
    line: Option<usize>,
    cells: std::result::Result<Vec<String>, String>,
}

/// Split `raw` into trimmed cells, tolerating ragged rows and quoted commas.
fn csv_rows(raw: &str) -> Vec<CsvRow> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(raw.trim_start_matches('\u{feff}').as_bytes());

    reader
        .records()
        .map(|result| match result {
            Ok(record) => CsvRow {
                line: record.position().map(|p| p.line() as usize),
                cells: Ok(record.iter().map(|c| c.trim().to_string()).collect()),
            },
            Err(e) => CsvRow {
                line: e.position().map(|p| p.line() as usize),
                cells: Err(e.to_string()),
            },
        })
        .collect()
}

fn read_amount(cells: &[String], column: usize, line: usize) -> Result<Decimal> {
    let raw = cells.get(column).ok_or_else(|| PnlError::Parse {
        line,
        message: format!("no net amount in column {column}"),
    })?;
    parse_amount(raw).map_err(|e| match e {
        PnlError::Parse { message, .. } => PnlError::Parse { line, message },
        other => other,
    })
}

/// Column whose header is exactly `name`, else the first one containing it.
/// `taken` is never returned.
fn header_column(cells: &[String], name: &str, taken: Option<usize>) -> Option<usize> {
    let candidates = || {
        cells
            .iter()
            .enumerate()
            .filter(move |(i, _)| Some(*i) != taken)
    };
    candidates()
        .find(|(_, c)| c.eq_ignore_ascii_case(name))
        .or_else(|| candidates().find(|(_, c)| c.to_lowercase().contains(name)))
        .map(|(i, _)| i)
}

fn overflow(line: usize, label: &str, amount: Decimal) -> PnlError {
    PnlError::Parse {
        line,
        message: format!("amount {amount} for {label:?} overflows the running total"),
    }
}

fn contains_any(label: &str, needles: &[String]) -> bool {
    let lower = label.to_lowercase();
    needles
        .iter()
        .any(|n| !n.is_empty() && lower.contains(&n.to_lowercase()))
}

fn month_from_file_name(file_name: &str) -> Option<NaiveDate> {
    let caps = dated_file_name_pattern().captures(file_name)?;
    NaiveDate::parse_from_str(caps.get(1)?.as_str(), "%Y-%m-%d").ok()
}

fn month_from_date_range(raw: &str) -> Result<MonthKey> {
    let caps = date_range_pattern().captures(raw).ok_or_else(|| {
        PnlError::MissingHeader("no \"From DD/MM/YYYY To DD/MM/YYYY\" date range".to_string())
    })?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let start = match (field(1), field(2), caps.get(3).and_then(|m| m.as_str().parse::<i32>().ok())) {
        (Some(day), Some(month), Some(year)) => NaiveDate::from_ymd_opt(year, month, day),
        _ => None,
    };
    start.map(MonthKey::from_date).ok_or_else(|| {
        PnlError::MissingHeader(format!(
            "invalid start date in {:?}",
            caps.get(0).map(|m| m.as_str()).unwrap_or("")
        ))
    })
}

/// Strip the `{"success": .., "data": ..}` envelope when present.
pub(crate) fn unwrap_envelope(value: Value) -> Result<Value> {
    match value {
        Value::Object(mut map) if map.contains_key("data") => {
            if map.get("success").and_then(Value::as_bool) == Some(false) {
                let message = map
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                return Err(PnlError::Config(format!("payload reported failure: {message}")));
            }
            Ok(map.remove("data").unwrap_or(Value::Null))
        }
        other => Ok(other),
    }
}

/// `{month: {"payroll", "active_staff"}}` → payroll patches, chronological.
pub(crate) fn payroll_patches(data: &Value) -> Result<Vec<(MonthKey, RecordPatch)>> {
    let Some(months) = data.as_object() else {
        return Err(PnlError::Config("payroll data is not an object".to_string()));
    };

    let mut patches = Vec::with_capacity(months.len());
    for (key, entry) in months {
        let month: MonthKey = key.parse()?;
        let payroll = match entry.get("payroll") {
            Some(v) => json_amount(v)?,
            None => Decimal::ZERO,
        };
        let active_staff_count = entry
            .get("active_staff")
            .or_else(|| entry.get("activeStaffCount"))
            .and_then(json_count);
        debug!("Payroll {month}: {payroll} ({active_staff_count:?} staff)");
        patches.push((
            month,
            RecordPatch::Payroll {
                payroll,
                active_staff_count,
            },
        ));
    }
    patches.sort_by_key(|(m, _)| *m);
    Ok(patches)
}

/// A JSON number or a currency string such as `"฿2,487,126.00"`.
pub(crate) fn json_amount(value: &Value) -> Result<Decimal> {
    let amount = match value {
        Value::Number(n) => parse_amount(&n.to_string())?,
        Value::String(s) => parse_amount(s)?,
        Value::Null => Decimal::ZERO,
        other => {
            return Err(PnlError::Parse {
                line: 0,
                message: format!("expected an amount, got {other}"),
            })
        }
    };
    Ok(round_amount(amount))
}

fn json_count(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
