//! Export discovery and loading.
//!
//! Reads vendor exports from disk as delimited text (flattening spreadsheet
//! workbooks on the way), and loads month-keyed JSON datasets and back-end
//! payloads.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, info, warn};

use pnl_core::error::{PnlError, Result};
use pnl_core::models::{MonthKey, MonthlyRecord, RecordPatch, SourceKind};

use crate::normalizer::{json_amount, payroll_patches, unwrap_envelope};

const CSV_EXTENSIONS: &[&str] = &["csv"];
const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "ods"];

// ── Export files ──────────────────────────────────────────────────────────────

/// Find all `.csv` and spreadsheet exports recursively under `dir`, sorted by path.
pub fn find_exports(dir: &Path) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Export directory does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && detect_source_kind(entry.path()).is_some())
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// `.csv` → POS revenue, spreadsheets → accounting expenses.
pub fn detect_source_kind(path: &Path) -> Option<SourceKind> {
    let ext = extension(path)?;
    if CSV_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceKind::PosRevenue)
    } else if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        Some(SourceKind::AccountingExpenses)
    } else {
        None
    }
}

/// Read an export as delimited text.
///
/// CSV files are read as-is; for spreadsheets the first sheet is flattened
/// to CSV.
pub fn read_export(path: &Path) -> Result<String> {
    let ext = extension(path).unwrap_or_default();
    if CSV_EXTENSIONS.contains(&ext.as_str()) {
        return std::fs::read_to_string(path).map_err(|source| PnlError::FileRead {
            path: path.to_path_buf(),
            source,
        });
    }
    if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        return first_sheet_to_csv(path);
    }
    Err(PnlError::UnsupportedFile(path.to_path_buf()))
}

fn first_sheet_to_csv(path: &Path) -> Result<String> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| PnlError::Spreadsheet(format!("cannot open {}: {e}", path.display())))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| PnlError::Spreadsheet(format!("no sheets in {}", path.display())))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| PnlError::Spreadsheet(format!("cannot read sheet {sheet_name:?}: {e}")))?;

    let mut writer = csv::WriterBuilder::new().flexible(true).from_writer(Vec::new());
    for row in range.rows() {
        let cells: Vec<String> = row.iter().map(cell_str).collect();
        writer
            .write_record(&cells)
            .map_err(|e| PnlError::Spreadsheet(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| PnlError::Spreadsheet(e.to_string()))?;

    debug!(
        "Flattened sheet {:?} of {} ({} rows)",
        sheet_name,
        path.display(),
        range.height()
    );
    String::from_utf8(bytes).map_err(|e| PnlError::Spreadsheet(e.to_string()))
}

fn cell_str(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

// ── Datasets ──────────────────────────────────────────────────────────────────

/// Load a month-keyed dataset of whole records from `path`.
pub fn load_seed(path: &Path) -> Result<Vec<(MonthKey, MonthlyRecord)>> {
    let content = std::fs::read_to_string(path).map_err(|source| PnlError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_seed(&content)?;
    info!("Loaded {} months from {}", records.len(), path.display());
    Ok(records)
}

/// Parse `{"July 2024": {..record..}, ..}`, optionally inside a
/// `{"success", "data"}` envelope.
///
/// Every key must be a valid month. A `"total"` entry in a payment breakdown
/// duplicates the revenue total and is dropped.
pub fn parse_seed(json: &str) -> Result<Vec<(MonthKey, MonthlyRecord)>> {
    let value: Value = serde_json::from_str(json)?;
    let raw: BTreeMap<String, MonthlyRecord> = serde_json::from_value(unwrap_envelope(value)?)?;

    let mut records = Vec::with_capacity(raw.len());
    for (key, mut record) in raw {
        let month: MonthKey = key.parse()?;
        record
            .payment_type_breakdown
            .retain(|label, _| !label.eq_ignore_ascii_case("total"));
        records.push((month, record));
    }
    records.sort_by_key(|(m, _)| *m);
    Ok(records)
}

/// Parse the combined back-end payload into per-category patches.
///
/// ```json
/// {"success": true, "data": {
///   "revenue":  {"July 2024": {"amount": 3125000}},
///   "expenses": {"July 2024": {"cogs": 900000, "operating_expenses": 410000,
///                              "operating_expense_details": {"Rent Expense": 250000, "Utilities": 160000}}},
///   "payroll":  {"July 2024": {"payroll": 2466633.02, "active_staff": 122}}
/// }}
/// ```
///
/// Missing sections are fine; patches come out grouped by section, each
/// section chronological.
pub fn parse_backend_payload(json: &str) -> Result<Vec<(MonthKey, RecordPatch)>> {
    let value: Value = serde_json::from_str(json)?;
    let data = unwrap_envelope(value)?;

    let mut patches = Vec::new();

    if let Some(revenue) = data.get("revenue") {
        for (month, entry) in section_entries(revenue, "revenue")? {
            let amount = entry
                .get("amount")
                .or_else(|| entry.get("total_revenue"))
                .map(json_amount)
                .transpose()?
                .unwrap_or(Decimal::ZERO);
            let breakdown = amount_map(entry.get("payment_breakdown"))?;
            patches.push((
                month,
                RecordPatch::Revenue {
                    total_revenue: amount,
                    payment_type_breakdown: breakdown,
                },
            ));
        }
    }

    if let Some(expenses) = data.get("expenses") {
        for (month, entry) in section_entries(expenses, "expenses")? {
            let field = |name: &str| -> Result<Decimal> {
                entry
                    .get(name)
                    .map(json_amount)
                    .transpose()
                    .map(|v| v.unwrap_or(Decimal::ZERO))
            };
            patches.push((
                month,
                RecordPatch::Expenses {
                    cogs: field("cogs")?,
                    operating_expenses: field("operating_expenses")?,
                    operating_expense_detail: amount_map(entry.get("operating_expense_details"))?,
                },
            ));
        }
    }

    if let Some(payroll) = data.get("payroll") {
        patches.extend(payroll_patches(payroll)?);
    }

    info!("Parsed {} patches from back-end payload", patches.len());
    Ok(patches)
}

fn section_entries<'a>(section: &'a Value, name: &str) -> Result<Vec<(MonthKey, &'a Value)>> {
    let Some(months) = section.as_object() else {
        return Err(PnlError::Config(format!("{name} section is not an object")));
    };
    let mut entries = months
        .iter()
        .map(|(key, entry)| Ok((key.parse::<MonthKey>()?, entry)))
        .collect::<Result<Vec<_>>>()?;
    entries.sort_by_key(|(m, _)| *m);
    Ok(entries)
}

fn amount_map(value: Option<&Value>) -> Result<BTreeMap<String, Decimal>> {
    let Some(Value::Object(map)) = value else {
        return Ok(BTreeMap::new());
    };
    map.iter()
        .filter(|(label, _)| !label.eq_ignore_ascii_case("total"))
        .map(|(label, v)| Ok((label.clone(), json_amount(v)?)))
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    // ── find_exports / detect_source_kind ─────────────────────────────────────

    #[test]
    fn test_find_exports_recursive_sorted() {
        let tmp = TempDir::new().expect("tempdir");
        let nested = tmp.path().join("2024").join("07");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("b-sales.csv"), "x").unwrap();
        std::fs::write(tmp.path().join("a-pl.XLSX"), "x").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        let files = find_exports(tmp.path());
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("2024/07/b-sales.csv"));
        assert!(files[1].ends_with("a-pl.XLSX"));
    }

    #[test]
    fn test_find_exports_missing_dir() {
        let tmp = TempDir::new().expect("tempdir");
        assert!(find_exports(&tmp.path().join("nope")).is_empty());
    }

    #[test]
    fn test_detect_source_kind() {
        assert_eq!(
            detect_source_kind(Path::new("sales-2024-07-01-2024-07-31.csv")),
            Some(SourceKind::PosRevenue)
        );
        assert_eq!(
            detect_source_kind(Path::new("Profit_and_Loss.xlsx")),
            Some(SourceKind::AccountingExpenses)
        );
        assert_eq!(detect_source_kind(Path::new("readme.md")), None);
        assert_eq!(detect_source_kind(Path::new("no_extension")), None);
    }

    // ── read_export ───────────────────────────────────────────────────────────

    #[test]
    fn test_read_export_csv() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("sales.csv");
        std::fs::write(&path, "Payment type,Net amount\nCash,107\n").unwrap();
        assert_eq!(read_export(&path).unwrap(), "Payment type,Net amount\nCash,107\n");
    }

    #[test]
    fn test_read_export_missing_file() {
        let tmp = TempDir::new().expect("tempdir");
        let err = read_export(&tmp.path().join("gone.csv")).unwrap_err();
        assert!(matches!(err, PnlError::FileRead { .. }));
    }

    #[test]
    fn test_read_export_unsupported() {
        let err = read_export(Path::new("notes.txt")).unwrap_err();
        assert!(matches!(err, PnlError::UnsupportedFile(_)));
    }

    #[test]
    fn test_read_export_corrupt_spreadsheet() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("pl.xlsx");
        std::fs::write(&path, "not a zip archive").unwrap();
        assert!(matches!(read_export(&path), Err(PnlError::Spreadsheet(_))));
    }

    #[test]
    fn test_cell_str() {
        assert_eq!(cell_str(&Data::String("Utilities".to_string())), "Utilities");
        assert_eq!(cell_str(&Data::Float(1250.5)), "1250.5");
        assert_eq!(cell_str(&Data::Int(800)), "800");
        assert_eq!(cell_str(&Data::Empty), "");
    }

    // ── parse_seed ────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_seed_orders_and_drops_total() {
        let json = r#"{
            "September 2024": {"total_revenue": 10, "cogs": 3},
            "July 2024": {
                "total_revenue": 300,
                "payment_breakdown": {"Cash": 100, "Card": 200, "total": 300},
                "active_staff": 12
            }
        }"#;
        let records = parse_seed(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].0.to_string(), "July 2024");
        assert_eq!(records[0].1.payment_type_breakdown.len(), 2);
        assert_eq!(records[0].1.active_staff_count, Some(12));
        assert_eq!(records[1].1.cogs, dec!(3));
    }

    #[test]
    fn test_parse_seed_rejects_bad_month() {
        let err = parse_seed(r#"{"Current Month": {}}"#).unwrap_err();
        assert!(matches!(err, PnlError::InvalidMonthKey(_)));
    }

    #[test]
    fn test_load_seed_from_file() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp.path().join("seed.json");
        std::fs::write(&path, r#"{"success": true, "data": {"2024-07": {"payroll": 5}}}"#).unwrap();
        let records = load_seed(&path).unwrap();
        assert_eq!(records[0].1.payroll, dec!(5));
    }

    // ── parse_backend_payload ─────────────────────────────────────────────────

    #[test]
    fn test_parse_backend_payload_all_sections() {
        let json = r#"{"success": true, "data": {
            "revenue": {"July 2024": {"amount": 3125000}},
            "expenses": {"July 2024": {
                "cogs": 900000,
                "operating_expenses": 410000,
                "operating_expense_details": {"Rent Expense": 250000, "Utilities": 160000}
            }},
            "payroll": {"July 2024": {"payroll": 2466633.02, "active_staff": 122}}
        }}"#;
        let patches = parse_backend_payload(json).unwrap();
        assert_eq!(patches.len(), 3);

        let mut record = MonthlyRecord::default();
        for (month, patch) in &patches {
            assert_eq!(month.to_string(), "July 2024");
            record = patch.apply(&record);
        }
        assert_eq!(record.total_revenue, dec!(3125000));
        assert_eq!(record.cogs, dec!(900000));
        assert_eq!(record.rent(), dec!(250000));
        assert_eq!(record.payroll, dec!(2466633.02));
        assert_eq!(record.active_staff_count, Some(122));
    }

    #[test]
    fn test_parse_backend_payload_partial() {
        let json = r#"{"success": true, "data": {"revenue": {"2024-08": {"amount": "1,000"}}}}"#;
        let patches = parse_backend_payload(json).unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(
            patches[0].1,
            RecordPatch::Revenue {
                total_revenue: dec!(1000),
                payment_type_breakdown: BTreeMap::new()
            }
        );
    }

    #[test]
    fn test_parse_backend_payload_failure() {
        let json = r#"{"success": false, "data": {}, "error": "backend asleep"}"#;
        let err = parse_backend_payload(json).unwrap_err();
        assert!(err.to_string().contains("backend asleep"));
    }
}
