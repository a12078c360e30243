use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::calculations::percentage_of;
use crate::error::{PnlError, Result};

/// Detail key under which rent is always broken out of operating expenses.
pub const RENT_EXPENSE_KEY: &str = "Rent Expense";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

// ── MonthKey ──────────────────────────────────────────────────────────────────

/// One calendar month; the primary key of the financial store.
///
/// Ordering is chronological. Parses from `"July 2024"`, `"Jul 2024"` or
/// `"2024-07"` and displays as `"July 2024"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    /// Build a key from a year and a 1-based month number.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(PnlError::InvalidMonthKey(format!("{year}-{month:02}")));
        }
        Ok(Self { year, month })
    }

    /// The month containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// English month name, e.g. `"July"`.
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }

    /// `"YYYY-MM"` rendering.
    pub fn iso(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// First calendar day of the month.
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    /// The following calendar month.
    pub fn succ(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Every calendar month from `start` to `end` inclusive.
    ///
    /// Returns an empty list when `start` is after `end`.
    pub fn span(start: MonthKey, end: MonthKey) -> Vec<MonthKey> {
        let mut months = Vec::new();
        let mut current = start;
        while current <= end {
            months.push(current);
            current = current.succ();
        }
        months
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.month_name(), self.year)
    }
}

impl FromStr for MonthKey {
    type Err = PnlError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PnlError::InvalidMonthKey(s.to_string()));
        }

        // "2024-07"
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{trimmed}-01"), "%Y-%m-%d") {
            return Ok(Self::from_date(date));
        }

        // "July 2024" / "Jul 2024" (chrono matches month names case-insensitively)
        if let Ok(date) = NaiveDate::parse_from_str(&format!("1 {trimmed}"), "%d %B %Y") {
            return Ok(Self::from_date(date));
        }

        Err(PnlError::InvalidMonthKey(s.to_string()))
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── SourceKind ────────────────────────────────────────────────────────────────

/// Which vendor export a raw file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Point-of-sale "sales by payment type" CSV.
    PosRevenue,
    /// Accounting-system profit and loss export.
    AccountingExpenses,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::PosRevenue => "pos_revenue",
            SourceKind::AccountingExpenses => "accounting_expenses",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = PnlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pos_revenue" => Ok(SourceKind::PosRevenue),
            "accounting_expenses" => Ok(SourceKind::AccountingExpenses),
            other => Err(PnlError::Config(format!("unknown source kind: {other}"))),
        }
    }
}

// ── MonthlyRecord ─────────────────────────────────────────────────────────────

/// One calendar month's financial facts.
///
/// Field names on the wire follow the bundled dataset; camelCase aliases are
/// accepted when reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRecord {
    /// VAT-excluded revenue.
    #[serde(default, alias = "totalRevenue")]
    pub total_revenue: Decimal,
    /// Cost of goods sold.
    #[serde(default)]
    pub cogs: Decimal,
    /// Labour cost, sourced from the payroll feed.
    #[serde(default)]
    pub payroll: Decimal,
    /// All non-COGS, non-payroll operating costs, rent included.
    #[serde(default, alias = "operatingExpenses")]
    pub operating_expenses: Decimal,
    /// Itemised components of `operating_expenses`.
    #[serde(
        default,
        rename = "operating_expense_details",
        alias = "operatingExpenseDetail"
    )]
    pub operating_expense_detail: BTreeMap<String, Decimal>,
    /// VAT-excluded revenue subtotals by tender type.
    #[serde(
        default,
        rename = "payment_breakdown",
        alias = "paymentTypeBreakdown",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub payment_type_breakdown: BTreeMap<String, Decimal>,
    /// Headcount for the month, when known.
    #[serde(
        default,
        rename = "active_staff",
        alias = "activeStaffCount",
        skip_serializing_if = "Option::is_none"
    )]
    pub active_staff_count: Option<u32>,
}

impl MonthlyRecord {
    /// Rent as broken out in the operating expense detail.
    pub fn rent(&self) -> Decimal {
        self.operating_expense_detail
            .get(RENT_EXPENSE_KEY)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Operating expenses excluding rent.
    pub fn other_expenses(&self) -> Decimal {
        self.operating_expenses.saturating_sub(self.rent())
    }

    /// COGS + payroll + operating expenses. Rent is already inside the latter.
    ///
    /// Sums saturate at the `Decimal` bounds.
    pub fn total_expenses(&self) -> Decimal {
        self.cogs
            .saturating_add(self.payroll)
            .saturating_add(self.operating_expenses)
    }

    pub fn net_result(&self) -> Decimal {
        self.total_revenue.saturating_sub(self.total_expenses())
    }
}

// ── RecordPatch ───────────────────────────────────────────────────────────────

/// The three independently sourced groups of `MonthlyRecord` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataCategory {
    Revenue,
    Expenses,
    Payroll,
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataCategory::Revenue => f.write_str("revenue"),
            DataCategory::Expenses => f.write_str("expenses"),
            DataCategory::Payroll => f.write_str("payroll"),
        }
    }
}

/// A partial `MonthlyRecord` covering exactly one [`DataCategory`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "category", rename_all = "lowercase")]
pub enum RecordPatch {
    Revenue {
        total_revenue: Decimal,
        payment_type_breakdown: BTreeMap<String, Decimal>,
    },
    Expenses {
        cogs: Decimal,
        operating_expenses: Decimal,
        operating_expense_detail: BTreeMap<String, Decimal>,
    },
    Payroll {
        payroll: Decimal,
        active_staff_count: Option<u32>,
    },
}

impl RecordPatch {
    pub fn category(&self) -> DataCategory {
        match self {
            RecordPatch::Revenue { .. } => DataCategory::Revenue,
            RecordPatch::Expenses { .. } => DataCategory::Expenses,
            RecordPatch::Payroll { .. } => DataCategory::Payroll,
        }
    }

    /// Produce a new record with this patch's category replaced and every
    /// other field copied from `base`.
    pub fn apply(&self, base: &MonthlyRecord) -> MonthlyRecord {
        let mut next = base.clone();
        match self {
            RecordPatch::Revenue {
                total_revenue,
                payment_type_breakdown,
            } => {
                next.total_revenue = *total_revenue;
                next.payment_type_breakdown = payment_type_breakdown.clone();
            }
            RecordPatch::Expenses {
                cogs,
                operating_expenses,
                operating_expense_detail,
            } => {
                next.cogs = *cogs;
                next.operating_expenses = *operating_expenses;
                next.operating_expense_detail = operating_expense_detail.clone();
            }
            RecordPatch::Payroll {
                payroll,
                active_staff_count,
            } => {
                next.payroll = *payroll;
                next.active_staff_count = *active_staff_count;
            }
        }
        next
    }
}

// ── RangeSummary ──────────────────────────────────────────────────────────────

/// A labelled amount with its share of revenue.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub label: String,
    pub value: Decimal,
    pub percentage_of_revenue: Decimal,
}

/// Aggregated figures for an inclusive range of months.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RangeSummary {
    pub start: Option<MonthKey>,
    pub end: Option<MonthKey>,
    pub total_revenue: Decimal,
    pub total_cogs: Decimal,
    pub total_payroll: Decimal,
    pub total_operating_expenses: Decimal,
    pub total_rent: Decimal,
    pub other_expenses: Decimal,
    pub total_expenses: Decimal,
    pub net_result: Decimal,
    pub margin_percent: Decimal,
    /// Months in the requested range, whether or not the store had data.
    pub month_count: usize,
    /// Months in the range that had a store entry.
    pub months_with_data: usize,
    /// Sum of monthly headcounts across the range.
    pub total_staff_count: u64,
    pub payment_type_totals: Vec<CategoryTotal>,
    /// Sorted descending by value.
    pub other_expense_category_totals: Vec<CategoryTotal>,
}

impl RangeSummary {
    pub fn cogs_percent(&self) -> Decimal {
        percentage_of(self.total_cogs, self.total_revenue)
    }

    pub fn payroll_percent(&self) -> Decimal {
        percentage_of(self.total_payroll, self.total_revenue)
    }

    pub fn rent_percent(&self) -> Decimal {
        percentage_of(self.total_rent, self.total_revenue)
    }

    pub fn other_expenses_percent(&self) -> Decimal {
        percentage_of(self.other_expenses, self.total_revenue)
    }

    /// Net result per month of the range; zero for an empty range.
    pub fn average_net_result(&self) -> Decimal {
        per_month(self.net_result, self.month_count)
    }

    /// Mean headcount over every month of the range.
    pub fn average_staff_count(&self) -> Decimal {
        per_month(Decimal::from(self.total_staff_count), self.month_count)
    }

    /// Monthly payroll divided by the mean headcount; zero without staff data.
    pub fn average_payroll_per_staff(&self) -> Decimal {
        let staff = self.average_staff_count();
        if staff <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        per_month(self.total_payroll, self.month_count) / staff
    }
}

fn per_month(value: Decimal, months: usize) -> Decimal {
    if months == 0 {
        return Decimal::ZERO;
    }
    value / Decimal::from(months as u64)
}

// ── MonthlyTrend ──────────────────────────────────────────────────────────────

/// One point of the month-by-month trend series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTrend {
    pub month: MonthKey,
    pub revenue: Decimal,
    pub expenses: Decimal,
    pub net_result: Decimal,
    pub cogs: Decimal,
    pub payroll: Decimal,
    pub rent: Decimal,
    pub other_expenses: Decimal,
    pub margin_percent: Decimal,
    pub cogs_percent: Decimal,
    pub payroll_percent: Decimal,
    pub rent_percent: Decimal,
    pub other_expenses_percent: Decimal,
    pub active_staff: u32,
    pub average_payroll_per_staff: Decimal,
}

impl MonthlyTrend {
    pub fn from_record(month: MonthKey, record: &MonthlyRecord) -> Self {
        let revenue = record.total_revenue;
        let rent = record.rent();
        let other_expenses = record.other_expenses();
        let active_staff = record.active_staff_count.unwrap_or(0);
        let average_payroll_per_staff = if active_staff > 0 {
            record.payroll / Decimal::from(active_staff)
        } else {
            Decimal::ZERO
        };

        Self {
            month,
            revenue,
            expenses: record.total_expenses(),
            net_result: record.net_result(),
            cogs: record.cogs,
            payroll: record.payroll,
            rent,
            other_expenses,
            margin_percent: percentage_of(record.net_result(), revenue),
            cogs_percent: percentage_of(record.cogs, revenue),
            payroll_percent: percentage_of(record.payroll, revenue),
            rent_percent: percentage_of(rent, revenue),
            other_expenses_percent: percentage_of(other_expenses, revenue),
            active_staff,
            average_payroll_per_staff,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
