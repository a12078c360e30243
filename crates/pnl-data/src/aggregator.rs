//! Range aggregation over the financial store.
//!
//! Sums a contiguous run of months into a [`RangeSummary`] and produces the
//! month-by-month trend series.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use pnl_core::calculations::percentage_of;
use pnl_core::error::{PnlError, Result};
use pnl_core::models::{CategoryTotal, MonthKey, MonthlyTrend, RangeSummary, RENT_EXPENSE_KEY};

use crate::store::FinancialStore;

// ── RangeAggregator ───────────────────────────────────────────────────────────

/// Stateless helper that summarises month ranges of a [`FinancialStore`].
pub struct RangeAggregator;

impl RangeAggregator {
    /// Aggregate `store` over `start..=end`, where positions are taken from
    /// `months`.
    ///
    /// `months` must be strictly chronological and contain both endpoints,
    /// with `start` not after `end`; otherwise [`PnlError::InvalidRange`].
    /// Months of the range with no store entry count towards `month_count`
    /// but add nothing to the totals.
    pub fn aggregate(
        store: &FinancialStore,
        months: &[MonthKey],
        start: MonthKey,
        end: MonthKey,
    ) -> Result<RangeSummary> {
        if months.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PnlError::invalid_range(
                start,
                end,
                "month list is not strictly chronological",
            ));
        }

        let position = |month: MonthKey| {
            months.iter().position(|m| *m == month).ok_or_else(|| {
                PnlError::invalid_range(start, end, format!("{month} is not a known month"))
            })
        };
        let start_index = position(start)?;
        let end_index = position(end)?;
        if start_index > end_index {
            return Err(PnlError::invalid_range(start, end, "start is after end"));
        }

        let summary = Self::summarize(store, &months[start_index..=end_index], start, end);
        debug!(
            "Aggregated {} to {}: {} months ({} with data), revenue {}, net {}",
            start,
            end,
            summary.month_count,
            summary.months_with_data,
            summary.total_revenue,
            summary.net_result
        );
        Ok(summary)
    }

    /// Aggregate every calendar month from `start` to `end`.
    pub fn aggregate_calendar(
        store: &FinancialStore,
        start: MonthKey,
        end: MonthKey,
    ) -> Result<RangeSummary> {
        if start > end {
            return Err(PnlError::invalid_range(start, end, "start is after end"));
        }
        Self::aggregate(store, &MonthKey::span(start, end), start, end)
    }

    /// Aggregate using string month keys such as `"July 2024"` or `"2024-07"`.
    ///
    /// The keys are parsed and put in chronological order first; any key that
    /// does not parse fails with [`PnlError::InvalidMonthKey`].
    pub fn aggregate_keys(
        store: &FinancialStore,
        months: &[&str],
        start: &str,
        end: &str,
    ) -> Result<RangeSummary> {
        let mut parsed = months
            .iter()
            .map(|m| m.parse::<MonthKey>())
            .collect::<Result<Vec<_>>>()?;
        parsed.sort();
        parsed.dedup();
        Self::aggregate(store, &parsed, start.parse()?, end.parse()?)
    }

    /// Per-month trend points for `months`, skipping months without a record.
    pub fn monthly_trends(store: &FinancialStore, months: &[MonthKey]) -> Vec<MonthlyTrend> {
        months
            .iter()
            .filter_map(|m| store.get(m).map(|r| MonthlyTrend::from_record(*m, r)))
            .collect()
    }

    fn summarize(
        store: &FinancialStore,
        months: &[MonthKey],
        start: MonthKey,
        end: MonthKey,
    ) -> RangeSummary {
        let mut summary = RangeSummary {
            start: Some(start),
            end: Some(end),
            month_count: months.len(),
            ..Default::default()
        };
        let mut payment_types: BTreeMap<&str, Decimal> = BTreeMap::new();
        let mut other_categories: BTreeMap<&str, Decimal> = BTreeMap::new();

        for record in months.iter().filter_map(|m| store.get(m)) {
            summary.months_with_data += 1;
            add(&mut summary.total_revenue, record.total_revenue);
            add(&mut summary.total_cogs, record.cogs);
            add(&mut summary.total_payroll, record.payroll);
            add(&mut summary.total_operating_expenses, record.operating_expenses);
            add(&mut summary.total_rent, record.rent());
            summary.total_staff_count += u64::from(record.active_staff_count.unwrap_or(0));

            for (label, value) in &record.payment_type_breakdown {
                add(payment_types.entry(label.as_str()).or_default(), *value);
            }
            for (label, value) in &record.operating_expense_detail {
                if label != RENT_EXPENSE_KEY {
                    add(other_categories.entry(label.as_str()).or_default(), *value);
                }
            }
        }

        summary.other_expenses = summary
            .total_operating_expenses
            .saturating_sub(summary.total_rent);
        summary.total_expenses = summary
            .total_cogs
            .saturating_add(summary.total_payroll)
            .saturating_add(summary.total_operating_expenses);
        summary.net_result = summary.total_revenue.saturating_sub(summary.total_expenses);
        summary.margin_percent = percentage_of(summary.net_result, summary.total_revenue);
        summary.payment_type_totals = category_totals(payment_types, summary.total_revenue);
        summary.other_expense_category_totals =
            category_totals(other_categories, summary.total_revenue);

        summary
    }
}

/// Saturating `+=`; range totals pin at the `Decimal` bounds.
fn add(sum: &mut Decimal, value: Decimal) {
    *sum = sum.saturating_add(value);
}

/// Largest value first; equal values by label.
fn category_totals(values: BTreeMap<&str, Decimal>, revenue: Decimal) -> Vec<CategoryTotal> {
    let mut totals: Vec<CategoryTotal> = values
        .into_iter()
        .map(|(label, value)| CategoryTotal {
            label: label.to_string(),
            value,
            percentage_of_revenue: percentage_of(value, revenue),
        })
        .collect();
    totals.sort_by(|a, b| match b.value.cmp(&a.value) {
        Ordering::Equal => a.label.cmp(&b.label),
        other => other,
    });
    totals
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pnl_core::models::MonthlyRecord;
    use rust_decimal_macros::dec;

    fn key(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    fn record(revenue: Decimal, cogs: Decimal, payroll: Decimal, detail: &[(&str, Decimal)]) -> MonthlyRecord {
        let operating_expense_detail: BTreeMap<String, Decimal> =
            detail.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        MonthlyRecord {
            total_revenue: revenue,
            cogs,
            payroll,
            operating_expenses: operating_expense_detail.values().copied().sum(),
            operating_expense_detail,
            payment_type_breakdown: BTreeMap::from([
                ("Cash".to_string(), revenue / dec!(4)),
                ("Card".to_string(), revenue * dec!(3) / dec!(4)),
            ]),
            active_staff_count: Some(10),
        }
    }

    fn sample_store() -> FinancialStore {
        FinancialStore::from_records([
            (
                key("2024-07"),
                record(
                    dec!(20000),
                    dec!(6000),
                    dec!(5000),
                    &[(RENT_EXPENSE_KEY, dec!(2000)), ("Utilities", dec!(800))],
                ),
            ),
            (
                key("2024-09"),
                record(
                    dec!(10000),
                    dec!(3000),
                    dec!(4000),
                    &[(RENT_EXPENSE_KEY, dec!(2000)), ("Marketing", dec!(1200))],
                ),
            ),
        ])
    }

    // ── aggregate ─────────────────────────────────────────────────────────────

    #[test]
    fn test_aggregate_single_month_identity() {
        let store = sample_store();
        let july = key("2024-07");
        let summary = RangeAggregator::aggregate(&store, &store.months(), july, july).unwrap();
        let r = store.get(&july).unwrap();

        assert_eq!(summary.total_revenue, r.total_revenue);
        assert_eq!(summary.total_cogs, r.cogs);
        assert_eq!(summary.total_payroll, r.payroll);
        assert_eq!(summary.total_operating_expenses, r.operating_expenses);
        assert_eq!(summary.total_rent, dec!(2000));
        assert_eq!(summary.other_expenses, r.operating_expenses - r.rent());
        assert_eq!(summary.total_expenses, r.cogs + r.payroll + r.operating_expenses);
        assert_eq!(summary.net_result, r.total_revenue - summary.total_expenses);
        assert_eq!(summary.margin_percent, dec!(31));
        assert_eq!(summary.month_count, 1);
        assert_eq!(summary.months_with_data, 1);
    }

    #[test]
    fn test_aggregate_all_months_absent() {
        let store = FinancialStore::new();
        let months = MonthKey::span(key("2024-01"), key("2024-03"));
        let summary =
            RangeAggregator::aggregate(&store, &months, key("2024-01"), key("2024-03")).unwrap();

        assert_eq!(summary.month_count, 3);
        assert_eq!(summary.months_with_data, 0);
        assert_eq!(summary.total_revenue, Decimal::ZERO);
        assert_eq!(summary.total_expenses, Decimal::ZERO);
        assert_eq!(summary.net_result, Decimal::ZERO);
        assert_eq!(summary.margin_percent, Decimal::ZERO);
        assert!(summary.payment_type_totals.is_empty());
        assert!(summary.other_expense_category_totals.is_empty());
    }

    #[test]
    fn test_aggregate_sparse_range_zero_fills() {
        let store = sample_store();
        let summary =
            RangeAggregator::aggregate_calendar(&store, key("2024-07"), key("2024-09")).unwrap();

        assert_eq!(summary.month_count, 3);
        assert_eq!(summary.months_with_data, 2);
        assert_eq!(summary.total_revenue, dec!(30000));
        assert_eq!(summary.total_rent, dec!(4000));
        assert_eq!(summary.total_operating_expenses, dec!(6000));
        assert_eq!(summary.other_expenses, dec!(2000));
        assert_eq!(summary.total_expenses, dec!(24000));
        assert_eq!(summary.net_result, dec!(6000));
        assert_eq!(summary.margin_percent, dec!(20));
        assert_eq!(summary.total_staff_count, 20);
        assert_eq!(summary.average_net_result(), dec!(2000));
    }

    #[test]
    fn test_aggregate_category_totals() {
        let store = sample_store();
        let summary =
            RangeAggregator::aggregate_calendar(&store, key("2024-07"), key("2024-09")).unwrap();

        let other: Vec<(&str, Decimal)> = summary
            .other_expense_category_totals
            .iter()
            .map(|c| (c.label.as_str(), c.value))
            .collect();
        assert_eq!(other, vec![("Marketing", dec!(1200)), ("Utilities", dec!(800))]);
        assert_eq!(summary.other_expense_category_totals[0].percentage_of_revenue, dec!(4));

        let payments: Vec<&str> = summary
            .payment_type_totals
            .iter()
            .map(|c| c.label.as_str())
            .collect();
        assert_eq!(payments, vec!["Card", "Cash"]);
        assert_eq!(summary.payment_type_totals[1].value, dec!(7500));
        assert_eq!(summary.payment_type_totals[0].percentage_of_revenue, dec!(75));
    }

    #[test]
    fn test_category_totals_ties_sorted_by_label() {
        let values = BTreeMap::from([("Water", dec!(50)), ("Gas", dec!(50)), ("Laundry", dec!(70))]);
        let labels: Vec<String> = category_totals(values, Decimal::ZERO)
            .into_iter()
            .map(|c| {
                assert_eq!(c.percentage_of_revenue, Decimal::ZERO);
                c.label
            })
            .collect();
        assert_eq!(labels, vec!["Laundry", "Gas", "Water"]);
    }

    #[test]
    fn test_aggregate_unknown_endpoint_is_invalid_range() {
        let store = sample_store();
        let months = store.months();
        let err =
            RangeAggregator::aggregate(&store, &months, key("2024-08"), key("2024-09")).unwrap_err();
        assert!(matches!(err, PnlError::InvalidRange { .. }));
        assert!(err.to_string().contains("August 2024 is not a known month"));

        let err =
            RangeAggregator::aggregate(&store, &months, key("2024-07"), key("2025-01")).unwrap_err();
        assert!(matches!(err, PnlError::InvalidRange { .. }));
    }

    #[test]
    fn test_aggregate_reversed_range_is_invalid() {
        let store = sample_store();
        let err = RangeAggregator::aggregate(&store, &store.months(), key("2024-09"), key("2024-07"))
            .unwrap_err();
        assert!(err.to_string().contains("start is after end"));

        let err =
            RangeAggregator::aggregate_calendar(&store, key("2024-09"), key("2024-07")).unwrap_err();
        assert!(matches!(err, PnlError::InvalidRange { .. }));
    }

    #[test]
    fn test_aggregate_rejects_unordered_month_list() {
        let store = sample_store();
        let months = vec![key("2024-09"), key("2024-07")];
        let err =
            RangeAggregator::aggregate(&store, &months, key("2024-07"), key("2024-07")).unwrap_err();
        assert!(matches!(err, PnlError::InvalidRange { .. }));
    }

    #[test]
    fn test_aggregate_keys_sorts_and_validates() {
        let store = sample_store();
        let summary = RangeAggregator::aggregate_keys(
            &store,
            &["September 2024", "July 2024", "2024-07"],
            "Jul 2024",
            "2024-09",
        )
        .unwrap();
        // Positions come from the key list, so the gap month is not counted.
        assert_eq!(summary.month_count, 2);
        assert_eq!(summary.total_revenue, dec!(30000));

        let err = RangeAggregator::aggregate_keys(&store, &["July 2024", "Current Month"], "July 2024", "July 2024")
            .unwrap_err();
        assert!(matches!(err, PnlError::InvalidMonthKey(_)));
    }

    #[test]
    fn test_aggregate_saturates_extreme_totals() {
        let huge = MonthlyRecord {
            total_revenue: Decimal::MAX,
            cogs: Decimal::MAX,
            payment_type_breakdown: BTreeMap::from([("Cash".to_string(), Decimal::MAX)]),
            ..Default::default()
        };
        let store = FinancialStore::from_records([
            (key("2024-07"), huge.clone()),
            (key("2024-08"), huge),
        ]);

        let summary =
            RangeAggregator::aggregate_calendar(&store, key("2024-07"), key("2024-08")).unwrap();
        assert_eq!(summary.total_revenue, Decimal::MAX);
        assert_eq!(summary.total_expenses, Decimal::MAX);
        assert_eq!(summary.net_result, Decimal::ZERO);
        assert_eq!(summary.payment_type_totals[0].value, Decimal::MAX);
        assert_eq!(summary.payment_type_totals[0].percentage_of_revenue, dec!(100));
    }

    // ── monthly_trends ────────────────────────────────────────────────────────

    #[test]
    fn test_monthly_trends_skip_absent_months() {
        let store = sample_store();
        let months = MonthKey::span(key("2024-07"), key("2024-09"));
        let trends = RangeAggregator::monthly_trends(&store, &months);

        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].month, key("2024-07"));
        assert_eq!(trends[1].month, key("2024-09"));
        assert_eq!(trends[1].net_result, dec!(-200));
        assert_eq!(trends[1].rent_percent, dec!(20));
        assert_eq!(trends[1].average_payroll_per_staff, dec!(400));
    }
}
