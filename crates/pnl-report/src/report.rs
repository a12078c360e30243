//! Text and JSON rendering of a range summary.

use std::fmt::Write as _;

use pnl_core::benchmarks::Insight;
use pnl_core::calculations::percentage_of;
use pnl_core::formatting::{format_amount, format_currency, format_percentage};
use pnl_core::models::{CategoryTotal, MonthlyTrend, RangeSummary};
use rust_decimal::Decimal;
use serde_json::json;

/// Everything one run prints.
#[derive(Debug, Default)]
pub struct Report {
    pub summary: RangeSummary,
    pub insights: Vec<Insight>,
    pub trends: Vec<MonthlyTrend>,
    /// Ingestion problems worth showing next to the figures.
    pub warnings: Vec<String>,
}

impl Report {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "summary": self.summary,
            "insights": self.insights,
            "trends": self.trends,
            "warnings": self.warnings,
        })
    }

    pub fn to_text(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();

        let period = match (s.start, s.end) {
            (Some(start), Some(end)) if start == end => start.to_string(),
            (Some(start), Some(end)) => format!("{start} to {end}"),
            _ => "no months".to_string(),
        };
        let months = if s.month_count == 1 { "month" } else { "months" };
        let _ = writeln!(
            out,
            "Profit & Loss: {period} ({} {months}, {} with data)\n",
            s.month_count, s.months_with_data
        );

        line(&mut out, "Revenue", s.total_revenue, None);
        line(&mut out, "Cost of Goods Sold", s.total_cogs, Some(s.cogs_percent()));
        line(&mut out, "Payroll", s.total_payroll, Some(s.payroll_percent()));
        line(&mut out, "Rent", s.total_rent, Some(s.rent_percent()));
        line(
            &mut out,
            "Other Expenses",
            s.other_expenses,
            Some(s.other_expenses_percent()),
        );
        line(
            &mut out,
            "Total Expenses",
            s.total_expenses,
            Some(percentage_of(s.total_expenses, s.total_revenue)),
        );
        line(&mut out, "Net Result", s.net_result, Some(s.margin_percent));

        let _ = writeln!(
            out,
            "\nPer month: net {}, staff {}, payroll per staff {}",
            format_currency(s.average_net_result()),
            format_amount(s.average_staff_count(), 1),
            format_currency(s.average_payroll_per_staff())
        );

        categories(&mut out, "Payment types", &s.payment_type_totals);
        categories(&mut out, "Other expense categories", &s.other_expense_category_totals);

        if !self.trends.is_empty() {
            let _ = writeln!(
                out,
                "\n{:<16}{:>14}{:>14}{:>14}{:>9}{:>9}{:>9}",
                "Month", "Revenue", "Expenses", "Net", "Margin", "COGS", "Payroll"
            );
            for t in &self.trends {
                let _ = writeln!(
                    out,
                    "{:<16}{:>14}{:>14}{:>14}{:>9}{:>9}{:>9}",
                    t.month.to_string(),
                    format_currency(t.revenue),
                    format_currency(t.expenses),
                    format_currency(t.net_result),
                    format_percentage(t.margin_percent),
                    format_percentage(t.cogs_percent),
                    format_percentage(t.payroll_percent)
                );
            }
        }

        if !self.insights.is_empty() {
            let _ = writeln!(out, "\nInsights");
            for insight in &self.insights {
                let _ = writeln!(
                    out,
                    "  [{:?}] {}: {}",
                    insight.priority, insight.category, insight.issue
                );
                for action in &insight.actions {
                    let _ = writeln!(out, "    - {action}");
                }
                let _ = writeln!(out, "    {}", insight.potential_impact);
            }
        }

        if !self.warnings.is_empty() {
            let _ = writeln!(out, "\nWarnings");
            for w in &self.warnings {
                let _ = writeln!(out, "  {w}");
            }
        }

        out
    }
}

fn line(out: &mut String, label: &str, value: Decimal, percent: Option<Decimal>) {
    let pct = percent.map(format_percentage).unwrap_or_default();
    let _ = writeln!(out, "{:<24}{:>16}{:>9}", label, format_currency(value), pct);
}

fn categories(out: &mut String, title: &str, totals: &[CategoryTotal]) {
    if totals.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{title}");
    for c in totals {
        let _ = writeln!(
            out,
            "  {:<22}{:>16}{:>9}",
            c.label,
            format_currency(c.value),
            format_percentage(c.percentage_of_revenue)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pnl_core::benchmarks::{generate_insights, IndustryBenchmarks};
    use pnl_core::models::{MonthKey, MonthlyRecord};

    fn summary() -> RangeSummary {
        let july: MonthKey = "2024-07".parse().unwrap();
        RangeSummary {
            start: Some(july),
            end: Some(july),
            total_revenue: Decimal::new(20000, 0),
            total_cogs: Decimal::new(6000, 0),
            total_payroll: Decimal::new(5000, 0),
            total_operating_expenses: Decimal::new(2800, 0),
            total_rent: Decimal::new(2000, 0),
            other_expenses: Decimal::new(800, 0),
            total_expenses: Decimal::new(13800, 0),
            net_result: Decimal::new(6200, 0),
            margin_percent: Decimal::new(31, 0),
            month_count: 1,
            months_with_data: 1,
            other_expense_category_totals: vec![CategoryTotal {
                label: "Utilities".to_string(),
                value: Decimal::new(800, 0),
                percentage_of_revenue: Decimal::new(4, 0),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_text_report_lists_totals() {
        let report = Report {
            summary: summary(),
            ..Default::default()
        };
        let text = report.to_text();
        assert!(text.starts_with("Profit & Loss: July 2024 (1 month, 1 with data)"));
        assert!(text.contains("$20,000"));
        assert!(text.contains("Net Result"));
        assert!(text.contains("31.0%"));
        assert!(text.contains("Other expense categories"));
        assert!(!text.contains("Payment types"));
        assert!(!text.contains("Warnings"));
    }

    #[test]
    fn test_text_report_optional_sections() {
        let s = summary();
        let july: MonthKey = "2024-07".parse().unwrap();
        let record = MonthlyRecord {
            total_revenue: s.total_revenue,
            ..Default::default()
        };
        let report = Report {
            insights: generate_insights(&s, &IndustryBenchmarks::default()),
            trends: vec![MonthlyTrend::from_record(july, &record)],
            warnings: vec!["pl.xlsx: Missing header: no date range".to_string()],
            summary: s,
        };
        let text = report.to_text();
        assert!(text.contains("Insights"));
        assert!(text.contains("Growth Opportunities"));
        assert!(text.contains("Month"));
        assert!(text.contains("Warnings"));
        assert!(text.contains("pl.xlsx"));
    }

    #[test]
    fn test_text_report_plural_months() {
        let mut s = summary();
        s.end = Some("2024-09".parse().unwrap());
        s.month_count = 3;
        let report = Report {
            summary: s,
            ..Default::default()
        };
        assert!(report
            .to_text()
            .starts_with("Profit & Loss: July 2024 to September 2024 (3 months, 1 with data)"));
    }

    #[test]
    fn test_json_report_shape() {
        let report = Report {
            summary: summary(),
            ..Default::default()
        };
        let value = report.to_json();
        assert_eq!(value["summary"]["start"], "July 2024");
        assert_eq!(value["summary"]["month_count"], 1);
        assert_eq!(value["summary"]["other_expense_category_totals"][0]["label"], "Utilities");
        assert!(value["insights"].as_array().unwrap().is_empty());
    }
}
