//! Restaurant industry benchmarks and the insights derived from comparing a
//! [`RangeSummary`] against them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::formatting::{format_currency, format_percentage};
use crate::models::RangeSummary;

/// Monthly payroll per head above which staffing is flagged.
const PAYROLL_PER_STAFF_CEILING: i64 = 25_000;

// ── IndustryBenchmarks ────────────────────────────────────────────────────────

/// Typical cost lines as a percentage of revenue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndustryBenchmarks {
    pub cogs: Decimal,
    pub payroll: Decimal,
    pub rent: Decimal,
    pub other_expenses: Decimal,
    pub profit_margin: Decimal,
}

impl Default for IndustryBenchmarks {
    fn default() -> Self {
        Self {
            cogs: Decimal::from(28),
            payroll: Decimal::from(25),
            rent: Decimal::from(6),
            other_expenses: Decimal::from(15),
            profit_margin: Decimal::from(15),
        }
    }
}

// ── Insight ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

/// One finding from the benchmark comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub category: String,
    pub priority: Priority,
    pub issue: String,
    pub actions: Vec<String>,
    pub potential_impact: String,
}

impl Insight {
    fn new(category: &str, priority: Priority, issue: String, actions: &[&str], impact: String) -> Self {
        Self {
            category: category.to_string(),
            priority,
            issue,
            actions: actions.iter().map(|a| a.to_string()).collect(),
            potential_impact: impact,
        }
    }
}

/// Compare `summary` with `benchmarks` and list what stands out.
///
/// An empty range (zero revenue) still yields the profitability finding,
/// since a zero margin sits below any positive benchmark.
pub fn generate_insights(summary: &RangeSummary, benchmarks: &IndustryBenchmarks) -> Vec<Insight> {
    let mut insights = Vec::new();

    let cogs_pct = summary.cogs_percent();
    let payroll_pct = summary.payroll_percent();
    let rent_pct = summary.rent_percent();
    let margin = summary.margin_percent;
    let five = Decimal::from(5);

    if cogs_pct > benchmarks.cogs + five {
        insights.push(Insight::new(
            "Cost of Goods Sold",
            Priority::High,
            format!(
                "COGS at {} is significantly above industry benchmark of {}",
                format_percentage(cogs_pct),
                format_percentage(benchmarks.cogs)
            ),
            &[
                "Review supplier contracts and negotiate better pricing",
                "Implement portion control and reduce food waste",
                "Optimize menu engineering to focus on high-margin items",
                "Consider seasonal menu adjustments to reduce ingredient costs",
            ],
            format!(
                "Reducing COGS by 3% could save {}/month",
                format_currency(monthly_share(summary, Decimal::new(3, 2)))
            ),
        ));
    } else if cogs_pct < benchmarks.cogs - Decimal::from(3) {
        insights.push(Insight::new(
            "Cost of Goods Sold",
            Priority::Medium,
            format!(
                "COGS at {} is below industry benchmark, leaving room to improve quality",
                format_percentage(cogs_pct)
            ),
            &[
                "Consider upgrading ingredient quality to justify premium pricing",
                "Expand menu offerings with higher-quality options",
                "Invest in premium ingredients for signature dishes",
            ],
            "Quality improvements could support 5-10% price increases".to_string(),
        ));
    }

    if payroll_pct > benchmarks.payroll + five {
        insights.push(Insight::new(
            "Labor Costs",
            Priority::High,
            format!(
                "Payroll at {} is above industry benchmark of {}",
                format_percentage(payroll_pct),
                format_percentage(benchmarks.payroll)
            ),
            &[
                "Optimize staff scheduling based on peak hours analysis",
                "Cross-train employees to improve flexibility",
                "Implement productivity tracking and incentive programs",
                "Consider automation for repetitive tasks",
            ],
            format!(
                "Reducing payroll by 2% could save {}/month",
                format_currency(monthly_share(summary, Decimal::new(2, 2)))
            ),
        ));
    }

    if rent_pct > benchmarks.rent + Decimal::from(2) {
        insights.push(Insight::new(
            "Rent & Occupancy",
            Priority::Medium,
            format!(
                "Rent at {} is above industry benchmark of {}",
                format_percentage(rent_pct),
                format_percentage(benchmarks.rent)
            ),
            &[
                "Negotiate lease terms during renewal",
                "Consider revenue-sharing arrangements with landlord",
                "Maximize space utilization with extended hours or catering",
                "Evaluate relocation to lower-cost areas if lease expires",
            ],
            "Rent reduction could improve margins by 1-2%".to_string(),
        ));
    }

    if margin < benchmarks.profit_margin - five {
        let gap = benchmarks.profit_margin.saturating_sub(margin) / Decimal::ONE_HUNDRED;
        insights.push(Insight::new(
            "Overall Profitability",
            Priority::Critical,
            format!(
                "Profit margin at {} is below industry benchmark of {}",
                format_percentage(margin),
                format_percentage(benchmarks.profit_margin)
            ),
            &[
                "Implement comprehensive cost reduction program",
                "Review pricing strategy and consider selective increases",
                "Focus on high-margin menu items and upselling",
                "Improve operational efficiency across all areas",
            ],
            format!(
                "Reaching industry benchmark could add {}/month",
                format_currency(monthly_share(summary, gap))
            ),
        ));
    } else if margin > benchmarks.profit_margin + five {
        insights.push(Insight::new(
            "Growth Opportunities",
            Priority::Low,
            format!(
                "Strong profit margin at {} provides growth opportunities",
                format_percentage(margin)
            ),
            &[
                "Consider expansion to new locations",
                "Invest in marketing and customer acquisition",
                "Upgrade equipment and facilities for better customer experience",
                "Develop catering or delivery services",
            ],
            "Strong margins support strategic investments for growth".to_string(),
        ));
    }

    let per_staff = summary.average_payroll_per_staff();
    if per_staff > Decimal::from(PAYROLL_PER_STAFF_CEILING) {
        insights.push(Insight::new(
            "Staff Efficiency",
            Priority::Medium,
            format!(
                "Average payroll per staff at {}/month is high",
                format_currency(per_staff)
            ),
            &[
                "Review staff productivity and performance metrics",
                "Optimize scheduling to match demand patterns",
                "Implement performance-based compensation",
                "Consider part-time vs full-time staff mix optimization",
            ],
            "Improved efficiency could reduce per-staff costs by 10-15%".to_string(),
        ));
    }

    insights
}

/// `revenue * fraction`, spread over the months of the range.
fn monthly_share(summary: &RangeSummary, fraction: Decimal) -> Decimal {
    if summary.month_count == 0 {
        return Decimal::ZERO;
    }
    summary
        .total_revenue
        .saturating_mul(fraction)
        / Decimal::from(summary.month_count as u64)
}
