//! # Report Arithmetic
//!
//! Date ranges, calendar-month windows and rate computations shared by every
//! report. Aggregation over stored rows happens in the API crate.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;

/// Days covered by the default report range, counting back from today.
pub const DEFAULT_RANGE_DAYS: i64 = 30;

/// Days covered by the analytics dashboards, counting back from today.
pub const ANALYTICS_RANGE_DAYS: i64 = 365;

/// Calendar months in the analytics collection trend.
pub const ANALYTICS_TREND_MONTHS: usize = 12;

/// Flat monthly revenue target used by the revenue report.
pub fn monthly_revenue_target() -> Money {
    Money::from_major(1_000_000)
}

/// The reports the aggregator can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// Payments collected per tax type.
    TaxCollection,
    /// Filing and payment compliance rates.
    Compliance,
    /// Registrations by type and status.
    Registration,
    /// Audit activity and outcomes.
    Audit,
    /// Refund requests and approvals.
    Refund,
    /// Revenue against the monthly target.
    Revenue,
}

impl ReportKind {
    /// Every report kind.
    pub const ALL: &'static [ReportKind] = &[
        Self::TaxCollection,
        Self::Compliance,
        Self::Registration,
        Self::Audit,
        Self::Refund,
        Self::Revenue,
    ];

    /// Identifier used in query strings.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaxCollection => "tax_collection",
            Self::Compliance => "compliance",
            Self::Registration => "registration",
            Self::Audit => "audit",
            Self::Refund => "refund",
            Self::Revenue => "revenue",
        }
    }

    /// Human title of the report.
    pub fn title(&self) -> &'static str {
        match self {
            Self::TaxCollection => "Tax Collection Report",
            Self::Compliance => "Compliance Report",
            Self::Registration => "Registration Report",
            Self::Audit => "Audit Report",
            Self::Refund => "Refund Report",
            Self::Revenue => "Revenue Report",
        }
    }

    /// One-line description for the report catalogue.
    pub fn description(&self) -> &'static str {
        match self {
            Self::TaxCollection => "Tax collection by type and period",
            Self::Compliance => "Taxpayer compliance rates and trends",
            Self::Registration => "Taxpayer registrations by type and status",
            Self::Audit => "Audit activities, findings, and outcomes",
            Self::Refund => "Refund requests, approvals, and payments",
            Self::Revenue => "Overall revenue collection and trends",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| ValidationError::UnknownLabel {
                kind: "report type",
                value: s.to_string(),
            })
    }
}

// ── Date ranges ─────────────────────────────────────────────────────────────

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    /// First day included.
    pub start: NaiveDate,
    /// Last day included.
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range; `start` after `end` is rejected.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if start > end {
            return Err(ValidationError::InvertedRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(Self { start, end })
    }

    /// The default range: the thirty days ending `today`.
    pub fn last_30_days(today: NaiveDate) -> Self {
        Self {
            start: today - Duration::days(DEFAULT_RANGE_DAYS),
            end: today,
        }
    }

    /// The year ending `today`, used by the analytics dashboards.
    pub fn last_year(today: NaiveDate) -> Self {
        Self {
            start: today - Duration::days(ANALYTICS_RANGE_DAYS),
            end: today,
        }
    }

    /// Resolve optional bounds against the default range.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let default = Self::last_30_days(today);
        Self::new(start.unwrap_or(default.start), end.unwrap_or(default.end))
    }

    /// Whether the day falls inside the range.
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// `"YYYY-MM-DD to YYYY-MM-DD"`.
    pub fn label(&self) -> String {
        format!(
            "{} to {}",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }

    /// Calendar months touched by the range, in order. Each window spans
    /// its whole month, even when the range starts or ends mid-month.
    pub fn months(&self) -> Vec<MonthWindow> {
        let mut out = Vec::new();
        let mut cursor = first_of_month(self.start);
        while cursor <= self.end {
            let window = MonthWindow::containing(cursor);
            cursor = window.end + Duration::days(1);
            out.push(window);
        }
        out
    }
}

fn first_of_month(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

/// One calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthWindow {
    /// First day of the month.
    pub start: NaiveDate,
    /// Last day of the month.
    pub end: NaiveDate,
    /// Label such as `Jan 2025`.
    pub label: String,
}

impl MonthWindow {
    /// The month containing `day`.
    pub fn containing(day: NaiveDate) -> Self {
        let start = first_of_month(day);
        let next = if start.month() == 12 {
            NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
        };
        let end = next.map(|n| n - Duration::days(1)).unwrap_or(start);
        Self {
            start,
            end,
            label: start.format("%b %Y").to_string(),
        }
    }

    /// The `count` months ending with the month of `day`, oldest first.
    pub fn trailing(day: NaiveDate, count: usize) -> Vec<Self> {
        let mut out = Vec::with_capacity(count);
        let mut cursor = day;
        for _ in 0..count {
            let window = Self::containing(cursor);
            cursor = window.start - Duration::days(1);
            out.push(window);
        }
        out.reverse();
        out
    }

    /// Whether the day falls in this month.
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

// ── Rates ───────────────────────────────────────────────────────────────────

/// `numerator / denominator * 100`, rounded to two places; zero when the
/// denominator is zero.
pub fn rate(numerator: u64, denominator: u64) -> Decimal {
    if denominator == 0 {
        return two_places(Decimal::ZERO);
    }
    let value = Decimal::from(numerator) * Decimal::ONE_HUNDRED / Decimal::from(denominator);
    two_places(value)
}

fn two_places(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Actual revenue against a target for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetComparison {
    /// Month label.
    pub month: String,
    /// Target amount.
    pub target: Money,
    /// Collected amount.
    pub actual: Money,
    /// `actual - target`.
    pub variance: Money,
    /// `actual / target * 100`, two places.
    pub achievement: Decimal,
}

impl TargetComparison {
    /// Compare one month's collections with `target`.
    pub fn new(month: impl Into<String>, target: Money, actual: Money) -> Self {
        let achievement = if target.is_zero() {
            two_places(Decimal::ZERO)
        } else {
            two_places(actual.as_decimal() * Decimal::ONE_HUNDRED / target.as_decimal())
        };
        Self {
            month: month.into(),
            target,
            actual,
            variance: actual - target,
            achievement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn report_kind_parses_identifiers() {
        for kind in ReportKind::ALL {
            assert_eq!(kind.as_str().parse::<ReportKind>().unwrap(), *kind);
        }
        assert!("payroll".parse::<ReportKind>().is_err());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = DateRange::new(d(2025, 3, 2), d(2025, 3, 1)).unwrap_err();
        assert!(matches!(err, ValidationError::InvertedRange { .. }));
        assert!(DateRange::new(d(2025, 3, 1), d(2025, 3, 1)).is_ok());
    }

    #[test]
    fn default_range_is_thirty_days() {
        let r = DateRange::resolve(None, None, d(2025, 3, 31)).unwrap();
        assert_eq!(r.start, d(2025, 3, 1));
        assert_eq!(r.end, d(2025, 3, 31));
        assert_eq!(r.label(), "2025-03-01 to 2025-03-31");
    }

    #[test]
    fn months_cover_whole_calendar_months_across_year_end() {
        let r = DateRange::new(d(2024, 11, 15), d(2025, 2, 3)).unwrap();
        let months = r.months();
        let labels: Vec<&str> = months.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["Nov 2024", "Dec 2024", "Jan 2025", "Feb 2025"]);
        assert_eq!(months[0].start, d(2024, 11, 1));
        assert_eq!(months[1].end, d(2024, 12, 31));
        assert_eq!(months[3].end, d(2025, 2, 28));
    }

    #[test]
    fn trailing_months_end_with_current_month() {
        let months = MonthWindow::trailing(d(2025, 2, 10), ANALYTICS_TREND_MONTHS);
        assert_eq!(months.len(), 12);
        assert_eq!(months[0].label, "Mar 2024");
        assert_eq!(months[11].label, "Feb 2025");
        assert!(months.windows(2).all(|w| w[0].end + Duration::days(1) == w[1].start));
    }

    #[test]
    fn leap_february() {
        let w = MonthWindow::containing(d(2024, 2, 10));
        assert_eq!(w.end, d(2024, 2, 29));
        assert!(w.contains(d(2024, 2, 29)));
        assert!(!w.contains(d(2024, 3, 1)));
    }

    #[test]
    fn rate_rounds_and_handles_zero() {
        assert_eq!(rate(0, 0), Decimal::ZERO);
        assert_eq!(rate(4, 4).to_string(), "100.00");
        assert_eq!(rate(1, 3).to_string(), "33.33");
        assert_eq!(rate(2, 3).to_string(), "66.67");
        assert_eq!(rate(4, 4), Decimal::ONE_HUNDRED);
    }

    #[test]
    fn target_comparison() {
        let c = TargetComparison::new("Jan 2025", monthly_revenue_target(), Money::from_major(250_000));
        assert_eq!(c.variance, Money::from_major(-750_000));
        assert_eq!(c.achievement.to_string(), "25.00");
    }
}
