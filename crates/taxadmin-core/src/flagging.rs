//! # Auto-Flag Rules
//!
//! Compliance heuristics evaluated once when a return is filed, before it is
//! stored. A flag never blocks filing; it only annotates the return for
//! officers. Rules run in a fixed order and every triggered reason is kept,
//! joined with `"; "`.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::money::Money;

/// Separator between triggered reasons.
pub const REASON_SEPARATOR: &str = "; ";

/// Refunds above this share of the due amount are suspicious.
pub fn refund_ratio_threshold() -> Decimal {
    Decimal::new(8, 1)
}

/// Everything the rules look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagInput {
    /// Due amount declared on the return.
    pub due_amount: Money,
    /// Date the return is being filed.
    pub filing_date: NaiveDate,
    /// Due date of the return's tax period, when known.
    pub period_due_date: Option<NaiveDate>,
    /// Amount of the most recent refund request for the same account.
    pub latest_refund: Option<Money>,
}

/// Result of the rule check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlagOutcome {
    /// Whether any rule fired.
    pub is_flagged: bool,
    /// Triggered reasons, or `None` when the flag is cleared.
    pub reason: Option<String>,
}

type Rule = fn(&FlagInput) -> Option<String>;

fn non_positive_due(input: &FlagInput) -> Option<String> {
    (!input.due_amount.is_positive()).then(|| "Due amount is zero or negative.".to_string())
}

fn excessive_recent_refund(input: &FlagInput) -> Option<String> {
    let refund = input.latest_refund?;
    if input.due_amount.is_zero() || refund.is_zero() {
        return None;
    }
    let threshold = input.due_amount.as_decimal() * refund_ratio_threshold();
    (refund.as_decimal() > threshold).then(|| {
        format!(
            "Recent refund ({refund}) exceeds 80% of due amount ({}).",
            input.due_amount
        )
    })
}

fn filed_late(input: &FlagInput) -> Option<String> {
    let due = input.period_due_date?;
    (input.filing_date > due).then(|| "Return filed after due date.".to_string())
}

const RULES: &[Rule] = &[non_positive_due, excessive_recent_refund, filed_late];

/// Run every rule in order.
pub fn evaluate(input: &FlagInput) -> FlagOutcome {
    let reasons: Vec<String> = RULES.iter().filter_map(|rule| rule(input)).collect();
    if reasons.is_empty() {
        FlagOutcome::default()
    } else {
        FlagOutcome {
            is_flagged: true,
            reason: Some(reasons.join(REASON_SEPARATOR)),
        }
    }
}
