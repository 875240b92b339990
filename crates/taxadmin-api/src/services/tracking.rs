//! Reference number tracking.
//!
//! Looks a reference up in returns, then payments, then refunds, then
//! service requests, and reports the first hit. Records outside the
//! caller's accounts are treated as not found.

use chrono::{DateTime, Utc};
use serde::Serialize;
use taxadmin_core::Money;
use utoipa::ToSchema;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::state::AppState;

use super::{in_scope, visible_accounts};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TrackingResult {
    /// `Tax Return`, `Payment`, `Refund` or `Request`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub reference: String,
    pub status: String,
    pub date: Option<DateTime<Utc>>,
    pub details: String,
    #[schema(value_type = Option<String>)]
    pub amount: Option<Money>,
}

fn account_number(state: &AppState, account_id: uuid::Uuid) -> String {
    state
        .accounts
        .get(&account_id)
        .map(|a| a.account_number)
        .unwrap_or_default()
}

pub fn track(state: &AppState, caller: &CallerIdentity, reference: &str) -> Result<TrackingResult, AppError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(AppError::Validation("reference is required".into()));
    }
    let _snapshot = state.snapshot();
    let scope = visible_accounts(state, caller);

    if let Some(r) = state
        .tax_returns
        .find(|r| r.reference_number == reference && in_scope(&scope, r.account_id))
    {
        let tax_type = state.tax_types.get(&r.tax_type_id).map(|t| t.name).unwrap_or_default();
        let period = state
            .tax_periods
            .get(&r.tax_period_id)
            .map(|p| p.period_code)
            .unwrap_or_default();
        return Ok(TrackingResult {
            kind: "Tax Return",
            reference: r.reference_number,
            status: r.status.to_string(),
            date: r.filing_date,
            details: format!("{tax_type} for period {period}"),
            amount: Some(r.due_amount),
        });
    }

    if let Some(p) = state
        .payments
        .find(|p| p.reference_number == reference && in_scope(&scope, p.account_id))
    {
        let return_ref = state
            .tax_returns
            .get(&p.tax_return_id)
            .map(|r| r.reference_number)
            .unwrap_or_default();
        return Ok(TrackingResult {
            kind: "Payment",
            reference: p.reference_number,
            status: p.status.to_string(),
            date: Some(p.payment_date),
            details: format!("Payment for {return_ref}"),
            amount: Some(p.amount),
        });
    }

    if let Some(r) = state
        .refunds
        .find(|r| r.reference_number == reference && in_scope(&scope, r.account_id))
    {
        return Ok(TrackingResult {
            kind: "Refund",
            details: format!("Refund for account {}", account_number(state, r.account_id)),
            reference: r.reference_number,
            status: r.status.to_string(),
            date: Some(r.request_date),
            amount: Some(r.amount),
        });
    }

    if let Some(r) = state.requests.find(|r| {
        r.reference_number == reference
            && match r.account_id {
                Some(account_id) => in_scope(&scope, account_id),
                None => scope.is_none() || (r.submitted_by.is_some() && r.submitted_by == caller.user_id),
            }
    }) {
        let details = match r.account_id {
            Some(account_id) => format!("{} for account {}", r.request_type, account_number(state, account_id)),
            None => r.request_type.clone(),
        };
        return Ok(TrackingResult {
            kind: "Request",
            reference: r.reference_number,
            status: r.status.to_string(),
            date: Some(r.submission_date),
            details,
            amount: None,
        });
    }

    Err(AppError::NotFound(format!("no record with reference {reference}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{AccountRecord, RefundRecord};
    use taxadmin_core::{PermissionSet, RefundStatus};
    use uuid::Uuid;

    fn caller(user_id: Uuid) -> CallerIdentity {
        CallerIdentity {
            user_id: Some(user_id),
            username: "tracker".into(),
            is_admin: false,
            user_type: None,
            permissions: PermissionSet::new(),
        }
    }

    fn seed_refund(state: &AppState, owner: Uuid) {
        let account = AccountRecord {
            id: Uuid::new_v4(),
            account_number: "8008".into(),
            name: "Tracked".into(),
            user_id: owner,
            is_active: true,
            ledger_balance: Money::ZERO,
            last_entry_no: 0,
            version: 0,
            created_at: Utc::now(),
        };
        let refund = RefundRecord {
            id: Uuid::new_v4(),
            account_id: account.id,
            amount: Money::from_major(12),
            reason: "Overpaid".into(),
            reference_number: "REF-TRACK001".into(),
            status: RefundStatus::Pending,
            request_date: Utc::now(),
            approval_date: None,
            payment_date: None,
            requested_by: Some(owner),
            decided_by: None,
        };
        state.accounts.insert(account.id, account);
        state.refunds.insert(refund.id, refund);
    }

    #[test]
    fn finds_refund_by_reference() {
        let state = AppState::new();
        let owner = Uuid::new_v4();
        seed_refund(&state, owner);
        let result = track(&state, &caller(owner), " REF-TRACK001 ").unwrap();
        assert_eq!(result.kind, "Refund");
        assert_eq!(result.status, "Pending");
        assert_eq!(result.details, "Refund for account 8008");
        assert_eq!(result.amount, Some(Money::from_major(12)));
    }

    #[test]
    fn other_callers_and_unknown_references_get_not_found() {
        let state = AppState::new();
        seed_refund(&state, Uuid::new_v4());
        let stranger = caller(Uuid::new_v4());
        assert!(matches!(track(&state, &stranger, "REF-TRACK001"), Err(AppError::NotFound(_))));
        assert!(matches!(track(&state, &stranger, "TX-NOPE"), Err(AppError::NotFound(_))));
        assert!(matches!(track(&state, &stranger, ""), Err(AppError::Validation(_))));
    }
}
