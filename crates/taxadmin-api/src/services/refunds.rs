//! Refund requests and officer decisions.
//!
//! An approval posts one Refund line crediting the account ledger. A refund
//! that is no longer pending is reported back as already processed and
//! nothing is written.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use taxadmin_core::{
    LedgerEntryKind, Money, NotificationKind, ReferenceKind, ReferenceNumber, RefundAction,
    RefundDecision, RefundStatus,
};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_account_access, CallerIdentity};
use crate::changeset::ChangeSet;
use crate::error::AppError;
use crate::extractors::{require, Validate};
use crate::records::RefundRecord;
use crate::state::AppState;

use super::ledger::{LedgerLine, LedgerWriter};
use super::notify::{notify, notify_admins};
use super::load_account;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RefundRequest {
    pub account_id: Uuid,
    #[schema(value_type = String)]
    pub amount: Money,
    pub reason: String,
}

impl Validate for RefundRequest {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Err(e) = self.amount.positive("amount") {
            errors.push(e.to_string());
        }
        require(&mut errors, "reason", &self.reason);
        errors
    }
}

/// Whether a decision changed anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOutcome {
    Applied,
    AlreadyProcessed,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefundDecisionResult {
    pub outcome: DecisionOutcome,
    pub message: String,
    pub refund: RefundRecord,
}

pub async fn request_refund(
    state: &AppState,
    caller: &CallerIdentity,
    request: RefundRequest,
) -> Result<RefundRecord, AppError> {
    let account = load_account(state, request.account_id)?;
    require_account_access(caller, &account)?;

    let reference = ReferenceNumber::generate(ReferenceKind::Refund).into_string();
    let amount = request.amount;
    let refund = RefundRecord {
        id: Uuid::new_v4(),
        account_id: account.id,
        amount,
        reason: request.reason.trim().to_string(),
        reference_number: reference.clone(),
        status: RefundStatus::Pending,
        request_date: Utc::now(),
        approval_date: None,
        payment_date: None,
        requested_by: caller.user_id,
        decided_by: None,
    };

    let mut cs = ChangeSet::new();
    cs.put(refund.clone());
    if let Some(user_id) = caller.user_id {
        notify(
            &mut cs,
            user_id,
            "Refund Request Submitted",
            format!("Your refund request ({reference}) for ${amount} has been submitted and is pending approval."),
            NotificationKind::Tax,
        );
    }
    notify_admins(
        &mut cs,
        state,
        "New Refund Request",
        &format!(
            "A new refund request ({reference}) for ${amount} has been submitted by {} for account {}.",
            caller.username, account.account_number
        ),
        NotificationKind::Alert,
    );
    cs.audit(
        caller.user_id,
        "request_refund",
        "refund",
        Some(refund.id),
        serde_json::json!({ "reference_number": reference, "amount": amount }),
    );
    cs.commit(state).await?;

    tracing::info!(refund_id = %refund.id, reference = %refund.reference_number, %amount, "refund requested");
    Ok(refund)
}

pub async fn decide_refund(
    state: &AppState,
    caller: &CallerIdentity,
    refund_id: Uuid,
    action: RefundAction,
) -> Result<RefundDecisionResult, AppError> {
    let unlocked = state
        .refunds
        .get(&refund_id)
        .ok_or_else(|| AppError::not_found("refund", refund_id))?;
    let _guard = state.locks.lock(&[refund_id, unlocked.account_id]).await;
    let mut refund = state
        .refunds
        .get(&refund_id)
        .ok_or_else(|| AppError::not_found("refund", refund_id))?;

    let (status, ledger_credit) = match action.decide(refund.status, refund.amount) {
        RefundDecision::AlreadyProcessed { status } => {
            tracing::warn!(refund_id = %refund.id, %status, "refund already processed");
            return Ok(RefundDecisionResult {
                outcome: DecisionOutcome::AlreadyProcessed,
                message: "This refund request has already been processed".to_string(),
                refund,
            });
        }
        RefundDecision::Applied {
            status,
            ledger_credit,
        } => (status, ledger_credit),
    };

    let account = load_account(state, refund.account_id)?;
    refund.status = status;
    refund.approval_date = Some(Utc::now());
    refund.decided_by = caller.user_id;

    let mut cs = ChangeSet::new();
    cs.put(refund.clone());

    let (title, message) = if let Some(amount) = ledger_credit {
        let mut ledger = LedgerWriter::open(account.clone());
        ledger.credit(
            LedgerEntryKind::Refund,
            amount,
            LedgerLine {
                tax_type_id: None,
                tax_period_id: None,
                description: format!("Approved refund request {}", refund.reference_number),
                reference_number: Some(refund.reference_number.clone()),
            },
        );
        ledger.finish(&mut cs);
        (
            "Refund Approved",
            "Refund request has been approved and credit added to taxpayer account",
        )
    } else {
        ("Refund Rejected", "Refund request has been rejected")
    };
    let (verb, action_name) = match status {
        RefundStatus::Approved => ("approved", "approve_refund"),
        _ => ("rejected", "reject_refund"),
    };
    notify(
        &mut cs,
        account.user_id,
        title,
        format!(
            "Your refund request ({}) for ${} has been {verb}.",
            refund.reference_number, refund.amount
        ),
        NotificationKind::Alert,
    );
    cs.audit(
        caller.user_id,
        action_name,
        "refund",
        Some(refund.id),
        serde_json::json!({
            "reference_number": refund.reference_number,
            "amount": refund.amount,
            "status": refund.status,
        }),
    );
    cs.commit(state).await?;

    tracing::info!(
        refund_id = %refund.id,
        reference = %refund.reference_number,
        status = %refund.status,
        balance = %state.accounts.get(&account.id).map(|a| a.ledger_balance).unwrap_or_default(),
        "refund decided"
    );
    Ok(RefundDecisionResult {
        outcome: DecisionOutcome::Applied,
        message: message.to_string(),
        refund,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::AccountRecord;
    use taxadmin_core::PermissionSet;

    fn setup() -> (AppState, CallerIdentity, Uuid) {
        let state = AppState::new();
        let owner = Uuid::new_v4();
        let account = Uuid::new_v4();
        state.accounts.insert(
            account,
            AccountRecord {
                id: account,
                account_number: "2002".into(),
                name: "Refunds".into(),
                user_id: owner,
                is_active: true,
                ledger_balance: Money::ZERO,
                last_entry_no: 0,
                version: 0,
                created_at: Utc::now(),
            },
        );
        let caller = CallerIdentity {
            user_id: Some(owner),
            username: "owner".into(),
            is_admin: false,
            user_type: None,
            permissions: PermissionSet::new(),
        };
        (state, caller, account)
    }

    fn request(account_id: Uuid) -> RefundRequest {
        RefundRequest {
            account_id,
            amount: Money::from_major(75),
            reason: "Duplicate payment".into(),
        }
    }

    #[test]
    fn validation_lists_every_problem() {
        let req = RefundRequest {
            account_id: Uuid::new_v4(),
            amount: Money::ZERO,
            reason: " ".into(),
        };
        assert_eq!(req.validate().len(), 2);
    }

    #[tokio::test]
    async fn approval_credits_ledger_once() {
        let (state, caller, account) = setup();
        let refund = request_refund(&state, &caller, request(account)).await.unwrap();
        assert_eq!(refund.reference_number.get(..4), Some("REF-"));

        let first = decide_refund(&state, &caller, refund.id, RefundAction::Approve)
            .await
            .unwrap();
        assert_eq!(first.outcome, DecisionOutcome::Applied);
        assert_eq!(first.refund.status, RefundStatus::Approved);
        assert!(first.refund.approval_date.is_some());

        let second = decide_refund(&state, &caller, refund.id, RefundAction::Approve)
            .await
            .unwrap();
        assert_eq!(second.outcome, DecisionOutcome::AlreadyProcessed);
        assert_eq!(second.refund.status, RefundStatus::Approved);

        let entries = state.ledger.filter(|e| e.account_id == account);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].transaction_type, LedgerEntryKind::Refund);
        assert_eq!(entries[0].credit_amount, Money::from_major(75));
        assert_eq!(
            state.accounts.get(&account).unwrap().ledger_balance,
            Money::from_major(-75)
        );
    }

    #[tokio::test]
    async fn rejection_posts_nothing() {
        let (state, caller, account) = setup();
        let refund = request_refund(&state, &caller, request(account)).await.unwrap();
        let result = decide_refund(&state, &caller, refund.id, RefundAction::Reject)
            .await
            .unwrap();
        assert_eq!(result.refund.status, RefundStatus::Rejected);
        assert!(state.ledger.is_empty());
        assert!(state
            .notifications
            .any(|n| n.title == "Refund Rejected"));
    }
}
