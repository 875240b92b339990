//! Objections against filed returns.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use taxadmin_core::{NotificationKind, ObjectionStatus, ReferenceKind, ReferenceNumber};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_account_access, CallerIdentity};
use crate::changeset::ChangeSet;
use crate::error::AppError;
use crate::extractors::{require, Validate};
use crate::records::ObjectionRecord;
use crate::state::AppState;

use super::notify::{notify, notify_admins};
use super::refunds::DecisionOutcome;
use super::{load_account, load_return};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FileObjection {
    pub tax_return_id: Uuid,
    pub reason: String,
}

impl Validate for FileObjection {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        require(&mut errors, "reason", &self.reason);
        errors
    }
}

/// Officer action on an open objection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectionAction {
    Approve,
    Reject,
    InProgress,
}

impl ObjectionAction {
    fn resulting_status(&self) -> ObjectionStatus {
        match self {
            Self::Approve => ObjectionStatus::Resolved,
            Self::Reject => ObjectionStatus::Rejected,
            Self::InProgress => ObjectionStatus::InProgress,
        }
    }

    fn decision_text(&self) -> Option<&'static str> {
        match self {
            Self::Approve => Some("Objection approved by tax administration."),
            Self::Reject => Some("Objection rejected by tax administration."),
            Self::InProgress => None,
        }
    }
}

impl FromStr for ObjectionAction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            "in_progress" => Ok(Self::InProgress),
            other => Err(AppError::BadRequest(format!(
                "unknown objection action '{other}'; expected approve, reject or in_progress"
            ))),
        }
    }
}

impl fmt::Display for ObjectionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::InProgress => "in_progress",
        })
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ObjectionDecisionResult {
    pub outcome: DecisionOutcome,
    pub message: String,
    pub objection: ObjectionRecord,
}

pub async fn file_objection(
    state: &AppState,
    caller: &CallerIdentity,
    request: FileObjection,
) -> Result<ObjectionRecord, AppError> {
    let tax_return = load_return(state, request.tax_return_id)?;
    let account = load_account(state, tax_return.account_id)?;
    require_account_access(caller, &account)?;

    let _guard = state.locks.lock(&[tax_return.id]).await;
    let tax_return = load_return(state, tax_return.id)?;
    if !tax_return.status.is_contestable() {
        return Err(AppError::Conflict(format!(
            "tax return {} is {} and cannot be objected to",
            tax_return.reference_number, tax_return.status
        )));
    }
    if state
        .objections
        .any(|o| o.tax_return_id == tax_return.id && o.status.is_open())
    {
        return Err(AppError::Conflict(format!(
            "tax return {} already has an open objection",
            tax_return.reference_number
        )));
    }

    let reference = ReferenceNumber::generate(ReferenceKind::Objection).into_string();
    let objection = ObjectionRecord {
        id: Uuid::new_v4(),
        tax_return_id: tax_return.id,
        account_id: account.id,
        reason: request.reason.trim().to_string(),
        reference_number: reference.clone(),
        status: ObjectionStatus::Pending,
        filing_date: Utc::now(),
        decision: None,
        decision_date: None,
        filed_by: caller.user_id,
        decided_by: None,
    };

    let mut cs = ChangeSet::new();
    cs.put(objection.clone());
    if let Some(user_id) = caller.user_id {
        notify(
            &mut cs,
            user_id,
            "Objection Filed",
            format!(
                "Your objection ({reference}) for tax return {} has been submitted and is pending review.",
                tax_return.reference_number
            ),
            NotificationKind::Tax,
        );
    }
    notify_admins(
        &mut cs,
        state,
        "New Objection Filed",
        &format!(
            "A new objection ({reference}) has been filed by {} for tax return {} for account {}.",
            caller.username, tax_return.reference_number, account.account_number
        ),
        NotificationKind::Alert,
    );
    cs.audit(
        caller.user_id,
        "file_objection",
        "objection",
        Some(objection.id),
        serde_json::json!({
            "reference_number": reference,
            "tax_return": tax_return.reference_number,
        }),
    );
    cs.commit(state).await?;

    tracing::info!(
        objection_id = %objection.id,
        reference = %objection.reference_number,
        tax_return = %tax_return.reference_number,
        "objection filed"
    );
    Ok(objection)
}

pub async fn decide_objection(
    state: &AppState,
    caller: &CallerIdentity,
    objection_id: Uuid,
    action: ObjectionAction,
) -> Result<ObjectionDecisionResult, AppError> {
    let _guard = state.locks.lock(&[objection_id]).await;
    let mut objection = state
        .objections
        .get(&objection_id)
        .ok_or_else(|| AppError::not_found("objection", objection_id))?;

    if !objection.status.is_open() {
        tracing::warn!(
            objection_id = %objection.id,
            status = %objection.status,
            %action,
            "objection already processed"
        );
        return Ok(ObjectionDecisionResult {
            outcome: DecisionOutcome::AlreadyProcessed,
            message: "This objection has already been processed".to_string(),
            objection,
        });
    }

    let tax_return_ref = state
        .tax_returns
        .get(&objection.tax_return_id)
        .map(|r| r.reference_number)
        .unwrap_or_default();
    let reference = objection.reference_number.clone();

    objection.status = action.resulting_status();
    objection.decided_by = caller.user_id;
    if let Some(text) = action.decision_text() {
        objection.decision = Some(text.to_string());
        objection.decision_date = Some(Utc::now());
    }

    let (title, message, kind) = match action {
        ObjectionAction::Approve => (
            "Objection Approved",
            format!("Your objection ({reference}) has been approved."),
            NotificationKind::Success,
        ),
        ObjectionAction::Reject => (
            "Objection Rejected",
            format!("Your objection ({reference}) for tax return {tax_return_ref} has been rejected."),
            NotificationKind::Danger,
        ),
        ObjectionAction::InProgress => (
            "Objection Under Review",
            format!("Your objection ({reference}) is now under review by our tax officers."),
            NotificationKind::Info,
        ),
    };

    let mut cs = ChangeSet::new();
    cs.put(objection.clone());
    let recipient = objection
        .filed_by
        .or_else(|| state.accounts.get(&objection.account_id).map(|a| a.user_id));
    if let Some(user_id) = recipient {
        notify(&mut cs, user_id, title, message, kind);
    }
    cs.audit(
        caller.user_id,
        format!("{action}_objection"),
        "objection",
        Some(objection.id),
        serde_json::json!({
            "reference_number": reference,
            "status": objection.status,
        }),
    );
    cs.commit(state).await?;

    tracing::info!(
        objection_id = %objection.id,
        reference = %objection.reference_number,
        status = %objection.status,
        "objection processed"
    );
    Ok(ObjectionDecisionResult {
        outcome: DecisionOutcome::Applied,
        message: format!("Objection marked as {}", objection.status),
        objection,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{AccountRecord, TaxReturnRecord};
    use taxadmin_core::{Money, PermissionSet, ReturnStatus};

    fn setup(status: ReturnStatus) -> (AppState, CallerIdentity, Uuid) {
        let state = AppState::new();
        let owner = Uuid::new_v4();
        let account = AccountRecord {
            id: Uuid::new_v4(),
            account_number: "3003".into(),
            name: "Objector".into(),
            user_id: owner,
            is_active: true,
            ledger_balance: Money::ZERO,
            last_entry_no: 0,
            version: 0,
            created_at: Utc::now(),
        };
        let tax_return = TaxReturnRecord {
            id: Uuid::new_v4(),
            account_id: account.id,
            tax_type_id: Uuid::new_v4(),
            tax_period_id: Uuid::new_v4(),
            reference_number: "TX-OBJ00001".into(),
            filing_date: Some(Utc::now()),
            due_amount: Money::from_major(10),
            status,
            assessment_date: None,
            assessment_type: None,
            is_flagged: false,
            flag_reason: None,
            filed_by: Some(owner),
            version: 0,
            created_at: Utc::now(),
        };
        let return_id = tax_return.id;
        state.accounts.insert(account.id, account);
        state.tax_returns.insert(return_id, tax_return);
        let caller = CallerIdentity {
            user_id: Some(owner),
            username: "objector".into(),
            is_admin: false,
            user_type: None,
            permissions: PermissionSet::new(),
        };
        (state, caller, return_id)
    }

    fn body(tax_return_id: Uuid) -> FileObjection {
        FileObjection {
            tax_return_id,
            reason: "Assessment too high".into(),
        }
    }

    #[test]
    fn action_parses_path_segment() {
        assert_eq!("in_progress".parse::<ObjectionAction>().unwrap(), ObjectionAction::InProgress);
        assert!("escalate".parse::<ObjectionAction>().is_err());
    }

    #[tokio::test]
    async fn second_open_objection_conflicts() {
        let (state, caller, return_id) = setup(ReturnStatus::Filed);
        let objection = file_objection(&state, &caller, body(return_id)).await.unwrap();
        assert_eq!(objection.status, ObjectionStatus::Pending);
        assert_eq!(objection.reference_number.get(..4), Some("OBJ-"));

        let err = file_objection(&state, &caller, body(return_id)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn finalized_return_cannot_be_contested() {
        let (state, caller, return_id) = setup(ReturnStatus::Finalized);
        let err = file_objection(&state, &caller, body(return_id)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn decisions_follow_lifecycle() {
        let (state, caller, return_id) = setup(ReturnStatus::Assessed);
        let objection = file_objection(&state, &caller, body(return_id)).await.unwrap();

        let review = decide_objection(&state, &caller, objection.id, ObjectionAction::InProgress)
            .await
            .unwrap();
        assert_eq!(review.objection.status, ObjectionStatus::InProgress);
        assert!(review.objection.decision.is_none());

        let approved = decide_objection(&state, &caller, objection.id, ObjectionAction::Approve)
            .await
            .unwrap();
        assert_eq!(approved.outcome, DecisionOutcome::Applied);
        assert_eq!(approved.objection.status, ObjectionStatus::Resolved);
        assert_eq!(
            approved.objection.decision.as_deref(),
            Some("Objection approved by tax administration.")
        );

        let again = decide_objection(&state, &caller, objection.id, ObjectionAction::Reject)
            .await
            .unwrap();
        assert_eq!(again.outcome, DecisionOutcome::AlreadyProcessed);
        assert_eq!(again.objection.status, ObjectionStatus::Resolved);
        assert!(state.notifications.any(|n| n.title == "Objection Approved"));
    }
}
