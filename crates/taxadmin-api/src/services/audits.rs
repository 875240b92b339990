//! # Audits and Audit Cases
//!
//! An audit is opened from a filed or assessed return and starts Planned
//! with one case already attached. Officers move it through its statuses
//! and add further cases; each case is appended to the audit's findings.
//! The owner of the audited account is told about every step.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use taxadmin_core::audit::{append_case_findings, opened_notice, status_notice};
use taxadmin_core::{AuditStatus, AuditType, CaseStatus, Money, ReferenceKind, ReferenceNumber};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::changeset::ChangeSet;
use crate::error::AppError;
use crate::extractors::{require, Validate};
use crate::records::{AuditCaseRecord, AuditRecord};
use crate::state::AppState;

use super::notify::send_notice;
use super::{in_scope, load_account, load_return, today, visible_accounts};

// -- Request / Response types --------------------------------------------------

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OpenAudit {
    pub tax_return_id: Uuid,
    #[schema(value_type = String)]
    pub audit_type: AuditType,
    /// Defaults to today.
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AuditStatusUpdate {
    #[schema(value_type = String)]
    pub status: AuditStatus,
    pub findings: Option<String>,
    pub outcome: Option<String>,
    #[schema(value_type = Option<String>)]
    pub additional_assessment: Option<Money>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddAuditCase {
    pub tax_period: String,
    pub description: String,
}

impl Validate for AddAuditCase {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        require(&mut errors, "tax_period", &self.tax_period);
        require(&mut errors, "description", &self.description);
        errors
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditDetail {
    pub audit: AuditRecord,
    pub cases: Vec<AuditCaseRecord>,
    pub tax_return_reference: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct AuditFilters {
    pub status: Option<String>,
    pub audit_type: Option<String>,
}

// -- Queries -------------------------------------------------------------------

/// Audits visible to the caller, newest start first.
pub fn list_audits(
    state: &AppState,
    caller: &CallerIdentity,
    filters: &AuditFilters,
) -> Result<Vec<AuditRecord>, AppError> {
    let status = filters
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<AuditStatus>)
        .transpose()?;
    let audit_type = filters
        .audit_type
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<AuditType>)
        .transpose()?;
    let scope = visible_accounts(state, caller);
    let mut audits = state.audits.filter(|a| {
        in_scope(&scope, a.account_id)
            && status.map_or(true, |s| a.status == s)
            && audit_type.map_or(true, |t| a.audit_type == t)
    });
    audits.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.created_at.cmp(&a.created_at)));
    Ok(audits)
}

pub fn audit_detail(state: &AppState, caller: &CallerIdentity, audit_id: Uuid) -> Result<AuditDetail, AppError> {
    let audit = state
        .audits
        .get(&audit_id)
        .ok_or_else(|| AppError::not_found("audit", audit_id))?;
    let account = load_account(state, audit.account_id)?;
    crate::auth::require_account_access(caller, &account)?;
    let mut cases = state.audit_cases.filter(|c| c.audit_id == audit.id);
    cases.sort_by(|a, b| a.open_date.cmp(&b.open_date).then(a.case_number.cmp(&b.case_number)));
    let tax_return_reference = audit
        .tax_return_id
        .and_then(|id| state.tax_returns.get(&id))
        .map(|r| r.reference_number);
    Ok(AuditDetail {
        audit,
        cases,
        tax_return_reference,
    })
}

// -- Commands ------------------------------------------------------------------

pub async fn open_audit(
    state: &AppState,
    caller: &CallerIdentity,
    request: OpenAudit,
) -> Result<AuditDetail, AppError> {
    let _guard = state.locks.lock(&[request.tax_return_id]).await;
    let tax_return = load_return(state, request.tax_return_id)?;
    if !tax_return.status.is_contestable() {
        return Err(AppError::Conflict(format!(
            "tax return {} is {}; only Filed or Assessed returns can be audited",
            tax_return.reference_number, tax_return.status
        )));
    }
    if state
        .audits
        .any(|a| a.tax_return_id == Some(tax_return.id) && a.is_active())
    {
        return Err(AppError::Conflict(format!(
            "tax return {} is already under audit",
            tax_return.reference_number
        )));
    }
    let start_date = request.start_date.unwrap_or_else(today);
    if let Some(end) = request.end_date {
        if end < start_date {
            return Err(AppError::Validation("end_date must not be before start_date".into()));
        }
    }

    let account = load_account(state, tax_return.account_id)?;
    let tax_type_name = state
        .tax_types
        .get(&tax_return.tax_type_id)
        .map(|t| t.name)
        .unwrap_or_else(|| "Unknown".to_string());
    let period_code = state
        .tax_periods
        .get(&tax_return.tax_period_id)
        .map(|p| p.period_code)
        .unwrap_or_default();

    let reference = ReferenceNumber::generate(ReferenceKind::Audit).into_string();
    let audit = AuditRecord {
        id: Uuid::new_v4(),
        account_id: account.id,
        tax_type_id: tax_return.tax_type_id,
        tax_return_id: Some(tax_return.id),
        audit_type: request.audit_type,
        start_date,
        end_date: request.end_date,
        status: AuditStatus::Planned,
        auditor_id: caller.user_id,
        findings: None,
        additional_assessment: Money::ZERO,
        outcome: None,
        reference_number: reference.clone(),
        created_at: Utc::now(),
    };
    let case = AuditCaseRecord {
        id: Uuid::new_v4(),
        account_id: account.id,
        audit_id: audit.id,
        case_number: ReferenceNumber::generate(ReferenceKind::AuditCase).into_string(),
        tax_period: period_code,
        description: format!("Audit of tax return {}", tax_return.reference_number),
        status: CaseStatus::Open,
        open_date: today(),
        close_date: None,
    };

    let mut cs = ChangeSet::new();
    cs.put(audit.clone()).put(case.clone());
    send_notice(
        &mut cs,
        account.user_id,
        opened_notice(&tax_return.reference_number, &tax_type_name, audit.audit_type, &reference),
    );
    cs.audit(
        caller.user_id,
        "open_audit",
        "audit",
        Some(audit.id),
        serde_json::json!({
            "reference_number": reference,
            "tax_return": tax_return.reference_number,
            "audit_type": audit.audit_type,
            "case_number": case.case_number,
        }),
    );
    cs.commit(state).await?;

    tracing::info!(
        audit_id = %audit.id,
        reference = %audit.reference_number,
        tax_return = %tax_return.reference_number,
        "audit opened"
    );
    Ok(AuditDetail {
        audit,
        cases: vec![case],
        tax_return_reference: Some(tax_return.reference_number),
    })
}

pub async fn update_audit_status(
    state: &AppState,
    caller: &CallerIdentity,
    audit_id: Uuid,
    update: AuditStatusUpdate,
) -> Result<AuditRecord, AppError> {
    let additional = update
        .additional_assessment
        .map(|a| a.non_negative("additional_assessment"))
        .transpose()?;

    let _guard = state.locks.lock(&[audit_id]).await;
    let mut audit = state
        .audits
        .get(&audit_id)
        .ok_or_else(|| AppError::not_found("audit", audit_id))?;

    let previous = audit.status;
    audit.status = update.status;
    if update.status == AuditStatus::Completed && audit.end_date.is_none() {
        audit.end_date = Some(today());
    }
    if let Some(findings) = update.findings.filter(|f| !f.trim().is_empty()) {
        audit.findings = Some(findings);
    }
    if let Some(outcome) = update.outcome.filter(|o| !o.trim().is_empty()) {
        audit.outcome = Some(outcome);
    }
    if let Some(amount) = additional {
        audit.additional_assessment = amount;
    }

    let mut cs = ChangeSet::new();
    cs.put(audit.clone());
    if let Some(account) = state.accounts.get(&audit.account_id) {
        send_notice(&mut cs, account.user_id, status_notice(audit.status, &audit.reference_number));
    }
    cs.audit(
        caller.user_id,
        "update_audit_status",
        "audit",
        Some(audit.id),
        serde_json::json!({
            "reference_number": audit.reference_number,
            "from": previous,
            "to": audit.status,
            "additional_assessment": audit.additional_assessment,
        }),
    );
    cs.commit(state).await?;

    tracing::info!(
        audit_id = %audit.id,
        reference = %audit.reference_number,
        from = %previous,
        to = %audit.status,
        "audit status updated"
    );
    Ok(audit)
}

pub async fn add_case(
    state: &AppState,
    caller: &CallerIdentity,
    audit_id: Uuid,
    request: AddAuditCase,
) -> Result<AuditCaseRecord, AppError> {
    let _guard = state.locks.lock(&[audit_id]).await;
    let mut audit = state
        .audits
        .get(&audit_id)
        .ok_or_else(|| AppError::not_found("audit", audit_id))?;

    let tax_period = request.tax_period.trim().to_string();
    let description = request.description.trim().to_string();
    let case = AuditCaseRecord {
        id: Uuid::new_v4(),
        account_id: audit.account_id,
        audit_id: audit.id,
        case_number: ReferenceNumber::generate(ReferenceKind::AuditCase).into_string(),
        tax_period,
        description,
        status: CaseStatus::Open,
        open_date: today(),
        close_date: None,
    };
    audit.findings = Some(append_case_findings(
        audit.findings.as_deref(),
        &case.case_number,
        &case.tax_period,
        &case.description,
    ));

    let mut cs = ChangeSet::new();
    cs.put(audit.clone()).put(case.clone());
    cs.audit(
        caller.user_id,
        "add_audit_case",
        "audit_case",
        Some(case.id),
        serde_json::json!({
            "audit": audit.reference_number,
            "case_number": case.case_number,
        }),
    );
    cs.commit(state).await?;

    tracing::info!(audit_id = %audit.id, case_number = %case.case_number, "audit case added");
    Ok(case)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{AccountRecord, TaxReturnRecord};
    use taxadmin_core::{NotificationKind, ReturnStatus};

    fn officer(state: &AppState) -> CallerIdentity {
        CallerIdentity {
            user_id: Some(Uuid::new_v4()),
            username: "officer".into(),
            is_admin: true,
            user_type: Some("Administrator".into()),
            permissions: state.policy.resolve(Some("Administrator"), true),
        }
    }

    fn seed_return(state: &AppState, status: ReturnStatus) -> (Uuid, Uuid) {
        let owner = Uuid::new_v4();
        let account = AccountRecord {
            id: Uuid::new_v4(),
            account_number: "4004".into(),
            name: "Audited".into(),
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
            reference_number: "TX-AUD00001".into(),
            filing_date: Some(Utc::now()),
            due_amount: Money::from_major(500),
            status,
            assessment_date: None,
            assessment_type: None,
            is_flagged: false,
            flag_reason: None,
            filed_by: Some(owner),
            version: 0,
            created_at: Utc::now(),
        };
        let ids = (tax_return.id, owner);
        state.accounts.insert(account.id, account);
        state.tax_returns.insert(tax_return.id, tax_return);
        ids
    }

    fn open(tax_return_id: Uuid) -> OpenAudit {
        OpenAudit {
            tax_return_id,
            audit_type: AuditType::Desk,
            start_date: None,
            end_date: None,
        }
    }

    #[tokio::test]
    async fn opening_creates_planned_audit_with_case_and_notice() {
        let state = AppState::new();
        let (return_id, owner) = seed_return(&state, ReturnStatus::Filed);
        let detail = open_audit(&state, &officer(&state), open(return_id)).await.unwrap();

        assert_eq!(detail.audit.status, AuditStatus::Planned);
        assert_eq!(detail.audit.reference_number.get(..4), Some("AUD-"));
        assert_eq!(detail.cases.len(), 1);
        assert_eq!(detail.cases[0].case_number.get(..3), Some("AC-"));
        let notice = state.notifications.find(|n| n.user_id == owner).unwrap();
        assert_eq!(notice.title, "Tax Return Under Audit");
        assert_eq!(notice.notification_type, NotificationKind::Warning);
    }

    #[tokio::test]
    async fn second_active_audit_and_unfiled_return_conflict() {
        let state = AppState::new();
        let officer = officer(&state);
        let (return_id, _) = seed_return(&state, ReturnStatus::Assessed);
        open_audit(&state, &officer, open(return_id)).await.unwrap();
        let err = open_audit(&state, &officer, open(return_id)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let (unfiled, _) = seed_return(&state, ReturnStatus::NotFiled);
        let err = open_audit(&state, &officer, open(unfiled)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn completion_stamps_end_date_and_notifies() {
        let state = AppState::new();
        let officer = officer(&state);
        let (return_id, owner) = seed_return(&state, ReturnStatus::Filed);
        let detail = open_audit(&state, &officer, open(return_id)).await.unwrap();

        let audit = update_audit_status(
            &state,
            &officer,
            detail.audit.id,
            AuditStatusUpdate {
                status: AuditStatus::Completed,
                findings: None,
                outcome: Some("No adjustment".into()),
                additional_assessment: Some(Money::from_major(20)),
            },
        )
        .await
        .unwrap();
        assert_eq!(audit.end_date, Some(today()));
        assert_eq!(audit.additional_assessment, Money::from_major(20));
        assert!(state
            .notifications
            .any(|n| n.user_id == owner && n.title == "Audit Completed"));
    }

    #[tokio::test]
    async fn negative_additional_assessment_is_rejected() {
        let state = AppState::new();
        let officer = officer(&state);
        let (return_id, _) = seed_return(&state, ReturnStatus::Filed);
        let detail = open_audit(&state, &officer, open(return_id)).await.unwrap();
        let err = update_audit_status(
            &state,
            &officer,
            detail.audit.id,
            AuditStatusUpdate {
                status: AuditStatus::InProgress,
                findings: None,
                outcome: None,
                additional_assessment: Some(Money::from_major(-1)),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn cases_append_to_findings() {
        let state = AppState::new();
        let officer = officer(&state);
        let (return_id, _) = seed_return(&state, ReturnStatus::Filed);
        let detail = open_audit(&state, &officer, open(return_id)).await.unwrap();

        let case = add_case(
            &state,
            &officer,
            detail.audit.id,
            AddAuditCase {
                tax_period: "2025-Q1".into(),
                description: "Missing invoices".into(),
            },
        )
        .await
        .unwrap();
        let findings = state.audits.get(&detail.audit.id).unwrap().findings.unwrap();
        assert_eq!(
            findings,
            format!("Case {} - Tax Period: 2025-Q1\n\nDescription: Missing invoices", case.case_number)
        );
        let full = audit_detail(&state, &officer, detail.audit.id).unwrap();
        assert_eq!(full.cases.len(), 2);
    }
}
