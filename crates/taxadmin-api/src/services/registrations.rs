//! Taxpayer registrations.
//!
//! The body is the tagged [`Registration`] union; the envelope (number,
//! status, dates) is added here.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use taxadmin_core::registration::{Registration, RegistrationType};
use taxadmin_core::{NotificationKind, ReferenceKind, ReferenceNumber, RegistrationStatus};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::changeset::ChangeSet;
use crate::error::AppError;
use crate::records::RegistrationRecord;
use crate::state::AppState;

use super::notify::{notify, notify_admins};
use super::refunds::DecisionOutcome;
use super::today;

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct RegistrationFilters {
    pub registration_type: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegistrationDecision {
    /// `Approved` or `Rejected`.
    #[schema(value_type = String)]
    pub status: RegistrationStatus,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegistrationDecisionResult {
    pub outcome: DecisionOutcome,
    pub message: String,
    pub registration: RegistrationRecord,
}

/// Whether a national id or email is already used by another registration.
fn is_duplicate(state: &AppState, details: &Registration) -> bool {
    let national_id = details.national_id().filter(|id| !id.is_empty());
    let email = details.email().filter(|e| !e.is_empty());
    if national_id.is_none() && email.is_none() {
        return false;
    }
    state.registrations.any(|r| {
        let same_id = national_id.is_some() && r.details.national_id() == national_id;
        let same_email = email.is_some_and(|e| {
            r.details
                .email()
                .is_some_and(|other| other.eq_ignore_ascii_case(e))
        });
        same_id || same_email
    })
}

pub async fn submit_registration(
    state: &AppState,
    caller: &CallerIdentity,
    details: Registration,
) -> Result<RegistrationRecord, AppError> {
    let mut errors = details.validate();
    if errors.is_empty() && is_duplicate(state, &details) {
        errors.push("A registration with this ID or email already exists.".to_string());
    }
    if !errors.is_empty() {
        tracing::warn!(
            registration_type = %details.registration_type(),
            problems = errors.len(),
            "registration rejected by validation"
        );
        return Err(AppError::InvalidFields(errors));
    }

    let registration = RegistrationRecord {
        id: Uuid::new_v4(),
        registration_number: ReferenceNumber::generate(ReferenceKind::Registration).into_string(),
        status: RegistrationStatus::Pending,
        submitted_by: caller.user_id,
        registration_date: today(),
        decided_at: None,
        decided_by: None,
        details,
        created_at: Utc::now(),
    };
    let kind = registration.details.registration_type();
    let name = registration.details.display_name();

    let mut cs = ChangeSet::new();
    cs.put(registration.clone());
    notify_admins(
        &mut cs,
        state,
        "New Registration Submitted",
        &format!(
            "A new {} registration ({}) has been submitted for {name}.",
            kind.label(),
            registration.registration_number
        ),
        NotificationKind::Info,
    );
    cs.audit(
        caller.user_id,
        "submit_registration",
        "registration",
        Some(registration.id),
        serde_json::json!({
            "registration_number": registration.registration_number,
            "registration_type": kind,
        }),
    );
    cs.commit(state).await?;

    tracing::info!(
        registration_id = %registration.id,
        number = %registration.registration_number,
        registration_type = %kind,
        "registration submitted"
    );
    Ok(registration)
}

pub fn list_registrations(
    state: &AppState,
    caller: &CallerIdentity,
    filters: &RegistrationFilters,
) -> Result<Vec<RegistrationRecord>, AppError> {
    let kind = filters
        .registration_type
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<RegistrationType>)
        .transpose()?;
    let status = filters
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<RegistrationStatus>)
        .transpose()?;
    let everyone = caller.sees_all_accounts();
    let mut rows = state.registrations.filter(|r| {
        (everyone || r.submitted_by.is_some() && r.submitted_by == caller.user_id)
            && kind.map_or(true, |k| r.details.registration_type() == k)
            && status.map_or(true, |s| r.status == s)
    });
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(rows)
}

pub fn get_registration(
    state: &AppState,
    caller: &CallerIdentity,
    id: Uuid,
) -> Result<RegistrationRecord, AppError> {
    let registration = state
        .registrations
        .get(&id)
        .ok_or_else(|| AppError::not_found("registration", id))?;
    if !caller.sees_all_accounts() && registration.submitted_by != caller.user_id {
        return Err(AppError::Forbidden(format!(
            "no access to registration {}",
            registration.registration_number
        )));
    }
    Ok(registration)
}

pub async fn decide_registration(
    state: &AppState,
    caller: &CallerIdentity,
    id: Uuid,
    decision: RegistrationDecision,
) -> Result<RegistrationDecisionResult, AppError> {
    if !matches!(decision.status, RegistrationStatus::Approved | RegistrationStatus::Rejected) {
        return Err(AppError::Validation(
            "decision status must be Approved or Rejected".into(),
        ));
    }
    let _guard = state.locks.lock(&[id]).await;
    let mut registration = state
        .registrations
        .get(&id)
        .ok_or_else(|| AppError::not_found("registration", id))?;
    if registration.status != RegistrationStatus::Pending {
        tracing::warn!(
            registration_id = %registration.id,
            status = %registration.status,
            "registration already decided"
        );
        return Ok(RegistrationDecisionResult {
            outcome: DecisionOutcome::AlreadyProcessed,
            message: "This registration has already been processed".to_string(),
            registration,
        });
    }

    registration.status = decision.status;
    registration.decided_at = Some(Utc::now());
    registration.decided_by = caller.user_id;

    let mut cs = ChangeSet::new();
    cs.put(registration.clone());
    if let Some(user_id) = registration.submitted_by {
        let (verb, kind) = match decision.status {
            RegistrationStatus::Approved => ("approved", NotificationKind::Success),
            _ => ("rejected", NotificationKind::Danger),
        };
        notify(
            &mut cs,
            user_id,
            format!("Registration {}", decision.status),
            format!(
                "Your registration ({}) has been {verb}.",
                registration.registration_number
            ),
            kind,
        );
    }
    cs.audit(
        caller.user_id,
        "decide_registration",
        "registration",
        Some(registration.id),
        serde_json::json!({
            "registration_number": registration.registration_number,
            "status": registration.status,
        }),
    );
    cs.commit(state).await?;

    tracing::info!(
        registration_id = %registration.id,
        number = %registration.registration_number,
        status = %registration.status,
        "registration decided"
    );
    Ok(RegistrationDecisionResult {
        outcome: DecisionOutcome::Applied,
        message: format!("Registration {}", registration.status),
        registration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxadmin_core::registration::IndividualDetails;
    use taxadmin_core::PermissionSet;

    fn caller() -> CallerIdentity {
        CallerIdentity {
            user_id: Some(Uuid::new_v4()),
            username: "applicant".into(),
            is_admin: false,
            user_type: Some("Individual".into()),
            permissions: PermissionSet::new(),
        }
    }

    fn individual(national_id: &str, email: &str) -> Registration {
        Registration::Individual(IndividualDetails {
            first_name: "Ada".into(),
            last_name: "Okafor".into(),
            email: email.into(),
            phone: "+2348000000".into(),
            national_id: national_id.into(),
            date_of_birth: chrono::NaiveDate::from_ymd_opt(1990, 4, 2),
            address: "1 Marina Road".into(),
            occupation: None,
            employment_status: None,
            tax_residency: None,
        })
    }

    #[tokio::test]
    async fn duplicate_national_id_or_email_is_rejected() {
        let state = AppState::new();
        let applicant = caller();
        let first = submit_registration(&state, &applicant, individual("NID-1", "ada@example.com"))
            .await
            .unwrap();
        assert_eq!(first.status, RegistrationStatus::Pending);
        assert_eq!(first.registration_number.get(..3), Some("RG-"));

        for body in [individual("NID-1", "other@example.com"), individual("NID-2", "ADA@example.com")] {
            let err = submit_registration(&state, &applicant, body).await.unwrap_err();
            match err {
                AppError::InvalidFields(errors) => {
                    assert_eq!(errors, vec!["A registration with this ID or email already exists."])
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn every_missing_field_is_reported() {
        let state = AppState::new();
        let err = submit_registration(&state, &caller(), individual("", "not-an-email"))
            .await
            .unwrap_err();
        match err {
            AppError::InvalidFields(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn filters_and_decision() {
        let state = AppState::new();
        let applicant = caller();
        let reg = submit_registration(&state, &applicant, individual("NID-9", "nine@example.com"))
            .await
            .unwrap();

        let filters = RegistrationFilters {
            registration_type: Some("individual".into()),
            status: Some("Pending".into()),
        };
        assert_eq!(list_registrations(&state, &applicant, &filters).unwrap().len(), 1);
        let other = caller();
        assert!(list_registrations(&state, &other, &RegistrationFilters::default())
            .unwrap()
            .is_empty());

        let decided = decide_registration(
            &state,
            &applicant,
            reg.id,
            RegistrationDecision {
                status: RegistrationStatus::Approved,
            },
        )
        .await
        .unwrap();
        assert_eq!(decided.outcome, DecisionOutcome::Applied);
        assert!(state
            .notifications
            .any(|n| n.title == "Registration Approved"));

        let again = decide_registration(
            &state,
            &applicant,
            reg.id,
            RegistrationDecision {
                status: RegistrationStatus::Rejected,
            },
        )
        .await
        .unwrap();
        assert_eq!(again.outcome, DecisionOutcome::AlreadyProcessed);
        assert_eq!(again.registration.status, RegistrationStatus::Approved);
    }
}
