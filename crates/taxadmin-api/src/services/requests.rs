//! Service requests (registration changes, certificates, deregistration).

use chrono::Utc;
use serde::Deserialize;
use taxadmin_core::{NotificationKind, ReferenceKind, ReferenceNumber, RequestStatus};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_account_access, CallerIdentity};
use crate::changeset::ChangeSet;
use crate::error::AppError;
use crate::extractors::{length_between, require, Validate};
use crate::records::ServiceRequestRecord;
use crate::state::AppState;

use super::notify::notify;
use super::{in_scope, load_account, visible_accounts};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SubmitRequest {
    /// Free-form kind, e.g. `Registration`, `Amendment`, `Certificate`.
    pub request_type: String,
    pub account_id: Option<Uuid>,
    pub details: Option<String>,
}

impl Validate for SubmitRequest {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        require(&mut errors, "request_type", &self.request_type);
        length_between(&mut errors, "request_type", &self.request_type, 0, 50);
        errors
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RequestStatusUpdate {
    #[schema(value_type = String)]
    pub status: RequestStatus,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct RequestFilters {
    pub status: Option<String>,
    pub request_type: Option<String>,
}

pub async fn submit_request(
    state: &AppState,
    caller: &CallerIdentity,
    request: SubmitRequest,
) -> Result<ServiceRequestRecord, AppError> {
    if let Some(account_id) = request.account_id {
        let account = load_account(state, account_id)?;
        require_account_access(caller, &account)?;
    }

    let record = ServiceRequestRecord {
        id: Uuid::new_v4(),
        request_type: request.request_type.trim().to_string(),
        account_id: request.account_id,
        submitted_by: caller.user_id,
        status: RequestStatus::Pending,
        submission_date: Utc::now(),
        completion_date: None,
        reference_number: ReferenceNumber::generate(ReferenceKind::Request).into_string(),
        details: request.details.filter(|d| !d.trim().is_empty()),
    };

    let mut cs = ChangeSet::new();
    cs.put(record.clone());
    cs.audit(
        caller.user_id,
        "submit_request",
        "service_request",
        Some(record.id),
        serde_json::json!({
            "reference_number": record.reference_number,
            "request_type": record.request_type,
        }),
    );
    cs.commit(state).await?;

    tracing::info!(
        request_id = %record.id,
        reference = %record.reference_number,
        request_type = %record.request_type,
        "service request submitted"
    );
    Ok(record)
}

/// Requests on the caller's accounts, or submitted by the caller, newest
/// first. Officers see every request.
pub fn list_requests(
    state: &AppState,
    caller: &CallerIdentity,
    filters: &RequestFilters,
) -> Result<Vec<ServiceRequestRecord>, AppError> {
    let status = filters
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<RequestStatus>)
        .transpose()?;
    let request_type = filters.request_type.as_deref().filter(|s| !s.is_empty());
    let scope = visible_accounts(state, caller);
    let mut rows = state.requests.filter(|r| {
        let visible = match r.account_id {
            Some(account_id) => in_scope(&scope, account_id),
            None => scope.is_none() || (r.submitted_by.is_some() && r.submitted_by == caller.user_id),
        };
        visible
            && status.map_or(true, |s| r.status == s)
            && request_type.map_or(true, |t| r.request_type.eq_ignore_ascii_case(t))
    });
    rows.sort_by(|a, b| b.submission_date.cmp(&a.submission_date));
    Ok(rows)
}

pub async fn update_request_status(
    state: &AppState,
    caller: &CallerIdentity,
    id: Uuid,
    update: RequestStatusUpdate,
) -> Result<ServiceRequestRecord, AppError> {
    let _guard = state.locks.lock(&[id]).await;
    let mut record = state
        .requests
        .get(&id)
        .ok_or_else(|| AppError::not_found("service request", id))?;

    let previous = record.status;
    record.status = update.status;
    record.completion_date = match update.status {
        RequestStatus::Completed | RequestStatus::Rejected => Some(Utc::now()),
        _ => None,
    };

    let mut cs = ChangeSet::new();
    cs.put(record.clone());
    if let Some(user_id) = record.submitted_by {
        notify(
            &mut cs,
            user_id,
            format!("Request {}", record.status),
            format!(
                "Your {} request ({}) is now {}.",
                record.request_type, record.reference_number, record.status
            ),
            NotificationKind::Info,
        );
    }
    cs.audit(
        caller.user_id,
        "update_request_status",
        "service_request",
        Some(record.id),
        serde_json::json!({
            "reference_number": record.reference_number,
            "from": previous,
            "to": record.status,
        }),
    );
    cs.commit(state).await?;

    tracing::info!(
        request_id = %record.id,
        reference = %record.reference_number,
        from = %previous,
        to = %record.status,
        "service request status updated"
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxadmin_core::PermissionSet;

    fn caller() -> CallerIdentity {
        CallerIdentity {
            user_id: Some(Uuid::new_v4()),
            username: "citizen".into(),
            is_admin: false,
            user_type: None,
            permissions: PermissionSet::new(),
        }
    }

    fn certificate() -> SubmitRequest {
        SubmitRequest {
            request_type: "Certificate".into(),
            account_id: None,
            details: Some("Tax clearance".into()),
        }
    }

    #[tokio::test]
    async fn completion_date_follows_terminal_status() {
        let state = AppState::new();
        let citizen = caller();
        let request = submit_request(&state, &citizen, certificate()).await.unwrap();
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(request.reference_number.get(..4), Some("REQ-"));

        let working = update_request_status(
            &state,
            &citizen,
            request.id,
            RequestStatusUpdate {
                status: RequestStatus::InProgress,
            },
        )
        .await
        .unwrap();
        assert!(working.completion_date.is_none());

        let done = update_request_status(
            &state,
            &citizen,
            request.id,
            RequestStatusUpdate {
                status: RequestStatus::Completed,
            },
        )
        .await
        .unwrap();
        assert!(done.completion_date.is_some());
    }

    #[tokio::test]
    async fn submitter_sees_own_requests_only() {
        let state = AppState::new();
        let citizen = caller();
        submit_request(&state, &citizen, certificate()).await.unwrap();
        assert_eq!(list_requests(&state, &citizen, &RequestFilters::default()).unwrap().len(), 1);
        assert!(list_requests(&state, &caller(), &RequestFilters::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn blank_type_is_rejected() {
        let mut body = certificate();
        body.request_type = "  ".into();
        assert_eq!(body.validate(), vec!["request_type is required"]);
    }
}
