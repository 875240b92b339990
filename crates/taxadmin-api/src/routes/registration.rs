//! # Registration API
//!
//! - **POST `/v1/registration`**: submit an individual, non-individual or
//!   sole proprietor registration (tagged by `registration_type`)
//! - **GET `/v1/registration`**, **GET `/v1/registration/:id`**
//! - **POST `/v1/registration/:id/decision`**: approve or reject (`admin_access`)

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use taxadmin_core::registration::Registration;
use taxadmin_core::Permission;
use uuid::Uuid;

use crate::auth::{require_any, CallerIdentity};
use crate::error::AppError;
use crate::extractors::extract_json;
use crate::pagination::{Page, PageParams};
use crate::records::RegistrationRecord;
use crate::services::registrations::{
    self, RegistrationDecision, RegistrationDecisionResult, RegistrationFilters,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/registration", get(list_registrations).post(submit_registration))
        .route("/v1/registration/:id", get(get_registration))
        .route("/v1/registration/:id/decision", post(decide_registration))
}

/// POST /v1/registration
#[utoipa::path(
    post,
    path = "/v1/registration",
    request_body = serde_json::Value,
    responses(
        (status = 201, description = "Registration submitted", body = RegistrationRecord),
        (status = 422, description = "Every field problem under details.errors", body = crate::error::ErrorBody),
    ),
    tag = "registration"
)]
async fn submit_registration(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<Registration>, JsonRejection>,
) -> Result<(StatusCode, Json<RegistrationRecord>), AppError> {
    let details = extract_json(body)?;
    let registration = registrations::submit_registration(&state, &caller, details).await?;
    Ok((StatusCode::CREATED, Json(registration)))
}

/// GET /v1/registration
#[utoipa::path(
    get,
    path = "/v1/registration",
    params(RegistrationFilters, PageParams),
    responses(
        (status = 200, description = "Page of registrations"),
        (status = 422, description = "Unknown type or status filter", body = crate::error::ErrorBody),
    ),
    tag = "registration"
)]
async fn list_registrations(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(filters): Query<RegistrationFilters>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<RegistrationRecord>>, AppError> {
    let rows = registrations::list_registrations(&state, &caller, &filters)?;
    Ok(Json(Page::of(rows, page, state.config.items_per_page)))
}

/// GET /v1/registration/:id
#[utoipa::path(
    get,
    path = "/v1/registration/{id}",
    params(("id" = Uuid, Path, description = "Registration id")),
    responses(
        (status = 200, description = "Registration", body = RegistrationRecord),
        (status = 403, description = "Submitted by someone else", body = crate::error::ErrorBody),
        (status = 404, description = "No such registration", body = crate::error::ErrorBody),
    ),
    tag = "registration"
)]
async fn get_registration(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<RegistrationRecord>, AppError> {
    Ok(Json(registrations::get_registration(&state, &caller, id)?))
}

/// POST /v1/registration/:id/decision
#[utoipa::path(
    post,
    path = "/v1/registration/{id}/decision",
    params(("id" = Uuid, Path, description = "Registration id")),
    request_body = RegistrationDecision,
    responses(
        (status = 200, description = "Decision applied, or already processed", body = RegistrationDecisionResult),
        (status = 403, description = "Requires admin_access", body = crate::error::ErrorBody),
        (status = 404, description = "No such registration", body = crate::error::ErrorBody),
        (status = 422, description = "Status is not Approved or Rejected", body = crate::error::ErrorBody),
    ),
    tag = "registration"
)]
async fn decide_registration(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<RegistrationDecision>, JsonRejection>,
) -> Result<Json<RegistrationDecisionResult>, AppError> {
    require_any(&caller, &[Permission::AdminAccess])?;
    let decision = extract_json(body)?;
    Ok(Json(registrations::decide_registration(&state, &caller, id, decision).await?))
}
