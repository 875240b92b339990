//! # E-Services API
//!
//! Self-service endpoints for taxpayers. Officers reach the same endpoints
//! with a wider account scope.
//!
//! - **GET/POST `/v1/e-services/accounts`**
//! - **GET `/v1/e-services/accounts/:id`**: account overview
//! - **GET/POST `/v1/e-services/accounts/:id/obligations`**
//! - **GET `/v1/e-services/tracking?reference=`**: look up any reference number
//! - **POST `/v1/e-services/requests`**: submit a service request

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use taxadmin_core::Permission;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::auth::{require_any, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json};
use crate::pagination::{Page, PageParams};
use crate::records::{AccountRecord, ObligationRecord, ServiceRequestRecord};
use crate::services::accounts::{self, AccountOverview, CreateAccount, RegisterObligation};
use crate::services::requests::{self, SubmitRequest};
use crate::services::tracking::{self, TrackingResult};
use crate::state::AppState;

const ACCOUNT_MANAGERS: &[Permission] = &[Permission::ManageTaxAccounts, Permission::AdminAccess];

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct TrackingQuery {
    /// Return, payment, refund or request reference number.
    pub reference: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/e-services/accounts", get(list_accounts).post(create_account))
        .route("/v1/e-services/accounts/:id", get(account_overview))
        .route(
            "/v1/e-services/accounts/:id/obligations",
            get(list_obligations).post(register_obligation),
        )
        .route("/v1/e-services/tracking", get(track))
        .route("/v1/e-services/requests", post(submit_request))
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// GET /v1/e-services/accounts
#[utoipa::path(
    get,
    path = "/v1/e-services/accounts",
    params(PageParams),
    responses((status = 200, description = "Page of accounts visible to the caller")),
    tag = "e-services"
)]
async fn list_accounts(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(page): Query<PageParams>,
) -> Json<Page<AccountRecord>> {
    let rows = accounts::list_accounts(&state, &caller);
    Json(Page::of(rows, page, state.config.items_per_page))
}

/// POST /v1/e-services/accounts
#[utoipa::path(
    post,
    path = "/v1/e-services/accounts",
    request_body = CreateAccount,
    responses(
        (status = 201, description = "Account opened", body = AccountRecord),
        (status = 409, description = "Account number already in use", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid fields", body = crate::error::ErrorBody),
    ),
    tag = "e-services"
)]
async fn create_account(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateAccount>, JsonRejection>,
) -> Result<(StatusCode, Json<AccountRecord>), AppError> {
    let request = extract_validated_json(body)?;
    let account = accounts::create_account(&state, &caller, request).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// GET /v1/e-services/accounts/:id
#[utoipa::path(
    get,
    path = "/v1/e-services/accounts/{id}",
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account overview", body = AccountOverview),
        (status = 403, description = "Not the caller's account", body = crate::error::ErrorBody),
        (status = 404, description = "No such account", body = crate::error::ErrorBody),
    ),
    tag = "e-services"
)]
async fn account_overview(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<AccountOverview>, AppError> {
    Ok(Json(accounts::account_overview(&state, &caller, id)?))
}

/// GET /v1/e-services/accounts/:id/obligations
#[utoipa::path(
    get,
    path = "/v1/e-services/accounts/{id}/obligations",
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Obligations by start date", body = Vec<ObligationRecord>),
        (status = 403, description = "Not the caller's account", body = crate::error::ErrorBody),
        (status = 404, description = "No such account", body = crate::error::ErrorBody),
    ),
    tag = "e-services"
)]
async fn list_obligations(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ObligationRecord>>, AppError> {
    Ok(Json(accounts::list_obligations(&state, &caller, id)?))
}

/// POST /v1/e-services/accounts/:id/obligations
#[utoipa::path(
    post,
    path = "/v1/e-services/accounts/{id}/obligations",
    params(("id" = Uuid, Path, description = "Account id")),
    request_body = RegisterObligation,
    responses(
        (status = 201, description = "Obligation registered", body = ObligationRecord),
        (status = 403, description = "Requires manage_tax_accounts", body = crate::error::ErrorBody),
        (status = 409, description = "Already registered for this tax type", body = crate::error::ErrorBody),
    ),
    tag = "e-services"
)]
async fn register_obligation(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<RegisterObligation>, JsonRejection>,
) -> Result<(StatusCode, Json<ObligationRecord>), AppError> {
    require_any(&caller, ACCOUNT_MANAGERS)?;
    let request = extract_json(body)?;
    let obligation = accounts::register_obligation(&state, &caller, id, request).await?;
    Ok((StatusCode::CREATED, Json(obligation)))
}

// ---------------------------------------------------------------------------
// Tracking & requests
// ---------------------------------------------------------------------------

/// GET /v1/e-services/tracking
#[utoipa::path(
    get,
    path = "/v1/e-services/tracking",
    params(TrackingQuery),
    responses(
        (status = 200, description = "First record carrying the reference", body = TrackingResult),
        (status = 404, description = "Reference not found", body = crate::error::ErrorBody),
        (status = 422, description = "Reference missing", body = crate::error::ErrorBody),
    ),
    tag = "e-services"
)]
async fn track(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<TrackingQuery>,
) -> Result<Json<TrackingResult>, AppError> {
    let reference = query.reference.unwrap_or_default();
    Ok(Json(tracking::track(&state, &caller, &reference)?))
}

/// POST /v1/e-services/requests
#[utoipa::path(
    post,
    path = "/v1/e-services/requests",
    request_body = SubmitRequest,
    responses(
        (status = 201, description = "Request submitted", body = ServiceRequestRecord),
        (status = 422, description = "Invalid fields", body = crate::error::ErrorBody),
    ),
    tag = "e-services"
)]
async fn submit_request(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ServiceRequestRecord>), AppError> {
    let request = extract_validated_json(body)?;
    let record = requests::submit_request(&state, &caller, request).await?;
    Ok((StatusCode::CREATED, Json(record)))
}
