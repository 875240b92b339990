//! # Process Management API
//!
//! Back-office workflows run by officers.
//!
//! - **GET `/v1/process/audits/:id`**: audit with its cases
//! - **POST `/v1/process/audits/:id/status`**, **POST `/v1/process/audits/:id/cases`**
//! - **GET `/v1/process/requests`**, **POST `/v1/process/requests/:id/status`**
//! - **GET/POST `/v1/process/collections`**, **GET `/v1/process/collections/:id`**

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use taxadmin_core::Permission;
use uuid::Uuid;

use crate::auth::{require_any, CallerIdentity};
use crate::error::AppError;
use crate::extractors::{extract_json, extract_validated_json};
use crate::pagination::{Page, PageParams};
use crate::records::{AuditCaseRecord, AuditRecord, CollectionRecord, ServiceRequestRecord};
use crate::services::audits::{self, AddAuditCase, AuditDetail, AuditStatusUpdate};
use crate::services::collections::{self, CollectionDetail, CollectionFilters, CreateCollection};
use crate::services::requests::{self, RequestFilters, RequestStatusUpdate};
use crate::state::AppState;

const AUDIT_MANAGERS: &[Permission] = &[Permission::AdminAccess];
const REQUEST_OFFICERS: &[Permission] = &[Permission::AdminAccess, Permission::ProcessReturns];
const COLLECTION_OFFICERS: &[Permission] = &[Permission::AdminAccess, Permission::ViewAllAccounts];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/process/audits/:id", get(get_audit))
        .route("/v1/process/audits/:id/status", post(update_audit_status))
        .route("/v1/process/audits/:id/cases", post(add_audit_case))
        .route("/v1/process/requests", get(list_requests))
        .route("/v1/process/requests/:id/status", post(update_request_status))
        .route("/v1/process/collections", get(list_collections).post(create_collection))
        .route("/v1/process/collections/:id", get(get_collection))
}

// ---------------------------------------------------------------------------
// Audits
// ---------------------------------------------------------------------------

/// GET /v1/process/audits/:id
#[utoipa::path(
    get,
    path = "/v1/process/audits/{id}",
    params(("id" = Uuid, Path, description = "Audit id")),
    responses(
        (status = 200, description = "Audit with its cases", body = AuditDetail),
        (status = 403, description = "Not the caller's account", body = crate::error::ErrorBody),
        (status = 404, description = "No such audit", body = crate::error::ErrorBody),
    ),
    tag = "process"
)]
async fn get_audit(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<AuditDetail>, AppError> {
    Ok(Json(audits::audit_detail(&state, &caller, id)?))
}

/// POST /v1/process/audits/:id/status
#[utoipa::path(
    post,
    path = "/v1/process/audits/{id}/status",
    params(("id" = Uuid, Path, description = "Audit id")),
    request_body = AuditStatusUpdate,
    responses(
        (status = 200, description = "Audit updated", body = AuditRecord),
        (status = 403, description = "Requires admin_access", body = crate::error::ErrorBody),
        (status = 404, description = "No such audit", body = crate::error::ErrorBody),
    ),
    tag = "process"
)]
async fn update_audit_status(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<AuditStatusUpdate>, JsonRejection>,
) -> Result<Json<AuditRecord>, AppError> {
    require_any(&caller, AUDIT_MANAGERS)?;
    let update = extract_json(body)?;
    Ok(Json(audits::update_audit_status(&state, &caller, id, update).await?))
}

/// POST /v1/process/audits/:id/cases
#[utoipa::path(
    post,
    path = "/v1/process/audits/{id}/cases",
    params(("id" = Uuid, Path, description = "Audit id")),
    request_body = AddAuditCase,
    responses(
        (status = 201, description = "Case added", body = AuditCaseRecord),
        (status = 403, description = "Requires admin_access", body = crate::error::ErrorBody),
        (status = 404, description = "No such audit", body = crate::error::ErrorBody),
    ),
    tag = "process"
)]
async fn add_audit_case(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<AddAuditCase>, JsonRejection>,
) -> Result<(StatusCode, Json<AuditCaseRecord>), AppError> {
    require_any(&caller, AUDIT_MANAGERS)?;
    let request = extract_validated_json(body)?;
    let case = audits::add_case(&state, &caller, id, request).await?;
    Ok((StatusCode::CREATED, Json(case)))
}

// ---------------------------------------------------------------------------
// Service requests
// ---------------------------------------------------------------------------

/// GET /v1/process/requests
#[utoipa::path(
    get,
    path = "/v1/process/requests",
    params(RequestFilters, PageParams),
    responses(
        (status = 200, description = "Page of service requests"),
        (status = 422, description = "Unknown status filter", body = crate::error::ErrorBody),
    ),
    tag = "process"
)]
async fn list_requests(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(filters): Query<RequestFilters>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<ServiceRequestRecord>>, AppError> {
    let rows = requests::list_requests(&state, &caller, &filters)?;
    Ok(Json(Page::of(rows, page, state.config.items_per_page)))
}

/// POST /v1/process/requests/:id/status
#[utoipa::path(
    post,
    path = "/v1/process/requests/{id}/status",
    params(("id" = Uuid, Path, description = "Service request id")),
    request_body = RequestStatusUpdate,
    responses(
        (status = 200, description = "Request updated", body = ServiceRequestRecord),
        (status = 403, description = "Requires process_returns", body = crate::error::ErrorBody),
        (status = 404, description = "No such request", body = crate::error::ErrorBody),
    ),
    tag = "process"
)]
async fn update_request_status(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
    body: Result<Json<RequestStatusUpdate>, JsonRejection>,
) -> Result<Json<ServiceRequestRecord>, AppError> {
    require_any(&caller, REQUEST_OFFICERS)?;
    let update = extract_json(body)?;
    Ok(Json(requests::update_request_status(&state, &caller, id, update).await?))
}

// ---------------------------------------------------------------------------
// Collections
// ---------------------------------------------------------------------------

/// GET /v1/process/collections
#[utoipa::path(
    get,
    path = "/v1/process/collections",
    params(CollectionFilters, PageParams),
    responses(
        (status = 200, description = "Page of collections"),
        (status = 403, description = "Officers only", body = crate::error::ErrorBody),
    ),
    tag = "process"
)]
async fn list_collections(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(filters): Query<CollectionFilters>,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<CollectionRecord>>, AppError> {
    require_any(&caller, COLLECTION_OFFICERS)?;
    let rows = collections::list_collections(&state, &filters)?;
    Ok(Json(Page::of(rows, page, state.config.items_per_page)))
}

/// GET /v1/process/collections/:id
#[utoipa::path(
    get,
    path = "/v1/process/collections/{id}",
    params(("id" = Uuid, Path, description = "Collection id")),
    responses(
        (status = 200, description = "Collection with its payments", body = CollectionDetail),
        (status = 403, description = "Officers only", body = crate::error::ErrorBody),
        (status = 404, description = "No such collection", body = crate::error::ErrorBody),
    ),
    tag = "process"
)]
async fn get_collection(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<CollectionDetail>, AppError> {
    require_any(&caller, COLLECTION_OFFICERS)?;
    Ok(Json(collections::collection_detail(&state, id)?))
}

/// POST /v1/process/collections
#[utoipa::path(
    post,
    path = "/v1/process/collections",
    request_body = CreateCollection,
    responses(
        (status = 201, description = "Collection opened", body = CollectionRecord),
        (status = 403, description = "Officers only", body = crate::error::ErrorBody),
        (status = 409, description = "Nothing outstanding or already in collection", body = crate::error::ErrorBody),
    ),
    tag = "process"
)]
async fn create_collection(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateCollection>, JsonRejection>,
) -> Result<(StatusCode, Json<CollectionRecord>), AppError> {
    require_any(&caller, COLLECTION_OFFICERS)?;
    let request = extract_json(body)?;
    let collection = collections::create_collection(&state, &caller, request).await?;
    Ok((StatusCode::CREATED, Json(collection)))
}
