//! # Dashboard API
//!
//! - **GET `/v1/dashboard`**: headline statistics, upcoming periods, recent activity
//! - **GET `/v1/dashboard/analytics`**: rolling-year collection and compliance
//!   analytics (`view_reports` or `admin_access`)
//! - **GET `/v1/dashboard/notifications`**: the caller's notifications, unread first
//! - **POST `/v1/dashboard/notifications/:id/read`**
//! - **POST `/v1/dashboard/notifications/read-all`**

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use taxadmin_core::Permission;
use uuid::Uuid;

use crate::auth::{require_any, CallerIdentity};
use crate::error::AppError;
use crate::pagination::{Page, PageParams};
use crate::records::NotificationRecord;
use crate::services::dashboard::{self, Dashboard, ReadAllResult};
use crate::services::reporting::{self, Analytics};
use crate::services::today;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/dashboard", get(get_dashboard))
        .route("/v1/dashboard/analytics", get(analytics))
        .route("/v1/dashboard/notifications", get(list_notifications))
        .route("/v1/dashboard/notifications/read-all", post(mark_all_read))
        .route("/v1/dashboard/notifications/:id/read", post(mark_read))
}

/// GET /v1/dashboard
#[utoipa::path(
    get,
    path = "/v1/dashboard",
    responses((status = 200, description = "Dashboard for the caller", body = Dashboard)),
    tag = "dashboard"
)]
async fn get_dashboard(State(state): State<AppState>, caller: CallerIdentity) -> Json<Dashboard> {
    Json(dashboard::dashboard(&state, &caller))
}

/// GET /v1/dashboard/analytics
#[utoipa::path(
    get,
    path = "/v1/dashboard/analytics",
    responses(
        (status = 200, description = "Collections per tax type, twelve-month trend, compliance per tax type"),
        (status = 403, description = "Requires view_reports", body = crate::error::ErrorBody),
    ),
    tag = "dashboard"
)]
async fn analytics(State(state): State<AppState>, caller: CallerIdentity) -> Result<Json<Analytics>, AppError> {
    require_any(&caller, &[Permission::ViewReports, Permission::AdminAccess])?;
    Ok(Json(reporting::analytics(&state, today())))
}

/// GET /v1/dashboard/notifications
#[utoipa::path(
    get,
    path = "/v1/dashboard/notifications",
    params(PageParams),
    responses(
        (status = 200, description = "Page of notifications"),
        (status = 403, description = "Caller has no user identity", body = crate::error::ErrorBody),
    ),
    tag = "dashboard"
)]
async fn list_notifications(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<NotificationRecord>>, AppError> {
    let user_id = caller.require_user()?;
    let rows = dashboard::notifications_for(&state, user_id);
    Ok(Json(Page::of(rows, page, state.config.items_per_page)))
}

/// POST /v1/dashboard/notifications/:id/read
#[utoipa::path(
    post,
    path = "/v1/dashboard/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification marked read", body = NotificationRecord),
        (status = 403, description = "Belongs to another user", body = crate::error::ErrorBody),
        (status = 404, description = "No such notification", body = crate::error::ErrorBody),
    ),
    tag = "dashboard"
)]
async fn mark_read(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<NotificationRecord>, AppError> {
    Ok(Json(dashboard::mark_read(&state, &caller, id).await?))
}

/// POST /v1/dashboard/notifications/read-all
#[utoipa::path(
    post,
    path = "/v1/dashboard/notifications/read-all",
    responses((status = 200, description = "Unread notifications marked read", body = ReadAllResult)),
    tag = "dashboard"
)]
async fn mark_all_read(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<ReadAllResult>, AppError> {
    Ok(Json(dashboard::mark_all_read(&state, &caller).await?))
}
