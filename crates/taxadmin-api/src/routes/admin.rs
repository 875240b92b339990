//! # Administration API
//!
//! - **GET `/v1/admin/metrics`**: request counters (`admin_access`)
//! - **GET `/v1/admin/settings`**: effective configuration, secrets redacted
//!   (`manage_system_settings`)
//! - **GET `/v1/admin/audit-trail`**: the hash-chained audit trail with an
//!   integrity check (`view_audit_logs`)

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;
use taxadmin_core::Permission;

use crate::auth::{require_any, CallerIdentity};
use crate::error::AppError;
use crate::middleware::metrics::{ApiMetrics, MetricsSnapshot};
use crate::pagination::{Page, PageParams};
use crate::records::AuditTrailRecord;
use crate::state::AppState;
use crate::trail::{verify_chain, ChainIntegrity};

/// The audit trail, newest link first, with the integrity of the whole chain.
#[derive(Debug, Serialize)]
pub struct AuditTrailView {
    pub integrity: ChainIntegrity,
    pub links: Page<AuditTrailRecord>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/metrics", get(metrics))
        .route("/v1/admin/settings", get(settings))
        .route("/v1/admin/audit-trail", get(audit_trail))
}

/// GET /v1/admin/metrics
#[utoipa::path(
    get,
    path = "/v1/admin/metrics",
    responses(
        (status = 200, description = "Request counters since start", body = MetricsSnapshot),
        (status = 403, description = "Requires admin_access", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn metrics(
    caller: CallerIdentity,
    Extension(metrics): Extension<ApiMetrics>,
) -> Result<Json<MetricsSnapshot>, AppError> {
    require_any(&caller, &[Permission::AdminAccess])?;
    Ok(Json(metrics.snapshot()))
}

/// GET /v1/admin/settings
#[utoipa::path(
    get,
    path = "/v1/admin/settings",
    responses(
        (status = 200, description = "Effective configuration without secrets"),
        (status = 403, description = "Requires manage_system_settings", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn settings(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<serde_json::Value>, AppError> {
    require_any(&caller, &[Permission::ManageSystemSettings])?;
    Ok(Json(state.config.redacted()))
}

/// GET /v1/admin/audit-trail
#[utoipa::path(
    get,
    path = "/v1/admin/audit-trail",
    params(PageParams),
    responses(
        (status = 200, description = "Audit trail page and chain integrity"),
        (status = 403, description = "Requires view_audit_logs", body = crate::error::ErrorBody),
    ),
    tag = "admin"
)]
async fn audit_trail(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(page): Query<PageParams>,
) -> Result<Json<AuditTrailView>, AppError> {
    require_any(&caller, &[Permission::ViewAuditLogs])?;
    let mut links = state.audit_trail.list();
    links.sort_by_key(|l| l.seq);
    let integrity = verify_chain(&links);
    if !integrity.chain_valid {
        tracing::error!(broken_links = integrity.broken_links, "audit trail chain is broken");
    }
    links.reverse();
    Ok(Json(AuditTrailView {
        integrity,
        links: Page::of(links, page, state.config.items_per_page),
    }))
}
