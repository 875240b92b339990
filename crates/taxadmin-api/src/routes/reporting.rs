//! # Reporting API
//!
//! - **GET `/v1/reporting/reports`**: the report catalogue
//! - **GET `/v1/reporting/generate`**: build one report for a date range
//! - **GET `/v1/reporting/dashboards`**: rolling-year analytics with
//!   registration counts
//!
//! The catalogue and reports require `view_reports` or `admin_access`; the
//! dashboards also admit `view_statistics`.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use taxadmin_core::Permission;

use crate::auth::{require_any, CallerIdentity};
use crate::error::AppError;
use crate::services::reporting::{self, DashboardAnalytics, Report, ReportInfo, ReportQuery};
use crate::services::today;
use crate::state::AppState;

const REPORT_VIEWERS: &[Permission] = &[Permission::ViewReports, Permission::AdminAccess];
const DASHBOARD_VIEWERS: &[Permission] = &[
    Permission::ViewReports,
    Permission::ViewStatistics,
    Permission::AdminAccess,
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/reporting/reports", get(list_reports))
        .route("/v1/reporting/generate", get(generate_report))
        .route("/v1/reporting/dashboards", get(dashboards))
}

/// GET /v1/reporting/reports
#[utoipa::path(
    get,
    path = "/v1/reporting/reports",
    responses(
        (status = 200, description = "Available reports", body = Vec<ReportInfo>),
        (status = 403, description = "Requires view_reports", body = crate::error::ErrorBody),
    ),
    tag = "reporting"
)]
async fn list_reports(caller: CallerIdentity) -> Result<Json<Vec<ReportInfo>>, AppError> {
    require_any(&caller, REPORT_VIEWERS)?;
    Ok(Json(reporting::available_reports()))
}

/// GET /v1/reporting/generate
#[utoipa::path(
    get,
    path = "/v1/reporting/generate",
    params(ReportQuery),
    responses(
        (status = 200, description = "Report body, shaped by report_type"),
        (status = 403, description = "Requires view_reports", body = crate::error::ErrorBody),
        (status = 404, description = "Unknown tax type", body = crate::error::ErrorBody),
        (status = 422, description = "Unknown report type or inverted date range", body = crate::error::ErrorBody),
    ),
    tag = "reporting"
)]
async fn generate_report(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Report>, AppError> {
    require_any(&caller, REPORT_VIEWERS)?;
    let report = reporting::generate(&state, &query)?;
    tracing::info!(
        report_type = %query.report_type,
        user = %caller.username,
        "report generated"
    );
    Ok(Json(report))
}

/// GET /v1/reporting/dashboards
#[utoipa::path(
    get,
    path = "/v1/reporting/dashboards",
    responses(
        (status = 200, description = "Rolling-year analytics and registration counts"),
        (status = 403, description = "Requires view_reports or view_statistics", body = crate::error::ErrorBody),
    ),
    tag = "reporting"
)]
async fn dashboards(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<Json<DashboardAnalytics>, AppError> {
    require_any(&caller, DASHBOARD_VIEWERS)?;
    Ok(Json(reporting::dashboards(&state, today())))
}
