//! # taxadmin-api: Axum API for the Tax Administration Back Office
//!
//! ## API Surface
//!
//! | Prefix                | Module                      | Domain                         |
//! |-----------------------|-----------------------------|--------------------------------|
//! | `/v1/auth/*`          | [`routes::auth`]            | Identity, users, user types    |
//! | `/v1/dashboard/*`     | [`routes::dashboard`]       | Statistics, notifications      |
//! | `/v1/e-services/*`    | [`routes::e_services`]      | Taxpayer self-service          |
//! | `/v1/tax/*`           | [`routes::tax`]             | Filing, payments, refunds, ... |
//! | `/v1/process/*`       | [`routes::process`]         | Audits, requests, collections  |
//! | `/v1/registration/*`  | [`routes::registration`]    | Taxpayer registration          |
//! | `/v1/reporting/*`     | [`routes::reporting`]       | Management reports             |
//! | `/v1/admin/*`         | [`routes::admin`]           | Metrics, settings, audit trail |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Generated from utoipa annotations and served at `/openapi.json`.

pub mod auth;
pub mod bootstrap;
pub mod changeset;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod pagination;
pub mod records;
pub mod routes;
pub mod services;
pub mod state;
pub mod trail;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::IntoResponse;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Assemble the application router.
///
/// Health probes and `/openapi.json` are mounted outside the auth
/// middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = ApiMetrics::new();

    let api = Router::new()
        .merge(routes::auth::router())
        .merge(routes::dashboard::router())
        .merge(routes::e_services::router())
        .merge(routes::tax::router())
        .merge(routes::process::router())
        .merge(routes::registration::router())
        .merge(routes::reporting::router())
        .merge(routes::admin::router())
        .layer(DefaultBodyLimit::max(state.config.max_content_length))
        .layer(from_fn_with_state(state.clone(), auth::auth_middleware))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .layer(Extension(metrics))
        .with_state(state.clone());

    let unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .merge(openapi::router())
        .with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// Liveness probe: 200 while the process runs.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: 503 when the configured database is unreachable.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }

    (StatusCode::OK, "ready").into_response()
}
