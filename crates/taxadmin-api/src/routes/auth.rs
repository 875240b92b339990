//! # Identity API
//!
//! - **GET `/v1/auth/me`**: the caller and their resolved permissions
//! - **GET `/v1/auth/user-types`**: the user type directory
//! - **GET/POST `/v1/auth/users`**: user administration (`manage_users`)

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use taxadmin_core::Permission;

use crate::auth::{require_any, CallerIdentity};
use crate::error::AppError;
use crate::extractors::extract_validated_json;
use crate::pagination::{Page, PageParams};
use crate::records::{UserRecord, UserTypeRecord};
use crate::services::users::{self, CreateUser};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/auth/me", get(me))
        .route("/v1/auth/user-types", get(list_user_types))
        .route("/v1/auth/users", get(list_users).post(create_user))
}

/// GET /v1/auth/me
#[utoipa::path(
    get,
    path = "/v1/auth/me",
    responses(
        (status = 200, description = "Caller identity", body = CallerIdentity),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn me(caller: CallerIdentity) -> Json<CallerIdentity> {
    Json(caller)
}

/// GET /v1/auth/user-types
#[utoipa::path(
    get,
    path = "/v1/auth/user-types",
    responses((status = 200, description = "User types", body = Vec<UserTypeRecord>)),
    tag = "auth"
)]
async fn list_user_types(State(state): State<AppState>) -> Json<Vec<UserTypeRecord>> {
    Json(users::list_user_types(&state))
}

/// GET /v1/auth/users
#[utoipa::path(
    get,
    path = "/v1/auth/users",
    params(PageParams),
    responses(
        (status = 200, description = "Page of users"),
        (status = 403, description = "Requires manage_users", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn list_users(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(page): Query<PageParams>,
) -> Result<Json<Page<UserRecord>>, AppError> {
    require_any(&caller, &[Permission::ManageUsers])?;
    Ok(Json(Page::of(users::list_users(&state), page, state.config.items_per_page)))
}

/// POST /v1/auth/users
#[utoipa::path(
    post,
    path = "/v1/auth/users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = UserRecord),
        (status = 403, description = "Requires manage_users", body = crate::error::ErrorBody),
        (status = 422, description = "Every field problem under details.errors", body = crate::error::ErrorBody),
    ),
    tag = "auth"
)]
async fn create_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: Result<Json<CreateUser>, JsonRejection>,
) -> Result<(StatusCode, Json<UserRecord>), AppError> {
    require_any(&caller, &[Permission::ManageUsers])?;
    let request = extract_validated_json(body)?;
    let user = users::create_user(&state, &caller, request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}
