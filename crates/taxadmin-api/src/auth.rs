//! # Authentication & Authorization Middleware
//!
//! Bearer token middleware resolving the caller's permission set.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {user_id}:{secret}   acts as that user
//! Bearer {secret}             system administrator
//! ```
//!
//! The secret is the configured `AUTH_TOKEN`. The user's permissions are
//! resolved from the policy table on every request, so a change of user
//! type or admin flag takes effect immediately.
//!
//! ## CallerIdentity
//!
//! Every authenticated request gets a [`CallerIdentity`] injected into the
//! request extensions. Handlers extract it via the `FromRequestParts` impl.

use axum::extract::{Request, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use subtle::ConstantTimeEq;
use taxadmin_core::permissions::UserType;
use taxadmin_core::{Permission, PermissionSet};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, ErrorBody, ErrorDetail};
use crate::records::AccountRecord;
use crate::state::AppState;

/// Username of the seeded administrator the system token acts as.
pub const SYSTEM_ADMIN_USERNAME: &str = "admin";

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CallerIdentity {
    /// The acting user. `None` only for the system token before the admin
    /// user has been seeded.
    pub user_id: Option<Uuid>,
    pub username: String,
    pub is_admin: bool,
    pub user_type: Option<String>,
    #[schema(value_type = Vec<String>)]
    pub permissions: PermissionSet,
}

impl CallerIdentity {
    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(permission)
    }

    pub fn has_any(&self, permissions: &[Permission]) -> bool {
        self.permissions.contains_any(permissions)
    }

    /// Officers and administrators see every account; everyone else only
    /// their own.
    pub fn sees_all_accounts(&self) -> bool {
        self.has_any(&[Permission::ViewAllAccounts, Permission::AdminAccess])
    }

    pub fn can_access_account(&self, account: &AccountRecord) -> bool {
        self.sees_all_accounts() || self.user_id == Some(account.user_id)
    }

    /// The acting user id, required for operations that record ownership.
    pub fn require_user(&self) -> Result<Uuid, AppError> {
        self.user_id
            .ok_or_else(|| AppError::Forbidden("operation requires a user identity".into()))
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// 403 unless the caller holds at least one of `permissions`.
pub fn require_any(caller: &CallerIdentity, permissions: &[Permission]) -> Result<(), AppError> {
    if caller.has_any(permissions) {
        return Ok(());
    }
    let names: Vec<&str> = permissions.iter().map(|p| p.as_str()).collect();
    Err(AppError::Forbidden(format!(
        "one of the permissions [{}] is required",
        names.join(", ")
    )))
}

/// 403 unless the caller may see `account`.
pub fn require_account_access(caller: &CallerIdentity, account: &AccountRecord) -> Result<(), AppError> {
    if caller.can_access_account(account) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "no access to account {}",
            account.account_number
        )))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

// ── Token Validation ────────────────────────────────────────────────────────

/// Constant-time comparison of bearer secrets.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Who a valid token speaks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSubject {
    System,
    User(Uuid),
}

/// Parse `{user_id}:{secret}` or `{secret}`.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<TokenSubject, String> {
    match provided.split_once(':') {
        None => {
            if constant_time_token_eq(provided, expected_secret) {
                Ok(TokenSubject::System)
            } else {
                Err("invalid bearer token".into())
            }
        }
        Some((user, secret)) => {
            if !constant_time_token_eq(secret, expected_secret) {
                return Err("invalid bearer token".into());
            }
            let id = user
                .parse::<Uuid>()
                .map_err(|e| format!("invalid user id: {e}"))?;
            Ok(TokenSubject::User(id))
        }
    }
}

/// Build the identity for a token subject against the user directory.
pub fn resolve_identity(state: &AppState, subject: TokenSubject) -> Result<CallerIdentity, String> {
    match subject {
        TokenSubject::System => {
            let admin = state.users.find(|u| u.username == SYSTEM_ADMIN_USERNAME);
            Ok(CallerIdentity {
                user_id: admin.map(|u| u.id),
                username: SYSTEM_ADMIN_USERNAME.to_string(),
                is_admin: true,
                user_type: Some(UserType::Administrator.name().to_string()),
                permissions: state
                    .policy
                    .resolve(Some(UserType::Administrator.name()), true),
            })
        }
        TokenSubject::User(id) => {
            let user = state
                .users
                .get(&id)
                .filter(|u| u.is_active)
                .ok_or_else(|| "unknown or inactive user".to_string())?;
            let user_type = state.user_type_name(user.user_type_id);
            Ok(CallerIdentity {
                user_id: Some(user.id),
                username: user.username,
                is_admin: user.is_admin,
                permissions: state.policy.resolve(user_type.as_deref(), user.is_admin),
                user_type,
            })
        }
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the bearer token and inject the caller's [`CallerIdentity`].
///
/// When `AuthConfig.token` is `None` every request acts as the system
/// administrator (development mode).
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    let subject = match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header {
                Some(header_value) if header_value.starts_with("Bearer ") => {
                    match parse_bearer_token(&header_value[7..], expected) {
                        Ok(subject) => subject,
                        Err(msg) => {
                            tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                            return unauthorized_response(&msg);
                        }
                    }
                }
                Some(_) => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    return unauthorized_response("authorization header must use Bearer scheme");
                }
                None => {
                    tracing::warn!("authentication failed: missing authorization header");
                    return unauthorized_response("missing authorization header");
                }
            }
        }
        _ => TokenSubject::System,
    };

    match resolve_identity(&state, subject) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(msg) => {
            tracing::warn!(reason = %msg, "authentication failed: unresolvable identity");
            unauthorized_response(&msg)
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
