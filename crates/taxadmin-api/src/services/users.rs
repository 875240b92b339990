//! User administration.

use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::changeset::ChangeSet;
use crate::error::AppError;
use crate::extractors::{length_between, Validate};
use crate::records::{UserRecord, UserTypeRecord};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    /// Name of a user type such as `Individual` or `Internal`.
    pub user_type: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl Validate for CreateUser {
    fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        length_between(&mut errors, "username", &self.username, 3, 64);
        let email = self.email.trim();
        let valid_email = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.ends_with('.'));
        if !valid_email {
            errors.push("email must be a valid email address".to_string());
        }
        errors
    }
}

pub fn list_user_types(state: &AppState) -> Vec<UserTypeRecord> {
    let mut types = state.user_types.list();
    types.sort_by(|a, b| a.name.cmp(&b.name));
    types
}

/// Users in creation order.
pub fn list_users(state: &AppState) -> Vec<UserRecord> {
    let mut users = state.users.list();
    users.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.username.cmp(&b.username)));
    users
}

pub async fn create_user(
    state: &AppState,
    caller: &CallerIdentity,
    request: CreateUser,
) -> Result<UserRecord, AppError> {
    let username = request.username.trim().to_string();
    let email = request.email.trim().to_string();

    let mut errors = Vec::new();
    let user_type = state
        .user_types
        .find(|t| t.name.eq_ignore_ascii_case(request.user_type.trim()));
    if user_type.is_none() {
        errors.push(format!("unknown user type '{}'", request.user_type.trim()));
    }
    if state.users.any(|u| u.username.eq_ignore_ascii_case(&username)) {
        errors.push("Username already taken.".to_string());
    }
    if state.users.any(|u| u.email.eq_ignore_ascii_case(&email)) {
        errors.push("Email already registered.".to_string());
    }
    if !errors.is_empty() {
        return Err(AppError::InvalidFields(errors));
    }

    let non_blank = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    let user = UserRecord {
        id: Uuid::new_v4(),
        username,
        email,
        first_name: non_blank(request.first_name),
        last_name: non_blank(request.last_name),
        phone: non_blank(request.phone),
        user_type_id: user_type.map(|t| t.id),
        is_admin: request.is_admin,
        is_active: true,
        created_at: Utc::now(),
    };

    let mut cs = ChangeSet::new();
    cs.put(user.clone());
    cs.audit(
        caller.user_id,
        "create_user",
        "user",
        Some(user.id),
        serde_json::json!({ "username": user.username, "is_admin": user.is_admin }),
    );
    cs.commit(state).await?;

    tracing::info!(user_id = %user.id, username = %user.username, "user created");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxadmin_core::PermissionSet;

    fn admin() -> CallerIdentity {
        CallerIdentity {
            user_id: None,
            username: "admin".into(),
            is_admin: true,
            user_type: None,
            permissions: PermissionSet::new(),
        }
    }

    fn request(username: &str, email: &str, user_type: &str) -> CreateUser {
        CreateUser {
            username: username.into(),
            email: email.into(),
            user_type: user_type.into(),
            first_name: Some("  ".into()),
            last_name: None,
            phone: None,
            is_admin: false,
        }
    }

    fn seed_type(state: &AppState, name: &str) {
        let id = Uuid::new_v4();
        state.user_types.insert(
            id,
            UserTypeRecord {
                id,
                name: name.into(),
                description: String::new(),
                created_at: Utc::now(),
            },
        );
    }

    #[test]
    fn field_rules() {
        assert_eq!(request("ab", "x@example.com", "Individual").validate().len(), 1);
        assert_eq!(request("abc", "not-an-email", "Individual").validate().len(), 1);
        assert!(request("abc", "abc@example.com", "Individual").validate().is_empty());
    }

    #[tokio::test]
    async fn duplicates_and_unknown_type_are_listed_together() {
        let state = AppState::new();
        seed_type(&state, "Individual");
        let created = create_user(&state, &admin(), request("ngozi", "ngozi@example.com", "individual"))
            .await
            .unwrap();
        assert!(created.user_type_id.is_some());
        assert!(created.first_name.is_none());

        let err = create_user(&state, &admin(), request("NGOZI", "Ngozi@example.com", "Wizard"))
            .await
            .unwrap_err();
        match err {
            AppError::InvalidFields(errors) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(list_users(&state).len(), 1);
    }
}
