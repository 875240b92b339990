//! # Custom Extractors & Validation
//!
//! Provides the [`Validate`] trait for request DTOs and helpers to extract
//! and validate JSON bodies in handlers.

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::AppError;

/// Request types that check business rules beyond what serde enforces.
pub trait Validate {
    /// Every problem found, in field order. An empty list means valid.
    fn validate(&self) -> Vec<String>;
}

/// Extract a JSON body, mapping deserialization errors to [`AppError::BadRequest`].
///
/// ```ignore
/// async fn handler(body: Result<Json<T>, JsonRejection>) -> Result<..., AppError> {
///     let req = extract_json(body)?;
/// }
/// ```
pub fn extract_json<T>(result: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    result
        .map(|Json(v)| v)
        .map_err(|err| AppError::BadRequest(err.body_text()))
}

/// Extract a JSON body and validate it, returning all field errors at once.
pub fn extract_validated_json<T: Validate>(
    result: Result<Json<T>, JsonRejection>,
) -> Result<T, AppError> {
    let value = extract_json(result)?;
    let errors = value.validate();
    if errors.is_empty() {
        Ok(value)
    } else {
        Err(AppError::InvalidFields(errors))
    }
}

/// Push `"{field} is required"` when `value` is blank.
pub fn require(errors: &mut Vec<String>, field: &str, value: &str) {
    if value.trim().is_empty() {
        errors.push(format!("{field} is required"));
    }
}

/// Push a length error when `value` is outside `min..=max` characters.
pub fn length_between(errors: &mut Vec<String>, field: &str, value: &str, min: usize, max: usize) {
    let len = value.trim().chars().count();
    if len < min || len > max {
        errors.push(format!("{field} must be between {min} and {max} characters"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    struct Form {
        name: String,
        code: String,
    }

    impl Validate for Form {
        fn validate(&self) -> Vec<String> {
            let mut errors = Vec::new();
            require(&mut errors, "name", &self.name);
            length_between(&mut errors, "code", &self.code, 1, 4);
            errors
        }
    }

    #[test]
    fn collects_all_errors() {
        let form = Form {
            name: " ".into(),
            code: "TOOLONG".into(),
        };
        let err = extract_validated_json(Ok(Json(form))).err().unwrap();
        match err {
            AppError::InvalidFields(errors) => {
                assert_eq!(
                    errors,
                    vec!["name is required", "code must be between 1 and 4 characters"]
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn valid_form_passes() {
        let form = Form {
            name: "VAT".into(),
            code: "V".into(),
        };
        assert!(extract_validated_json(Ok(Json(form))).is_ok());
    }
}
