use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::error;

/// Per-field validation messages, keyed by field name. Every failing field is
/// reported, not just the first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Ok when nothing was collected, otherwise a 400 with all messages.
    pub fn into_result(self) -> Result<(), ApiError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found."))
    }

    /// Single-field validation error.
    pub fn field(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.push(field, message);
        Self::Validation(errors)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        let classified = e.downcast_ref::<sqlx::Error>().and_then(classify_sqlx);
        classified.unwrap_or(Self::Internal(e))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        let classified = classify_sqlx(&e);
        classified.unwrap_or_else(|| Self::Internal(e.into()))
    }
}

// Unique violations become 409s; everything else database-shaped is a 500.
fn classify_sqlx(e: &sqlx::Error) -> Option<ApiError> {
    match e {
        sqlx::Error::RowNotFound => Some(ApiError::NotFound("Not found.".into())),
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            Some(ApiError::Conflict("The resource already exists.".into()))
        }
        _ => None,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(fields) => (StatusCode::BAD_REQUEST, Json(fields)).into_response(),
            Self::Unauthorized(detail) => detail_response(StatusCode::UNAUTHORIZED, &detail),
            Self::Forbidden(detail) => detail_response(StatusCode::FORBIDDEN, &detail),
            Self::NotFound(detail) => detail_response(StatusCode::NOT_FOUND, &detail),
            Self::Conflict(detail) => detail_response(StatusCode::CONFLICT, &detail),
            Self::Internal(e) => {
                error!(error = %e, "unhandled error");
                detail_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
            }
        }
    }
}

fn detail_response(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_collects_all_messages() {
        let mut errors = FieldErrors::new();
        errors.push("name", "This field is required.");
        errors.push("end_date", "end_date must be on or after start_date.");
        errors.push("name", "Ensure this field has no more than 200 characters.");

        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["name"].as_array().unwrap().len(), 2);
        assert_eq!(
            json["end_date"][0],
            "end_date must be on or after start_date."
        );
    }

    #[test]
    fn empty_field_errors_is_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn populated_field_errors_is_validation() {
        let mut errors = FieldErrors::new();
        errors.push("value", "Ensure this value is greater than or equal to 0.");
        match errors.into_result() {
            Err(ApiError::Validation(_)) => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn row_not_found_maps_to_404() {
        match ApiError::from(sqlx::Error::RowNotFound) {
            ApiError::NotFound(_) => {}
            other => panic!("expected not found, got {other:?}"),
        }
    }
}
