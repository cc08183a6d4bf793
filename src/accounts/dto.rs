use serde::{Deserialize, Serialize};

use crate::auth::dto::{is_valid_email, PublicUser};
use crate::error::{ApiError, FieldErrors};

/// Partial profile update; absent fields stay unchanged.
#[derive(Debug, Deserialize)]
pub struct ProfileUpdateRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ProfileUpdateRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let Some(email) = &self.email {
            if !is_valid_email(email) {
                errors.push("email", "Enter a valid email address.");
            }
        }
        errors.into_result()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub new_password_confirm: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if self.new_password.len() < 8 {
            errors.push(
                "new_password",
                "Ensure this field has at least 8 characters.",
            );
        }
        if self.new_password != self.new_password_confirm {
            errors.push("new_password_confirm", "New passwords don't match.");
        }
        errors.into_result()
    }
}

#[derive(Debug, Serialize)]
pub struct ProfileUpdateResponse {
    pub user: PublicUser,
    pub message: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_are_valid() {
        let req = ProfileUpdateRequest {
            email: None,
            first_name: None,
            last_name: None,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn bad_email_is_a_field_error() {
        let req = ProfileUpdateRequest {
            email: Some("nope".into()),
            first_name: None,
            last_name: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn password_change_rules() {
        let req = ChangePasswordRequest {
            old_password: "old-password".into(),
            new_password: "short".into(),
            new_password_confirm: "other".into(),
        };
        let Err(ApiError::Validation(errors)) = req.validate() else {
            panic!("expected validation error");
        };
        let json = serde_json::to_value(&errors).unwrap();
        assert!(json.get("new_password").is_some());
        assert!(json.get("new_password_confirm").is_some());
    }
}
