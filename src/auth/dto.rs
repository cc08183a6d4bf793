use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::User;
use crate::error::{ApiError, FieldErrors};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if self.username.trim().is_empty() {
            errors.push("username", "This field may not be blank.");
        } else if self.username.len() > 150 {
            errors.push(
                "username",
                "Ensure this field has no more than 150 characters.",
            );
        }
        if !is_valid_email(&self.email) {
            errors.push("email", "Enter a valid email address.");
        }
        if self.password.len() < 8 {
            errors.push(
                "password",
                "Ensure this field has at least 8 characters.",
            );
        }
        if self.password != self.password_confirm {
            errors.push("password_confirm", "Passwords don't match.");
        }
        errors.into_result()
    }
}

/// Credentials for the JWT, API-token and session login endpoints.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh: String,
}

/// Request body for token verification.
#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// User representation safe to return to clients.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date_joined: OffsetDateTime,
    pub is_active: bool,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            date_joined: user.date_joined,
            is_active: user.is_active,
        }
    }
}

/// Response returned after registration.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: PublicUser,
    pub tokens: TokenPair,
    pub message: &'static str,
}

/// Response of the static API token endpoint.
#[derive(Debug, Serialize)]
pub struct ApiTokenResponse {
    pub token: String,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SessionLoginResponse {
    pub detail: &'static str,
    pub csrf_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "hunter2hunter2".into(),
            password_confirm: "hunter2hunter2".into(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn email_format_is_checked() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@c.de"));
    }

    #[test]
    fn short_password_and_mismatch_are_both_reported() {
        let mut req = request();
        req.password = "short".into();
        req.password_confirm = "different".into();
        let Err(ApiError::Validation(errors)) = req.validate() else {
            panic!("expected validation error");
        };
        let json = serde_json::to_value(&errors).unwrap();
        assert!(json.get("password").is_some());
        assert!(json.get("password_confirm").is_some());
    }

    #[test]
    fn blank_username_is_rejected() {
        let mut req = request();
        req.username = "  ".into();
        assert!(req.validate().is_err());
    }
}
