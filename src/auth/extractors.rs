use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, Method},
};
use axum_extra::extract::cookie::CookieJar;
use subtle::ConstantTimeEq;
use tracing::warn;
use uuid::Uuid;

use crate::auth::jwt::JwtKeys;
use crate::auth::repo::{ApiToken, Session};
use crate::error::ApiError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sessionid";
pub const CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// The authenticated principal. Resource handlers take this regardless of
/// which credential scheme authenticated the request: Bearer JWT, static
/// `Token` key, or session cookie — first match wins.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        if let Some(header) = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        {
            if let Some(token) = header.strip_prefix("Bearer ") {
                let keys = JwtKeys::from_config(&state.config.jwt);
                let claims = keys.verify_access(token).map_err(|_| {
                    warn!("invalid or expired access token");
                    ApiError::Unauthorized("Invalid or expired token.".into())
                })?;
                return Ok(CurrentUser(claims.sub));
            }
            if let Some(key) = header.strip_prefix("Token ") {
                let user = ApiToken::find_user(&state.db, key)
                    .await?
                    .filter(|u| u.is_active)
                    .ok_or_else(|| ApiError::Unauthorized("Invalid token.".into()))?;
                return Ok(CurrentUser(user.id));
            }
            return Err(ApiError::Unauthorized(
                "Unsupported authorization scheme.".into(),
            ));
        }

        let jar = CookieJar::from_headers(&parts.headers);
        if let Some(cookie) = jar.get(SESSION_COOKIE) {
            let session = Session::find_valid(&state.db, cookie.value())
                .await?
                .ok_or_else(|| ApiError::Unauthorized("Invalid or expired session.".into()))?;
            // Cookie credentials are ambient, so unsafe methods must prove
            // the request originated from a page that can read the token.
            if requires_csrf(&parts.method) {
                let provided = parts
                    .headers
                    .get(CSRF_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("");
                if !csrf_matches(provided, &session.csrf_token) {
                    return Err(ApiError::Forbidden(
                        "CSRF token missing or incorrect.".into(),
                    ));
                }
            }
            return Ok(CurrentUser(session.user_id));
        }

        Err(ApiError::Unauthorized(
            "Authentication credentials were not provided.".into(),
        ))
    }
}

fn requires_csrf(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn csrf_matches(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_methods_skip_csrf() {
        assert!(!requires_csrf(&Method::GET));
        assert!(!requires_csrf(&Method::HEAD));
        assert!(!requires_csrf(&Method::OPTIONS));
    }

    #[test]
    fn unsafe_methods_require_csrf() {
        assert!(requires_csrf(&Method::POST));
        assert!(requires_csrf(&Method::PUT));
        assert!(requires_csrf(&Method::PATCH));
        assert!(requires_csrf(&Method::DELETE));
    }

    #[test]
    fn csrf_compare_is_exact() {
        assert!(csrf_matches("abc123", "abc123"));
        assert!(!csrf_matches("abc123", "abc124"));
        assert!(!csrf_matches("", "abc123"));
    }
}
