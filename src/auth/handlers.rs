use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    dto::{
        ApiTokenResponse, LoginRequest, PublicUser, RefreshRequest, RegisterRequest,
        RegisterResponse, SessionLoginResponse, TokenPair, VerifyRequest,
    },
    extractors::{CurrentUser, CSRF_COOKIE, SESSION_COOKIE},
    jwt::JwtKeys,
    password::{hash_password, verify_password},
    repo::{self, ApiToken, NewUser, Session, User},
};
use crate::error::{ApiError, FieldErrors};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/jwt/token", post(obtain_jwt_pair))
        .route("/jwt/token/refresh", post(refresh_jwt))
        .route("/jwt/token/verify", post(verify_jwt))
        .route("/token", post(obtain_api_token))
        .route("/session/login", post(session_login))
        .route("/session/logout", post(session_logout))
        .route("/me", get(get_me))
}

/// Sign an access/refresh pair and register the refresh jti so it can be
/// revoked on rotation.
async fn issue_pair(state: &AppState, user_id: Uuid) -> Result<TokenPair, ApiError> {
    let keys = JwtKeys::from_config(&state.config.jwt);
    let access = keys.sign_access(user_id)?;
    let refresh = keys.sign_refresh(user_id)?;
    repo::register_refresh(&state.db, refresh.jti, user_id, refresh.expires_at).await?;
    Ok(TokenPair {
        access,
        refresh: refresh.token,
    })
}

async fn authenticate(
    state: &AppState,
    username: &str,
    password: &str,
) -> Result<User, ApiError> {
    let invalid =
        || ApiError::Unauthorized("No active account found with the given credentials.".into());

    let user = User::find_by_username(&state.db, username)
        .await?
        .ok_or_else(|| {
            warn!(%username, "login unknown username");
            invalid()
        })?;

    if !verify_password(password, &user.password_hash)? {
        warn!(%username, user_id = %user.id, "login invalid password");
        return Err(invalid());
    }
    if !user.is_active {
        warn!(%username, user_id = %user.id, "login inactive account");
        return Err(invalid());
    }
    Ok(user)
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();
    payload.validate()?;

    let mut errors = FieldErrors::new();
    if User::username_taken(&state.db, &payload.username).await? {
        errors.push("username", "A user with that username already exists.");
    }
    if User::email_taken(&state.db, &payload.email, None).await? {
        errors.push("email", "A user with this email already exists.");
    }
    errors.into_result()?;

    let password_hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        NewUser {
            username: &payload.username,
            email: &payload.email,
            first_name: &payload.first_name,
            last_name: &payload.last_name,
            password_hash: &password_hash,
        },
    )
    .await?;

    let tokens = issue_pair(&state, user.id).await?;
    info!(user_id = %user.id, username = %user.username, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user.into(),
            tokens,
            message: "User created successfully",
        }),
    ))
}

#[instrument(skip(state, payload))]
async fn obtain_jwt_pair(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let user = authenticate(&state, &payload.username, &payload.password).await?;
    let pair = issue_pair(&state, user.id).await?;
    info!(user_id = %user.id, "jwt pair issued");
    Ok(Json(pair))
}

#[instrument(skip(state, payload))]
async fn refresh_jwt(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let invalid = || ApiError::Unauthorized("Token is invalid or expired.".into());

    let keys = JwtKeys::from_config(&state.config.jwt);
    let claims = keys.verify_refresh(&payload.refresh).map_err(|_| invalid())?;

    // Rotation: the presented token is burned whether or not a new pair
    // gets issued. A revoked or unknown jti means reuse or logout.
    if !repo::consume_refresh(&state.db, claims.jti).await? {
        warn!(user_id = %claims.sub, jti = %claims.jti, "refresh token reuse or revoked");
        return Err(invalid());
    }

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(invalid)?;

    let pair = issue_pair(&state, user.id).await?;
    info!(user_id = %user.id, "jwt pair rotated");
    Ok(Json(pair))
}

#[instrument(skip(state, payload))]
async fn verify_jwt(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<Value>, ApiError> {
    let keys = JwtKeys::from_config(&state.config.jwt);
    keys.verify(&payload.token)
        .map_err(|_| ApiError::Unauthorized("Token is invalid or expired.".into()))?;
    Ok(Json(json!({})))
}

#[instrument(skip(state, payload))]
async fn obtain_api_token(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiTokenResponse>, ApiError> {
    let user = authenticate(&state, &payload.username, &payload.password).await?;
    let token = ApiToken::get_or_create(&state.db, user.id).await?;
    info!(user_id = %user.id, "api token issued");
    Ok(Json(ApiTokenResponse {
        token: token.key,
        user_id: user.id,
        username: user.username,
        email: user.email,
    }))
}

#[instrument(skip(state, jar, payload))]
async fn session_login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<SessionLoginResponse>), ApiError> {
    let user = authenticate(&state, &payload.username, &payload.password).await?;
    let session = Session::create(&state.db, user.id, state.config.session_ttl_minutes).await?;

    let session_cookie = Cookie::build((SESSION_COOKIE, session.key.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    // Readable by the client so it can be echoed in X-CSRF-Token.
    let csrf_cookie = Cookie::build((CSRF_COOKIE, session.csrf_token.clone()))
        .path("/")
        .same_site(SameSite::Lax)
        .build();

    info!(user_id = %user.id, "session created");
    Ok((
        jar.add(session_cookie).add(csrf_cookie),
        Json(SessionLoginResponse {
            detail: "Login successful.",
            csrf_token: session.csrf_token,
        }),
    ))
}

#[instrument(skip(state, jar))]
async fn session_logout(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>), ApiError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        Session::delete(&state.db, cookie.value()).await?;
    }
    let jar = jar
        .remove(Cookie::from(SESSION_COOKIE))
        .remove(Cookie::from(CSRF_COOKIE));
    info!(%user_id, "session ended");
    Ok((jar, Json(json!({ "detail": "Logged out." }))))
}

#[instrument(skip(state))]
async fn get_me(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found.".into()))?;
    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_response_shape() {
        let user = User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: "secret-hash".into(),
            is_active: true,
            date_joined: time::OffsetDateTime::UNIX_EPOCH,
        };
        let response = RegisterResponse {
            user: user.into(),
            tokens: TokenPair {
                access: "a".into(),
                refresh: "r".into(),
            },
            message: "User created successfully",
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["user"]["username"], "alice");
        assert_eq!(json["tokens"]["access"], "a");
        // The hash must never serialize.
        assert!(json["user"].get("password_hash").is_none());
    }
}
