use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::accounts::dto::{ChangePasswordRequest, ProfileUpdateRequest, ProfileUpdateResponse};
use crate::auth::{
    dto::PublicUser,
    extractors::CurrentUser,
    password::{hash_password, verify_password},
    repo::User,
};
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).patch(update_profile))
        .route("/change-password", post(change_password))
        .route("/delete", post(delete_account))
}

async fn load_user(state: &AppState, user_id: uuid::Uuid) -> Result<User, ApiError> {
    User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found.".into()))
}

#[instrument(skip(state))]
async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = load_user(&state, user_id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<ProfileUpdateRequest>,
) -> Result<Json<ProfileUpdateResponse>, ApiError> {
    payload.validate()?;
    let current = load_user(&state, user_id).await?;

    let email = match payload.email {
        Some(email) => email.trim().to_lowercase(),
        None => current.email.clone(),
    };
    if email != current.email && User::email_taken(&state.db, &email, Some(user_id)).await? {
        warn!(%user_id, "profile update with taken email");
        return Err(ApiError::field(
            "email",
            "A user with this email already exists.",
        ));
    }

    let first_name = payload.first_name.unwrap_or(current.first_name);
    let last_name = payload.last_name.unwrap_or(current.last_name);
    let user = User::update_profile(&state.db, user_id, &email, &first_name, &last_name).await?;

    info!(%user_id, "profile updated");
    Ok(Json(ProfileUpdateResponse {
        user: user.into(),
        message: "Profile updated successfully",
    }))
}

#[instrument(skip(state, payload))]
async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    payload.validate()?;
    let user = load_user(&state, user_id).await?;

    if !verify_password(&payload.old_password, &user.password_hash)? {
        return Err(ApiError::field("old_password", "Old password is incorrect."));
    }

    let password_hash = hash_password(&payload.new_password)?;
    User::set_password(&state.db, user_id, &password_hash).await?;

    info!(%user_id, "password changed");
    Ok(Json(json!({ "message": "Password changed successfully" })))
}

#[instrument(skip(state))]
async fn delete_account(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Value>, ApiError> {
    User::delete(&state.db, user_id).await?;
    info!(%user_id, "account deleted");
    Ok(Json(json!({ "message": "Account deleted successfully" })))
}
