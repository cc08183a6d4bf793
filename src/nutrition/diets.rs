use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::extractors::CurrentUser;
use crate::error::ApiError;
use crate::nutrition::dto::{DietListQuery, DietOut, DietPatch, DietPayload};
use crate::nutrition::repo::{Diet, DietFilter};
use crate::pagination::{order_clause, Page, PageParams};
use crate::state::AppState;

const ORDERING_FIELDS: &[&str] = &["created_at", "updated_at", "start_date"];
const DEFAULT_ORDERING: &str = "created_at DESC";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/diets", get(list_diets).post(create_diet))
        .route("/diets/active", get(active_diet))
        .route(
            "/diets/:id",
            get(get_diet)
                .put(update_diet)
                .patch(patch_diet)
                .delete(delete_diet),
        )
        .route("/diets/:id/activate", post(activate_diet))
}

#[instrument(skip(state))]
async fn list_diets(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(q): Query<DietListQuery>,
) -> Result<Json<Page<DietOut>>, ApiError> {
    let params = PageParams::from_parts(q.page, q.page_size);
    let order = order_clause(q.ordering.as_deref(), ORDERING_FIELDS, DEFAULT_ORDERING);
    let filter = DietFilter {
        is_active: q.is_active,
        start_date: q.start_date,
        end_date: q.end_date,
        search: q.search,
    };
    let (rows, count) = Diet::page(
        &state.db,
        user_id,
        &filter,
        &order,
        params.limit(),
        params.offset(),
    )
    .await?;
    let results = rows.into_iter().map(DietOut::from).collect();
    Ok(Json(Page::new(results, count, params, &uri)))
}

#[instrument(skip(state, payload))]
async fn create_diet(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<DietPayload>,
) -> Result<(StatusCode, Json<DietOut>), ApiError> {
    let data = payload.validate()?;
    let diet = Diet::insert(&state.db, user_id, &data).await?;
    info!(%user_id, diet_id = %diet.id, "diet created");
    Ok((StatusCode::CREATED, Json(diet.into())))
}

#[instrument(skip(state))]
async fn get_diet(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DietOut>, ApiError> {
    let diet = Diet::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Diet"))?;
    Ok(Json(diet.into()))
}

#[instrument(skip(state, payload))]
async fn update_diet(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DietPayload>,
) -> Result<Json<DietOut>, ApiError> {
    let data = payload.validate()?;
    let diet = Diet::update(&state.db, user_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::not_found("Diet"))?;
    Ok(Json(diet.into()))
}

#[instrument(skip(state, payload))]
async fn patch_diet(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<DietPatch>,
) -> Result<Json<DietOut>, ApiError> {
    let current = Diet::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Diet"))?;
    let data = payload.merge_into(&current).validate()?;
    let diet = Diet::update(&state.db, user_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::not_found("Diet"))?;
    Ok(Json(diet.into()))
}

#[instrument(skip(state))]
async fn delete_diet(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !Diet::delete(&state.db, user_id, id).await? {
        return Err(ApiError::not_found("Diet"));
    }
    info!(%user_id, diet_id = %id, "diet deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Activate a diet, deactivating the user's others.
#[instrument(skip(state))]
async fn activate_diet(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    Diet::activate(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Diet"))?;
    info!(%user_id, diet_id = %id, "diet activated");
    Ok(Json(json!({ "status": "diet activated" })))
}

/// The currently active diet, if any.
#[instrument(skip(state))]
async fn active_diet(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<DietOut>, ApiError> {
    let diet = Diet::active(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No active diet found.".into()))?;
    Ok(Json(diet.into()))
}
