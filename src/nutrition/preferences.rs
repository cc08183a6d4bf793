use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::extractors::CurrentUser;
use crate::error::ApiError;
use crate::nutrition::dto::{
    parse_choice, ByTypeQuery, MealPreferenceListQuery, MealPreferenceOut, MealPreferencePatch,
    MealPreferencePayload,
};
use crate::nutrition::repo::{Ingredient, MealPreference, MealPreferenceData, MealPreferenceFilter};
use crate::pagination::{order_clause, Page, PageParams};
use crate::state::AppState;

const ORDERING_FIELDS: &[&str] = &["created_at", "preference_type"];
const DEFAULT_ORDERING: &str = "created_at DESC";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/preferences", get(list_preferences).post(create_preference))
        .route("/preferences/by_type", get(preferences_by_type))
        .route(
            "/preferences/:id",
            get(get_preference)
                .put(update_preference)
                .patch(patch_preference)
                .delete(delete_preference),
        )
}

async fn check_ingredient(
    state: &AppState,
    user_id: Uuid,
    data: &MealPreferenceData,
) -> Result<(), ApiError> {
    if Ingredient::get_visible(&state.db, user_id, data.ingredient_id)
        .await?
        .is_none()
    {
        return Err(ApiError::field(
            "ingredient",
            &format!(
                "Invalid pk \"{}\" - object does not exist.",
                data.ingredient_id
            ),
        ));
    }
    Ok(())
}

#[instrument(skip(state))]
async fn list_preferences(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(q): Query<MealPreferenceListQuery>,
) -> Result<Json<Page<MealPreferenceOut>>, ApiError> {
    let params = PageParams::from_parts(q.page, q.page_size);
    let order = order_clause(q.ordering.as_deref(), ORDERING_FIELDS, DEFAULT_ORDERING);
    let filter = MealPreferenceFilter {
        preference_type: parse_choice("preference_type", &q.preference_type)?,
        ingredient: q.ingredient,
        search: q.search,
    };
    let (rows, count) = MealPreference::page(
        &state.db,
        user_id,
        &filter,
        &order,
        params.limit(),
        params.offset(),
    )
    .await?;
    let results = rows.into_iter().map(MealPreferenceOut::from).collect();
    Ok(Json(Page::new(results, count, params, &uri)))
}

// A second preference for the same ingredient trips the unique constraint
// and surfaces as 409.
#[instrument(skip(state, payload))]
async fn create_preference(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<MealPreferencePayload>,
) -> Result<(StatusCode, Json<MealPreferenceOut>), ApiError> {
    let data = payload.validate()?;
    check_ingredient(&state, user_id, &data).await?;
    let row = MealPreference::insert(&state.db, user_id, &data).await?;
    info!(%user_id, preference_id = %row.id, "meal preference created");
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[instrument(skip(state))]
async fn get_preference(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MealPreferenceOut>, ApiError> {
    let row = MealPreference::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal preference"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state, payload))]
async fn update_preference(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MealPreferencePayload>,
) -> Result<Json<MealPreferenceOut>, ApiError> {
    let data = payload.validate()?;
    check_ingredient(&state, user_id, &data).await?;
    let row = MealPreference::update(&state.db, user_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal preference"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state, payload))]
async fn patch_preference(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MealPreferencePatch>,
) -> Result<Json<MealPreferenceOut>, ApiError> {
    let current = MealPreference::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal preference"))?;
    let data = payload.merge_into(&current).validate()?;
    check_ingredient(&state, user_id, &data).await?;
    let row = MealPreference::update(&state.db, user_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal preference"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state))]
async fn delete_preference(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !MealPreference::delete(&state.db, user_id, id).await? {
        return Err(ApiError::not_found("Meal preference"));
    }
    info!(%user_id, preference_id = %id, "meal preference deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// All preferences, or only those of one type.
#[instrument(skip(state))]
async fn preferences_by_type(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(q): Query<ByTypeQuery>,
) -> Result<Json<Vec<MealPreferenceOut>>, ApiError> {
    let preference_type = parse_choice("type", &q.preference_type)?;
    let rows = MealPreference::list_by_type(&state.db, user_id, preference_type).await?;
    Ok(Json(rows.into_iter().map(MealPreferenceOut::from).collect()))
}
