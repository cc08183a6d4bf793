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
    MealIngredientListQuery, MealIngredientOut, MealIngredientPatch, MealIngredientPayload,
};
use crate::nutrition::repo::{
    Ingredient, Meal, MealIngredient, MealIngredientData, MealIngredientFilter,
};
use crate::pagination::{order_clause, Page, PageParams};
use crate::state::AppState;

const ORDERING_FIELDS: &[&str] = &["created_at", "quantity"];
const DEFAULT_ORDERING: &str = "created_at DESC";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/meal-ingredients",
            get(list_meal_ingredients).post(create_meal_ingredient),
        )
        .route(
            "/meal-ingredients/:id",
            get(get_meal_ingredient)
                .put(update_meal_ingredient)
                .patch(patch_meal_ingredient)
                .delete(delete_meal_ingredient),
        )
}

/// The meal must be the caller's and the ingredient visible to them.
async fn check_references(
    state: &AppState,
    user_id: Uuid,
    data: &MealIngredientData,
) -> Result<(), ApiError> {
    if Meal::get(&state.db, user_id, data.meal_id).await?.is_none() {
        return Err(ApiError::field(
            "meal",
            &format!("Invalid pk \"{}\" - object does not exist.", data.meal_id),
        ));
    }
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
async fn list_meal_ingredients(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(q): Query<MealIngredientListQuery>,
) -> Result<Json<Page<MealIngredientOut>>, ApiError> {
    let params = PageParams::from_parts(q.page, q.page_size);
    let order = order_clause(q.ordering.as_deref(), ORDERING_FIELDS, DEFAULT_ORDERING);
    let filter = MealIngredientFilter {
        meal: q.meal,
        ingredient: q.ingredient,
    };
    let (rows, count) = MealIngredient::page(
        &state.db,
        user_id,
        &filter,
        &order,
        params.limit(),
        params.offset(),
    )
    .await?;
    let results = rows.into_iter().map(MealIngredientOut::from).collect();
    Ok(Json(Page::new(results, count, params, &uri)))
}

#[instrument(skip(state, payload))]
async fn create_meal_ingredient(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<MealIngredientPayload>,
) -> Result<(StatusCode, Json<MealIngredientOut>), ApiError> {
    let data = payload.validate(None)?;
    check_references(&state, user_id, &data).await?;
    let row = MealIngredient::insert(&state.db, &data).await?;
    info!(%user_id, meal_ingredient_id = %row.id, "meal ingredient created");
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[instrument(skip(state))]
async fn get_meal_ingredient(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MealIngredientOut>, ApiError> {
    let row = MealIngredient::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal ingredient"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state, payload))]
async fn update_meal_ingredient(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MealIngredientPayload>,
) -> Result<Json<MealIngredientOut>, ApiError> {
    let data = payload.validate(None)?;
    check_references(&state, user_id, &data).await?;
    let row = MealIngredient::update(&state.db, user_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal ingredient"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state, payload))]
async fn patch_meal_ingredient(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MealIngredientPatch>,
) -> Result<Json<MealIngredientOut>, ApiError> {
    let current = MealIngredient::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal ingredient"))?;
    let data = payload.merge_into(&current).validate(None)?;
    check_references(&state, user_id, &data).await?;
    let row = MealIngredient::update(&state.db, user_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal ingredient"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state))]
async fn delete_meal_ingredient(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !MealIngredient::delete(&state.db, user_id, id).await? {
        return Err(ApiError::not_found("Meal ingredient"));
    }
    info!(%user_id, meal_ingredient_id = %id, "meal ingredient deleted");
    Ok(StatusCode::NO_CONTENT)
}
