use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::extractors::CurrentUser;
use crate::error::ApiError;
use crate::nutrition::dto::{
    parse_choice, MealIngredientOut, MealIngredientPayload, MealListQuery, MealNutritionSummary,
    MealOut, MealPatch, MealPayload,
};
use crate::nutrition::repo::{Diet, Ingredient, Meal, MealData, MealFilter, MealIngredient};
use crate::pagination::{order_clause, Page, PageParams};
use crate::state::AppState;

const ORDERING_FIELDS: &[&str] = &["created_at", "updated_at", "start_date", "start_time"];
const DEFAULT_ORDERING: &str = "created_at DESC";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/meals", get(list_meals).post(create_meal))
        .route(
            "/meals/:id",
            get(get_meal)
                .put(update_meal)
                .patch(patch_meal)
                .delete(delete_meal),
        )
        .route("/meals/:id/ingredients", get(meal_ingredients))
        .route("/meals/:id/add_ingredient", post(add_ingredient))
        .route("/meals/:id/nutrition_summary", get(nutrition_summary))
}

/// A referenced diet must exist and belong to the caller.
async fn check_diet(state: &AppState, user_id: Uuid, data: &MealData) -> Result<(), ApiError> {
    if let Some(diet_id) = data.diet_id {
        if Diet::get(&state.db, user_id, diet_id).await?.is_none() {
            return Err(ApiError::field(
                "diet",
                &format!("Invalid pk \"{diet_id}\" - object does not exist."),
            ));
        }
    }
    Ok(())
}

#[instrument(skip(state))]
async fn list_meals(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(q): Query<MealListQuery>,
) -> Result<Json<Page<MealOut>>, ApiError> {
    let params = PageParams::from_parts(q.page, q.page_size);
    let order = order_clause(q.ordering.as_deref(), ORDERING_FIELDS, DEFAULT_ORDERING);
    let filter = MealFilter {
        diet: q.diet,
        meal_type: parse_choice("meal_type", &q.meal_type)?,
        is_scheduled: q.is_scheduled,
        recurrence_type: parse_choice("recurrence_type", &q.recurrence_type)?,
        search: q.search,
    };
    let (rows, count) = Meal::page(
        &state.db,
        user_id,
        &filter,
        &order,
        params.limit(),
        params.offset(),
    )
    .await?;
    let results = rows.into_iter().map(MealOut::from).collect();
    Ok(Json(Page::new(results, count, params, &uri)))
}

#[instrument(skip(state, payload))]
async fn create_meal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<MealPayload>,
) -> Result<(StatusCode, Json<MealOut>), ApiError> {
    let data = payload.validate()?;
    check_diet(&state, user_id, &data).await?;
    let meal = Meal::insert(&state.db, user_id, &data).await?;
    info!(%user_id, meal_id = %meal.id, "meal created");
    Ok((StatusCode::CREATED, Json(meal.into())))
}

#[instrument(skip(state))]
async fn get_meal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MealOut>, ApiError> {
    let meal = Meal::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal"))?;
    Ok(Json(meal.into()))
}

#[instrument(skip(state, payload))]
async fn update_meal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MealPayload>,
) -> Result<Json<MealOut>, ApiError> {
    let data = payload.validate()?;
    check_diet(&state, user_id, &data).await?;
    let meal = Meal::update(&state.db, user_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal"))?;
    Ok(Json(meal.into()))
}

#[instrument(skip(state, payload))]
async fn patch_meal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MealPatch>,
) -> Result<Json<MealOut>, ApiError> {
    let current = Meal::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal"))?;
    let data = payload.merge_into(&current).validate()?;
    check_diet(&state, user_id, &data).await?;
    let meal = Meal::update(&state.db, user_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal"))?;
    Ok(Json(meal.into()))
}

#[instrument(skip(state))]
async fn delete_meal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !Meal::delete(&state.db, user_id, id).await? {
        return Err(ApiError::not_found("Meal"));
    }
    info!(%user_id, meal_id = %id, "meal deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// All ingredient rows of one meal.
#[instrument(skip(state))]
async fn meal_ingredients(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MealIngredientOut>>, ApiError> {
    let meal = Meal::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal"))?;
    let rows = MealIngredient::list_for_meal(&state.db, meal.id).await?;
    Ok(Json(rows.into_iter().map(MealIngredientOut::from).collect()))
}

/// Attach an ingredient to a meal; the meal id comes from the path.
#[instrument(skip(state, payload))]
async fn add_ingredient(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MealIngredientPayload>,
) -> Result<(StatusCode, Json<MealIngredientOut>), ApiError> {
    let meal = Meal::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal"))?;
    let data = payload.validate(Some(meal.id))?;
    if Ingredient::get_visible(&state.db, user_id, data.ingredient_id)
        .await?
        .is_none()
    {
        return Err(ApiError::field(
            "ingredient",
            &format!("Invalid pk \"{}\" - object does not exist.", data.ingredient_id),
        ));
    }
    let row = MealIngredient::insert(&state.db, &data).await?;
    info!(%user_id, meal_id = %meal.id, ingredient_id = %data.ingredient_id, "ingredient added to meal");
    Ok((StatusCode::CREATED, Json(row.into())))
}

/// Macro totals computed from the meal's ingredient quantities.
#[instrument(skip(state))]
async fn nutrition_summary(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MealNutritionSummary>, ApiError> {
    let meal = Meal::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal"))?;
    let totals = Meal::nutrition_totals(&state.db, meal.id).await?;
    Ok(Json(MealNutritionSummary {
        total_calories: totals.total_calories,
        total_proteins: totals.total_proteins,
        total_fats: totals.total_fats,
        total_carbs: totals.total_carbs,
        ingredient_count: totals.ingredient_count,
    }))
}
