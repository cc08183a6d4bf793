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
    IngredientListQuery, IngredientOut, IngredientPatch, IngredientPayload, IngredientSearchOut,
    IngredientSearchQuery,
};
use crate::nutrition::repo::{Category, Ingredient, IngredientData, IngredientFilter};
use crate::pagination::{order_clause, Page, PageParams};
use crate::state::AppState;

const ORDERING_FIELDS: &[&str] = &["name", "calories", "proteins", "created_at"];
const DEFAULT_ORDERING: &str = "name ASC";

const SEARCH_MIN_CHARS: usize = 2;
const SEARCH_LIMIT: i64 = 10;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ingredients", get(list_ingredients).post(create_ingredient))
        .route("/ingredients/search", get(search_ingredients))
        .route("/ingredients/personal", get(personal_ingredients))
        .route(
            "/ingredients/:id",
            get(get_ingredient)
                .put(update_ingredient)
                .patch(patch_ingredient)
                .delete(delete_ingredient),
        )
}

async fn check_category(state: &AppState, data: &IngredientData) -> Result<(), ApiError> {
    if let Some(category_id) = data.category_id {
        if Category::get(&state.db, category_id).await?.is_none() {
            return Err(ApiError::field(
                "category",
                &format!("Invalid pk \"{category_id}\" - object does not exist."),
            ));
        }
    }
    Ok(())
}

/// Public catalogue plus the caller's personal rows.
#[instrument(skip(state))]
async fn list_ingredients(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(q): Query<IngredientListQuery>,
) -> Result<Json<Page<IngredientOut>>, ApiError> {
    let params = PageParams::from_parts(q.page, q.page_size);
    let order = order_clause(q.ordering.as_deref(), ORDERING_FIELDS, DEFAULT_ORDERING);
    let filter = IngredientFilter {
        category: q.category,
        is_personal: q.is_personal,
        search: q.search,
    };
    let (rows, count) = Ingredient::page(
        &state.db,
        user_id,
        &filter,
        &order,
        params.limit(),
        params.offset(),
    )
    .await?;
    let results = rows.into_iter().map(IngredientOut::from).collect();
    Ok(Json(Page::new(results, count, params, &uri)))
}

/// New ingredients are always personal to their creator.
#[instrument(skip(state, payload))]
async fn create_ingredient(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<IngredientPayload>,
) -> Result<(StatusCode, Json<IngredientOut>), ApiError> {
    let data = payload.validate()?;
    check_category(&state, &data).await?;
    let row = Ingredient::insert_personal(&state.db, user_id, &data).await?;
    info!(%user_id, ingredient_id = %row.id, "personal ingredient created");
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[instrument(skip(state))]
async fn get_ingredient(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<IngredientOut>, ApiError> {
    let row = Ingredient::get_visible(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Ingredient"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state, payload))]
async fn update_ingredient(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<IngredientPayload>,
) -> Result<Json<IngredientOut>, ApiError> {
    let data = payload.validate()?;
    check_category(&state, &data).await?;
    let row = Ingredient::update_personal(&state.db, user_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::not_found("Ingredient"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state, payload))]
async fn patch_ingredient(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<IngredientPatch>,
) -> Result<Json<IngredientOut>, ApiError> {
    let current = Ingredient::get_visible(&state.db, user_id, id)
        .await?
        .filter(|row| row.is_personal && row.created_by == Some(user_id))
        .ok_or_else(|| ApiError::not_found("Ingredient"))?;
    let data = payload.merge_into(&current).validate()?;
    check_category(&state, &data).await?;
    let row = Ingredient::update_personal(&state.db, user_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::not_found("Ingredient"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state))]
async fn delete_ingredient(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !Ingredient::delete_personal(&state.db, user_id, id).await? {
        return Err(ApiError::not_found("Ingredient"));
    }
    info!(%user_id, ingredient_id = %id, "personal ingredient deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Autocomplete endpoint, capped to a handful of rows.
#[instrument(skip(state))]
async fn search_ingredients(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(q): Query<IngredientSearchQuery>,
) -> Result<Json<Vec<IngredientSearchOut>>, ApiError> {
    let query = q.q.unwrap_or_default();
    if query.chars().count() < SEARCH_MIN_CHARS {
        return Err(ApiError::field(
            "q",
            "Query must be at least 2 characters.",
        ));
    }
    let rows = Ingredient::search(&state.db, user_id, &query, SEARCH_LIMIT).await?;
    Ok(Json(rows.into_iter().map(IngredientSearchOut::from).collect()))
}

#[instrument(skip(state))]
async fn personal_ingredients(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<IngredientOut>>, ApiError> {
    let rows = Ingredient::list_personal(&state.db, user_id).await?;
    Ok(Json(rows.into_iter().map(IngredientOut::from).collect()))
}
