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
use crate::nutrition::dto::{CategoryListQuery, CategoryOut, CategoryPatch, CategoryPayload};
use crate::nutrition::repo::{Category, CategoryFilter};
use crate::pagination::{order_clause, Page, PageParams};
use crate::state::AppState;

const ORDERING_FIELDS: &[&str] = &["name", "created_at"];
const DEFAULT_ORDERING: &str = "name ASC";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/:id",
            get(get_category)
                .put(update_category)
                .patch(patch_category)
                .delete(delete_category),
        )
}

/// The parent must exist, and linking to it must keep the tree acyclic.
async fn check_parent(
    state: &AppState,
    id: Option<Uuid>,
    parent: Option<Uuid>,
) -> Result<(), ApiError> {
    let Some(parent_id) = parent else {
        return Ok(());
    };
    if Category::get(&state.db, parent_id).await?.is_none() {
        return Err(ApiError::field(
            "parent",
            &format!("Invalid pk \"{parent_id}\" - object does not exist."),
        ));
    }
    if let Some(id) = id {
        if Category::creates_cycle(&state.db, id, parent_id).await? {
            return Err(ApiError::field(
                "parent",
                "Category parent chain may not contain cycles.",
            ));
        }
    }
    Ok(())
}

// Categories are a global catalogue; any authenticated user may read and
// maintain them, so listing is not scoped to the caller.
#[instrument(skip(state))]
async fn list_categories(
    State(state): State<AppState>,
    CurrentUser(_user_id): CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(q): Query<CategoryListQuery>,
) -> Result<Json<Page<CategoryOut>>, ApiError> {
    let params = PageParams::from_parts(q.page, q.page_size);
    let order = order_clause(q.ordering.as_deref(), ORDERING_FIELDS, DEFAULT_ORDERING);
    let filter = CategoryFilter {
        parent: q.parent,
        search: q.search,
    };
    let (rows, count) =
        Category::page(&state.db, &filter, &order, params.limit(), params.offset()).await?;
    let results = rows.into_iter().map(CategoryOut::from).collect();
    Ok(Json(Page::new(results, count, params, &uri)))
}

#[instrument(skip(state, payload))]
async fn create_category(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<CategoryPayload>,
) -> Result<(StatusCode, Json<CategoryOut>), ApiError> {
    let name = payload.validate()?;
    check_parent(&state, None, payload.parent).await?;
    let row = Category::insert(&state.db, &name, payload.parent).await?;
    info!(%user_id, category_id = %row.id, "category created");
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[instrument(skip(state))]
async fn get_category(
    State(state): State<AppState>,
    CurrentUser(_user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<CategoryOut>, ApiError> {
    let row = Category::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state, payload))]
async fn update_category(
    State(state): State<AppState>,
    CurrentUser(_user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryPayload>,
) -> Result<Json<CategoryOut>, ApiError> {
    let name = payload.validate()?;
    check_parent(&state, Some(id), payload.parent).await?;
    let row = Category::update(&state.db, id, &name, payload.parent)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state, payload))]
async fn patch_category(
    State(state): State<AppState>,
    CurrentUser(_user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<CategoryPatch>,
) -> Result<Json<CategoryOut>, ApiError> {
    let current = Category::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;
    let merged = payload.merge_into(&current);
    let name = merged.validate()?;
    check_parent(&state, Some(id), merged.parent).await?;
    let row = Category::update(&state.db, id, &name, merged.parent)
        .await?
        .ok_or_else(|| ApiError::not_found("Category"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state))]
async fn delete_category(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !Category::delete(&state.db, id).await? {
        return Err(ApiError::not_found("Category"));
    }
    info!(%user_id, category_id = %id, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}
