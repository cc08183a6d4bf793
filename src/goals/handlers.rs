use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::extractors::CurrentUser;
use crate::error::ApiError;
use crate::goals::dto::{
    GoalByTypeQuery, GoalListQuery, GoalOut, GoalPatch, GoalPayload, GoalProgress, MeasurementOut,
};
use crate::goals::repo::{BodyMeasurement, Goal, GoalFilter};
use crate::nutrition::dto::parse_choice;
use crate::pagination::{order_clause, Page, PageParams};
use crate::state::AppState;

const ORDERING_FIELDS: &[&str] = &["created_at", "updated_at", "target_date"];
const DEFAULT_ORDERING: &str = "created_at DESC";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/goals", get(list_goals).post(create_goal))
        .route("/goals/active", get(active_goals))
        .route("/goals/by_type", get(goals_by_type))
        .route("/goals/upcoming", get(upcoming_goals))
        .route("/goals/overdue", get(overdue_goals))
        .route(
            "/goals/:id",
            get(get_goal)
                .put(update_goal)
                .patch(patch_goal)
                .delete(delete_goal),
        )
        .route("/goals/:id/activate", post(activate_goal))
        .route("/goals/:id/deactivate", post(deactivate_goal))
        .route("/goals/:id/progress", get(goal_progress))
}

#[instrument(skip(state))]
async fn list_goals(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(q): Query<GoalListQuery>,
) -> Result<Json<Page<GoalOut>>, ApiError> {
    let params = PageParams::from_parts(q.page, q.page_size);
    let order = order_clause(q.ordering.as_deref(), ORDERING_FIELDS, DEFAULT_ORDERING);
    let filter = GoalFilter {
        goal_type: parse_choice("goal_type", &q.goal_type)?,
        is_active: q.is_active,
        target_date: q.target_date,
        search: q.search,
    };
    let (rows, count) = Goal::page(
        &state.db,
        user_id,
        &filter,
        &order,
        params.limit(),
        params.offset(),
    )
    .await?;
    let results = rows.into_iter().map(GoalOut::from).collect();
    Ok(Json(Page::new(results, count, params, &uri)))
}

#[instrument(skip(state, payload))]
async fn create_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<GoalPayload>,
) -> Result<(StatusCode, Json<GoalOut>), ApiError> {
    let data = payload.validate()?;
    let goal = Goal::insert(&state.db, user_id, &data).await?;
    info!(%user_id, goal_id = %goal.id, "goal created");
    Ok((StatusCode::CREATED, Json(goal.into())))
}

#[instrument(skip(state))]
async fn get_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<GoalOut>, ApiError> {
    let goal = Goal::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Goal"))?;
    Ok(Json(goal.into()))
}

#[instrument(skip(state, payload))]
async fn update_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<GoalPayload>,
) -> Result<Json<GoalOut>, ApiError> {
    let data = payload.validate()?;
    let goal = Goal::update(&state.db, user_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::not_found("Goal"))?;
    Ok(Json(goal.into()))
}

#[instrument(skip(state, payload))]
async fn patch_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<GoalPatch>,
) -> Result<Json<GoalOut>, ApiError> {
    let current = Goal::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Goal"))?;
    let data = payload.merge_into(&current).validate()?;
    let goal = Goal::update(&state.db, user_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::not_found("Goal"))?;
    Ok(Json(goal.into()))
}

#[instrument(skip(state))]
async fn delete_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !Goal::delete(&state.db, user_id, id).await? {
        return Err(ApiError::not_found("Goal"));
    }
    info!(%user_id, goal_id = %id, "goal deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Activate a goal, deactivating the user's others.
#[instrument(skip(state))]
async fn activate_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    Goal::activate(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Goal"))?;
    info!(%user_id, goal_id = %id, "goal activated");
    Ok(Json(json!({ "status": "goal activated" })))
}

#[instrument(skip(state))]
async fn deactivate_goal(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    Goal::deactivate(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Goal"))?;
    info!(%user_id, goal_id = %id, "goal deactivated");
    Ok(Json(json!({ "status": "goal deactivated" })))
}

#[instrument(skip(state))]
async fn active_goals(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<GoalOut>>, ApiError> {
    let rows = Goal::list_active(&state.db, user_id).await?;
    Ok(Json(rows.into_iter().map(GoalOut::from).collect()))
}

#[instrument(skip(state))]
async fn goals_by_type(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(q): Query<GoalByTypeQuery>,
) -> Result<Json<Vec<GoalOut>>, ApiError> {
    let goal_type = parse_choice("type", &q.goal_type)?;
    let rows = Goal::list_by_type(&state.db, user_id, goal_type).await?;
    Ok(Json(rows.into_iter().map(GoalOut::from).collect()))
}

#[instrument(skip(state))]
async fn upcoming_goals(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<GoalOut>>, ApiError> {
    let today = OffsetDateTime::now_utc().date();
    let rows = Goal::upcoming(&state.db, user_id, today).await?;
    Ok(Json(rows.into_iter().map(GoalOut::from).collect()))
}

#[instrument(skip(state))]
async fn overdue_goals(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<GoalOut>>, ApiError> {
    let today = OffsetDateTime::now_utc().date();
    let rows = Goal::overdue(&state.db, user_id, today).await?;
    Ok(Json(rows.into_iter().map(GoalOut::from).collect()))
}

/// Progress against the body-composition measurement series.
#[instrument(skip(state))]
async fn goal_progress(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<GoalProgress>, ApiError> {
    let goal = Goal::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Goal"))?;

    let series = BodyMeasurement::progress_series(&state.db, user_id).await?;
    if series.is_empty() {
        return Ok(Json(GoalProgress {
            goal: goal.into(),
            progress: Some("No measurements recorded yet"),
            first_measurement: None,
            latest_measurement: None,
            measurements_count: 0,
            days_since_start: None,
        }));
    }

    let count = series.len() as i64;
    let first = series.first().cloned().map(MeasurementOut::from);
    let latest = series.last().cloned().map(MeasurementOut::from);
    let days_since_start = match (series.first(), series.last()) {
        (Some(first), Some(last)) => {
            Some((last.timestamp.date() - first.timestamp.date()).whole_days())
        }
        _ => None,
    };

    Ok(Json(GoalProgress {
        goal: goal.into(),
        progress: None,
        first_measurement: first,
        latest_measurement: latest,
        measurements_count: count,
        days_since_start,
    }))
}
