use axum::{
    extract::{DefaultBodyLimit, Multipart, OriginalUri, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::get,
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::extractors::CurrentUser;
use crate::error::ApiError;
use crate::nutrition::dto::{
    MealRecordListQuery, MealRecordOut, MealRecordPatch, MealRecordPayload,
    NutritionSummaryQuery, RecordNutritionSummary,
};
use crate::nutrition::repo::{Meal, MealRecord, MealRecordData, MealRecordFilter};
use crate::pagination::{order_clause, Page, PageParams};
use crate::state::AppState;

const ORDERING_FIELDS: &[&str] = &["timestamp", "created_at"];
const DEFAULT_ORDERING: &str = "timestamp DESC";

const PHOTO_URL_TTL_SECS: u64 = 600;
const MAX_PHOTO_BYTES: usize = 20 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/records", get(list_records).post(create_record))
        .route("/records/today", get(today_records))
        .route("/records/nutrition_summary", get(nutrition_summary))
        .route(
            "/records/:id",
            get(get_record)
                .put(update_record)
                .patch(patch_record)
                .delete(delete_record),
        )
        .route(
            "/records/:id/photo",
            get(get_photo)
                .post(upload_photo)
                .layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES)),
        )
}

/// A referenced planned meal must belong to the caller.
async fn check_meal(state: &AppState, user_id: Uuid, data: &MealRecordData) -> Result<(), ApiError> {
    if let Some(meal_id) = data.meal_id {
        if Meal::get(&state.db, user_id, meal_id).await?.is_none() {
            return Err(ApiError::field(
                "meal",
                &format!("Invalid pk \"{meal_id}\" - object does not exist."),
            ));
        }
    }
    Ok(())
}

#[instrument(skip(state))]
async fn list_records(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(q): Query<MealRecordListQuery>,
) -> Result<Json<Page<MealRecordOut>>, ApiError> {
    let params = PageParams::from_parts(q.page, q.page_size);
    let order = order_clause(q.ordering.as_deref(), ORDERING_FIELDS, DEFAULT_ORDERING);
    let filter = MealRecordFilter {
        meal: q.meal,
        date: q.date,
        search: q.search,
    };
    let (rows, count) = MealRecord::page(
        &state.db,
        user_id,
        &filter,
        &order,
        params.limit(),
        params.offset(),
    )
    .await?;
    let results = rows.into_iter().map(MealRecordOut::from).collect();
    Ok(Json(Page::new(results, count, params, &uri)))
}

#[instrument(skip(state, payload))]
async fn create_record(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<MealRecordPayload>,
) -> Result<(StatusCode, Json<MealRecordOut>), ApiError> {
    let data = payload.validate()?;
    check_meal(&state, user_id, &data).await?;
    let record = MealRecord::insert(&state.db, user_id, &data).await?;
    info!(%user_id, record_id = %record.id, "meal record created");
    Ok((StatusCode::CREATED, Json(record.into())))
}

#[instrument(skip(state))]
async fn get_record(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MealRecordOut>, ApiError> {
    let record = MealRecord::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal record"))?;
    Ok(Json(record.into()))
}

#[instrument(skip(state, payload))]
async fn update_record(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MealRecordPayload>,
) -> Result<Json<MealRecordOut>, ApiError> {
    let data = payload.validate()?;
    check_meal(&state, user_id, &data).await?;
    let record = MealRecord::update(&state.db, user_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal record"))?;
    Ok(Json(record.into()))
}

#[instrument(skip(state, payload))]
async fn patch_record(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MealRecordPatch>,
) -> Result<Json<MealRecordOut>, ApiError> {
    let current = MealRecord::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal record"))?;
    let data = payload.merge_into(&current).validate()?;
    check_meal(&state, user_id, &data).await?;
    let record = MealRecord::update(&state.db, user_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal record"))?;
    Ok(Json(record.into()))
}

#[instrument(skip(state))]
async fn delete_record(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !MealRecord::delete(&state.db, user_id, id).await? {
        return Err(ApiError::not_found("Meal record"));
    }
    info!(%user_id, record_id = %id, "meal record deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Everything logged today (UTC).
#[instrument(skip(state))]
async fn today_records(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<MealRecordOut>>, ApiError> {
    let today = OffsetDateTime::now_utc().date();
    let rows = MealRecord::list_for_day(&state.db, user_id, today).await?;
    Ok(Json(rows.into_iter().map(MealRecordOut::from).collect()))
}

/// Consumption totals and per-day averages over a trailing window.
#[instrument(skip(state))]
async fn nutrition_summary(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(q): Query<NutritionSummaryQuery>,
) -> Result<Json<RecordNutritionSummary>, ApiError> {
    let days = q.days.unwrap_or(7);
    if !(1..=365).contains(&days) {
        return Err(ApiError::field(
            "days",
            "Ensure this value is between 1 and 365.",
        ));
    }
    let end_date = OffsetDateTime::now_utc().date();
    let start_date = end_date - time::Duration::days(days);

    let totals = MealRecord::totals_for_range(&state.db, user_id, start_date, end_date).await?;
    let period = days as f64;

    Ok(Json(RecordNutritionSummary {
        period_days: days,
        start_date,
        end_date,
        total_calories: totals.total_calories,
        total_proteins: totals.total_proteins,
        total_fats: totals.total_fats,
        total_carbs: totals.total_carbs,
        average_daily_calories: totals.total_calories / period,
        average_daily_proteins: totals.total_proteins / period,
        average_daily_fats: totals.total_fats / period,
        average_daily_carbs: totals.total_carbs / period,
        record_count: totals.record_count,
    }))
}

/// Store a photo for the record and remember its key. Re-uploading replaces
/// the previous object.
#[instrument(skip(state, multipart))]
async fn upload_photo(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<MealRecordOut>, ApiError> {
    let record = MealRecord::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal record"))?;

    let mut upload = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("photo") {
            let content_type = field
                .content_type()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "application/octet-stream".into());
            let body = field
                .bytes()
                .await
                .map_err(|e| anyhow::anyhow!("read multipart field: {e}"))?;
            upload = Some((body, content_type));
            break;
        }
    }
    let Some((body, content_type)) = upload else {
        return Err(ApiError::field("photo", "This field is required."));
    };

    let key = format!("records/{user_id}/{id}/{}", Uuid::new_v4());
    state.storage.put_object(&key, body, &content_type).await?;

    if let Some(old_key) = &record.photo_key {
        if let Err(e) = state.storage.delete_object(old_key).await {
            warn!(error = %e, %old_key, "failed to delete replaced photo");
        }
    }

    let record = MealRecord::set_photo(&state.db, user_id, id, &key)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal record"))?;
    info!(%user_id, record_id = %id, "photo uploaded");
    Ok(Json(record.into()))
}

/// 302 to a short-lived presigned URL for the record's photo.
#[instrument(skip(state))]
async fn get_photo(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let record = MealRecord::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Meal record"))?;
    let key = record
        .photo_key
        .ok_or_else(|| ApiError::not_found("Photo"))?;
    let url = state.storage.presign_get(&key, PHOTO_URL_TTL_SECS).await?;
    Ok(Redirect::temporary(&url))
}
