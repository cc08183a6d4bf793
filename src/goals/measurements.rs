use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::extractors::CurrentUser;
use crate::error::ApiError;
use crate::goals::dto::{
    BulkCreatePayload, ByMetricQuery, LatestQuery, MeasurementListQuery, MeasurementOut,
    MeasurementPatch, MeasurementPayload, MeasurementSummary, SummaryEntry, TrendPointOut,
    TrendsOut, TrendsQuery,
};
use crate::goals::repo::{BodyMeasurement, MeasurementFilter};
use crate::goals::types::Metric;
use crate::nutrition::dto::parse_choice;
use crate::pagination::{order_clause, Page, PageParams};
use crate::state::AppState;

const ORDERING_FIELDS: &[&str] = &["timestamp", "created_at", "value"];
const DEFAULT_ORDERING: &str = "timestamp DESC";

const DEFAULT_LATEST_METRICS: [Metric; 3] = [
    Metric::WeightKg,
    Metric::BodyFatPercentage,
    Metric::MuscleMassPercentage,
];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/measurements",
            get(list_measurements).post(create_measurement),
        )
        .route("/measurements/latest", get(latest_measurements))
        .route("/measurements/by_metric", get(measurements_by_metric))
        .route("/measurements/trends", get(measurement_trends))
        .route("/measurements/summary", get(measurement_summary))
        .route("/measurements/bulk_create", post(bulk_create))
        .route(
            "/measurements/:id",
            get(get_measurement)
                .put(update_measurement)
                .patch(patch_measurement)
                .delete(delete_measurement),
        )
}

#[instrument(skip(state))]
async fn list_measurements(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    OriginalUri(uri): OriginalUri,
    Query(q): Query<MeasurementListQuery>,
) -> Result<Json<Page<MeasurementOut>>, ApiError> {
    let params = PageParams::from_parts(q.page, q.page_size);
    let order = order_clause(q.ordering.as_deref(), ORDERING_FIELDS, DEFAULT_ORDERING);
    let filter = MeasurementFilter {
        metric: parse_choice("metric", &q.metric)?,
    };
    let (rows, count) = BodyMeasurement::page(
        &state.db,
        user_id,
        &filter,
        &order,
        params.limit(),
        params.offset(),
    )
    .await?;
    let results = rows.into_iter().map(MeasurementOut::from).collect();
    Ok(Json(Page::new(results, count, params, &uri)))
}

#[instrument(skip(state, payload))]
async fn create_measurement(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<MeasurementPayload>,
) -> Result<(StatusCode, Json<MeasurementOut>), ApiError> {
    let data = payload.validate()?;
    let row = BodyMeasurement::insert(&state.db, user_id, &data).await?;
    info!(%user_id, measurement_id = %row.id, metric = %row.metric, "measurement recorded");
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[instrument(skip(state))]
async fn get_measurement(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<MeasurementOut>, ApiError> {
    let row = BodyMeasurement::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Measurement"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state, payload))]
async fn update_measurement(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MeasurementPayload>,
) -> Result<Json<MeasurementOut>, ApiError> {
    let data = payload.validate()?;
    let row = BodyMeasurement::update(&state.db, user_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::not_found("Measurement"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state, payload))]
async fn patch_measurement(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MeasurementPatch>,
) -> Result<Json<MeasurementOut>, ApiError> {
    let current = BodyMeasurement::get(&state.db, user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Measurement"))?;
    let data = payload.merge_into(&current).validate()?;
    let row = BodyMeasurement::update(&state.db, user_id, id, &data)
        .await?
        .ok_or_else(|| ApiError::not_found("Measurement"))?;
    Ok(Json(row.into()))
}

#[instrument(skip(state))]
async fn delete_measurement(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if !BodyMeasurement::delete(&state.db, user_id, id).await? {
        return Err(ApiError::not_found("Measurement"));
    }
    info!(%user_id, measurement_id = %id, "measurement deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Latest reading per requested metric; metrics without data are omitted.
#[instrument(skip(state))]
async fn latest_measurements(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(q): Query<LatestQuery>,
) -> Result<Json<Vec<MeasurementOut>>, ApiError> {
    let metrics = match &q.metrics {
        None => DEFAULT_LATEST_METRICS.to_vec(),
        Some(raw) => {
            let mut metrics = Vec::new();
            for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                let metric = part.parse::<Metric>().map_err(|()| {
                    ApiError::field("metrics", &format!("\"{part}\" is not a valid choice."))
                })?;
                metrics.push(metric);
            }
            metrics
        }
    };

    let mut latest = Vec::new();
    for metric in metrics {
        if let Some(row) = BodyMeasurement::latest_for_metric(&state.db, user_id, metric).await? {
            latest.push(MeasurementOut::from(row));
        }
    }
    Ok(Json(latest))
}

#[instrument(skip(state))]
async fn measurements_by_metric(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(q): Query<ByMetricQuery>,
) -> Result<Json<Vec<MeasurementOut>>, ApiError> {
    let metric = parse_choice::<Metric>("metric", &q.metric)?
        .ok_or_else(|| ApiError::field("metric", "This parameter is required."))?;
    let rows = BodyMeasurement::list_by_metric(&state.db, user_id, metric).await?;
    Ok(Json(rows.into_iter().map(MeasurementOut::from).collect()))
}

/// Daily-bucketed series for one metric over a trailing window.
#[instrument(skip(state))]
async fn measurement_trends(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(q): Query<TrendsQuery>,
) -> Result<Json<TrendsOut>, ApiError> {
    let metric = parse_choice::<Metric>("metric", &q.metric)?.unwrap_or(Metric::WeightKg);
    let days = q.days.unwrap_or(30);
    if !(1..=365).contains(&days) {
        return Err(ApiError::field(
            "days",
            "Ensure this value is between 1 and 365.",
        ));
    }

    let end_date = OffsetDateTime::now_utc().date();
    let start_date = end_date - time::Duration::days(days);
    let points = BodyMeasurement::trend(&state.db, user_id, metric, start_date, end_date).await?;
    let measurements: Vec<TrendPointOut> = points.into_iter().map(TrendPointOut::from).collect();

    Ok(Json(TrendsOut {
        metric,
        period_days: days,
        start_date,
        end_date,
        count: measurements.len(),
        measurements,
    }))
}

/// Latest reading for every known metric.
#[instrument(skip(state))]
async fn measurement_summary(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<MeasurementSummary>, ApiError> {
    let mut summary = MeasurementSummary::new();
    for metric in Metric::ALL {
        if let Some(row) = BodyMeasurement::latest_for_metric(&state.db, user_id, metric).await? {
            summary.insert(
                metric.as_str().to_string(),
                SummaryEntry {
                    latest_value: row.value,
                    latest_date: row.timestamp.date(),
                    unit: row.unit,
                },
            );
        }
    }
    Ok(Json(summary))
}

/// Atomic multi-row insert: one bad row and nothing is persisted.
#[instrument(skip(state, payload))]
async fn bulk_create(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<BulkCreatePayload>,
) -> Result<(StatusCode, Json<Vec<MeasurementOut>>), ApiError> {
    let items = payload.validate()?;
    let rows = BodyMeasurement::bulk_insert(&state.db, user_id, &items).await?;
    info!(%user_id, count = rows.len(), "measurements bulk created");
    Ok((
        StatusCode::CREATED,
        Json(rows.into_iter().map(MeasurementOut::from).collect()),
    ))
}
