use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::goals::types::{GoalType, MeasurementUnit, Metric};

// ---------------------------------------------------------------------------
// Goals

const GOAL_COLUMNS: &str =
    "id, user_id, goal_type, target_date, notes, is_active, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub goal_type: GoalType,
    pub target_date: Date,
    pub notes: Option<String>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct GoalData {
    pub goal_type: GoalType,
    pub target_date: Date,
    pub notes: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Default)]
pub struct GoalFilter {
    pub goal_type: Option<GoalType>,
    pub is_active: Option<bool>,
    pub target_date: Option<Date>,
    pub search: Option<String>,
}

fn push_goal_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, f: &GoalFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(v) = f.goal_type {
        qb.push(" AND goal_type = ").push_bind(v);
    }
    if let Some(v) = f.is_active {
        qb.push(" AND is_active = ").push_bind(v);
    }
    if let Some(v) = f.target_date {
        qb.push(" AND target_date = ").push_bind(v);
    }
    if let Some(q) = &f.search {
        qb.push(" AND notes ILIKE ").push_bind(format!("%{q}%"));
    }
}

impl Goal {
    pub async fn page(
        db: &PgPool,
        user_id: Uuid,
        filter: &GoalFilter,
        order: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Goal>, i64)> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM goals");
        push_goal_filters(&mut count_qb, user_id, filter);
        let count: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

        let mut qb = QueryBuilder::new(format!("SELECT {GOAL_COLUMNS} FROM goals"));
        push_goal_filters(&mut qb, user_id, filter);
        qb.push(" ORDER BY ").push(order);
        qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
        let rows = qb.build_query_as::<Goal>().fetch_all(db).await?;

        Ok((rows, count))
    }

    pub async fn get(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Goal>> {
        let goal = sqlx::query_as::<_, Goal>(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(goal)
    }

    pub async fn insert(db: &PgPool, user_id: Uuid, data: &GoalData) -> anyhow::Result<Goal> {
        let goal = sqlx::query_as::<_, Goal>(&format!(
            r#"
            INSERT INTO goals (user_id, goal_type, target_date, notes, is_active)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {GOAL_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(data.goal_type)
        .bind(data.target_date)
        .bind(&data.notes)
        .bind(data.is_active)
        .fetch_one(db)
        .await?;
        Ok(goal)
    }

    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        data: &GoalData,
    ) -> anyhow::Result<Option<Goal>> {
        let goal = sqlx::query_as::<_, Goal>(&format!(
            r#"
            UPDATE goals
            SET goal_type = $3, target_date = $4, notes = $5, is_active = $6,
                updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {GOAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(data.goal_type)
        .bind(data.target_date)
        .bind(&data.notes)
        .bind(data.is_active)
        .fetch_optional(db)
        .await?;
        Ok(goal)
    }

    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM goals WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Activate one goal and deactivate the user's others atomically.
    pub async fn activate(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Goal>> {
        let mut tx = db.begin().await?;
        sqlx::query(
            "UPDATE goals SET is_active = FALSE, updated_at = now() \
             WHERE user_id = $1 AND is_active AND id <> $2",
        )
        .bind(user_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        let goal = sqlx::query_as::<_, Goal>(&format!(
            r#"
            UPDATE goals SET is_active = TRUE, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {GOAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(goal)
    }

    pub async fn deactivate(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Goal>> {
        let goal = sqlx::query_as::<_, Goal>(&format!(
            r#"
            UPDATE goals SET is_active = FALSE, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {GOAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(goal)
    }

    pub async fn list_active(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Goal>> {
        let rows = sqlx::query_as::<_, Goal>(&format!(
            "SELECT {GOAL_COLUMNS} FROM goals WHERE user_id = $1 AND is_active \
             ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn list_by_type(
        db: &PgPool,
        user_id: Uuid,
        goal_type: Option<GoalType>,
    ) -> anyhow::Result<Vec<Goal>> {
        let mut qb =
            QueryBuilder::new(format!("SELECT {GOAL_COLUMNS} FROM goals WHERE user_id = "));
        qb.push_bind(user_id);
        if let Some(v) = goal_type {
            qb.push(" AND goal_type = ").push_bind(v);
        }
        qb.push(" ORDER BY created_at DESC");
        let rows = qb.build_query_as::<Goal>().fetch_all(db).await?;
        Ok(rows)
    }

    /// Active goals with a target on or after `today`, soonest first.
    pub async fn upcoming(db: &PgPool, user_id: Uuid, today: Date) -> anyhow::Result<Vec<Goal>> {
        let rows = sqlx::query_as::<_, Goal>(&format!(
            r#"
            SELECT {GOAL_COLUMNS} FROM goals
            WHERE user_id = $1 AND is_active AND target_date >= $2
            ORDER BY target_date ASC
            "#
        ))
        .bind(user_id)
        .bind(today)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Active goals whose target date has passed.
    pub async fn overdue(db: &PgPool, user_id: Uuid, today: Date) -> anyhow::Result<Vec<Goal>> {
        let rows = sqlx::query_as::<_, Goal>(&format!(
            r#"
            SELECT {GOAL_COLUMNS} FROM goals
            WHERE user_id = $1 AND is_active AND target_date < $2
            ORDER BY target_date ASC
            "#
        ))
        .bind(user_id)
        .bind(today)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Body measurements

const MEASUREMENT_COLUMNS: &str =
    "id, user_id, metric, value, unit, timestamp, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct BodyMeasurement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub metric: Metric,
    pub value: f64,
    pub unit: MeasurementUnit,
    pub timestamp: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct MeasurementData {
    pub metric: Metric,
    pub value: f64,
    pub unit: MeasurementUnit,
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Default)]
pub struct MeasurementFilter {
    pub metric: Option<Metric>,
}

/// One day's aggregated value within a trend window.
#[derive(Debug, FromRow)]
pub struct TrendPoint {
    pub day: Date,
    pub value: f64,
    pub samples: i64,
}

fn push_measurement_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    user_id: Uuid,
    f: &MeasurementFilter,
) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(v) = f.metric {
        qb.push(" AND metric = ").push_bind(v);
    }
}

impl BodyMeasurement {
    pub async fn page(
        db: &PgPool,
        user_id: Uuid,
        filter: &MeasurementFilter,
        order: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<BodyMeasurement>, i64)> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM body_measurements");
        push_measurement_filters(&mut count_qb, user_id, filter);
        let count: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

        let mut qb =
            QueryBuilder::new(format!("SELECT {MEASUREMENT_COLUMNS} FROM body_measurements"));
        push_measurement_filters(&mut qb, user_id, filter);
        qb.push(" ORDER BY ").push(order);
        qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
        let rows = qb.build_query_as::<BodyMeasurement>().fetch_all(db).await?;

        Ok((rows, count))
    }

    pub async fn get(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<BodyMeasurement>> {
        let row = sqlx::query_as::<_, BodyMeasurement>(&format!(
            "SELECT {MEASUREMENT_COLUMNS} FROM body_measurements WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn insert(
        db: &PgPool,
        user_id: Uuid,
        data: &MeasurementData,
    ) -> anyhow::Result<BodyMeasurement> {
        let row = sqlx::query_as::<_, BodyMeasurement>(&format!(
            r#"
            INSERT INTO body_measurements (user_id, metric, value, unit, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {MEASUREMENT_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(data.metric)
        .bind(data.value)
        .bind(data.unit)
        .bind(data.timestamp)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    /// Insert every row or none: a single transaction backs the whole batch.
    pub async fn bulk_insert(
        db: &PgPool,
        user_id: Uuid,
        items: &[MeasurementData],
    ) -> anyhow::Result<Vec<BodyMeasurement>> {
        let mut tx = db.begin().await?;
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            let row = sqlx::query_as::<_, BodyMeasurement>(&format!(
                r#"
                INSERT INTO body_measurements (user_id, metric, value, unit, timestamp)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING {MEASUREMENT_COLUMNS}
                "#
            ))
            .bind(user_id)
            .bind(item.metric)
            .bind(item.value)
            .bind(item.unit)
            .bind(item.timestamp)
            .fetch_one(&mut *tx)
            .await?;
            rows.push(row);
        }
        tx.commit().await?;
        Ok(rows)
    }

    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        data: &MeasurementData,
    ) -> anyhow::Result<Option<BodyMeasurement>> {
        let row = sqlx::query_as::<_, BodyMeasurement>(&format!(
            r#"
            UPDATE body_measurements
            SET metric = $3, value = $4, unit = $5, timestamp = $6, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {MEASUREMENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(data.metric)
        .bind(data.value)
        .bind(data.unit)
        .bind(data.timestamp)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM body_measurements WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn latest_for_metric(
        db: &PgPool,
        user_id: Uuid,
        metric: Metric,
    ) -> anyhow::Result<Option<BodyMeasurement>> {
        let row = sqlx::query_as::<_, BodyMeasurement>(&format!(
            r#"
            SELECT {MEASUREMENT_COLUMNS} FROM body_measurements
            WHERE user_id = $1 AND metric = $2
            ORDER BY timestamp DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .bind(metric)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn list_by_metric(
        db: &PgPool,
        user_id: Uuid,
        metric: Metric,
    ) -> anyhow::Result<Vec<BodyMeasurement>> {
        let rows = sqlx::query_as::<_, BodyMeasurement>(&format!(
            r#"
            SELECT {MEASUREMENT_COLUMNS} FROM body_measurements
            WHERE user_id = $1 AND metric = $2
            ORDER BY timestamp DESC
            "#
        ))
        .bind(user_id)
        .bind(metric)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Daily buckets over a window, averaging multiple samples per day.
    pub async fn trend(
        db: &PgPool,
        user_id: Uuid,
        metric: Metric,
        start: Date,
        end: Date,
    ) -> anyhow::Result<Vec<TrendPoint>> {
        let rows = sqlx::query_as::<_, TrendPoint>(
            r#"
            SELECT timestamp::date AS day, AVG(value) AS value, COUNT(*) AS samples
            FROM body_measurements
            WHERE user_id = $1 AND metric = $2 AND timestamp::date BETWEEN $3 AND $4
            GROUP BY timestamp::date
            ORDER BY day ASC
            "#,
        )
        .bind(user_id)
        .bind(metric)
        .bind(start)
        .bind(end)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Body-composition series backing goal progress, oldest first.
    pub async fn progress_series(
        db: &PgPool,
        user_id: Uuid,
    ) -> anyhow::Result<Vec<BodyMeasurement>> {
        let rows = sqlx::query_as::<_, BodyMeasurement>(&format!(
            r#"
            SELECT {MEASUREMENT_COLUMNS} FROM body_measurements
            WHERE user_id = $1 AND metric IN ($2, $3, $4)
            ORDER BY timestamp ASC
            "#
        ))
        .bind(user_id)
        .bind(Metric::WeightKg)
        .bind(Metric::BodyFatPercentage)
        .bind(Metric::MuscleMassPercentage)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}
