use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::nutrition::types::{IngredientUnit, MealType, PreferenceType, RecurrenceType};

// ---------------------------------------------------------------------------
// Diets

const DIET_COLUMNS: &str = "id, user_id, name, day_proteins_g, day_fats_g, \
     day_carbohydrates_g, day_calories_kcal, is_active, start_date, end_date, \
     notes, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct Diet {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub day_proteins_g: f64,
    pub day_fats_g: f64,
    pub day_carbohydrates_g: f64,
    pub day_calories_kcal: f64,
    pub is_active: bool,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub notes: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Validated diet fields, ready to persist.
#[derive(Debug, Clone)]
pub struct DietData {
    pub name: String,
    pub day_proteins_g: f64,
    pub day_fats_g: f64,
    pub day_carbohydrates_g: f64,
    pub day_calories_kcal: f64,
    pub is_active: bool,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub notes: Option<String>,
}

#[derive(Debug, Default)]
pub struct DietFilter {
    pub is_active: Option<bool>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub search: Option<String>,
}

fn push_diet_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, f: &DietFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(v) = f.is_active {
        qb.push(" AND is_active = ").push_bind(v);
    }
    if let Some(v) = f.start_date {
        qb.push(" AND start_date = ").push_bind(v);
    }
    if let Some(v) = f.end_date {
        qb.push(" AND end_date = ").push_bind(v);
    }
    if let Some(q) = &f.search {
        let pattern = format!("%{q}%");
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR notes ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

impl Diet {
    pub async fn page(
        db: &PgPool,
        user_id: Uuid,
        filter: &DietFilter,
        order: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Diet>, i64)> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM diets");
        push_diet_filters(&mut count_qb, user_id, filter);
        let count: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

        let mut qb = QueryBuilder::new(format!("SELECT {DIET_COLUMNS} FROM diets"));
        push_diet_filters(&mut qb, user_id, filter);
        qb.push(" ORDER BY ").push(order);
        qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
        let rows = qb.build_query_as::<Diet>().fetch_all(db).await?;

        Ok((rows, count))
    }

    pub async fn get(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Diet>> {
        let diet = sqlx::query_as::<_, Diet>(&format!(
            "SELECT {DIET_COLUMNS} FROM diets WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(diet)
    }

    pub async fn insert(db: &PgPool, user_id: Uuid, data: &DietData) -> anyhow::Result<Diet> {
        let diet = sqlx::query_as::<_, Diet>(&format!(
            r#"
            INSERT INTO diets (user_id, name, day_proteins_g, day_fats_g,
                               day_carbohydrates_g, day_calories_kcal, is_active,
                               start_date, end_date, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {DIET_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&data.name)
        .bind(data.day_proteins_g)
        .bind(data.day_fats_g)
        .bind(data.day_carbohydrates_g)
        .bind(data.day_calories_kcal)
        .bind(data.is_active)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(&data.notes)
        .fetch_one(db)
        .await?;
        Ok(diet)
    }

    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        data: &DietData,
    ) -> anyhow::Result<Option<Diet>> {
        let diet = sqlx::query_as::<_, Diet>(&format!(
            r#"
            UPDATE diets
            SET name = $3, day_proteins_g = $4, day_fats_g = $5,
                day_carbohydrates_g = $6, day_calories_kcal = $7, is_active = $8,
                start_date = $9, end_date = $10, notes = $11, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {DIET_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(&data.name)
        .bind(data.day_proteins_g)
        .bind(data.day_fats_g)
        .bind(data.day_carbohydrates_g)
        .bind(data.day_calories_kcal)
        .bind(data.is_active)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(&data.notes)
        .fetch_optional(db)
        .await?;
        Ok(diet)
    }

    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM diets WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Activate one diet and deactivate every other one the user has, in a
    /// single transaction so the active set never holds two rows.
    pub async fn activate(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Diet>> {
        let mut tx = db.begin().await?;
        sqlx::query(
            "UPDATE diets SET is_active = FALSE, updated_at = now() \
             WHERE user_id = $1 AND is_active AND id <> $2",
        )
        .bind(user_id)
        .bind(id)
        .execute(&mut *tx)
        .await?;
        let diet = sqlx::query_as::<_, Diet>(&format!(
            r#"
            UPDATE diets SET is_active = TRUE, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {DIET_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(diet)
    }

    pub async fn active(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<Diet>> {
        let diet = sqlx::query_as::<_, Diet>(&format!(
            "SELECT {DIET_COLUMNS} FROM diets WHERE user_id = $1 AND is_active LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(diet)
    }
}

// ---------------------------------------------------------------------------
// Meals

const MEAL_COLUMNS: &str = "id, user_id, diet_id, name, description, meal_type, \
     is_scheduled, start_date, end_date, start_time, duration_minutes, \
     recurrence_type, recurrence_until, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct Meal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub diet_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub meal_type: MealType,
    pub is_scheduled: bool,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub start_time: Option<Time>,
    pub duration_minutes: Option<i32>,
    pub recurrence_type: RecurrenceType,
    pub recurrence_until: Option<Date>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct MealData {
    pub diet_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub meal_type: MealType,
    pub is_scheduled: bool,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub start_time: Option<Time>,
    pub duration_minutes: Option<i32>,
    pub recurrence_type: RecurrenceType,
    pub recurrence_until: Option<Date>,
}

#[derive(Debug, Default)]
pub struct MealFilter {
    pub diet: Option<Uuid>,
    pub meal_type: Option<MealType>,
    pub is_scheduled: Option<bool>,
    pub recurrence_type: Option<RecurrenceType>,
    pub search: Option<String>,
}

/// Per-meal macro totals computed from `quantity / 100 × per-100g` values.
#[derive(Debug, FromRow)]
pub struct MealNutritionTotals {
    pub total_calories: f64,
    pub total_proteins: f64,
    pub total_fats: f64,
    pub total_carbs: f64,
    pub ingredient_count: i64,
}

fn push_meal_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, f: &MealFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(v) = f.diet {
        qb.push(" AND diet_id = ").push_bind(v);
    }
    if let Some(v) = f.meal_type {
        qb.push(" AND meal_type = ").push_bind(v);
    }
    if let Some(v) = f.is_scheduled {
        qb.push(" AND is_scheduled = ").push_bind(v);
    }
    if let Some(v) = f.recurrence_type {
        qb.push(" AND recurrence_type = ").push_bind(v);
    }
    if let Some(q) = &f.search {
        let pattern = format!("%{q}%");
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

impl Meal {
    pub async fn page(
        db: &PgPool,
        user_id: Uuid,
        filter: &MealFilter,
        order: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Meal>, i64)> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM meals");
        push_meal_filters(&mut count_qb, user_id, filter);
        let count: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

        let mut qb = QueryBuilder::new(format!("SELECT {MEAL_COLUMNS} FROM meals"));
        push_meal_filters(&mut qb, user_id, filter);
        qb.push(" ORDER BY ").push(order);
        qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
        let rows = qb.build_query_as::<Meal>().fetch_all(db).await?;

        Ok((rows, count))
    }

    pub async fn get(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Meal>> {
        let meal = sqlx::query_as::<_, Meal>(&format!(
            "SELECT {MEAL_COLUMNS} FROM meals WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(meal)
    }

    pub async fn insert(db: &PgPool, user_id: Uuid, data: &MealData) -> anyhow::Result<Meal> {
        let meal = sqlx::query_as::<_, Meal>(&format!(
            r#"
            INSERT INTO meals (user_id, diet_id, name, description, meal_type,
                               is_scheduled, start_date, end_date, start_time,
                               duration_minutes, recurrence_type, recurrence_until)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {MEAL_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(data.diet_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.meal_type)
        .bind(data.is_scheduled)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.start_time)
        .bind(data.duration_minutes)
        .bind(data.recurrence_type)
        .bind(data.recurrence_until)
        .fetch_one(db)
        .await?;
        Ok(meal)
    }

    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        data: &MealData,
    ) -> anyhow::Result<Option<Meal>> {
        let meal = sqlx::query_as::<_, Meal>(&format!(
            r#"
            UPDATE meals
            SET diet_id = $3, name = $4, description = $5, meal_type = $6,
                is_scheduled = $7, start_date = $8, end_date = $9, start_time = $10,
                duration_minutes = $11, recurrence_type = $12, recurrence_until = $13,
                updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {MEAL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(data.diet_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.meal_type)
        .bind(data.is_scheduled)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.start_time)
        .bind(data.duration_minutes)
        .bind(data.recurrence_type)
        .bind(data.recurrence_until)
        .fetch_optional(db)
        .await?;
        Ok(meal)
    }

    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM meals WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn nutrition_totals(db: &PgPool, meal_id: Uuid) -> anyhow::Result<MealNutritionTotals> {
        let totals = sqlx::query_as::<_, MealNutritionTotals>(
            r#"
            SELECT COALESCE(SUM(mi.quantity / 100 * i.calories), 0) AS total_calories,
                   COALESCE(SUM(mi.quantity / 100 * i.proteins), 0) AS total_proteins,
                   COALESCE(SUM(mi.quantity / 100 * i.fats), 0)     AS total_fats,
                   COALESCE(SUM(mi.quantity / 100 * i.carbs), 0)    AS total_carbs,
                   COUNT(*)                                         AS ingredient_count
            FROM meal_ingredients mi
            JOIN ingredients i ON i.id = mi.ingredient_id
            WHERE mi.meal_id = $1
            "#,
        )
        .bind(meal_id)
        .fetch_one(db)
        .await?;
        Ok(totals)
    }
}

// ---------------------------------------------------------------------------
// Meal ingredients

const MEAL_INGREDIENT_COLUMNS: &str =
    "id, meal_id, ingredient_id, quantity, unit, barcode, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct MealIngredient {
    pub id: Uuid,
    pub meal_id: Uuid,
    pub ingredient_id: Uuid,
    pub quantity: f64,
    pub unit: IngredientUnit,
    pub barcode: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct MealIngredientData {
    pub meal_id: Uuid,
    pub ingredient_id: Uuid,
    pub quantity: f64,
    pub unit: IngredientUnit,
    pub barcode: Option<String>,
}

#[derive(Debug, Default)]
pub struct MealIngredientFilter {
    pub meal: Option<Uuid>,
    pub ingredient: Option<Uuid>,
}

// Rows are owned transitively through the meal.
fn push_meal_ingredient_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    user_id: Uuid,
    f: &MealIngredientFilter,
) {
    qb.push(" WHERE meal_id IN (SELECT id FROM meals WHERE user_id = ")
        .push_bind(user_id)
        .push(")");
    if let Some(v) = f.meal {
        qb.push(" AND meal_id = ").push_bind(v);
    }
    if let Some(v) = f.ingredient {
        qb.push(" AND ingredient_id = ").push_bind(v);
    }
}

impl MealIngredient {
    pub async fn page(
        db: &PgPool,
        user_id: Uuid,
        filter: &MealIngredientFilter,
        order: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<MealIngredient>, i64)> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM meal_ingredients");
        push_meal_ingredient_filters(&mut count_qb, user_id, filter);
        let count: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

        let mut qb =
            QueryBuilder::new(format!("SELECT {MEAL_INGREDIENT_COLUMNS} FROM meal_ingredients"));
        push_meal_ingredient_filters(&mut qb, user_id, filter);
        qb.push(" ORDER BY ").push(order);
        qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
        let rows = qb.build_query_as::<MealIngredient>().fetch_all(db).await?;

        Ok((rows, count))
    }

    pub async fn list_for_meal(db: &PgPool, meal_id: Uuid) -> anyhow::Result<Vec<MealIngredient>> {
        let rows = sqlx::query_as::<_, MealIngredient>(&format!(
            "SELECT {MEAL_INGREDIENT_COLUMNS} FROM meal_ingredients \
             WHERE meal_id = $1 ORDER BY created_at ASC"
        ))
        .bind(meal_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn get(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<MealIngredient>> {
        let row = sqlx::query_as::<_, MealIngredient>(&format!(
            r#"
            SELECT {MEAL_INGREDIENT_COLUMNS} FROM meal_ingredients
            WHERE id = $1
              AND meal_id IN (SELECT id FROM meals WHERE user_id = $2)
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn insert(db: &PgPool, data: &MealIngredientData) -> anyhow::Result<MealIngredient> {
        let row = sqlx::query_as::<_, MealIngredient>(&format!(
            r#"
            INSERT INTO meal_ingredients (meal_id, ingredient_id, quantity, unit, barcode)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {MEAL_INGREDIENT_COLUMNS}
            "#
        ))
        .bind(data.meal_id)
        .bind(data.ingredient_id)
        .bind(data.quantity)
        .bind(data.unit)
        .bind(&data.barcode)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        data: &MealIngredientData,
    ) -> anyhow::Result<Option<MealIngredient>> {
        let row = sqlx::query_as::<_, MealIngredient>(&format!(
            r#"
            UPDATE meal_ingredients
            SET meal_id = $3, ingredient_id = $4, quantity = $5, unit = $6,
                barcode = $7, updated_at = now()
            WHERE id = $1
              AND meal_id IN (SELECT id FROM meals WHERE user_id = $2)
            RETURNING {MEAL_INGREDIENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(data.meal_id)
        .bind(data.ingredient_id)
        .bind(data.quantity)
        .bind(data.unit)
        .bind(&data.barcode)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "DELETE FROM meal_ingredients WHERE id = $1 \
             AND meal_id IN (SELECT id FROM meals WHERE user_id = $2)",
        )
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// Ingredients

const INGREDIENT_COLUMNS: &str = "id, name, description, category_id, proteins, fats, \
     carbs, calories, fibers, sugars, is_personal, created_by, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub proteins: f64,
    pub fats: f64,
    pub carbs: f64,
    pub calories: f64,
    pub fibers: f64,
    pub sugars: f64,
    pub is_personal: bool,
    pub created_by: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct IngredientData {
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub proteins: f64,
    pub fats: f64,
    pub carbs: f64,
    pub calories: f64,
    pub fibers: f64,
    pub sugars: f64,
}

#[derive(Debug, Default)]
pub struct IngredientFilter {
    pub category: Option<Uuid>,
    pub is_personal: Option<bool>,
    pub search: Option<String>,
}

// Public rows plus the caller's personal ones.
fn push_ingredient_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, f: &IngredientFilter) {
    qb.push(" WHERE (is_personal = FALSE OR created_by = ")
        .push_bind(user_id)
        .push(")");
    if let Some(v) = f.category {
        qb.push(" AND category_id = ").push_bind(v);
    }
    if let Some(v) = f.is_personal {
        qb.push(" AND is_personal = ").push_bind(v);
    }
    if let Some(q) = &f.search {
        let pattern = format!("%{q}%");
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

impl Ingredient {
    pub async fn page(
        db: &PgPool,
        user_id: Uuid,
        filter: &IngredientFilter,
        order: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Ingredient>, i64)> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM ingredients");
        push_ingredient_filters(&mut count_qb, user_id, filter);
        let count: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

        let mut qb = QueryBuilder::new(format!("SELECT {INGREDIENT_COLUMNS} FROM ingredients"));
        push_ingredient_filters(&mut qb, user_id, filter);
        qb.push(" ORDER BY ").push(order);
        qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
        let rows = qb.build_query_as::<Ingredient>().fetch_all(db).await?;

        Ok((rows, count))
    }

    /// Visible to the caller: public, or personal and owned.
    pub async fn get_visible(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<Ingredient>> {
        let row = sqlx::query_as::<_, Ingredient>(&format!(
            r#"
            SELECT {INGREDIENT_COLUMNS} FROM ingredients
            WHERE id = $1 AND (is_personal = FALSE OR created_by = $2)
            "#
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn insert_personal(
        db: &PgPool,
        user_id: Uuid,
        data: &IngredientData,
    ) -> anyhow::Result<Ingredient> {
        let row = sqlx::query_as::<_, Ingredient>(&format!(
            r#"
            INSERT INTO ingredients (name, description, category_id, proteins, fats,
                                     carbs, calories, fibers, sugars, is_personal, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE, $10)
            RETURNING {INGREDIENT_COLUMNS}
            "#
        ))
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.category_id)
        .bind(data.proteins)
        .bind(data.fats)
        .bind(data.carbs)
        .bind(data.calories)
        .bind(data.fibers)
        .bind(data.sugars)
        .bind(user_id)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    /// Only the owner's personal rows are writable; public ingredients are
    /// read-only through the API.
    pub async fn update_personal(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        data: &IngredientData,
    ) -> anyhow::Result<Option<Ingredient>> {
        let row = sqlx::query_as::<_, Ingredient>(&format!(
            r#"
            UPDATE ingredients
            SET name = $3, description = $4, category_id = $5, proteins = $6,
                fats = $7, carbs = $8, calories = $9, fibers = $10, sugars = $11,
                updated_at = now()
            WHERE id = $1 AND created_by = $2 AND is_personal
            RETURNING {INGREDIENT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(&data.name)
        .bind(&data.description)
        .bind(data.category_id)
        .bind(data.proteins)
        .bind(data.fats)
        .bind(data.carbs)
        .bind(data.calories)
        .bind(data.fibers)
        .bind(data.sugars)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn delete_personal(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "DELETE FROM ingredients WHERE id = $1 AND created_by = $2 AND is_personal",
        )
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Autocomplete over visible rows, capped.
    pub async fn search(
        db: &PgPool,
        user_id: Uuid,
        query: &str,
        limit: i64,
    ) -> anyhow::Result<Vec<Ingredient>> {
        let pattern = format!("%{query}%");
        let rows = sqlx::query_as::<_, Ingredient>(&format!(
            r#"
            SELECT {INGREDIENT_COLUMNS} FROM ingredients
            WHERE (is_personal = FALSE OR created_by = $1)
              AND (name ILIKE $2 OR description ILIKE $2)
            ORDER BY name ASC
            LIMIT $3
            "#
        ))
        .bind(user_id)
        .bind(pattern)
        .bind(limit)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn list_personal(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Ingredient>> {
        let rows = sqlx::query_as::<_, Ingredient>(&format!(
            r#"
            SELECT {INGREDIENT_COLUMNS} FROM ingredients
            WHERE created_by = $1 AND is_personal
            ORDER BY name ASC
            "#
        ))
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }
}

// ---------------------------------------------------------------------------
// Categories

const CATEGORY_COLUMNS: &str = "id, name, parent_id, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Default)]
pub struct CategoryFilter {
    pub parent: Option<Uuid>,
    pub search: Option<String>,
}

fn push_category_filters(qb: &mut QueryBuilder<'_, Postgres>, f: &CategoryFilter) {
    qb.push(" WHERE TRUE");
    if let Some(v) = f.parent {
        qb.push(" AND parent_id = ").push_bind(v);
    }
    if let Some(q) = &f.search {
        qb.push(" AND name ILIKE ").push_bind(format!("%{q}%"));
    }
}

impl Category {
    pub async fn page(
        db: &PgPool,
        filter: &CategoryFilter,
        order: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<Category>, i64)> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM categories");
        push_category_filters(&mut count_qb, filter);
        let count: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

        let mut qb = QueryBuilder::new(format!("SELECT {CATEGORY_COLUMNS} FROM categories"));
        push_category_filters(&mut qb, filter);
        qb.push(" ORDER BY ").push(order);
        qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
        let rows = qb.build_query_as::<Category>().fetch_all(db).await?;

        Ok((rows, count))
    }

    pub async fn get(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn insert(db: &PgPool, name: &str, parent_id: Option<Uuid>) -> anyhow::Result<Category> {
        let row = sqlx::query_as::<_, Category>(&format!(
            r#"
            INSERT INTO categories (name, parent_id)
            VALUES ($1, $2)
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(name)
        .bind(parent_id)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    pub async fn update(
        db: &PgPool,
        id: Uuid,
        name: &str,
        parent_id: Option<Uuid>,
    ) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(&format!(
            r#"
            UPDATE categories SET name = $2, parent_id = $3, updated_at = now()
            WHERE id = $1
            RETURNING {CATEGORY_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(parent_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Walk the parent chain from `parent_id` and report whether it reaches
    /// `id`. Bounded so a corrupt chain cannot spin forever.
    pub async fn creates_cycle(db: &PgPool, id: Uuid, parent_id: Uuid) -> anyhow::Result<bool> {
        let mut current = Some(parent_id);
        for _ in 0..64 {
            let Some(node) = current else {
                return Ok(false);
            };
            if node == id {
                return Ok(true);
            }
            current = sqlx::query_scalar::<_, Option<Uuid>>(
                "SELECT parent_id FROM categories WHERE id = $1",
            )
            .bind(node)
            .fetch_optional(db)
            .await?
            .flatten();
        }
        // Depth cap exceeded; treat as a cycle rather than recurse further.
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Meal records

const MEAL_RECORD_COLUMNS: &str = "id, user_id, meal_id, meal_name, quantity_grams, \
     calories, proteins, carbs, fats, timestamp, photo_key, feedback, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct MealRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub meal_id: Option<Uuid>,
    pub meal_name: Option<String>,
    pub quantity_grams: Option<f64>,
    pub calories: Option<f64>,
    pub proteins: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
    pub timestamp: OffsetDateTime,
    pub photo_key: Option<String>,
    pub feedback: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct MealRecordData {
    pub meal_id: Option<Uuid>,
    pub meal_name: Option<String>,
    pub quantity_grams: Option<f64>,
    pub calories: Option<f64>,
    pub proteins: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
    pub timestamp: OffsetDateTime,
    pub feedback: Option<String>,
}

#[derive(Debug, Default)]
pub struct MealRecordFilter {
    pub meal: Option<Uuid>,
    pub date: Option<Date>,
    pub search: Option<String>,
}

/// Date-range consumption totals.
#[derive(Debug, FromRow)]
pub struct MealRecordTotals {
    pub total_calories: f64,
    pub total_proteins: f64,
    pub total_fats: f64,
    pub total_carbs: f64,
    pub record_count: i64,
}

fn push_meal_record_filters(qb: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, f: &MealRecordFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(v) = f.meal {
        qb.push(" AND meal_id = ").push_bind(v);
    }
    if let Some(v) = f.date {
        qb.push(" AND timestamp::date = ").push_bind(v);
    }
    if let Some(q) = &f.search {
        let pattern = format!("%{q}%");
        qb.push(" AND (meal_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR feedback ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

impl MealRecord {
    pub async fn page(
        db: &PgPool,
        user_id: Uuid,
        filter: &MealRecordFilter,
        order: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<MealRecord>, i64)> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM meal_records");
        push_meal_record_filters(&mut count_qb, user_id, filter);
        let count: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

        let mut qb = QueryBuilder::new(format!("SELECT {MEAL_RECORD_COLUMNS} FROM meal_records"));
        push_meal_record_filters(&mut qb, user_id, filter);
        qb.push(" ORDER BY ").push(order);
        qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
        let rows = qb.build_query_as::<MealRecord>().fetch_all(db).await?;

        Ok((rows, count))
    }

    pub async fn get(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<MealRecord>> {
        let row = sqlx::query_as::<_, MealRecord>(&format!(
            "SELECT {MEAL_RECORD_COLUMNS} FROM meal_records WHERE id = $1 AND user_id = $2"
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
        data: &MealRecordData,
    ) -> anyhow::Result<MealRecord> {
        let row = sqlx::query_as::<_, MealRecord>(&format!(
            r#"
            INSERT INTO meal_records (user_id, meal_id, meal_name, quantity_grams,
                                      calories, proteins, carbs, fats, timestamp, feedback)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {MEAL_RECORD_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(data.meal_id)
        .bind(&data.meal_name)
        .bind(data.quantity_grams)
        .bind(data.calories)
        .bind(data.proteins)
        .bind(data.carbs)
        .bind(data.fats)
        .bind(data.timestamp)
        .bind(&data.feedback)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        data: &MealRecordData,
    ) -> anyhow::Result<Option<MealRecord>> {
        let row = sqlx::query_as::<_, MealRecord>(&format!(
            r#"
            UPDATE meal_records
            SET meal_id = $3, meal_name = $4, quantity_grams = $5, calories = $6,
                proteins = $7, carbs = $8, fats = $9, timestamp = $10, feedback = $11,
                updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {MEAL_RECORD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(data.meal_id)
        .bind(&data.meal_name)
        .bind(data.quantity_grams)
        .bind(data.calories)
        .bind(data.proteins)
        .bind(data.carbs)
        .bind(data.fats)
        .bind(data.timestamp)
        .bind(&data.feedback)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM meal_records WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_for_day(
        db: &PgPool,
        user_id: Uuid,
        day: Date,
    ) -> anyhow::Result<Vec<MealRecord>> {
        let rows = sqlx::query_as::<_, MealRecord>(&format!(
            r#"
            SELECT {MEAL_RECORD_COLUMNS} FROM meal_records
            WHERE user_id = $1 AND timestamp::date = $2
            ORDER BY timestamp ASC
            "#
        ))
        .bind(user_id)
        .bind(day)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn totals_for_range(
        db: &PgPool,
        user_id: Uuid,
        start: Date,
        end: Date,
    ) -> anyhow::Result<MealRecordTotals> {
        let totals = sqlx::query_as::<_, MealRecordTotals>(
            r#"
            SELECT COALESCE(SUM(calories), 0) AS total_calories,
                   COALESCE(SUM(proteins), 0) AS total_proteins,
                   COALESCE(SUM(fats), 0)     AS total_fats,
                   COALESCE(SUM(carbs), 0)    AS total_carbs,
                   COUNT(*)                   AS record_count
            FROM meal_records
            WHERE user_id = $1 AND timestamp::date BETWEEN $2 AND $3
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(db)
        .await?;
        Ok(totals)
    }

    pub async fn set_photo(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        photo_key: &str,
    ) -> anyhow::Result<Option<MealRecord>> {
        let row = sqlx::query_as::<_, MealRecord>(&format!(
            r#"
            UPDATE meal_records SET photo_key = $3, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {MEAL_RECORD_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(photo_key)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }
}

// ---------------------------------------------------------------------------
// Meal preferences

const MEAL_PREFERENCE_COLUMNS: &str =
    "id, user_id, ingredient_id, preference_type, description, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct MealPreference {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ingredient_id: Uuid,
    pub preference_type: PreferenceType,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct MealPreferenceData {
    pub ingredient_id: Uuid,
    pub preference_type: PreferenceType,
    pub description: Option<String>,
}

#[derive(Debug, Default)]
pub struct MealPreferenceFilter {
    pub preference_type: Option<PreferenceType>,
    pub ingredient: Option<Uuid>,
    pub search: Option<String>,
}

fn push_meal_preference_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    user_id: Uuid,
    f: &MealPreferenceFilter,
) {
    qb.push(" WHERE user_id = ").push_bind(user_id);
    if let Some(v) = f.preference_type {
        qb.push(" AND preference_type = ").push_bind(v);
    }
    if let Some(v) = f.ingredient {
        qb.push(" AND ingredient_id = ").push_bind(v);
    }
    if let Some(q) = &f.search {
        let pattern = format!("%{q}%");
        qb.push(" AND (description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR ingredient_id IN (SELECT id FROM ingredients WHERE name ILIKE ")
            .push_bind(pattern)
            .push("))");
    }
}

impl MealPreference {
    pub async fn page(
        db: &PgPool,
        user_id: Uuid,
        filter: &MealPreferenceFilter,
        order: &str,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<(Vec<MealPreference>, i64)> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM meal_preferences");
        push_meal_preference_filters(&mut count_qb, user_id, filter);
        let count: i64 = count_qb.build_query_scalar().fetch_one(db).await?;

        let mut qb =
            QueryBuilder::new(format!("SELECT {MEAL_PREFERENCE_COLUMNS} FROM meal_preferences"));
        push_meal_preference_filters(&mut qb, user_id, filter);
        qb.push(" ORDER BY ").push(order);
        qb.push(" LIMIT ").push_bind(limit).push(" OFFSET ").push_bind(offset);
        let rows = qb.build_query_as::<MealPreference>().fetch_all(db).await?;

        Ok((rows, count))
    }

    pub async fn get(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<MealPreference>> {
        let row = sqlx::query_as::<_, MealPreference>(&format!(
            "SELECT {MEAL_PREFERENCE_COLUMNS} FROM meal_preferences WHERE id = $1 AND user_id = $2"
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
        data: &MealPreferenceData,
    ) -> anyhow::Result<MealPreference> {
        let row = sqlx::query_as::<_, MealPreference>(&format!(
            r#"
            INSERT INTO meal_preferences (user_id, ingredient_id, preference_type, description)
            VALUES ($1, $2, $3, $4)
            RETURNING {MEAL_PREFERENCE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(data.ingredient_id)
        .bind(data.preference_type)
        .bind(&data.description)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    pub async fn update(
        db: &PgPool,
        user_id: Uuid,
        id: Uuid,
        data: &MealPreferenceData,
    ) -> anyhow::Result<Option<MealPreference>> {
        let row = sqlx::query_as::<_, MealPreference>(&format!(
            r#"
            UPDATE meal_preferences
            SET ingredient_id = $3, preference_type = $4, description = $5, updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING {MEAL_PREFERENCE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(user_id)
        .bind(data.ingredient_id)
        .bind(data.preference_type)
        .bind(&data.description)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn delete(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM meal_preferences WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_by_type(
        db: &PgPool,
        user_id: Uuid,
        preference_type: Option<PreferenceType>,
    ) -> anyhow::Result<Vec<MealPreference>> {
        let mut qb = QueryBuilder::new(format!(
            "SELECT {MEAL_PREFERENCE_COLUMNS} FROM meal_preferences WHERE user_id = "
        ));
        qb.push_bind(user_id);
        if let Some(v) = preference_type {
            qb.push(" AND preference_type = ").push_bind(v);
        }
        qb.push(" ORDER BY created_at DESC");
        let rows = qb.build_query_as::<MealPreference>().fetch_all(db).await?;
        Ok(rows)
    }
}
