use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, OffsetDateTime, Time};
use uuid::Uuid;

use crate::error::{ApiError, FieldErrors};
use crate::nutrition::repo::{
    Category, Diet, DietData, Ingredient, IngredientData, Meal, MealData, MealIngredient,
    MealIngredientData, MealPreference, MealPreferenceData, MealRecord, MealRecordData,
};
use crate::nutrition::types::{IngredientUnit, MealType, PreferenceType, RecurrenceType};

// ---------------------------------------------------------------------------
// Shared validation helpers

pub(crate) fn parse_choice<T>(field: &str, value: &Option<String>) -> Result<Option<T>, ApiError>
where
    T: FromStr<Err = ()>,
{
    match value {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            ApiError::field(field, &format!("\"{raw}\" is not a valid choice."))
        }),
    }
}

fn check_choice<T>(errors: &mut FieldErrors, field: &str, value: &Option<String>) -> Option<T>
where
    T: FromStr<Err = ()>,
{
    match value {
        None => {
            errors.push(field, "This field is required.");
            None
        }
        Some(raw) => match raw.parse::<T>() {
            Ok(parsed) => Some(parsed),
            Err(()) => {
                errors.push(field, format!("\"{raw}\" is not a valid choice."));
                None
            }
        },
    }
}

fn check_name(errors: &mut FieldErrors, field: &str, value: &Option<String>) -> String {
    match value {
        None => {
            errors.push(field, "This field is required.");
            String::new()
        }
        Some(raw) if raw.trim().is_empty() => {
            errors.push(field, "This field may not be blank.");
            String::new()
        }
        Some(raw) => raw.trim().to_string(),
    }
}

fn check_non_negative(errors: &mut FieldErrors, field: &str, value: Option<f64>) -> f64 {
    let v = value.unwrap_or(0.0);
    if !v.is_finite() || v < 0.0 {
        errors.push(field, "Ensure this value is greater than or equal to 0.");
        return 0.0;
    }
    v
}

fn check_optional_non_negative(errors: &mut FieldErrors, field: &str, value: Option<f64>) {
    if let Some(v) = value {
        if !v.is_finite() || v < 0.0 {
            errors.push(field, "Ensure this value is greater than or equal to 0.");
        }
    }
}

fn check_date_order(errors: &mut FieldErrors, start: Option<Date>, end: Option<Date>) {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            errors.push("end_date", "end_date must be on or after start_date.");
        }
    }
}

fn parse_time_field(errors: &mut FieldErrors, field: &str, raw: &Option<String>) -> Option<Time> {
    let raw = raw.as_deref()?;
    let full = format_description!("[hour]:[minute]:[second]");
    let short = format_description!("[hour]:[minute]");
    match Time::parse(raw, &full).or_else(|_| Time::parse(raw, &short)) {
        Ok(time) => Some(time),
        Err(_) => {
            errors.push(
                field,
                "Time has wrong format. Use one of these formats instead: HH:MM[:SS].",
            );
            None
        }
    }
}

pub(crate) fn format_time(t: Time) -> String {
    let format = format_description!("[hour]:[minute]:[second]");
    t.format(&format).unwrap_or_else(|_| t.to_string())
}

// ---------------------------------------------------------------------------
// Diets

#[derive(Debug, Deserialize)]
pub struct DietPayload {
    pub name: Option<String>,
    pub day_proteins_g: Option<f64>,
    pub day_fats_g: Option<f64>,
    pub day_carbohydrates_g: Option<f64>,
    pub day_calories_kcal: Option<f64>,
    #[serde(default)]
    pub is_active: bool,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub notes: Option<String>,
}

impl DietPayload {
    pub fn validate(self) -> Result<DietData, ApiError> {
        let mut errors = FieldErrors::new();
        let name = check_name(&mut errors, "name", &self.name);
        let day_proteins_g = check_non_negative(&mut errors, "day_proteins_g", self.day_proteins_g);
        let day_fats_g = check_non_negative(&mut errors, "day_fats_g", self.day_fats_g);
        let day_carbohydrates_g =
            check_non_negative(&mut errors, "day_carbohydrates_g", self.day_carbohydrates_g);
        let day_calories_kcal =
            check_non_negative(&mut errors, "day_calories_kcal", self.day_calories_kcal);
        if self.start_date.is_none() {
            errors.push("start_date", "This field is required.");
        }
        check_date_order(&mut errors, self.start_date, self.end_date);
        errors.into_result()?;

        Ok(DietData {
            name,
            day_proteins_g,
            day_fats_g,
            day_carbohydrates_g,
            day_calories_kcal,
            is_active: self.is_active,
            start_date: self.start_date.unwrap_or(Date::MIN),
            end_date: self.end_date,
            notes: self.notes,
        })
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Deserialize)]
pub struct DietPatch {
    pub name: Option<String>,
    pub day_proteins_g: Option<f64>,
    pub day_fats_g: Option<f64>,
    pub day_carbohydrates_g: Option<f64>,
    pub day_calories_kcal: Option<f64>,
    pub is_active: Option<bool>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub notes: Option<String>,
}

impl DietPatch {
    pub fn merge_into(self, current: &Diet) -> DietPayload {
        DietPayload {
            name: Some(self.name.unwrap_or_else(|| current.name.clone())),
            day_proteins_g: Some(self.day_proteins_g.unwrap_or(current.day_proteins_g)),
            day_fats_g: Some(self.day_fats_g.unwrap_or(current.day_fats_g)),
            day_carbohydrates_g: Some(
                self.day_carbohydrates_g.unwrap_or(current.day_carbohydrates_g),
            ),
            day_calories_kcal: Some(self.day_calories_kcal.unwrap_or(current.day_calories_kcal)),
            is_active: self.is_active.unwrap_or(current.is_active),
            start_date: Some(self.start_date.unwrap_or(current.start_date)),
            end_date: self.end_date.or(current.end_date),
            notes: self.notes.or_else(|| current.notes.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DietOut {
    pub id: Uuid,
    pub user: Uuid,
    pub name: String,
    pub day_proteins_g: f64,
    pub day_fats_g: f64,
    pub day_carbohydrates_g: f64,
    pub day_calories_kcal: f64,
    pub is_active: bool,
    pub start_date: Date,
    pub end_date: Option<Date>,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Diet> for DietOut {
    fn from(diet: Diet) -> Self {
        Self {
            id: diet.id,
            user: diet.user_id,
            name: diet.name,
            day_proteins_g: diet.day_proteins_g,
            day_fats_g: diet.day_fats_g,
            day_carbohydrates_g: diet.day_carbohydrates_g,
            day_calories_kcal: diet.day_calories_kcal,
            is_active: diet.is_active,
            start_date: diet.start_date,
            end_date: diet.end_date,
            notes: diet.notes,
            created_at: diet.created_at,
            updated_at: diet.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DietListQuery {
    pub is_active: Option<bool>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

// ---------------------------------------------------------------------------
// Meals

#[derive(Debug, Deserialize)]
pub struct MealPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub diet: Option<Uuid>,
    pub meal_type: Option<String>,
    #[serde(default)]
    pub is_scheduled: bool,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub start_time: Option<String>,
    pub duration_minutes: Option<i32>,
    pub recurrence_type: Option<String>,
    pub recurrence_until: Option<Date>,
}

impl MealPayload {
    pub fn validate(self) -> Result<MealData, ApiError> {
        let mut errors = FieldErrors::new();
        let name = check_name(&mut errors, "name", &self.name);
        let meal_type = check_choice::<MealType>(&mut errors, "meal_type", &self.meal_type);
        let recurrence_type = match &self.recurrence_type {
            None => RecurrenceType::None,
            Some(raw) => raw.parse().unwrap_or_else(|()| {
                errors.push(
                    "recurrence_type",
                    format!("\"{raw}\" is not a valid choice."),
                );
                RecurrenceType::None
            }),
        };
        let start_time = parse_time_field(&mut errors, "start_time", &self.start_time);
        if let Some(minutes) = self.duration_minutes {
            if minutes <= 0 {
                errors.push(
                    "duration_minutes",
                    "Ensure this value is greater than 0.",
                );
            }
        }
        check_date_order(&mut errors, self.start_date, self.end_date);
        errors.into_result()?;

        Ok(MealData {
            diet_id: self.diet,
            name,
            description: self.description,
            meal_type: meal_type.unwrap_or(MealType::Snack),
            is_scheduled: self.is_scheduled,
            start_date: self.start_date,
            end_date: self.end_date,
            start_time,
            duration_minutes: self.duration_minutes,
            recurrence_type,
            recurrence_until: self.recurrence_until,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MealPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub diet: Option<Uuid>,
    pub meal_type: Option<String>,
    pub is_scheduled: Option<bool>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub start_time: Option<String>,
    pub duration_minutes: Option<i32>,
    pub recurrence_type: Option<String>,
    pub recurrence_until: Option<Date>,
}

impl MealPatch {
    pub fn merge_into(self, current: &Meal) -> MealPayload {
        MealPayload {
            name: Some(self.name.unwrap_or_else(|| current.name.clone())),
            description: self.description.or_else(|| current.description.clone()),
            diet: self.diet.or(current.diet_id),
            meal_type: Some(
                self.meal_type
                    .unwrap_or_else(|| current.meal_type.as_str().to_string()),
            ),
            is_scheduled: self.is_scheduled.unwrap_or(current.is_scheduled),
            start_date: self.start_date.or(current.start_date),
            end_date: self.end_date.or(current.end_date),
            start_time: self
                .start_time
                .or_else(|| current.start_time.map(format_time)),
            duration_minutes: self.duration_minutes.or(current.duration_minutes),
            recurrence_type: Some(
                self.recurrence_type
                    .unwrap_or_else(|| current.recurrence_type.as_str().to_string()),
            ),
            recurrence_until: self.recurrence_until.or(current.recurrence_until),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MealOut {
    pub id: Uuid,
    pub user: Uuid,
    pub diet: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub meal_type: MealType,
    pub is_scheduled: bool,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub start_time: Option<String>,
    pub duration_minutes: Option<i32>,
    pub recurrence_type: RecurrenceType,
    pub recurrence_until: Option<Date>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Meal> for MealOut {
    fn from(meal: Meal) -> Self {
        Self {
            id: meal.id,
            user: meal.user_id,
            diet: meal.diet_id,
            name: meal.name,
            description: meal.description,
            meal_type: meal.meal_type,
            is_scheduled: meal.is_scheduled,
            start_date: meal.start_date,
            end_date: meal.end_date,
            start_time: meal.start_time.map(format_time),
            duration_minutes: meal.duration_minutes,
            recurrence_type: meal.recurrence_type,
            recurrence_until: meal.recurrence_until,
            created_at: meal.created_at,
            updated_at: meal.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MealListQuery {
    pub diet: Option<Uuid>,
    pub meal_type: Option<String>,
    pub is_scheduled: Option<bool>,
    pub recurrence_type: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Output of `GET /meals/:id/nutrition_summary`.
#[derive(Debug, Serialize)]
pub struct MealNutritionSummary {
    pub total_calories: f64,
    pub total_proteins: f64,
    pub total_fats: f64,
    pub total_carbs: f64,
    pub ingredient_count: i64,
}

// ---------------------------------------------------------------------------
// Meal ingredients

#[derive(Debug, Deserialize)]
pub struct MealIngredientPayload {
    pub meal: Option<Uuid>,
    pub ingredient: Option<Uuid>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub barcode: Option<String>,
}

impl MealIngredientPayload {
    /// `meal_override` carries the path id for the nested
    /// `/meals/:id/add_ingredient` action.
    pub fn validate(self, meal_override: Option<Uuid>) -> Result<MealIngredientData, ApiError> {
        let mut errors = FieldErrors::new();
        let meal_id = meal_override.or(self.meal);
        if meal_id.is_none() {
            errors.push("meal", "This field is required.");
        }
        if self.ingredient.is_none() {
            errors.push("ingredient", "This field is required.");
        }
        let quantity = match self.quantity {
            None => {
                errors.push("quantity", "This field is required.");
                0.0
            }
            Some(q) if !q.is_finite() || q <= 0.0 => {
                errors.push("quantity", "Ensure this value is greater than 0.");
                0.0
            }
            Some(q) => q,
        };
        let unit = match &self.unit {
            None => IngredientUnit::G,
            Some(raw) => raw.parse().unwrap_or_else(|()| {
                errors.push("unit", format!("\"{raw}\" is not a valid choice."));
                IngredientUnit::G
            }),
        };
        errors.into_result()?;

        Ok(MealIngredientData {
            meal_id: meal_id.unwrap_or_default(),
            ingredient_id: self.ingredient.unwrap_or_default(),
            quantity,
            unit,
            barcode: self.barcode,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MealIngredientPatch {
    pub meal: Option<Uuid>,
    pub ingredient: Option<Uuid>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub barcode: Option<String>,
}

impl MealIngredientPatch {
    pub fn merge_into(self, current: &MealIngredient) -> MealIngredientPayload {
        MealIngredientPayload {
            meal: self.meal.or(Some(current.meal_id)),
            ingredient: self.ingredient.or(Some(current.ingredient_id)),
            quantity: Some(self.quantity.unwrap_or(current.quantity)),
            unit: Some(self.unit.unwrap_or_else(|| current.unit.as_str().to_string())),
            barcode: self.barcode.or_else(|| current.barcode.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MealIngredientOut {
    pub id: Uuid,
    pub meal: Uuid,
    pub ingredient: Uuid,
    pub quantity: f64,
    pub unit: IngredientUnit,
    pub barcode: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<MealIngredient> for MealIngredientOut {
    fn from(row: MealIngredient) -> Self {
        Self {
            id: row.id,
            meal: row.meal_id,
            ingredient: row.ingredient_id,
            quantity: row.quantity,
            unit: row.unit,
            barcode: row.barcode,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MealIngredientListQuery {
    pub meal: Option<Uuid>,
    pub ingredient: Option<Uuid>,
    pub ordering: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

// ---------------------------------------------------------------------------
// Ingredients

#[derive(Debug, Deserialize)]
pub struct IngredientPayload {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Uuid>,
    pub proteins: Option<f64>,
    pub fats: Option<f64>,
    pub carbs: Option<f64>,
    pub calories: Option<f64>,
    pub fibers: Option<f64>,
    pub sugars: Option<f64>,
}

impl IngredientPayload {
    pub fn validate(self) -> Result<IngredientData, ApiError> {
        let mut errors = FieldErrors::new();
        let name = check_name(&mut errors, "name", &self.name);
        let proteins = check_non_negative(&mut errors, "proteins", self.proteins);
        let fats = check_non_negative(&mut errors, "fats", self.fats);
        let carbs = check_non_negative(&mut errors, "carbs", self.carbs);
        let calories = check_non_negative(&mut errors, "calories", self.calories);
        let fibers = check_non_negative(&mut errors, "fibers", self.fibers);
        let sugars = check_non_negative(&mut errors, "sugars", self.sugars);
        errors.into_result()?;

        Ok(IngredientData {
            name,
            description: self.description,
            category_id: self.category,
            proteins,
            fats,
            carbs,
            calories,
            fibers,
            sugars,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct IngredientPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Uuid>,
    pub proteins: Option<f64>,
    pub fats: Option<f64>,
    pub carbs: Option<f64>,
    pub calories: Option<f64>,
    pub fibers: Option<f64>,
    pub sugars: Option<f64>,
}

impl IngredientPatch {
    pub fn merge_into(self, current: &Ingredient) -> IngredientPayload {
        IngredientPayload {
            name: Some(self.name.unwrap_or_else(|| current.name.clone())),
            description: self.description.or_else(|| current.description.clone()),
            category: self.category.or(current.category_id),
            proteins: Some(self.proteins.unwrap_or(current.proteins)),
            fats: Some(self.fats.unwrap_or(current.fats)),
            carbs: Some(self.carbs.unwrap_or(current.carbs)),
            calories: Some(self.calories.unwrap_or(current.calories)),
            fibers: Some(self.fibers.unwrap_or(current.fibers)),
            sugars: Some(self.sugars.unwrap_or(current.sugars)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IngredientOut {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<Uuid>,
    pub proteins: f64,
    pub fats: f64,
    pub carbs: f64,
    pub calories: f64,
    pub fibers: f64,
    pub sugars: f64,
    pub is_personal: bool,
    pub created_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Ingredient> for IngredientOut {
    fn from(row: Ingredient) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            category: row.category_id,
            proteins: row.proteins,
            fats: row.fats,
            carbs: row.carbs,
            calories: row.calories,
            fibers: row.fibers,
            sugars: row.sugars,
            is_personal: row.is_personal,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Compact autocomplete row.
#[derive(Debug, Serialize)]
pub struct IngredientSearchOut {
    pub id: Uuid,
    pub name: String,
    pub calories: f64,
}

impl From<Ingredient> for IngredientSearchOut {
    fn from(row: Ingredient) -> Self {
        Self {
            id: row.id,
            name: row.name,
            calories: row.calories,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct IngredientListQuery {
    pub category: Option<Uuid>,
    pub is_personal: Option<bool>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct IngredientSearchQuery {
    pub q: Option<String>,
}

// ---------------------------------------------------------------------------
// Categories

#[derive(Debug, Deserialize)]
pub struct CategoryPayload {
    pub name: Option<String>,
    pub parent: Option<Uuid>,
}

impl CategoryPayload {
    pub fn validate(&self) -> Result<String, ApiError> {
        let mut errors = FieldErrors::new();
        let name = check_name(&mut errors, "name", &self.name);
        errors.into_result()?;
        Ok(name)
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub parent: Option<Uuid>,
}

impl CategoryPatch {
    pub fn merge_into(self, current: &Category) -> CategoryPayload {
        CategoryPayload {
            name: Some(self.name.unwrap_or_else(|| current.name.clone())),
            parent: self.parent.or(current.parent_id),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryOut {
    pub id: Uuid,
    pub name: String,
    pub parent: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<Category> for CategoryOut {
    fn from(row: Category) -> Self {
        Self {
            id: row.id,
            name: row.name,
            parent: row.parent_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CategoryListQuery {
    pub parent: Option<Uuid>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

// ---------------------------------------------------------------------------
// Meal records

#[derive(Debug, Deserialize)]
pub struct MealRecordPayload {
    pub meal: Option<Uuid>,
    pub meal_name: Option<String>,
    pub quantity_grams: Option<f64>,
    pub calories: Option<f64>,
    pub proteins: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    pub feedback: Option<String>,
}

impl MealRecordPayload {
    pub fn validate(self) -> Result<MealRecordData, ApiError> {
        let mut errors = FieldErrors::new();
        if self.timestamp.is_none() {
            errors.push("timestamp", "This field is required.");
        }
        check_optional_non_negative(&mut errors, "quantity_grams", self.quantity_grams);
        check_optional_non_negative(&mut errors, "calories", self.calories);
        check_optional_non_negative(&mut errors, "proteins", self.proteins);
        check_optional_non_negative(&mut errors, "carbs", self.carbs);
        check_optional_non_negative(&mut errors, "fats", self.fats);
        errors.into_result()?;

        Ok(MealRecordData {
            meal_id: self.meal,
            meal_name: self.meal_name,
            quantity_grams: self.quantity_grams,
            calories: self.calories,
            proteins: self.proteins,
            carbs: self.carbs,
            fats: self.fats,
            timestamp: self.timestamp.unwrap_or(OffsetDateTime::UNIX_EPOCH),
            feedback: self.feedback,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MealRecordPatch {
    pub meal: Option<Uuid>,
    pub meal_name: Option<String>,
    pub quantity_grams: Option<f64>,
    pub calories: Option<f64>,
    pub proteins: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub timestamp: Option<OffsetDateTime>,
    pub feedback: Option<String>,
}

impl MealRecordPatch {
    pub fn merge_into(self, current: &MealRecord) -> MealRecordPayload {
        MealRecordPayload {
            meal: self.meal.or(current.meal_id),
            meal_name: self.meal_name.or_else(|| current.meal_name.clone()),
            quantity_grams: self.quantity_grams.or(current.quantity_grams),
            calories: self.calories.or(current.calories),
            proteins: self.proteins.or(current.proteins),
            carbs: self.carbs.or(current.carbs),
            fats: self.fats.or(current.fats),
            timestamp: Some(self.timestamp.unwrap_or(current.timestamp)),
            feedback: self.feedback.or_else(|| current.feedback.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MealRecordOut {
    pub id: Uuid,
    pub user: Uuid,
    pub meal: Option<Uuid>,
    pub meal_name: Option<String>,
    pub quantity_grams: Option<f64>,
    pub calories: Option<f64>,
    pub proteins: Option<f64>,
    pub carbs: Option<f64>,
    pub fats: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub photo: Option<String>,
    pub feedback: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<MealRecord> for MealRecordOut {
    fn from(row: MealRecord) -> Self {
        Self {
            id: row.id,
            user: row.user_id,
            meal: row.meal_id,
            meal_name: row.meal_name,
            quantity_grams: row.quantity_grams,
            calories: row.calories,
            proteins: row.proteins,
            carbs: row.carbs,
            fats: row.fats,
            timestamp: row.timestamp,
            photo: row.photo_key,
            feedback: row.feedback,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MealRecordListQuery {
    pub meal: Option<Uuid>,
    pub date: Option<Date>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct NutritionSummaryQuery {
    pub days: Option<i64>,
}

/// Output of `GET /records/nutrition_summary`.
#[derive(Debug, Serialize)]
pub struct RecordNutritionSummary {
    pub period_days: i64,
    pub start_date: Date,
    pub end_date: Date,
    pub total_calories: f64,
    pub total_proteins: f64,
    pub total_fats: f64,
    pub total_carbs: f64,
    pub average_daily_calories: f64,
    pub average_daily_proteins: f64,
    pub average_daily_fats: f64,
    pub average_daily_carbs: f64,
    pub record_count: i64,
}

// ---------------------------------------------------------------------------
// Meal preferences

#[derive(Debug, Deserialize)]
pub struct MealPreferencePayload {
    pub ingredient: Option<Uuid>,
    pub preference_type: Option<String>,
    pub description: Option<String>,
}

impl MealPreferencePayload {
    pub fn validate(self) -> Result<MealPreferenceData, ApiError> {
        let mut errors = FieldErrors::new();
        if self.ingredient.is_none() {
            errors.push("ingredient", "This field is required.");
        }
        let preference_type =
            check_choice::<PreferenceType>(&mut errors, "preference_type", &self.preference_type);
        errors.into_result()?;

        Ok(MealPreferenceData {
            ingredient_id: self.ingredient.unwrap_or_default(),
            preference_type: preference_type.unwrap_or(PreferenceType::Like),
            description: self.description,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MealPreferencePatch {
    pub ingredient: Option<Uuid>,
    pub preference_type: Option<String>,
    pub description: Option<String>,
}

impl MealPreferencePatch {
    pub fn merge_into(self, current: &MealPreference) -> MealPreferencePayload {
        MealPreferencePayload {
            ingredient: self.ingredient.or(Some(current.ingredient_id)),
            preference_type: Some(
                self.preference_type
                    .unwrap_or_else(|| current.preference_type.as_str().to_string()),
            ),
            description: self.description.or_else(|| current.description.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MealPreferenceOut {
    pub id: Uuid,
    pub user: Uuid,
    pub ingredient: Uuid,
    pub preference_type: PreferenceType,
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<MealPreference> for MealPreferenceOut {
    fn from(row: MealPreference) -> Self {
        Self {
            id: row.id,
            user: row.user_id,
            ingredient: row.ingredient_id,
            preference_type: row.preference_type,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MealPreferenceListQuery {
    pub preference_type: Option<String>,
    pub ingredient: Option<Uuid>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ByTypeQuery {
    #[serde(rename = "type")]
    pub preference_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn diet_payload() -> DietPayload {
        DietPayload {
            name: Some("Cutting".into()),
            day_proteins_g: Some(150.0),
            day_fats_g: Some(60.0),
            day_carbohydrates_g: Some(200.0),
            day_calories_kcal: Some(1900.0),
            is_active: false,
            start_date: Some(date!(2025 - 07 - 01)),
            end_date: Some(date!(2025 - 08 - 01)),
            notes: None,
        }
    }

    #[test]
    fn valid_diet_passes() {
        assert!(diet_payload().validate().is_ok());
    }

    #[test]
    fn diet_end_before_start_is_rejected() {
        let mut payload = diet_payload();
        payload.end_date = Some(date!(2025 - 06 - 01));
        let Err(ApiError::Validation(errors)) = payload.validate() else {
            panic!("expected validation error");
        };
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["end_date"][0], "end_date must be on or after start_date.");
    }

    #[test]
    fn diet_open_end_date_is_fine() {
        let mut payload = diet_payload();
        payload.end_date = None;
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn diet_negative_macro_and_missing_name_collected_together() {
        let mut payload = diet_payload();
        payload.name = None;
        payload.day_proteins_g = Some(-1.0);
        let Err(ApiError::Validation(errors)) = payload.validate() else {
            panic!("expected validation error");
        };
        let json = serde_json::to_value(&errors).unwrap();
        assert!(json.get("name").is_some());
        assert!(json.get("day_proteins_g").is_some());
    }

    #[test]
    fn meal_requires_name_and_valid_type() {
        let payload = MealPayload {
            name: None,
            description: None,
            diet: None,
            meal_type: Some("brunch".into()),
            is_scheduled: false,
            start_date: None,
            end_date: None,
            start_time: None,
            duration_minutes: None,
            recurrence_type: None,
            recurrence_until: None,
        };
        let Err(ApiError::Validation(errors)) = payload.validate() else {
            panic!("expected validation error");
        };
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["meal_type"][0], "\"brunch\" is not a valid choice.");
        assert!(json.get("name").is_some());
    }

    #[test]
    fn meal_parses_start_time_with_and_without_seconds() {
        for raw in ["08:30", "08:30:15"] {
            let payload = MealPayload {
                name: Some("Oats".into()),
                description: None,
                diet: None,
                meal_type: Some("breakfast".into()),
                is_scheduled: true,
                start_date: Some(date!(2025 - 07 - 01)),
                end_date: None,
                start_time: Some(raw.into()),
                duration_minutes: Some(30),
                recurrence_type: Some("daily".into()),
                recurrence_until: None,
            };
            let data = payload.validate().expect("should validate");
            assert!(data.start_time.is_some());
            assert_eq!(data.recurrence_type, RecurrenceType::Daily);
        }
    }

    #[test]
    fn meal_rejects_bad_start_time() {
        let payload = MealPayload {
            name: Some("Oats".into()),
            description: None,
            diet: None,
            meal_type: Some("breakfast".into()),
            is_scheduled: false,
            start_date: None,
            end_date: None,
            start_time: Some("half past nine".into()),
            duration_minutes: None,
            recurrence_type: None,
            recurrence_until: None,
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn meal_ingredient_quantity_must_be_positive() {
        let payload = MealIngredientPayload {
            meal: Some(Uuid::new_v4()),
            ingredient: Some(Uuid::new_v4()),
            quantity: Some(0.0),
            unit: None,
            barcode: None,
        };
        assert!(payload.validate(None).is_err());
    }

    #[test]
    fn meal_ingredient_defaults_to_grams() {
        let payload = MealIngredientPayload {
            meal: Some(Uuid::new_v4()),
            ingredient: Some(Uuid::new_v4()),
            quantity: Some(150.0),
            unit: None,
            barcode: None,
        };
        let data = payload.validate(None).unwrap();
        assert_eq!(data.unit, IngredientUnit::G);
    }

    #[test]
    fn record_requires_timestamp() {
        let payload = MealRecordPayload {
            meal: None,
            meal_name: Some("Leftovers".into()),
            quantity_grams: None,
            calories: Some(400.0),
            proteins: None,
            carbs: None,
            fats: None,
            timestamp: None,
            feedback: None,
        };
        let Err(ApiError::Validation(errors)) = payload.validate() else {
            panic!("expected validation error");
        };
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["timestamp"][0], "This field is required.");
    }

    #[test]
    fn record_rejects_negative_macros() {
        let payload = MealRecordPayload {
            meal: None,
            meal_name: None,
            quantity_grams: Some(-10.0),
            calories: Some(-1.0),
            proteins: None,
            carbs: None,
            fats: None,
            timestamp: Some(OffsetDateTime::UNIX_EPOCH),
            feedback: None,
        };
        let Err(ApiError::Validation(errors)) = payload.validate() else {
            panic!("expected validation error");
        };
        let json = serde_json::to_value(&errors).unwrap();
        assert!(json.get("quantity_grams").is_some());
        assert!(json.get("calories").is_some());
    }

    #[test]
    fn preference_requires_known_type() {
        let payload = MealPreferencePayload {
            ingredient: Some(Uuid::new_v4()),
            preference_type: Some("adores".into()),
            description: None,
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn patch_merge_keeps_unset_fields() {
        let now = OffsetDateTime::UNIX_EPOCH;
        let current = Diet {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Bulk".into(),
            day_proteins_g: 180.0,
            day_fats_g: 70.0,
            day_carbohydrates_g: 300.0,
            day_calories_kcal: 2600.0,
            is_active: true,
            start_date: date!(2025 - 01 - 01),
            end_date: None,
            notes: Some("winter".into()),
            created_at: now,
            updated_at: now,
        };
        let patch = DietPatch {
            name: None,
            day_proteins_g: Some(200.0),
            day_fats_g: None,
            day_carbohydrates_g: None,
            day_calories_kcal: None,
            is_active: None,
            start_date: None,
            end_date: None,
            notes: None,
        };
        let data = patch.merge_into(&current).validate().unwrap();
        assert_eq!(data.name, "Bulk");
        assert_eq!(data.day_proteins_g, 200.0);
        assert!(data.is_active);
        assert_eq!(data.notes.as_deref(), Some("winter"));
    }
}
