use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod repo;
pub mod types;

mod categories;
mod diets;
mod ingredients;
mod meal_ingredients;
mod meals;
mod preferences;
mod records;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(diets::routes())
        .merge(meals::routes())
        .merge(ingredients::routes())
        .merge(categories::routes())
        .merge(records::routes())
        .merge(preferences::routes())
        .merge(meal_ingredients::routes())
}
