use axum::Router;

use crate::state::AppState;

pub mod dto;
pub mod repo;
pub mod types;

mod handlers;
mod measurements;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::routes())
        .merge(measurements::routes())
}
