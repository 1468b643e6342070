pub mod bands;
mod csv;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod pictures;
pub mod pipeline;
pub mod query;
pub mod repo;
pub mod repo_types;
pub mod services;
pub mod validation;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
