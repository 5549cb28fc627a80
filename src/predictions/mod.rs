use axum::Router;

use crate::{config::UploadConfig, state::AppState};

pub mod dto;
pub mod handlers;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router(upload: &UploadConfig) -> Router<AppState> {
    handlers::prediction_routes(upload)
}
