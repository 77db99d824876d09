use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use crate::state::AppState;

pub mod dto;
pub mod events;
pub mod handler;
pub mod model;
pub mod registry;
pub mod service;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/upload",
            post(handler::upload_video).layer(DefaultBodyLimit::disable()),
        )
        .route("/getProgressByToken/{token}", get(handler::get_progress_by_token))
        .route("/getProgressByHash/{sourceHash}", get(handler::get_progress_by_hash))
}
