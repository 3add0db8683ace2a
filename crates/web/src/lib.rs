#![forbid(unsafe_code)]

//! HTTP surface for the lesson library.

pub mod auth;
pub mod error;
pub mod extract;
pub mod flash;
pub mod routes;
pub mod views;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use services::AppServices;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub services: AppServices,
}

impl AppState {
    #[must_use]
    pub fn new(services: AppServices) -> Self {
        Self { services }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(routes::accounts::routes())
        .merge(routes::lessons::routes())
        .merge(routes::admin::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
