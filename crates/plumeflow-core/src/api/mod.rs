//! HTTP surface. Thin handlers over the service layer; every response
//! uses the `{"status": ...}` envelope.

pub mod agents;
pub mod pipelines;
pub mod response;
pub mod runs;
pub mod state;
pub mod tools;

pub use state::AppState;

use std::sync::Arc;

use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::AppCore;

#[derive(Serialize)]
struct Health {
    status: String,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "plumeflow is working!".to_string(),
    })
}

pub fn create_router(core: Arc<AppCore>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/agents", agents::create_routes())
        .nest("/api/pipelines", pipelines::create_routes())
        .nest("/api/runs", runs::create_routes())
        .nest("/api/tools", tools::create_routes())
        .with_state(AppState { core })
}
