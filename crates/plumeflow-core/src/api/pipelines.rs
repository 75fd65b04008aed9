use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
};
use serde_json::Value;

use crate::api::agents::RunRequest;
use crate::api::response;
use crate::api::state::{AppState, owner_from};
use crate::services::pipeline::{self, PipelineDraft};

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_pipelines).post(create_pipeline))
        .route(
            "/{id}",
            get(get_pipeline).put(update_pipeline).delete(delete_pipeline),
        )
        .route("/{id}/run", post(run_pipeline))
}

// GET /api/pipelines
async fn list_pipelines(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let owner = owner_from(&headers);
    match pipeline::list_pipelines(&state.core, &owner).await {
        Ok(pipelines) => response::success(pipelines),
        Err(e) => response::error(e),
    }
}

// GET /api/pipelines/{id}
async fn get_pipeline(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Json<Value> {
    let owner = owner_from(&headers);
    match pipeline::get_pipeline(&state.core, &owner, &id).await {
        Ok(pipeline) => response::success(pipeline),
        Err(e) => response::error(e),
    }
}

// POST /api/pipelines
async fn create_pipeline(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(draft): Json<PipelineDraft>,
) -> Json<Value> {
    let owner = owner_from(&headers);
    match pipeline::create_pipeline(&state.core, &owner, draft).await {
        Ok(pipeline) => {
            response::success_with_message(pipeline, "Pipeline created successfully".into())
        }
        Err(e) => response::error(e),
    }
}

// PUT /api/pipelines/{id}
async fn update_pipeline(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(draft): Json<PipelineDraft>,
) -> Json<Value> {
    let owner = owner_from(&headers);
    match pipeline::update_pipeline(&state.core, &owner, &id, draft).await {
        Ok(pipeline) => {
            response::success_with_message(pipeline, "Pipeline updated successfully".into())
        }
        Err(e) => response::error(e),
    }
}

// DELETE /api/pipelines/{id}
async fn delete_pipeline(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Json<Value> {
    let owner = owner_from(&headers);
    match pipeline::delete_pipeline(&state.core, &owner, &id).await {
        Ok(true) => response::success(serde_json::json!({"deleted": true})),
        Ok(false) => response::error(format!("Pipeline {} not found", id)),
        Err(e) => response::error(e),
    }
}

// POST /api/pipelines/{id}/run
async fn run_pipeline(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<RunRequest>,
) -> Json<Value> {
    let owner = owner_from(&headers);
    let Some(input) = request.input.filter(|input| !input.is_empty()) else {
        return response::error("Input is required".into());
    };
    match pipeline::run_pipeline(&state.core, &owner, &id, &input).await {
        Ok(run) => response::success(run),
        Err(e) => response::error(e),
    }
}
