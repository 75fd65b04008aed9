use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::response;
use crate::api::state::{AppState, owner_from};
use crate::services::agent::{self, AgentDraft};

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub input: Option<String>,
}

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_agents).post(create_agent))
        .route(
            "/{id}",
            get(get_agent).put(update_agent).delete(delete_agent),
        )
        .route("/{id}/run", post(run_agent))
}

// GET /api/agents
async fn list_agents(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    let owner = owner_from(&headers);
    match agent::list_agents(&state.core, &owner).await {
        Ok(agents) => response::success(agents),
        Err(e) => response::error(e),
    }
}

// GET /api/agents/{id}
async fn get_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Json<Value> {
    let owner = owner_from(&headers);
    match agent::get_agent(&state.core, &owner, &id).await {
        Ok(agent) => response::success(agent),
        Err(e) => response::error(e),
    }
}

// POST /api/agents
async fn create_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(draft): Json<AgentDraft>,
) -> Json<Value> {
    let owner = owner_from(&headers);
    match agent::create_agent(&state.core, &owner, draft).await {
        Ok(agent) => response::success_with_message(agent, "Agent created successfully".into()),
        Err(e) => response::error(e),
    }
}

// PUT /api/agents/{id}
async fn update_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(draft): Json<AgentDraft>,
) -> Json<Value> {
    let owner = owner_from(&headers);
    match agent::update_agent(&state.core, &owner, &id, draft).await {
        Ok(agent) => response::success_with_message(agent, "Agent updated successfully".into()),
        Err(e) => response::error(e),
    }
}

// DELETE /api/agents/{id}
async fn delete_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Json<Value> {
    let owner = owner_from(&headers);
    match agent::delete_agent(&state.core, &owner, &id).await {
        Ok(true) => response::success(serde_json::json!({"deleted": true})),
        Ok(false) => response::error(format!("Agent {} not found", id)),
        Err(e) => response::error(e),
    }
}

// POST /api/agents/{id}/run
async fn run_agent(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<RunRequest>,
) -> Json<Value> {
    let owner = owner_from(&headers);
    let Some(input) = request.input.filter(|input| !input.is_empty()) else {
        return response::error("Input is required".into());
    };
    match agent::run_agent(&state.core, &owner, &id, &input).await {
        Ok(run) => response::success(run),
        Err(e) => response::error(e),
    }
}
