use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::get,
};
use serde::Deserialize;
use serde_json::Value;

use crate::api::response;
use crate::api::state::{AppState, owner_from};
use crate::services::run;
use plumeflow_storage::RunFilter;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQuery {
    pub agent_id: Option<String>,
    pub pipeline_id: Option<String>,
}

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_runs))
        .route("/{id}", get(get_run))
}

// GET /api/runs?agentId=..&pipelineId=..
async fn list_runs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RunQuery>,
) -> Json<Value> {
    let owner = owner_from(&headers);
    let filter = RunFilter {
        agent_id: query.agent_id,
        pipeline_id: query.pipeline_id,
    };
    match run::list_runs(&state.core, &owner, filter).await {
        Ok(runs) => response::success(runs),
        Err(e) => response::error(e),
    }
}

// GET /api/runs/{id}
async fn get_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Json<Value> {
    let owner = owner_from(&headers);
    match run::get_run(&state.core, &owner, &id).await {
        Ok(run) => response::success(run),
        Err(e) => response::error(e),
    }
}
