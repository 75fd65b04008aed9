use axum::{Json, Router, extract::State, routing::post};
use serde_json::Value;

use crate::api::response;
use crate::api::state::AppState;
use crate::services::tool::{self, ToolTestRequest};

pub fn create_routes() -> Router<AppState> {
    Router::new().route("/test", post(test_tool))
}

// POST /api/tools/test
async fn test_tool(
    State(state): State<AppState>,
    Json(request): Json<ToolTestRequest>,
) -> Json<Value> {
    match tool::test_tool(&state.core, request).await {
        Ok(result) => response::success(result),
        Err(e) => response::error(e),
    }
}
