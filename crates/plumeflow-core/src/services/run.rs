//! Run history services.

use std::sync::Arc;

use crate::AppCore;
use plumeflow_models::Run;
use plumeflow_storage::RunFilter;

pub async fn list_runs(
    core: &Arc<AppCore>,
    owner: &str,
    filter: RunFilter,
) -> Result<Vec<Run>, String> {
    core.storage
        .runs
        .list(owner, &filter)
        .map_err(|e| format!("Failed to list runs: {}", e))
}

pub async fn get_run(core: &Arc<AppCore>, owner: &str, id: &str) -> Result<Run, String> {
    core.storage
        .runs
        .get(id, owner)
        .map_err(|e| format!("Failed to get run: {}", e))?
        .ok_or_else(|| format!("Run {} not found", id))
}
