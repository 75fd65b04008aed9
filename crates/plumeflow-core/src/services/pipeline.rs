//! Pipeline services: CRUD, validation and execution.

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::AppCore;
use plumeflow_models::{OutputDestination, Pipeline, PipelineStep, Run};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDraft {
    pub name: Option<String>,
    pub description: Option<String>,
    pub steps: Option<Vec<PipelineStep>>,
    pub output_destinations: Option<Vec<OutputDestination>>,
}

pub async fn list_pipelines(core: &Arc<AppCore>, owner: &str) -> Result<Vec<Pipeline>, String> {
    core.storage
        .pipelines
        .list(owner)
        .map_err(|e| format!("Failed to list pipelines: {}", e))
}

pub async fn get_pipeline(
    core: &Arc<AppCore>,
    owner: &str,
    id: &str,
) -> Result<Pipeline, String> {
    core.storage
        .pipelines
        .get(id, owner)
        .map_err(|e| format!("Failed to get pipeline: {}", e))?
        .ok_or_else(|| format!("Pipeline {} not found", id))
}

pub async fn create_pipeline(
    core: &Arc<AppCore>,
    owner: &str,
    draft: PipelineDraft,
) -> Result<Pipeline, String> {
    let Some(name) = draft.name.filter(|name| !name.is_empty()) else {
        return Err("Name is required".to_string());
    };
    let Some(steps) = draft.steps.filter(|steps| !steps.is_empty()) else {
        return Err("At least one step is required".to_string());
    };
    validate_steps(core, owner, &steps)?;

    let mut pipeline = Pipeline::new(owner, name);
    pipeline.description = draft.description.unwrap_or_default();
    pipeline.steps = steps;
    pipeline.output_destinations = draft.output_destinations;

    core.storage
        .pipelines
        .insert(&pipeline)
        .map_err(|e| format!("Failed to create pipeline: {}", e))?;
    debug!(pipeline_id = %pipeline.id, "Pipeline created");
    Ok(pipeline)
}

pub async fn update_pipeline(
    core: &Arc<AppCore>,
    owner: &str,
    id: &str,
    draft: PipelineDraft,
) -> Result<Pipeline, String> {
    let mut pipeline = get_pipeline(core, owner, id).await?;

    if let Some(name) = draft.name {
        pipeline.name = name;
    }
    if let Some(description) = draft.description {
        pipeline.description = description;
    }
    if let Some(steps) = draft.steps {
        if steps.is_empty() {
            return Err("At least one step is required".to_string());
        }
        validate_steps(core, owner, &steps)?;
        pipeline.steps = steps;
    }
    if let Some(destinations) = draft.output_destinations {
        pipeline.output_destinations = Some(destinations);
    }

    core.storage
        .pipelines
        .update(&pipeline)
        .map_err(|e| format!("Failed to update pipeline: {}", e))?;
    debug!(pipeline_id = %pipeline.id, "Pipeline updated");
    Ok(pipeline)
}

pub async fn delete_pipeline(core: &Arc<AppCore>, owner: &str, id: &str) -> Result<bool, String> {
    core.storage
        .pipelines
        .delete(id, owner)
        .map_err(|e| format!("Failed to delete pipeline: {}", e))
}

/// Run a pipeline under a persisted run record. Fails fast on a missing
/// input before any record exists.
pub async fn run_pipeline(
    core: &Arc<AppCore>,
    owner: &str,
    id: &str,
    input: &str,
) -> Result<Run, String> {
    if input.is_empty() {
        return Err("Input is required".to_string());
    }
    let pipeline = get_pipeline(core, owner, id).await?;
    Ok(core.runner.run_pipeline(&pipeline, input).await)
}

/// Every referenced agent must exist for the owner at authoring time.
/// Runtime still re-resolves per step; an agent deleted between edit and
/// run fails that run.
fn validate_steps(core: &Arc<AppCore>, owner: &str, steps: &[PipelineStep]) -> Result<(), String> {
    for (index, step) in steps.iter().enumerate() {
        let exists = core
            .storage
            .agents
            .get(&step.agent_id, owner)
            .map_err(|e| format!("Failed to validate step {}: {}", index + 1, e))?
            .is_some();
        if !exists {
            return Err(format!(
                "Agent {} not found for step {}",
                step.agent_id,
                index + 1
            ));
        }
    }
    Ok(())
}
