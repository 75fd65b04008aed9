//! Agent services: CRUD, validation and execution.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::AppCore;
use plumeflow_ai::reconcile;
use plumeflow_models::{Agent, Run, StructuredOutputSpec, ToolDefinition};

/// Fields accepted on create and update. On update, absent fields keep
/// their stored values.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDraft {
    pub name: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub tools: Option<Vec<ToolDefinition>>,
    pub structured_output_schema: Option<StructuredOutputSpec>,
    pub auto_execute_tools: Option<bool>,
    pub cognition: Option<bool>,
    pub chain_run: Option<bool>,
    pub max_chain_iterations: Option<u32>,
    pub force_tool: Option<bool>,
    pub additional_params: Option<Map<String, Value>>,
}

pub async fn list_agents(core: &Arc<AppCore>, owner: &str) -> Result<Vec<Agent>, String> {
    core.storage
        .agents
        .list(owner)
        .map_err(|e| format!("Failed to list agents: {}", e))
}

pub async fn get_agent(core: &Arc<AppCore>, owner: &str, id: &str) -> Result<Agent, String> {
    core.storage
        .agents
        .get(id, owner)
        .map_err(|e| format!("Failed to get agent: {}", e))?
        .ok_or_else(|| format!("Agent {} not found", id))
}

pub async fn create_agent(
    core: &Arc<AppCore>,
    owner: &str,
    draft: AgentDraft,
) -> Result<Agent, String> {
    let (Some(name), Some(model), Some(system_prompt)) =
        (draft.name, draft.model, draft.system_prompt)
    else {
        return Err("Name, model, and systemPrompt are required".to_string());
    };
    if name.is_empty() || model.is_empty() || system_prompt.is_empty() {
        return Err("Name, model, and systemPrompt are required".to_string());
    }
    if draft.max_chain_iterations == Some(0) {
        return Err("maxChainIterations must be at least 1".to_string());
    }

    let mut agent = Agent::new(owner, name);
    agent.model = model;
    agent.system_prompt = system_prompt;
    agent.tools = draft.tools;
    agent.structured_output_schema = draft.structured_output_schema;
    agent.auto_execute_tools = draft.auto_execute_tools;
    agent.cognition = draft.cognition;
    agent.chain_run = draft.chain_run;
    agent.max_chain_iterations = draft.max_chain_iterations;
    agent.force_tool = draft.force_tool;
    agent.additional_params = draft.additional_params;

    core.storage
        .agents
        .insert(&agent)
        .map_err(|e| format!("Failed to create agent: {}", e))?;
    debug!(agent_id = %agent.id, "Agent created");
    Ok(agent)
}

/// Replace provided fields. The stored structured-output spec is
/// re-reconciled on every update so a previously stored bad name or
/// required list heals even when no new spec is supplied.
pub async fn update_agent(
    core: &Arc<AppCore>,
    owner: &str,
    id: &str,
    draft: AgentDraft,
) -> Result<Agent, String> {
    let mut agent = get_agent(core, owner, id).await?;

    if let Some(name) = draft.name {
        agent.name = name;
    }
    if let Some(model) = draft.model {
        agent.model = model;
    }
    if let Some(system_prompt) = draft.system_prompt {
        agent.system_prompt = system_prompt;
    }
    if let Some(tools) = draft.tools {
        agent.tools = Some(tools);
    }
    if let Some(spec) = draft.structured_output_schema {
        agent.structured_output_schema = Some(spec);
    }
    if let Some(value) = draft.auto_execute_tools {
        agent.auto_execute_tools = Some(value);
    }
    if let Some(value) = draft.cognition {
        agent.cognition = Some(value);
    }
    if let Some(value) = draft.chain_run {
        agent.chain_run = Some(value);
    }
    if let Some(value) = draft.max_chain_iterations {
        if value == 0 {
            return Err("maxChainIterations must be at least 1".to_string());
        }
        agent.max_chain_iterations = Some(value);
    }
    if let Some(value) = draft.force_tool {
        agent.force_tool = Some(value);
    }
    if let Some(params) = draft.additional_params {
        agent.additional_params = Some(params);
    }

    if let Some(spec) = agent.structured_output_schema.take() {
        agent.structured_output_schema = Some(reconcile(&spec));
    }

    core.storage
        .agents
        .update(&agent)
        .map_err(|e| format!("Failed to update agent: {}", e))?;
    debug!(agent_id = %agent.id, "Agent updated");
    Ok(agent)
}

pub async fn delete_agent(core: &Arc<AppCore>, owner: &str, id: &str) -> Result<bool, String> {
    core.storage
        .agents
        .delete(id, owner)
        .map_err(|e| format!("Failed to delete agent: {}", e))
}

/// Run a single agent under a persisted run record. Fails fast on a
/// missing input before any record exists.
pub async fn run_agent(
    core: &Arc<AppCore>,
    owner: &str,
    id: &str,
    input: &str,
) -> Result<Run, String> {
    if input.is_empty() {
        return Err("Input is required".to_string());
    }
    let agent = get_agent(core, owner, id).await?;
    Ok(core.runner.run_agent(&agent, input).await)
}
