use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::output::FunctionCall;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// A persisted execution record of one agent or pipeline invocation.
///
/// Created in `running` state, outputs appended as steps complete, then
/// exactly one transition to `completed` or `failed`. Never mutated
/// afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    pub id: String,
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<String>,
    pub input: String,
    pub outputs: Vec<RunOutput>,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_output_meta: Option<RunOutputMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Run {
    pub fn for_agent(owner: impl Into<String>, agent_id: impl Into<String>, input: impl Into<String>) -> Self {
        Self::new(owner, Some(agent_id.into()), None, input)
    }

    pub fn for_pipeline(
        owner: impl Into<String>,
        pipeline_id: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self::new(owner, None, Some(pipeline_id.into()), input)
    }

    fn new(
        owner: impl Into<String>,
        agent_id: Option<String>,
        pipeline_id: Option<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner: owner.into(),
            agent_id,
            pipeline_id,
            input: input.into(),
            outputs: Vec::new(),
            status: RunStatus::Running,
            final_output: None,
            final_output_meta: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Mark the run completed with the last step's output.
    pub fn complete(&mut self, final_output: Value, meta: Option<RunOutputMeta>) {
        self.status = RunStatus::Completed;
        self.final_output = Some(final_output);
        self.final_output_meta = meta;
        self.completed_at = Some(Utc::now());
    }

    /// Mark the run failed with the first fatal error.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
    }
}

/// One step's standardized output as recorded on a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    pub agent_id: String,
    pub output: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RunOutputMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutputMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_calls: Option<Vec<FunctionCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<bool>,
}
