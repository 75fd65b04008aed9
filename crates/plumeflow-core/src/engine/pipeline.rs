//! Pipeline runner.
//!
//! Executes an ordered chain of agents, threading each step's output
//! into the next step's input and recording the run as it goes. Steps
//! are strictly sequential; step i+1 never starts before step i's
//! output is persisted. All-or-nothing per step: the first failure ends
//! the run as `failed`, successful earlier outputs stay visible.
//!
//! `run_pipeline` and `run_agent` are total. Every failure (missing
//! agent, capability error, storage error) is encoded in the returned
//! `Run`, never raised to the caller.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::engine::{AgentInvoker, EngineError};
use plumeflow_models::{Agent, Pipeline, Run, RunOutput, RunOutputMeta, StandardOutput};
use plumeflow_storage::Storage;

pub struct PipelineRunner {
    storage: Arc<Storage>,
    invoker: Arc<AgentInvoker>,
}

impl PipelineRunner {
    pub fn new(storage: Arc<Storage>, invoker: Arc<AgentInvoker>) -> Self {
        Self { storage, invoker }
    }

    /// Execute every step of the pipeline, feeding each step's output
    /// into the next step's input via its mapping rule.
    pub async fn run_pipeline(&self, pipeline: &Pipeline, input: &str) -> Run {
        let mut run = Run::for_pipeline(pipeline.owner.clone(), pipeline.id.clone(), input);
        if let Err(e) = self.storage.runs.insert(&run) {
            warn!(run_id = %run.id, error = %e, "Failed to create run record");
        }
        info!(
            run_id = %run.id,
            pipeline_id = %pipeline.id,
            steps = pipeline.steps.len(),
            "Starting pipeline run"
        );

        let mut current_input = input.to_string();
        let total = pipeline.steps.len();

        for (index, step) in pipeline.steps.iter().enumerate() {
            let step_number = index + 1;

            let agent = match self.storage.agents.get(&step.agent_id, &pipeline.owner) {
                Ok(Some(agent)) => agent,
                Ok(None) => {
                    let message = format!(
                        "Agent with ID {} not found for pipeline step {}",
                        step.agent_id, step_number
                    );
                    error!(run_id = %run.id, "{}", message);
                    return self.fail_run(run, message);
                }
                Err(e) => {
                    let message =
                        format!("Failed to load agent for pipeline step {}: {}", step_number, e);
                    error!(run_id = %run.id, "{}", message);
                    return self.fail_run(run, message);
                }
            };

            debug!(
                run_id = %run.id,
                step = step_number,
                agent_id = %agent.id,
                "Executing pipeline step"
            );
            let result = self.invoker.invoke(&agent, &current_input).await;

            if result.is_failure() {
                let message = result
                    .error()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Failed at step {}", step_number));
                error!(run_id = %run.id, step = step_number, error = %message, "Pipeline step failed");
                return self.fail_run(run, message);
            }

            run = self.record_step(run, &agent, &result, step_number);

            if step_number < total {
                let mapping = pipeline.steps[index + 1].input_mapping.as_deref();
                match extract_input(&result.output(), mapping) {
                    Ok(next_input) => current_input = next_input,
                    Err(e) => {
                        error!(run_id = %run.id, step = step_number, error = %e, "Input mapping failed");
                        return self.fail_run(run, e.to_string());
                    }
                }
            } else {
                return self.complete_run(run, result.output(), Some(result.meta()));
            }
        }

        // Zero-step pipeline: nothing to execute, nothing to output.
        self.complete_run(run, Value::Null, None)
    }

    /// Execute a single agent under a run record.
    pub async fn run_agent(&self, agent: &Agent, input: &str) -> Run {
        let mut run = Run::for_agent(agent.owner.clone(), agent.id.clone(), input);
        if let Err(e) = self.storage.runs.insert(&run) {
            warn!(run_id = %run.id, error = %e, "Failed to create run record");
        }
        info!(run_id = %run.id, agent_id = %agent.id, "Starting agent run");

        let result = self.invoker.invoke(agent, input).await;

        if result.is_failure() {
            let message = result
                .error()
                .map(str::to_string)
                .unwrap_or_else(|| "Agent run failed".to_string());
            return self.fail_run(run, message);
        }

        run = self.record_step(run, agent, &result, 1);
        self.complete_run(run, result.output(), Some(result.meta()))
    }

    /// Append a step output so a polling reader sees partial progress.
    fn record_step(
        &self,
        run: Run,
        agent: &Agent,
        result: &StandardOutput,
        step_number: usize,
    ) -> Run {
        let entry = RunOutput {
            agent_id: agent.id.clone(),
            output: result.output(),
            timestamp: Utc::now(),
            meta: Some(result.meta()),
        };
        match self.storage.runs.append_output(&run.id, entry.clone()) {
            Ok(updated) => updated,
            Err(e) => {
                warn!(run_id = %run.id, step = step_number, error = %e, "Failed to persist step output");
                let mut run = run;
                run.outputs.push(entry);
                run
            }
        }
    }

    fn fail_run(&self, mut run: Run, message: String) -> Run {
        match self.storage.runs.fail(&run.id, message.clone()) {
            Ok(updated) => updated,
            Err(e) => {
                warn!(run_id = %run.id, error = %e, "Failed to persist run failure");
                run.fail(message);
                run
            }
        }
    }

    fn complete_run(
        &self,
        mut run: Run,
        final_output: Value,
        meta: Option<RunOutputMeta>,
    ) -> Run {
        match self
            .storage
            .runs
            .complete(&run.id, final_output.clone(), meta.clone())
        {
            Ok(updated) => {
                info!(run_id = %updated.id, "Run completed");
                updated
            }
            Err(e) => {
                warn!(run_id = %run.id, error = %e, "Failed to persist run completion");
                run.complete(final_output, meta);
                run
            }
        }
    }
}

/// Derive the next step's input text from the previous step's output.
///
/// `direct` (or absent) uses the output as-is, serialized when it is not
/// already a string. `field.<name>` extracts one field from the parsed
/// output, falling back to the direct rule when the field is absent. A
/// string output that does not parse as JSON under `field.<name>` is a
/// step-fatal error.
pub fn extract_input(output: &Value, mapping: Option<&str>) -> Result<String, EngineError> {
    let mapping = mapping.unwrap_or("direct");
    debug!(mapping, "Extracting step input");

    if let Some(field) = mapping.strip_prefix("field.") {
        let parsed: Value = match output {
            Value::String(s) => serde_json::from_str(s).map_err(|e| {
                EngineError::Config(format!(
                    "Failed to parse step output as JSON for mapping {}: {}",
                    mapping, e
                ))
            })?,
            other => other.clone(),
        };

        if let Some(value) = parsed.get(field) {
            return Ok(stringify(value));
        }
        warn!(field, "Field not found in step output, falling back to full output");
    }

    Ok(stringify(output))
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
