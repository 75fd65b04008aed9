//! Agent invoker: from a stored agent record to a standardized output.
//!
//! Builds the effective call configuration (identity fields from the
//! record, named defaults, allow-listed additional parameters), wires
//! source-implemented tools through the sandbox, reconciles the
//! structured-output spec, and delegates the call to the agent runner.
//! Total: every failure comes back as `StandardOutput::Failure`.

use std::sync::Arc;

use tracing::{debug, error};

use crate::engine::EngineError;
use plumeflow_ai::{
    AgentCallConfig, AgentRunner, LlmClientFactory, SandboxBackend, SourceTool, Tool,
    ToolRegistry, reconcile, standardize,
};
use plumeflow_models::{Agent, StandardOutput, ToolImplementation};

pub struct AgentInvoker {
    runner: AgentRunner,
    native_tools: Arc<ToolRegistry>,
    sandbox: Arc<dyn SandboxBackend>,
}

impl AgentInvoker {
    pub fn new(
        factory: Arc<dyn LlmClientFactory>,
        native_tools: Arc<ToolRegistry>,
        sandbox: Arc<dyn SandboxBackend>,
    ) -> Self {
        Self {
            runner: AgentRunner::new(factory),
            native_tools,
            sandbox,
        }
    }

    /// Invoke one agent with the given input text. Never returns an
    /// error: configuration and capability failures are encoded in the
    /// returned output.
    pub async fn invoke(&self, agent: &Agent, input: &str) -> StandardOutput {
        debug!(agent_id = %agent.id, model = %agent.model, "Invoking agent");

        let config = match self.build_config(agent) {
            Ok(config) => config,
            Err(e) => {
                error!(agent_id = %agent.id, error = %e, "Agent configuration failed");
                return StandardOutput::failure(e.to_string());
            }
        };

        match self.runner.run(&config, input).await {
            Ok(raw) => standardize(&raw),
            Err(e) => {
                let e = EngineError::Ai(e);
                error!(agent_id = %agent.id, error = %e, "Agent execution failed");
                StandardOutput::failure(e.to_string())
            }
        }
    }

    /// Assemble the effective configuration for one invocation.
    fn build_config(&self, agent: &Agent) -> Result<AgentCallConfig, EngineError> {
        let definitions = agent.tool_definitions();

        if agent.force_tool.unwrap_or(false) && definitions.len() != 1 {
            return Err(EngineError::Config(format!(
                "Agent {} has forceTool set but {} tools configured",
                agent.id,
                definitions.len()
            )));
        }

        let mut tools: Vec<Arc<dyn Tool>> = Vec::with_capacity(definitions.len());
        for definition in definitions {
            match &definition.implementation {
                ToolImplementation::Native(reference) => {
                    let tool = self.native_tools.get(reference).ok_or_else(|| {
                        EngineError::Config(format!(
                            "Native tool {} referenced by agent {} is not registered",
                            reference, agent.id
                        ))
                    })?;
                    tools.push(tool);
                }
                ToolImplementation::Source(_) => {
                    let tool = SourceTool::compile(definition, self.sandbox.clone())
                        .map_err(|e| EngineError::Config(e.to_string()))?;
                    tools.push(Arc::new(tool));
                }
            }
        }

        let mut builder = AgentCallConfig::builder(agent.model.clone(), agent.system_prompt.clone())
            .tools(tools)
            .structured_output(agent.structured_output_schema.as_ref().map(reconcile));

        if let Some(value) = agent.auto_execute_tools {
            builder = builder.auto_execute_tools(value);
        }
        if let Some(value) = agent.cognition {
            builder = builder.cognition(value);
        }
        if let Some(value) = agent.chain_run {
            builder = builder.chain_run(value);
        }
        if let Some(value) = agent.force_tool {
            builder = builder.force_tool(value);
        }
        if let Some(value) = agent.max_chain_iterations {
            builder = builder.max_chain_iterations(value);
        }
        if let Some(params) = &agent.additional_params {
            builder = builder.additional_params(params);
        }

        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plumeflow_ai::{FixedClientFactory, MockLlmClient, MockStep, ProcessSandbox, builtin_registry};
    use plumeflow_models::{StructuredOutputSpec, ToolDefinition, ToolParameters};
    use serde_json::json;

    fn invoker_for(client: &MockLlmClient) -> AgentInvoker {
        AgentInvoker::new(
            Arc::new(FixedClientFactory::new(Arc::new(client.clone()))),
            Arc::new(builtin_registry()),
            Arc::new(ProcessSandbox::with_interpreter("sh")),
        )
    }

    fn agent() -> Agent {
        let mut agent = Agent::new("local", "tester");
        agent.model = "mock-model".to_string();
        agent.system_prompt = "You are a test agent.".to_string();
        agent
    }

    #[tokio::test]
    async fn plain_invocation_standardizes_text() {
        let client = MockLlmClient::from_steps("mock-model", vec![MockStep::text("hello")]);
        let invoker = invoker_for(&client);

        let output = invoker.invoke(&agent(), "hi").await;
        assert!(matches!(output, StandardOutput::Text { .. }));
        assert_eq!(output.output(), json!("hello"));
    }

    #[tokio::test]
    async fn capability_error_becomes_failure() {
        let client =
            MockLlmClient::from_steps("mock-model", vec![MockStep::error("provider down")]);
        let invoker = invoker_for(&client);

        let output = invoker.invoke(&agent(), "hi").await;
        assert!(output.is_failure());
        assert!(output.error().unwrap().contains("provider down"));
    }

    #[tokio::test]
    async fn missing_native_tool_is_a_config_failure() {
        let client = MockLlmClient::new("mock-model");
        let invoker = invoker_for(&client);

        let mut agent = agent();
        agent.tools = Some(vec![ToolDefinition {
            name: "ghost".into(),
            description: "does not exist".into(),
            parameters: ToolParameters::default(),
            implementation: ToolImplementation::Native("ghost".into()),
        }]);

        let output = invoker.invoke(&agent, "hi").await;
        assert!(output.is_failure());
        assert!(output.error().unwrap().contains("not registered"));
    }

    #[tokio::test]
    async fn force_tool_without_exactly_one_tool_fails() {
        let client = MockLlmClient::new("mock-model");
        let invoker = invoker_for(&client);

        let mut agent = agent();
        agent.force_tool = Some(true);

        let output = invoker.invoke(&agent, "hi").await;
        assert!(output.is_failure());
        assert!(output.error().unwrap().contains("forceTool"));
    }

    #[tokio::test]
    async fn structured_spec_is_reconciled_before_the_call() {
        let client = MockLlmClient::from_steps(
            "mock-model",
            vec![MockStep::text("{\"videoIdea\": \"cats\"}")],
        );
        let invoker = invoker_for(&client);

        let mut agent = agent();
        agent.structured_output_schema = Some(StructuredOutputSpec {
            name: Some("My Schema".into()),
            strict: true,
            schema: json!({
                "type": "object",
                "properties": {"videoIdea": {"type": "string"}},
                "required": ["video_idea"]
            }),
        });

        let output = invoker.invoke(&agent, "pitch me").await;
        assert!(matches!(output, StandardOutput::Structured { .. }));

        let request = client.recorded_requests().await.remove(0);
        let format = request.response_format.unwrap();
        assert_eq!(format["json_schema"]["name"], "My_Schema");
        assert_eq!(
            format["json_schema"]["schema"]["required"],
            json!(["videoIdea"])
        );
        assert_eq!(
            format["json_schema"]["schema"]["additionalProperties"],
            json!(false)
        );
    }

    #[tokio::test]
    async fn additional_params_flow_into_the_request() {
        let client = MockLlmClient::from_steps("mock-model", vec![MockStep::text("ok")]);
        let invoker = invoker_for(&client);

        let mut agent = agent();
        let mut params = serde_json::Map::new();
        params.insert("temperature".into(), json!(0.1));
        params.insert("seed".into(), json!(11));
        agent.additional_params = Some(params);

        invoker.invoke(&agent, "hi").await;

        let request = client.recorded_requests().await.remove(0);
        assert_eq!(request.temperature, Some(0.1));
        assert_eq!(request.extra["seed"], 11);
    }
}
