//! Agent runner: one configured agent call, end to end.
//!
//! Builds the chat transcript, advertises tools, executes requested tool
//! calls round by round, and reduces the provider's answer to a
//! [`RawAgentResult`] for standardization. This is the "model
//! capability" the engine invokes; it never touches storage.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tokio::time::{Duration, timeout};
use tracing::{debug, warn};

use crate::error::{AiError, Result};
use crate::llm::{CompletionRequest, LlmClientFactory, Message};
use crate::output::{FunctionCallRequest, RawAgentResult};
use crate::tools::{Tool, ToolSchema};
use plumeflow_models::StructuredOutputSpec;

pub const DEFAULT_MAX_CHAIN_ITERATIONS: u32 = 5;

/// Budget for one tool call inside the loop. Source tools carry their
/// own (tighter) sandbox budget.
const TOOL_EXECUTION_TIMEOUT: Duration = Duration::from_secs(30);

const COGNITION_PREAMBLE: &str = "Reason step by step inside a <think></think> block before \
     answering. Only the text after the closing tag is shown to the user.";

/// Named call parameters plus verbatim provider passthrough.
#[derive(Debug, Clone, Default)]
pub struct CallParams {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub extra: Map<String, Value>,
}

/// Effective configuration for one agent invocation.
///
/// Identity fields (model, prompt, tools, schema) are fixed at
/// construction; additional parameters go through the builder's
/// allow-list and can never shadow them.
pub struct AgentCallConfig {
    pub model: String,
    pub system_prompt: String,
    pub tools: Vec<Arc<dyn Tool>>,
    pub structured_output: Option<StructuredOutputSpec>,
    pub auto_execute_tools: bool,
    pub cognition: bool,
    pub chain_run: bool,
    pub force_tool: bool,
    pub max_chain_iterations: u32,
    pub params: CallParams,
}

impl AgentCallConfig {
    pub fn builder(
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> AgentCallConfigBuilder {
        AgentCallConfigBuilder {
            config: AgentCallConfig {
                model: model.into(),
                system_prompt: system_prompt.into(),
                tools: Vec::new(),
                structured_output: None,
                auto_execute_tools: true,
                cognition: false,
                chain_run: false,
                force_tool: false,
                max_chain_iterations: DEFAULT_MAX_CHAIN_ITERATIONS,
                params: CallParams::default(),
            },
        }
    }
}

pub struct AgentCallConfigBuilder {
    config: AgentCallConfig,
}

impl AgentCallConfigBuilder {
    pub fn tools(mut self, tools: Vec<Arc<dyn Tool>>) -> Self {
        self.config.tools = tools;
        self
    }

    /// The spec is expected to be reconciled before it gets here.
    pub fn structured_output(mut self, spec: Option<StructuredOutputSpec>) -> Self {
        self.config.structured_output = spec;
        self
    }

    pub fn auto_execute_tools(mut self, value: bool) -> Self {
        self.config.auto_execute_tools = value;
        self
    }

    pub fn cognition(mut self, value: bool) -> Self {
        self.config.cognition = value;
        self
    }

    pub fn chain_run(mut self, value: bool) -> Self {
        self.config.chain_run = value;
        self
    }

    pub fn force_tool(mut self, value: bool) -> Self {
        self.config.force_tool = value;
        self
    }

    pub fn max_chain_iterations(mut self, value: u32) -> Self {
        self.config.max_chain_iterations = value.max(1);
        self
    }

    /// Apply one agent-level additional parameter. Known call parameters
    /// and flags are typed; identity fields are refused; anything else
    /// passes through to the provider body verbatim.
    pub fn additional_param(mut self, key: &str, value: &Value) -> Self {
        match key {
            "temperature" => self.config.params.temperature = value.as_f64().map(|v| v as f32),
            "topP" | "top_p" => self.config.params.top_p = value.as_f64().map(|v| v as f32),
            "maxTokens" | "max_tokens" => {
                self.config.params.max_tokens = value.as_u64().map(|v| v as u32)
            }
            "frequencyPenalty" | "frequency_penalty" => {
                self.config.params.frequency_penalty = value.as_f64().map(|v| v as f32)
            }
            "presencePenalty" | "presence_penalty" => {
                self.config.params.presence_penalty = value.as_f64().map(|v| v as f32)
            }
            "autoExecuteTools" | "auto_execute_tools" => {
                if let Some(v) = value.as_bool() {
                    self.config.auto_execute_tools = v;
                }
            }
            "cognition" => {
                if let Some(v) = value.as_bool() {
                    self.config.cognition = v;
                }
            }
            "chainRun" | "chain_run" => {
                if let Some(v) = value.as_bool() {
                    self.config.chain_run = v;
                }
            }
            "forceTool" | "force_tool" => {
                if let Some(v) = value.as_bool() {
                    self.config.force_tool = v;
                }
            }
            "maxChainIterations" | "max_chain_iterations" => {
                if let Some(v) = value.as_u64() {
                    self.config.max_chain_iterations = (v as u32).max(1);
                }
            }
            "model" | "systemPrompt" | "system_prompt" | "tools" | "structuredOutputSchema"
            | "structured_output_schema" => {
                warn!(key, "Ignoring additional parameter overriding an identity field");
            }
            other => {
                self.config.params.extra.insert(other.to_string(), value.clone());
            }
        }
        self
    }

    pub fn additional_params(mut self, params: &Map<String, Value>) -> Self {
        for (key, value) in params {
            self = self.additional_param(key, value);
        }
        self
    }

    pub fn build(self) -> AgentCallConfig {
        self.config
    }
}

/// Drives one agent call against an LLM client.
pub struct AgentRunner {
    factory: Arc<dyn LlmClientFactory>,
}

impl AgentRunner {
    pub fn new(factory: Arc<dyn LlmClientFactory>) -> Self {
        Self { factory }
    }

    /// Run the agent to a raw result. Errors (provider failures, tool
    /// loops exceeding their bound) surface as `Err`; the caller encodes
    /// them into the standardized failure shape.
    pub async fn run(&self, config: &AgentCallConfig, input: &str) -> Result<RawAgentResult> {
        if config.force_tool && config.tools.len() != 1 {
            return Err(AiError::Agent(format!(
                "force_tool requires exactly one tool, agent has {}",
                config.tools.len()
            )));
        }

        let client = self.factory.client_for(&config.model);
        let tools_by_name: HashMap<&str, &Arc<dyn Tool>> = config
            .tools
            .iter()
            .map(|tool| (tool.name(), tool))
            .collect();
        let schemas: Vec<ToolSchema> = config.tools.iter().map(|tool| tool.schema()).collect();
        let response_format = config.structured_output.as_ref().map(response_format_for);
        let mut tool_choice = if config.force_tool {
            config.tools.first().map(|tool| {
                json!({"type": "function", "function": {"name": tool.name()}})
            })
        } else {
            None
        };

        let mut messages = vec![
            Message::system(self.system_prompt(config)),
            Message::user(input),
        ];
        let mut tools_enabled = !schemas.is_empty();
        let mut rounds: u32 = 0;

        loop {
            let mut request = CompletionRequest::new(messages.clone());
            if tools_enabled {
                request = request.with_tools(schemas.clone());
                if let Some(choice) = &tool_choice {
                    request = request.with_tool_choice(choice.clone());
                }
            }
            if let Some(format) = &response_format {
                request = request.with_response_format(format.clone());
            }
            request.temperature = config.params.temperature;
            request.top_p = config.params.top_p;
            request.max_tokens = config.params.max_tokens;
            request.frequency_penalty = config.params.frequency_penalty;
            request.presence_penalty = config.params.presence_penalty;
            request.extra = config.params.extra.clone();

            let response = client.complete(request).await?;

            if response.tool_calls.is_empty() {
                let mut text = response.content.unwrap_or_default();
                if config.cognition {
                    text = strip_think_block(&text);
                }
                let output = self.final_output(config, text);
                return Ok(RawAgentResult::succeeded(output));
            }

            if !config.auto_execute_tools {
                debug!(
                    calls = response.tool_calls.len(),
                    "Returning manual function calls"
                );
                let function_calls = response
                    .tool_calls
                    .iter()
                    .map(|tc| FunctionCallRequest {
                        function_name: tc.name.clone(),
                        function_args: tc.arguments.clone(),
                        call_id: Some(tc.id.clone()),
                        extra: Map::new(),
                    })
                    .collect();
                let output = response
                    .content
                    .map(Value::String)
                    .unwrap_or(Value::Null);
                return Ok(RawAgentResult {
                    success: true,
                    output,
                    function_calls,
                    error: None,
                });
            }

            if rounds >= config.max_chain_iterations {
                return Err(AiError::MaxIterations(config.max_chain_iterations as usize));
            }

            messages.push(Message::assistant_with_tool_calls(
                response.content.clone(),
                response.tool_calls.clone(),
            ));

            // Steps within a run are strictly sequential; tool calls in a
            // round are too.
            for tool_call in &response.tool_calls {
                let result_text = match tools_by_name.get(tool_call.name.as_str()) {
                    Some(tool) => {
                        match timeout(
                            TOOL_EXECUTION_TIMEOUT,
                            tool.execute(tool_call.arguments.clone()),
                        )
                        .await
                        {
                            Ok(Ok(output)) if output.success => {
                                serde_json::to_string(&output.result).unwrap_or_default()
                            }
                            Ok(Ok(output)) => {
                                format!("Error: {}", output.error.unwrap_or_default())
                            }
                            Ok(Err(e)) => format!("Error: {}", e),
                            Err(_) => format!("Error: Tool {} timed out", tool_call.name),
                        }
                    }
                    None => format!("Error: {}", AiError::ToolNotFound(tool_call.name.clone())),
                };
                debug!(tool = %tool_call.name, "Tool round result recorded");
                messages.push(Message::tool_result(tool_call.id.clone(), result_text));
            }

            rounds += 1;
            // A forced tool must not be forced again after it has run.
            tool_choice = None;
            if !config.chain_run {
                // Single tool round; close with one final completion.
                tools_enabled = false;
            }
        }
    }

    fn system_prompt(&self, config: &AgentCallConfig) -> String {
        if config.cognition {
            format!("{}\n\n{}", config.system_prompt, COGNITION_PREAMBLE)
        } else {
            config.system_prompt.clone()
        }
    }

    /// Reduce the final text to the raw output value. With a structured
    /// spec the text is parsed as JSON; a parse failure keeps the text
    /// (the standardizer classifies it as plain).
    fn final_output(&self, config: &AgentCallConfig, text: String) -> Value {
        if config.structured_output.is_some() {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => return value,
                Err(e) => {
                    warn!(error = %e, "Structured output did not parse as JSON, keeping text");
                }
            }
        }
        Value::String(text)
    }
}

fn response_format_for(spec: &StructuredOutputSpec) -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": spec.name.clone().unwrap_or_else(|| crate::schema::DEFAULT_SCHEMA_NAME.to_string()),
            "strict": spec.strict,
            "schema": spec.schema,
        }
    })
}

fn strip_think_block(text: &str) -> String {
    match text.rfind("</think>") {
        Some(idx) => text[idx + "</think>".len()..].trim().to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FixedClientFactory, MockLlmClient, MockStep, Role};
    use crate::tools::AddTool;
    use serde_json::json;

    fn runner_for(client: &MockLlmClient) -> AgentRunner {
        AgentRunner::new(Arc::new(FixedClientFactory::new(Arc::new(client.clone()))))
    }

    fn base_config() -> AgentCallConfigBuilder {
        AgentCallConfig::builder("mock-model", "You are helpful.")
    }

    #[tokio::test]
    async fn plain_text_answer_passes_through() {
        let client = MockLlmClient::from_steps("mock-model", vec![MockStep::text("hello")]);
        let runner = runner_for(&client);

        let raw = runner.run(&base_config().build(), "hi").await.unwrap();
        assert!(raw.success);
        assert_eq!(raw.output, Value::String("hello".into()));
        assert!(raw.function_calls.is_empty());
    }

    #[tokio::test]
    async fn structured_answer_parses_into_object() {
        let client =
            MockLlmClient::from_steps("mock-model", vec![MockStep::text("{\"summary\": \"x\"}")]);
        let runner = runner_for(&client);
        let config = base_config()
            .structured_output(Some(StructuredOutputSpec {
                name: Some("s".into()),
                strict: false,
                schema: json!({"type": "object"}),
            }))
            .build();

        let raw = runner.run(&config, "summarize").await.unwrap();
        assert_eq!(raw.output, json!({"summary": "x"}));

        let request = client.recorded_requests().await.remove(0);
        assert_eq!(request.response_format.unwrap()["json_schema"]["name"], "s");
    }

    #[tokio::test]
    async fn unparseable_structured_answer_keeps_text() {
        let client = MockLlmClient::from_steps("mock-model", vec![MockStep::text("not json")]);
        let runner = runner_for(&client);
        let config = base_config()
            .structured_output(Some(StructuredOutputSpec {
                name: Some("s".into()),
                strict: false,
                schema: json!({"type": "object"}),
            }))
            .build();

        let raw = runner.run(&config, "summarize").await.unwrap();
        assert_eq!(raw.output, Value::String("not json".into()));
    }

    #[tokio::test]
    async fn manual_function_calls_are_returned_verbatim() {
        let client = MockLlmClient::from_steps(
            "mock-model",
            vec![MockStep::tool_call("call-7", "add", json!({"a": 1, "b": 2}))],
        );
        let runner = runner_for(&client);
        let config = base_config()
            .tools(vec![Arc::new(AddTool)])
            .auto_execute_tools(false)
            .build();

        let raw = runner.run(&config, "add them").await.unwrap();
        assert_eq!(raw.function_calls.len(), 1);
        assert_eq!(raw.function_calls[0].function_name, "add");
        assert_eq!(raw.function_calls[0].function_args, json!({"a": 1, "b": 2}));
        assert_eq!(raw.function_calls[0].call_id.as_deref(), Some("call-7"));
    }

    #[tokio::test]
    async fn auto_execution_feeds_results_back() {
        let client = MockLlmClient::from_steps(
            "mock-model",
            vec![
                MockStep::tool_call("call-1", "add", json!({"a": 1, "b": 2})),
                MockStep::text("the sum is 3"),
            ],
        );
        let runner = runner_for(&client);
        let config = base_config().tools(vec![Arc::new(AddTool)]).build();

        let raw = runner.run(&config, "add 1 and 2").await.unwrap();
        assert_eq!(raw.output, Value::String("the sum is 3".into()));

        let requests = client.recorded_requests().await;
        assert_eq!(requests.len(), 2);
        let tool_message = requests[1]
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .expect("tool result should be threaded back");
        assert!(tool_message.content.contains("3"));
        assert_eq!(tool_message.tool_call_id.as_deref(), Some("call-1"));
        // chain_run is off: the closing completion advertises no tools.
        assert!(requests[1].tools.is_empty());
    }

    #[tokio::test]
    async fn chain_run_keeps_tools_available_across_rounds() {
        let client = MockLlmClient::from_steps(
            "mock-model",
            vec![
                MockStep::tool_call("call-1", "add", json!({"a": 1, "b": 2})),
                MockStep::tool_call("call-2", "add", json!({"a": 3, "b": 4})),
                MockStep::text("done"),
            ],
        );
        let runner = runner_for(&client);
        let config = base_config()
            .tools(vec![Arc::new(AddTool)])
            .chain_run(true)
            .build();

        let raw = runner.run(&config, "keep adding").await.unwrap();
        assert_eq!(raw.output, Value::String("done".into()));

        let requests = client.recorded_requests().await;
        assert_eq!(requests.len(), 3);
        assert!(!requests[2].tools.is_empty());
    }

    #[tokio::test]
    async fn tool_rounds_are_bounded() {
        let steps = (0..4)
            .map(|i| MockStep::tool_call(format!("call-{i}"), "add", json!({"a": 1, "b": 1})))
            .collect();
        let client = MockLlmClient::from_steps("mock-model", steps);
        let runner = runner_for(&client);
        let config = base_config()
            .tools(vec![Arc::new(AddTool)])
            .chain_run(true)
            .max_chain_iterations(2)
            .build();

        let err = runner.run(&config, "loop forever").await.unwrap_err();
        assert!(matches!(err, AiError::MaxIterations(2)));
    }

    #[tokio::test]
    async fn unknown_tool_call_reports_error_to_the_model() {
        let client = MockLlmClient::from_steps(
            "mock-model",
            vec![
                MockStep::tool_call("call-1", "vanished", json!({})),
                MockStep::text("recovered"),
            ],
        );
        let runner = runner_for(&client);
        let config = base_config().tools(vec![Arc::new(AddTool)]).build();

        let raw = runner.run(&config, "use the tool").await.unwrap();
        assert_eq!(raw.output, Value::String("recovered".into()));

        let requests = client.recorded_requests().await;
        let tool_message = requests[1]
            .messages
            .iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert!(tool_message.content.contains("Tool not found"));
    }

    #[tokio::test]
    async fn cognition_strips_think_block_and_extends_prompt() {
        let client = MockLlmClient::from_steps(
            "mock-model",
            vec![MockStep::text("<think>scratch work</think>Final answer")],
        );
        let runner = runner_for(&client);
        let config = base_config().cognition(true).build();

        let raw = runner.run(&config, "question").await.unwrap();
        assert_eq!(raw.output, Value::String("Final answer".into()));

        let request = client.recorded_requests().await.remove(0);
        assert!(request.messages[0].content.contains("<think>"));
    }

    #[tokio::test]
    async fn force_tool_requires_exactly_one_tool() {
        let client = MockLlmClient::new("mock-model");
        let runner = runner_for(&client);
        let config = base_config().force_tool(true).build();

        let err = runner.run(&config, "go").await.unwrap_err();
        assert!(matches!(err, AiError::Agent(_)));
    }

    #[tokio::test]
    async fn force_tool_sets_tool_choice_once() {
        let client = MockLlmClient::from_steps(
            "mock-model",
            vec![
                MockStep::tool_call("call-1", "add", json!({"a": 1, "b": 2})),
                MockStep::text("3"),
            ],
        );
        let runner = runner_for(&client);
        let config = base_config()
            .tools(vec![Arc::new(AddTool)])
            .force_tool(true)
            .chain_run(true)
            .build();

        runner.run(&config, "add").await.unwrap();

        let requests = client.recorded_requests().await;
        assert_eq!(
            requests[0].tool_choice.as_ref().unwrap()["function"]["name"],
            "add"
        );
        assert!(requests[1].tool_choice.is_none());
    }

    #[test]
    fn additional_params_allow_list() {
        let mut params = Map::new();
        params.insert("temperature".to_string(), json!(0.3));
        params.insert("maxTokens".to_string(), json!(512));
        params.insert("model".to_string(), json!("evil-model"));
        params.insert("chainRun".to_string(), json!(true));
        params.insert("seed".to_string(), json!(7));

        let config = AgentCallConfig::builder("real-model", "prompt")
            .additional_params(&params)
            .build();

        assert_eq!(config.model, "real-model");
        assert_eq!(config.params.temperature, Some(0.3));
        assert_eq!(config.params.max_tokens, Some(512));
        assert!(config.chain_run);
        assert_eq!(config.params.extra["seed"], 7);
    }

    #[test]
    fn strip_think_handles_missing_block() {
        assert_eq!(strip_think_block("plain"), "plain");
        assert_eq!(strip_think_block("<think>a</think> b"), "b");
    }
}
