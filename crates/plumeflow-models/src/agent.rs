use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A configured unit of model invocation: prompt, model, tools and an
/// optional structured-output schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub model: String,
    pub system_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_output_schema: Option<StructuredOutputSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_execute_tools: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cognition: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_run: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_chain_iterations: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force_tool: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_params: Option<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner: owner.into(),
            name: name.into(),
            model: String::new(),
            system_prompt: String::new(),
            tools: None,
            structured_output_schema: None,
            auto_execute_tools: None,
            cognition: None,
            chain_run: None,
            max_chain_iterations: None,
            force_tool: None,
            additional_params: None,
            created_at: Utc::now(),
        }
    }

    /// Tools as a slice, empty when none are configured.
    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        self.tools.as_deref().unwrap_or(&[])
    }
}

/// A callable capability an agent may invoke mid-response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: ToolParameters,
    pub implementation: ToolImplementation,
}

/// JSON-Schema-shaped parameter spec for a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameters {
    #[serde(rename = "type", default = "object_type")]
    pub kind: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl Default for ToolParameters {
    fn default() -> Self {
        Self {
            kind: object_type(),
            properties: Map::new(),
            required: Vec::new(),
        }
    }
}

fn object_type() -> String {
    "object".to_string()
}

impl ToolParameters {
    /// Render as the JSON Schema object handed to the model capability.
    pub fn to_schema(&self) -> Value {
        serde_json::json!({
            "type": self.kind,
            "properties": self.properties,
            "required": self.required,
        })
    }
}

/// How a tool is implemented: a registered native capability, or a
/// user-supplied source string compiled lazily per agent-load and only
/// ever executed through the sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum ToolImplementation {
    Native(String),
    Source(String),
}

/// A response constrained to a caller-supplied JSON Schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredOutputSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub strict: bool,
    pub schema: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_round_trips_through_json() {
        let mut agent = Agent::new("local", "summarizer");
        agent.model = "openai/gpt-4o".to_string();
        agent.system_prompt = "Summarize the input.".to_string();
        agent.max_chain_iterations = Some(3);

        let json = serde_json::to_value(&agent).unwrap();
        assert_eq!(json["systemPrompt"], "Summarize the input.");
        assert_eq!(json["maxChainIterations"], 3);

        let back: Agent = serde_json::from_value(json).unwrap();
        assert_eq!(back.id, agent.id);
        assert_eq!(back.max_chain_iterations, Some(3));
    }

    #[test]
    fn tool_implementation_is_tagged() {
        let implementation = ToolImplementation::Source("return {\"result\": \"ok\"}".into());
        let json = serde_json::to_value(&implementation).unwrap();
        assert_eq!(json["type"], "source");

        let native: ToolImplementation =
            serde_json::from_value(serde_json::json!({"type": "native", "value": "add"})).unwrap();
        assert!(matches!(native, ToolImplementation::Native(name) if name == "add"));
    }

    #[test]
    fn tool_parameters_default_to_object() {
        let params: ToolParameters = serde_json::from_value(serde_json::json!({
            "properties": {"a": {"type": "number"}},
            "required": ["a"]
        }))
        .unwrap();
        assert_eq!(params.kind, "object");
        assert_eq!(params.to_schema()["required"][0], "a");
    }
}
