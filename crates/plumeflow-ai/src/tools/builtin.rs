//! Built-in native tools.
//!
//! Small, dependency-free capabilities agents can reference through the
//! native variant of a tool implementation.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::Result;
use crate::tools::registry::ToolRegistry;
use crate::tools::traits::{Tool, ToolOutput};

/// Tool to add two numbers together
#[derive(Debug, Clone)]
pub struct AddTool;

#[derive(Deserialize)]
struct AddInput {
    a: f64,
    b: f64,
}

#[async_trait]
impl Tool for AddTool {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Adds two numbers together"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "a": {
                    "type": "number",
                    "description": "First number to add"
                },
                "b": {
                    "type": "number",
                    "description": "Second number to add"
                }
            },
            "required": ["a", "b"]
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput> {
        let input: AddInput = match serde_json::from_value(input) {
            Ok(parsed) => parsed,
            Err(e) => return Ok(ToolOutput::error(format!("Invalid arguments: {}", e))),
        };
        let sum = input.a + input.b;
        Ok(ToolOutput::success(json!({"result": sum.to_string()})))
    }
}

/// Tool to get the current time
#[derive(Debug, Clone)]
pub struct GetTimeTool;

#[async_trait]
impl Tool for GetTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Gets the current UTC time"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _input: Value) -> Result<ToolOutput> {
        Ok(ToolOutput::success(
            json!({"result": Utc::now().to_rfc3339()}),
        ))
    }
}

/// Registry preloaded with every built-in tool.
pub fn builtin_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(AddTool);
    registry.register(GetTimeTool);
    registry
}
