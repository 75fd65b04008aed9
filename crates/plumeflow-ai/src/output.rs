//! Output standardization.
//!
//! The model capability can come back with plain text, a structured JSON
//! object, manual function-call requests, or a failure. `standardize`
//! collapses all of that into the one canonical [`StandardOutput`] shape
//! the rest of the system records and chains on.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use plumeflow_models::{FunctionCall, StandardOutput};

const UNKNOWN_ERROR: &str = "Unknown error occurred";

/// The opaque result of one agent execution by the model capability.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAgentResult {
    pub success: bool,
    #[serde(default)]
    pub output: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub function_calls: Vec<FunctionCallRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RawAgentResult {
    pub fn succeeded(output: Value) -> Self {
        Self {
            success: true,
            output,
            function_calls: Vec::new(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            function_calls: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// One function-call request as emitted by the capability. Transport
/// fields beyond name and arguments are carried here but dropped during
/// standardization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCallRequest {
    pub function_name: String,
    pub function_args: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Collapse a raw capability result into the canonical output shape.
///
/// Precedence, first match wins: failure, function calls, structured
/// object, plain text. Pure and synchronous; never panics.
pub fn standardize(result: &RawAgentResult) -> StandardOutput {
    if !result.success {
        return StandardOutput::failure(
            result.error.clone().unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
        );
    }

    if !result.function_calls.is_empty() {
        let calls: Vec<FunctionCall> = result
            .function_calls
            .iter()
            .map(|call| FunctionCall {
                function_name: call.function_name.clone(),
                function_args: call.function_args.clone(),
            })
            .collect();

        let output = match &result.output {
            Value::Null => serialized_calls(&calls),
            Value::String(s) if s.is_empty() => serialized_calls(&calls),
            other => other.clone(),
        };

        return StandardOutput::FunctionCalls { output, calls };
    }

    if result.output.is_object() {
        return StandardOutput::Structured {
            output: result.output.clone(),
        };
    }

    StandardOutput::Text {
        output: result.output.clone(),
    }
}

fn serialized_calls(calls: &[FunctionCall]) -> Value {
    Value::String(serde_json::to_string(calls).unwrap_or_default())
}
