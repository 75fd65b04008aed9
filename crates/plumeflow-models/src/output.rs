use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::run::RunOutputMeta;

/// One function-call request surfaced to the caller when an agent does
/// not auto-execute its tools. Only the name and arguments survive
/// standardization; transport-level fields are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    pub function_name: String,
    pub function_args: Value,
}

/// The canonical result of one agent invocation.
///
/// Exactly one interpretation per result, chosen by the standardizer's
/// precedence: failure, function calls, structured object, plain text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StandardOutput {
    Failure {
        error: String,
    },
    FunctionCalls {
        output: Value,
        calls: Vec<FunctionCall>,
    },
    Structured {
        output: Value,
    },
    Text {
        output: Value,
    },
}

impl StandardOutput {
    pub fn failure(error: impl Into<String>) -> Self {
        StandardOutput::Failure {
            error: error.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, StandardOutput::Failure { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            StandardOutput::Failure { error } => Some(error),
            _ => None,
        }
    }

    /// The output payload as recorded on a run. A failure carries an
    /// empty string.
    pub fn output(&self) -> Value {
        match self {
            StandardOutput::Failure { .. } => Value::String(String::new()),
            StandardOutput::FunctionCalls { output, .. }
            | StandardOutput::Structured { output }
            | StandardOutput::Text { output } => output.clone(),
        }
    }

    /// Step metadata recorded alongside the output.
    pub fn meta(&self) -> RunOutputMeta {
        match self {
            StandardOutput::FunctionCalls { calls, .. } => RunOutputMeta {
                function_calls: Some(calls.clone()),
                structured_output: None,
            },
            StandardOutput::Structured { .. } => RunOutputMeta {
                function_calls: None,
                structured_output: Some(true),
            },
            _ => RunOutputMeta::default(),
        }
    }
}
