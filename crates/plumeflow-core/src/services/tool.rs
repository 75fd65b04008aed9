//! Tool test execution, backing the authoring UI's "try it" path.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::AppCore;
use plumeflow_ai::{DEFAULT_TIMEOUT_SECONDS, execute_source};
use plumeflow_models::ToolImplementation;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolTestRequest {
    pub implementation: ToolImplementation,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// Execute one tool implementation against the supplied arguments and
/// return its raw result. Source implementations go through the sandbox
/// with the same bounds as a real invocation.
pub async fn test_tool(core: &Arc<AppCore>, request: ToolTestRequest) -> Result<Value, String> {
    let args = Value::Object(request.args);
    match request.implementation {
        ToolImplementation::Source(code) => {
            let timeout_seconds = request
                .timeout_seconds
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS)
                .max(1);
            execute_source(core.sandbox.as_ref(), &code, args, timeout_seconds)
                .await
                .map_err(|e| e.to_string())
        }
        ToolImplementation::Native(reference) => {
            let output = core
                .native_tools
                .execute(&reference, args)
                .await
                .map_err(|e| e.to_string())?;
            if output.success {
                Ok(output.result)
            } else {
                Err(output.error.unwrap_or_else(|| "Tool failed".to_string()))
            }
        }
    }
}
