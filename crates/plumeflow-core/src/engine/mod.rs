//! Execution engine: the agent invoker and the pipeline runner.

pub mod invoker;
pub mod pipeline;

pub use invoker::AgentInvoker;
pub use pipeline::{PipelineRunner, extract_input};

use plumeflow_ai::AiError;
use thiserror::Error;

/// Engine-level failures. Everything here ends up encoded into a failed
/// `StandardOutput` or a failed run record, never raised past the engine
/// boundary.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    Ai(#[from] AiError),
}
