//! Plumeflow data model.
//!
//! Shared types for agents, pipelines, runs and the canonical
//! standardized agent output. Everything here is plain data: serde
//! round-trippable, owner-scoped, and free of behavior beyond small
//! constructors and accessors.

pub mod agent;
pub mod output;
pub mod pipeline;
pub mod run;

pub use agent::{
    Agent, StructuredOutputSpec, ToolDefinition, ToolImplementation, ToolParameters,
};
pub use output::{FunctionCall, StandardOutput};
pub use pipeline::{OutputDestination, Pipeline, PipelineStep};
pub use run::{Run, RunOutput, RunOutputMeta, RunStatus};
