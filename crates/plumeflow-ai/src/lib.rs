//! Plumeflow AI layer.
//!
//! This crate provides:
//! - The `LlmClient` trait with an OpenAI-compatible provider and a
//!   scripted mock
//! - The agent runner (tool auto-execution loop, structured output)
//! - Output standardization into the canonical result shape
//! - Structured-output schema reconciliation
//! - The tool system, including the sandbox for source-implemented tools

pub mod error;
pub mod llm;
pub mod output;
pub mod runner;
pub mod schema;
pub mod tools;

pub use error::{AiError, Result};
pub use llm::{
    CompletionRequest, CompletionResponse, FinishReason, FixedClientFactory, LlmClient,
    LlmClientFactory, Message, MockLlmClient, MockStep, OpenAIClient, OpenAIClientFactory, Role,
    ToolCall,
};
pub use output::{FunctionCallRequest, RawAgentResult, standardize};
pub use runner::{
    AgentCallConfig, AgentCallConfigBuilder, AgentRunner, CallParams,
    DEFAULT_MAX_CHAIN_ITERATIONS,
};
pub use schema::{DEFAULT_SCHEMA_NAME, reconcile};
pub use tools::{
    AddTool, DEFAULT_TIMEOUT_SECONDS, GetTimeTool, ProcessSandbox, SandboxBackend, SandboxError,
    SandboxRequest, SourceTool, Tool, ToolOutput, ToolRegistry, ToolSchema, builtin_registry,
    execute_source,
};
