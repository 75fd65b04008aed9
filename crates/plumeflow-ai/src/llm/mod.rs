//! LLM client layer: provider trait, OpenAI-compatible implementation,
//! client factory and the scripted mock.

pub mod client;
pub mod factory;
pub mod mock;
pub mod openai;

pub use client::{
    CompletionRequest, CompletionResponse, FinishReason, LlmClient, Message, Role, TokenUsage,
    ToolCall,
};
pub use factory::{FixedClientFactory, LlmClientFactory, OpenAIClientFactory};
pub use mock::{MockLlmClient, MockStep, MockStepKind};
pub use openai::OpenAIClient;
