//! Plumeflow core: engine, services and HTTP API.

pub mod api;
pub mod engine;
pub mod services;

pub use engine::{AgentInvoker, EngineError, PipelineRunner};

use std::path::Path;
use std::sync::Arc;

use plumeflow_ai::{
    LlmClientFactory, ProcessSandbox, SandboxBackend, ToolRegistry, builtin_registry,
};
use plumeflow_storage::Storage;

/// Core application state. Every dependency is explicit; nothing is a
/// process-wide singleton, so cores can be built per test.
pub struct AppCore {
    pub storage: Arc<Storage>,
    pub native_tools: Arc<ToolRegistry>,
    pub sandbox: Arc<dyn SandboxBackend>,
    pub invoker: Arc<AgentInvoker>,
    pub runner: Arc<PipelineRunner>,
}

impl AppCore {
    pub fn new(db_path: impl AsRef<Path>, factory: Arc<dyn LlmClientFactory>) -> anyhow::Result<Self> {
        let storage = Arc::new(Storage::new(db_path)?);
        let sandbox: Arc<dyn SandboxBackend> = Arc::new(ProcessSandbox::new());
        Self::with_parts(storage, factory, sandbox)
    }

    pub fn with_parts(
        storage: Arc<Storage>,
        factory: Arc<dyn LlmClientFactory>,
        sandbox: Arc<dyn SandboxBackend>,
    ) -> anyhow::Result<Self> {
        let native_tools = Arc::new(builtin_registry());
        let invoker = Arc::new(AgentInvoker::new(
            factory,
            native_tools.clone(),
            sandbox.clone(),
        ));
        let runner = Arc::new(PipelineRunner::new(storage.clone(), invoker.clone()));

        Ok(Self {
            storage,
            native_tools,
            sandbox,
            invoker,
            runner,
        })
    }
}
