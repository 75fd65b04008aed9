//! Tool system: trait, native registry, built-ins and the sandbox for
//! source-implemented tools.

pub mod builtin;
pub mod registry;
pub mod sandbox;
pub mod traits;

pub use builtin::{AddTool, GetTimeTool, builtin_registry};
pub use registry::ToolRegistry;
pub use sandbox::{
    DEFAULT_TIMEOUT_SECONDS, ProcessSandbox, SandboxBackend, SandboxError, SandboxRequest,
    SourceTool, execute_source, wrap_function_body,
};
pub use traits::{Tool, ToolOutput, ToolSchema};
