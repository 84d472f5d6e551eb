//! Templates, guards, and executes calls against HTTP-backed tools: the
//! six-phase pipeline of resolve, template-context assembly, request
//! preparation, egress guard, execute, and response handling.

pub mod context;
pub mod error;
pub mod helpers;
pub mod pipeline;
pub mod request;
pub mod response;

pub use context::{resolve_args, normalize_value, TemplateContext};
pub use error::ToolPipelineError;
pub use helpers::TemplateEngine;
pub use pipeline::ToolPipeline;
