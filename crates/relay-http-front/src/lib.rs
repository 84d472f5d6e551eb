//! HTTP front end: SSE (`P/sse`, `P/message`) and streamable (`P/mcp`)
//! transports for every routed prefix, plus the gateway-wide health check.

pub mod body;
pub mod cors;
pub mod error;
pub mod router;
pub mod server;
pub mod session;

pub use error::FrontError;
pub use router::{route, AppState};
pub use server::serve;
