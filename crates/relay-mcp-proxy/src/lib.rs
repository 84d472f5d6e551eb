//! Upstream MCP server connections. A `RuntimeUnit` whose protocol type is
//! MCP-backed holds exactly one [`Transport`], chosen from the three
//! transports MCP defines: a child process speaking newline-framed JSON-RPC
//! over stdio, the original HTTP+SSE pairing, and Streamable HTTP.

pub mod error;
pub mod pending;
pub mod sse;
pub mod stdio;
pub mod streamable;
pub mod transport;

pub use error::TransportError;
pub use sse::SseTransport;
pub use stdio::StdioTransport;
pub use streamable::StreamableHttpTransport;
pub use transport::Transport;
