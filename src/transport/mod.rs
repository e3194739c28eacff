//! Transports hosting [`crate::mcp::ObsMcpServer`].
//!
//! - `stdio` - one MCP session over stdin/stdout, invocations handled in order
//! - `http` - stateless streamable HTTP with a health endpoint and graceful shutdown

pub mod http;
pub mod stdio;
