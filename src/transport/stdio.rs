//! MCP over stdin/stdout.

use rmcp::{transport::stdio, ServiceExt};
use tracing::info;

use crate::error::TransportError;
use crate::mcp::ObsMcpServer;

/// Serve a single MCP session until stdin is closed.
pub async fn serve(server: ObsMcpServer) -> Result<(), TransportError> {
    info!("Starting MCP server on stdio");

    let service = server
        .sequential()
        .serve(stdio())
        .await
        .map_err(|e| TransportError::Stdio(format!("failed to start: {}", e)))?;

    let reason = service
        .waiting()
        .await
        .map_err(|e| TransportError::Stdio(e.to_string()))?;

    info!(?reason, "MCP stdio session ended");
    Ok(())
}
