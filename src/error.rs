//! Error types for obs-mcp.
//!
//! Configuration and transport errors are fatal and surface from `main`.
//! Everything a tool handler can hit is folded into [`ToolError`] and
//! reported back to the MCP caller without terminating the process.

use std::error::Error as StdError;

/// Boxed underlying cause carried by backend errors.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Invalid startup configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid Prometheus URL '{url}': {reason}")]
    InvalidBackendUrl { url: String, reason: String },

    #[error("invalid listen address '{0}': expected host:port or :port")]
    InvalidListenAddress(String),

    #[error("failed to create HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// A duration or timestamp string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid duration '{0}'")]
    InvalidDuration(String),

    #[error("invalid timestamp '{0}': must be RFC3339 or a Unix timestamp")]
    InvalidTimestamp(String),
}

/// Failure talking to the metrics backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached or did not answer in time.
    #[error("{context}: Prometheus unavailable: {source}")]
    Unavailable {
        context: &'static str,
        #[source]
        source: BoxError,
    },

    /// The backend answered, but with an error or an unusable body.
    #[error("{context}: {error_type}: {message}")]
    QueryFailed {
        context: &'static str,
        status: Option<u16>,
        error_type: String,
        message: String,
    },
}

/// Error returned by a tool handler.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Missing or conflicting arguments.
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    InvalidFormat(#[from] ParseError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The caller cancelled the request before it completed.
    #[error("request cancelled by caller")]
    Cancelled,
}

impl ToolError {
    pub fn usage(message: impl Into<String>) -> Self {
        ToolError::Usage(message.into())
    }
}

/// Failure of the transport hosting the MCP server.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    #[error("MCP stdio server error: {0}")]
    Stdio(String),
}
