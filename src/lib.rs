//! MCP server exposing Prometheus metrics to LLM agents.
//!
//! ## Architecture
//!
//! 1. **Parsing** (`prometheus::time`) - Durations (`30s`, `1h30m`, `7d`, `2w`)
//!    and timestamps (RFC3339 or Unix seconds).
//!
//! 2. **Backend** (`prometheus`) - The `MetricsBackend` trait and its
//!    Prometheus HTTP API implementation.
//!
//! 3. **Tools** (`mcp`) - `list_metrics` and `execute_range_query`, shared by
//!    every transport.
//!
//! 4. **Transports** (`transport`) - stdio (default) or streamable HTTP.
//!
//! ## Usage
//!
//! ```bash
//! PROMETHEUS_URL=http://prometheus:9090 obs-mcp
//! obs-mcp --listen :9100
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod mcp;
pub mod prometheus;
pub mod transport;
