//! Metrics backend access.
//!
//! [`MetricsBackend`] is the seam the tool handlers depend on. The production
//! implementation is [`client::PrometheusClient`], which talks to the
//! Prometheus HTTP API.

pub mod client;
pub mod time;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, ToolError};

pub use client::PrometheusClient;

/// Result type tag of every range query response.
pub const RESULT_TYPE_MATRIX: &str = "matrix";

/// Access to a time-series backend.
#[async_trait]
pub trait MetricsBackend: Send + Sync {
    /// Metric names with samples in the last hour.
    async fn list_metrics(&self) -> Result<Vec<String>, BackendError>;

    /// Evaluate `query` at every `step` in the window.
    async fn execute_range_query(
        &self,
        query: &str,
        window: &TimeWindow,
    ) -> Result<QueryResult, BackendError>;
}

/// Range query bounds. Always satisfies `start < end` and `step > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: TimeDelta,
}

impl TimeWindow {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: TimeDelta,
    ) -> Result<Self, ToolError> {
        if step <= TimeDelta::zero() {
            return Err(ToolError::usage("'step' must be a positive duration"));
        }
        if start >= end {
            return Err(ToolError::usage(format!(
                "start time ({}) must be before end time ({})",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end, step })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn step(&self) -> TimeDelta {
        self.step
    }
}

/// Range query response as handed back to the MCP caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(rename = "resultType")]
    pub result_type: String,
    /// Backend-native series data, passed through untouched.
    pub result: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl QueryResult {
    pub fn matrix(result: serde_json::Value, warnings: Vec<String>) -> Self {
        Self {
            result_type: RESULT_TYPE_MATRIX.to_string(),
            result,
            warnings,
        }
    }
}
