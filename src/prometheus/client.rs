//! HTTP client for the Prometheus query API.
//!
//! Calls `/api/v1/label/__name__/values` for metric discovery and
//! `/api/v1/query_range` for range queries.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{MetricsBackend, QueryResult, TimeWindow};
use crate::config::BackendConfig;
use crate::error::{BackendError, ConfigError};

const LABEL_VALUES_PATH: &str = "/api/v1/label/__name__/values";
const QUERY_RANGE_PATH: &str = "/api/v1/query_range";

/// Trailing window used to discover metric names.
const LIST_METRICS_LOOKBACK_HOURS: i64 = 1;

const LIST_METRICS_CONTEXT: &str = "error fetching metric names";
const QUERY_RANGE_CONTEXT: &str = "error executing range query";

/// Client for a single Prometheus-compatible server.
#[derive(Clone)]
pub struct PrometheusClient {
    base_url: String,
    query_timeout: Duration,
    client: reqwest::Client,
}

impl PrometheusClient {
    pub fn new(config: &BackendConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            base_url: config.url.as_str().trim_end_matches('/').to_string(),
            query_timeout: config.query_timeout,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST the range query, falling back to GET for servers that refuse
    /// form-encoded POSTs.
    async fn send_query_range(
        &self,
        params: &[(&str, String)],
    ) -> Result<reqwest::Response, reqwest::Error> {
        let url = self.endpoint(QUERY_RANGE_PATH);
        let response = self
            .client
            .post(&url)
            .form(params)
            .timeout(self.query_timeout)
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
        ) {
            debug!(status = %response.status(), "POST rejected, retrying range query with GET");
            return self
                .client
                .get(&url)
                .query(params)
                .timeout(self.query_timeout)
                .send()
                .await;
        }

        Ok(response)
    }
}

#[async_trait]
impl MetricsBackend for PrometheusClient {
    async fn list_metrics(&self) -> Result<Vec<String>, BackendError> {
        let end = Utc::now();
        let start = end - TimeDelta::hours(LIST_METRICS_LOOKBACK_HOURS);
        let url = self.endpoint(LABEL_VALUES_PATH);

        debug!(url = %url, "Fetching metric names");

        let response = self
            .client
            .get(&url)
            .query(&[("start", format_time(start)), ("end", format_time(end))])
            .timeout(self.query_timeout)
            .send()
            .await
            .map_err(|e| transport_error(e, LIST_METRICS_CONTEXT))?;

        let (names, warnings): (Vec<String>, _) = decode(response, LIST_METRICS_CONTEXT).await?;
        if !warnings.is_empty() {
            debug!(?warnings, "Prometheus returned warnings for label values");
        }
        Ok(names)
    }

    async fn execute_range_query(
        &self,
        query: &str,
        window: &TimeWindow,
    ) -> Result<QueryResult, BackendError> {
        let params = [
            ("query", query.to_string()),
            ("start", format_time(window.start())),
            ("end", format_time(window.end())),
            ("step", format_step(window.step())),
            ("timeout", format_timeout(self.query_timeout)),
        ];

        debug!(
            query = %query,
            start = %window.start().to_rfc3339(),
            end = %window.end().to_rfc3339(),
            step = %params[3].1,
            "Executing range query"
        );

        let response = self
            .send_query_range(&params)
            .await
            .map_err(|e| transport_error(e, QUERY_RANGE_CONTEXT))?;

        let (data, warnings): (RangeData, _) = decode(response, QUERY_RANGE_CONTEXT).await?;
        if data.result_type != super::RESULT_TYPE_MATRIX {
            debug!(result_type = %data.result_type, "Unexpected result type for range query");
        }

        Ok(QueryResult::matrix(data.result, warnings))
    }
}

// --- API Response Types ---

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ApiStatus {
    Success,
    Error,
}

/// Envelope shared by every `/api/v1` response.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    status: ApiStatus,
    data: Option<T>,
    #[serde(rename = "errorType")]
    error_type: Option<String>,
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RangeData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: serde_json::Value,
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    context: &'static str,
) -> Result<(T, Vec<String>), BackendError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(e, context))?;

    match serde_json::from_str::<ApiResponse<T>>(&body) {
        Ok(ApiResponse {
            status: ApiStatus::Success,
            data: Some(data),
            warnings,
            ..
        }) => Ok((data, warnings)),
        Ok(ApiResponse {
            status: ApiStatus::Success,
            data: None,
            ..
        }) => Err(BackendError::QueryFailed {
            context,
            status: Some(status.as_u16()),
            error_type: "bad_response".into(),
            message: "response is missing data".into(),
        }),
        Ok(ApiResponse {
            status: ApiStatus::Error,
            error_type,
            error,
            ..
        }) => Err(BackendError::QueryFailed {
            context,
            status: Some(status.as_u16()),
            error_type: error_type.unwrap_or_else(|| "unknown".into()),
            message: error.unwrap_or_default(),
        }),
        Err(e) if status.is_success() => Err(BackendError::QueryFailed {
            context,
            status: Some(status.as_u16()),
            error_type: "bad_response".into(),
            message: format!("failed to decode response: {}", e),
        }),
        Err(_) => Err(BackendError::QueryFailed {
            context,
            status: Some(status.as_u16()),
            error_type: if status.is_server_error() {
                "server_error".into()
            } else {
                "client_error".into()
            },
            message: format!("{}: {}", status, body.trim()),
        }),
    }
}

fn transport_error(e: reqwest::Error, context: &'static str) -> BackendError {
    if e.is_connect() || e.is_timeout() {
        BackendError::Unavailable {
            context,
            source: Box::new(e),
        }
    } else {
        BackendError::QueryFailed {
            context,
            status: e.status().map(|s| s.as_u16()),
            error_type: "request".into(),
            message: e.to_string(),
        }
    }
}

const NANOS_PER_SECOND: i128 = 1_000_000_000;

/// Unix seconds at full precision, e.g. `1705314600.25`.
fn format_time(ts: DateTime<Utc>) -> String {
    format_seconds(
        i128::from(ts.timestamp()) * NANOS_PER_SECOND + i128::from(ts.timestamp_subsec_nanos()),
    )
}

/// Step in (fractional) seconds, e.g. `15`, `0.5` or `0.0005`.
fn format_step(step: TimeDelta) -> String {
    format_seconds(
        i128::from(step.num_seconds()) * NANOS_PER_SECOND + i128::from(step.subsec_nanos()),
    )
}

/// Shortest exact decimal rendering of `nanos` as seconds.
fn format_seconds(nanos: i128) -> String {
    let sign = if nanos < 0 { "-" } else { "" };
    let nanos = nanos.unsigned_abs();
    let whole = nanos / NANOS_PER_SECOND as u128;
    let fraction = nanos % NANOS_PER_SECOND as u128;

    if fraction == 0 {
        return format!("{sign}{whole}");
    }
    let digits = format!("{fraction:09}");
    format!("{sign}{whole}.{}", digits.trim_end_matches('0'))
}

fn format_timeout(timeout: Duration) -> String {
    if timeout.subsec_millis() == 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{}ms", timeout.as_millis())
    }
}
