//! Tool handlers, independent of the transport.
//!
//! Each handler is a plain async function from arguments to a payload or a
//! [`ToolError`]; [`super::ObsMcpServer`] only adapts them to MCP.

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::prometheus::time::{parse_duration, parse_timestamp};
use crate::prometheus::{MetricsBackend, QueryResult, TimeWindow};

pub const LIST_METRICS: &str = "list_metrics";
pub const EXECUTE_RANGE_QUERY: &str = "execute_range_query";

/// Parameters for execute_range_query tool.
#[derive(Debug, Default, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteRangeQueryParams {
    /// PromQL query string.
    pub query: String,

    /// Query resolution step width (e.g., '15s', '1m', '1h').
    pub step: String,

    /// Start time as RFC3339 or Unix timestamp (optional).
    #[serde(default)]
    pub start: Option<String>,

    /// End time as RFC3339 or Unix timestamp (optional).
    #[serde(default)]
    pub end: Option<String>,

    /// Duration to look back from now (e.g., '1h', '30m', '1d', '2w') (optional).
    #[serde(default)]
    pub duration: Option<String>,
}

/// How the caller pinned down the query range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeSpec {
    /// `[now - duration, now]`.
    Lookback(TimeDelta),
    Explicit {
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    },
}

impl TimeSpec {
    /// Validate the raw time arguments. Empty strings count as absent.
    pub fn from_args(
        start: Option<&str>,
        end: Option<&str>,
        duration: Option<&str>,
    ) -> Result<Self, ToolError> {
        match (present(start), present(end), present(duration)) {
            (None, None, Some(duration)) => Ok(TimeSpec::Lookback(parse_duration(duration)?)),
            (_, _, Some(_)) => Err(ToolError::usage(
                "'duration' must be used alone: do not combine it with 'start' or 'end'",
            )),
            (Some(start), Some(end), None) => Ok(TimeSpec::Explicit {
                start: parse_timestamp(start)?,
                end: parse_timestamp(end)?,
            }),
            _ => Err(ToolError::usage(
                "either 'duration' alone, or both 'start' and 'end' must be provided",
            )),
        }
    }

    /// Resolve to absolute bounds, anchoring lookbacks at `now`.
    pub fn window(&self, now: DateTime<Utc>, step: TimeDelta) -> Result<TimeWindow, ToolError> {
        match *self {
            TimeSpec::Lookback(duration) => {
                let start = now
                    .checked_sub_signed(duration)
                    .ok_or_else(|| ToolError::usage("'duration' reaches too far into the past"))?;
                TimeWindow::new(start, now, step)
            }
            TimeSpec::Explicit { start, end } => {
                TimeWindow::new(start.with_timezone(&Utc), end.with_timezone(&Utc), step)
            }
        }
    }
}

fn present(arg: Option<&str>) -> Option<&str> {
    arg.filter(|a| !a.is_empty())
}

/// List metric names known to the backend.
pub async fn list_metrics(backend: &dyn MetricsBackend) -> Result<Vec<String>, ToolError> {
    Ok(backend.list_metrics().await?)
}

/// Run a range query, deriving the window relative to `now`.
pub async fn execute_range_query(
    backend: &dyn MetricsBackend,
    params: &ExecuteRangeQueryParams,
    now: DateTime<Utc>,
) -> Result<QueryResult, ToolError> {
    if params.query.trim().is_empty() {
        return Err(ToolError::usage("'query' must not be empty"));
    }

    let spec = TimeSpec::from_args(
        params.start.as_deref(),
        params.end.as_deref(),
        params.duration.as_deref(),
    )?;
    let step = parse_duration(&params.step)?;
    let window = spec.window(now, step)?;

    Ok(backend.execute_range_query(&params.query, &window).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BackendError, ParseError};
    use crate::prometheus::fake::FakeBackend;
    use std::collections::HashSet;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_705_314_600, 0).unwrap()
    }

    fn params(duration: Option<&str>, start: Option<&str>, end: Option<&str>) -> ExecuteRangeQueryParams {
        ExecuteRangeQueryParams {
            query: "up".into(),
            step: "15s".into(),
            start: start.map(String::from),
            end: end.map(String::from),
            duration: duration.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_duration_derives_lookback_window() {
        let backend = FakeBackend::default();
        let result = execute_range_query(&backend, &params(Some("1h"), None, None), now())
            .await
            .unwrap();
        assert_eq!(result.result_type, "matrix");

        let (query, window) = backend.last_query().unwrap();
        assert_eq!(query, "up");
        assert_eq!(window.end(), now());
        assert_eq!(window.end() - window.start(), TimeDelta::hours(1));
        assert_eq!(window.step(), TimeDelta::seconds(15));
    }

    #[tokio::test]
    async fn test_duration_accepts_days_and_weeks() {
        let backend = FakeBackend::default();
        execute_range_query(&backend, &params(Some("2w"), None, None), now())
            .await
            .unwrap();
        let (_, window) = backend.last_query().unwrap();
        assert_eq!(window.end() - window.start(), TimeDelta::days(14));
    }

    #[tokio::test]
    async fn test_explicit_start_and_end() {
        let backend = FakeBackend::default();
        let p = params(None, Some("2024-01-15T09:30:00Z"), Some("1705314600"));
        execute_range_query(&backend, &p, now()).await.unwrap();

        let (_, window) = backend.last_query().unwrap();
        assert_eq!(window.start().timestamp(), 1_705_311_000);
        assert_eq!(window.end().timestamp(), 1_705_314_600);
    }

    #[tokio::test]
    async fn test_duration_with_start_is_usage_error() {
        let backend = FakeBackend::default();
        let p = params(Some("1h"), Some("2024-01-15T09:30:00Z"), None);
        let err = execute_range_query(&backend, &p, now()).await.unwrap_err();
        assert!(matches!(err, ToolError::Usage(_)), "got {err:?}");

        let p = params(Some("1h"), None, Some("2024-01-15T09:30:00Z"));
        let err = execute_range_query(&backend, &p, now()).await.unwrap_err();
        assert!(matches!(err, ToolError::Usage(_)), "got {err:?}");
        assert!(backend.last_query().is_none());
    }

    #[tokio::test]
    async fn test_only_start_is_usage_error() {
        let backend = FakeBackend::default();
        let p = params(None, Some("2024-01-15T09:30:00Z"), None);
        let err = execute_range_query(&backend, &p, now()).await.unwrap_err();
        assert!(matches!(err, ToolError::Usage(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_no_time_arguments_is_usage_error() {
        let backend = FakeBackend::default();
        let err = execute_range_query(&backend, &params(None, None, None), now())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Usage(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_empty_strings_count_as_absent() {
        let backend = FakeBackend::default();
        let p = params(Some(""), Some("1705311000"), Some("1705314600"));
        execute_range_query(&backend, &p, now()).await.unwrap();

        let p = params(Some("30m"), Some(""), Some(""));
        execute_range_query(&backend, &p, now()).await.unwrap();
        let (_, window) = backend.last_query().unwrap();
        assert_eq!(window.end() - window.start(), TimeDelta::minutes(30));
    }

    #[tokio::test]
    async fn test_invalid_formats() {
        let backend = FakeBackend::default();

        let err = execute_range_query(&backend, &params(Some("1y"), None, None), now())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidFormat(ParseError::InvalidDuration(_))));

        let p = params(None, Some("yesterday"), Some("1705314600"));
        let err = execute_range_query(&backend, &p, now()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidFormat(ParseError::InvalidTimestamp(_))));

        let mut p = params(Some("1h"), None, None);
        p.step = String::new();
        let err = execute_range_query(&backend, &p, now()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidFormat(ParseError::InvalidDuration(_))));
    }

    #[tokio::test]
    async fn test_inverted_window_is_usage_error() {
        let backend = FakeBackend::default();
        let p = params(None, Some("1705314600"), Some("1705311000"));
        let err = execute_range_query(&backend, &p, now()).await.unwrap_err();
        assert!(matches!(err, ToolError::Usage(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_empty_query_is_usage_error() {
        let backend = FakeBackend::default();
        let mut p = params(Some("1h"), None, None);
        p.query = "  ".into();
        let err = execute_range_query(&backend, &p, now()).await.unwrap_err();
        assert!(matches!(err, ToolError::Usage(_)));
    }

    #[tokio::test]
    async fn test_warnings_are_passed_through() {
        let backend = FakeBackend {
            warnings: vec!["results truncated".into()],
            ..Default::default()
        };
        let result = execute_range_query(&backend, &params(Some("5m"), None, None), now())
            .await
            .unwrap();
        assert_eq!(result.warnings, vec!["results truncated"]);
    }

    #[tokio::test]
    async fn test_list_metrics_is_stable() {
        let backend = FakeBackend::with_metrics(&["up", "node_load1", "process_cpu_seconds_total"]);
        let first: HashSet<_> = list_metrics(&backend).await.unwrap().into_iter().collect();
        let second: HashSet<_> = list_metrics(&backend).await.unwrap().into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[tokio::test]
    async fn test_backend_errors_propagate() {
        let backend = FakeBackend::unavailable();
        let err = list_metrics(&backend).await.unwrap_err();
        assert!(matches!(
            err,
            ToolError::Backend(BackendError::Unavailable { .. })
        ));

        let err = execute_range_query(&backend, &params(Some("1h"), None, None), now())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Backend(_)));
    }
}
