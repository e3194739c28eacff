//! In-memory backend for handler tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{MetricsBackend, QueryResult, TimeWindow};
use crate::error::BackendError;

#[derive(Default)]
pub struct FakeBackend {
    pub metrics: Vec<String>,
    pub warnings: Vec<String>,
    pub unavailable: bool,
    /// Added latency for every call.
    pub delay: Option<Duration>,
    pub queries: Mutex<Vec<(String, TimeWindow)>>,
}

impl FakeBackend {
    pub fn with_metrics(names: &[&str]) -> Self {
        Self {
            metrics: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn last_query(&self) -> Option<(String, TimeWindow)> {
        self.queries.lock().unwrap().last().cloned()
    }

    async fn check_up(&self, context: &'static str) -> Result<(), BackendError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable {
            return Err(BackendError::Unavailable {
                context,
                source: "connection refused".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MetricsBackend for FakeBackend {
    async fn list_metrics(&self) -> Result<Vec<String>, BackendError> {
        self.check_up("error fetching metric names").await?;
        Ok(self.metrics.clone())
    }

    async fn execute_range_query(
        &self,
        query: &str,
        window: &TimeWindow,
    ) -> Result<QueryResult, BackendError> {
        self.check_up("error executing range query").await?;
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), *window));
        Ok(QueryResult::matrix(
            json!([{"metric": {"__name__": query}, "values": [[window.end().timestamp(), "1"]]}]),
            self.warnings.clone(),
        ))
    }
}
