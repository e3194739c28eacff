//! Startup configuration.
//!
//! Resolved once from CLI flags and the environment, then passed by value to
//! the components that need it.

use std::time::Duration;

use reqwest::Url;

use crate::error::ConfigError;

/// Environment variable holding the Prometheus base URL.
pub const PROMETHEUS_URL_ENV: &str = "PROMETHEUS_URL";

pub const DEFAULT_PROMETHEUS_URL: &str = "http://localhost:9090";

/// Upper bound on a single backend query, independent of the caller.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the metrics backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub url: Url,
    pub query_timeout: Duration,
}

impl BackendConfig {
    /// Build from an optional URL; `None` or an empty string selects the default.
    pub fn new(url: Option<&str>) -> Result<Self, ConfigError> {
        let raw = url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_PROMETHEUS_URL);

        let invalid = |reason: String| ConfigError::InvalidBackendUrl {
            url: raw.to_string(),
            reason,
        };

        let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host".into()));
        }

        Ok(Self {
            url,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        })
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}

/// How the MCP server is exposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMode {
    /// MCP over stdin/stdout.
    Stdio,
    /// Streamable HTTP on the given `host:port`.
    Http { listen: String },
}

impl TransportMode {
    /// An empty or absent listen address selects stdio.
    pub fn from_listen(listen: Option<&str>) -> Result<Self, ConfigError> {
        let Some(listen) = listen.map(str::trim).filter(|l| !l.is_empty()) else {
            return Ok(TransportMode::Stdio);
        };

        let (host, port) = listen
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::InvalidListenAddress(listen.to_string()))?;
        port.parse::<u16>()
            .map_err(|_| ConfigError::InvalidListenAddress(listen.to_string()))?;

        // ":9100" listens on every interface.
        let host = if host.is_empty() { "0.0.0.0" } else { host };
        Ok(TransportMode::Http {
            listen: format!("{}:{}", host, port),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    pub transport: TransportMode,
}

impl Config {
    pub fn from_args(listen: Option<&str>, prometheus_url: Option<&str>) -> Result<Self, ConfigError> {
        Ok(Self {
            backend: BackendConfig::new(prometheus_url)?,
            transport: TransportMode::from_listen(listen)?,
        })
    }
}
