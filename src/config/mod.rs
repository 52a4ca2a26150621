//! # Runner configuration
//!
//! [`configure`] validates the base URL and timeout and produces an immutable
//! [`RunnerConfig`]. The `with_*` methods consume and return the value so that
//! everything is settled before a run starts; nothing mutates it afterwards.

use std::time::Duration;

use reqwest::Url;

use crate::error::ConfigError;
use crate::http::client::validate_header;

/// Per-request timeout used when neither the suite nor the CLI sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Read-only settings shared by every case of a run.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    base_url: Url,
    timeout: Duration,
    default_headers: Vec<(String, String)>,
    stop_on_first_failure: bool,
    workers: usize,
    deadline: Option<Duration>,
}

/// Builds a configuration for `base_url` with the given per-request timeout.
pub fn configure(base_url: &str, default_timeout: Duration) -> Result<RunnerConfig, ConfigError> {
    let raw = base_url.trim();
    let invalid = |reason: String| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme `{}`", url.scheme())));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("base URL must not carry a query string or fragment".to_string()));
    }
    if default_timeout.is_zero() {
        return Err(ConfigError::ZeroTimeout);
    }

    Ok(RunnerConfig {
        base_url: url,
        timeout: default_timeout,
        default_headers: Vec::new(),
        stop_on_first_failure: false,
        workers: 1,
        deadline: None,
    })
}

impl RunnerConfig {
    /// Adds a header sent with every request; case headers of the same name win.
    pub fn with_default_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        let value = value.into();
        validate_header(&name, &value)?;
        self.default_headers.push((name, value));
        Ok(self)
    }

    pub fn with_stop_on_first_failure(mut self, stop: bool) -> Self {
        self.stop_on_first_failure = stop;
        self
    }

    /// Allows up to `workers` consecutive idempotent cases to run at once.
    /// A value of 1 keeps execution strictly sequential.
    pub fn with_parallelism(mut self, workers: usize) -> Result<Self, ConfigError> {
        if workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        self.workers = workers;
        Ok(self)
    }

    /// Wall-clock budget for a whole `run_all`, measured from its start.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn default_headers(&self) -> &[(String, String)] {
        &self.default_headers
    }

    pub fn stop_on_first_failure(&self) -> bool {
        self.stop_on_first_failure
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn is_parallel(&self) -> bool {
        self.workers > 1
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }

    /// Joins `path` onto the base URL and appends percent-encoded query pairs.
    pub fn url_for(&self, path: &str, query: &[(String, String)]) -> Result<Url, String> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim();
        let joined = if path.is_empty() || path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        };

        let mut url = Url::parse(&joined).map_err(|e| format!("Invalid URL `{joined}`: {e}"))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}
