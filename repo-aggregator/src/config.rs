use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const DEFAULT_LIST_URL: &str = "https://api.github.com/repositories?per_page=100&page=1";

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Listener and admin listener share {0}")]
    ListenerConflict(String),

    #[error("Empty user agent")]
    EmptyUserAgent,

    #[error("{0} must be greater than 0")]
    ZeroValue(&'static str),
}

/// Repo aggregator configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Main listener serving the repositories API
    pub listener: Listener,
    /// Admin listener for health and readiness checks
    #[serde(default = "default_admin_listener")]
    pub admin_listener: Listener,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
}

impl Config {
    /// Validates the aggregator configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.listener == self.admin_listener {
            return Err(ValidationError::ListenerConflict(format!(
                "{}:{}",
                self.listener.host, self.listener.port
            )));
        }

        self.upstream.validate()?;
        self.enrichment.validate()
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

fn default_admin_listener() -> Listener {
    Listener {
        host: "127.0.0.1".into(),
        port: 8081,
    }
}

/// Where repositories are listed from and how calls to that API are made.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Endpoint returning the primary repository list.
    ///
    /// Invalid URLs are rejected during config deserialization.
    pub list_url: Url,
    /// Sent as `User-Agent`; the GitHub API rejects requests without one.
    pub user_agent: String,
    /// Deadline for each individual upstream call, body included.
    pub http_timeout_secs: u64,
}

impl UpstreamConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.user_agent.trim().is_empty() {
            return Err(ValidationError::EmptyUserAgent);
        }
        if self.http_timeout_secs == 0 {
            return Err(ValidationError::ZeroValue("upstream.http_timeout_secs"));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            // Constant is a valid absolute URL
            list_url: Url::parse(DEFAULT_LIST_URL).expect("default list url"),
            user_agent: "repolens".into(),
            http_timeout_secs: 10,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Upper bound on enrichment calls in flight, shared by all concurrent batches.
    pub max_concurrency: usize,
    /// Deadline for the whole fan-out/fan-in of one batch.
    pub batch_timeout_secs: u64,
}

impl EnrichmentConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.max_concurrency == 0 {
            return Err(ValidationError::ZeroValue("enrichment.max_concurrency"));
        }
        if self.batch_timeout_secs == 0 {
            return Err(ValidationError::ZeroValue("enrichment.batch_timeout_secs"));
        }
        Ok(())
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 100,
            batch_timeout_secs: 30,
        }
    }
}
