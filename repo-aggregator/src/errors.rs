use http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for repo-aggregator operations
pub type Result<T, E = AggregatorError> = std::result::Result<T, E>;

/// Failure of a single call to the upstream API.
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("invalid credential header value: {0}")]
    InvalidCredential(#[from] http::header::InvalidHeaderValue),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream responded with {0}")]
    Status(StatusCode),

    #[error("could not decode upstream response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A failed enrichment, tagged with the repository it was for.
#[derive(Error, Debug)]
#[error("enrichment of {full_name} failed: {source}")]
pub struct EnrichmentError {
    pub full_name: String,
    #[source]
    pub source: UpstreamError,
}

/// Outcome of a batch that did not produce a complete collection.
#[derive(Error, Debug)]
pub enum BatchError {
    /// The first task failure observed; the rest of the batch is discarded.
    #[error(transparent)]
    Enrichment(#[from] EnrichmentError),

    #[error("batch did not complete within {0:?}")]
    Timeout(Duration),

    /// Every task finished but some never reported an outcome.
    #[error("batch incomplete: expected {expected} results, received {received}")]
    Incomplete { expected: usize, received: usize },
}

/// Errors that can occur while serving the aggregation API
#[derive(Error, Debug)]
pub enum AggregatorError {
    #[error("fetching the repository list failed: {0}")]
    ListFailed(#[source] UpstreamError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("upstream client error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("response serialization error: {0}")]
    ResponseSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AggregatorError {
    /// HTTP status reported to API clients for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            AggregatorError::ListFailed(_) => StatusCode::BAD_GATEWAY,
            AggregatorError::Batch(BatchError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            AggregatorError::Batch(_) => StatusCode::BAD_GATEWAY,
            AggregatorError::Upstream(_)
            | AggregatorError::ResponseSerialization(_)
            | AggregatorError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
