//! Read-only access to the upstream repository API.

use crate::config::UpstreamConfig;
use crate::errors::UpstreamError;
use crate::model::{DetailPayload, PrimaryItem, RepositoryRecord};
use async_trait::async_trait;
use http::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::fmt;
use url::Url;

/// API token attached to every upstream call.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    fn header_value(&self) -> Result<HeaderValue, UpstreamError> {
        let mut value = HeaderValue::from_str(&format!("token {}", self.0))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// The two upstream fetches the enrichment pipeline is built on.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Fetches the primary repository collection.
    async fn list_items(&self) -> Result<Vec<PrimaryItem>, UpstreamError>;

    /// Fetches the language breakdown of one repository.
    async fn fetch_details(&self, item: &PrimaryItem) -> Result<DetailPayload, UpstreamError>;
}

/// `Upstream` backed by the GitHub REST API.
///
/// The inner `reqwest::Client` pools connections and is cheap to clone, so a
/// single instance is shared by all enrichment tasks.
#[derive(Clone, Debug)]
pub struct GithubClient {
    client: reqwest::Client,
    list_url: Url,
}

impl GithubClient {
    pub fn new(config: &UpstreamConfig, credential: &Credential) -> Result<Self, UpstreamError> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, credential.header_value()?);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(config.http_timeout())
            .build()?;

        Ok(Self {
            client,
            list_url: config.list_url.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, UpstreamError> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%url, %status, "Upstream returned non-success status");
            return Err(UpstreamError::Status(status));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl Upstream for GithubClient {
    async fn list_items(&self) -> Result<Vec<PrimaryItem>, UpstreamError> {
        let records: Vec<RepositoryRecord> = self.get_json(&self.list_url).await?;
        tracing::debug!(count = records.len(), "Fetched repository list");
        Ok(records.into_iter().map(PrimaryItem::from).collect())
    }

    async fn fetch_details(&self, item: &PrimaryItem) -> Result<DetailPayload, UpstreamError> {
        self.get_json(&item.detail_url).await
    }
}
