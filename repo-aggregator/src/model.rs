//! Request-scoped data flowing through the enrichment pipeline.
//!
//! ```text
//! RepositoryRecord (upstream list JSON)
//!   └─> PrimaryItem ──┬─> EnrichedItem ──> RepositoriesResponse
//!   DetailPayload ────┘
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use url::Url;

/// Label to byte count, as returned by the upstream detail endpoint.
///
/// Keeps the upstream key order.
pub type DetailPayload = IndexMap<String, u64>;

#[derive(Deserialize)]
struct OwnerRecord {
    login: String,
}

/// One entry of the upstream repository list, as it appears on the wire.
#[derive(Deserialize)]
pub(crate) struct RepositoryRecord {
    full_name: String,
    owner: OwnerRecord,
    name: String,
    languages_url: Url,
}

/// A repository before enrichment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrimaryItem {
    pub full_name: String,
    pub owner_login: String,
    pub name: String,
    pub detail_url: Url,
}

impl From<RepositoryRecord> for PrimaryItem {
    fn from(record: RepositoryRecord) -> Self {
        Self {
            full_name: record.full_name,
            owner_login: record.owner.login,
            name: record.name,
            detail_url: record.languages_url,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageDetail {
    pub bytes: u64,
}

/// A repository merged with its language breakdown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedItem {
    pub full_name: String,
    pub owner: String,
    #[serde(rename = "repository")]
    pub name: String,
    #[serde(rename = "languages")]
    pub details: IndexMap<String, LanguageDetail>,
}

impl EnrichedItem {
    pub fn from_parts(item: PrimaryItem, payload: DetailPayload) -> Self {
        let details = payload
            .into_iter()
            .map(|(label, bytes)| (label, LanguageDetail { bytes }))
            .collect();

        Self {
            full_name: item.full_name,
            owner: item.owner_login,
            name: item.name,
            details,
        }
    }
}

/// Body of a successful `/repos` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct RepositoriesResponse {
    pub repositories: Vec<EnrichedItem>,
}
