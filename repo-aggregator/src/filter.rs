use crate::model::EnrichedItem;

/// Post-aggregation predicate selected by the request path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterSpec {
    /// Keep items whose languages contain this label.
    Language(String),
    /// Keep items owned by exactly this login (case-sensitive).
    Owner(String),
    None,
}

impl FilterSpec {
    /// Builds a filter from a `(kind, value)` pair.
    ///
    /// Unknown kinds degrade to no filtering rather than an error.
    pub fn from_parts(kind: &str, value: &str) -> Self {
        match kind {
            "lang" | "language" => FilterSpec::Language(value.to_string()),
            "owner" => FilterSpec::Owner(value.to_string()),
            _ => {
                tracing::debug!(kind, "Unknown filter kind, not filtering");
                FilterSpec::None
            }
        }
    }

    pub fn matches(&self, item: &EnrichedItem) -> bool {
        match self {
            FilterSpec::Language(label) => item.details.contains_key(label),
            FilterSpec::Owner(owner) => item.owner == *owner,
            FilterSpec::None => true,
        }
    }

    pub fn apply(&self, items: Vec<EnrichedItem>) -> Vec<EnrichedItem> {
        if *self == FilterSpec::None {
            return items;
        }
        items.into_iter().filter(|item| self.matches(item)).collect()
    }
}
