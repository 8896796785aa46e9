//! Store request types, validation and GraphQL query building.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::StoreError;

/// Maximum query length in characters.
const MAX_QUERY_CHARS: usize = 400;

/// Properties selected for every item.
const ITEM_FIELDS: &str = "captionStr kickerStr editionDateIsoStr editionId editionImageFnStr testataName";

/// How a search query is matched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Keyword ranking (BM25).
    Literal,
    /// Vector similarity.
    Fuzzy,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Literal => "literal",
            SearchMode::Fuzzy => "fuzzy",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "literal" => Ok(SearchMode::Literal),
            "fuzzy" => Ok(SearchMode::Fuzzy),
            _ => Err(StoreError::InvalidMode(s.to_string())),
        }
    }
}

/// A search against the store.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub mode: SearchMode,
    /// Number of results (1-100).
    pub limit: u32,
}

impl SearchRequest {
    /// Validate the search request parameters.
    pub fn validate(&self) -> Result<(), StoreError> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(StoreError::InvalidQuery("query cannot be empty".to_string()));
        }

        let chars = query.chars().count();
        if chars > MAX_QUERY_CHARS {
            return Err(StoreError::InvalidQuery(format!("query too long: {chars} chars (max {MAX_QUERY_CHARS})")));
        }

        validate_limit(self.limit)
    }

    /// GraphQL document for this search.
    pub(crate) fn to_graphql(&self, collection: &str) -> String {
        let query = quote(self.query.trim());
        let operator = match self.mode {
            SearchMode::Literal => format!("bm25: {{ query: {query} }}"),
            SearchMode::Fuzzy => format!("nearText: {{ concepts: [{query}] }}"),
        };
        format!("{{ Get {{ {collection}({operator}, limit: {}) {{ {ITEM_FIELDS} }} }} }}", self.limit)
    }
}

pub(crate) fn validate_limit(limit: u32) -> Result<(), StoreError> {
    if (1..=100).contains(&limit) { Ok(()) } else { Err(StoreError::InvalidLimit) }
}

/// GraphQL document for one listing page plus the collection total.
pub(crate) fn page_graphql(collection: &str, offset: u64, limit: u32) -> String {
    format!(
        "{{ Get {{ {collection}(offset: {offset}, limit: {limit}, \
         sort: [{{ path: [\"editionDateIsoStr\"], order: desc }}]) {{ {ITEM_FIELDS} }} }} \
         Aggregate {{ {collection} {{ meta {{ count }} }} }} }}"
    )
}

/// Render `s` as a GraphQL string literal.
///
/// GraphQL string escapes are a subset of JSON's, so JSON encoding is safe.
fn quote(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Whether `name` can be spliced into a GraphQL document as a type name.
pub(crate) fn is_valid_collection(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
