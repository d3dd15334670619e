//! Search request, result and error types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// BDRC entity type to search for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SearchType {
    #[default]
    Instance,
    Text,
    Volume,
    Person,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::Instance => "Instance",
            SearchType::Text => "Text",
            SearchType::Volume => "Volume",
            SearchType::Person => "Person",
        }
    }
}

/// Query parameters of a BDRC lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub search_query: String,
    #[serde(default)]
    pub from: usize,
    #[serde(default = "default_size")]
    pub size: usize,
    /// Extra Elasticsearch filter clauses
    #[serde(default)]
    pub filter: Vec<Value>,
    #[serde(rename = "type", default)]
    pub search_type: SearchType,
}

fn default_size() -> usize {
    20
}

impl SearchRequest {
    pub fn new(search_query: impl Into<String>, search_type: SearchType) -> Self {
        Self {
            search_query: search_query.into(),
            from: 0,
            size: default_size(),
            filter: Vec::new(),
            search_type,
        }
    }
}

/// One matching record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// BDRC resource id (e.g. `MW22084`, `P1583`)
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pref_label: Option<String>,
    /// Raw `_source` document
    pub source: Value,
}

/// Errors during a search call
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SearchError {
    /// The request was superseded or cancelled; never shown to users
    #[error("search aborted")]
    Aborted,

    #[error("search request timed out")]
    Timeout,

    #[error("search service returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to reach search service: {0}")]
    Transport(String),

    #[error("unexpected search response: {0}")]
    Decode(String),
}

impl SearchError {
    pub fn is_abort(&self) -> bool {
        matches!(self, SearchError::Aborted)
    }

    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::Timeout | SearchError::Transport(_) => true,
            SearchError::Http { status, .. } => *status >= 500,
            SearchError::Aborted | SearchError::Decode(_) => false,
        }
    }
}

/// A search service
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, SearchError>;
}

/// Observable state of a search field
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchState {
    pub query: String,
    pub is_loading: bool,
    pub results: Vec<SearchHit>,
    /// User-facing message of the last failed search
    pub error: Option<String>,
}
