//! Title/author suggestion providers

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Title and author extracted from, or suggested for, a text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleAuthorSuggestion {
    /// Title found verbatim in the content
    #[serde(default)]
    pub title: Option<String>,
    /// Title proposed when none is stated, in the content's language
    #[serde(default)]
    pub suggested_title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub suggested_author: Option<String>,
}

impl TitleAuthorSuggestion {
    /// Extracted title, else the suggested one
    pub fn best_title(&self) -> Option<&str> {
        self.title.as_deref().or(self.suggested_title.as_deref())
    }

    pub fn best_author(&self) -> Option<&str> {
        self.author.as_deref().or(self.suggested_author.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SuggestError {
    #[error("suggestion aborted")]
    Aborted,

    #[error("suggestion service is not configured")]
    NotConfigured,

    #[error("suggestion service returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to reach suggestion service: {0}")]
    Transport(String),
}

impl SuggestError {
    pub fn is_abort(&self) -> bool {
        matches!(self, SuggestError::Aborted)
    }
}

/// Produces title/author suggestions for document content
#[async_trait]
pub trait TitleAuthorSuggester: Send + Sync {
    async fn suggest(&self, content: &str) -> Result<TitleAuthorSuggestion, SuggestError>;
}

#[derive(Serialize)]
struct ContentRequest<'a> {
    content: &'a str,
}

/// Calls `POST {base}/ai/generate-title-author`
#[derive(Clone)]
pub struct HttpSuggester {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSuggester {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SuggestError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SuggestError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TitleAuthorSuggester for HttpSuggester {
    async fn suggest(&self, content: &str) -> Result<TitleAuthorSuggestion, SuggestError> {
        let url = format!("{}/ai/generate-title-author", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ContentRequest { content })
            .send()
            .await
            .map_err(|e| SuggestError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SuggestError::Http { status, body });
        }

        response
            .json::<TitleAuthorSuggestion>()
            .await
            .map_err(|e| SuggestError::Transport(format!("Failed to parse response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_values_prefer_extracted() {
        let suggestion: TitleAuthorSuggestion = serde_json::from_str(
            r#"{"title": null, "suggested_title": "shes rab snying po", "author": "klu sgrub"}"#,
        )
        .unwrap();

        assert_eq!(suggestion.best_title(), Some("shes rab snying po"));
        assert_eq!(suggestion.best_author(), Some("klu sgrub"));
        assert_eq!(suggestion.suggested_author, None);
    }
}
