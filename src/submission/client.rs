//! Catalog API client for instance submission
//!
//! Posts a new instance of a text together with its bibliography
//! annotations to `{endpoint}/texts/{text_id}/instances`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::vocabulary::SubmissionAnnotation;

/// Payload accepted by the instance creation endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CreateInstance {
    pub metadata: Map<String, Value>,
    /// Non-bibliographic annotations (segmentation etc.), always empty here
    pub annotation: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub biblography_annotation: Vec<SubmissionAnnotation>,
    pub content: String,
}

/// Response of a successful instance creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceCreated {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Errors talking to the catalog API
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("catalog endpoint is not configured")]
    NotConfigured,

    #[error("catalog request timed out")]
    Timeout,

    #[error("catalog returned {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("failed to reach catalog: {0}")]
    Transport(String),

    #[error("unexpected catalog response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for SubmissionError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SubmissionError::Timeout
        } else if e.is_decode() {
            SubmissionError::Decode(e.to_string())
        } else {
            SubmissionError::Transport(e.to_string())
        }
    }
}

/// Catalog operations needed by the editing sessions
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn create_instance(
        &self,
        text_id: &str,
        payload: &CreateInstance,
    ) -> Result<InstanceCreated, SubmissionError>;
}

/// HTTP implementation of [`CatalogApi`]
#[derive(Clone)]
pub struct HttpCatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCatalogClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SubmissionError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl CatalogApi for HttpCatalogClient {
    async fn create_instance(
        &self,
        text_id: &str,
        payload: &CreateInstance,
    ) -> Result<InstanceCreated, SubmissionError> {
        let url = format!("{}/texts/{}/instances", self.base_url, text_id);
        tracing::debug!(
            url = %url,
            annotations = payload.biblography_annotation.len(),
            "Submitting instance"
        );

        let response = self.client.post(&url).json(payload).send().await?;

        if response.status() != StatusCode::CREATED {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Catalog rejected instance for {}: {} {}", text_id, status, body);
            return Err(SubmissionError::Http { status, body });
        }

        response
            .json::<InstanceCreated>()
            .await
            .map_err(|e| SubmissionError::Decode(e.to_string()))
    }
}
