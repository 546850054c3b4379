//! OCR service client
//!
//! The OCR provider fetches the document itself from a URL, so the client only
//! sends a small JSON request and passes the recognized pages back unchanged.

use crate::APP_NAME;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from an OCR round trip
#[derive(Error, Debug)]
pub enum OcrError {
    /// The provider did not answer within the client timeout
    #[error("OCR request timed out")]
    Timeout,

    /// Transport-level failure
    #[error("Failed to reach OCR service: {0}")]
    Http(String),

    /// The provider answered with a non-success status
    #[error("OCR service returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The provider's answer could not be decoded
    #[error("Failed to decode OCR response: {0}")]
    Decode(String),

    #[error("Invalid OCR configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for OcrError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OcrError::Timeout
        } else if err.is_decode() {
            OcrError::Decode(err.to_string())
        } else {
            OcrError::Http(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDimensions {
    #[serde(default)]
    pub dpi: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub width: u32,
}

/// One recognized page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrPage {
    pub index: u32,
    #[serde(default)]
    pub markdown: String,
    /// Image payloads exactly as the provider returned them
    #[serde(default)]
    pub images: Vec<serde_json::Value>,
    #[serde(default)]
    pub dimensions: PageDimensions,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    #[serde(default)]
    pub pages_processed: u64,
    #[serde(default)]
    pub doc_size_bytes: u64,
}

/// Recognition result for a whole document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrDocument {
    #[serde(default)]
    pub pages: Vec<OcrPage>,
    #[serde(default)]
    pub usage_info: UsageInfo,
}

/// Text recognition over a document reachable by URL
#[async_trait]
pub trait OcrService: Send + Sync {
    async fn recognize(&self, document_url: &str) -> Result<OcrDocument, OcrError>;
}

#[derive(Debug, Serialize)]
struct DocumentRef<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    document_url: &'a str,
}

#[derive(Debug, Serialize)]
struct OcrRequest<'a> {
    model: &'a str,
    document: DocumentRef<'a>,
    include_image_base64: bool,
}

/// Client for the Mistral OCR API
#[derive(Debug, Clone)]
pub struct MistralOcr {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl MistralOcr {
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.mistral.ai/v1/ocr";
    pub const DEFAULT_MODEL: &'static str = "mistral-ocr-latest";

    /// Build a client whose requests give up after `timeout`
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OcrError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(OcrError::Config("API key is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .user_agent(APP_NAME)
            .timeout(timeout)
            .build()
            .map_err(|err| OcrError::Config(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body<'a>(&'a self, document_url: &'a str) -> OcrRequest<'a> {
        OcrRequest {
            model: &self.model,
            document: DocumentRef {
                kind: "document_url",
                document_url,
            },
            include_image_base64: true,
        }
    }
}

#[async_trait]
impl OcrService for MistralOcr {
    async fn recognize(&self, document_url: &str) -> Result<OcrDocument, OcrError> {
        debug!(endpoint = %self.endpoint, model = %self.model, "requesting OCR");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(document_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "OCR service rejected request");
            return Err(OcrError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| OcrError::Decode(err.to_string()))
    }
}

/// Canned OCR service for tests and offline runs
#[derive(Debug, Clone, Default)]
pub struct MockOcrService {
    delay: Duration,
    failure: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl MockOcrService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Answer every call with an upstream error carrying `body`
    pub fn with_failure(mut self, body: impl Into<String>) -> Self {
        self.failure = Some(body.into());
        self
    }

    /// Number of calls that reached the service
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OcrService for MockOcrService {
    async fn recognize(&self, document_url: &str) -> Result<OcrDocument, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(body) = &self.failure {
            return Err(OcrError::Upstream {
                status: 500,
                body: body.clone(),
            });
        }

        Ok(OcrDocument {
            pages: vec![OcrPage {
                index: 0,
                markdown: format!("# Mock OCR\n\nSource: {document_url}"),
                images: Vec::new(),
                dimensions: PageDimensions {
                    dpi: 200,
                    height: 2200,
                    width: 1700,
                },
            }],
            usage_info: UsageInfo {
                pages_processed: 1,
                doc_size_bytes: 0,
            },
        })
    }
}
