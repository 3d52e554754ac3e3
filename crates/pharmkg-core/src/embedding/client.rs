//! OpenAI-compatible embedding client
//!
//! Sends one `POST {base_url}/embeddings` request per text. Requests are
//! never retried here: a failed node is skipped by the indexer and picked up
//! by the next run.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use tracing::debug;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

use super::types::{EmbeddingRequest, EmbeddingResponse};
use super::{EmbeddingService, check_dimensions};

/// Embedding client for OpenAI-compatible services
#[derive(Clone)]
pub struct EmbeddingClient {
    http_client: HttpClient,
    model: String,
    api_key: String,
    base_url: String,
    dimensions: usize,
    /// Send `dimensions` in the request body
    request_dimensions: bool,
}

impl std::fmt::Debug for EmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

/// Builder for creating an EmbeddingClient
pub struct EmbeddingClientBuilder {
    config: Option<EmbeddingConfig>,
    api_key: Option<String>,
    base_url: Option<String>,
    dimensions: Option<usize>,
}

impl Default for EmbeddingClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: None,
            api_key: None,
            base_url: None,
            dimensions: None,
        }
    }

    /// Set the embedding configuration
    pub fn config(mut self, config: EmbeddingConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the API key
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the base URL from the configuration
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Expected vector dimensionality
    pub fn dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    /// Build the EmbeddingClient
    pub fn build(self) -> Result<EmbeddingClient> {
        let config = self.config.unwrap_or_default();
        let api_key = self
            .api_key
            .ok_or_else(|| Error::EmbeddingFailed("API key is required".to_string()))?;

        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        Ok(EmbeddingClient {
            http_client,
            model: config.model,
            api_key,
            base_url: self
                .base_url
                .unwrap_or(config.base_url)
                .trim_end_matches('/')
                .to_string(),
            dimensions: self.dimensions.unwrap_or(1536),
            request_dimensions: config.request_dimensions,
        })
    }
}

impl EmbeddingClient {
    /// Create a client from configuration and an API key
    pub fn new(
        config: EmbeddingConfig,
        api_key: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self> {
        EmbeddingClientBuilder::new()
            .config(config)
            .api_key(api_key)
            .dimensions(dimensions)
            .build()
    }

    /// Create a new builder for EmbeddingClient
    pub fn builder() -> EmbeddingClientBuilder {
        EmbeddingClientBuilder::new()
    }

    /// Get the endpoint URL
    pub fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }

    fn request_for(&self, text: &str) -> EmbeddingRequest {
        let request = EmbeddingRequest::new(&self.model, text);
        if self.request_dimensions {
            request.with_dimensions(self.dimensions)
        } else {
            request
        }
    }

    async fn send_request(&self, request: &EmbeddingRequest) -> Result<Vec<f32>> {
        debug!(model = %request.model, chars = request.input.len(), "Sending embedding request");

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_error_status(status.as_u16(), &body));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbeddingFailed(format!("Failed to parse response: {}", e)))?;

        let embedding = body
            .into_first_embedding()
            .ok_or_else(|| Error::EmbeddingFailed("Empty response from API".to_string()))?;

        check_dimensions(self.dimensions, &embedding)?;
        Ok(embedding)
    }
}

#[async_trait]
impl EmbeddingService for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::EmbeddingFailed("no text provided for embedding".into()));
        }

        self.send_request(&self.request_for(text)).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Map an error status from the service to an Error
fn map_error_status(status: u16, body: &str) -> Error {
    match status {
        401 => Error::EmbeddingFailed(
            "Unauthorized: invalid API key. Set PHARMKG_EMBEDDING_API_KEY or OPENAI_API_KEY."
                .to_string(),
        ),
        429 => Error::RateLimited(extract_retry_after(body).unwrap_or(60)),
        400 => Error::EmbeddingFailed(format!("Bad request: {}", body)),
        404 => Error::EmbeddingFailed(format!("Model or endpoint not found: {}", body)),
        500..=599 => Error::EmbeddingFailed(format!("Server error ({}): {}", status, body)),
        _ => Error::EmbeddingFailed(format!("Unexpected status {}: {}", status, body)),
    }
}

/// Extract a retry-after hint in seconds from an error body
fn extract_retry_after(body: &str) -> Option<u64> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("retry_after")
        .or_else(|| value.get("error").and_then(|e| e.get("retry_after")))
        .and_then(|v| v.as_u64())
}
