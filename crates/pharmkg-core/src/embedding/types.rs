//! Wire types for the OpenAI-compatible embeddings endpoint

use serde::{Deserialize, Serialize};

/// Request body for `POST /embeddings`
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest {
    pub model: String,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

impl EmbeddingRequest {
    pub fn new(model: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
            dimensions: None,
        }
    }

    /// Ask the service to shorten vectors to `dimensions`
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

/// Response body of `POST /embeddings`
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingResponse {
    pub data: Vec<EmbeddingData>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub usage: Option<EmbeddingUsage>,
}

impl EmbeddingResponse {
    /// Take the vector of the first input
    pub fn into_first_embedding(self) -> Option<Vec<f32>> {
        self.data
            .into_iter()
            .min_by_key(|d| d.index)
            .map(|d| d.embedding)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingData {
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub index: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingUsage {
    pub prompt_tokens: u32,
    pub total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization() {
        let request = EmbeddingRequest::new("text-embedding-3-small", "Drug: Aspirin");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "text-embedding-3-small");
        assert_eq!(json["input"], "Drug: Aspirin");
        assert!(json.get("dimensions").is_none());

        let json = serde_json::to_value(request.with_dimensions(256)).unwrap();
        assert_eq!(json["dimensions"], 256);
    }

    #[test]
    fn test_response_first_embedding() {
        let body = r#"{
            "object": "list",
            "data": [
                {"object": "embedding", "index": 1, "embedding": [0.5, 0.5]},
                {"object": "embedding", "index": 0, "embedding": [0.1, 0.2]}
            ],
            "model": "text-embedding-3-small",
            "usage": {"prompt_tokens": 4, "total_tokens": 4}
        }"#;
        let response: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.usage.as_ref().map(|u| u.total_tokens), Some(4));
        assert_eq!(response.into_first_embedding(), Some(vec![0.1, 0.2]));
    }

    #[test]
    fn test_response_without_data() {
        let response: EmbeddingResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(response.into_first_embedding().is_none());
    }
}
