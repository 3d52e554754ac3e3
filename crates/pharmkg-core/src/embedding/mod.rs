//! Text embedding services
//!
//! - [`EmbeddingService`]: the seam used by the resolver and the indexer
//! - [`EmbeddingClient`]: OpenAI-compatible HTTP `/embeddings` client
//! - [`SimpleEmbedder`]: deterministic local embedder for offline use and tests

mod client;
mod types;

pub use client::{EmbeddingClient, EmbeddingClientBuilder};
pub use types::{EmbeddingData, EmbeddingRequest, EmbeddingResponse, EmbeddingUsage};

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Service that turns text into a fixed-length vector
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embed one text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Dimensionality of the vectors produced
    fn dimensions(&self) -> usize;

    /// Model identifier, for logs
    fn model(&self) -> &str;
}

/// Check a vector against the expected dimensionality
pub fn check_dimensions(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(Error::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Simple vectorizer that produces stable, deterministic embeddings without
/// external services. Texts sharing bytes at the same positions land close
/// together; it has no semantic understanding.
#[derive(Clone, Debug)]
pub struct SimpleEmbedder {
    dimensions: usize,
}

impl Default for SimpleEmbedder {
    fn default() -> Self {
        Self { dimensions: 64 }
    }
}

impl SimpleEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }
}

#[async_trait]
impl EmbeddingService for SimpleEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(Error::EmbeddingFailed("no text provided for embedding".into()));
        }
        Ok(text_to_vec(&text.to_lowercase(), self.dimensions))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        "simple-local"
    }
}

fn text_to_vec(text: &str, dims: usize) -> Vec<f32> {
    let mut vec = vec![0.0; dims];
    for (i, b) in text.bytes().enumerate() {
        let idx = i % dims;
        vec[idx] += (b as f32) / 255.0;
    }

    // Normalize
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vec {
            *v /= norm;
        }
    }
    vec
}
