//! Free text to graph entity resolution
//!
//! Embeds the text and returns the closest record in the vector index. This
//! is a nearest match: with a non-empty index there is always an answer
//! unless `max_distance` is set.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::IndexConfig;
use crate::embedding::EmbeddingService;
use crate::error::Result;
use crate::graph::VectorIndex;

/// Default number of candidates fetched from the index
pub const DEFAULT_CANDIDATES: usize = 5;

/// The entity a text resolved to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub name: String,
    pub id: String,
    pub label: String,
    pub distance: f64,
}

/// Resolves free text to the nearest indexed node
#[derive(Clone)]
pub struct EntityResolver {
    embedder: Arc<dyn EmbeddingService>,
    index: Arc<dyn VectorIndex>,
    candidates: usize,
    max_distance: Option<f64>,
}

impl EntityResolver {
    pub fn new(embedder: Arc<dyn EmbeddingService>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            candidates: DEFAULT_CANDIDATES,
            max_distance: None,
        }
    }

    /// Build with the candidate count and threshold from `[index]`
    pub fn from_config(
        embedder: Arc<dyn EmbeddingService>,
        index: Arc<dyn VectorIndex>,
        config: &IndexConfig,
    ) -> Self {
        Self::new(embedder, index)
            .with_candidates(config.candidates)
            .with_max_distance(config.max_distance)
    }

    pub fn with_candidates(mut self, candidates: usize) -> Self {
        self.candidates = candidates.max(1);
        self
    }

    /// Reject the best candidate when it is farther than `max_distance`
    pub fn with_max_distance(mut self, max_distance: Option<f64>) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// Resolve `text`, or `None` when nothing acceptable is found or a
    /// failure occurs
    pub async fn resolve(&self, text: &str) -> Option<ResolvedEntity> {
        match self.try_resolve(text).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(code = e.code(), error = %e, "Entity resolution failed");
                None
            }
        }
    }

    /// Resolve `text`, surfacing embedding and store errors
    pub async fn try_resolve(&self, text: &str) -> Result<Option<ResolvedEntity>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let vector = self.embedder.embed(text).await?;
        let candidates = self.index.nearest(&vector, self.candidates).await?;

        let Some(best) = candidates.into_iter().next() else {
            debug!(text, "Vector index is empty");
            return Ok(None);
        };

        if let Some(max) = self.max_distance {
            if best.distance > max {
                debug!(text, distance = best.distance, max, "Best candidate over threshold");
                return Ok(None);
            }
        }

        debug!(text, id = %best.id, distance = best.distance, "Resolved entity");
        Ok(Some(ResolvedEntity {
            name: strip_quotes(&best.node_name).to_string(),
            id: strip_quotes(&best.id).to_string(),
            label: best.node_label,
            distance: best.distance,
        }))
    }
}

/// Remove quote characters wrapping a stored text field
fn strip_quotes(s: &str) -> &str {
    s.trim().trim_matches(|c: char| c == '"' || c == '\'')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"Aspirin\""), "Aspirin");
        assert_eq!(strip_quotes("'D001'"), "D001");
        assert_eq!(strip_quotes("  \"Generic Aspirin\" "), "Generic Aspirin");
        assert_eq!(strip_quotes("O'Brien"), "O'Brien");
    }
}
