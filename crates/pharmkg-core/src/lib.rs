//! Pharmkg Core Library
//!
//! This crate provides the core functionality for pharmkg, including:
//! - Graph schema, pattern queries and serialized value navigation
//! - Storage (PostgreSQL with the graph and vector extensions, or in-memory)
//! - Retrieval (entity resolution and drug lookups)
//! - Graph loader (schema registration and CSV bulk load)
//! - Embedding indexer
//! - Embedding services (OpenAI-compatible API or local)

pub mod config;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod loader;
pub mod retrieval;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::embedding::{EmbeddingService, SimpleEmbedder};
    pub use crate::error::{Error, Result};
    pub use crate::graph::{GraphStore, VectorIndex};
    pub use crate::indexer::EmbeddingIndexer;
    pub use crate::loader::GraphLoader;
    pub use crate::retrieval::{DrugLookups, EntityResolver};
    pub use crate::storage::{AgeGraphStore, MemoryGraphStore};
}
