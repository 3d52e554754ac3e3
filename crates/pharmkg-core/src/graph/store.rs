//! Store traits for the graph and its vector index
//!
//! These traits abstract over the storage backend (PostgreSQL with the
//! graph and vector extensions, or the in-memory store). Every method is
//! one logical operation with its own transaction scope: a failure is
//! rolled back before the method returns and never leaks into the next
//! call.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::pattern::PatternQuery;

/// Graph side of the store
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Name of the graph this store operates on
    fn graph_name(&self) -> &str;

    // ========== Graph Lifecycle ==========

    /// Check whether the graph exists
    async fn graph_exists(&self) -> Result<bool>;

    /// Create the graph
    async fn create_graph(&self) -> Result<()>;

    /// Drop the graph and everything in it
    async fn drop_graph(&self) -> Result<()>;

    // ========== Schema ==========

    /// Register a node label. Fails with an already-exists error on duplicates.
    async fn create_vertex_label(&self, label: &str) -> Result<()>;

    /// Register an edge label. Fails with an already-exists error on duplicates.
    async fn create_edge_label(&self, label: &str) -> Result<()>;

    /// List registered node labels in registration order
    async fn vertex_labels(&self) -> Result<Vec<String>>;

    // ========== Bulk Load ==========

    /// Bulk-load nodes of `label` from a CSV file, all or nothing
    async fn load_vertices(&self, label: &str, file: &Path) -> Result<()>;

    /// Bulk-load edges of `label` from a CSV file, all or nothing
    async fn load_edges(&self, label: &str, file: &Path) -> Result<()>;

    // ========== Queries ==========

    /// List `(id, name, label)` for every node of a label
    async fn nodes_with_label(&self, label: &str) -> Result<Vec<NodeSummary>>;

    /// Run a pattern query with `entity_id` bound, returning one serialized
    /// node per matched row in store order
    async fn run_pattern(&self, query: &PatternQuery, entity_id: &str) -> Result<Vec<String>>;

    /// Node and edge counts per label
    async fn stats(&self) -> Result<GraphStats>;
}

/// Vector index side of the store
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the index table if absent
    async fn ensure_index(&self, dimensions: usize) -> Result<()>;

    /// Upsert records keyed by id and commit them together
    ///
    /// A record that fails to write is rolled back alone and reported in
    /// [`BatchOutcome::failed`]. If the commit itself fails, nothing from
    /// the batch is kept and the error is returned.
    async fn upsert_batch(&self, records: &[EmbeddingRecord]) -> Result<BatchOutcome>;

    /// Closest records to `query`, ascending by distance
    ///
    /// Ties keep insertion order.
    async fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<NearestMatch>>;

    /// Number of records in the index
    async fn count(&self) -> Result<u64>;
}

/// Identity of a graph node as enumerated for embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: String,
    pub name: Option<String>,
    pub label: String,
}

/// Node and edge counts per label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    /// Node counts in label registration order
    pub nodes: Vec<(String, u64)>,
    /// Edge counts in label registration order
    pub edges: Vec<(String, u64)>,
}

impl GraphStats {
    /// Total number of nodes
    pub fn total_nodes(&self) -> u64 {
        self.nodes.iter().map(|(_, count)| count).sum()
    }

    /// Total number of edges
    pub fn total_edges(&self) -> u64 {
        self.edges.iter().map(|(_, count)| count).sum()
    }

    /// Node count for one label (0 when absent)
    pub fn node_count(&self, label: &str) -> u64 {
        self.nodes
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// Edge count for one label (0 when absent)
    pub fn edge_count(&self, label: &str) -> u64 {
        self.edges
            .iter()
            .find(|(name, _)| name == label)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}

/// One row of the vector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Node identifier, primary key
    pub id: String,
    /// Text of the node that was embedded
    pub node_name: String,
    /// Source label of the node
    pub node_label: String,
    pub embedding: Vec<f32>,
}

/// Result of a nearest-neighbour query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestMatch {
    pub id: String,
    pub node_name: String,
    pub node_label: String,
    pub distance: f64,
}

/// Outcome of one committed batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Number of records written
    pub written: usize,
    /// Ids of records that failed and were skipped
    pub failed: Vec<String>,
}

/// Distance metric used for nearest-neighbour ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    /// Euclidean distance
    #[default]
    L2,
    /// Cosine distance (1 - cosine similarity)
    Cosine,
}

impl DistanceMetric {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
        }
    }

    /// Parse from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "l2" | "euclidean" => Some(Self::L2),
            "cosine" => Some(Self::Cosine),
            _ => None,
        }
    }

    /// pgvector operator for this metric
    pub fn operator(&self) -> &'static str {
        match self {
            Self::L2 => "<->",
            Self::Cosine => "<=>",
        }
    }

    /// Distance between two vectors of equal length
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            Self::L2 => a
                .iter()
                .zip(b)
                .map(|(x, y)| {
                    let d = f64::from(*x) - f64::from(*y);
                    d * d
                })
                .sum::<f64>()
                .sqrt(),
            Self::Cosine => {
                let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
                let norm_a: f64 = a.iter().map(|v| f64::from(*v).powi(2)).sum::<f64>().sqrt();
                let norm_b: f64 = b.iter().map(|v| f64::from(*v).powi(2)).sum::<f64>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a * norm_b)
            }
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_distance() {
        let d = DistanceMetric::L2.distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((d - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_distance() {
        let same = DistanceMetric::Cosine.distance(&[1.0, 0.0], &[2.0, 0.0]);
        assert!(same.abs() < 1e-9);

        let orthogonal = DistanceMetric::Cosine.distance(&[1.0, 0.0], &[0.0, 1.0]);
        assert!((orthogonal - 1.0).abs() < 1e-9);

        let zero = DistanceMetric::Cosine.distance(&[0.0, 0.0], &[1.0, 0.0]);
        assert_eq!(zero, 1.0);
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!(DistanceMetric::parse("L2"), Some(DistanceMetric::L2));
        assert_eq!(DistanceMetric::parse("cosine"), Some(DistanceMetric::Cosine));
        assert_eq!(DistanceMetric::parse("dot"), None);
        assert_eq!(DistanceMetric::Cosine.operator(), "<=>");
    }

    #[test]
    fn test_graph_stats_totals() {
        let stats = GraphStats {
            nodes: vec![("Drug".into(), 2), ("GenericGroup".into(), 1)],
            edges: vec![("IsPartOfGenericGroup".into(), 2)],
        };
        assert_eq!(stats.total_nodes(), 3);
        assert_eq!(stats.total_edges(), 2);
        assert_eq!(stats.node_count("Drug"), 2);
        assert_eq!(stats.node_count("Excipient"), 0);
        assert_eq!(stats.edge_count("IsPartOfGenericGroup"), 2);
    }
}
