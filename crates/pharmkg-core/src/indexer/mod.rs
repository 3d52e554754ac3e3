//! Embedding indexer
//!
//! Embeds every named node of the graph as `"{label}: {name}"` and upserts
//! the vectors into the index, one commit per batch. Indexing is best
//! effort: a node whose embedding or write fails is skipped, and a batch
//! whose commit fails is rolled back while later batches still run.
//! Re-running is safe because records are keyed by node id.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::embedding::EmbeddingService;
use crate::error::Result;
use crate::graph::{EmbeddingRecord, GraphStore, NodeSummary, VectorIndex};

/// Default number of nodes per committed batch
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Embedded nodes between progress log lines
const PROGRESS_EVERY: usize = 50;

/// Summary of one indexing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Nodes enumerated across all labels
    pub total_nodes: usize,
    /// Nodes without a usable name
    pub skipped_unnamed: usize,
    /// Records committed to the index
    pub embedded: usize,
    /// Ids of nodes that could not be embedded or written
    pub failed: Vec<String>,
    /// Labels whose nodes could not be listed
    pub failed_labels: Vec<String>,
    pub batches: usize,
    pub failed_batches: usize,
}

impl IndexReport {
    fn start() -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            total_nodes: 0,
            skipped_unnamed: 0,
            embedded: 0,
            failed: Vec::new(),
            failed_labels: Vec::new(),
            batches: 0,
            failed_batches: 0,
        }
    }
}

/// Builds the vector index from the graph
#[derive(Clone)]
pub struct EmbeddingIndexer {
    graph: Arc<dyn GraphStore>,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingService>,
    batch_size: usize,
}

impl EmbeddingIndexer {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self {
            graph,
            index,
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Text sent to the embedding service for a node
    pub fn embedding_text(label: &str, name: &str) -> String {
        format!("{}: {}", label, name)
    }

    /// Embed and upsert every named node
    ///
    /// Fails only when the index cannot be created or the labels cannot be
    /// listed. Everything else is counted in the report.
    pub async fn index_all_nodes(&self) -> Result<IndexReport> {
        let mut report = IndexReport::start();

        self.index.ensure_index(self.embedder.dimensions()).await?;

        let nodes = self.collect_nodes(&mut report).await?;
        report.total_nodes = nodes.len() + report.skipped_unnamed;
        info!(
            run_id = %report.run_id,
            nodes = nodes.len(),
            skipped_unnamed = report.skipped_unnamed,
            model = self.embedder.model(),
            "Nodes to embed"
        );

        let total_batches = nodes.len().div_ceil(self.batch_size);
        let mut generated = 0usize;

        for (batch_idx, batch) in nodes.chunks(self.batch_size).enumerate() {
            info!(
                batch = batch_idx + 1,
                total = total_batches,
                "Processing batch {}/{}",
                batch_idx + 1,
                total_batches
            );
            report.batches += 1;

            let mut records = Vec::with_capacity(batch.len());
            for (node, name) in batch {
                let text = Self::embedding_text(&node.label, name);
                match self.embedder.embed(&text).await {
                    Ok(embedding) => {
                        generated += 1;
                        if generated % PROGRESS_EVERY == 0 {
                            info!("Embedded {}/{} nodes", generated, nodes.len());
                        }
                        records.push(EmbeddingRecord {
                            id: node.id.clone(),
                            node_name: name.clone(),
                            node_label: node.label.clone(),
                            embedding,
                        });
                    }
                    Err(e) => {
                        warn!(
                            node_id = %node.id,
                            name = %name,
                            code = e.code(),
                            error = %e,
                            "Failed to embed node, skipping"
                        );
                        report.failed.push(node.id.clone());
                    }
                }
            }

            if records.is_empty() {
                continue;
            }

            match self.index.upsert_batch(&records).await {
                Ok(outcome) => {
                    debug!(batch = batch_idx + 1, written = outcome.written, "Batch committed");
                    report.embedded += outcome.written;
                    report.failed.extend(outcome.failed);
                }
                Err(e) => {
                    warn!(
                        batch = batch_idx + 1,
                        code = e.code(),
                        error = %e,
                        "Batch commit failed, rolled back"
                    );
                    report.failed_batches += 1;
                    report.failed.extend(records.into_iter().map(|r| r.id));
                }
            }
        }

        report.finished_at = Utc::now();
        info!(
            run_id = %report.run_id,
            embedded = report.embedded,
            failed = report.failed.len(),
            failed_batches = report.failed_batches,
            "Successfully embedded {} nodes",
            report.embedded
        );
        Ok(report)
    }

    /// Every named node with its trimmed name, in label registration order
    async fn collect_nodes(&self, report: &mut IndexReport) -> Result<Vec<(NodeSummary, String)>> {
        let labels = self.graph.vertex_labels().await?;
        if labels.is_empty() {
            warn!(graph = self.graph.graph_name(), "No vertex labels found in the graph");
        }

        let mut nodes = Vec::new();
        for label in labels {
            let found = match self.graph.nodes_with_label(&label).await {
                Ok(found) => found,
                Err(e) => {
                    warn!(
                        label = %label,
                        code = e.code(),
                        error = %e,
                        "Failed to list nodes, skipping label"
                    );
                    report.failed_labels.push(label);
                    continue;
                }
            };
            info!(label = %label, count = found.len(), "Found nodes");

            for node in found {
                let name = node
                    .name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string);
                match name {
                    Some(name) => nodes.push((node, name)),
                    None => {
                        debug!(node_id = %node.id, label = %label, "Skipping node without name");
                        report.skipped_unnamed += 1;
                    }
                }
            }
        }
        Ok(nodes)
    }
}
