//! In-process graph and vector index
//!
//! Reads the same CSV bulk-load files as the database store and serializes
//! pattern results the same way (`{...}::vertex`), so everything above the
//! store seam behaves identically against either backend. Used by the test
//! suite and by the CLI `--offline` mode.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::{
    BatchOutcome, Direction, DistanceMetric, EmbeddingRecord, GraphStats, GraphStore,
    NearestMatch, NodeSummary, PatternQuery, VectorIndex, validate_identifier,
};

use super::bulk::{self, EdgeRow, NodeRow};

/// Bits reserved for the per-label sequence in a graph id
const ENTRY_ID_BITS: u32 = 48;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelKind {
    Vertex,
    Edge,
}

#[derive(Debug)]
struct Label {
    name: String,
    kind: LabelKind,
    next_entry: u64,
    /// Vertex position by `id` property; empty for edge labels
    ids: HashMap<String, usize>,
    /// Vertex or edge positions carrying this label, in load order
    members: Vec<usize>,
}

#[derive(Debug)]
struct Vertex {
    graph_id: u64,
    label: usize,
    properties: Map<String, Value>,
}

#[derive(Debug)]
struct Edge {
    start: usize,
    end: usize,
}

#[derive(Debug, Default)]
struct Graph {
    labels: Vec<Label>,
    label_names: HashMap<String, usize>,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    /// Edge positions keyed by (start vertex, edge label)
    outgoing: HashMap<(usize, usize), Vec<usize>>,
    /// Edge positions keyed by (end vertex, edge label)
    incoming: HashMap<(usize, usize), Vec<usize>>,
}

impl Graph {
    fn label_index(&self, name: &str) -> Option<usize> {
        self.label_names.get(name).copied()
    }

    fn label_of_kind(&self, name: &str, kind: LabelKind) -> Option<usize> {
        self.label_index(name).filter(|&idx| self.labels[idx].kind == kind)
    }

    fn create_label(&mut self, name: &str, kind: LabelKind) -> Result<usize> {
        if self.label_index(name).is_some() {
            return Err(Error::LabelAlreadyExists(name.to_string()));
        }
        self.labels.push(Label {
            name: name.to_string(),
            kind,
            next_entry: 1,
            ids: HashMap::new(),
            members: Vec::new(),
        });
        let idx = self.labels.len() - 1;
        self.label_names.insert(name.to_string(), idx);
        Ok(idx)
    }

    /// Find or create a label of `kind`, failing if the name is taken by the other kind
    fn ensure_label(&mut self, name: &str, kind: LabelKind) -> Result<usize> {
        match self.label_index(name) {
            Some(idx) if self.labels[idx].kind == kind => Ok(idx),
            Some(_) => Err(Error::InvalidInput(format!(
                "label '{}' is registered with a different kind",
                name
            ))),
            None => self.create_label(name, kind),
        }
    }

    fn labels_of(&self, kind: LabelKind) -> impl Iterator<Item = &Label> {
        self.labels.iter().filter(move |l| l.kind == kind)
    }

    fn find_vertex(&self, label: &str, id: &str) -> Option<usize> {
        let label_idx = self.label_of_kind(label, LabelKind::Vertex)?;
        self.labels[label_idx].ids.get(id).copied()
    }

    fn insert_vertices(&mut self, label: &str, rows: Vec<NodeRow>, file: &str) -> Result<()> {
        let label_idx = self.ensure_label(label, LabelKind::Vertex)?;

        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            if !seen.insert(row.id.as_str()) || self.labels[label_idx].ids.contains_key(&row.id) {
                return Err(Error::BulkLoadFailed {
                    file: file.to_string(),
                    reason: format!("duplicate id '{}' for label {}", row.id, label),
                });
            }
        }

        for row in rows {
            let position = self.vertices.len();
            let entry = &mut self.labels[label_idx];
            let graph_id = ((label_idx as u64 + 1) << ENTRY_ID_BITS) | entry.next_entry;
            entry.next_entry += 1;
            entry.ids.insert(row.id, position);
            entry.members.push(position);
            self.vertices.push(Vertex {
                graph_id,
                label: label_idx,
                properties: row.properties,
            });
        }
        Ok(())
    }

    fn insert_edges(&mut self, label: &str, rows: Vec<EdgeRow>, file: &str) -> Result<()> {
        let mut resolved = Vec::with_capacity(rows.len());
        for row in &rows {
            let endpoint = |label: &str, id: &str| {
                self.find_vertex(label, id).ok_or_else(|| Error::BulkLoadFailed {
                    file: file.to_string(),
                    reason: format!("endpoint {}({}) does not exist", label, id),
                })
            };
            let start = endpoint(&row.start_label, &row.start_id)?;
            let end = endpoint(&row.end_label, &row.end_id)?;
            resolved.push((start, end));
        }

        let label_idx = self.ensure_label(label, LabelKind::Edge)?;
        self.labels[label_idx].next_entry += resolved.len() as u64;
        for (start, end) in resolved {
            let position = self.edges.len();
            self.edges.push(Edge { start, end });
            self.labels[label_idx].members.push(position);
            self.outgoing.entry((start, label_idx)).or_default().push(position);
            self.incoming.entry((end, label_idx)).or_default().push(position);
        }
        Ok(())
    }

    /// Depth-first match of `query`; an edge is used at most once per match
    fn match_pattern(&self, query: &PatternQuery, entity_id: &str) -> Vec<usize> {
        let mut results = Vec::new();
        let mut used = Vec::new();
        if let Some(anchor) = self.find_vertex(query.anchor.as_str(), entity_id) {
            self.extend_match(query, 0, anchor, &mut used, &mut results);
        }
        results
    }

    fn extend_match(
        &self,
        query: &PatternQuery,
        depth: usize,
        current: usize,
        used: &mut Vec<usize>,
        results: &mut Vec<usize>,
    ) {
        let Some(hop) = query.hops.get(depth) else {
            results.push(current);
            return;
        };
        let Some(edge_label) = self.label_of_kind(hop.edge.as_str(), LabelKind::Edge) else {
            return;
        };
        let Some(target) = self.label_of_kind(hop.target.as_str(), LabelKind::Vertex) else {
            return;
        };

        let adjacency = match hop.direction {
            Direction::Outgoing => &self.outgoing,
            Direction::Incoming => &self.incoming,
        };
        let Some(candidates) = adjacency.get(&(current, edge_label)) else {
            return;
        };

        for &edge_idx in candidates {
            if used.contains(&edge_idx) {
                continue;
            }
            let edge = &self.edges[edge_idx];
            let next = match hop.direction {
                Direction::Outgoing => edge.end,
                Direction::Incoming => edge.start,
            };
            if self.vertices[next].label != target {
                continue;
            }
            used.push(edge_idx);
            self.extend_match(query, depth + 1, next, used, results);
            used.pop();
        }
    }

    fn serialize_vertex(&self, idx: usize) -> String {
        let vertex = &self.vertices[idx];
        let value = json!({
            "id": vertex.graph_id,
            "label": self.labels[vertex.label].name,
            "properties": vertex.properties,
        });
        format!("{}::vertex", value)
    }
}

/// Property rendered as text, `None` when absent or null
fn property_text(properties: &Map<String, Value>, key: &str) -> Option<String> {
    match properties.get(key)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug)]
struct VectorTable {
    dimensions: usize,
    /// Rows in insertion order; upserts replace in place
    rows: Vec<EmbeddingRecord>,
    positions: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct State {
    graph: Option<Graph>,
    vectors: Option<VectorTable>,
}

/// In-memory [`GraphStore`] and [`VectorIndex`]
#[derive(Debug, Clone)]
pub struct MemoryGraphStore {
    name: String,
    metric: DistanceMetric,
    state: Arc<RwLock<State>>,
}

impl MemoryGraphStore {
    /// Create an empty store; the graph itself must still be created
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metric: DistanceMetric::default(),
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    /// Use a different distance metric for nearest-neighbour queries
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    fn missing_graph(&self) -> Error {
        Error::GraphNotFound(self.name.clone())
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    fn graph_name(&self) -> &str {
        &self.name
    }

    // ========== Graph Lifecycle ==========

    async fn graph_exists(&self) -> Result<bool> {
        Ok(self.state.read().await.graph.is_some())
    }

    async fn create_graph(&self) -> Result<()> {
        validate_identifier(&self.name)?;
        let mut state = self.state.write().await;
        if state.graph.is_some() {
            return Err(Error::Other(format!("graph '{}' already exists", self.name)));
        }
        state.graph = Some(Graph::default());
        debug!(graph = %self.name, "Graph created");
        Ok(())
    }

    async fn drop_graph(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if state.graph.take().is_none() {
            return Err(self.missing_graph());
        }
        debug!(graph = %self.name, "Graph dropped");
        Ok(())
    }

    // ========== Schema ==========

    async fn create_vertex_label(&self, label: &str) -> Result<()> {
        let label = validate_identifier(label)?;
        let mut state = self.state.write().await;
        let graph = state.graph.as_mut().ok_or_else(|| self.missing_graph())?;
        graph.create_label(label, LabelKind::Vertex)?;
        Ok(())
    }

    async fn create_edge_label(&self, label: &str) -> Result<()> {
        let label = validate_identifier(label)?;
        let mut state = self.state.write().await;
        let graph = state.graph.as_mut().ok_or_else(|| self.missing_graph())?;
        graph.create_label(label, LabelKind::Edge)?;
        Ok(())
    }

    async fn vertex_labels(&self) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let graph = state.graph.as_ref().ok_or_else(|| self.missing_graph())?;
        Ok(graph
            .labels_of(LabelKind::Vertex)
            .map(|l| l.name.clone())
            .collect())
    }

    // ========== Bulk Load ==========

    async fn load_vertices(&self, label: &str, file: &Path) -> Result<()> {
        let label = validate_identifier(label)?;
        let file_name = file.display().to_string();
        let bytes = tokio::fs::read(file).await?;
        let rows = bulk::parse_nodes(bytes.as_slice(), &file_name)?;

        let mut state = self.state.write().await;
        let graph = state.graph.as_mut().ok_or_else(|| self.missing_graph())?;
        let count = rows.len();
        graph.insert_vertices(label, rows, &file_name)?;

        debug!(label = %label, file = %file_name, count, "Vertices loaded");
        Ok(())
    }

    async fn load_edges(&self, label: &str, file: &Path) -> Result<()> {
        let label = validate_identifier(label)?;
        let file_name = file.display().to_string();
        let bytes = tokio::fs::read(file).await?;
        let rows = bulk::parse_edges(bytes.as_slice(), &file_name)?;

        let mut state = self.state.write().await;
        let graph = state.graph.as_mut().ok_or_else(|| self.missing_graph())?;
        let count = rows.len();
        graph.insert_edges(label, rows, &file_name)?;

        debug!(label = %label, file = %file_name, count, "Edges loaded");
        Ok(())
    }

    // ========== Queries ==========

    async fn nodes_with_label(&self, label: &str) -> Result<Vec<NodeSummary>> {
        let label = validate_identifier(label)?;
        let state = self.state.read().await;
        let graph = state.graph.as_ref().ok_or_else(|| self.missing_graph())?;

        let Some(label_idx) = graph.label_of_kind(label, LabelKind::Vertex) else {
            return Ok(Vec::new());
        };

        Ok(graph.labels[label_idx]
            .members
            .iter()
            .map(|&idx| &graph.vertices[idx])
            .filter_map(|v| {
                Some(NodeSummary {
                    id: property_text(&v.properties, "id")?,
                    name: property_text(&v.properties, "name"),
                    label: label.to_string(),
                })
            })
            .collect())
    }

    async fn run_pattern(&self, query: &PatternQuery, entity_id: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        let graph = state.graph.as_ref().ok_or_else(|| self.missing_graph())?;

        let rows: Vec<String> = graph
            .match_pattern(query, entity_id)
            .into_iter()
            .map(|idx| graph.serialize_vertex(idx))
            .collect();

        debug!(query = query.name, entity_id, rows = rows.len(), "Pattern query executed");
        Ok(rows)
    }

    async fn stats(&self) -> Result<GraphStats> {
        let state = self.state.read().await;
        let graph = state.graph.as_ref().ok_or_else(|| self.missing_graph())?;

        let nodes = graph
            .labels_of(LabelKind::Vertex)
            .map(|l| (l.name.clone(), l.members.len() as u64))
            .collect();
        let edges = graph
            .labels_of(LabelKind::Edge)
            .map(|l| (l.name.clone(), l.members.len() as u64))
            .collect();

        Ok(GraphStats { nodes, edges })
    }
}

#[async_trait]
impl VectorIndex for MemoryGraphStore {
    async fn ensure_index(&self, dimensions: usize) -> Result<()> {
        if dimensions == 0 {
            return Err(Error::InvalidInput("vector dimensions must be positive".into()));
        }
        let mut state = self.state.write().await;
        if let Some(table) = &state.vectors {
            if table.dimensions != dimensions {
                return Err(Error::IndexDimensionMismatch {
                    table: table.dimensions,
                    requested: dimensions,
                });
            }
            return Ok(());
        }

        state.vectors = Some(VectorTable {
            dimensions,
            rows: Vec::new(),
            positions: HashMap::new(),
        });
        Ok(())
    }

    async fn upsert_batch(&self, records: &[EmbeddingRecord]) -> Result<BatchOutcome> {
        let mut state = self.state.write().await;
        let table = state.vectors.as_mut().ok_or(Error::IndexNotInitialised)?;

        let mut outcome = BatchOutcome::default();
        for record in records {
            if record.embedding.len() != table.dimensions {
                outcome.failed.push(record.id.clone());
                continue;
            }
            match table.positions.get(&record.id) {
                Some(&idx) => table.rows[idx] = record.clone(),
                None => {
                    table.positions.insert(record.id.clone(), table.rows.len());
                    table.rows.push(record.clone());
                }
            }
            outcome.written += 1;
        }
        Ok(outcome)
    }

    async fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<NearestMatch>> {
        let state = self.state.read().await;
        let table = state.vectors.as_ref().ok_or(Error::IndexNotInitialised)?;
        if query.len() != table.dimensions {
            return Err(Error::IndexDimensionMismatch {
                table: table.dimensions,
                requested: query.len(),
            });
        }

        let mut matches: Vec<NearestMatch> = table
            .rows
            .iter()
            .map(|row| NearestMatch {
                id: row.id.clone(),
                node_name: row.node_name.clone(),
                node_label: row.node_label.clone(),
                distance: self.metric.distance(&row.embedding, query),
            })
            .collect();
        // Stable sort keeps insertion order among equal distances
        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn count(&self) -> Result<u64> {
        let state = self.state.read().await;
        let table = state.vectors.as_ref().ok_or(Error::IndexNotInitialised)?;
        Ok(table.rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::pattern::{EXCIPIENTS, GENERICS};
    use crate::graph::parse_payload;
    use std::fs;
    use tempfile::TempDir;

    async fn loaded_store() -> (MemoryGraphStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let drugs = dir.path().join("Drug.csv");
        let groups = dir.path().join("GenericGroup.csv");
        let edges = dir.path().join("IsPartOfGenericGroup.csv");
        fs::write(&drugs, "id,name\nD001,Aspirin\nD002,Generic Aspirin\n").unwrap();
        fs::write(&groups, "id,name\nG001,Acetylsalicylic acid\n").unwrap();
        fs::write(
            &edges,
            "start_id,start_vertex_type,end_id,end_vertex_type\n\
             D001,Drug,G001,GenericGroup\n\
             D002,Drug,G001,GenericGroup\n",
        )
        .unwrap();

        let store = MemoryGraphStore::new("fcsv");
        store.create_graph().await.unwrap();
        store.load_vertices("Drug", &drugs).await.unwrap();
        store.load_vertices("GenericGroup", &groups).await.unwrap();
        store.load_edges("IsPartOfGenericGroup", &edges).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_generics_exclude_anchor_drug() {
        let (store, _dir) = loaded_store().await;
        let rows = store.run_pattern(&GENERICS, "D001").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].ends_with("::vertex"));

        let value = parse_payload(&rows[0]).unwrap();
        assert_eq!(value["label"], "Drug");
        assert_eq!(value["properties"]["id"], "D002");
        assert_eq!(value["properties"]["name"], "Generic Aspirin");
    }

    #[tokio::test]
    async fn test_pattern_without_matches_is_empty() {
        let (store, _dir) = loaded_store().await;
        assert!(store.run_pattern(&EXCIPIENTS, "D001").await.unwrap().is_empty());
        assert!(store.run_pattern(&GENERICS, "D999").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_label_is_reported() {
        let store = MemoryGraphStore::new("fcsv");
        store.create_graph().await.unwrap();
        store.create_vertex_label("Drug").await.unwrap();
        let err = store.create_vertex_label("Drug").await.unwrap_err();
        assert!(err.is_already_exists());
        let err = store.create_edge_label("Drug").await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_edge_file_with_missing_endpoint_loads_nothing() {
        let (store, dir) = loaded_store().await;
        let edges = dir.path().join("ContainsExcipient.csv");
        fs::write(
            &edges,
            "start_id,start_vertex_type,end_id,end_vertex_type\n\
             D001,Drug,G001,GenericGroup\n\
             D001,Drug,X404,Excipient\n",
        )
        .unwrap();

        let err = store.load_edges("ContainsExcipient", &edges).await.unwrap_err();
        assert!(matches!(err, Error::BulkLoadFailed { .. }));
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.edge_count("ContainsExcipient"), 0);
        assert_eq!(stats.total_edges(), 2);
    }

    #[tokio::test]
    async fn test_operations_require_graph() {
        let store = MemoryGraphStore::new("fcsv");
        assert!(!store.graph_exists().await.unwrap());
        assert!(matches!(store.stats().await, Err(Error::GraphNotFound(_))));
        assert!(matches!(store.drop_graph().await, Err(Error::GraphNotFound(_))));
    }

    #[tokio::test]
    async fn test_nodes_with_label() {
        let (store, _dir) = loaded_store().await;
        let nodes = store.nodes_with_label("Drug").await.unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, "D001");
        assert_eq!(nodes[0].name.as_deref(), Some("Aspirin"));
        assert!(store.nodes_with_label("Excipient").await.unwrap().is_empty());
        assert_eq!(
            store.vertex_labels().await.unwrap(),
            vec!["Drug".to_string(), "GenericGroup".to_string()]
        );
    }

    #[tokio::test]
    async fn test_large_graph_loads_and_matches_quickly() {
        use std::fmt::Write as _;
        use std::time::{Duration, Instant};

        const DRUGS: usize = 10_000;
        const GROUPS: usize = 1_000;

        let dir = TempDir::new().unwrap();
        let mut drugs = String::from("id,name\n");
        for i in 0..DRUGS {
            writeln!(drugs, "D{:05},Drug {}", i, i).unwrap();
        }
        let mut groups = String::from("id,name\n");
        for g in 0..GROUPS {
            writeln!(groups, "G{:04},Group {}", g, g).unwrap();
        }
        // Every drug sits in two neighbouring groups
        let mut edges = String::from("start_id,start_vertex_type,end_id,end_vertex_type\n");
        for i in 0..DRUGS {
            writeln!(edges, "D{:05},Drug,G{:04},GenericGroup", i, i % GROUPS).unwrap();
            writeln!(edges, "D{:05},Drug,G{:04},GenericGroup", i, (i + 1) % GROUPS).unwrap();
        }
        fs::write(dir.path().join("Drug.csv"), drugs).unwrap();
        fs::write(dir.path().join("GenericGroup.csv"), groups).unwrap();
        fs::write(dir.path().join("IsPartOfGenericGroup.csv"), edges).unwrap();

        let started = Instant::now();
        let store = MemoryGraphStore::new("fcsv");
        store.create_graph().await.unwrap();
        store
            .load_vertices("Drug", &dir.path().join("Drug.csv"))
            .await
            .unwrap();
        store
            .load_vertices("GenericGroup", &dir.path().join("GenericGroup.csv"))
            .await
            .unwrap();
        store
            .load_edges("IsPartOfGenericGroup", &dir.path().join("IsPartOfGenericGroup.csv"))
            .await
            .unwrap();
        for i in (0..DRUGS).step_by(97) {
            let id = format!("D{:05}", i);
            // 20 members in each of two groups, minus the anchor's own edge twice
            assert_eq!(store.run_pattern(&GENERICS, &id).await.unwrap().len(), 38);
        }
        let elapsed = started.elapsed();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_nodes(), (DRUGS + GROUPS) as u64);
        assert_eq!(stats.total_edges(), (DRUGS * 2) as u64);
        assert_eq!(store.nodes_with_label("GenericGroup").await.unwrap().len(), GROUPS);
        assert!(elapsed < Duration::from_secs(5), "load took {:?}", elapsed);
    }

    fn record(id: &str, embedding: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            id: id.to_string(),
            node_name: format!("name-{}", id),
            node_label: "Drug".to_string(),
            embedding,
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_in_place() {
        let store = MemoryGraphStore::new("fcsv");
        store.ensure_index(2).await.unwrap();
        store
            .upsert_batch(&[record("a", vec![0.0, 1.0]), record("b", vec![1.0, 0.0])])
            .await
            .unwrap();
        let outcome = store.upsert_batch(&[record("a", vec![0.5, 0.5])]).await.unwrap();
        assert_eq!(outcome.written, 1);
        assert_eq!(store.count().await.unwrap(), 2);

        let nearest = store.nearest(&[0.5, 0.5], 1).await.unwrap();
        assert_eq!(nearest[0].id, "a");
        assert!(nearest[0].distance.abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_wrong_width_record_fails_alone() {
        let store = MemoryGraphStore::new("fcsv");
        store.ensure_index(2).await.unwrap();
        let outcome = store
            .upsert_batch(&[record("a", vec![0.0]), record("b", vec![1.0, 0.0])])
            .await
            .unwrap();
        assert_eq!(outcome.written, 1);
        assert_eq!(outcome.failed, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_nearest_ties_keep_insertion_order() {
        let store = MemoryGraphStore::new("fcsv");
        store.ensure_index(2).await.unwrap();
        store
            .upsert_batch(&[
                record("first", vec![1.0, 0.0]),
                record("second", vec![0.0, 1.0]),
                record("third", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let nearest = store.nearest(&[1.0, 0.0], 5).await.unwrap();
        let ids: Vec<&str> = nearest.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["first", "third", "second"]);
    }

    #[tokio::test]
    async fn test_index_must_be_initialised() {
        let store = MemoryGraphStore::new("fcsv");
        assert!(matches!(store.count().await, Err(Error::IndexNotInitialised)));
        assert!(matches!(
            store.nearest(&[0.0], 1).await,
            Err(Error::IndexNotInitialised)
        ));
        store.ensure_index(3).await.unwrap();
        assert!(matches!(
            store.ensure_index(4).await,
            Err(Error::IndexDimensionMismatch {
                table: 3,
                requested: 4
            })
        ));
    }
}
