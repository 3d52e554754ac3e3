//! Graph loader
//!
//! Every load is a full rebuild: the graph is created, or dropped and
//! recreated, then the fixed schema is registered and the CSV directories
//! are bulk-loaded one file at a time. A file that fails is logged and
//! skipped; the other files still load.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::graph::{EdgeLabel, GraphStats, GraphStore, NodeLabel};

/// How the graph was prepared before a load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphPreparation {
    /// The graph did not exist and was created
    Created,
    /// The graph existed and was dropped and created again
    Recreated,
}

/// Outcome of schema registration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    /// Labels created by this run
    pub registered: Vec<String>,
    /// Labels that were already present
    pub already_present: Vec<String>,
    /// Labels that could not be registered, with the error message
    pub failed: Vec<(String, String)>,
}

impl SchemaReport {
    /// Number of labels present after registration
    pub fn available(&self) -> usize {
        self.registered.len() + self.already_present.len()
    }
}

/// A file that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub file: PathBuf,
    pub label: String,
    pub error: String,
}

/// Outcome of loading one directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Labels whose file loaded, in load order
    pub loaded: Vec<String>,
    pub failed: Vec<FileFailure>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Outcome of a full rebuild
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub preparation: GraphPreparation,
    pub schema: SchemaReport,
    pub nodes: LoadReport,
    pub edges: LoadReport,
    pub stats: GraphStats,
}

/// Builds the graph from CSV directories
#[derive(Clone)]
pub struct GraphLoader {
    graph: Arc<dyn GraphStore>,
}

#[derive(Clone, Copy)]
enum FileKind {
    Nodes,
    Edges,
}

impl FileKind {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::Edges => "edges",
        }
    }
}

impl GraphLoader {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    /// Create the graph, or drop and recreate it when it already exists
    pub async fn prepare_graph(&self) -> Result<GraphPreparation> {
        let name = self.graph.graph_name().to_string();
        if self.graph.graph_exists().await? {
            self.graph.drop_graph().await?;
            self.graph.create_graph().await?;
            info!(graph = %name, "Recreated graph");
            Ok(GraphPreparation::Recreated)
        } else {
            self.graph.create_graph().await?;
            info!(graph = %name, "Created new graph");
            Ok(GraphPreparation::Created)
        }
    }

    /// Register every node and edge label
    ///
    /// Labels that already exist count as registered. Any other failure is
    /// logged and the remaining labels are still attempted.
    pub async fn register_schema(&self) -> SchemaReport {
        let mut report = SchemaReport::default();

        info!("Registering node labels");
        for label in NodeLabel::all() {
            let result = self.graph.create_vertex_label(label.as_str()).await;
            record_registration(&mut report, label.as_str(), result);
        }

        info!("Registering edge labels");
        for label in EdgeLabel::all() {
            let result = self.graph.create_edge_label(label.as_str()).await;
            record_registration(&mut report, label.as_str(), result);
        }

        info!(
            registered = report.registered.len(),
            already_present = report.already_present.len(),
            failed = report.failed.len(),
            "Schema registration complete"
        );
        report
    }

    /// Bulk-load every `<Label>.csv` in `dir` as nodes
    pub async fn load_nodes(&self, dir: &Path) -> Result<LoadReport> {
        self.load_dir(dir, FileKind::Nodes).await
    }

    /// Bulk-load every `<Label>.csv` in `dir` as edges
    pub async fn load_edges(&self, dir: &Path) -> Result<LoadReport> {
        self.load_dir(dir, FileKind::Edges).await
    }

    async fn load_dir(&self, dir: &Path, kind: FileKind) -> Result<LoadReport> {
        let files = csv_files(dir).await?;
        let mut report = LoadReport::default();

        for (label, path) in files {
            info!(file = %path.display(), kind = kind.as_str(), "Processing");
            let result = match kind {
                FileKind::Nodes => self.graph.load_vertices(&label, &path).await,
                FileKind::Edges => self.graph.load_edges(&label, &path).await,
            };

            match result {
                Ok(()) => {
                    info!(label = %label, kind = kind.as_str(), "Loaded file");
                    report.loaded.push(label);
                }
                Err(e) => {
                    warn!(
                        label = %label,
                        file = %path.display(),
                        code = e.code(),
                        error = %e,
                        "Failed to load file, skipping"
                    );
                    report.failed.push(FileFailure {
                        file: path,
                        label,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    /// Count nodes and edges per label and log the summary
    pub async fn verify(&self) -> Result<GraphStats> {
        let stats = self.graph.stats().await?;

        for (label, count) in &stats.nodes {
            info!(label = %label, count, "Nodes");
        }
        for (label, count) in &stats.edges {
            info!(label = %label, count, "Edges");
        }
        info!(
            nodes = stats.total_nodes(),
            edges = stats.total_edges(),
            "Graph verification complete"
        );
        Ok(stats)
    }

    /// Prepare the graph, register the schema, load both directories and
    /// verify the result
    pub async fn rebuild(&self, nodes_dir: &Path, edges_dir: &Path) -> Result<RebuildReport> {
        // Fail before dropping anything if an input directory is missing
        ensure_dir(nodes_dir)?;
        ensure_dir(edges_dir)?;

        let preparation = self.prepare_graph().await?;
        let schema = self.register_schema().await;
        let nodes = self.load_nodes(nodes_dir).await?;
        let edges = self.load_edges(edges_dir).await?;
        let stats = self.verify().await?;

        Ok(RebuildReport {
            preparation,
            schema,
            nodes,
            edges,
            stats,
        })
    }
}

fn record_registration(report: &mut SchemaReport, label: &str, result: Result<()>) {
    match result {
        Ok(()) => {
            debug!(label, "Registered label");
            report.registered.push(label.to_string());
        }
        Err(e) if e.is_already_exists() => {
            debug!(label, "Label already exists");
            report.already_present.push(label.to_string());
        }
        Err(e) => {
            warn!(label, code = e.code(), error = %e, "Failed to register label");
            report.failed.push((label.to_string(), e.to_string()));
        }
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(Error::DirectoryNotFound(dir.display().to_string()))
    }
}

/// `(label, path)` for every `.csv` file in `dir`, sorted by file name
async fn csv_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    ensure_dir(dir)?;

    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let Some(label) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!(file = %path.display(), "Skipping file with a non UTF-8 name");
            continue;
        };
        files.push((label.to_string(), path.clone()));
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryGraphStore;
    use std::fs;
    use tempfile::TempDir;

    fn loader() -> (GraphLoader, Arc<MemoryGraphStore>) {
        let store = Arc::new(MemoryGraphStore::new("fcsv"));
        (GraphLoader::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_prepare_graph_creates_then_recreates() {
        let (loader, _store) = loader();
        assert_eq!(loader.prepare_graph().await.unwrap(), GraphPreparation::Created);
        assert_eq!(loader.prepare_graph().await.unwrap(), GraphPreparation::Recreated);
    }

    #[tokio::test]
    async fn test_register_schema_registers_every_label() {
        let (loader, store) = loader();
        loader.prepare_graph().await.unwrap();

        let report = loader.register_schema().await;
        assert_eq!(report.registered.len(), 17);
        assert!(report.failed.is_empty());
        assert_eq!(store.vertex_labels().await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_register_schema_without_graph_reports_failures() {
        let (loader, _store) = loader();
        let report = loader.register_schema().await;
        assert_eq!(report.failed.len(), 17);
        assert_eq!(report.available(), 0);
    }

    #[tokio::test]
    async fn test_missing_directory_is_setup_error() {
        let (loader, _store) = loader();
        loader.prepare_graph().await.unwrap();
        let err = loader
            .load_nodes(Path::new("/definitely/not/here"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DirectoryNotFound(_)));
    }

    #[tokio::test]
    async fn test_bad_file_is_skipped() {
        let (loader, _store) = loader();
        loader.prepare_graph().await.unwrap();
        loader.register_schema().await;

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Drug.csv"), "id,name\nD001,Aspirin\n").unwrap();
        fs::write(dir.path().join("Excipient.csv"), "name\nLactose\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let report = loader.load_nodes(dir.path()).await.unwrap();
        assert_eq!(report.loaded, vec!["Drug".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].label, "Excipient");
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_rebuild_checks_directories_before_dropping() {
        let (loader, store) = loader();
        loader.prepare_graph().await.unwrap();

        let nodes = TempDir::new().unwrap();
        let err = loader
            .rebuild(nodes.path(), Path::new("/definitely/not/here"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DirectoryNotFound(_)));
        assert!(store.graph_exists().await.unwrap());
    }
}
