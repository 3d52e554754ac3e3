//! PostgreSQL store backed by the graph and vector extensions
//!
//! Implements [`GraphStore`] through the `ag_catalog` functions and the
//! `cypher()` entry point, and [`VectorIndex`] through a pgvector table.
//! Each trait method runs in its own transaction; an error drops the
//! transaction, which rolls it back before the method returns.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{Acquire, PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::graph::pattern::ENTITY_ID_PARAM;
use crate::graph::{
    Agtype, BatchOutcome, DistanceMetric, EmbeddingRecord, GraphStats, GraphStore, NearestMatch,
    NodeSummary, PatternQuery, VectorIndex, scalar_text, validate_identifier,
};

use super::migrations;

/// SQLSTATE for an undefined table
const UNDEFINED_TABLE: &str = "42P01";
/// SQLSTATE raised by the graph extension for an unknown graph
const INVALID_SCHEMA_NAME: &str = "3F000";

/// Graph and vector index store on one PostgreSQL database
#[derive(Debug, Clone)]
pub struct AgeGraphStore {
    pool: PgPool,
    graph: String,
    table: String,
    metric: DistanceMetric,
}

impl AgeGraphStore {
    /// Create a store for `graph`, with the default index table and metric
    pub fn new(pool: PgPool, graph: impl Into<String>) -> Result<Self> {
        let graph = graph.into();
        validate_identifier(&graph)?;
        Ok(Self {
            pool,
            graph,
            table: "document_vectors".to_string(),
            metric: DistanceMetric::default(),
        })
    }

    /// Use a different vector index table and distance metric
    pub fn with_index(mut self, table: impl Into<String>, metric: DistanceMetric) -> Result<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        self.table = table;
        self.metric = metric;
        Ok(self)
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Name of the vector index table
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    fn graph_error(&self, error: sqlx::Error) -> Error {
        match &error {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(INVALID_SCHEMA_NAME) => {
                Error::GraphNotFound(self.graph.clone())
            }
            _ => Error::DatabaseError(error),
        }
    }

    fn index_error(error: sqlx::Error) -> Error {
        match &error {
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNDEFINED_TABLE) => {
                Error::IndexNotInitialised
            }
            _ => Error::DatabaseError(error),
        }
    }

    async fn create_label(&self, function: &str, label: &str) -> Result<()> {
        let label = validate_identifier(label)?;
        // Both arguments are cstrings, so they are rendered as literals
        let sql = format!(
            "SELECT ag_catalog.{}('{}', '{}')",
            function, self.graph, label
        );

        let mut tx = self.begin().await?;
        match sqlx::query(&sql).execute(&mut *tx).await {
            Ok(_) => {
                tx.commit().await?;
                Ok(())
            }
            Err(e) => {
                let error = self.graph_error(e);
                if error.is_already_exists() {
                    Err(Error::LabelAlreadyExists(label.to_string()))
                } else {
                    Err(error)
                }
            }
        }
    }

    async fn bulk_load(&self, function: &str, label: &str, file: &Path) -> Result<()> {
        let label = validate_identifier(label)?;
        let file_name = file.display().to_string();
        let path = file.to_str().ok_or_else(|| Error::BulkLoadFailed {
            file: file_name.clone(),
            reason: "path is not valid UTF-8".to_string(),
        })?;

        let sql = format!("SELECT ag_catalog.{}($1, $2, $3)", function);

        let mut tx = self.begin().await?;
        sqlx::query(&sql)
            .bind(&self.graph)
            .bind(label)
            .bind(path)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::BulkLoadFailed {
                file: file_name.clone(),
                reason: e.to_string(),
            })?;
        tx.commit().await?;

        debug!(label = %label, file = %file_name, "Bulk load committed");
        Ok(())
    }

    /// Registered labels of one kind (`v` or `e`) in registration order
    async fn labels(&self, kind: &str) -> Result<Vec<String>> {
        let mut tx = self.begin().await?;
        let labels: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT l.name::text
            FROM ag_catalog.ag_label l
            JOIN ag_catalog.ag_graph g ON g.graphid = l.graph
            WHERE g.name = $1
              AND l.kind = $2::"char"
              AND l.name NOT IN ('_ag_label_vertex', '_ag_label_edge')
            ORDER BY l.id
            "#,
        )
        .bind(&self.graph)
        .bind(kind)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(labels)
    }

    async fn count_label_rows(&self, labels: Vec<String>) -> Result<Vec<(String, u64)>> {
        let mut tx = self.begin().await?;
        let mut counts = Vec::with_capacity(labels.len());
        for label in labels {
            validate_identifier(&label)?;
            let sql = format!(r#"SELECT count(*) FROM "{}"."{}""#, self.graph, label);
            let count: i64 = sqlx::query_scalar(&sql).fetch_one(&mut *tx).await?;
            counts.push((label, count.max(0) as u64));
        }
        tx.commit().await?;
        Ok(counts)
    }

    fn upsert_sql(&self) -> String {
        format!(
            r#"
            INSERT INTO {table} (id, node_name, node_label, embedding)
            VALUES ($1, $2, $3, $4::real[]::vector)
            ON CONFLICT (id) DO UPDATE SET
                node_name = EXCLUDED.node_name,
                node_label = EXCLUDED.node_label,
                embedding = EXCLUDED.embedding,
                updated_at = now()
            "#,
            table = self.table
        )
    }

    fn nearest_sql(&self) -> String {
        format!(
            r#"
            SELECT id, node_name, node_label, (embedding {op} $1::real[]::vector)::float8 AS distance
            FROM {table}
            WHERE embedding IS NOT NULL
            ORDER BY embedding {op} $1::real[]::vector, seq
            LIMIT $2
            "#,
            op = self.metric.operator(),
            table = self.table
        )
    }
}

#[async_trait]
impl GraphStore for AgeGraphStore {
    fn graph_name(&self) -> &str {
        &self.graph
    }

    // ========== Graph Lifecycle ==========

    async fn graph_exists(&self) -> Result<bool> {
        let mut tx = self.begin().await?;
        let count: i64 =
            sqlx::query_scalar("SELECT count(*) FROM ag_catalog.ag_graph WHERE name = $1")
                .bind(&self.graph)
                .fetch_one(&mut *tx)
                .await?;
        tx.commit().await?;
        Ok(count > 0)
    }

    async fn create_graph(&self) -> Result<()> {
        let mut tx = self.begin().await?;
        sqlx::query("SELECT ag_catalog.create_graph($1)")
            .bind(&self.graph)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(graph = %self.graph, "Graph created");
        Ok(())
    }

    async fn drop_graph(&self) -> Result<()> {
        let mut tx = self.begin().await?;
        sqlx::query("SELECT ag_catalog.drop_graph($1, true)")
            .bind(&self.graph)
            .execute(&mut *tx)
            .await
            .map_err(|e| self.graph_error(e))?;
        tx.commit().await?;
        debug!(graph = %self.graph, "Graph dropped");
        Ok(())
    }

    // ========== Schema ==========

    async fn create_vertex_label(&self, label: &str) -> Result<()> {
        self.create_label("create_vlabel", label).await
    }

    async fn create_edge_label(&self, label: &str) -> Result<()> {
        self.create_label("create_elabel", label).await
    }

    async fn vertex_labels(&self) -> Result<Vec<String>> {
        self.labels("v").await
    }

    // ========== Bulk Load ==========

    async fn load_vertices(&self, label: &str, file: &Path) -> Result<()> {
        self.bulk_load("load_labels_from_file", label, file).await
    }

    async fn load_edges(&self, label: &str, file: &Path) -> Result<()> {
        self.bulk_load("load_edges_from_file", label, file).await
    }

    // ========== Queries ==========

    async fn nodes_with_label(&self, label: &str) -> Result<Vec<NodeSummary>> {
        let label = validate_identifier(label)?;
        let sql = format!(
            "SELECT * FROM ag_catalog.cypher('{}', $$ MATCH (v:{}) RETURN v.id, v.name $$) \
             AS (id agtype, name agtype)",
            self.graph, label
        );

        let mut tx = self.begin().await?;
        let rows: Vec<(Option<Agtype>, Option<Agtype>)> = sqlx::query_as(&sql)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| self.graph_error(e))?;
        tx.commit().await?;

        let mut nodes = Vec::with_capacity(rows.len());
        for (id, name) in rows {
            let id = match id {
                Some(raw) => scalar_text(raw.as_str())?,
                None => None,
            };
            let Some(id) = id else {
                warn!(label = %label, "Skipping node without id");
                continue;
            };
            let name = match name {
                Some(raw) => scalar_text(raw.as_str())?,
                None => None,
            };
            nodes.push(NodeSummary {
                id,
                name,
                label: label.to_string(),
            });
        }
        Ok(nodes)
    }

    async fn run_pattern(&self, query: &PatternQuery, entity_id: &str) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT * FROM ag_catalog.cypher('{}', $$ {} $$, $1) AS (node agtype)",
            self.graph,
            query.cypher()
        );
        let mut params = Map::new();
        params.insert(ENTITY_ID_PARAM.to_string(), Value::String(entity_id.to_string()));
        let params = Agtype::from_json(&Value::Object(params));

        let mut tx = self.begin().await?;
        let rows: Vec<Option<Agtype>> = sqlx::query_scalar(&sql)
            .bind(params)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| self.graph_error(e))?;
        tx.commit().await?;

        debug!(query = query.name, entity_id, rows = rows.len(), "Pattern query executed");
        Ok(rows.into_iter().flatten().map(Agtype::into_inner).collect())
    }

    async fn stats(&self) -> Result<GraphStats> {
        if !self.graph_exists().await? {
            return Err(Error::GraphNotFound(self.graph.clone()));
        }
        let nodes = self.count_label_rows(self.labels("v").await?).await?;
        let edges = self.count_label_rows(self.labels("e").await?).await?;
        Ok(GraphStats { nodes, edges })
    }
}

#[async_trait]
impl VectorIndex for AgeGraphStore {
    async fn ensure_index(&self, dimensions: usize) -> Result<()> {
        migrations::run_migrations(&self.pool, &self.table, dimensions).await?;

        if let Some(actual) = migrations::vector_dimensions(&self.pool, &self.table).await? {
            if actual != dimensions {
                return Err(Error::IndexDimensionMismatch {
                    table: actual,
                    requested: dimensions,
                });
            }
        }
        Ok(())
    }

    async fn upsert_batch(&self, records: &[EmbeddingRecord]) -> Result<BatchOutcome> {
        let sql = self.upsert_sql();
        let mut outcome = BatchOutcome::default();

        let mut tx = self.begin().await?;
        for record in records {
            let mut savepoint = tx.begin().await?;
            let result = sqlx::query(&sql)
                .bind(&record.id)
                .bind(&record.node_name)
                .bind(&record.node_label)
                .bind(&record.embedding)
                .execute(&mut *savepoint)
                .await;

            match result {
                Ok(_) => {
                    savepoint.commit().await?;
                    outcome.written += 1;
                }
                Err(e) => {
                    savepoint.rollback().await?;
                    let error = Self::index_error(e);
                    if matches!(error, Error::IndexNotInitialised) {
                        return Err(error);
                    }
                    warn!(node_id = %record.id, error = %error, "Failed to upsert embedding");
                    outcome.failed.push(record.id.clone());
                }
            }
        }

        tx.commit()
            .await
            .map_err(|e| Error::BatchCommitFailed(e.to_string()))?;
        Ok(outcome)
    }

    async fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<NearestMatch>> {
        let mut tx = self.begin().await?;
        let rows: Vec<(String, Option<String>, Option<String>, f64)> =
            sqlx::query_as(&self.nearest_sql())
                .bind(query)
                .bind(limit as i64)
                .fetch_all(&mut *tx)
                .await
                .map_err(Self::index_error)?;
        tx.commit().await?;

        Ok(rows
            .into_iter()
            .map(|(id, node_name, node_label, distance)| NearestMatch {
                id,
                node_name: node_name.unwrap_or_default(),
                node_label: node_label.unwrap_or_default(),
                distance,
            })
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        let sql = format!("SELECT count(*) FROM {}", self.table);
        let mut tx = self.begin().await?;
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&mut *tx)
            .await
            .map_err(Self::index_error)?;
        tx.commit().await?;
        Ok(count.max(0) as u64)
    }
}
