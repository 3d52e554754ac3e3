//! Versioned schema for the vector index table
//!
//! The index table name and vector width are configurable, so migrations are
//! rendered per table and tracked per table in `_pharmkg_migrations`.

use sqlx::{Executor, PgPool};

use crate::error::{Error, Result};
use crate::graph::validate_identifier;

/// Current schema version
pub const CURRENT_VERSION: i32 = 3;

const MIGRATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS _pharmkg_migrations (
    target TEXT NOT NULL,
    version INTEGER NOT NULL,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (target, version)
);
"#;

/// v1: vector extension and the index table
fn migration_v1(table: &str, dimensions: usize) -> String {
    format!(
        r#"
CREATE EXTENSION IF NOT EXISTS vector;

CREATE TABLE IF NOT EXISTS {table} (
    id TEXT PRIMARY KEY,
    node_name TEXT,
    node_label TEXT,
    embedding vector({dimensions})
);
"#
    )
}

/// v2: insertion order and update tracking
fn migration_v2(table: &str) -> String {
    format!(
        r#"
ALTER TABLE {table} ADD COLUMN IF NOT EXISTS seq BIGSERIAL;
ALTER TABLE {table} ADD COLUMN IF NOT EXISTS updated_at TIMESTAMPTZ NOT NULL DEFAULT now();
"#
    )
}

/// v3: lookups by source label
fn migration_v3(table: &str) -> String {
    format!("CREATE INDEX IF NOT EXISTS idx_{table}_label ON {table}(node_label);")
}

async fn ensure_migrations_table(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(MIGRATIONS_TABLE).execute(pool).await?;
    Ok(())
}

async fn get_current_version(pool: &PgPool, table: &str) -> Result<i32> {
    ensure_migrations_table(pool).await?;

    let version: Option<i32> =
        sqlx::query_scalar("SELECT MAX(version) FROM _pharmkg_migrations WHERE target = $1")
            .bind(table)
            .fetch_one(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn apply(pool: &PgPool, table: &str, version: i32, sql: &str) -> Result<()> {
    let mut tx = pool.begin().await?;
    (&mut *tx).execute(sqlx::raw_sql(sql)).await?;
    sqlx::query("INSERT INTO _pharmkg_migrations (target, version) VALUES ($1, $2)")
        .bind(table)
        .bind(version)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

/// Bring the index table up to [`CURRENT_VERSION`]
pub async fn run_migrations(pool: &PgPool, table: &str, dimensions: usize) -> Result<()> {
    let table = validate_identifier(table)?;
    if dimensions == 0 {
        return Err(Error::InvalidInput("vector dimensions must be positive".into()));
    }

    let current_version = get_current_version(pool, table).await?;

    tracing::info!(
        table,
        current_version,
        target_version = CURRENT_VERSION,
        "Checking index migrations"
    );

    if current_version >= CURRENT_VERSION {
        tracing::debug!(table, "Index table is up to date");
        return Ok(());
    }

    if current_version < 1 {
        tracing::info!(table, dimensions, "Applying migration v1: Index table");
        apply(pool, table, 1, &migration_v1(table, dimensions)).await?;
    }

    if current_version < 2 {
        tracing::info!(table, "Applying migration v2: Insertion order");
        apply(pool, table, 2, &migration_v2(table)).await?;
    }

    if current_version < 3 {
        tracing::info!(table, "Applying migration v3: Label index");
        apply(pool, table, 3, &migration_v3(table)).await?;
    }

    tracing::info!(table, "Index migrations completed");
    Ok(())
}

/// Declared width of the `embedding` column, if the table exists
pub async fn vector_dimensions(pool: &PgPool, table: &str) -> Result<Option<usize>> {
    let table = validate_identifier(table)?;
    let typmod: Option<i32> = sqlx::query_scalar(
        r#"
        SELECT a.atttypmod
        FROM pg_attribute a
        JOIN pg_class c ON c.oid = a.attrelid
        WHERE c.relname = $1 AND a.attname = 'embedding' AND NOT a.attisdropped
        LIMIT 1
        "#,
    )
    .bind(table)
    .fetch_optional(pool)
    .await?;

    Ok(typmod.filter(|t| *t > 0).map(|t| t as usize))
}

/// Migration status for one index table
pub async fn migration_status(pool: &PgPool, table: &str) -> Result<MigrationStatus> {
    let table = validate_identifier(table)?;
    let current_version = get_current_version(pool, table).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}

/// Migration status information
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    /// Current schema version of the table
    pub current_version: i32,
    /// Target schema version (latest)
    pub target_version: i32,
    /// Whether migrations need to be run
    pub needs_migration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v1_renders_table_and_width() {
        let sql = migration_v1("document_vectors", 1536);
        assert!(sql.contains("CREATE EXTENSION IF NOT EXISTS vector"));
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS document_vectors"));
        assert!(sql.contains("id TEXT PRIMARY KEY"));
        assert!(sql.contains("embedding vector(1536)"));
    }

    #[test]
    fn test_v2_adds_insertion_order() {
        let sql = migration_v2("document_vectors");
        assert!(sql.contains("ADD COLUMN IF NOT EXISTS seq BIGSERIAL"));
    }

    #[test]
    fn test_v3_index_name_is_per_table() {
        assert_eq!(
            migration_v3("vecs"),
            "CREATE INDEX IF NOT EXISTS idx_vecs_label ON vecs(node_label);"
        );
    }
}
