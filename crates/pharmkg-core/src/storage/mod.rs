//! Storage backends
//!
//! - `database`: PostgreSQL pool with the graph extension session prelude
//! - `migrations`: versioned schema for the vector index table
//! - `age`: [`AgeGraphStore`], the PostgreSQL graph and vector store
//! - `memory`: [`MemoryGraphStore`], an in-process equivalent
//! - `bulk`: the CSV bulk-load format

pub mod age;
pub mod bulk;
pub mod database;
pub mod memory;
pub mod migrations;

pub use age::AgeGraphStore;
pub use database::{Database, DatabaseConfig, ExtensionStatus};
pub use memory::MemoryGraphStore;
pub use migrations::{MigrationStatus, migration_status, run_migrations};
