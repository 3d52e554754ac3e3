//! Graph domain: schema, pattern queries, serialized values and store traits
//!
//! - `schema`: the fixed node and edge labels
//! - `pattern`: compile-time parameterised path queries
//! - `agtype`: parsing of serialized graph values and key-path navigation
//! - `store`: the [`GraphStore`] and [`VectorIndex`] traits

pub mod agtype;
pub mod pattern;
pub mod schema;
pub mod store;

pub use agtype::{Agtype, KeyPath, parse_payload, scalar_text, strip_type_annotation};
pub use pattern::{Direction, Hop, PatternQuery};
pub use schema::{EdgeLabel, NodeLabel, validate_identifier};
pub use store::{
    BatchOutcome, DistanceMetric, EmbeddingRecord, GraphStats, GraphStore, NearestMatch,
    NodeSummary, VectorIndex,
};
