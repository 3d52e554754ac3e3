//! Error types for pharmkg

use thiserror::Error;

/// Result type alias using pharmkg's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Pharmkg error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Network and embedding errors (E100-E199)
    #[error("Network error: {0}. Check that the embedding service is reachable.")]
    NetworkError(#[from] reqwest::Error),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Embedding service rate limited the request (retry after {0} seconds)")]
    RateLimited(u64),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // Store errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Graph '{0}' does not exist. Run `pharmkg load` to build it.")]
    GraphNotFound(String),

    #[error("Label '{0}' already exists")]
    LabelAlreadyExists(String),

    #[error("Invalid identifier '{0}': only ASCII letters, digits and '_' are allowed")]
    InvalidIdentifier(String),

    #[error("Bulk load of '{file}' failed: {reason}")]
    BulkLoadFailed { file: String, reason: String },

    #[error("Batch commit failed: {0}")]
    BatchCommitFailed(String),

    #[error("Vector index is not initialised. Run `pharmkg index` first.")]
    IndexNotInitialised,

    #[error("Vector index holds {table}-dimensional vectors, but {requested} were requested")]
    IndexDimensionMismatch { table: usize, requested: usize },

    // Projection errors (E500-E599)
    #[error("Malformed graph payload: {0}")]
    MalformedPayload(String),

    #[error("Key '{missing}' not found while walking path {path}")]
    KeyPathNotFound { path: String, missing: String },

    #[error("Invalid projection: {0}")]
    InvalidProjection(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Directory '{0}' not found")]
    DirectoryNotFound(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::NetworkError(_) => "E100",
            Self::EmbeddingFailed(_) => "E101",
            Self::RateLimited(_) => "E102",
            Self::DimensionMismatch { .. } => "E103",
            Self::DatabaseError(_) => "E400",
            Self::GraphNotFound(_) => "E401",
            Self::LabelAlreadyExists(_) => "E402",
            Self::InvalidIdentifier(_) => "E404",
            Self::BulkLoadFailed { .. } => "E405",
            Self::BatchCommitFailed(_) => "E406",
            Self::IndexNotInitialised => "E407",
            Self::IndexDimensionMismatch { .. } => "E408",
            Self::MalformedPayload(_) => "E500",
            Self::KeyPathNotFound { .. } => "E501",
            Self::InvalidProjection(_) => "E502",
            Self::InvalidInput(_) => "E800",
            Self::DirectoryNotFound(_) => "E801",
            Self::Csv(_) => "E802",
            Self::Json(_) => "E803",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NetworkError(_) => Some("Check the embedding.base_url setting".to_string()),
            Self::EmbeddingFailed(_) => {
                Some("Check PHARMKG_EMBEDDING_API_KEY or OPENAI_API_KEY".to_string())
            }
            Self::DimensionMismatch { actual, .. } => {
                Some(format!("pharmkg config set index.dimensions {}", actual))
            }
            Self::IndexDimensionMismatch { table, requested } => Some(format!(
                "pharmkg config set index.dimensions {}, or drop the index table to rebuild it \
                 with {} dimensions",
                table, requested
            )),
            Self::GraphNotFound(_) => Some("pharmkg load".to_string()),
            Self::IndexNotInitialised => Some("pharmkg index".to_string()),
            Self::DatabaseError(_) => Some("pharmkg doctor".to_string()),
            Self::DirectoryNotFound(_) => {
                Some("Pass --nodes/--edges or set loader.nodes_dir/loader.edges_dir".to_string())
            }
            _ => None,
        }
    }

    /// Whether this error reports an object that is already present.
    ///
    /// Label registration treats these as success.
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::LabelAlreadyExists(_) => true,
            Self::DatabaseError(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("42710") | Some("42P06") | Some("42P07"))
                    || db.message().contains("already exists")
            }
            _ => false,
        }
    }
}
