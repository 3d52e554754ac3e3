//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::graph::{DistanceMetric, validate_identifier};

/// Pharmkg configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseSettings,
    pub graph: GraphConfig,
    pub loader: LoaderConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Connection URL; falls back to PHARMKG_DATABASE_URL / DATABASE_URL
    pub url: Option<String>,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    /// Run `LOAD 'age'` on every new connection
    pub load_age: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub nodes_dir: PathBuf,
    pub edges_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub table: String,
    pub dimensions: usize,
    pub batch_size: usize,
    /// Nearest-neighbour candidates fetched per resolution
    pub candidates: usize,
    pub metric: DistanceMetric,
    /// Reject the best match when it is farther than this
    pub max_distance: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Send `dimensions` with each request so the provider shortens vectors
    pub request_dimensions: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
            connect_timeout_secs: 30,
            load_age: true,
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            name: "fcsv".to_string(),
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            nodes_dir: PathBuf::from("/var/lib/postgresql/csv/nodes"),
            edges_dir: PathBuf::from("/var/lib/postgresql/csv/edges"),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            table: "document_vectors".to_string(),
            dimensions: 1536,
            batch_size: 100,
            candidates: 5,
            metric: DistanceMetric::L2,
            max_distance: None,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 60,
            request_dimensions: false,
        }
    }
}

impl DatabaseSettings {
    /// Resolve the connection URL from the file or the environment
    pub fn resolved_url(&self) -> anyhow::Result<String> {
        self.url
            .clone()
            .or_else(|| env::var("PHARMKG_DATABASE_URL").ok())
            .or_else(|| env::var("DATABASE_URL").ok())
            .ok_or_else(|| {
                anyhow!("No database URL. Set database.url, PHARMKG_DATABASE_URL or DATABASE_URL.")
            })
    }
}

/// Mask all but the last four characters of a secret
fn redact(key: &str) -> String {
    let count = key.chars().count();
    if count <= 4 {
        return "***".to_string();
    }
    let suffix: String = key.chars().skip(count - 4).collect();
    format!("***{}", suffix)
}

impl EmbeddingConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("PHARMKG_EMBEDDING_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
            .ok())
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| opt.map(|key| redact(&key)))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "Embedding API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("PHARMKG_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("pharmkg")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.embedding.enforce_env_only()?;
        validate_identifier(&self.graph.name)
            .map_err(|e| anyhow!("graph.name: {}", e))?;
        validate_identifier(&self.index.table)
            .map_err(|e| anyhow!("index.table: {}", e))?;
        if self.index.batch_size == 0 {
            return Err(anyhow!("index.batch_size must be greater than 0"));
        }
        if self.index.candidates == 0 {
            return Err(anyhow!("index.candidates must be at least 1"));
        }
        if self.index.dimensions == 0 {
            return Err(anyhow!("index.dimensions must be greater than 0"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "database.url" => Ok(match &self.database.url {
                Some(_) => "(set in config file)".to_string(),
                None => "(not set - use PHARMKG_DATABASE_URL or DATABASE_URL env var)".to_string(),
            }),
            "database.max_connections" => Ok(self.database.max_connections.to_string()),
            "database.connect_timeout_secs" => Ok(self.database.connect_timeout_secs.to_string()),
            "database.load_age" => Ok(self.database.load_age.to_string()),

            "graph.name" => Ok(self.graph.name.clone()),

            "loader.nodes_dir" => Ok(self.loader.nodes_dir.display().to_string()),
            "loader.edges_dir" => Ok(self.loader.edges_dir.display().to_string()),

            "index.table" => Ok(self.index.table.clone()),
            "index.dimensions" => Ok(self.index.dimensions.to_string()),
            "index.batch_size" => Ok(self.index.batch_size.to_string()),
            "index.candidates" => Ok(self.index.candidates.to_string()),
            "index.metric" => Ok(self.index.metric.to_string()),
            "index.max_distance" => Ok(self
                .index
                .max_distance
                .map(|d| d.to_string())
                .unwrap_or_else(|| "(none)".to_string())),

            "embedding.model" => Ok(self.embedding.model.clone()),
            "embedding.base_url" => Ok(self.embedding.base_url.clone()),
            "embedding.timeout_secs" => Ok(self.embedding.timeout_secs.to_string()),
            "embedding.request_dimensions" => Ok(self.embedding.request_dimensions.to_string()),

            // API key (special handling - show redacted)
            "embedding.api_key" | "api_key" => match self.embedding.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => Ok(
                    "(not set - use PHARMKG_EMBEDDING_API_KEY or OPENAI_API_KEY env var)"
                        .to_string(),
                ),
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `pharmkg config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "database.url" => {
                self.database.url = Some(value.to_string());
            }
            "database.max_connections" => {
                self.database.max_connections = value
                    .parse()
                    .with_context(|| format!("Invalid max_connections value: {}", value))?;
            }
            "database.connect_timeout_secs" => {
                self.database.connect_timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid connect_timeout_secs value: {}", value))?;
            }
            "database.load_age" => {
                self.database.load_age = value
                    .parse()
                    .with_context(|| format!("Invalid load_age value: {}", value))?;
            }

            "graph.name" => {
                validate_identifier(value).map_err(|e| anyhow!("{}", e))?;
                self.graph.name = value.to_string();
            }

            "loader.nodes_dir" => {
                self.loader.nodes_dir = PathBuf::from(value);
            }
            "loader.edges_dir" => {
                self.loader.edges_dir = PathBuf::from(value);
            }

            "index.table" => {
                validate_identifier(value).map_err(|e| anyhow!("{}", e))?;
                self.index.table = value.to_string();
            }
            "index.dimensions" => {
                let dims: usize = value
                    .parse()
                    .with_context(|| format!("Invalid dimensions value: {}", value))?;
                if dims == 0 {
                    return Err(anyhow!("Dimensions must be greater than 0"));
                }
                self.index.dimensions = dims;
            }
            "index.batch_size" => {
                let size: usize = value
                    .parse()
                    .with_context(|| format!("Invalid batch_size value: {}", value))?;
                if size == 0 {
                    return Err(anyhow!("Batch size must be greater than 0"));
                }
                self.index.batch_size = size;
            }
            "index.candidates" => {
                let candidates: usize = value
                    .parse()
                    .with_context(|| format!("Invalid candidates value: {}", value))?;
                if candidates == 0 {
                    return Err(anyhow!("Candidates must be at least 1"));
                }
                self.index.candidates = candidates;
            }
            "index.metric" => {
                self.index.metric = DistanceMetric::parse(value).ok_or_else(|| {
                    anyhow!("Invalid metric: {}. Valid options: l2, cosine", value)
                })?;
            }
            "index.max_distance" => {
                if value.eq_ignore_ascii_case("none") || value.is_empty() {
                    self.index.max_distance = None;
                } else {
                    let max: f64 = value
                        .parse()
                        .with_context(|| format!("Invalid max_distance value: {}", value))?;
                    if max < 0.0 {
                        return Err(anyhow!("Max distance must be non-negative"));
                    }
                    self.index.max_distance = Some(max);
                }
            }

            "embedding.model" => {
                self.embedding.model = value.to_string();
            }
            "embedding.base_url" => {
                self.embedding.base_url = value.trim_end_matches('/').to_string();
            }
            "embedding.timeout_secs" => {
                self.embedding.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }
            "embedding.request_dimensions" => {
                self.embedding.request_dimensions = value
                    .parse()
                    .with_context(|| format!("Invalid request_dimensions value: {}", value))?;
            }

            // API key cannot be set via config
            "embedding.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the PHARMKG_EMBEDDING_API_KEY or OPENAI_API_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `pharmkg config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = vec![
            "database.url",
            "database.max_connections",
            "database.connect_timeout_secs",
            "database.load_age",
            "graph.name",
            "loader.nodes_dir",
            "loader.edges_dir",
            "index.table",
            "index.dimensions",
            "index.batch_size",
            "index.candidates",
            "index.metric",
            "index.max_distance",
            "embedding.model",
            "embedding.base_url",
            "embedding.timeout_secs",
            "embedding.request_dimensions",
            "embedding.api_key",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }
}
