//! Pharmkg CLI - pharmaceutical knowledge graph loader and query tool

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use pharmkg_core::config::Config;
use pharmkg_core::embedding::{EmbeddingClient, EmbeddingService, SimpleEmbedder};
use pharmkg_core::graph::{GraphStats, GraphStore, VectorIndex};
use pharmkg_core::indexer::{EmbeddingIndexer, IndexReport};
use pharmkg_core::loader::{GraphLoader, GraphPreparation, RebuildReport};
use pharmkg_core::retrieval::{DrugLookups, DrugProfile, EntityRef, EntityResolver, ResolvedEntity};
use pharmkg_core::storage::{AgeGraphStore, Database, MemoryGraphStore, migration_status};
use serde_json::json;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "pharmkg")]
#[command(author, version, about = "Pharmaceutical knowledge graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use an in-memory graph and the local embedder instead of the database
    #[arg(long, global = true)]
    offline: bool,

    /// Directory of node CSV files (overrides loader.nodes_dir)
    #[arg(long, global = true)]
    nodes: Option<PathBuf>,

    /// Directory of edge CSV files (overrides loader.edges_dir)
    #[arg(long, global = true)]
    edges: Option<PathBuf>,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the graph from the CSV directories
    Load,

    /// Embed every named node into the vector index
    Index,

    /// Resolve free text to the nearest graph entity
    Resolve {
        /// Text to resolve
        text: String,
    },

    /// Resolve a drug and list its related entities
    Lookup {
        /// Drug name, or the drug id with --id
        text: String,
        /// Treat TEXT as a drug id and skip resolution
        #[arg(long)]
        id: bool,
    },

    /// Show node and edge counts per label
    Stats,

    /// Run health check
    Doctor,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Show the configuration file path
    Path,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "pharmkg={0},pharmkg_core={0}",
                    default_level
                ))
            }),
        )
        .init();

    if let Err(e) = run(cli).await {
        report_error(&e);
        std::process::exit(1);
    }
}

fn report_error(error: &anyhow::Error) {
    match error.downcast_ref::<pharmkg_core::Error>() {
        Some(core) => {
            eprintln!("Error [{}]: {}", core.code(), core);
            if let Some(suggestion) = core.suggestion() {
                eprintln!("  Try: {}", suggestion);
            }
        }
        None => eprintln!("Error: {:#}", error),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command,
        format,
        quiet,
        offline,
        nodes,
        edges,
    } = cli;

    let command = match command {
        Commands::Config { action } => return cmd_config(action, quiet),
        other => other,
    };

    let config = Config::load()?;
    let session = Session {
        nodes_dir: nodes.unwrap_or_else(|| config.loader.nodes_dir.clone()),
        edges_dir: edges.unwrap_or_else(|| config.loader.edges_dir.clone()),
        config,
        format,
        quiet,
        offline,
    };

    match command {
        Commands::Load => cmd_load(&session).await,
        Commands::Index => cmd_index(&session).await,
        Commands::Resolve { text } => cmd_resolve(&session, &text).await,
        Commands::Lookup { text, id } => cmd_lookup(&session, &text, id).await,
        Commands::Stats => cmd_stats(&session).await,
        Commands::Doctor => cmd_doctor(&session).await,
        Commands::Config { .. } => Ok(()),
    }
}

/// Everything a command needs to reach the graph, the index and the embedder
struct Session {
    config: Config,
    format: OutputFormat,
    quiet: bool,
    offline: bool,
    nodes_dir: PathBuf,
    edges_dir: PathBuf,
}

struct Stores {
    graph: Arc<dyn GraphStore>,
    index: Arc<dyn VectorIndex>,
}

impl Session {
    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Open the graph and the vector index
    ///
    /// Offline, the in-memory graph is rebuilt from the CSV directories
    /// and, when `index` is set, indexed with the local embedder.
    async fn open(&self, index: bool) -> anyhow::Result<Stores> {
        if self.offline {
            let store = Arc::new(
                MemoryGraphStore::new(&self.config.graph.name)
                    .with_metric(self.config.index.metric),
            );

            GraphLoader::new(store.clone())
                .rebuild(&self.nodes_dir, &self.edges_dir)
                .await?;
            if index {
                self.indexer(store.clone(), store.clone(), self.embedder()?)
                    .index_all_nodes()
                    .await?;
            }
            return Ok(Stores {
                graph: store.clone(),
                index: store,
            });
        }

        let db = Database::from_settings(&self.config.database).await?;
        let store = Arc::new(
            AgeGraphStore::new(db.pool().clone(), &self.config.graph.name)?
                .with_index(&self.config.index.table, self.config.index.metric)?,
        );
        Ok(Stores {
            graph: store.clone(),
            index: store,
        })
    }

    /// The embedder for commands that turn text into vectors
    ///
    /// Only these commands need an API key when running against the database.
    fn embedder(&self) -> anyhow::Result<Arc<dyn EmbeddingService>> {
        if self.offline {
            return Ok(Arc::new(SimpleEmbedder::default()));
        }

        let api_key = self.config.embedding.resolved_api_key()?.ok_or_else(|| {
            anyhow!("No embedding API key. Set PHARMKG_EMBEDDING_API_KEY or OPENAI_API_KEY.")
        })?;
        let client = EmbeddingClient::new(
            self.config.embedding.clone(),
            api_key,
            self.config.index.dimensions,
        )?;
        Ok(Arc::new(client))
    }

    fn indexer(
        &self,
        graph: Arc<dyn GraphStore>,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingService>,
    ) -> EmbeddingIndexer {
        EmbeddingIndexer::new(graph, index, embedder)
            .with_batch_size(self.config.index.batch_size)
    }

    fn print_json(&self, value: &serde_json::Value) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

async fn cmd_load(session: &Session) -> anyhow::Result<()> {
    let report = if session.offline {
        let store = Arc::new(MemoryGraphStore::new(&session.config.graph.name));
        GraphLoader::new(store)
            .rebuild(&session.nodes_dir, &session.edges_dir)
            .await?
    } else {
        let db = Database::from_settings(&session.config.database).await?;
        let store = Arc::new(AgeGraphStore::new(db.pool().clone(), &session.config.graph.name)?);
        GraphLoader::new(store)
            .rebuild(&session.nodes_dir, &session.edges_dir)
            .await?
    };

    if session.json() {
        return session.print_json(&serde_json::to_value(&report)?);
    }
    if !session.quiet {
        print_rebuild_report(&session.config.graph.name, &report);
    }
    Ok(())
}

fn print_rebuild_report(graph: &str, report: &RebuildReport) {
    match report.preparation {
        GraphPreparation::Created => println!("Created new graph '{}'", graph),
        GraphPreparation::Recreated => println!("Recreated graph '{}'", graph),
    }
    println!(
        "Labels: {} registered, {} already present, {} failed",
        report.schema.registered.len(),
        report.schema.already_present.len(),
        report.schema.failed.len()
    );
    for (label, error) in &report.schema.failed {
        println!("  [!!] {}: {}", label, error);
    }

    for (kind, load) in [("Nodes", &report.nodes), ("Edges", &report.edges)] {
        println!("{}: {} files loaded, {} failed", kind, load.loaded.len(), load.failed.len());
        for failure in &load.failed {
            println!("  [!!] {}: {}", failure.file.display(), failure.error);
        }
    }

    println!();
    print_stats(&report.stats);
}

fn print_stats(stats: &GraphStats) {
    println!("Vertex counts by label:");
    for (label, count) in &stats.nodes {
        println!("  {}: {}", label, count);
    }
    println!("Edge counts by label:");
    for (label, count) in &stats.edges {
        println!("  {}: {}", label, count);
    }
    println!(
        "Total: {} nodes, {} edges",
        stats.total_nodes(),
        stats.total_edges()
    );
}

async fn cmd_index(session: &Session) -> anyhow::Result<()> {
    let stores = session.open(false).await?;
    let report = session
        .indexer(stores.graph, stores.index, session.embedder()?)
        .index_all_nodes()
        .await?;

    if session.json() {
        return session.print_json(&serde_json::to_value(&report)?);
    }
    if !session.quiet {
        print_index_report(&report);
    }
    Ok(())
}

fn print_index_report(report: &IndexReport) {
    println!("Run: {}", report.run_id);
    println!("  Nodes: {} ({} without name)", report.total_nodes, report.skipped_unnamed);
    println!("  Embedded: {}", report.embedded);
    println!("  Failed: {}", report.failed.len());
    println!(
        "  Batches: {} ({} failed)",
        report.batches, report.failed_batches
    );
    let elapsed = report.finished_at - report.started_at;
    println!("  Duration: {:.1}s", elapsed.num_milliseconds() as f64 / 1000.0);
}

async fn cmd_resolve(session: &Session, text: &str) -> anyhow::Result<()> {
    let stores = session.open(true).await?;
    let resolver =
        EntityResolver::from_config(session.embedder()?, stores.index, &session.config.index);
    let resolved = resolver.try_resolve(text).await?;

    if session.json() {
        return session.print_json(&serde_json::to_value(&resolved)?);
    }
    match resolved {
        Some(entity) => print_resolved(&entity),
        None => println!("No match for '{}'", text),
    }
    Ok(())
}

fn print_resolved(entity: &ResolvedEntity) {
    println!(
        "{} ({}, {}) distance {:.4}",
        entity.name, entity.label, entity.id, entity.distance
    );
}

async fn cmd_lookup(session: &Session, text: &str, is_id: bool) -> anyhow::Result<()> {
    let stores = session.open(!is_id).await?;

    let (drug_id, resolved) = if is_id {
        (text.to_string(), None)
    } else {
        let resolver =
            EntityResolver::from_config(session.embedder()?, stores.index, &session.config.index);
        let Some(entity) = resolver.try_resolve(text).await? else {
            if session.json() {
                return session.print_json(&json!({ "query": text, "entity": null }));
            }
            println!("No match for '{}'", text);
            return Ok(());
        };
        if entity.label != "Drug" {
            warn!(label = %entity.label, id = %entity.id, "Resolved entity is not a drug");
        }
        (entity.id.clone(), Some(entity))
    };

    info!(drug_id = %drug_id, "Running lookups");
    let profile = DrugLookups::new(stores.graph)?.profile(&drug_id).await;

    if session.json() {
        return session.print_json(&json!({
            "query": text,
            "entity": resolved,
            "profile": profile,
        }));
    }

    if let Some(entity) = &resolved {
        print_resolved(entity);
    } else {
        println!("Drug {}", drug_id);
    }
    print_profile(&profile);
    Ok(())
}

fn print_profile(profile: &DrugProfile) {
    let sections: [(&str, &Option<Vec<EntityRef>>); 6] = [
        ("Generics", &profile.generics),
        ("Active ingredients", &profile.active_ingredients),
        ("Excipients", &profile.excipients),
        ("Indications", &profile.indications),
        ("Contraindications", &profile.contraindications),
        ("Routes", &profile.routes),
    ];

    for (title, entities) in sections {
        match entities {
            None => println!("{}: (lookup failed)", title),
            Some(list) if list.is_empty() => println!("{}: (none)", title),
            Some(list) => {
                println!("{}:", title);
                for entity in list {
                    println!("  - {} ({})", entity.name, entity.id);
                }
            }
        }
    }
}

async fn cmd_stats(session: &Session) -> anyhow::Result<()> {
    let stores = session.open(false).await?;
    let stats = stores.graph.stats().await?;

    if session.json() {
        return session.print_json(&serde_json::to_value(&stats)?);
    }
    print_stats(&stats);
    Ok(())
}

async fn cmd_doctor(session: &Session) -> anyhow::Result<()> {
    let quiet = session.quiet;
    let config = &session.config;

    if !quiet {
        println!("Pharmkg Health Check");
        println!("====================");
        println!();
        println!("[OK] Configuration: Valid");
    }

    let mut all_ok = true;

    // Check embedding API key
    match config.embedding.resolved_api_key() {
        Ok(Some(_)) => {
            if !quiet {
                let redacted = config.embedding.redacted_api_key()?.unwrap_or_default();
                println!("[OK] Embedding API Key: Configured ({})", redacted);
            }
        }
        Ok(None) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Embedding API Key: Not configured");
                println!("     Set PHARMKG_EMBEDDING_API_KEY or OPENAI_API_KEY environment variable");
            }
        }
        Err(e) => {
            all_ok = false;
            if !quiet {
                println!("[!!] Embedding API Key: Error - {}", e);
            }
        }
    }

    // Check config file location
    if !quiet {
        match Config::config_path() {
            Ok(path) if path.exists() => println!("[OK] Config file: {}", path.display()),
            Ok(path) => println!("[--] Config file: {} (using defaults)", path.display()),
            Err(e) => println!("[!!] Config file: Error - {}", e),
        }
    }

    // Check input directories
    for (name, dir) in [("Nodes dir", &session.nodes_dir), ("Edges dir", &session.edges_dir)] {
        if dir.is_dir() {
            if !quiet {
                println!("[OK] {}: {}", name, dir.display());
            }
        } else {
            all_ok = false;
            if !quiet {
                println!("[!!] {}: {} not found", name, dir.display());
            }
        }
    }

    // Check database
    if !session.offline {
        all_ok &= check_database(session).await;
    }

    if !quiet {
        println!();
        if all_ok {
            println!("All checks passed!");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }

    Ok(())
}

async fn check_database(session: &Session) -> bool {
    let quiet = session.quiet;
    let config = &session.config;

    let db = match Database::from_settings(&config.database).await {
        Ok(db) => db,
        Err(e) => {
            if !quiet {
                println!("[!!] Database: Failed to connect - {:#}", e);
            }
            return false;
        }
    };

    if let Err(e) = db.health_check().await {
        if !quiet {
            println!("[!!] Database: Health check failed - {:#}", e);
        }
        return false;
    }
    if !quiet {
        println!("[OK] Database: Connected");
    }

    let mut ok = true;
    match db.extension_status().await {
        Ok(status) => {
            for (name, version) in [("age", &status.age), ("vector", &status.vector)] {
                match version {
                    Some(v) => {
                        if !quiet {
                            println!("[OK] Extension {}: {}", name, v);
                        }
                    }
                    None => {
                        ok = false;
                        if !quiet {
                            println!("[!!] Extension {}: Not installed", name);
                        }
                    }
                }
            }
        }
        Err(e) => {
            ok = false;
            if !quiet {
                println!("[!!] Extensions: Check failed - {:#}", e);
            }
        }
    }

    let store = AgeGraphStore::new(db.pool().clone(), &config.graph.name)
        .context("Invalid graph name");
    match store {
        Ok(store) => match store.graph_exists().await {
            Ok(true) => {
                if !quiet {
                    println!("[OK] Graph: '{}' exists", config.graph.name);
                }
            }
            Ok(false) => {
                ok = false;
                if !quiet {
                    println!("[!!] Graph: '{}' not found (run `pharmkg load`)", config.graph.name);
                }
            }
            Err(e) => {
                ok = false;
                if !quiet {
                    println!("[!!] Graph: Check failed - {}", e);
                }
            }
        },
        Err(e) => {
            ok = false;
            if !quiet {
                println!("[!!] Graph: {:#}", e);
            }
        }
    }

    match migration_status(db.pool(), &config.index.table).await {
        Ok(status) if status.needs_migration => {
            ok = false;
            if !quiet {
                println!(
                    "[!!] Index: Migrations pending (v{} -> v{}), run `pharmkg index`",
                    status.current_version, status.target_version
                );
            }
        }
        Ok(status) => {
            if !quiet {
                println!(
                    "[OK] Index: '{}' schema v{}",
                    config.index.table, status.current_version
                );
            }
        }
        Err(e) => {
            ok = false;
            if !quiet {
                println!("[!!] Index: Migration check failed - {}", e);
            }
        }
    }

    db.close().await;
    ok
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            for (key, value) in config.list()? {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
