//! Palimpsest CLI
//!
//! Offline administration for the per-project memory engine: config
//! scaffolding, ad hoc codebase indexing and normalization runs, database
//! backups, and health/stats reporting. Talks to `palimpsest-core`
//! directly — it never goes through the MCP server.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use directories::ProjectDirs;

use palimpsest_core::config::{self, Settings};
use palimpsest_core::embeddings::{EmbeddingCache, EmbeddingService, LocalFallbackProvider, VoyageProvider};
use palimpsest_core::memory::{is_valid_project_id, MemoryManager, MemoryType};
use palimpsest_core::normalize::Normalizer;
#[cfg(feature = "parser")]
use palimpsest_core::parser::Indexer;
use palimpsest_core::storage::{Filter, GraphStoreAdapter, SqliteGraphStore, SqliteVectorStore, VectorStoreAdapter};

#[derive(Parser)]
#[command(name = "palimpsest")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the palimpsest per-project memory engine")]
struct Cli {
    /// Project namespace; required by every command except init-config
    #[arg(long, global = true)]
    project_id: Option<String>,

    /// Path to a TOML config file; defaults to the platform config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config file to the platform config directory
    InitConfig,

    /// Open the vector and graph SQLite databases and apply schema migrations
    InitSchema,

    /// Check that the vector and graph SQLite databases are reachable
    CheckDb,

    /// Scan a file or directory and persist extracted code entities
    Index {
        /// File or directory to scan
        path: PathBuf,
        /// Bypass the unchanged-content-hash skip
        #[arg(long)]
        force: bool,
    },

    /// Run the normalization pipeline
    Normalize {
        /// Phases to run, in order (defaults to all seven)
        #[arg(long, value_delimiter = ',')]
        phases: Option<Vec<String>>,
        /// Run without swapping live collections
        #[arg(long)]
        dry_run: bool,
    },

    /// Back up the vector and graph SQLite databases
    Backup {
        /// Output directory for the backup files
        output: PathBuf,
    },

    /// Show per-type memory counts
    Stats,

    /// Check vector/graph store reachability
    Health,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new()?;

    match cli.command {
        Commands::InitConfig => run_init_config(cli.config),
        Commands::InitSchema => runtime.block_on(run_init_schema(require_project_id(cli.project_id)?, cli.config)),
        Commands::CheckDb => runtime.block_on(run_check_db(require_project_id(cli.project_id)?, cli.config)),
        Commands::Index { path, force } => {
            runtime.block_on(run_index(require_project_id(cli.project_id)?, cli.config, path, force))
        }
        Commands::Normalize { phases, dry_run } => {
            runtime.block_on(run_normalize(require_project_id(cli.project_id)?, cli.config, phases, dry_run))
        }
        Commands::Backup { output } => run_backup(require_project_id(cli.project_id)?, cli.config, output),
        Commands::Stats => runtime.block_on(run_stats(require_project_id(cli.project_id)?, cli.config)),
        Commands::Health => runtime.block_on(run_health(require_project_id(cli.project_id)?, cli.config)),
    }
}

fn require_project_id(project_id: Option<String>) -> anyhow::Result<String> {
    let id = project_id.ok_or_else(|| anyhow::anyhow!("--project-id is required for this command"))?;
    if !is_valid_project_id(&id) {
        anyhow::bail!("invalid --project-id '{id}': must start alphanumeric, <=64 chars, alphanumeric/_/- only");
    }
    Ok(id)
}

fn load_settings(config_path: Option<PathBuf>) -> anyhow::Result<Settings> {
    Ok(config::load(config_path.as_deref())?)
}

fn run_init_config(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match config_path {
        Some(p) => p,
        None => config::default_config_path().ok_or_else(|| anyhow::anyhow!("could not determine default config path"))?,
    };
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    config::save(&path, &Settings::default())?;
    println!("{} {}", "Wrote default config to".green(), path.display());
    Ok(())
}

struct Stores {
    vectors: Arc<dyn VectorStoreAdapter>,
    graph: Arc<dyn GraphStoreAdapter>,
}

fn open_stores(settings: &Settings, project_id: &str) -> anyhow::Result<Stores> {
    let vectors: Arc<dyn VectorStoreAdapter> =
        Arc::new(SqliteVectorStore::open(std::path::Path::new(&settings.qdrant.sqlite_path), project_id.to_string())?);
    let graph: Arc<dyn GraphStoreAdapter> = Arc::new(SqliteGraphStore::open(std::path::Path::new(&settings.neo4j.sqlite_path))?);
    Ok(Stores { vectors, graph })
}

async fn run_init_schema(project_id: String, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = load_settings(config_path)?;
    let stores = open_stores(&settings, &project_id)?;
    stores.vectors.initialize_collections().await?;
    stores.graph.initialize_schema().await?;
    println!("{}", "Vector and graph schemas initialized".green());
    Ok(())
}

async fn run_check_db(project_id: String, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = load_settings(config_path)?;
    let stores = open_stores(&settings, &project_id)?;

    print!("{} ", "Vector store:".white().bold());
    match stores.vectors.health_check().await {
        Ok(()) => println!("{}", "OK".green()),
        Err(e) => println!("{} ({e})", "FAILED".red()),
    }

    print!("{} ", "Graph store:".white().bold());
    match stores.graph.health_check().await {
        Ok(()) => println!("{}", "OK".green()),
        Err(e) => println!("{} ({e})", "FAILED".red()),
    }
    Ok(())
}

async fn build_embeddings(settings: &Settings) -> anyhow::Result<Arc<EmbeddingService>> {
    let cache = Arc::new(EmbeddingCache::open(
        std::path::Path::new("embedding_cache.db"),
        settings.cache.max_size,
        settings.cache.ttl_days,
    )?);
    let primary = Arc::new(VoyageProvider::new(settings.voyage.api_key.expose().clone(), settings.voyage.model.clone()));
    let fallback = Some(Arc::new(LocalFallbackProvider) as Arc<dyn palimpsest_core::embeddings::EmbeddingProvider>);
    Ok(Arc::new(EmbeddingService::new(primary, fallback, cache)))
}

#[cfg(feature = "parser")]
async fn run_index(project_id: String, config_path: Option<PathBuf>, path: PathBuf, force: bool) -> anyhow::Result<()> {
    let settings = load_settings(config_path)?;
    let stores = open_stores(&settings, &project_id)?;
    let embeddings = build_embeddings(&settings).await?;
    let manager = Arc::new(MemoryManager::new(stores.vectors.clone(), stores.graph.clone(), embeddings, project_id.clone()));
    let indexer = Indexer::new(manager, stores.vectors.clone(), project_id);

    println!("{} {}", "Indexing".cyan().bold(), path.display());
    let summary = indexer.index_path(&path, force).await?;

    println!("{}: {}", "Files scanned".white(), summary.files_scanned);
    println!("{}: {}", "Files indexed".white(), summary.files_indexed);
    println!("{}: {}", "Skipped (unchanged)".white(), summary.files_skipped_unchanged);
    println!("{}: {}", "Unsupported".white(), summary.files_unsupported);
    println!("{}: {}", "Memories created".white(), summary.memories_created);
    if !summary.errors.is_empty() {
        println!("{}", "Errors:".red().bold());
        for err in &summary.errors {
            println!("  {err}");
        }
    }
    Ok(())
}

#[cfg(not(feature = "parser"))]
async fn run_index(_project_id: String, _config_path: Option<PathBuf>, _path: PathBuf, _force: bool) -> anyhow::Result<()> {
    anyhow::bail!("this binary was built without the 'parser' feature")
}

async fn run_normalize(
    project_id: String,
    config_path: Option<PathBuf>,
    phases: Option<Vec<String>>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let settings = load_settings(config_path)?;
    let stores = open_stores(&settings, &project_id)?;
    let embeddings = build_embeddings(&settings).await?;

    let normalizer = Normalizer::new(stores.vectors.clone(), stores.graph.clone(), embeddings, project_id.clone())
        .with_theta_dedup(settings.normalization.theta_dedup)
        .with_retention(chrono::Duration::days(settings.normalization.retention_days));

    let job_id = uuid::Uuid::new_v4().to_string();
    let results = match phases {
        Some(names) => {
            let mut parsed = Vec::with_capacity(names.len());
            for name in names {
                let phase = palimpsest_core::normalize::Phase::all()
                    .iter()
                    .copied()
                    .find(|p| p.as_str() == name)
                    .ok_or_else(|| anyhow::anyhow!("unknown phase '{name}'"))?;
                parsed.push(phase);
            }
            normalizer.run_phases(&parsed, &job_id, dry_run).await?
        }
        None => normalizer.run(&job_id, dry_run).await?,
    };

    println!("{} {}", "Normalization job".cyan().bold(), job_id);
    for result in &results {
        println!(
            "  {:<18} {:>6}ms  processed={} actions={}",
            result.phase.as_str(),
            result.duration_ms,
            result.memories_processed,
            result.actions.len()
        );
    }
    Ok(())
}

fn run_backup(project_id: String, config_path: Option<PathBuf>, output: PathBuf) -> anyhow::Result<()> {
    let settings = load_settings(config_path)?;
    println!("{}", "=== Palimpsest Backup ===".cyan().bold());

    if !output.exists() {
        std::fs::create_dir_all(&output)?;
    }

    for (label, source) in [("vectors.db", &settings.qdrant.sqlite_path), ("graph.db", &settings.neo4j.sqlite_path)] {
        let source_path = PathBuf::from(source);
        if !source_path.exists() {
            println!("{} {} (not found, skipping)", "Skipping".yellow(), source_path.display());
            continue;
        }

        {
            let conn = rusqlite::Connection::open(&source_path)?;
            conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        }

        let dest = output.join(format!("{project_id}-{label}"));
        std::fs::copy(&source_path, &dest)?;
        let size = std::fs::metadata(&dest)?.len();
        println!("{} {} ({} bytes)", "Backed up".green(), dest.display(), size);
    }
    Ok(())
}

async fn run_stats(project_id: String, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = load_settings(config_path)?;
    let stores = open_stores(&settings, &project_id)?;

    println!("{}", "=== Palimpsest Memory Statistics ===".cyan().bold());
    let mut total = 0u64;
    for &memory_type in MemoryType::all() {
        let collection = stores.vectors.get_collection_name(&project_id, memory_type);
        let filter = Filter::scoped(&project_id);
        let count = stores.vectors.count(&collection, &filter).await.unwrap_or(0);
        total += count;
        println!("{:<18} {}", memory_type.as_str(), count);
    }
    println!("{}: {}", "Total".white().bold(), total);
    Ok(())
}

async fn run_health(project_id: String, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = load_settings(config_path)?;
    let stores = open_stores(&settings, &project_id)?;

    println!("{}", "=== Palimpsest Health Check ===".cyan().bold());
    let vector_ok = stores.vectors.health_check().await.is_ok();
    let graph_ok = stores.graph.health_check().await.is_ok();

    let status = if vector_ok && graph_ok { "HEALTHY".green().bold() } else { "DEGRADED".red().bold() };
    println!("{}: {}", "Status".white().bold(), status);
    println!("{}: {}", "Vector store".white(), if vector_ok { "reachable".green() } else { "unreachable".red() });
    println!("{}: {}", "Graph store".white(), if graph_ok { "reachable".green() } else { "unreachable".red() });
    Ok(())
}

#[allow(dead_code)]
fn default_data_dir() -> anyhow::Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "palimpsest").ok_or_else(|| anyhow::anyhow!("could not determine data directory"))?;
    Ok(dirs.data_dir().to_path_buf())
}
