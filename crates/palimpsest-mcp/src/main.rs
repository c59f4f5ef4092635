//! Palimpsest MCP Server
//!
//! Exposes a per-project long-term memory engine over the Model Context
//! Protocol (JSON-RPC 2.0, line-delimited, over stdio): a Memory Manager,
//! a Cross-Store Sync Manager bridging the vector and graph stores, a
//! Query Engine, an embeddings pipeline, an offline Normalizer, and
//! (behind the `parser` feature) a codebase Indexer.

mod protocol;
mod server;
mod services;
mod tools;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

use palimpsest_core::config::{self, Settings};
use palimpsest_core::embeddings::{EmbeddingCache, EmbeddingService, LocalFallbackProvider, VoyageProvider};
use palimpsest_core::memory::{is_valid_project_id, MemoryManager};
use palimpsest_core::normalize::Normalizer;
#[cfg(feature = "parser")]
use palimpsest_core::parser::Indexer;
use palimpsest_core::query::QueryEngine;
use palimpsest_core::storage::{GraphStoreAdapter, SqliteGraphStore, SqliteVectorStore, VectorStoreAdapter};
use palimpsest_core::sync::SyncManager;

use crate::protocol::stdio::StdioTransport;
use crate::server::McpServer;
use crate::services::Services;

/// Parses `--project-id <ID>` and `--config <PATH>`. Exits the process on
/// `--help`/`--version` or a malformed flag, same convention as the CLI.
fn parse_args() -> (Option<String>, Option<PathBuf>) {
    let args: Vec<String> = std::env::args().collect();
    let mut project_id: Option<String> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!("palimpsest-mcp {}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("Per-project long-term memory server, speaking MCP over stdio.");
                println!();
                println!("USAGE:");
                println!("    palimpsest-mcp --project-id <ID> [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help              Print help information");
                println!("    -V, --version           Print version information");
                println!("    --project-id <ID>       Project namespace (required)");
                println!("    --config <PATH>         Path to a TOML config file");
                println!();
                println!("ENVIRONMENT:");
                println!("    RUST_LOG                Log level filter (e.g. debug, info, warn)");
                println!("    MEMSVC_*                Overrides individual config fields");
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("palimpsest-mcp {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--project-id" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --project-id requires a value");
                    std::process::exit(1);
                }
                project_id = Some(args[i].clone());
            }
            "--config" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --config requires a path argument");
                    std::process::exit(1);
                }
                config_path = Some(PathBuf::from(&args[i]));
            }
            arg => {
                eprintln!("error: unknown argument '{arg}'");
                eprintln!("Try 'palimpsest-mcp --help' for more information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    (project_id, config_path)
}

fn build_services(project_id: String, settings: &Settings) -> anyhow::Result<Services> {
    let vectors: Arc<dyn VectorStoreAdapter> =
        Arc::new(SqliteVectorStore::open(std::path::Path::new(&settings.qdrant.sqlite_path), project_id.clone())?);
    let graph: Arc<dyn GraphStoreAdapter> = Arc::new(SqliteGraphStore::open(std::path::Path::new(&settings.neo4j.sqlite_path))?);

    let cache = Arc::new(EmbeddingCache::open(
        std::path::Path::new("embedding_cache.db"),
        settings.cache.max_size,
        settings.cache.ttl_days,
    )?);
    let primary = Arc::new(VoyageProvider::new(settings.voyage.api_key.expose().clone(), settings.voyage.model.clone()));
    let fallback = Some(Arc::new(LocalFallbackProvider) as Arc<dyn palimpsest_core::embeddings::EmbeddingProvider>);
    let embeddings = Arc::new(EmbeddingService::new(primary, fallback, cache));

    let manager = Arc::new(MemoryManager::new(vectors.clone(), graph.clone(), embeddings.clone(), project_id.clone()));
    let query = Arc::new(QueryEngine::new(vectors.clone(), graph.clone(), embeddings.clone(), project_id.clone()));
    let sync = Arc::new(SyncManager::new(vectors.clone(), graph.clone(), project_id.clone(), settings.normalization.max_sync_retries));
    let normalizer = Arc::new(
        Normalizer::new(vectors.clone(), graph.clone(), embeddings.clone(), project_id.clone())
            .with_theta_dedup(settings.normalization.theta_dedup)
            .with_retention(chrono::Duration::days(settings.normalization.retention_days)),
    );

    #[cfg(feature = "parser")]
    let indexer = Arc::new(Indexer::new(manager.clone(), vectors.clone(), project_id.clone()));

    Ok(Services {
        project_id,
        vectors,
        graph,
        embeddings,
        manager,
        query,
        sync,
        normalizer,
        #[cfg(feature = "parser")]
        indexer,
    })
}

#[tokio::main]
async fn main() {
    let (project_id, config_path) = parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("palimpsest-mcp v{} starting", env!("CARGO_PKG_VERSION"));

    let project_id = match project_id {
        Some(id) if is_valid_project_id(&id) => id,
        Some(id) => {
            error!("invalid --project-id '{id}': must start alphanumeric, <=64 chars, alphanumeric/_/- only");
            std::process::exit(1);
        }
        None => {
            error!("missing required --project-id argument");
            std::process::exit(1);
        }
    };

    let settings = match config::load(config_path.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let services = match build_services(project_id.clone(), &settings) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to initialize stores: {e}");
            std::process::exit(1);
        }
    };
    info!(project_id = %project_id, "stores initialized");

    let server = McpServer::new(services);
    let transport = StdioTransport::new();

    info!("serving MCP over stdio");
    if let Err(e) = transport.run(server).await {
        error!("server error: {e}");
        std::process::exit(1);
    }
}
