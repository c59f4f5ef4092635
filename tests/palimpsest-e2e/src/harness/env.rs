//! Test Environment
//!
//! Wires every core service against in-memory stores for one project,
//! grounded in `palimpsest-mcp`'s `build_services` — same construction
//! order, swapping on-disk SQLite files and the Voyage provider for their
//! in-memory/local-fallback counterparts so no network or filesystem I/O
//! is needed to exercise a full request path.

use std::sync::Arc;

use palimpsest_core::embeddings::{EmbeddingCache, EmbeddingService, LocalFallbackProvider};
use palimpsest_core::memory::MemoryManager;
use palimpsest_core::normalize::Normalizer;
#[cfg(feature = "parser")]
use palimpsest_core::parser::Indexer;
use palimpsest_core::query::QueryEngine;
use palimpsest_core::storage::{GraphStoreAdapter, SqliteGraphStore, SqliteVectorStore, VectorStoreAdapter};
use palimpsest_core::sync::SyncManager;

pub struct TestEnvironment {
    pub project_id: String,
    pub vectors: Arc<dyn VectorStoreAdapter>,
    pub graph: Arc<dyn GraphStoreAdapter>,
    pub embeddings: Arc<EmbeddingService>,
    pub manager: Arc<MemoryManager>,
    pub query: Arc<QueryEngine>,
    pub sync: Arc<SyncManager>,
    pub normalizer: Arc<Normalizer>,
    #[cfg(feature = "parser")]
    pub indexer: Arc<Indexer>,
}

impl TestEnvironment {
    /// A fresh, isolated in-memory environment scoped to `project_id`.
    pub async fn new(project_id: &str) -> Self {
        let vectors: Arc<dyn VectorStoreAdapter> = Arc::new(SqliteVectorStore::open_in_memory(project_id).unwrap());
        vectors.initialize_collections().await.unwrap();
        let graph: Arc<dyn GraphStoreAdapter> = Arc::new(SqliteGraphStore::open_in_memory().unwrap());
        graph.initialize_schema().await.unwrap();

        let cache = Arc::new(EmbeddingCache::open_in_memory(1000, 30).unwrap());
        let embeddings = Arc::new(EmbeddingService::new(Arc::new(LocalFallbackProvider), None, cache));

        let manager = Arc::new(MemoryManager::new(vectors.clone(), graph.clone(), embeddings.clone(), project_id));
        let query = Arc::new(QueryEngine::new(vectors.clone(), graph.clone(), embeddings.clone(), project_id));
        let sync = Arc::new(SyncManager::new(vectors.clone(), graph.clone(), project_id, 3));
        let normalizer = Arc::new(Normalizer::new(vectors.clone(), graph.clone(), embeddings.clone(), project_id));

        #[cfg(feature = "parser")]
        let indexer = Arc::new(Indexer::new(manager.clone(), vectors.clone(), project_id));

        Self {
            project_id: project_id.to_string(),
            vectors,
            graph,
            embeddings,
            manager,
            query,
            sync,
            normalizer,
            #[cfg(feature = "parser")]
            indexer,
        }
    }

    /// A second environment sharing this one's graph store but with its own
    /// (collection-isolated) vector store — for cross-project isolation
    /// checks that must still exercise the same graph tables.
    pub async fn sibling_project(&self, project_id: &str) -> Self {
        let vectors: Arc<dyn VectorStoreAdapter> = Arc::new(SqliteVectorStore::open_in_memory(project_id).unwrap());
        vectors.initialize_collections().await.unwrap();

        let cache = Arc::new(EmbeddingCache::open_in_memory(1000, 30).unwrap());
        let embeddings = Arc::new(EmbeddingService::new(Arc::new(LocalFallbackProvider), None, cache));

        let manager = Arc::new(MemoryManager::new(vectors.clone(), self.graph.clone(), embeddings.clone(), project_id));
        let query = Arc::new(QueryEngine::new(vectors.clone(), self.graph.clone(), embeddings.clone(), project_id));
        let sync = Arc::new(SyncManager::new(vectors.clone(), self.graph.clone(), project_id, 3));
        let normalizer = Arc::new(Normalizer::new(vectors.clone(), self.graph.clone(), embeddings.clone(), project_id));

        #[cfg(feature = "parser")]
        let indexer = Arc::new(Indexer::new(manager.clone(), vectors.clone(), project_id));

        Self {
            project_id: project_id.to_string(),
            vectors,
            graph: self.graph.clone(),
            embeddings,
            manager,
            query,
            sync,
            normalizer,
            #[cfg(feature = "parser")]
            indexer,
        }
    }
}
