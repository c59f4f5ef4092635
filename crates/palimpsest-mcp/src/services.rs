//! Capability bundle handed to every tool (spec.md §6: the server injects a
//! `_context` argument giving tool implementations "references to the
//! memory manager, query engine, and adapters"). JSON-RPC params can't carry
//! a live `Arc<dyn Trait>`, so here `_context` becomes a typed constructor
//! argument instead of a wire-level field: each tool function takes
//! `&Services` directly rather than pulling capabilities out of a JSON blob.

use std::sync::Arc;

use palimpsest_core::embeddings::EmbeddingService;
use palimpsest_core::memory::MemoryManager;
#[cfg(feature = "parser")]
use palimpsest_core::parser::Indexer;
use palimpsest_core::normalize::Normalizer;
use palimpsest_core::query::QueryEngine;
use palimpsest_core::storage::{GraphStoreAdapter, VectorStoreAdapter};
use palimpsest_core::sync::SyncManager;

pub struct Services {
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
