//! Graph Store Adapter trait and a SQLite-backed reference implementation
//! (spec.md §6). The concrete Neo4j/bolt client is out of scope per spec.md
//! §1; see SPEC_FULL.md §6.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::memory::{MemoryType, RelationshipType};

#[derive(Debug, thiserror::Error)]
pub enum GraphStoreError {
    #[error("node not found: {0}")]
    NodeNotFound(Uuid),
    #[error("query rejected: only read-only Cypher-like statements are permitted ({0})")]
    WriteRejected(String),
    #[error("backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, GraphStoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
    Both,
}

/// A node returned by [`GraphStoreAdapter::get_node`] / [`GraphStoreAdapter::get_related`].
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: Uuid,
    pub label: String,
    pub properties: Value,
}

/// A node reached during [`GraphStoreAdapter::get_related`] traversal, tagged
/// with the relationship label of the edge that first reached it (spec.md §4.3).
#[derive(Debug, Clone)]
pub struct RelatedNode {
    pub node: GraphNode,
    pub relationship_type: RelationshipType,
    pub depth: u32,
}

/// The result of a read-only `execute_cypher` call.
#[derive(Debug, Clone, Default)]
pub struct CypherResult {
    pub rows: Vec<serde_json::Map<String, Value>>,
}

#[async_trait]
pub trait GraphStoreAdapter: Send + Sync {
    /// Idempotent: node labels per memory type, indexes on `id`/`project_id`.
    async fn initialize_schema(&self) -> Result<()>;

    fn get_node_label(&self, memory_type: MemoryType) -> &'static str {
        memory_type.as_str()
    }

    async fn create_node(&self, label: &str, id: Uuid, properties: Value) -> Result<()>;

    async fn get_node(&self, id: Uuid, label: Option<&str>) -> Result<Option<GraphNode>>;

    async fn update_node(&self, id: Uuid, properties: Value, label: Option<&str>) -> Result<()>;

    async fn delete_node(&self, id: Uuid, detach: bool) -> Result<()>;

    async fn create_relationship(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        relationship_type: RelationshipType,
        properties: Option<Value>,
    ) -> Result<()>;

    async fn get_related(
        &self,
        node_id: Uuid,
        types: Option<&[RelationshipType]>,
        direction: Direction,
        depth: u32,
    ) -> Result<Vec<RelatedNode>>;

    /// Read-only traversal in the adapter's query language. Implementations
    /// MUST reject write statements (spec.md §6) — see
    /// [`crate::query::reject_if_write`] for the shared allow-list check
    /// the reference adapter and the Query Engine both apply.
    async fn execute_cypher(&self, query: &str, params: Value) -> Result<CypherResult>;

    async fn health_check(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;

    /// Clone every node/edge belonging to `project_id` into a shadow set
    /// tagged by `job_id`, returning a shadow identifier (Normalizer
    /// "snapshot" phase, spec.md §4.5).
    async fn snapshot_project(&self, project_id: &str, job_id: &str) -> Result<String> {
        let _ = (project_id, job_id);
        Err(GraphStoreError::Backend("snapshot_project not supported by this adapter".into()))
    }

    /// Atomically replace `project_id`'s nodes/edges with the shadow set's
    /// (Normalizer "swap" phase).
    async fn swap_project(&self, shadow_id: &str, project_id: &str) -> Result<()> {
        let _ = (shadow_id, project_id);
        Err(GraphStoreError::Backend("swap_project not supported by this adapter".into()))
    }

    /// Discard a shadow set without swapping it in (Normalizer rollback).
    async fn drop_snapshot(&self, shadow_id: &str) -> Result<()> {
        let _ = shadow_id;
        Err(GraphStoreError::Backend("drop_snapshot not supported by this adapter".into()))
    }

    /// Remove every edge whose source or target node (restricted to
    /// `project_id`) is missing or tombstoned (Normalizer "orphan_detection"
    /// phase, second sweep). Returns the number of edges removed.
    async fn remove_dangling_edges(&self, project_id: &str) -> Result<u64> {
        let _ = project_id;
        Err(GraphStoreError::Backend("remove_dangling_edges not supported by this adapter".into()))
    }
}
