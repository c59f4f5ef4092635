//! Memory Manager (spec.md §4.1): sole mutator of memories. Dual-writes to
//! the vector store first, then the graph store, marking `sync_status`
//! accordingly so the Sync Manager can converge divergence later.
//!
//! Internally the vector/graph adapters speak a snake_case payload shape
//! (matching [`crate::storage::filter::Filter`]'s predicate fields and the
//! original `cache.py`/`storage.py` convention); the camelCase [`Memory`]
//! struct is the MCP-facing shape. [`to_storage_payload`]/
//! [`from_storage_payload`] are the seam between the two.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::embeddings::EmbeddingService;
use crate::memory::locks::IdLocks;
use crate::memory::types::{Memory, MemoryType, SyncStatus};
use crate::memory::validation::{self, ValidationError};
use crate::storage::{Filter, GraphStoreAdapter, VectorStoreAdapter};

#[derive(Debug, thiserror::Error)]
pub enum MemoryManagerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Embedding(#[from] crate::embeddings::EmbeddingError),
    #[error(transparent)]
    Vector(#[from] crate::storage::VectorStoreError),
    #[error("memory not found: {0}")]
    NotFound(Uuid),
}

pub type Result<T> = std::result::Result<T, MemoryManagerError>;

/// Partial update applied by [`MemoryManager::update`].
#[derive(Debug, Clone, Default)]
pub struct UpdateFields {
    pub content: Option<String>,
    pub importance_score: Option<f32>,
    pub payload_patch: Option<Value>,
}

pub struct MemoryManager {
    vectors: Arc<dyn VectorStoreAdapter>,
    graph: Arc<dyn GraphStoreAdapter>,
    embeddings: Arc<EmbeddingService>,
    locks: IdLocks,
    project_id: String,
    theta_conflict: f32,
}

impl MemoryManager {
    pub fn new(
        vectors: Arc<dyn VectorStoreAdapter>,
        graph: Arc<dyn GraphStoreAdapter>,
        embeddings: Arc<EmbeddingService>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            vectors,
            graph,
            embeddings,
            locks: IdLocks::new(),
            project_id: project_id.into(),
            theta_conflict: 0.95,
        }
    }

    pub fn with_theta_conflict(mut self, theta: f32) -> Self {
        self.theta_conflict = theta;
        self
    }

    /// spec.md §4.1 `add`.
    pub async fn add(&self, mut memory: Memory, check_conflicts: bool) -> Result<(Uuid, Vec<Uuid>)> {
        validation::validate(&memory)?;
        let _guard = self.locks.lock(memory.id).await;

        if memory.embedding.is_none() {
            let outcome = self.embeddings.embed_with_outcome(
                &memory.content,
                crate::embeddings::InputType::Document,
                true,
            ).await?;
            memory.embedding = Some(outcome.vector);
            memory.embedding_is_fallback = outcome.is_fallback;
        }

        let collection = self.vectors.get_collection_name(&self.project_id, memory.memory_type);
        let mut conflicts = Vec::new();
        if check_conflicts {
            if let Some(vector) = &memory.embedding {
                let filter = Filter::scoped(&self.project_id);
                let hits = self
                    .vectors
                    .search(&collection, vector, 20, &filter, Some(self.theta_conflict))
                    .await?;
                conflicts = hits.into_iter().filter(|h| h.id != memory.id).map(|h| h.id).collect();
            }
        }

        self.vectors
            .upsert(&collection, memory.id, memory.embedding.as_deref().unwrap_or_default(), to_storage_payload(&memory))
            .await?;

        let label = self.graph.get_node_label(memory.memory_type);
        match self.graph.create_node(label, memory.id, to_storage_payload(&memory)).await {
            Ok(()) => memory.sync_status = SyncStatus::Synced,
            Err(err) => {
                tracing::warn!(memory_id = %memory.id, error = %err, "graph write failed, marking PENDING");
                memory.sync_status = SyncStatus::Pending;
            }
        }
        self.vectors
            .update_payload(&collection, memory.id, serde_json::json!({"sync_status": memory.sync_status.as_str()}))
            .await?;

        Ok((memory.id, conflicts))
    }

    /// spec.md §4.1 `get`.
    pub async fn get(&self, id: Uuid, memory_type: MemoryType, track_access: bool) -> Result<Option<Memory>> {
        let collection = self.vectors.get_collection_name(&self.project_id, memory_type);
        let Some(point) = self.vectors.get(&collection, id, true).await? else {
            return Ok(None);
        };
        let memory = from_storage_payload(id, memory_type, point.vector, &point.payload);
        if memory.deleted {
            return Ok(None);
        }
        if track_access {
            let _ = self
                .vectors
                .update_payload(&collection, id, serde_json::json!({"access_count": memory.access_count + 1}))
                .await;
        }
        Ok(Some(memory))
    }

    /// spec.md §4.1 `update`.
    pub async fn update(
        &self,
        id: Uuid,
        memory_type: MemoryType,
        updates: UpdateFields,
        regenerate_embedding: bool,
    ) -> Result<Option<Memory>> {
        let _guard = self.locks.lock(id).await;
        let collection = self.vectors.get_collection_name(&self.project_id, memory_type);
        let Some(point) = self.vectors.get(&collection, id, true).await? else {
            return Ok(None);
        };
        let mut memory = from_storage_payload(id, memory_type, point.vector, &point.payload);

        let content_changed = if let Some(content) = updates.content {
            let changed = content != memory.content;
            memory.content = content;
            memory.content_hash = crate::memory::content_hash(&memory.content);
            changed
        } else {
            false
        };
        if let Some(importance) = updates.importance_score {
            memory.importance_score = importance;
        }
        if let Some(patch) = updates.payload_patch {
            if let (Some(dest), Some(src)) = (serde_json::to_value(&memory.payload).ok().and_then(|v| v.as_object().cloned()), patch.as_object()) {
                let mut merged = dest;
                for (k, v) in src {
                    merged.insert(k.clone(), v.clone());
                }
                memory.payload = serde_json::from_value(Value::Object(merged)).unwrap_or(memory.payload);
            }
        }

        if content_changed || regenerate_embedding {
            let outcome = self.embeddings.embed_with_outcome(
                &memory.content,
                crate::embeddings::InputType::Document,
                true,
            ).await?;
            memory.embedding = Some(outcome.vector);
            memory.embedding_is_fallback = outcome.is_fallback;
        }
        memory.updated_at = Utc::now();

        self.vectors
            .upsert(&collection, memory.id, memory.embedding.as_deref().unwrap_or_default(), to_storage_payload(&memory))
            .await?;

        match self.graph.update_node(memory.id, to_storage_payload(&memory), Some(self.graph.get_node_label(memory_type))).await {
            Ok(()) => memory.sync_status = SyncStatus::Synced,
            Err(err) => {
                tracing::warn!(memory_id = %memory.id, error = %err, "graph update failed, marking PENDING");
                memory.sync_status = SyncStatus::Pending;
            }
        }
        self.vectors
            .update_payload(&collection, memory.id, serde_json::json!({"sync_status": memory.sync_status.as_str()}))
            .await?;

        Ok(Some(memory))
    }

    /// spec.md §4.1 `delete`.
    pub async fn delete(&self, id: Uuid, memory_type: MemoryType, soft: bool) -> Result<bool> {
        let _guard = self.locks.lock(id).await;
        let collection = self.vectors.get_collection_name(&self.project_id, memory_type);
        let Some(_point) = self.vectors.get(&collection, id, false).await? else {
            return Ok(false);
        };

        if soft {
            self.vectors
                .update_payload(
                    &collection,
                    id,
                    serde_json::json!({"deleted": true, "deleted_at": Utc::now().to_rfc3339()}),
                )
                .await?;
            let _ = self
                .graph
                .update_node(id, serde_json::json!({"deleted": true}), None)
                .await;
        } else {
            self.vectors.delete(&collection, id).await?;
            let _ = self.graph.delete_node(id, true).await;
        }
        Ok(true)
    }

    /// spec.md §4.1 `bulk_add`.
    pub async fn bulk_add(
        &self,
        memories: Vec<Memory>,
        check_conflicts: bool,
    ) -> (Vec<Uuid>, Vec<(usize, MemoryManagerError)>) {
        let missing_indices: Vec<usize> =
            memories.iter().enumerate().filter(|(_, m)| m.embedding.is_none()).map(|(i, _)| i).collect();
        let to_embed: Vec<String> = missing_indices.iter().map(|&i| memories[i].content.clone()).collect();

        let mut embeddings_by_index = std::collections::HashMap::new();
        let mut errors = Vec::new();

        if !to_embed.is_empty() {
            match self.embeddings.embed_batch(&to_embed).await {
                Ok(outcomes) => {
                    for (&index, outcome) in missing_indices.iter().zip(outcomes.into_iter()) {
                        embeddings_by_index.insert(index, outcome);
                    }
                }
                Err(err) => {
                    for &index in &missing_indices {
                        errors.push((index, MemoryManagerError::Embedding(clone_embedding_error(&err))));
                    }
                }
            }
        }
        let failed: std::collections::HashSet<usize> = errors.iter().map(|(i, _)| *i).collect();

        let mut ids = Vec::new();
        for (index, mut memory) in memories.into_iter().enumerate() {
            if failed.contains(&index) {
                continue;
            }
            if let Some(outcome) = embeddings_by_index.remove(&index) {
                memory.embedding = Some(outcome.vector);
                memory.embedding_is_fallback = outcome.is_fallback;
            }
            match self.add(memory, check_conflicts).await {
                Ok((id, _conflicts)) => ids.push(id),
                Err(err) => errors.push((index, err)),
            }
        }
        (ids, errors)
    }
}

fn clone_embedding_error(err: &crate::embeddings::EmbeddingError) -> crate::embeddings::EmbeddingError {
    use crate::embeddings::EmbeddingError::*;
    match err {
        EmptyInput => EmptyInput,
        ProviderFailed(s) => ProviderFailed(s.clone()),
        DimensionMismatch { expected, actual } => DimensionMismatch { expected: *expected, actual: *actual },
    }
}

/// The internal snake_case shape the storage adapters read and filter on.
pub fn to_storage_payload(memory: &Memory) -> Value {
    let mut obj = serde_json::Map::new();
    obj.insert("id".into(), Value::String(memory.id.to_string()));
    obj.insert("project_id".into(), Value::String(memory.project_id.clone()));
    obj.insert("memory_type".into(), Value::String(memory.memory_type.as_str().to_string()));
    obj.insert("content".into(), Value::String(memory.content.clone()));
    obj.insert("content_hash".into(), Value::String(memory.content_hash.clone()));
    obj.insert("embedding_is_fallback".into(), Value::Bool(memory.embedding_is_fallback));
    obj.insert("created_at".into(), Value::String(memory.created_at.to_rfc3339()));
    obj.insert("updated_at".into(), Value::String(memory.updated_at.to_rfc3339()));
    obj.insert("access_count".into(), Value::Number(memory.access_count.into()));
    obj.insert(
        "importance_score".into(),
        serde_json::Number::from_f64(memory.importance_score as f64).map(Value::Number).unwrap_or(Value::Null),
    );
    obj.insert("deleted".into(), Value::Bool(memory.deleted));
    if let Some(deleted_at) = memory.deleted_at {
        obj.insert("deleted_at".into(), Value::String(deleted_at.to_rfc3339()));
    }
    obj.insert("sync_status".into(), Value::String(memory.sync_status.as_str().to_string()));
    // MemoryPayload fields keep their own (camelCase) serde names here; only
    // the envelope fields above are snake_case for Filter/predicate matching.
    if let Ok(payload_value) = serde_json::to_value(&memory.payload) {
        if let Some(payload_obj) = payload_value.as_object() {
            for (k, v) in payload_obj {
                obj.insert(k.clone(), v.clone());
            }
        }
    }
    Value::Object(obj)
}

pub(crate) fn from_storage_payload(id: Uuid, memory_type: MemoryType, vector: Option<Vec<f32>>, payload: &Value) -> Memory {
    let get_str = |k: &str| payload.get(k).and_then(Value::as_str).map(String::from);
    let get_bool = |k: &str| payload.get(k).and_then(Value::as_bool).unwrap_or(false);
    let get_u64 = |k: &str| payload.get(k).and_then(Value::as_u64).unwrap_or(0);
    let get_f32 = |k: &str, default: f32| payload.get(k).and_then(Value::as_f64).map(|v| v as f32).unwrap_or(default);
    let parse_dt = |k: &str| {
        get_str(k).and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok()).map(|dt| dt.with_timezone(&Utc))
    };

    const ENVELOPE_KEYS: &[&str] = &[
        "id", "project_id", "memory_type", "content", "content_hash", "embedding_is_fallback",
        "created_at", "updated_at", "access_count", "importance_score", "deleted", "deleted_at",
        "sync_status",
    ];
    let mut payload_only = payload.as_object().cloned().unwrap_or_default();
    for key in ENVELOPE_KEYS {
        payload_only.remove(*key);
    }
    let memory_payload = serde_json::from_value(Value::Object(payload_only)).unwrap_or_default();

    Memory {
        id,
        memory_type,
        content: get_str("content").unwrap_or_default(),
        content_hash: get_str("content_hash").unwrap_or_default(),
        embedding: vector,
        embedding_is_fallback: get_bool("embedding_is_fallback"),
        created_at: parse_dt("created_at").unwrap_or_else(Utc::now),
        updated_at: parse_dt("updated_at").unwrap_or_else(Utc::now),
        access_count: get_u64("access_count"),
        importance_score: get_f32("importance_score", 0.5),
        deleted: get_bool("deleted"),
        deleted_at: parse_dt("deleted_at"),
        sync_status: get_str("sync_status").and_then(|s| SyncStatus::parse_name(&s)).unwrap_or(SyncStatus::Pending),
        project_id: get_str("project_id").unwrap_or_default(),
        payload: memory_payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{EmbeddingCache, LocalFallbackProvider};
    use crate::storage::{SqliteGraphStore, SqliteVectorStore};

    async fn manager() -> MemoryManager {
        let vectors: Arc<dyn VectorStoreAdapter> = Arc::new(SqliteVectorStore::open_in_memory("P").unwrap());
        vectors.initialize_collections().await.unwrap();
        let graph: Arc<dyn GraphStoreAdapter> = Arc::new(SqliteGraphStore::open_in_memory().unwrap());
        graph.initialize_schema().await.unwrap();
        let cache = Arc::new(EmbeddingCache::open_in_memory(1000, 30).unwrap());
        let embeddings = Arc::new(EmbeddingService::new(Arc::new(LocalFallbackProvider), None, cache));
        MemoryManager::new(vectors, graph, embeddings, "P")
    }

    #[tokio::test]
    async fn add_then_get_roundtrips() {
        let manager = manager().await;
        let memory = Memory::new("P", MemoryType::Function, "fn foo() {}");
        let (id, conflicts) = manager.add(memory, true).await.unwrap();
        assert!(conflicts.is_empty());

        let fetched = manager.get(id, MemoryType::Function, false).await.unwrap().unwrap();
        assert_eq!(fetched.content, "fn foo() {}");
        assert_eq!(fetched.sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn get_tracks_access_count() {
        let manager = manager().await;
        let memory = Memory::new("P", MemoryType::Function, "fn bar() {}");
        let (id, _) = manager.add(memory, false).await.unwrap();

        manager.get(id, MemoryType::Function, true).await.unwrap();
        let after = manager.get(id, MemoryType::Function, false).await.unwrap().unwrap();
        assert!(after.access_count >= 1);
    }

    #[tokio::test]
    async fn soft_delete_hides_from_get() {
        let manager = manager().await;
        let memory = Memory::new("P", MemoryType::Function, "fn baz() {}");
        let (id, _) = manager.add(memory, false).await.unwrap();
        manager.delete(id, MemoryType::Function, true).await.unwrap();
        assert!(manager.get(id, MemoryType::Function, false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_regenerates_embedding_on_content_change() {
        let manager = manager().await;
        let memory = Memory::new("P", MemoryType::Function, "fn original() {}");
        let (id, _) = manager.add(memory, false).await.unwrap();
        let before = manager.get(id, MemoryType::Function, false).await.unwrap().unwrap();

        let updated = manager
            .update(id, MemoryType::Function, UpdateFields { content: Some("fn changed() {}".into()), ..Default::default() }, false)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(updated.content_hash, before.content_hash);
        assert_eq!(updated.content, "fn changed() {}");
    }

    #[tokio::test]
    async fn conflict_detection_flags_near_duplicates() {
        let manager = manager().await;
        let memory_a = Memory::new("P", MemoryType::Function, "fn identical_body() { 1 + 1; }");
        let (id_a, _) = manager.add(memory_a, false).await.unwrap();

        let memory_b = Memory::new("P", MemoryType::Function, "fn identical_body() { 1 + 1; }");
        let (_, conflicts) = manager.add(memory_b, true).await.unwrap();
        assert!(conflicts.contains(&id_a));
    }

    #[tokio::test]
    async fn bulk_add_never_aborts_on_single_item_error() {
        let manager = manager().await;
        let ok_memory = Memory::new("P", MemoryType::Function, "fn ok() {}");
        let mut bad_memory = Memory::new("P", MemoryType::Function, "fn bad() {}");
        bad_memory.importance_score = 5.0; // out of [0,1] range, fails validation

        let (ids, errors) = manager.bulk_add(vec![ok_memory, bad_memory], false).await;
        assert_eq!(ids.len(), 1);
        assert_eq!(errors.len(), 1);
    }
}
