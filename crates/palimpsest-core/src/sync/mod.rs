//! Cross-Store Sync Manager (spec.md §4.2): drives every record toward
//! `SYNCED`, reconciles divergence, and classifies records that have
//! exhausted their retry budget as dead-letter (SPEC_FULL.md §4.2,
//! resolving spec.md §9's open per-record-retry-count question).

use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::memory::{MemoryType, SyncStatus};
use crate::storage::{Filter, GraphStoreAdapter, VectorStoreAdapter};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Vector(#[from] crate::storage::VectorStoreError),
    #[error(transparent)]
    Graph(#[from] crate::storage::GraphStoreError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Outcome of one [`SyncManager::process_pending`] / [`SyncManager::retry_failed`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub synced: u64,
    pub failed: u64,
    pub dead_lettered: u64,
}

/// Result of [`SyncManager::verify_consistency`].
#[derive(Debug, Clone, Default)]
pub struct ConsistencyReport {
    pub vector_only: Vec<Uuid>,
    pub graph_only: Vec<Uuid>,
    pub mismatched: Vec<Uuid>,
    pub consistent_count: u64,
}

pub struct SyncManager {
    vectors: Arc<dyn VectorStoreAdapter>,
    graph: Arc<dyn GraphStoreAdapter>,
    project_id: String,
    max_retries: u32,
}

impl SyncManager {
    pub fn new(
        vectors: Arc<dyn VectorStoreAdapter>,
        graph: Arc<dyn GraphStoreAdapter>,
        project_id: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self { vectors, graph, project_id: project_id.into(), max_retries }
    }

    /// spec.md §4.2 `process_pending`.
    pub async fn process_pending(&self, batch_size: usize) -> Result<SyncStats> {
        self.drive(SyncStatus::Pending, batch_size, false).await
    }

    /// spec.md §4.2 `retry_failed`. `include_dead_letter` is the
    /// SPEC_FULL.md addition allowing an operator to force a retry of
    /// records that already hit `max_retries`.
    pub async fn retry_failed(&self, batch_size: usize, include_dead_letter: bool) -> Result<SyncStats> {
        self.drive(SyncStatus::Failed, batch_size, include_dead_letter).await
    }

    async fn drive(&self, from_status: SyncStatus, batch_size: usize, include_dead_letter: bool) -> Result<SyncStats> {
        let mut stats = SyncStats::default();
        let mut remaining = batch_size;

        for memory_type in MemoryType::all().iter().copied() {
            if remaining == 0 {
                break;
            }
            let collection = self.vectors.get_collection_name(&self.project_id, memory_type);
            let mut filter = Filter::scoped(&self.project_id).eq("sync_status", from_status.as_str());
            // Dead-letter only ever applies to FAILED records — a record
            // freshly marked PENDING by the Memory Manager never carries the
            // key, so gating on it there would hide every such record.
            if from_status == SyncStatus::Failed && !include_dead_letter {
                filter = filter.eq("dead_letter", false);
            }

            let page = self.vectors.scroll(&collection, &filter, remaining, None).await?;
            for point in page.points {
                if remaining == 0 {
                    break;
                }
                remaining -= 1;

                let label = self.graph.get_node_label(memory_type);
                let attempt = if self.graph.get_node(point.id, Some(label)).await?.is_some() {
                    self.graph.update_node(point.id, point.payload.clone(), Some(label)).await
                } else {
                    self.graph.create_node(label, point.id, point.payload.clone()).await
                };

                match attempt {
                    Ok(()) => {
                        self.vectors
                            .update_payload(
                                &collection,
                                point.id,
                                serde_json::json!({"sync_status": SyncStatus::Synced.as_str(), "retry_count": 0}),
                            )
                            .await?;
                        stats.synced += 1;
                    }
                    Err(err) => {
                        let retry_count = point.payload.get("retry_count").and_then(Value::as_u64).unwrap_or(0) + 1;
                        let dead_letter = retry_count >= self.max_retries as u64;
                        tracing::warn!(memory_id = %point.id, %retry_count, dead_letter, error = %err, "graph sync attempt failed");
                        self.vectors
                            .update_payload(
                                &collection,
                                point.id,
                                serde_json::json!({
                                    "sync_status": SyncStatus::Failed.as_str(),
                                    "retry_count": retry_count,
                                    "dead_letter": dead_letter,
                                }),
                            )
                            .await?;
                        stats.failed += 1;
                        if dead_letter {
                            stats.dead_lettered += 1;
                        }
                    }
                }
            }
        }

        Ok(stats)
    }

    /// spec.md §4.2 `verify_consistency`: sample `SYNCED` vector records and
    /// confirm the graph node exists with a matching `content` field.
    pub async fn verify_consistency(&self, sample_size: usize) -> Result<ConsistencyReport> {
        let mut report = ConsistencyReport::default();
        let mut remaining = sample_size;

        for memory_type in MemoryType::all().iter().copied() {
            if remaining == 0 {
                break;
            }
            let collection = self.vectors.get_collection_name(&self.project_id, memory_type);
            let filter = Filter::scoped(&self.project_id).eq("sync_status", SyncStatus::Synced.as_str());
            let page = self.vectors.scroll(&collection, &filter, remaining, None).await?;

            let label = self.graph.get_node_label(memory_type);
            for point in page.points {
                if remaining == 0 {
                    break;
                }
                remaining -= 1;

                match self.graph.get_node(point.id, Some(label)).await? {
                    None => report.vector_only.push(point.id),
                    Some(node) => {
                        let vector_content = point.payload.get("content").and_then(Value::as_str);
                        let graph_content = node.properties.get("content").and_then(Value::as_str);
                        if vector_content == graph_content {
                            report.consistent_count += 1;
                        } else {
                            report.mismatched.push(point.id);
                        }
                    }
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Memory;
    use crate::storage::{SqliteGraphStore, SqliteVectorStore};

    async fn setup() -> (Arc<dyn VectorStoreAdapter>, Arc<dyn GraphStoreAdapter>) {
        let vectors: Arc<dyn VectorStoreAdapter> = Arc::new(SqliteVectorStore::open_in_memory("P").unwrap());
        vectors.initialize_collections().await.unwrap();
        let graph: Arc<dyn GraphStoreAdapter> = Arc::new(SqliteGraphStore::open_in_memory().unwrap());
        graph.initialize_schema().await.unwrap();
        (vectors, graph)
    }

    #[tokio::test]
    async fn process_pending_syncs_a_vector_only_record() {
        let (vectors, graph) = setup().await;
        let memory = Memory::new("P", MemoryType::Function, "fn f() {}");
        let collection = vectors.get_collection_name("P", MemoryType::Function);
        let vector = vec![0.0f32; crate::memory::EMBEDDING_DIMENSIONS];
        let payload = serde_json::json!({
            "project_id": "P", "deleted": false, "content": memory.content,
            "sync_status": "PENDING",
        });
        vectors.upsert(&collection, memory.id, &vector, payload).await.unwrap();

        let manager = SyncManager::new(vectors.clone(), graph.clone(), "P", 3);
        let stats = manager.process_pending(10).await.unwrap();
        assert_eq!(stats.synced, 1);
        assert!(graph.get_node(memory.id, Some("Function")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn verify_consistency_flags_vector_only_record() {
        let (vectors, graph) = setup().await;
        let collection = vectors.get_collection_name("P", MemoryType::Function);
        let id = Uuid::new_v4();
        let vector = vec![0.0f32; crate::memory::EMBEDDING_DIMENSIONS];
        vectors
            .upsert(&collection, id, &vector, serde_json::json!({"project_id": "P", "deleted": false, "content": "x", "sync_status": "SYNCED"}))
            .await
            .unwrap();

        let manager = SyncManager::new(vectors, graph, "P", 3);
        let report = manager.verify_consistency(10).await.unwrap();
        assert_eq!(report.vector_only, vec![id]);
    }

    #[tokio::test]
    async fn retry_failed_respects_dead_letter_threshold() {
        let (vectors, graph) = setup().await;
        let collection = vectors.get_collection_name("P", MemoryType::Function);
        let id = Uuid::new_v4();
        let vector = vec![0.0f32; crate::memory::EMBEDDING_DIMENSIONS];
        vectors
            .upsert(
                &collection,
                id,
                &vector,
                serde_json::json!({"project_id": "P", "deleted": false, "content": "x", "sync_status": "FAILED", "retry_count": 1, "dead_letter": false}),
            )
            .await
            .unwrap();

        let manager = SyncManager::new(vectors.clone(), graph.clone(), "P", 2);
        let stats = manager.retry_failed(10, false).await.unwrap();
        // graph create succeeds (reference adapter never fails), so it syncs.
        assert_eq!(stats.synced, 1);
    }
}
