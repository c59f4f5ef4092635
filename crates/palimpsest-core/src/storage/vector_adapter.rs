//! Vector Store Adapter trait and a SQLite-backed reference implementation
//! (spec.md §6). The concrete Qdrant client is out of scope per spec.md §1;
//! see SPEC_FULL.md §6 for the rationale behind shipping this reference
//! adapter instead of a stub.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::memory::{MemoryType, EMBEDDING_DIMENSIONS};
use crate::storage::filter::Filter;

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("collection not found: {0}")]
    CollectionNotFound(String),
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("point not found: {0}")]
    NotFound(Uuid),
    #[error("backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, VectorStoreError>;

/// One scored hit from [`VectorStoreAdapter::search`].
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub id: Uuid,
    pub score: f32,
    pub payload: Value,
}

/// A stored point returned by [`VectorStoreAdapter::get`] / [`VectorStoreAdapter::scroll`].
#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub id: Uuid,
    pub vector: Option<Vec<f32>>,
    pub payload: Value,
}

/// A page of [`VectorStoreAdapter::scroll`] results.
#[derive(Debug, Clone)]
pub struct ScrollPage {
    pub points: Vec<VectorPoint>,
    pub next_offset: Option<String>,
}

/// Capabilities required of any vector backend (spec.md §6). Two projects
/// must share no collection — [`Self::get_collection_name`] is required to
/// fold `project_id` into the returned name.
#[async_trait]
pub trait VectorStoreAdapter: Send + Sync {
    /// Idempotent: creates one collection per memory type if missing.
    async fn initialize_collections(&self) -> Result<()>;

    fn get_collection_name(&self, project_id: &str, memory_type: MemoryType) -> String {
        format!("{project_id}__{}", memory_type.as_str().to_lowercase())
    }

    async fn upsert(&self, collection: &str, id: Uuid, vector: &[f32], payload: Value) -> Result<()>;

    async fn get(&self, collection: &str, id: Uuid, with_vector: bool) -> Result<Option<VectorPoint>>;

    async fn delete(&self, collection: &str, id: Uuid) -> Result<()>;

    async fn update_payload(&self, collection: &str, id: Uuid, partial_payload: Value) -> Result<()>;

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filters: &Filter,
        score_threshold: Option<f32>,
    ) -> Result<Vec<VectorHit>>;

    async fn scroll(
        &self,
        collection: &str,
        filters: &Filter,
        limit: usize,
        offset: Option<String>,
    ) -> Result<ScrollPage>;

    async fn count(&self, collection: &str, filters: &Filter) -> Result<u64>;

    async fn health_check(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;

    /// Clone `collection`'s current contents into a new shadow collection
    /// named from `job_id`, returning the shadow's name (Normalizer
    /// "snapshot" phase, spec.md §4.5). Adapters that cannot stage a
    /// parallel collection return `Err` and the Normalizer skips staging
    /// for that backend rather than failing the whole run.
    async fn snapshot_collection(&self, collection: &str, job_id: &str) -> Result<String> {
        let _ = (collection, job_id);
        Err(VectorStoreError::Backend("snapshot_collection not supported by this adapter".into()))
    }

    /// Atomically replace `primary_collection`'s contents with
    /// `shadow_collection`'s and remove the shadow (Normalizer "swap" phase).
    async fn swap_collection(&self, shadow_collection: &str, primary_collection: &str) -> Result<()> {
        let _ = (shadow_collection, primary_collection);
        Err(VectorStoreError::Backend("swap_collection not supported by this adapter".into()))
    }

    /// Discard a shadow collection without swapping it in (Normalizer rollback).
    async fn drop_collection(&self, collection: &str) -> Result<()> {
        let _ = collection;
        Err(VectorStoreError::Backend("drop_collection not supported by this adapter".into()))
    }
}

/// Cosine similarity between two equal-length vectors, in `[-1, 1]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for i in 0..a.len() {
        dot += a[i] * b[i];
        na += a[i] * a[i];
        nb += b[i] * b[i];
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

pub fn validate_dimensions(vector: &[f32]) -> Result<()> {
    if vector.len() != EMBEDDING_DIMENSIONS {
        return Err(VectorStoreError::DimensionMismatch {
            expected: EMBEDDING_DIMENSIONS,
            actual: vector.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_orthogonal_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn collection_names_are_project_scoped() {
        struct Dummy;
        #[async_trait]
        impl VectorStoreAdapter for Dummy {
            async fn initialize_collections(&self) -> Result<()> {
                Ok(())
            }
            async fn upsert(&self, _: &str, _: Uuid, _: &[f32], _: Value) -> Result<()> {
                Ok(())
            }
            async fn get(&self, _: &str, _: Uuid, _: bool) -> Result<Option<VectorPoint>> {
                Ok(None)
            }
            async fn delete(&self, _: &str, _: Uuid) -> Result<()> {
                Ok(())
            }
            async fn update_payload(&self, _: &str, _: Uuid, _: Value) -> Result<()> {
                Ok(())
            }
            async fn search(&self, _: &str, _: &[f32], _: usize, _: &Filter, _: Option<f32>) -> Result<Vec<VectorHit>> {
                Ok(vec![])
            }
            async fn scroll(&self, _: &str, _: &Filter, _: usize, _: Option<String>) -> Result<ScrollPage> {
                Ok(ScrollPage { points: vec![], next_offset: None })
            }
            async fn count(&self, _: &str, _: &Filter) -> Result<u64> {
                Ok(0)
            }
            async fn health_check(&self) -> Result<()> {
                Ok(())
            }
            async fn close(&self) -> Result<()> {
                Ok(())
            }
        }

        let adapter = Dummy;
        let a = adapter.get_collection_name("MyProject", MemoryType::Function);
        let b = adapter.get_collection_name("myproject", MemoryType::Function);
        assert_ne!(a, b);
    }
}
