//! Query Engine (spec.md §4.3): `semantic_search`, `get_related`,
//! `graph_query`, `find_duplicates`. Grounded in the teacher's
//! `search/vector.rs` (`VectorSearch` holding `Arc<Storage>` plus scoring),
//! generalized to go through the adapter traits instead of a concrete store
//! so either reference or future real backends serve reads identically.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::embeddings::{EmbeddingError, EmbeddingService};
use crate::memory::{MemoryType, RelationshipType};
use crate::query::readonly::reject_if_write;
use crate::storage::{CypherResult, Direction, Filter, GraphStoreAdapter, RelatedNode, VectorStoreAdapter};

const DEFAULT_CONTENT_TRUNCATE: usize = 500;
const DEFAULT_DEDUP_THRESHOLD: f32 = 0.85;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("vector store error: {0}")]
    Vector(#[from] crate::storage::VectorStoreError),
    #[error("graph store error: {0}")]
    Graph(#[from] crate::storage::GraphStoreError),
    #[error("threshold out of range [0.70, 0.95]: {0}")]
    ThresholdOutOfRange(f32),
    #[error("depth out of range [1, 5]: {0}")]
    DepthOutOfRange(u32),
}

pub type Result<T> = std::result::Result<T, QueryError>;

/// One hit from [`QueryEngine::semantic_search`] or [`QueryEngine::find_duplicates`].
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: Uuid,
    pub memory_type: MemoryType,
    pub content: String,
    pub score: f32,
    pub payload: Value,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

pub type Match = SearchResult;

pub struct QueryEngine {
    vectors: Arc<dyn VectorStoreAdapter>,
    graph: Arc<dyn GraphStoreAdapter>,
    embeddings: Arc<EmbeddingService>,
    project_id: String,
}

impl QueryEngine {
    pub fn new(
        vectors: Arc<dyn VectorStoreAdapter>,
        graph: Arc<dyn GraphStoreAdapter>,
        embeddings: Arc<EmbeddingService>,
        project_id: impl Into<String>,
    ) -> Self {
        Self { vectors, graph, embeddings, project_id: project_id.into() }
    }

    /// spec.md §4.3. `types` defaults to all eight memory types when `None`.
    pub async fn semantic_search(
        &self,
        query: &str,
        types: Option<&[MemoryType]>,
        extra_filters: Filter,
        limit: usize,
        score_threshold: Option<f32>,
        content_truncate: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        let vector = self.embeddings.embed_query(query).await?;
        let truncate_at = content_truncate.unwrap_or(DEFAULT_CONTENT_TRUNCATE);
        let types: Vec<MemoryType> = types.map(|t| t.to_vec()).unwrap_or_else(|| MemoryType::all().to_vec());

        let mut filter = Filter::scoped(&self.project_id);
        filter.predicates.extend(extra_filters.predicates);

        let mut merged = Vec::new();
        for memory_type in types {
            let collection = self.vectors.get_collection_name(&self.project_id, memory_type);
            let hits = self.vectors.search(&collection, &vector, limit, &filter, score_threshold).await?;
            for hit in hits {
                let content = hit
                    .payload
                    .get("content")
                    .and_then(Value::as_str)
                    .map(|s| truncate_chars(s, truncate_at))
                    .unwrap_or_default();
                let updated_at = hit
                    .payload
                    .get("updated_at")
                    .and_then(Value::as_str)
                    .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                    .map(|dt| dt.with_timezone(&chrono::Utc))
                    .unwrap_or_else(chrono::Utc::now);
                merged.push(SearchResult { id: hit.id, memory_type, content, score: hit.score, payload: hit.payload, updated_at });
            }
        }

        merged.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.updated_at.cmp(&a.updated_at))
                .then_with(|| a.id.as_bytes().cmp(b.id.as_bytes()))
        });
        merged.truncate(limit);
        Ok(merged)
    }

    /// spec.md §4.3. `depth` is clamped into the documented `1..5` range by
    /// rejecting out-of-range callers rather than silently clamping.
    pub async fn get_related(
        &self,
        entity_id: Uuid,
        relationship_types: Option<&[RelationshipType]>,
        direction: Direction,
        depth: u32,
    ) -> Result<Vec<RelatedNode>> {
        if !(1..=5).contains(&depth) {
            return Err(QueryError::DepthOutOfRange(depth));
        }
        let related = self.graph.get_related(entity_id, relationship_types, direction, depth).await?;
        Ok(related)
    }

    /// spec.md §4.3: reject non-read-only statements and inject the caller's
    /// `project_id` into the parameter set before delegating to the adapter.
    pub async fn graph_query(&self, cypher: &str, mut parameters: Value) -> Result<CypherResult> {
        reject_if_write(cypher).map_err(|reason| {
            QueryError::Graph(crate::storage::GraphStoreError::WriteRejected(reason))
        })?;
        if let Some(obj) = parameters.as_object_mut() {
            obj.insert("project_id".to_string(), Value::String(self.project_id.clone()));
        }
        let result = self.graph.execute_cypher(cypher, parameters).await?;
        Ok(result)
    }

    /// spec.md §4.3. `threshold` defaults to 0.85 and must fall in `[0.70, 0.95]`.
    pub async fn find_duplicates(
        &self,
        code: &str,
        language: Option<&str>,
        threshold: Option<f32>,
    ) -> Result<Vec<SearchResult>> {
        let threshold = threshold.unwrap_or(DEFAULT_DEDUP_THRESHOLD);
        if !(0.70..=0.95).contains(&threshold) {
            return Err(QueryError::ThresholdOutOfRange(threshold));
        }
        let vector = self.embeddings.embed_query(code).await?;
        let mut filter = Filter::scoped(&self.project_id);
        if let Some(language) = language {
            filter = filter.eq("language", language);
        }
        let collection = self.vectors.get_collection_name(&self.project_id, MemoryType::Function);
        let hits = self.vectors.search(&collection, &vector, 100, &filter, Some(threshold)).await?;
        let mut matches: Vec<SearchResult> = hits
            .into_iter()
            .map(|hit| SearchResult {
                id: hit.id,
                memory_type: MemoryType::Function,
                content: hit.payload.get("content").and_then(Value::as_str).map(String::from).unwrap_or_default(),
                score: hit.score,
                payload: hit.payload,
                updated_at: chrono::Utc::now(),
            })
            .collect();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        Ok(matches)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}
