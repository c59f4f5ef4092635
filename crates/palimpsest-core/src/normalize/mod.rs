//! Normalizer (spec.md §4.5): offline multi-phase cleanup that preserves
//! data in the face of partial failure. Grounded in the teacher's
//! `consolidation/phases.rs` (`PhaseResult { phase, duration_ms,
//! memories_processed, actions }`), generalized from 4 neuroscience phases
//! to the 7 named phases spec.md §4.5 specifies.
//!
//! Staging asymmetry: the vector adapter's `search`/`scroll`/`upsert`
//! already take an explicit collection name, so when [`Phase::Snapshot`]
//! succeeds in creating a shadow collection, every later phase redirects its
//! vector mutations there and [`Phase::Swap`] cuts the shadow over the
//! primary. The graph adapter has no per-call collection parameter (it
//! always addresses the single `graph_nodes`/`graph_edges` tables), so
//! graph mutations always land on the primary set directly; the graph
//! snapshot exists solely so rollback can restore pre-run state, not as a
//! staging target. This decision is recorded in DESIGN.md.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::embeddings::EmbeddingService;
use crate::memory::{content_hash, MemoryType};
use crate::storage::{Filter, GraphStoreAdapter, VectorStoreAdapter};

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error(transparent)]
    Vector(#[from] crate::storage::VectorStoreError),
    #[error(transparent)]
    Graph(#[from] crate::storage::GraphStoreError),
    #[error(transparent)]
    Embedding(#[from] crate::embeddings::EmbeddingError),
}

pub type Result<T> = std::result::Result<T, NormalizeError>;

/// The 7 named phases, run in order unless a subset is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Snapshot,
    Deduplication,
    OrphanDetection,
    EmbeddingRefresh,
    Cleanup,
    Validation,
    Swap,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Snapshot => "snapshot",
            Phase::Deduplication => "deduplication",
            Phase::OrphanDetection => "orphan_detection",
            Phase::EmbeddingRefresh => "embedding_refresh",
            Phase::Cleanup => "cleanup",
            Phase::Validation => "validation",
            Phase::Swap => "swap",
        }
    }

    pub fn all() -> &'static [Phase] {
        &[
            Phase::Snapshot,
            Phase::Deduplication,
            Phase::OrphanDetection,
            Phase::EmbeddingRefresh,
            Phase::Cleanup,
            Phase::Validation,
            Phase::Swap,
        ]
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a single phase. Carries every field spec.md §4.5's statistics
/// note requires; fields a given phase doesn't populate stay at their
/// zero/true default.
#[derive(Debug, Clone)]
pub struct PhaseResult {
    pub phase: Phase,
    pub duration_ms: u64,
    pub memories_processed: usize,
    pub actions: Vec<String>,
    pub duplicates_found: u64,
    pub orphans_found: u64,
    pub refreshed: u64,
    pub items_deleted: u64,
    pub valid: bool,
}

impl PhaseResult {
    fn new(phase: Phase, start: Instant, memories_processed: usize, actions: Vec<String>) -> Self {
        Self {
            phase,
            duration_ms: start.elapsed().as_millis() as u64,
            memories_processed,
            actions,
            duplicates_found: 0,
            orphans_found: 0,
            refreshed: 0,
            items_deleted: 0,
            valid: true,
        }
    }
}

struct DedupChange {
    collection: String,
    id: Uuid,
    previous: Value,
}

/// Per-run bookkeeping: shadow collections/sets created, and enough history
/// to undo a dedup merge on rollback (spec.md §4.5 "Rollback").
#[derive(Default)]
struct Journal {
    shadow_vector_collections: Vec<(String, String)>,
    shadow_graph: Option<String>,
    dedup_changes: Vec<DedupChange>,
    working_collections: HashMap<MemoryType, String>,
}

impl Journal {
    fn collection_for(&self, memory_type: MemoryType) -> String {
        self.working_collections.get(&memory_type).cloned().unwrap_or_default()
    }
}

pub struct Normalizer {
    vectors: Arc<dyn VectorStoreAdapter>,
    graph: Arc<dyn GraphStoreAdapter>,
    embeddings: Arc<EmbeddingService>,
    project_id: String,
    theta_dedup: f32,
    retention: chrono::Duration,
}

impl Normalizer {
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
            project_id: project_id.into(),
            theta_dedup: 0.95,
            retention: chrono::Duration::days(30),
        }
    }

    pub fn with_theta_dedup(mut self, theta: f32) -> Self {
        self.theta_dedup = theta;
        self
    }

    pub fn with_retention(mut self, retention: chrono::Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Run every phase in order. See [`Self::run_phases`] to run a subset.
    pub async fn run(&self, job_id: &str, dry_run: bool) -> Result<Vec<PhaseResult>> {
        self.run_phases(Phase::all(), job_id, dry_run).await
    }

    /// Run only the given phases, in the order listed (spec.md §4.5:
    /// "executed in order unless a subset is specified"). On any phase's
    /// error, rolls back everything journaled so far and returns the error.
    pub async fn run_phases(&self, phases: &[Phase], job_id: &str, dry_run: bool) -> Result<Vec<PhaseResult>> {
        let mut journal = Journal::default();
        for &memory_type in MemoryType::all() {
            journal
                .working_collections
                .insert(memory_type, self.vectors.get_collection_name(&self.project_id, memory_type));
        }

        let mut results = Vec::with_capacity(phases.len());
        for &phase in phases {
            let outcome = match phase {
                Phase::Snapshot => self.phase_snapshot(job_id, dry_run, &mut journal).await,
                Phase::Deduplication => self.phase_deduplication(dry_run, &mut journal).await,
                Phase::OrphanDetection => self.phase_orphan_detection(dry_run, &journal).await,
                Phase::EmbeddingRefresh => self.phase_embedding_refresh(dry_run, &journal).await,
                Phase::Cleanup => self.phase_cleanup(dry_run, &journal).await,
                Phase::Validation => self.phase_validation(&journal).await,
                Phase::Swap => self.phase_swap(dry_run, &journal).await,
            };
            match outcome {
                Ok(result) => results.push(result),
                Err(err) => {
                    tracing::error!(phase = %phase, error = %err, "normalizer phase failed, rolling back");
                    if !dry_run {
                        self.rollback(&journal).await;
                    }
                    return Err(err);
                }
            }
        }
        Ok(results)
    }

    async fn rollback(&self, journal: &Journal) {
        for (shadow, _primary) in &journal.shadow_vector_collections {
            if let Err(err) = self.vectors.drop_collection(shadow).await {
                tracing::warn!(shadow = %shadow, error = %err, "failed to drop shadow collection during rollback");
            }
        }
        if let Some(shadow_id) = &journal.shadow_graph {
            if let Err(err) = self.graph.swap_project(shadow_id, &self.project_id).await {
                tracing::warn!(shadow_id = %shadow_id, error = %err, "failed to restore graph snapshot during rollback");
                if let Err(err) = self.graph.drop_snapshot(shadow_id).await {
                    tracing::warn!(shadow_id = %shadow_id, error = %err, "failed to drop graph snapshot during rollback");
                }
            }
        }
        for change in journal.dedup_changes.iter().rev() {
            if let Err(err) = self.vectors.update_payload(&change.collection, change.id, change.previous.clone()).await {
                tracing::warn!(id = %change.id, error = %err, "failed to restore dedup change during rollback");
            }
        }
    }

    /// Phase 1: clone every active collection/label to a shadow set so
    /// later phases can stage their rewrites (spec.md §4.5 step 1).
    /// Backends that don't support staging (the default trait impl) are
    /// skipped rather than failing the whole run.
    async fn phase_snapshot(&self, job_id: &str, dry_run: bool, journal: &mut Journal) -> Result<PhaseResult> {
        let start = Instant::now();
        let mut actions = Vec::new();
        let mut processed = 0usize;

        if dry_run {
            actions.push("dry run: would snapshot every collection and the graph project set".into());
            return Ok(PhaseResult::new(Phase::Snapshot, start, 0, actions));
        }

        for &memory_type in MemoryType::all() {
            let primary = journal.collection_for(memory_type);
            match self.vectors.snapshot_collection(&primary, job_id).await {
                Ok(shadow) => {
                    actions.push(format!("staged {primary} as {shadow}"));
                    journal.working_collections.insert(memory_type, shadow.clone());
                    journal.shadow_vector_collections.push((shadow, primary));
                    processed += 1;
                }
                Err(err) => {
                    tracing::debug!(collection = %primary, error = %err, "staging not supported, phases will mutate this collection directly");
                }
            }
        }

        match self.graph.snapshot_project(&self.project_id, job_id).await {
            Ok(shadow_id) => {
                actions.push("snapshotted graph project set for rollback".into());
                journal.shadow_graph = Some(shadow_id);
            }
            Err(err) => {
                tracing::debug!(error = %err, "graph snapshot not supported, rollback of graph mutations unavailable");
            }
        }

        Ok(PhaseResult::new(Phase::Snapshot, start, processed, actions))
    }

    /// Phase 2: cluster near-duplicate records and mark all but the
    /// canonical one as merged (spec.md §4.5 step 2).
    async fn phase_deduplication(&self, dry_run: bool, journal: &mut Journal) -> Result<PhaseResult> {
        let start = Instant::now();
        let mut actions = Vec::new();
        let mut processed = 0usize;
        let mut duplicates_found = 0u64;
        let mut visited: HashSet<Uuid> = HashSet::new();
        let filter = Filter::scoped(&self.project_id);

        for &memory_type in MemoryType::all() {
            let collection = journal.collection_for(memory_type);
            let records = self.scroll_all(&collection, &filter).await?;
            processed += records.len();

            for record in &records {
                if visited.contains(&record.id) {
                    continue;
                }
                visited.insert(record.id);

                let Some(point) = self.vectors.get(&collection, record.id, true).await? else { continue };
                let Some(vector) = point.vector else { continue };
                let hits = self.vectors.search(&collection, &vector, 50, &filter, Some(self.theta_dedup)).await?;
                let cluster: Vec<Uuid> = hits.into_iter().map(|h| h.id).filter(|id| *id != record.id).collect();
                if cluster.is_empty() {
                    continue;
                }

                duplicates_found += cluster.len() as u64;
                actions.push(format!("{collection}: {} duplicate(s) of {} merged", cluster.len(), record.id));

                for dup_id in cluster {
                    visited.insert(dup_id);
                    if dry_run {
                        continue;
                    }
                    if let Some(dup_point) = self.vectors.get(&collection, dup_id, false).await? {
                        journal.dedup_changes.push(DedupChange {
                            collection: collection.clone(),
                            id: dup_id,
                            previous: serde_json::json!({
                                "deleted": dup_point.payload.get("deleted").cloned().unwrap_or(Value::Bool(false)),
                                "deleted_at": dup_point.payload.get("deleted_at").cloned().unwrap_or(Value::Null),
                                "mergedInto": dup_point.payload.get("mergedInto").cloned().unwrap_or(Value::Null),
                            }),
                        });
                    }
                    self.vectors
                        .update_payload(
                            &collection,
                            dup_id,
                            serde_json::json!({
                                "deleted": true,
                                "deleted_at": Utc::now().to_rfc3339(),
                                "mergedInto": record.id.to_string(),
                            }),
                        )
                        .await?;
                }
            }
        }

        let mut result = PhaseResult::new(Phase::Deduplication, start, processed, actions);
        result.duplicates_found = duplicates_found;
        Ok(result)
    }

    /// Phase 3: two sweeps — clear payload references to absent/tombstoned
    /// ids, then drop graph edges whose endpoint is absent/tombstoned
    /// (spec.md §4.5 step 3).
    async fn phase_orphan_detection(&self, dry_run: bool, journal: &Journal) -> Result<PhaseResult> {
        let start = Instant::now();
        let mut actions = Vec::new();
        let mut processed = 0usize;
        let mut orphans_found = 0u64;
        let filter = Filter::scoped(&self.project_id);

        for &memory_type in MemoryType::all() {
            let collection = journal.collection_for(memory_type);
            let records = self.scroll_all(&collection, &filter).await?;
            processed += records.len();

            for record in &records {
                let Some(reference) = record.payload.get("containingClass").and_then(Value::as_str) else { continue };
                let Ok(target_id) = Uuid::parse_str(reference) else { continue };
                if self.record_is_live(journal, target_id).await? {
                    continue;
                }
                orphans_found += 1;
                actions.push(format!("{collection}: cleared dangling containingClass on {}", record.id));
                if !dry_run {
                    self.vectors
                        .update_payload(&collection, record.id, serde_json::json!({"containingClass": Value::Null}))
                        .await?;
                }
            }
        }

        if dry_run {
            actions.push("dry run: skipped removing dangling graph edges".into());
        } else {
            let removed = self.graph.remove_dangling_edges(&self.project_id).await.unwrap_or_else(|err| {
                tracing::debug!(error = %err, "remove_dangling_edges not supported by this adapter");
                0
            });
            if removed > 0 {
                orphans_found += removed;
                actions.push(format!("removed {removed} dangling graph edge(s)"));
            }
        }

        let mut result = PhaseResult::new(Phase::OrphanDetection, start, processed, actions);
        result.orphans_found = orphans_found;
        Ok(result)
    }

    /// Phase 4: re-embed records carrying a fallback embedding or a stale
    /// content hash (spec.md §4.5 step 4).
    async fn phase_embedding_refresh(&self, dry_run: bool, journal: &Journal) -> Result<PhaseResult> {
        let start = Instant::now();
        let mut actions = Vec::new();
        let mut processed = 0usize;
        let mut refreshed = 0u64;
        let filter = Filter::scoped(&self.project_id);

        for &memory_type in MemoryType::all() {
            let collection = journal.collection_for(memory_type);
            let records = self.scroll_all(&collection, &filter).await?;
            processed += records.len();

            for record in &records {
                let is_fallback = record.payload.get("embedding_is_fallback").and_then(Value::as_bool).unwrap_or(false);
                let content = record.payload.get("content").and_then(Value::as_str).unwrap_or_default();
                let stored_hash = record.payload.get("content_hash").and_then(Value::as_str).unwrap_or_default();
                let stale = !content.is_empty() && content_hash(content) != stored_hash;
                if !is_fallback && !stale {
                    continue;
                }

                refreshed += 1;
                actions.push(format!("{collection}: refreshed embedding for {}", record.id));
                if dry_run || content.is_empty() {
                    continue;
                }

                let outcome =
                    self.embeddings.embed_with_outcome(content, crate::embeddings::InputType::Document, false).await?;
                // upsert replaces the whole payload, so merge onto the
                // record's existing payload rather than the bare delta.
                let mut merged = record.payload.clone();
                if let Some(obj) = merged.as_object_mut() {
                    obj.insert("embedding_is_fallback".into(), Value::Bool(outcome.is_fallback));
                    obj.insert("content_hash".into(), Value::String(content_hash(content)));
                }
                self.vectors.upsert(&collection, record.id, &outcome.vector, merged).await?;
            }
        }

        let mut result = PhaseResult::new(Phase::EmbeddingRefresh, start, processed, actions);
        result.refreshed = refreshed;
        Ok(result)
    }

    /// Phase 5: hard-delete tombstoned records past the retention window
    /// (spec.md §4.5 step 5).
    async fn phase_cleanup(&self, dry_run: bool, journal: &Journal) -> Result<PhaseResult> {
        let start = Instant::now();
        let mut actions = Vec::new();
        let mut processed = 0usize;
        let mut items_deleted = 0u64;
        let now = Utc::now();
        let filter = Filter::new().eq("project_id", self.project_id.clone()).eq("deleted", true);

        for &memory_type in MemoryType::all() {
            let collection = journal.collection_for(memory_type);
            let records = self.scroll_all(&collection, &filter).await?;
            processed += records.len();

            for record in &records {
                let Some(deleted_at) = record.payload.get("deleted_at").and_then(Value::as_str) else { continue };
                let Ok(deleted_at) = chrono::DateTime::parse_from_rfc3339(deleted_at) else { continue };
                if now.signed_duration_since(deleted_at) < self.retention {
                    continue;
                }

                items_deleted += 1;
                actions.push(format!("{collection}: purged tombstoned {} past retention", record.id));
                if dry_run {
                    continue;
                }
                self.vectors.delete(&collection, record.id).await?;
                let _ = self.graph.delete_node(record.id, true).await;
            }
        }

        let mut result = PhaseResult::new(Phase::Cleanup, start, processed, actions);
        result.items_deleted = items_deleted;
        Ok(result)
    }

    /// Phase 6: re-count each collection and assert no record is stuck
    /// `PENDING` (spec.md §4.5 step 6).
    async fn phase_validation(&self, journal: &Journal) -> Result<PhaseResult> {
        let start = Instant::now();
        let mut actions = Vec::new();
        let mut processed = 0usize;
        let mut valid = true;
        let scoped = Filter::scoped(&self.project_id);

        for &memory_type in MemoryType::all() {
            let collection = journal.collection_for(memory_type);
            let count = self.vectors.count(&collection, &scoped).await?;
            processed += count as usize;
            actions.push(format!("{collection}: {count} active record(s)"));

            let pending = Filter::new()
                .eq("project_id", self.project_id.clone())
                .eq("deleted", false)
                .eq("sync_status", "PENDING");
            let pending_count = self.vectors.count(&collection, &pending).await?;
            if pending_count > 0 {
                valid = false;
                actions.push(format!("{collection}: {pending_count} record(s) still PENDING"));
            }
        }

        let mut result = PhaseResult::new(Phase::Validation, start, processed, actions);
        result.valid = valid;
        Ok(result)
    }

    /// Phase 7: cut staged shadow collections over their primaries (spec.md
    /// §4.5 step 7). A no-op wherever staging wasn't available.
    async fn phase_swap(&self, dry_run: bool, journal: &Journal) -> Result<PhaseResult> {
        let start = Instant::now();
        let mut actions = Vec::new();

        if dry_run {
            actions.push("dry run: would swap staged collections over their primaries".into());
            return Ok(PhaseResult::new(Phase::Swap, start, 0, actions));
        }

        let mut swapped = 0usize;
        for (shadow, primary) in &journal.shadow_vector_collections {
            self.vectors.swap_collection(shadow, primary).await?;
            actions.push(format!("swapped {shadow} over {primary}"));
            swapped += 1;
        }
        if let Some(shadow_id) = &journal.shadow_graph {
            // The graph snapshot is rollback-only (see module docs); dropping
            // it here discards the now-unneeded pre-run copy.
            if let Err(err) = self.graph.drop_snapshot(shadow_id).await {
                tracing::debug!(error = %err, "graph snapshot already gone");
            }
        }

        Ok(PhaseResult::new(Phase::Swap, start, swapped, actions))
    }

    async fn scroll_all(&self, collection: &str, filter: &Filter) -> Result<Vec<crate::storage::VectorPoint>> {
        let mut records = Vec::new();
        let mut offset = None;
        loop {
            let page = self.vectors.scroll(collection, filter, 500, offset).await?;
            records.extend(page.points);
            offset = page.next_offset;
            if offset.is_none() {
                break;
            }
        }
        Ok(records)
    }

    async fn record_is_live(&self, journal: &Journal, id: Uuid) -> Result<bool> {
        for &memory_type in MemoryType::all() {
            let collection = journal.collection_for(memory_type);
            if let Some(point) = self.vectors.get(&collection, id, false).await? {
                let deleted = point.payload.get("deleted").and_then(Value::as_bool).unwrap_or(false);
                return Ok(!deleted);
            }
        }
        Ok(false)
    }
}
