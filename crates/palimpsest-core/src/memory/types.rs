//! Core data model: memories, payload variants, and relationship types.
//!
//! See SPEC_FULL.md §3. Mirrors the teacher's tagged-variant approach
//! (`vestige-core`'s `NodeType`/`KnowledgeNode`) generalized to the eight
//! memory types and open-struct payloads spec.md §3 describes.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Fixed embedding dimensionality (spec.md §3 invariant).
pub const EMBEDDING_DIMENSIONS: usize = 1024;

/// Maximum content size for a memory record (spec.md §3).
pub const MAX_CONTENT_BYTES: usize = 100 * 1024;

// ============================================================================
// MEMORY TYPE
// ============================================================================

/// The eight memory types carried as common fields across the system.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum MemoryType {
    Requirements,
    Design,
    CodePattern,
    Component,
    Function,
    TestHistory,
    Session,
    UserPreference,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Requirements => "Requirements",
            MemoryType::Design => "Design",
            MemoryType::CodePattern => "CodePattern",
            MemoryType::Component => "Component",
            MemoryType::Function => "Function",
            MemoryType::TestHistory => "TestHistory",
            MemoryType::Session => "Session",
            MemoryType::UserPreference => "UserPreference",
        }
    }

    pub fn all() -> &'static [MemoryType] {
        &[
            MemoryType::Requirements,
            MemoryType::Design,
            MemoryType::CodePattern,
            MemoryType::Component,
            MemoryType::Function,
            MemoryType::TestHistory,
            MemoryType::Session,
            MemoryType::UserPreference,
        ]
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|t| t.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// SYNC STATUS
// ============================================================================

/// Per-record convergence state between the vector and graph stores (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "PENDING",
            SyncStatus::Synced => "SYNCED",
            SyncStatus::Failed => "FAILED",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(SyncStatus::Pending),
            "SYNCED" => Some(SyncStatus::Synced),
            "FAILED" => Some(SyncStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// RELATIONSHIP TYPE
// ============================================================================

/// The closed set of typed directed edges the graph store may hold (spec.md §3).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    Implements,
    SatisfiedBy,
    Addresses,
    TestedBy,
    Affects,
    FollowsPattern,
    DependsOn,
    Calls,
    Contains,
    Extends,
    Imports,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Implements => "IMPLEMENTS",
            RelationshipType::SatisfiedBy => "SATISFIED_BY",
            RelationshipType::Addresses => "ADDRESSES",
            RelationshipType::TestedBy => "TESTED_BY",
            RelationshipType::Affects => "AFFECTS",
            RelationshipType::FollowsPattern => "FOLLOWS_PATTERN",
            RelationshipType::DependsOn => "DEPENDS_ON",
            RelationshipType::Calls => "CALLS",
            RelationshipType::Contains => "CONTAINS",
            RelationshipType::Extends => "EXTENDS",
            RelationshipType::Imports => "IMPORTS",
        }
    }

    pub fn parse_name(s: &str) -> Option<Self> {
        Some(match s.to_uppercase().as_str() {
            "IMPLEMENTS" => RelationshipType::Implements,
            "SATISFIED_BY" => RelationshipType::SatisfiedBy,
            "ADDRESSES" => RelationshipType::Addresses,
            "TESTED_BY" => RelationshipType::TestedBy,
            "AFFECTS" => RelationshipType::Affects,
            "FOLLOWS_PATTERN" => RelationshipType::FollowsPattern,
            "DEPENDS_ON" => RelationshipType::DependsOn,
            "CALLS" => RelationshipType::Calls,
            "CONTAINS" => RelationshipType::Contains,
            "EXTENDS" => RelationshipType::Extends,
            "IMPORTS" => RelationshipType::Imports,
            _ => return None,
        })
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// PAYLOAD
// ============================================================================

/// Type-specific payload. Known fields are modeled explicitly; anything else
/// the caller supplied is preserved in `extra` and round-tripped opaquely,
/// per spec.md §3's "open struct subsets" language.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryPayload {
    pub requirement_id: Option<String>,
    pub design_type: Option<String>,
    pub pattern_name: Option<String>,
    pub file_path: Option<String>,
    pub start_line: Option<u32>,
    pub end_line: Option<u32>,
    pub language: Option<String>,
    pub containing_class: Option<String>,
    pub imports: Vec<String>,
    /// Set by the Normalizer's deduplication phase on non-canonical records.
    pub merged_into: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

// ============================================================================
// MEMORY
// ============================================================================

/// A typed, content-addressed, embedded record (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Memory {
    pub id: Uuid,
    pub memory_type: MemoryType,
    pub content: String,
    pub content_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub embedding_is_fallback: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub access_count: u64,
    pub importance_score: f32,
    pub deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
    pub project_id: String,
    pub payload: MemoryPayload,
}

impl Memory {
    /// Construct a new, not-yet-persisted memory. `content_hash` must be
    /// computed by the caller (see [`crate::memory::content_hash`]) before
    /// the Memory Manager accepts it.
    pub fn new(project_id: impl Into<String>, memory_type: MemoryType, content: impl Into<String>) -> Self {
        let now = Utc::now();
        let content = content.into();
        let content_hash = super::hashing::content_hash(&content);
        Self {
            id: Uuid::new_v4(),
            memory_type,
            content,
            content_hash,
            embedding: None,
            embedding_is_fallback: false,
            created_at: now,
            updated_at: now,
            access_count: 0,
            importance_score: 0.5,
            deleted: false,
            deleted_at: None,
            sync_status: SyncStatus::Pending,
            project_id: project_id.into(),
            payload: MemoryPayload::default(),
        }
    }

    pub fn is_queryable(&self) -> bool {
        !self.deleted
    }
}

/// A typed directed edge between two memory ids (spec.md §3). Edges carry no
/// data beyond their type and endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub relationship_type: RelationshipType,
}

/// Bookkeeping record threaded alongside payload fields that reference other
/// ids by string (e.g. `containing_class`), used by the orphan-detection
/// phase of the Normalizer (spec.md §4.5).
pub type ReferenceIndex = HashMap<String, Vec<String>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_type_roundtrip() {
        for t in MemoryType::all() {
            assert_eq!(MemoryType::parse_name(t.as_str()), Some(*t));
        }
    }

    #[test]
    fn relationship_type_roundtrip() {
        for t in [
            RelationshipType::Implements,
            RelationshipType::Calls,
            RelationshipType::Contains,
            RelationshipType::Imports,
        ] {
            assert_eq!(RelationshipType::parse_name(t.as_str()), Some(t));
        }
    }

    #[test]
    fn sync_status_roundtrip() {
        for s in [SyncStatus::Pending, SyncStatus::Synced, SyncStatus::Failed] {
            assert_eq!(SyncStatus::parse_name(s.as_str()), Some(s));
        }
    }

    #[test]
    fn new_memory_is_pending_and_queryable() {
        let m = Memory::new("proj", MemoryType::Requirements, "content");
        assert_eq!(m.sync_status, SyncStatus::Pending);
        assert!(m.is_queryable());
        assert!(!m.deleted);
    }
}
