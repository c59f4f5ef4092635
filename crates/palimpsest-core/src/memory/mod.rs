//! Data model: memory records, payloads, relationships, content hashing,
//! and boundary validation. See SPEC_FULL.md §3.

mod hashing;
mod locks;
mod manager;
mod types;
mod validation;

pub use hashing::{content_hash, normalize_content};
pub use locks::IdLocks;
pub use manager::{MemoryManager, MemoryManagerError, UpdateFields};
pub(crate) use manager::{from_storage_payload, to_storage_payload};
pub use types::{
    Memory, MemoryPayload, MemoryType, ReferenceIndex, Relationship, RelationshipType,
    SyncStatus, EMBEDDING_DIMENSIONS, MAX_CONTENT_BYTES,
};
pub use validation::{is_valid_project_id, validate, ValidationError};
