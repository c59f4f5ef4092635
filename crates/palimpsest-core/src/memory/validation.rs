//! Boundary validation for incoming memories (spec.md §4.1, §7).
//!
//! Validation errors are recovered at the boundary and never propagate to
//! either store, per spec.md §7's error taxonomy.

use super::types::{Memory, EMBEDDING_DIMENSIONS, MAX_CONTENT_BYTES};

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("content exceeds {max} bytes (got {actual})")]
    ContentTooLarge { max: usize, actual: usize },
    #[error("content must not be empty")]
    EmptyContent,
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimensionMismatch { expected: usize, actual: usize },
    #[error("importance_score {0} out of range [0, 1]")]
    ImportanceOutOfRange(f32),
    #[error("project_id {0:?} does not match ^[A-Za-z0-9][A-Za-z0-9_-]{{0,63}}$")]
    InvalidProjectId(String),
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Validate a memory before it is handed to the Memory Manager's dual-write
/// path. Does not validate cross-store state — only locally-checkable shape.
pub fn validate(memory: &Memory) -> Result<()> {
    if memory.content.is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    if memory.content.len() > MAX_CONTENT_BYTES {
        return Err(ValidationError::ContentTooLarge {
            max: MAX_CONTENT_BYTES,
            actual: memory.content.len(),
        });
    }
    if let Some(ref embedding) = memory.embedding {
        if embedding.len() != EMBEDDING_DIMENSIONS {
            return Err(ValidationError::EmbeddingDimensionMismatch {
                expected: EMBEDDING_DIMENSIONS,
                actual: embedding.len(),
            });
        }
    }
    if !(0.0..=1.0).contains(&memory.importance_score) {
        return Err(ValidationError::ImportanceOutOfRange(memory.importance_score));
    }
    if !is_valid_project_id(&memory.project_id) {
        return Err(ValidationError::InvalidProjectId(memory.project_id.clone()));
    }
    Ok(())
}

/// Project id shape required by the CLI's `--project-id` flag (spec.md §6).
pub fn is_valid_project_id(id: &str) -> bool {
    let mut chars = id.chars();
    let Some(first) = chars.next() else { return false };
    if id.len() > 64 || !first.is_ascii_alphanumeric() {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::MemoryType;

    #[test]
    fn rejects_empty_content() {
        let mut m = Memory::new("proj", MemoryType::Function, "x");
        m.content.clear();
        assert!(matches!(validate(&m), Err(ValidationError::EmptyContent)));
    }

    #[test]
    fn rejects_oversized_content() {
        let big = "a".repeat(MAX_CONTENT_BYTES + 1);
        let m = Memory::new("proj", MemoryType::Function, big);
        assert!(matches!(validate(&m), Err(ValidationError::ContentTooLarge { .. })));
    }

    #[test]
    fn rejects_bad_embedding_dimension() {
        let mut m = Memory::new("proj", MemoryType::Function, "x");
        m.embedding = Some(vec![0.0; 7]);
        assert!(matches!(
            validate(&m),
            Err(ValidationError::EmbeddingDimensionMismatch { .. })
        ));
    }

    #[test]
    fn project_id_validation() {
        assert!(is_valid_project_id("MyProject"));
        assert!(is_valid_project_id("my-project_1"));
        assert!(!is_valid_project_id(""));
        assert!(!is_valid_project_id("-leading-dash"));
        assert!(!is_valid_project_id(&"a".repeat(65)));
        assert!(!is_valid_project_id("has space"));
    }

    #[test]
    fn case_sensitive_distinct_ids() {
        assert_ne!("MyProject", "myproject");
        assert!(is_valid_project_id("MyProject"));
        assert!(is_valid_project_id("myproject"));
    }
}
