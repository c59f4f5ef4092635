//! Small data-building helpers shared across the integration suites.

use palimpsest_core::memory::{Memory, MemoryType, RelationshipType};
use uuid::Uuid;

use super::TestEnvironment;

/// Adds a memory of the given type and content, conflict detection off,
/// and returns its id.
pub async fn add(env: &TestEnvironment, memory_type: MemoryType, content: &str) -> Uuid {
    let memory = Memory::new(env.project_id.clone(), memory_type, content);
    let (id, _conflicts) = env.manager.add(memory, false).await.expect("add should succeed");
    id
}

/// Links two existing memories with a typed edge directly on the graph
/// store, the same way the Memory Manager's `Contains`/`Implements` edges
/// would be created by a higher-level ingestion flow (out of scope here).
pub async fn link(env: &TestEnvironment, source: Uuid, target: Uuid, relationship_type: RelationshipType) {
    env.graph
        .create_relationship(source, target, relationship_type, None)
        .await
        .expect("relationship creation should succeed");
}
