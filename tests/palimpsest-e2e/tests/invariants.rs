//! Invariants that must hold regardless of which operation path produced a
//! given memory record.

use palimpsest_core::memory::{content_hash, MemoryType, RelationshipType, UpdateFields, EMBEDDING_DIMENSIONS};
use palimpsest_core::storage::{Direction, Filter};
use palimpsest_e2e::harness::{self, TestEnvironment};

#[tokio::test]
async fn embedding_dimension_is_fixed() {
    let env = TestEnvironment::new("Proj").await;
    let id = harness::add(&env, MemoryType::Function, "fn invariant_dims() {}").await;
    let memory = env.manager.get(id, MemoryType::Function, false).await.unwrap().unwrap();

    let dims = memory.embedding.map(|v| v.len()).unwrap_or(0);
    assert!(dims == 0 || dims == EMBEDDING_DIMENSIONS, "embedding dimension must be 0 or {EMBEDDING_DIMENSIONS}, was {dims}");
}

#[tokio::test]
async fn soft_delete_hides_from_get_search_and_related() {
    let env = TestEnvironment::new("Proj").await;
    let id = harness::add(&env, MemoryType::Requirements, "Users must be able to reset their password").await;

    env.manager.delete(id, MemoryType::Requirements, true).await.unwrap();

    assert!(env.manager.get(id, MemoryType::Requirements, false).await.unwrap().is_none());

    let hits = env
        .query
        .semantic_search("reset their password", None, Filter::new(), 10, None, None)
        .await
        .unwrap();
    assert!(hits.iter().all(|h| h.id != id), "soft-deleted memory must not surface in semantic_search");

    let related = env.query.get_related(id, None, Direction::Both, 1).await.unwrap();
    assert!(related.is_empty(), "a deleted entity has no queryable relations");
}

#[tokio::test]
async fn soft_deleted_neighbor_does_not_surface_through_a_live_source() {
    let env = TestEnvironment::new("Proj").await;
    let caller = harness::add(&env, MemoryType::Function, "fn a() { b() }").await;
    let callee = harness::add(&env, MemoryType::Function, "fn b() {}").await;
    harness::link(&env, caller, callee, RelationshipType::Calls).await;

    env.manager.delete(callee, MemoryType::Function, true).await.unwrap();

    let related = env.query.get_related(caller, None, Direction::Both, 1).await.unwrap();
    assert!(related.iter().all(|n| n.node.id != callee), "a soft-deleted neighbor must not be reachable from a live node");
}

#[tokio::test]
async fn id_stays_consistent_across_stores_after_sync() {
    let env = TestEnvironment::new("Proj").await;
    let id = harness::add(&env, MemoryType::Component, "struct Widget;").await;

    let stats = env.sync.process_pending(100).await.unwrap();
    assert_eq!(stats.failed, 0);

    let from_vector = env.manager.get(id, MemoryType::Component, false).await.unwrap().unwrap();
    let from_graph = env.graph.get_node(id, Some("Component")).await.unwrap().unwrap();
    assert_eq!(from_vector.id.to_string(), from_graph.id.to_string());
}

#[tokio::test]
async fn update_is_last_write_wins_on_updated_at() {
    let env = TestEnvironment::new("Proj").await;
    let id = harness::add(&env, MemoryType::Design, "Use a dual-store index: vectors for recall, a graph for structure").await;
    let first = env.manager.get(id, MemoryType::Design, false).await.unwrap().unwrap();

    let updated = env
        .manager
        .update(id, MemoryType::Design, UpdateFields { importance_score: Some(0.9), ..Default::default() }, false)
        .await
        .unwrap()
        .unwrap();

    assert!(updated.updated_at >= first.updated_at);
    let fetched = env.manager.get(id, MemoryType::Design, false).await.unwrap().unwrap();
    assert_eq!(fetched.importance_score, 0.9);
    assert_eq!(fetched.updated_at, updated.updated_at);
}

#[tokio::test]
async fn project_id_isolation_is_case_sensitive() {
    let env_a = TestEnvironment::new("Proj").await;
    let env_b = env_a.sibling_project("proj").await;

    harness::add(&env_a, MemoryType::Requirements, "Only Proj can authenticate via SSO").await;

    let hits_a = env_a.query.semantic_search("authenticate via SSO", None, Filter::new(), 10, None, None).await.unwrap();
    let hits_b = env_b.query.semantic_search("authenticate via SSO", None, Filter::new(), 10, None, None).await.unwrap();

    assert_eq!(hits_a.len(), 1, "the owning project must see its own memory");
    assert!(hits_b.is_empty(), "a differently-cased project id must not see another project's memories");
}

#[tokio::test]
async fn embedding_cache_is_deterministic_for_identical_content() {
    let env = TestEnvironment::new("Proj").await;
    let a = env
        .embeddings
        .embed_with_outcome("fn deterministic() {}", palimpsest_core::embeddings::InputType::Document, true)
        .await
        .unwrap();
    let b = env
        .embeddings
        .embed_with_outcome("fn deterministic() {}", palimpsest_core::embeddings::InputType::Document, true)
        .await
        .unwrap();
    assert_eq!(a.vector, b.vector, "identical content must hit the cache and return the same vector");
}

#[tokio::test]
async fn content_hash_is_stable_through_the_manager_across_line_ending_and_whitespace_variants() {
    let env = TestEnvironment::new("Proj").await;
    let canonical = "fn f() {\n    1 + 1;\n}\n";
    let reformatted = "fn f() {\r\n    1 + 1;   \r\n}\r\n\r\n\r\n";

    let id_a = harness::add(&env, MemoryType::Function, canonical).await;
    let stored = env.manager.get(id_a, MemoryType::Function, false).await.unwrap().unwrap();

    assert_eq!(stored.content_hash, content_hash(reformatted));
}
