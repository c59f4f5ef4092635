//! Concrete end-to-end scenarios a caller of the MCP surface would actually
//! run, each exercising the full Memory Manager / Query Engine / Sync
//! Manager / Normalizer stack together rather than one operation in
//! isolation.

use palimpsest_core::memory::{MemoryType, RelationshipType};
use palimpsest_core::normalize::Phase;
use palimpsest_core::storage::{Direction, Filter};
use palimpsest_e2e::harness::{self, TestEnvironment};

#[tokio::test]
async fn scenario_persist_then_search() {
    let env = TestEnvironment::new("Proj").await;
    harness::add(&env, MemoryType::Requirements, "The system must support offline password reset via email").await;

    let hits = env
        .query
        .semantic_search("password reset", None, Filter::new(), 10, None, None)
        .await
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert!(hits[0].content.contains("password reset"));
}

#[tokio::test]
async fn scenario_delete_hides_from_search() {
    let env = TestEnvironment::new("Proj").await;
    let id = harness::add(&env, MemoryType::Design, "Cache embeddings keyed by content hash and model name").await;

    let before = env.query.semantic_search("cache embeddings", None, Filter::new(), 10, None, None).await.unwrap();
    assert_eq!(before.len(), 1);

    env.manager.delete(id, MemoryType::Design, true).await.unwrap();

    let after = env.query.semantic_search("cache embeddings", None, Filter::new(), 10, None, None).await.unwrap();
    assert!(after.is_empty(), "deleted memory must not be returned by a subsequent search");
}

#[tokio::test]
async fn scenario_dedup_merges_near_duplicates() {
    let env = TestEnvironment::new("Proj").await;
    let canonical = harness::add(&env, MemoryType::Function, "fn parse_header(bytes: &[u8]) -> Header { todo!() }").await;
    harness::add(&env, MemoryType::Function, "fn parse_header(bytes: &[u8]) -> Header { todo!() }").await;

    let results = env.normalizer.run_phases(&[Phase::Deduplication], "dedup-scenario", false).await.unwrap();
    assert_eq!(results[0].duplicates_found, 1);

    let hits = env.query.semantic_search("parse_header", None, Filter::new(), 10, None, None).await.unwrap();
    assert_eq!(hits.len(), 1, "only the canonical record should remain queryable");
    assert_eq!(hits[0].id, canonical);
}

#[tokio::test]
async fn scenario_traceability_chain_depth_one_vs_two() {
    let env = TestEnvironment::new("Proj").await;
    let requirement = harness::add(&env, MemoryType::Requirements, "Users can export their data as JSON").await;
    let design = harness::add(&env, MemoryType::Design, "Streaming JSON serializer over the export endpoint").await;
    let pattern = harness::add(&env, MemoryType::CodePattern, "Writer adapter pattern for chunked serialization").await;

    harness::link(&env, design, requirement, RelationshipType::SatisfiedBy).await;
    harness::link(&env, pattern, design, RelationshipType::FollowsPattern).await;

    let depth_one = env.query.get_related(requirement, None, Direction::Incoming, 1).await.unwrap();
    assert_eq!(depth_one.len(), 1);
    assert_eq!(depth_one[0].node.id, design);

    let depth_two = env.query.get_related(requirement, None, Direction::Incoming, 2).await.unwrap();
    let ids: Vec<_> = depth_two.iter().map(|n| n.node.id).collect();
    assert!(ids.contains(&design));
    assert!(ids.contains(&pattern), "depth 2 must reach the pattern two hops from the requirement");
}

#[tokio::test]
async fn scenario_cross_project_isolation_is_case_sensitive() {
    let env_alpha = TestEnvironment::new("Acme").await;
    let env_beta = env_alpha.sibling_project("acme").await;

    harness::add(&env_alpha, MemoryType::UserPreference, "Prefers dark mode in the dashboard").await;
    harness::add(&env_beta, MemoryType::UserPreference, "Prefers light mode in the dashboard").await;

    let alpha_hits = env_alpha.query.semantic_search("dashboard preference", None, Filter::new(), 10, None, None).await.unwrap();
    let beta_hits = env_beta.query.semantic_search("dashboard preference", None, Filter::new(), 10, None, None).await.unwrap();

    assert_eq!(alpha_hits.len(), 1);
    assert_eq!(beta_hits.len(), 1);
    assert_ne!(alpha_hits[0].id, beta_hits[0].id, "\"Acme\" and \"acme\" must resolve to disjoint memory sets");
}

#[cfg(feature = "parser")]
#[tokio::test]
async fn scenario_path_traversal_is_rejected_before_any_write() {
    use palimpsest_core::storage::VectorStoreAdapter;

    let tmp = tempfile::tempdir().unwrap();
    let env = TestEnvironment::new("Proj").await;
    let indexer = palimpsest_core::parser::Indexer::new(env.manager.clone(), env.vectors.clone(), "Proj")
        .with_root(tmp.path());

    let outside = tmp.path().join("../etc/passwd");
    let result = indexer.index_path(&outside, false).await;
    assert!(result.is_err(), "a path resolving outside the project root must be rejected");

    let collection = env.vectors.get_collection_name("Proj", MemoryType::Component);
    let count = env.vectors.count(&collection, &Filter::scoped("Proj")).await.unwrap();
    assert_eq!(count, 0, "a rejected path must perform no vector write");
}
