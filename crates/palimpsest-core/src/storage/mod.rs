//! Dual-store abstraction: a [`vector_adapter::VectorStoreAdapter`] trait and
//! a [`graph_adapter::GraphStoreAdapter`] trait, each with a SQLite-backed
//! reference implementation, plus the [`filter::Filter`] predicates shared
//! between them. Grounded in the teacher's `storage/` module (`Storage`
//! struct wrapping a `Mutex<Connection>`, `migrations.rs` schema list).

pub mod filter;
pub mod graph_adapter;
pub mod migrations;
pub mod sqlite_graph;
pub mod sqlite_vector;
pub mod vector_adapter;

pub use filter::{Filter, Predicate};
pub use graph_adapter::{CypherResult, Direction, GraphNode, GraphStoreAdapter, GraphStoreError, RelatedNode};
pub use sqlite_graph::SqliteGraphStore;
pub use sqlite_vector::SqliteVectorStore;
pub use vector_adapter::{ScrollPage, VectorHit, VectorPoint, VectorStoreAdapter, VectorStoreError};
