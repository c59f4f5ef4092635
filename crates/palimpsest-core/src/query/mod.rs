//! Query Engine: the only read path exposed to callers (spec.md §4.3).

pub mod engine;
pub mod readonly;

pub use engine::{Match, QueryEngine, QueryError, SearchResult};
pub use readonly::reject_if_write;
