//! Parser/Indexer (spec.md §4.6): walks a project directory, extracts
//! function/class/import/call structure per file with `tree-sitter`, and
//! turns that structure into `Function`/`Component` memories through the
//! Memory Manager. Gated behind the `parser` feature since the six grammar
//! crates it pulls in are the heaviest part of this crate's dependency tree.

pub mod ignore_walk;
pub mod indexer;
pub mod language;
pub mod languages;
pub mod model;

pub use ignore_walk::discover_files;
pub use indexer::{IndexError, IndexSummary, Indexer};
pub use language::{LanguageParser, LanguageSpec};
pub use model::{CallEntity, ClassEntity, FunctionEntity, ParseError, ParsedFile};
