//! Embedding generation with a persistent cache and automatic fallback
//! (spec.md §4.4).

pub mod cache;
pub mod provider;
pub mod service;

pub use cache::{CachedEmbedding, EmbeddingCache};
pub use provider::{EmbeddingError, EmbeddingProvider, InputType, LocalFallbackProvider, VoyageProvider};
pub use service::{EmbeddingOutcome, EmbeddingService};
