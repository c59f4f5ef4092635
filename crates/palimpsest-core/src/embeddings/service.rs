//! Embedding Service with Cache (spec.md §4.4): cache-first retrieval,
//! automatic fallback-on-provider-failure, batch embedding with cache
//! separation. Grounded in `memory_service/embedding/service.py`.

use std::sync::Arc;

use crate::embeddings::cache::EmbeddingCache;
use crate::embeddings::provider::{EmbeddingError, EmbeddingProvider, InputType};
use crate::memory::EMBEDDING_DIMENSIONS;

/// One embedding result plus whether it came from the fallback model.
#[derive(Debug, Clone)]
pub struct EmbeddingOutcome {
    pub vector: Vec<f32>,
    pub is_fallback: bool,
}

pub struct EmbeddingService {
    primary: Arc<dyn EmbeddingProvider>,
    fallback: Option<Arc<dyn EmbeddingProvider>>,
    cache: Arc<EmbeddingCache>,
}

impl EmbeddingService {
    pub fn new(
        primary: Arc<dyn EmbeddingProvider>,
        fallback: Option<Arc<dyn EmbeddingProvider>>,
        cache: Arc<EmbeddingCache>,
    ) -> Self {
        Self { primary, fallback, cache }
    }

    /// Document-path embedding: cache-first, written back to cache on miss.
    pub async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_with_outcome(text, InputType::Document, true).await?.vector)
    }

    /// Query-path embedding: cache-bypass permitted per spec.md §4.3, but we
    /// still consult the cache since queries often repeat near-verbatim.
    pub async fn embed_query(&self, text: &str) -> std::result::Result<Vec<f32>, EmbeddingError> {
        Ok(self.embed_with_outcome(text, InputType::Query, true).await?.vector)
    }

    pub async fn embed_with_outcome(
        &self,
        text: &str,
        input_type: InputType,
        use_cache: bool,
    ) -> std::result::Result<EmbeddingOutcome, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        if use_cache {
            if let Some(hit) = self.cache.get(text, self.primary.name()) {
                return Ok(EmbeddingOutcome { vector: hit.vector, is_fallback: hit.is_fallback });
            }
        }

        match self.primary.embed(text, input_type).await {
            Ok(vector) => {
                validate_dimensions(&vector)?;
                if use_cache {
                    self.cache.set(text, self.primary.name(), &vector, false);
                }
                Ok(EmbeddingOutcome { vector, is_fallback: false })
            }
            Err(primary_err) => {
                let Some(fallback) = &self.fallback else {
                    return Err(primary_err);
                };
                tracing::warn!(error = %primary_err, "primary embedding provider failed, using fallback");
                let vector = fallback.embed(text, input_type).await?;
                validate_dimensions(&vector)?;
                if use_cache {
                    self.cache.set(text, self.primary.name(), &vector, true);
                }
                Ok(EmbeddingOutcome { vector, is_fallback: true })
            }
        }
    }

    /// Batch embed, separating cache hits from texts that need a provider
    /// round trip (mirrors `embed_batch`'s cache-separation strategy).
    pub async fn embed_batch(&self, texts: &[String]) -> std::result::Result<Vec<EmbeddingOutcome>, EmbeddingError> {
        let mut results: Vec<Option<EmbeddingOutcome>> = vec![None; texts.len()];
        let mut misses = Vec::new();

        for (i, text) in texts.iter().enumerate() {
            if let Some(hit) = self.cache.get(text, self.primary.name()) {
                results[i] = Some(EmbeddingOutcome { vector: hit.vector, is_fallback: hit.is_fallback });
            } else {
                misses.push(i);
            }
        }

        if !misses.is_empty() {
            let miss_texts: Vec<String> = misses.iter().map(|&i| texts[i].clone()).collect();
            let (vectors, is_fallback) = match self.primary.embed_batch(&miss_texts, InputType::Document).await {
                Ok(vectors) => (vectors, false),
                Err(primary_err) => {
                    let Some(fallback) = &self.fallback else {
                        return Err(primary_err);
                    };
                    tracing::warn!(error = %primary_err, "primary embedding provider failed for batch, using fallback");
                    (fallback.embed_batch(&miss_texts, InputType::Document).await?, true)
                }
            };
            for (&idx, vector) in misses.iter().zip(vectors.into_iter()) {
                validate_dimensions(&vector)?;
                self.cache.set(&texts[idx], self.primary.name(), &vector, is_fallback);
                results[idx] = Some(EmbeddingOutcome { vector, is_fallback });
            }
        }

        Ok(results.into_iter().map(|r| r.expect("every index filled")).collect())
    }
}

fn validate_dimensions(vector: &[f32]) -> std::result::Result<(), EmbeddingError> {
    if vector.len() != EMBEDDING_DIMENSIONS {
        return Err(EmbeddingError::DimensionMismatch { expected: EMBEDDING_DIMENSIONS, actual: vector.len() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::provider::LocalFallbackProvider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysFails;
    #[async_trait]
    impl EmbeddingProvider for AlwaysFails {
        fn name(&self) -> &'static str {
            "always-fails"
        }
        async fn embed(&self, _text: &str, _input_type: InputType) -> crate::embeddings::provider::Result<Vec<f32>> {
            Err(EmbeddingError::ProviderFailed("simulated outage".into()))
        }
    }

    struct CountingFixed(AtomicUsize);
    #[async_trait]
    impl EmbeddingProvider for CountingFixed {
        fn name(&self) -> &'static str {
            "counting-fixed"
        }
        async fn embed(&self, _text: &str, _input_type: InputType) -> crate::embeddings::provider::Result<Vec<f32>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0.5f32; EMBEDDING_DIMENSIONS])
        }
    }

    #[tokio::test]
    async fn cache_hit_skips_provider() {
        let provider = Arc::new(CountingFixed(AtomicUsize::new(0)));
        let cache = Arc::new(EmbeddingCache::open_in_memory(100, 30).unwrap());
        let service = EmbeddingService::new(provider.clone(), None, cache);

        service.embed("same text").await.unwrap();
        service.embed("same text").await.unwrap();
        assert_eq!(provider.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn falls_back_when_primary_fails() {
        let cache = Arc::new(EmbeddingCache::open_in_memory(100, 30).unwrap());
        let service = EmbeddingService::new(Arc::new(AlwaysFails), Some(Arc::new(LocalFallbackProvider)), cache);
        let outcome = service.embed("anything").await.unwrap();
        assert!(outcome.is_fallback);
        assert_eq!(outcome.vector.len(), EMBEDDING_DIMENSIONS);
    }

    #[tokio::test]
    async fn propagates_error_without_fallback() {
        let cache = Arc::new(EmbeddingCache::open_in_memory(100, 30).unwrap());
        let service = EmbeddingService::new(Arc::new(AlwaysFails), None, cache);
        assert!(service.embed("anything").await.is_err());
    }

    #[tokio::test]
    async fn empty_text_rejected_before_provider() {
        let cache = Arc::new(EmbeddingCache::open_in_memory(100, 30).unwrap());
        let service = EmbeddingService::new(Arc::new(AlwaysFails), None, cache);
        assert!(matches!(service.embed("").await, Err(EmbeddingError::EmptyInput)));
    }
}
