//! Embedding backends. [`Provider::Voyage`] is the primary backend (spec.md
//! §4.4); the concrete HTTP client is a thin, out-of-scope stub per spec.md
//! §1 — see SPEC_FULL.md §6. [`LocalFallbackProvider`] always succeeds and
//! exists so the service degrades instead of failing closed when the
//! primary API is unreachable.

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("input is empty")]
    EmptyInput,
    #[error("provider request failed: {0}")]
    ProviderFailed(String),
    #[error("embedding dimensions mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// A backend capable of turning text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn is_fallback(&self) -> bool {
        false
    }

    async fn embed(&self, text: &str, input_type: InputType) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text, input_type).await?);
        }
        Ok(out)
    }
}

/// Hints the backend how the text will be used; Voyage's asymmetric models
/// embed queries and documents differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Document,
    Query,
}

/// Thin Voyage AI client. Network access and the exact request/response
/// wire shape are out of scope (spec.md §1 Non-goals); this issues the
/// documented `POST /v1/embeddings` call and projects the first
/// `EMBEDDING_DIMENSIONS`-length result.
pub struct VoyageProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl VoyageProvider {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.voyageai.com/v1".to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(serde::Serialize)]
struct VoyageRequest<'a> {
    input: &'a [String],
    model: &'a str,
    input_type: &'a str,
}

#[derive(serde::Deserialize)]
struct VoyageResponse {
    data: Vec<VoyageEmbeddingData>,
}

#[derive(serde::Deserialize)]
struct VoyageEmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for VoyageProvider {
    fn name(&self) -> &'static str {
        "voyage-code-3"
    }

    async fn embed(&self, text: &str, input_type: InputType) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        let batch = self.embed_batch(std::slice::from_ref(&text.to_string()), input_type).await?;
        batch.into_iter().next().ok_or_else(|| EmbeddingError::ProviderFailed("empty response".into()))
    }

    async fn embed_batch(&self, texts: &[String], input_type: InputType) -> Result<Vec<Vec<f32>>> {
        let request = VoyageRequest {
            input: texts,
            model: &self.model,
            input_type: match input_type {
                InputType::Document => "document",
                InputType::Query => "query",
            },
        };
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::ProviderFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| EmbeddingError::ProviderFailed(e.to_string()))?
            .json::<VoyageResponse>()
            .await
            .map_err(|e| EmbeddingError::ProviderFailed(e.to_string()))?;

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Deterministic local fallback: a bag-of-characters hash projected into
/// [`crate::memory::EMBEDDING_DIMENSIONS`] dimensions and L2-normalized.
/// Not semantically meaningful, but stable and always available, so
/// `embedding_is_fallback=true` records degrade gracefully instead of
/// failing the whole write (spec.md §4.4).
pub struct LocalFallbackProvider;

#[async_trait]
impl EmbeddingProvider for LocalFallbackProvider {
    fn name(&self) -> &'static str {
        "local-fallback-hash"
    }

    fn is_fallback(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str, _input_type: InputType) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        let dims = crate::memory::EMBEDDING_DIMENSIONS;
        let mut vector = vec![0.0f32; dims];
        for (i, byte) in text.as_bytes().iter().enumerate() {
            let bucket = i % dims;
            vector[bucket] += (*byte as f32 + 1.0) * ((i / dims) as f32 + 1.0).recip();
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fallback_is_deterministic() {
        let provider = LocalFallbackProvider;
        let a = provider.embed("hello world", InputType::Document).await.unwrap();
        let b = provider.embed("hello world", InputType::Document).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), crate::memory::EMBEDDING_DIMENSIONS);
    }

    #[tokio::test]
    async fn fallback_rejects_empty_input() {
        let provider = LocalFallbackProvider;
        assert!(provider.embed("", InputType::Document).await.is_err());
    }

    #[tokio::test]
    async fn fallback_distinguishes_distinct_text() {
        let provider = LocalFallbackProvider;
        let a = provider.embed("alpha", InputType::Document).await.unwrap();
        let b = provider.embed("beta", InputType::Document).await.unwrap();
        assert_ne!(a, b);
    }
}
