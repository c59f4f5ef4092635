//! Section structs for the service's TOML configuration (spec.md §6).

use serde::{Deserialize, Serialize};

use super::secret::Secret;

/// Root configuration, one section per concern, exactly as spec.md §6 names
/// them: `[qdrant]`, `[neo4j]`, `[voyage]`, `[server]`, `[cache]`,
/// `[search]`, `[normalization]`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub qdrant: QdrantConfig,
    pub neo4j: Neo4jConfig,
    pub voyage: VoyageConfig,
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub search: SearchConfig,
    pub normalization: NormalizationConfig,
}

/// Vector store connection settings. `host`/`port` describe the production
/// Qdrant target; `sqlite_path` is specific to the reference
/// [`crate::storage::SqliteVectorStore`] adapter this repository ships in
/// Qdrant's place (SPEC_FULL.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QdrantConfig {
    pub host: String,
    pub port: u16,
    pub api_key: Option<Secret<String>>,
    pub sqlite_path: String,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6333,
            api_key: None,
            sqlite_path: "vectors.db".to_string(),
        }
    }
}

/// Graph store connection settings. `uri`/`user`/`password` describe the
/// production Neo4j target; `sqlite_path` is specific to the reference
/// [`crate::storage::SqliteGraphStore`] adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: Secret<String>,
    pub sqlite_path: String,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: Secret::new(String::new()),
            sqlite_path: "graph.db".to_string(),
        }
    }
}

/// Voyage AI embedding provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VoyageConfig {
    pub api_key: Secret<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for VoyageConfig {
    fn default() -> Self {
        Self {
            api_key: Secret::new(String::new()),
            model: "voyage-code-3".to_string(),
            timeout_secs: 30,
        }
    }
}

/// JSON-RPC-over-stdio server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), log_format: LogFormat::Text }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Embedding cache settings (spec.md §4.4), matching
/// [`crate::embeddings::EmbeddingCache::open`]'s `max_size`/`ttl_days`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    pub max_size: u64,
    pub ttl_days: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_size: 100_000, ttl_days: 30 }
    }
}

/// Query Engine defaults (spec.md §4.3); tool implementations apply these
/// when a caller omits `limit`/`score_threshold`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    pub default_score_threshold: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { default_limit: 10, max_limit: 100, default_score_threshold: 0.85 }
    }
}

/// Normalizer defaults (spec.md §4.5) plus the dead-letter threshold that
/// resolves spec.md §9's open per-record-retry-count question
/// (SPEC_FULL.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NormalizationConfig {
    pub theta_dedup: f32,
    pub retention_days: i64,
    pub max_sync_retries: u32,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self { theta_dedup: 0.95, retention_days: 30, max_sync_retries: 5 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let s = Settings::default();
        assert_eq!(s.qdrant.host, "localhost");
        assert_eq!(s.qdrant.port, 6333);
        assert_eq!(s.neo4j.uri, "bolt://localhost:7687");
        assert_eq!(s.neo4j.user, "neo4j");
        assert_eq!(s.voyage.model, "voyage-code-3");
        assert_eq!(s.cache.max_size, 100_000);
        assert_eq!(s.normalization.theta_dedup, 0.95);
        assert_eq!(s.normalization.max_sync_retries, 5);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults_for_missing_fields() {
        let toml_str = r#"
            [qdrant]
            host = "remotehost"

            [voyage]
            api_key = "test-api-key"
        "#;
        let s: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(s.qdrant.host, "remotehost");
        assert_eq!(s.qdrant.port, 6333);
        assert_eq!(s.voyage.api_key.expose(), "test-api-key");
        assert_eq!(s.voyage.model, "voyage-code-3");
    }
}
