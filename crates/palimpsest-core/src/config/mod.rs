//! Service configuration (spec.md §6): TOML file with sections `[qdrant]`,
//! `[neo4j]`, `[voyage]`, `[server]`, `[cache]`, `[search]`,
//! `[normalization]`, loaded defaults → TOML → `MEMSVC_`-prefixed
//! environment overrides. Secrets are wrapped in [`Secret`] so they never
//! reach a log line or a `Debug` dump.

mod error;
mod loader;
mod secret;
mod settings;

pub use error::{ConfigError, Result};
pub use loader::{default_config_path, load, save};
pub use secret::Secret;
pub use settings::{
    CacheConfig, LogFormat, Neo4jConfig, NormalizationConfig, QdrantConfig, SearchConfig,
    ServerConfig, Settings, VoyageConfig,
};
