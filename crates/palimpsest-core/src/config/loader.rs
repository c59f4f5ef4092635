//! Loads [`Settings`] from defaults, an optional TOML file, and
//! `MEMSVC_`-prefixed environment variables, in that order of increasing
//! precedence (spec.md §6).

use std::path::{Path, PathBuf};

use super::error::{ConfigError, Result};
use super::settings::{LogFormat, Settings};

/// Directory name used under the platform config dir (e.g.
/// `~/.config/palimpsest/config.toml` on Linux).
const APP_NAME: &str = "palimpsest";

/// Default location for the TOML config file, following
/// `directories::ProjectDirs` the way the teacher resolves its own data
/// directories.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load settings: start from [`Settings::default`], overlay `path` if it
/// exists, then overlay `MEMSVC_*` environment variables. `path` not
/// existing is not an error — it just means defaults (plus env) apply.
pub fn load(path: Option<&Path>) -> Result<Settings> {
    let mut settings = match path {
        Some(p) if p.exists() => load_toml_file(p)?,
        _ => Settings::default(),
    };
    apply_env_overrides(&mut settings);
    Ok(settings)
}

fn load_toml_file(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadFile { path: path.to_path_buf(), source: e })?;
    toml::from_str(&content)
        .map_err(|e| ConfigError::ParseToml { path: path.to_path_buf(), source: Box::new(e) })
}

/// Write `settings` to `path` as pretty TOML, creating parent directories
/// as needed (`init-config` CLI command, SPEC_FULL.md §6).
pub fn save(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::WriteFile { path: path.to_path_buf(), source: e })?;
    }
    let content = toml::to_string_pretty(settings)?;
    std::fs::write(path, content)
        .map_err(|e| ConfigError::WriteFile { path: path.to_path_buf(), source: e })
}

fn env_str(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|s| !s.is_empty())
}

fn env_parsed<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|s| s.parse().ok())
}

/// Overlay every recognized `MEMSVC_<SECTION>_<FIELD>` variable onto
/// `settings`, in the style of the teacher's scattered
/// `std::env::var(...).ok().and_then(|s| s.parse().ok())` reads (see
/// `storage/sqlite.rs`'s `VESTIGE_RETENTION_TARGET` handling) but collected
/// in one place since this service's config surface is itself the point.
fn apply_env_overrides(settings: &mut Settings) {
    if let Some(v) = env_str("MEMSVC_QDRANT_HOST") {
        settings.qdrant.host = v;
    }
    if let Some(v) = env_parsed("MEMSVC_QDRANT_PORT") {
        settings.qdrant.port = v;
    }
    if let Some(v) = env_str("MEMSVC_QDRANT_API_KEY") {
        settings.qdrant.api_key = Some(v.into());
    }
    if let Some(v) = env_str("MEMSVC_QDRANT_SQLITE_PATH") {
        settings.qdrant.sqlite_path = v;
    }

    if let Some(v) = env_str("MEMSVC_NEO4J_URI") {
        settings.neo4j.uri = v;
    }
    if let Some(v) = env_str("MEMSVC_NEO4J_USER") {
        settings.neo4j.user = v;
    }
    if let Some(v) = env_str("MEMSVC_NEO4J_PASSWORD") {
        settings.neo4j.password = v.into();
    }
    if let Some(v) = env_str("MEMSVC_NEO4J_SQLITE_PATH") {
        settings.neo4j.sqlite_path = v;
    }

    if let Some(v) = env_str("MEMSVC_VOYAGE_API_KEY") {
        settings.voyage.api_key = v.into();
    }
    if let Some(v) = env_str("MEMSVC_VOYAGE_MODEL") {
        settings.voyage.model = v;
    }
    if let Some(v) = env_parsed("MEMSVC_VOYAGE_TIMEOUT_SECS") {
        settings.voyage.timeout_secs = v;
    }

    if let Some(v) = env_str("MEMSVC_SERVER_LOG_LEVEL") {
        settings.server.log_level = v;
    }
    if let Some(v) = env_str("MEMSVC_SERVER_LOG_FORMAT") {
        settings.server.log_format = match v.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    if let Some(v) = env_parsed("MEMSVC_CACHE_MAX_SIZE") {
        settings.cache.max_size = v;
    }
    if let Some(v) = env_parsed("MEMSVC_CACHE_TTL_DAYS") {
        settings.cache.ttl_days = v;
    }

    if let Some(v) = env_parsed("MEMSVC_SEARCH_DEFAULT_LIMIT") {
        settings.search.default_limit = v;
    }
    if let Some(v) = env_parsed("MEMSVC_SEARCH_MAX_LIMIT") {
        settings.search.max_limit = v;
    }
    if let Some(v) = env_parsed("MEMSVC_SEARCH_DEFAULT_SCORE_THRESHOLD") {
        settings.search.default_score_threshold = v;
    }

    if let Some(v) = env_parsed("MEMSVC_NORMALIZATION_THETA_DEDUP") {
        settings.normalization.theta_dedup = v;
    }
    if let Some(v) = env_parsed("MEMSVC_NORMALIZATION_RETENTION_DAYS") {
        settings.normalization.retention_days = v;
    }
    if let Some(v) = env_parsed("MEMSVC_NORMALIZATION_MAX_SYNC_RETRIES") {
        settings.normalization.max_sync_retries = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests mutate process-global environment variables. The crate's
    // test binary runs them on multiple threads by default, so each test
    // clears and re-sets only the keys it cares about and reads the result
    // immediately, mirroring the pattern in other example crates that poke
    // `std::env::set_var` directly rather than pulling in a serializing
    // test harness.
    fn clear_memsvc_env() {
        for (k, _) in std::env::vars() {
            if k.starts_with("MEMSVC_") {
                std::env::remove_var(k);
            }
        }
    }

    #[test]
    fn defaults_apply_when_no_file_and_no_env() {
        clear_memsvc_env();
        let settings = load(None).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn toml_file_overlays_defaults() {
        clear_memsvc_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [qdrant]
            host = "remotehost"
            port = 9999

            [neo4j]
            uri = "bolt://remotehost:7687"
            password = "testpass"

            [voyage]
            api_key = "test-api-key"
            "#,
        )
        .unwrap();

        let settings = load(Some(&path)).unwrap();
        assert_eq!(settings.qdrant.host, "remotehost");
        assert_eq!(settings.qdrant.port, 9999);
        assert_eq!(settings.neo4j.uri, "bolt://remotehost:7687");
        assert_eq!(settings.neo4j.password.expose(), "testpass");
        assert_eq!(settings.voyage.api_key.expose(), "test-api-key");
        // Untouched section keeps its default
        assert_eq!(settings.search.default_limit, 10);
    }

    #[test]
    fn env_vars_override_both_defaults_and_toml_file() {
        clear_memsvc_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[qdrant]\nhost = \"tomlhost\"\n").unwrap();

        std::env::set_var("MEMSVC_QDRANT_HOST", "envhost");
        std::env::set_var("MEMSVC_NORMALIZATION_MAX_SYNC_RETRIES", "9");
        let settings = load(Some(&path)).unwrap();
        clear_memsvc_env();

        assert_eq!(settings.qdrant.host, "envhost");
        assert_eq!(settings.normalization.max_sync_retries, 9);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        clear_memsvc_env();
        let settings = load(Some(Path::new("/nonexistent/path/config.toml"))).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut settings = Settings::default();
        settings.qdrant.host = "saved-host".to_string();

        save(&path, &settings).unwrap();
        assert!(path.exists());

        let loaded = load_toml_file(&path).unwrap();
        assert_eq!(loaded.qdrant.host, "saved-host");
    }
}
