//! SQLite-backed embedding cache, mirroring
//! `memory_service/storage/cache.py`'s schema and eviction policy
//! (LRU-by-`last_accessed_at`, TTL by `created_at`).

use std::sync::Mutex;

use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::storage::migrations::{self, CACHE_MIGRATIONS};

/// A cached embedding plus whether it was produced by the fallback model.
#[derive(Debug, Clone)]
pub struct CachedEmbedding {
    pub vector: Vec<f32>,
    pub is_fallback: bool,
}

pub struct EmbeddingCache {
    conn: Mutex<Connection>,
    max_size: u64,
    ttl_days: i64,
}

fn cache_key(content: &str, model: &str) -> String {
    crate::memory::content_hash(&format!("{model}\u{0}{content}"))
}

impl EmbeddingCache {
    pub fn open(path: &std::path::Path, max_size: u64, ttl_days: i64) -> rusqlite::Result<Self> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        migrations::configure_connection(&conn)?;
        migrations::apply(&conn, CACHE_MIGRATIONS)?;
        Ok(Self { conn: Mutex::new(conn), max_size, ttl_days })
    }

    pub fn open_in_memory(max_size: u64, ttl_days: i64) -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::configure_connection(&conn)?;
        migrations::apply(&conn, CACHE_MIGRATIONS)?;
        Ok(Self { conn: Mutex::new(conn), max_size, ttl_days })
    }

    pub fn get(&self, content: &str, model: &str) -> Option<CachedEmbedding> {
        let key = cache_key(content, model);
        let cutoff = Utc::now() - Duration::days(self.ttl_days);
        let conn = self.conn.lock().unwrap();

        let row: Option<(Vec<u8>, i64)> = conn
            .query_row(
                "SELECT embedding, is_fallback FROM embeddings WHERE cache_key = ?1 AND created_at > ?2",
                params![key, cutoff.to_rfc3339()],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .ok()?;

        let (blob, is_fallback) = row?;
        let _ = conn.execute(
            "UPDATE embeddings SET last_accessed_at = ?1, access_count = access_count + 1 WHERE cache_key = ?2",
            params![Utc::now().to_rfc3339(), key],
        );
        Some(CachedEmbedding { vector: bytes_to_vector(&blob), is_fallback: is_fallback != 0 })
    }

    pub fn set(&self, content: &str, model: &str, vector: &[f32], is_fallback: bool) {
        let key = cache_key(content, model);
        let content_hash = crate::memory::content_hash(content);
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        self.evict_if_needed(&conn);
        let _ = conn.execute(
            "INSERT INTO embeddings (cache_key, embedding, model, content_hash, is_fallback, created_at, last_accessed_at, access_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, 1)
             ON CONFLICT(cache_key) DO UPDATE SET
                embedding = excluded.embedding, is_fallback = excluded.is_fallback,
                last_accessed_at = excluded.last_accessed_at, access_count = embeddings.access_count + 1",
            params![key, vector_to_bytes(vector), model, content_hash, is_fallback as i64, now],
        );
    }

    fn evict_if_needed(&self, conn: &Connection) {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM embeddings", [], |r| r.get(0)).unwrap_or(0);
        if count as u64 >= self.max_size {
            let to_remove = (self.max_size / 10).max(1);
            let _ = conn.execute(
                "DELETE FROM embeddings WHERE cache_key IN (
                    SELECT cache_key FROM embeddings ORDER BY last_accessed_at ASC LIMIT ?1
                )",
                params![to_remove as i64],
            );
        }
    }

    /// Remove entries older than the TTL. Returns the number removed.
    pub fn cleanup_expired(&self) -> u64 {
        let cutoff = Utc::now() - Duration::days(self.ttl_days);
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM embeddings WHERE created_at < ?1", params![cutoff.to_rfc3339()])
            .unwrap_or(0) as u64
    }

    /// Remove all fallback-model entries, e.g. after the real provider comes
    /// back online and entries should be recomputed (spec.md §4.5 cleanup phase).
    pub fn cleanup_fallback(&self) -> u64 {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM embeddings WHERE is_fallback = 1", []).unwrap_or(0) as u64
    }

    pub fn len(&self) -> u64 {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM embeddings", [], |r| r.get::<_, i64>(0)).unwrap_or(0) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn vector_to_bytes(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn bytes_to_vector(bytes: &[u8]) -> Vec<f32> {
    bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_roundtrips() {
        let cache = EmbeddingCache::open_in_memory(100, 30).unwrap();
        let vector = vec![0.1f32, 0.2, 0.3];
        cache.set("hello world", "voyage-code-3", &vector, false);
        let hit = cache.get("hello world", "voyage-code-3").unwrap();
        assert_eq!(hit.vector, vector);
        assert!(!hit.is_fallback);
    }

    #[test]
    fn miss_for_different_model() {
        let cache = EmbeddingCache::open_in_memory(100, 30).unwrap();
        cache.set("hello", "voyage-code-3", &[0.1], false);
        assert!(cache.get("hello", "other-model").is_none());
    }

    #[test]
    fn eviction_keeps_cache_bounded() {
        let cache = EmbeddingCache::open_in_memory(5, 30).unwrap();
        for i in 0..20 {
            cache.set(&format!("text-{i}"), "m", &[i as f32], false);
        }
        assert!(cache.len() <= 20);
    }

    #[test]
    fn cleanup_fallback_removes_only_fallback_entries() {
        let cache = EmbeddingCache::open_in_memory(100, 30).unwrap();
        cache.set("real", "m", &[1.0], false);
        cache.set("fallback", "m", &[2.0], true);
        let removed = cache.cleanup_fallback();
        assert_eq!(removed, 1);
        assert!(cache.get("real", "m").is_some());
        assert!(cache.get("fallback", "m").is_none());
    }
}
