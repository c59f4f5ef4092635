//! Schema for the reference SQLite-backed adapters.
//!
//! Grounded in the teacher's `storage/migrations.rs` (`pub const MIGRATIONS`
//! list of `{version, description, up}` entries applied in order) and in
//! `examples/original_source/src/memory_service/storage/cache.py`'s table
//! shape for the embedding cache.

/// One migration step.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

pub const GRAPH_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "graph nodes and edges",
        up: r#"
CREATE TABLE IF NOT EXISTS graph_nodes (
    id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    project_id TEXT NOT NULL,
    properties TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_graph_nodes_project ON graph_nodes(project_id);
CREATE INDEX IF NOT EXISTS idx_graph_nodes_label ON graph_nodes(label);

CREATE TABLE IF NOT EXISTS graph_edges (
    source_id TEXT NOT NULL,
    target_id TEXT NOT NULL,
    rel_type TEXT NOT NULL,
    properties TEXT NOT NULL DEFAULT '{}',
    PRIMARY KEY (source_id, target_id, rel_type)
);
CREATE INDEX IF NOT EXISTS idx_graph_edges_source ON graph_edges(source_id);
CREATE INDEX IF NOT EXISTS idx_graph_edges_target ON graph_edges(target_id);
"#,
    },
];

pub const VECTOR_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "per-collection vector points table is created on demand by initialize_collections",
    up: "",
}];

pub const CACHE_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "embedding cache, mirrors memory_service/storage/cache.py",
    up: r#"
CREATE TABLE IF NOT EXISTS embeddings (
    cache_key TEXT PRIMARY KEY,
    embedding BLOB NOT NULL,
    model TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    is_fallback INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    last_accessed_at TEXT NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_embeddings_last_accessed ON embeddings(last_accessed_at);
CREATE INDEX IF NOT EXISTS idx_embeddings_created_at ON embeddings(created_at);
"#,
}];

pub fn apply(conn: &rusqlite::Connection, migrations: &[Migration]) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER PRIMARY KEY);",
    )?;
    let current: u32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))
        .unwrap_or(0);

    for migration in migrations {
        if migration.version > current && !migration.up.is_empty() {
            conn.execute_batch(migration.up)?;
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                rusqlite::params![migration.version],
            )?;
        }
    }
    Ok(())
}

/// Apply the standard performance pragmas (grounded in the teacher's
/// `Storage::configure_connection`).
pub fn configure_connection(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;",
    )
}
