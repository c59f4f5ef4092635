//! SQLite-backed reference [`VectorStoreAdapter`].
//!
//! One table per collection (`"{project_id}__{type}"`), brute-force cosine
//! scan on `search` — acceptable at the scale a single-project memory
//! service operates at (see SPEC_FULL.md §6). Grounded in the teacher's
//! `Storage` (writer `Mutex<Connection>`, `&self` methods so the type is
//! `Send + Sync` and usable behind a plain `Arc`).

use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use uuid::Uuid;

use crate::memory::MemoryType;
use crate::storage::filter::Filter;
use crate::storage::migrations;
use crate::storage::vector_adapter::{
    validate_dimensions, Result, ScrollPage, VectorHit, VectorPoint, VectorStoreAdapter,
    VectorStoreError,
};

pub struct SqliteVectorStore {
    project_id: String,
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    pub fn open(path: &std::path::Path, project_id: impl Into<String>) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        migrations::configure_connection(&conn)?;
        Ok(Self { project_id: project_id.into(), conn: Mutex::new(conn) })
    }

    pub fn open_in_memory(project_id: impl Into<String>) -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::configure_connection(&conn)?;
        Ok(Self { project_id: project_id.into(), conn: Mutex::new(conn) })
    }

    fn quoted(collection: &str) -> String {
        format!("\"{}\"", collection.replace('"', "\"\""))
    }

    fn vector_to_blob(vector: &[f32]) -> Vec<u8> {
        vector.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn blob_to_vector(blob: &[u8]) -> Vec<f32> {
        blob.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn row_fields(payload: &Value, id: Uuid) -> serde_json::Map<String, Value> {
        let mut fields = payload.as_object().cloned().unwrap_or_default();
        fields.insert("id".to_string(), Value::String(id.to_string()));
        fields
    }
}

#[async_trait]
impl VectorStoreAdapter for SqliteVectorStore {
    async fn initialize_collections(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        for memory_type in MemoryType::all() {
            let collection = self.get_collection_name(&self.project_id, *memory_type);
            let table = Self::quoted(&collection);
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    vector BLOB NOT NULL,
                    payload TEXT NOT NULL
                );"
            ))
            .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        }
        Ok(())
    }

    async fn upsert(&self, collection: &str, id: Uuid, vector: &[f32], payload: Value) -> Result<()> {
        validate_dimensions(vector)?;
        let table = Self::quoted(collection);
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!("INSERT INTO {table} (id, vector, payload) VALUES (?1, ?2, ?3)
                      ON CONFLICT(id) DO UPDATE SET vector = excluded.vector, payload = excluded.payload"),
            params![id.to_string(), Self::vector_to_blob(vector), payload.to_string()],
        )
        .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, collection: &str, id: Uuid, with_vector: bool) -> Result<Option<VectorPoint>> {
        let table = Self::quoted(collection);
        let conn = self.conn.lock().unwrap();
        let row: Option<(Vec<u8>, String)> = conn
            .query_row(
                &format!("SELECT vector, payload FROM {table} WHERE id = ?1"),
                params![id.to_string()],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()
            .map_err(|e| VectorStoreError::Backend(e.to_string()))?;

        Ok(row.map(|(vector_blob, payload_json)| VectorPoint {
            id,
            vector: with_vector.then(|| Self::blob_to_vector(&vector_blob)),
            payload: serde_json::from_str(&payload_json).unwrap_or(Value::Null),
        }))
    }

    async fn delete(&self, collection: &str, id: Uuid) -> Result<()> {
        let table = Self::quoted(collection);
        let conn = self.conn.lock().unwrap();
        conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id.to_string()])
            .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn update_payload(&self, collection: &str, id: Uuid, partial_payload: Value) -> Result<()> {
        let table = Self::quoted(collection);
        let conn = self.conn.lock().unwrap();
        let existing: Option<String> = conn
            .query_row(&format!("SELECT payload FROM {table} WHERE id = ?1"), params![id.to_string()], |r| r.get(0))
            .optional()
            .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        let Some(existing) = existing else {
            return Err(VectorStoreError::NotFound(id));
        };
        let mut merged: Value = serde_json::from_str(&existing).unwrap_or(Value::Null);
        if let (Some(merged_obj), Some(patch_obj)) = (merged.as_object_mut(), partial_payload.as_object()) {
            for (k, v) in patch_obj {
                merged_obj.insert(k.clone(), v.clone());
            }
        }
        conn.execute(
            &format!("UPDATE {table} SET payload = ?1 WHERE id = ?2"),
            params![merged.to_string(), id.to_string()],
        )
        .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filters: &Filter,
        score_threshold: Option<f32>,
    ) -> Result<Vec<VectorHit>> {
        let table = Self::quoted(collection);
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!("SELECT id, vector, payload FROM {table}"))
            .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        let rows = stmt
            .query_map([], |r| {
                let id: String = r.get(0)?;
                let vector_blob: Vec<u8> = r.get(1)?;
                let payload: String = r.get(2)?;
                Ok((id, vector_blob, payload))
            })
            .map_err(|e| VectorStoreError::Backend(e.to_string()))?;

        let mut hits = Vec::new();
        for row in rows {
            let (id_str, vector_blob, payload_json) = row.map_err(|e| VectorStoreError::Backend(e.to_string()))?;
            let Ok(id) = Uuid::parse_str(&id_str) else { continue };
            let payload: Value = serde_json::from_str(&payload_json).unwrap_or(Value::Null);
            let fields = Self::row_fields(&payload, id);
            if !filters.matches(&fields) {
                continue;
            }
            let stored_vector = Self::blob_to_vector(&vector_blob);
            let score = crate::storage::vector_adapter::cosine_similarity(vector, &stored_vector);
            if let Some(threshold) = score_threshold {
                if score < threshold {
                    continue;
                }
            }
            hits.push(VectorHit { id, score, payload });
        }

        // Deterministic tie-breaking is applied one layer up by the Query
        // Engine (score desc, updated_at desc, id) per spec.md §4.3/§9;
        // here we only guarantee a stable score-descending order.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn scroll(
        &self,
        collection: &str,
        filters: &Filter,
        limit: usize,
        offset: Option<String>,
    ) -> Result<ScrollPage> {
        let table = Self::quoted(collection);
        let start: i64 = offset.and_then(|o| o.parse().ok()).unwrap_or(0);
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!("SELECT id, payload FROM {table} ORDER BY id"))
            .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        let rows = stmt
            .query_map([], |r| {
                let id: String = r.get(0)?;
                let payload: String = r.get(1)?;
                Ok((id, payload))
            })
            .map_err(|e| VectorStoreError::Backend(e.to_string()))?;

        let mut matching = Vec::new();
        for row in rows {
            let (id_str, payload_json) = row.map_err(|e| VectorStoreError::Backend(e.to_string()))?;
            let Ok(id) = Uuid::parse_str(&id_str) else { continue };
            let payload: Value = serde_json::from_str(&payload_json).unwrap_or(Value::Null);
            let fields = Self::row_fields(&payload, id);
            if filters.matches(&fields) {
                matching.push(VectorPoint { id, vector: None, payload });
            }
        }

        let end = (start as usize + limit).min(matching.len());
        let page = matching[(start as usize).min(matching.len())..end].to_vec();
        let next_offset = if end < matching.len() { Some(end.to_string()) } else { None };
        Ok(ScrollPage { points: page, next_offset })
    }

    async fn count(&self, collection: &str, filters: &Filter) -> Result<u64> {
        let page = self.scroll(collection, filters, usize::MAX, None).await?;
        Ok(page.points.len() as u64)
    }

    async fn health_check(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |_| Ok(())).map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn snapshot_collection(&self, collection: &str, job_id: &str) -> Result<String> {
        let shadow = format!("{collection}__shadow_{job_id}");
        let source_table = Self::quoted(collection);
        let shadow_table = Self::quoted(&shadow);
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS {shadow_table};
             CREATE TABLE {shadow_table} AS SELECT * FROM {source_table};"
        ))
        .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        Ok(shadow)
    }

    async fn swap_collection(&self, shadow_collection: &str, primary_collection: &str) -> Result<()> {
        let shadow_table = Self::quoted(shadow_collection);
        let primary_table = Self::quoted(primary_collection);
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        tx.execute_batch(&format!(
            "DELETE FROM {primary_table};
             INSERT INTO {primary_table} SELECT * FROM {shadow_table};
             DROP TABLE {shadow_table};"
        ))
        .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        tx.commit().map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn drop_collection(&self, collection: &str) -> Result<()> {
        let table = Self::quoted(collection);
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))
            .map_err(|e| VectorStoreError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteVectorStore {
        SqliteVectorStore::open_in_memory("TestProject").unwrap()
    }

    #[tokio::test]
    async fn upsert_and_get_roundtrip() {
        let store = store();
        store.initialize_collections().await.unwrap();
        let collection = store.get_collection_name("TestProject", MemoryType::Function);
        let id = Uuid::new_v4();
        let vector = vec![0.1f32; crate::memory::EMBEDDING_DIMENSIONS];
        store.upsert(&collection, id, &vector, serde_json::json!({"project_id": "TestProject", "deleted": false})).await.unwrap();

        let point = store.get(&collection, id, true).await.unwrap().unwrap();
        assert_eq!(point.id, id);
        assert_eq!(point.vector.unwrap().len(), vector.len());
    }

    #[tokio::test]
    async fn search_respects_filters_and_threshold() {
        let store = store();
        store.initialize_collections().await.unwrap();
        let collection = store.get_collection_name("TestProject", MemoryType::Function);

        let mut v1 = vec![0.0f32; crate::memory::EMBEDDING_DIMENSIONS];
        v1[0] = 1.0;
        let id1 = Uuid::new_v4();
        store.upsert(&collection, id1, &v1, serde_json::json!({"project_id": "TestProject", "deleted": false})).await.unwrap();

        let mut v2 = vec![0.0f32; crate::memory::EMBEDDING_DIMENSIONS];
        v2[1] = 1.0;
        let id2 = Uuid::new_v4();
        store.upsert(&collection, id2, &v2, serde_json::json!({"project_id": "TestProject", "deleted": false})).await.unwrap();

        let filter = Filter::scoped("TestProject");
        let hits = store.search(&collection, &v1, 10, &filter, Some(0.9)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id1);
    }

    #[tokio::test]
    async fn snapshot_then_swap_replaces_primary_contents() {
        let store = store();
        store.initialize_collections().await.unwrap();
        let collection = store.get_collection_name("TestProject", MemoryType::Function);
        let original_id = Uuid::new_v4();
        let vector = vec![0.0f32; crate::memory::EMBEDDING_DIMENSIONS];
        store.upsert(&collection, original_id, &vector, serde_json::json!({"project_id": "TestProject", "deleted": false})).await.unwrap();

        let shadow = store.snapshot_collection(&collection, "job1").await.unwrap();
        // Mutate the shadow only: add a new point that should become primary after swap.
        let shadow_id = Uuid::new_v4();
        store.upsert(&shadow, shadow_id, &vector, serde_json::json!({"project_id": "TestProject", "deleted": false})).await.unwrap();
        store.delete(&shadow, original_id).await.unwrap();

        store.swap_collection(&shadow, &collection).await.unwrap();

        assert!(store.get(&collection, original_id, false).await.unwrap().is_none());
        assert!(store.get(&collection, shadow_id, false).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_removes_point() {
        let store = store();
        store.initialize_collections().await.unwrap();
        let collection = store.get_collection_name("TestProject", MemoryType::Function);
        let id = Uuid::new_v4();
        let vector = vec![0.0f32; crate::memory::EMBEDDING_DIMENSIONS];
        store.upsert(&collection, id, &vector, serde_json::json!({})).await.unwrap();
        store.delete(&collection, id).await.unwrap();
        assert!(store.get(&collection, id, false).await.unwrap().is_none());
    }
}
