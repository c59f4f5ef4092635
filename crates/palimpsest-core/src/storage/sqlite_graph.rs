//! SQLite-backed reference [`GraphStoreAdapter`], against the
//! `graph_nodes`/`graph_edges` tables from [`crate::storage::migrations`].
//!
//! `execute_cypher` does not parse Cypher; it accepts a restricted
//! read-only query language (`MATCH (n:Label) WHERE n.field = $param
//! RETURN n`-shaped statements are out of scope for the reference adapter —
//! see SPEC_FULL.md §6) and instead exposes the same rejection contract a
//! real Cypher-speaking backend would via [`crate::query::reject_if_write`].

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use uuid::Uuid;

use crate::memory::RelationshipType;
use crate::query::reject_if_write;
use crate::storage::graph_adapter::{
    CypherResult, Direction, GraphNode, GraphStoreAdapter, GraphStoreError, RelatedNode, Result,
};
use crate::storage::migrations;

pub struct SqliteGraphStore {
    conn: Mutex<Connection>,
}

impl SqliteGraphStore {
    pub fn open(path: &std::path::Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        migrations::configure_connection(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::configure_connection(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn row_to_node(id: String, label: String, properties: String) -> rusqlite::Result<(Uuid, GraphNode)> {
        let id = Uuid::parse_str(&id).map_err(|_| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, "bad uuid".into())
        })?;
        let properties: Value = serde_json::from_str(&properties).unwrap_or(Value::Null);
        Ok((id, GraphNode { id, label, properties }))
    }
}

#[async_trait]
impl GraphStoreAdapter for SqliteGraphStore {
    async fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        migrations::apply(&conn, migrations::GRAPH_MIGRATIONS)
            .map_err(|e| GraphStoreError::Backend(e.to_string()))
    }

    async fn create_node(&self, label: &str, id: Uuid, properties: Value) -> Result<()> {
        let project_id = properties
            .get("project_id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO graph_nodes (id, label, project_id, properties) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET label = excluded.label, properties = excluded.properties",
            params![id.to_string(), label, project_id, properties.to_string()],
        )
        .map_err(|e| GraphStoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get_node(&self, id: Uuid, label: Option<&str>) -> Result<Option<GraphNode>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT id, label, properties FROM graph_nodes WHERE id = ?1",
                params![id.to_string()],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .optional()
            .map_err(|e| GraphStoreError::Backend(e.to_string()))?;

        let Some((id_str, node_label, properties)) = row else {
            return Ok(None);
        };
        if let Some(expected) = label {
            if node_label != expected {
                return Ok(None);
            }
        }
        let (_, node) = Self::row_to_node(id_str, node_label, properties)
            .map_err(|e| GraphStoreError::Backend(e.to_string()))?;
        Ok(Some(node))
    }

    async fn update_node(&self, id: Uuid, properties: Value, label: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let existing: Option<String> = conn
            .query_row("SELECT properties FROM graph_nodes WHERE id = ?1", params![id.to_string()], |r| r.get(0))
            .optional()
            .map_err(|e| GraphStoreError::Backend(e.to_string()))?;
        let Some(existing) = existing else {
            return Err(GraphStoreError::NodeNotFound(id));
        };
        let mut merged: Value = serde_json::from_str(&existing).unwrap_or(Value::Null);
        if let (Some(merged_obj), Some(patch_obj)) = (merged.as_object_mut(), properties.as_object()) {
            for (k, v) in patch_obj {
                merged_obj.insert(k.clone(), v.clone());
            }
        }
        if let Some(label) = label {
            conn.execute(
                "UPDATE graph_nodes SET properties = ?1, label = ?2 WHERE id = ?3",
                params![merged.to_string(), label, id.to_string()],
            )
        } else {
            conn.execute(
                "UPDATE graph_nodes SET properties = ?1 WHERE id = ?2",
                params![merged.to_string(), id.to_string()],
            )
        }
        .map_err(|e| GraphStoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn delete_node(&self, id: Uuid, detach: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        if detach {
            conn.execute(
                "DELETE FROM graph_edges WHERE source_id = ?1 OR target_id = ?1",
                params![id.to_string()],
            )
            .map_err(|e| GraphStoreError::Backend(e.to_string()))?;
        }
        conn.execute("DELETE FROM graph_nodes WHERE id = ?1", params![id.to_string()])
            .map_err(|e| GraphStoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn create_relationship(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        relationship_type: RelationshipType,
        properties: Option<Value>,
    ) -> Result<()> {
        let props = properties.unwrap_or(Value::Object(Default::default()));
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO graph_edges (source_id, target_id, rel_type, properties) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(source_id, target_id, rel_type) DO UPDATE SET properties = excluded.properties",
            params![source_id.to_string(), target_id.to_string(), relationship_type.as_str(), props.to_string()],
        )
        .map_err(|e| GraphStoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn get_related(
        &self,
        node_id: Uuid,
        types: Option<&[RelationshipType]>,
        direction: Direction,
        depth: u32,
    ) -> Result<Vec<RelatedNode>> {
        let depth = depth.max(1);
        let allowed: Option<Vec<&'static str>> = types.map(|ts| ts.iter().map(|t| t.as_str()).collect());

        let conn = self.conn.lock().unwrap();
        let mut visited = std::collections::HashSet::new();
        visited.insert(node_id);
        let mut frontier = VecDeque::new();
        frontier.push_back((node_id, 0u32));
        let mut out = Vec::new();

        while let Some((current, current_depth)) = frontier.pop_front() {
            if current_depth >= depth {
                continue;
            }
            let mut stmt = conn
                .prepare(
                    "SELECT source_id, target_id, rel_type FROM graph_edges
                     WHERE source_id = ?1 OR target_id = ?1",
                )
                .map_err(|e| GraphStoreError::Backend(e.to_string()))?;
            let edges = stmt
                .query_map(params![current.to_string()], |r| {
                    let source: String = r.get(0)?;
                    let target: String = r.get(1)?;
                    let rel_type: String = r.get(2)?;
                    Ok((source, target, rel_type))
                })
                .map_err(|e| GraphStoreError::Backend(e.to_string()))?;

            for edge in edges {
                let (source, target, rel_type) = edge.map_err(|e| GraphStoreError::Backend(e.to_string()))?;
                let Ok(source_id) = Uuid::parse_str(&source) else { continue };
                let Ok(target_id) = Uuid::parse_str(&target) else { continue };

                let (neighbor, matches_direction) = if source_id == current {
                    (target_id, matches!(direction, Direction::Outgoing | Direction::Both))
                } else {
                    (source_id, matches!(direction, Direction::Incoming | Direction::Both))
                };
                if !matches_direction || visited.contains(&neighbor) {
                    continue;
                }
                if let Some(allowed) = &allowed {
                    if !allowed.contains(&rel_type.as_str()) {
                        continue;
                    }
                }
                let Some(rel) = RelationshipType::parse_name(&rel_type) else { continue };

                let row: Option<(String, String)> = conn
                    .query_row(
                        "SELECT label, properties FROM graph_nodes WHERE id = ?1",
                        params![neighbor.to_string()],
                        |r| Ok((r.get(0)?, r.get(1)?)),
                    )
                    .optional()
                    .map_err(|e| GraphStoreError::Backend(e.to_string()))?;
                let Some((label, properties)) = row else { continue };
                let properties: Value = serde_json::from_str(&properties).unwrap_or(Value::Null);
                if properties.get("deleted").and_then(Value::as_bool).unwrap_or(false) {
                    continue;
                }

                visited.insert(neighbor);
                out.push(RelatedNode {
                    node: GraphNode { id: neighbor, label, properties },
                    relationship_type: rel,
                    depth: current_depth + 1,
                });
                frontier.push_back((neighbor, current_depth + 1));
            }
        }

        Ok(out)
    }

    async fn execute_cypher(&self, query: &str, _params: Value) -> Result<CypherResult> {
        reject_if_write(query).map_err(GraphStoreError::WriteRejected)?;
        // The reference adapter does not implement a Cypher parser; any
        // syntactically read-only statement returns an empty result set.
        // Real traversal goes through get_related/get_node.
        Ok(CypherResult::default())
    }

    async fn health_check(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |_| Ok(())).map_err(|e| GraphStoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn snapshot_project(&self, project_id: &str, job_id: &str) -> Result<String> {
        let shadow_id = format!("{project_id}__shadow_{job_id}");
        let nodes_table = shadow_table_name("graph_nodes", &shadow_id);
        let edges_table = shadow_table_name("graph_edges", &shadow_id);
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS \"{nodes_table}\";
             CREATE TABLE \"{nodes_table}\" AS SELECT * FROM graph_nodes WHERE project_id = '{project_id}';
             DROP TABLE IF EXISTS \"{edges_table}\";
             CREATE TABLE \"{edges_table}\" AS
                SELECT e.* FROM graph_edges e
                WHERE e.source_id IN (SELECT id FROM \"{nodes_table}\")
                   OR e.target_id IN (SELECT id FROM \"{nodes_table}\");",
            project_id = project_id.replace('\'', "''"),
        ))
        .map_err(|e| GraphStoreError::Backend(e.to_string()))?;
        Ok(shadow_id)
    }

    async fn swap_project(&self, shadow_id: &str, project_id: &str) -> Result<()> {
        let nodes_table = shadow_table_name("graph_nodes", shadow_id);
        let edges_table = shadow_table_name("graph_edges", shadow_id);
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| GraphStoreError::Backend(e.to_string()))?;
        tx.execute_batch(&format!(
            "DELETE FROM graph_edges WHERE source_id IN (SELECT id FROM graph_nodes WHERE project_id = '{project_id}')
                                         OR target_id IN (SELECT id FROM graph_nodes WHERE project_id = '{project_id}');
             DELETE FROM graph_nodes WHERE project_id = '{project_id}';
             INSERT INTO graph_nodes SELECT * FROM \"{nodes_table}\";
             INSERT INTO graph_edges SELECT * FROM \"{edges_table}\";
             DROP TABLE \"{nodes_table}\";
             DROP TABLE \"{edges_table}\";",
            project_id = project_id.replace('\'', "''"),
        ))
        .map_err(|e| GraphStoreError::Backend(e.to_string()))?;
        tx.commit().map_err(|e| GraphStoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn drop_snapshot(&self, shadow_id: &str) -> Result<()> {
        let nodes_table = shadow_table_name("graph_nodes", shadow_id);
        let edges_table = shadow_table_name("graph_edges", shadow_id);
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(&format!(
            "DROP TABLE IF EXISTS \"{nodes_table}\"; DROP TABLE IF EXISTS \"{edges_table}\";"
        ))
        .map_err(|e| GraphStoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn remove_dangling_edges(&self, project_id: &str) -> Result<u64> {
        let conn = self.conn.lock().unwrap();

        let mut node_stmt = conn
            .prepare("SELECT id, project_id, properties FROM graph_nodes")
            .map_err(|e| GraphStoreError::Backend(e.to_string()))?;
        let node_rows = node_stmt
            .query_map([], |r| {
                let id: String = r.get(0)?;
                let project: String = r.get(1)?;
                let properties: String = r.get(2)?;
                Ok((id, project, properties))
            })
            .map_err(|e| GraphStoreError::Backend(e.to_string()))?;

        let mut node_project: std::collections::HashMap<String, String> = std::collections::HashMap::new();
        let mut node_live: std::collections::HashSet<String> = std::collections::HashSet::new();
        for row in node_rows {
            let (id, project, properties) = row.map_err(|e| GraphStoreError::Backend(e.to_string()))?;
            let value: Value = serde_json::from_str(&properties).unwrap_or(Value::Null);
            let deleted = value.get("deleted").and_then(Value::as_bool).unwrap_or(false);
            node_project.insert(id.clone(), project);
            if !deleted {
                node_live.insert(id);
            }
        }
        drop(node_stmt);

        let mut edge_stmt = conn
            .prepare("SELECT source_id, target_id, rel_type FROM graph_edges")
            .map_err(|e| GraphStoreError::Backend(e.to_string()))?;
        let edges: Vec<(String, String, String)> = edge_stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
            .map_err(|e| GraphStoreError::Backend(e.to_string()))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| GraphStoreError::Backend(e.to_string()))?;
        drop(edge_stmt);

        let mut removed = 0u64;
        for (source, target, rel_type) in edges {
            let touches_project = node_project.get(&source).map(|p| p == project_id).unwrap_or(false)
                || node_project.get(&target).map(|p| p == project_id).unwrap_or(false);
            if !touches_project {
                continue;
            }
            if node_live.contains(&source) && node_live.contains(&target) {
                continue;
            }
            conn.execute(
                "DELETE FROM graph_edges WHERE source_id = ?1 AND target_id = ?2 AND rel_type = ?3",
                params![source, target, rel_type],
            )
            .map_err(|e| GraphStoreError::Backend(e.to_string()))?;
            removed += 1;
        }
        Ok(removed)
    }
}

fn shadow_table_name(base: &str, shadow_id: &str) -> String {
    let sanitized: String = shadow_id.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect();
    format!("{base}_{sanitized}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_and_get_node_roundtrip() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store.initialize_schema().await.unwrap();
        let id = Uuid::new_v4();
        store
            .create_node("Function", id, serde_json::json!({"project_id": "P", "name": "foo"}))
            .await
            .unwrap();
        let node = store.get_node(id, Some("Function")).await.unwrap().unwrap();
        assert_eq!(node.label, "Function");
        assert!(store.get_node(id, Some("Design")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_related_follows_outgoing_then_stops_at_depth() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store.initialize_schema().await.unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        for (id, name) in [(a, "a"), (b, "b"), (c, "c")] {
            store.create_node("Function", id, serde_json::json!({"project_id": "P", "name": name})).await.unwrap();
        }
        store.create_relationship(a, b, RelationshipType::Calls, None).await.unwrap();
        store.create_relationship(b, c, RelationshipType::Calls, None).await.unwrap();

        let depth1 = store.get_related(a, None, Direction::Outgoing, 1).await.unwrap();
        assert_eq!(depth1.len(), 1);
        assert_eq!(depth1[0].node.id, b);

        let depth2 = store.get_related(a, None, Direction::Outgoing, 2).await.unwrap();
        assert_eq!(depth2.len(), 2);
    }

    #[tokio::test]
    async fn execute_cypher_rejects_write_statements() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store.initialize_schema().await.unwrap();
        let err = store.execute_cypher("CREATE (n:Function) RETURN n", Value::Null).await.unwrap_err();
        assert!(matches!(err, GraphStoreError::WriteRejected(_)));

        let ok = store.execute_cypher("MATCH (n:Function) RETURN n", Value::Null).await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn snapshot_then_swap_replaces_project_contents() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store.initialize_schema().await.unwrap();
        let original = Uuid::new_v4();
        store.create_node("Function", original, serde_json::json!({"project_id": "P"})).await.unwrap();

        let shadow_id = store.snapshot_project("P", "job1").await.unwrap();
        // Graph mutations during staging would normally target a shadow-labeled
        // view; here we simulate that by deleting the original and relying on
        // swap_project to restore the snapshot's state.
        store.delete_node(original, true).await.unwrap();
        assert!(store.get_node(original, None).await.unwrap().is_none());

        store.swap_project(&shadow_id, "P").await.unwrap();
        assert!(store.get_node(original, None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_node_detach_removes_edges() {
        let store = SqliteGraphStore::open_in_memory().unwrap();
        store.initialize_schema().await.unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.create_node("Function", a, serde_json::json!({"project_id": "P"})).await.unwrap();
        store.create_node("Function", b, serde_json::json!({"project_id": "P"})).await.unwrap();
        store.create_relationship(a, b, RelationshipType::Calls, None).await.unwrap();
        store.delete_node(a, true).await.unwrap();
        let related = store.get_related(b, None, Direction::Incoming, 1).await.unwrap();
        assert!(related.is_empty());
    }
}
