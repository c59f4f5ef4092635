//! Memory Manager tools (spec.md §4.1): `add`/`get`/`update`/`delete`/`bulk_add`.

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use palimpsest_core::memory::{Memory, MemoryType, UpdateFields};

use crate::services::Services;

fn parse_memory_type(s: &str) -> Result<MemoryType, String> {
    MemoryType::parse_name(s).ok_or_else(|| format!("unknown memory type '{s}'"))
}

fn memory_to_value(memory: &Memory) -> Value {
    serde_json::to_value(memory).unwrap_or(Value::Null)
}

// ============================================================================
// add
// ============================================================================

pub fn add_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "content": { "type": "string", "description": "The memory's textual content" },
            "memoryType": {
                "type": "string",
                "description": "One of Requirements, Design, CodePattern, Component, Function, TestHistory, Session, UserPreference"
            },
            "payload": { "type": "object", "description": "Type-specific fields (filePath, startLine, containingClass, ...)" },
            "checkConflicts": { "type": "boolean", "default": true, "description": "Search for near-duplicate content before writing" }
        },
        "required": ["content", "memoryType"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddArgs {
    content: String,
    memory_type: String,
    payload: Option<Value>,
    #[serde(default = "default_true")]
    check_conflicts: bool,
}

fn default_true() -> bool {
    true
}

pub async fn execute_add(services: &Services, args: Option<Value>) -> Result<Value, String> {
    let args: AddArgs = serde_json::from_value(args.ok_or("missing arguments")?).map_err(|e| e.to_string())?;
    let memory_type = parse_memory_type(&args.memory_type)?;

    let mut memory = Memory::new(services.project_id.clone(), memory_type, args.content);
    if let Some(payload) = args.payload {
        memory.payload = serde_json::from_value(payload).map_err(|e| format!("invalid payload: {e}"))?;
    }

    let (id, conflicts) = services.manager.add(memory, args.check_conflicts).await.map_err(|e| e.to_string())?;
    Ok(serde_json::json!({ "id": id, "conflicts": conflicts }))
}

// ============================================================================
// get
// ============================================================================

pub fn get_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "id": { "type": "string", "format": "uuid" },
            "memoryType": { "type": "string" },
            "trackAccess": { "type": "boolean", "default": true }
        },
        "required": ["id", "memoryType"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetArgs {
    id: Uuid,
    memory_type: String,
    #[serde(default = "default_true")]
    track_access: bool,
}

pub async fn execute_get(services: &Services, args: Option<Value>) -> Result<Value, String> {
    let args: GetArgs = serde_json::from_value(args.ok_or("missing arguments")?).map_err(|e| e.to_string())?;
    let memory_type = parse_memory_type(&args.memory_type)?;

    let memory = services.manager.get(args.id, memory_type, args.track_access).await.map_err(|e| e.to_string())?;
    Ok(match memory {
        Some(m) => memory_to_value(&m),
        None => Value::Null,
    })
}

// ============================================================================
// update
// ============================================================================

pub fn update_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "id": { "type": "string", "format": "uuid" },
            "memoryType": { "type": "string" },
            "content": { "type": "string" },
            "importanceScore": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
            "payloadPatch": { "type": "object" },
            "regenerateEmbedding": { "type": "boolean", "default": false }
        },
        "required": ["id", "memoryType"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateArgs {
    id: Uuid,
    memory_type: String,
    content: Option<String>,
    importance_score: Option<f32>,
    payload_patch: Option<Value>,
    #[serde(default)]
    regenerate_embedding: bool,
}

pub async fn execute_update(services: &Services, args: Option<Value>) -> Result<Value, String> {
    let args: UpdateArgs = serde_json::from_value(args.ok_or("missing arguments")?).map_err(|e| e.to_string())?;
    let memory_type = parse_memory_type(&args.memory_type)?;

    let updates = UpdateFields { content: args.content, importance_score: args.importance_score, payload_patch: args.payload_patch };
    let memory = services
        .manager
        .update(args.id, memory_type, updates, args.regenerate_embedding)
        .await
        .map_err(|e| e.to_string())?;
    Ok(match memory {
        Some(m) => memory_to_value(&m),
        None => Value::Null,
    })
}

// ============================================================================
// delete
// ============================================================================

pub fn delete_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "id": { "type": "string", "format": "uuid" },
            "memoryType": { "type": "string" },
            "soft": { "type": "boolean", "default": true, "description": "Tombstone rather than hard-delete" }
        },
        "required": ["id", "memoryType"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteArgs {
    id: Uuid,
    memory_type: String,
    #[serde(default = "default_true")]
    soft: bool,
}

pub async fn execute_delete(services: &Services, args: Option<Value>) -> Result<Value, String> {
    let args: DeleteArgs = serde_json::from_value(args.ok_or("missing arguments")?).map_err(|e| e.to_string())?;
    let memory_type = parse_memory_type(&args.memory_type)?;

    let deleted = services.manager.delete(args.id, memory_type, args.soft).await.map_err(|e| e.to_string())?;
    Ok(serde_json::json!({ "deleted": deleted }))
}

// ============================================================================
// bulk_add
// ============================================================================

pub fn bulk_add_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "memories": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "content": { "type": "string" },
                        "memoryType": { "type": "string" },
                        "payload": { "type": "object" }
                    },
                    "required": ["content", "memoryType"]
                }
            },
            "checkConflicts": { "type": "boolean", "default": false }
        },
        "required": ["memories"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkAddItem {
    content: String,
    memory_type: String,
    payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkAddArgs {
    memories: Vec<BulkAddItem>,
    #[serde(default)]
    check_conflicts: bool,
}

pub async fn execute_bulk_add(services: &Services, args: Option<Value>) -> Result<Value, String> {
    let args: BulkAddArgs = serde_json::from_value(args.ok_or("missing arguments")?).map_err(|e| e.to_string())?;

    let mut memories = Vec::with_capacity(args.memories.len());
    for item in args.memories {
        let memory_type = parse_memory_type(&item.memory_type)?;
        let mut memory = Memory::new(services.project_id.clone(), memory_type, item.content);
        if let Some(payload) = item.payload {
            memory.payload = serde_json::from_value(payload).map_err(|e| format!("invalid payload: {e}"))?;
        }
        memories.push(memory);
    }

    let (ids, errors) = services.manager.bulk_add(memories, args.check_conflicts).await;
    let errors: Vec<Value> = errors
        .into_iter()
        .map(|(index, err)| serde_json::json!({ "index": index, "error": err.to_string() }))
        .collect();
    Ok(serde_json::json!({ "ids": ids, "errors": errors }))
}
