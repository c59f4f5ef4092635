//! Query Engine tools (spec.md §4.3): `semantic_search`, `get_related`,
//! `graph_query`, `find_duplicates`.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use palimpsest_core::memory::{MemoryType, RelationshipType};
use palimpsest_core::query::SearchResult;
use palimpsest_core::storage::{Direction, Filter, RelatedNode};

use crate::services::Services;

fn search_result_to_value(result: &SearchResult) -> Value {
    serde_json::json!({
        "id": result.id,
        "memoryType": result.memory_type.as_str(),
        "content": result.content,
        "score": result.score,
        "payload": result.payload,
        "updatedAt": result.updated_at.to_rfc3339(),
    })
}

fn related_node_to_value(related: &RelatedNode) -> Value {
    serde_json::json!({
        "id": related.node.id,
        "label": related.node.label,
        "properties": related.node.properties,
        "relationshipType": related.relationship_type.as_str(),
        "depth": related.depth,
    })
}

fn parse_direction(s: Option<&str>) -> Result<Direction, String> {
    Ok(match s.unwrap_or("both") {
        "incoming" => Direction::Incoming,
        "outgoing" => Direction::Outgoing,
        "both" => Direction::Both,
        other => return Err(format!("unknown direction '{other}', expected incoming/outgoing/both")),
    })
}

// ============================================================================
// semantic_search
// ============================================================================

pub fn semantic_search_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "query": { "type": "string" },
            "types": { "type": "array", "items": { "type": "string" }, "description": "Defaults to all eight memory types" },
            "filters": { "type": "object", "description": "Equality predicates over payload fields, ANDed together" },
            "limit": { "type": "integer", "default": 10, "minimum": 1, "maximum": 100 },
            "scoreThreshold": { "type": "number" },
            "contentTruncate": { "type": "integer" }
        },
        "required": ["query"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SemanticSearchArgs {
    query: String,
    types: Option<Vec<String>>,
    #[serde(default)]
    filters: HashMap<String, Value>,
    #[serde(default = "default_limit")]
    limit: usize,
    score_threshold: Option<f32>,
    content_truncate: Option<usize>,
}

fn default_limit() -> usize {
    10
}

pub async fn execute_semantic_search(services: &Services, args: Option<Value>) -> Result<Value, String> {
    let args: SemanticSearchArgs = serde_json::from_value(args.ok_or("missing arguments")?).map_err(|e| e.to_string())?;

    let types = match args.types {
        Some(names) => {
            let mut out = Vec::with_capacity(names.len());
            for name in names {
                out.push(MemoryType::parse_name(&name).ok_or_else(|| format!("unknown memory type '{name}'"))?);
            }
            Some(out)
        }
        None => None,
    };

    let mut extra_filters = Filter::new();
    for (field, value) in args.filters {
        extra_filters = extra_filters.eq(field, value);
    }

    let results = services
        .query
        .semantic_search(&args.query, types.as_deref(), extra_filters, args.limit, args.score_threshold, args.content_truncate)
        .await
        .map_err(|e| e.to_string())?;

    Ok(Value::Array(results.iter().map(search_result_to_value).collect()))
}

// ============================================================================
// get_related
// ============================================================================

pub fn get_related_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "entityId": { "type": "string", "format": "uuid" },
            "relationshipTypes": { "type": "array", "items": { "type": "string" } },
            "direction": { "type": "string", "enum": ["incoming", "outgoing", "both"], "default": "both" },
            "depth": { "type": "integer", "default": 1, "minimum": 1, "maximum": 5 }
        },
        "required": ["entityId"]
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetRelatedArgs {
    entity_id: Uuid,
    relationship_types: Option<Vec<String>>,
    direction: Option<String>,
    #[serde(default = "default_depth")]
    depth: u32,
}

fn default_depth() -> u32 {
    1
}

pub async fn execute_get_related(services: &Services, args: Option<Value>) -> Result<Value, String> {
    let args: GetRelatedArgs = serde_json::from_value(args.ok_or("missing arguments")?).map_err(|e| e.to_string())?;

    let relationship_types = match args.relationship_types {
        Some(names) => {
            let mut out = Vec::with_capacity(names.len());
            for name in names {
                out.push(RelationshipType::parse_name(&name).ok_or_else(|| format!("unknown relationship type '{name}'"))?);
            }
            Some(out)
        }
        None => None,
    };
    let direction = parse_direction(args.direction.as_deref())?;

    let related = services
        .query
        .get_related(args.entity_id, relationship_types.as_deref(), direction, args.depth)
        .await
        .map_err(|e| e.to_string())?;

    Ok(Value::Array(related.iter().map(related_node_to_value).collect()))
}

// ============================================================================
// graph_query
// ============================================================================

pub fn graph_query_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "cypher": { "type": "string", "description": "Read-only traversal statement; write statements are rejected" },
            "parameters": { "type": "object" }
        },
        "required": ["cypher"]
    })
}

#[derive(Debug, Deserialize)]
struct GraphQueryArgs {
    cypher: String,
    #[serde(default)]
    parameters: Value,
}

pub async fn execute_graph_query(services: &Services, args: Option<Value>) -> Result<Value, String> {
    let args: GraphQueryArgs = serde_json::from_value(args.ok_or("missing arguments")?).map_err(|e| e.to_string())?;
    let result = services.query.graph_query(&args.cypher, args.parameters).await.map_err(|e| e.to_string())?;
    Ok(serde_json::json!({ "rows": result.rows }))
}

// ============================================================================
// find_duplicates
// ============================================================================

pub fn find_duplicates_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "code": { "type": "string" },
            "language": { "type": "string" },
            "threshold": { "type": "number", "default": 0.85, "minimum": 0.70, "maximum": 0.95 }
        },
        "required": ["code"]
    })
}

#[derive(Debug, Deserialize)]
struct FindDuplicatesArgs {
    code: String,
    language: Option<String>,
    threshold: Option<f32>,
}

pub async fn execute_find_duplicates(services: &Services, args: Option<Value>) -> Result<Value, String> {
    let args: FindDuplicatesArgs = serde_json::from_value(args.ok_or("missing arguments")?).map_err(|e| e.to_string())?;
    let results = services
        .query
        .find_duplicates(&args.code, args.language.as_deref(), args.threshold)
        .await
        .map_err(|e| e.to_string())?;
    Ok(Value::Array(results.iter().map(search_result_to_value).collect()))
}
