//! Cross-Store Sync Manager tools (spec.md §4.2): `process_pending`,
//! `retry_failed`, `verify_consistency`.

use serde::Deserialize;
use serde_json::Value;

use palimpsest_core::sync::{ConsistencyReport, SyncStats};

use crate::services::Services;

fn stats_to_value(stats: &SyncStats) -> Value {
    serde_json::json!({ "synced": stats.synced, "failed": stats.failed, "deadLettered": stats.dead_lettered })
}

fn report_to_value(report: &ConsistencyReport) -> Value {
    serde_json::json!({
        "vectorOnly": report.vector_only,
        "graphOnly": report.graph_only,
        "mismatched": report.mismatched,
        "consistentCount": report.consistent_count,
    })
}

fn default_batch_size() -> usize {
    100
}

// ============================================================================
// process_pending
// ============================================================================

pub fn process_pending_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "batchSize": { "type": "integer", "default": 100, "minimum": 1 }
        }
    })
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct BatchArgs {
    #[serde(default = "default_batch_size")]
    batch_size: usize,
}

pub async fn execute_process_pending(services: &Services, args: Option<Value>) -> Result<Value, String> {
    let args: BatchArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| e.to_string())?,
        None => BatchArgs::default(),
    };
    let stats = services.sync.process_pending(args.batch_size).await.map_err(|e| e.to_string())?;
    Ok(stats_to_value(&stats))
}

// ============================================================================
// retry_failed
// ============================================================================

pub fn retry_failed_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "batchSize": { "type": "integer", "default": 100, "minimum": 1 },
            "includeDeadLetter": { "type": "boolean", "default": false, "description": "Force-retry records that already exhausted their retry budget" }
        }
    })
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RetryFailedArgs {
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default)]
    include_dead_letter: bool,
}

pub async fn execute_retry_failed(services: &Services, args: Option<Value>) -> Result<Value, String> {
    let args: RetryFailedArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| e.to_string())?,
        None => RetryFailedArgs::default(),
    };
    let stats = services
        .sync
        .retry_failed(args.batch_size, args.include_dead_letter)
        .await
        .map_err(|e| e.to_string())?;
    Ok(stats_to_value(&stats))
}

// ============================================================================
// verify_consistency
// ============================================================================

pub fn verify_consistency_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "sampleSize": { "type": "integer", "default": 100, "minimum": 1 }
        }
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyConsistencyArgs {
    #[serde(default = "default_batch_size")]
    sample_size: usize,
}

pub async fn execute_verify_consistency(services: &Services, args: Option<Value>) -> Result<Value, String> {
    let args: VerifyConsistencyArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| e.to_string())?,
        None => VerifyConsistencyArgs { sample_size: default_batch_size() },
    };
    let report = services.sync.verify_consistency(args.sample_size).await.map_err(|e| e.to_string())?;
    Ok(report_to_value(&report))
}
