//! Codebase Indexer tool (spec.md §4.6): `index`.

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use palimpsest_core::parser::IndexSummary;

use crate::services::Services;

fn summary_to_value(summary: &IndexSummary) -> Value {
    serde_json::json!({
        "filesScanned": summary.files_scanned,
        "filesIndexed": summary.files_indexed,
        "filesSkippedUnchanged": summary.files_skipped_unchanged,
        "filesUnsupported": summary.files_unsupported,
        "memoriesCreated": summary.memories_created,
        "errors": summary.errors,
    })
}

pub fn index_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "path": { "type": "string", "description": "A single file or a directory to recurse into" },
            "force": { "type": "boolean", "default": false, "description": "Bypass the unchanged-content-hash skip" }
        },
        "required": ["path"]
    })
}

#[derive(Debug, Deserialize)]
struct IndexArgs {
    path: PathBuf,
    #[serde(default)]
    force: bool,
}

pub async fn execute_index(services: &Services, args: Option<Value>) -> Result<Value, String> {
    let args: IndexArgs = serde_json::from_value(args.ok_or("missing arguments")?).map_err(|e| e.to_string())?;
    let summary = services.indexer.index_path(&args.path, args.force).await.map_err(|e| e.to_string())?;
    Ok(summary_to_value(&summary))
}
