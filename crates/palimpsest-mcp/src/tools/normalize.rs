//! Normalization Pipeline tool (spec.md §4.5): `normalize`.

use serde::Deserialize;
use serde_json::Value;

use palimpsest_core::normalize::{Phase, PhaseResult};
use uuid::Uuid;

use crate::services::Services;

fn parse_phase(name: &str) -> Result<Phase, String> {
    Phase::all()
        .iter()
        .copied()
        .find(|p| p.as_str() == name)
        .ok_or_else(|| format!("unknown normalization phase '{name}'"))
}

fn phase_result_to_value(result: &PhaseResult) -> Value {
    serde_json::json!({
        "phase": result.phase.as_str(),
        "durationMs": result.duration_ms,
        "memoriesProcessed": result.memories_processed,
        "actions": result.actions,
        "duplicatesFound": result.duplicates_found,
        "orphansFound": result.orphans_found,
        "refreshed": result.refreshed,
        "itemsDeleted": result.items_deleted,
        "valid": result.valid,
    })
}

pub fn normalize_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "phases": {
                "type": "array",
                "items": { "type": "string", "enum": ["snapshot", "deduplication", "orphan_detection", "embedding_refresh", "cleanup", "validation", "swap"] },
                "description": "Defaults to all seven phases, in order"
            },
            "dryRun": { "type": "boolean", "default": false, "description": "Run the journal without swapping live collections" }
        }
    })
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct NormalizeArgs {
    phases: Option<Vec<String>>,
    #[serde(default)]
    dry_run: bool,
}

pub async fn execute_normalize(services: &Services, args: Option<Value>) -> Result<Value, String> {
    let args: NormalizeArgs = match args {
        Some(v) => serde_json::from_value(v).map_err(|e| e.to_string())?,
        None => NormalizeArgs::default(),
    };

    let job_id = Uuid::new_v4().to_string();
    let results = match args.phases {
        Some(names) => {
            let mut phases = Vec::with_capacity(names.len());
            for name in names {
                phases.push(parse_phase(&name)?);
            }
            services.normalizer.run_phases(&phases, &job_id, args.dry_run).await.map_err(|e| e.to_string())?
        }
        None => services.normalizer.run(&job_id, args.dry_run).await.map_err(|e| e.to_string())?,
    };

    Ok(serde_json::json!({
        "jobId": job_id,
        "phases": results.iter().map(phase_result_to_value).collect::<Vec<_>>(),
    }))
}
