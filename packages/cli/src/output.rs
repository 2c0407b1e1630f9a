//! JSON rendering for command output.

use risk_index_engine::FamilyRegistry;
use risk_index_service::{ComputeOutcome, IndexError};
use serde::Serialize;
use serde_json::{Value, json};

/// Writes `value` to stdout as pretty JSON.
pub fn print<T: Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Summary of every family in dependency order.
pub fn families(registry: &FamilyRegistry) -> Value {
    registry
        .families()
        .map(|family| {
            json!({
                "id": family.id,
                "name": family.name,
                "region": family.region_id(),
                "modelVersion": family.model_version,
                "components": family
                    .components
                    .iter()
                    .map(|c| {
                        json!({
                            "kind": c.kind,
                            "weight": c.weight,
                            "fallbackCap": c.fallback_cap,
                        })
                    })
                    .collect::<Vec<_>>(),
                "bands": family.bands,
                "dependencies": family.dependencies,
            })
        })
        .collect()
}

/// One family's compute outcome.
pub fn compute_entry(family: &str, outcome: &Result<ComputeOutcome, IndexError>) -> Value {
    match outcome {
        Ok(ComputeOutcome::Computed(result)) => {
            json!({ "family": family, "status": "computed", "result": result })
        }
        Ok(ComputeOutcome::AlreadyExists(result)) => {
            json!({ "family": family, "status": "already_exists", "result": result })
        }
        Err(e) if e.is_missing_input() => {
            json!({ "family": family, "status": "skipped", "reason": e.to_string() })
        }
        Err(e) => json!({ "family": family, "status": "failed", "error": e.to_string() }),
    }
}
