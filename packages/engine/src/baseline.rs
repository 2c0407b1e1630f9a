//! Per-family rolling baselines.
//!
//! Bounds come from the raw values stored in the family's own persisted
//! breakdowns. Until enough samples exist the configured fallback cap is
//! used instead.

use std::collections::BTreeMap;

use risk_index_models::{
    BaselineSource, ComponentBaseline, ComponentKind, FamilyDefinition, RawComponents,
};

/// Computes a baseline for every component of `family`.
///
/// `history` holds one raw-component map per persisted prior day inside the
/// family's baseline window. A history entry only counts as a sample for
/// the components it actually carries, so a component added to a family
/// later starts on its fallback cap.
#[must_use]
pub fn compute_baselines(
    family: &FamilyDefinition,
    history: &[RawComponents],
) -> BTreeMap<ComponentKind, ComponentBaseline> {
    family
        .components
        .iter()
        .map(|spec| {
            let samples: Vec<f64> = history
                .iter()
                .filter_map(|raw| raw.try_get(spec.kind))
                .filter(|v| v.is_finite())
                .collect();
            let count = u32::try_from(samples.len()).unwrap_or(u32::MAX);

            let baseline = if count < family.min_history_days {
                log::debug!(
                    "{} {}: {count} samples < {}, using fallback cap {}",
                    family.id,
                    spec.kind,
                    family.min_history_days,
                    spec.fallback_cap
                );
                ComponentBaseline::fallback(spec.fallback_cap, count)
            } else {
                let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
                let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                ComponentBaseline {
                    min,
                    max,
                    samples: count,
                    source: BaselineSource::Historical,
                }
            };
            (spec.kind, baseline)
        })
        .collect()
}
