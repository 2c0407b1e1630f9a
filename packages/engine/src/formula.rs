//! Composite score and band.

use std::collections::BTreeMap;

use risk_index_models::{
    Band, BaselineSource, ComponentBaseline, ComponentKind, ComponentScore, FamilyDefinition,
    RawComponents,
};

use crate::normalize::normalize;

/// Weighted scores, value and band for one family and date.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    pub scores: Vec<ComponentScore>,
    /// Unclamped `Σ weight × normalized`.
    pub weighted_sum: f64,
    pub value: u8,
    pub band: Band,
    /// Any component normalized against its fallback cap.
    pub insufficient_history: bool,
}

/// Converts a weighted sum into the integer index value.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn to_value(weighted_sum: f64) -> u8 {
    if !weighted_sum.is_finite() {
        return 0;
    }
    (100.0 * weighted_sum.clamp(0.0, 1.0)).round() as u8
}

/// Normalizes and weights every component of `family`.
///
/// Components without a baseline entry use their fallback cap.
#[must_use]
pub fn composite(
    family: &FamilyDefinition,
    raw: &RawComponents,
    baselines: &BTreeMap<ComponentKind, ComponentBaseline>,
) -> Composite {
    let scores: Vec<ComponentScore> = family
        .components
        .iter()
        .map(|spec| {
            let baseline = baselines
                .get(&spec.kind)
                .copied()
                .unwrap_or_else(|| ComponentBaseline::fallback(spec.fallback_cap, 0));
            let raw = raw.get(spec.kind);
            let normalized = normalize(raw, &baseline);
            ComponentScore {
                kind: spec.kind,
                raw,
                normalized,
                weight: spec.weight,
                contribution: spec.weight * normalized,
                baseline,
            }
        })
        .collect();

    let weighted_sum = scores.iter().map(|s| s.contribution).sum();
    let value = to_value(weighted_sum);
    let insufficient_history = scores
        .iter()
        .any(|s| s.baseline.source == BaselineSource::Fallback);

    Composite {
        scores,
        weighted_sum,
        value,
        band: family.band_for(value),
        insufficient_history,
    }
}

#[cfg(test)]
mod tests {
    use risk_index_models::{BandThreshold, ComponentSpec, FamilyId};

    use super::*;

    fn family() -> FamilyDefinition {
        FamilyDefinition {
            id: FamilyId::new("middle_east"),
            name: "Middle East".to_string(),
            region: None,
            model_version: "v1".to_string(),
            min_history_days: 14,
            baseline_window_days: 90,
            driver_limit: 5,
            components: vec![
                ComponentSpec {
                    kind: ComponentKind::SeverityPressure,
                    weight: 0.5,
                    fallback_cap: 25.0,
                },
                ComponentSpec {
                    kind: ComponentKind::HighImpactCount,
                    weight: 0.28,
                    fallback_cap: 6.0,
                },
                ComponentSpec {
                    kind: ComponentKind::AssetOverlapCount,
                    weight: 0.22,
                    fallback_cap: 8.0,
                },
            ],
            bands: vec![
                BandThreshold {
                    band: Band::Low,
                    min: 0,
                },
                BandThreshold {
                    band: Band::Elevated,
                    min: 35,
                },
                BandThreshold {
                    band: Band::High,
                    min: 60,
                },
                BandThreshold {
                    band: Band::Critical,
                    min: 80,
                },
            ],
            dependencies: vec![],
        }
    }

    #[test]
    fn value_is_rounded_and_clamped() {
        assert_eq!(to_value(-0.2), 0);
        assert_eq!(to_value(0.254), 25);
        assert_eq!(to_value(0.255_1), 26);
        assert_eq!(to_value(1.7), 100);
        assert_eq!(to_value(f64::NAN), 0);
    }

    #[test]
    fn single_alert_feeds_weighted_formula() {
        let mut raw = RawComponents::default();
        raw.set(ComponentKind::SeverityPressure, 6.5);
        raw.set(ComponentKind::HighImpactCount, 1.0);

        let result = composite(&family(), &raw, &BTreeMap::new());
        let sp = &result.scores[0];
        assert!((sp.normalized - 0.26).abs() < 1e-12);
        assert!((sp.contribution - 0.13).abs() < 1e-12);

        let expected = 0.5 * 0.26 + 0.28 / 6.0;
        assert!((result.weighted_sum - expected).abs() < 1e-12);
        assert_eq!(result.value, 18);
        assert_eq!(result.band, Band::Low);
        assert!(result.insufficient_history);
    }

    #[test]
    fn all_zero_components_give_lowest_band() {
        let result = composite(&family(), &RawComponents::default(), &BTreeMap::new());
        assert_eq!(result.value, 0);
        assert_eq!(result.band, Band::Low);
        assert!(result.scores.iter().all(|s| s.normalized.abs() < f64::EPSILON));
    }

    #[test]
    fn historical_baselines_clear_insufficient_flag() {
        let baselines: BTreeMap<_, _> = family()
            .components
            .iter()
            .map(|c| {
                (
                    c.kind,
                    ComponentBaseline {
                        min: 0.0,
                        max: 10.0,
                        samples: 20,
                        source: BaselineSource::Historical,
                    },
                )
            })
            .collect();
        let mut raw = RawComponents::default();
        raw.set(ComponentKind::SeverityPressure, 10.0);
        raw.set(ComponentKind::HighImpactCount, 10.0);
        raw.set(ComponentKind::AssetOverlapCount, 10.0);

        let result = composite(&family(), &raw, &baselines);
        assert!(!result.insufficient_history);
        assert_eq!(result.value, 100);
        assert_eq!(result.band, Band::Critical);
    }
}
