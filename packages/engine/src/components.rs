//! Raw component extraction.
//!
//! Every function here is a pure function of the day's alert set plus, for
//! velocity and the dependency-reading components, explicit history and
//! dependency inputs. Nothing reads storage or the clock.

use std::collections::{BTreeMap, BTreeSet};

use risk_index_alert_models::{AlertEvent, AlertType};
use risk_index_models::{ComponentKind, DependencyInput, FamilyDefinition, RawComponents};

use crate::entities::{AlertMatches, match_alert};

/// Number of prior days velocity averages over.
pub const VELOCITY_LOOKBACK_DAYS: usize = 3;

/// Σ `severity × category_weight × confidence` over high-impact alerts.
///
/// Regional-spike and asset-spike alerts are aggregates of other alerts
/// and never contribute. Alerts without a severity contribute nothing.
#[must_use]
pub fn severity_pressure(alerts: &[AlertEvent]) -> f64 {
    alerts
        .iter()
        .filter(|a| a.alert_type == AlertType::HighImpact)
        .filter_map(|a| {
            a.severity_value()
                .map(|severity| severity * a.category.weight() * a.effective_confidence())
        })
        .sum()
}

/// Distinct alert ids that are high-impact, regional-spike, or severity 4+.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn high_impact_count(alerts: &[AlertEvent]) -> f64 {
    alerts
        .iter()
        .filter(|a| a.counts_as_high_impact())
        .map(|a| a.id.as_str())
        .collect::<BTreeSet<_>>()
        .len() as f64
}

/// Distinct normalized asset tags across asset-spike alerts.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn asset_overlap_count(alerts: &[AlertEvent]) -> f64 {
    alerts
        .iter()
        .filter(|a| a.alert_type == AlertType::AssetSpike)
        .flat_map(|a| a.asset_tags.iter())
        .collect::<BTreeSet<_>>()
        .len() as f64
}

/// Current severity pressure minus the mean of up to
/// [`VELOCITY_LOOKBACK_DAYS`] prior values.
///
/// Returns `None` when there is no prior value to compare against.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn velocity(current: f64, prior: &[f64]) -> Option<f64> {
    if prior.is_empty() {
        return None;
    }
    let recent = &prior[prior.len().saturating_sub(VELOCITY_LOOKBACK_DAYS)..];
    let mean = recent.iter().sum::<f64>() / recent.len() as f64;
    Some(current - mean)
}

/// Σ `severity × confidence × theme_weight` per (alert, theme) pair.
#[must_use]
pub fn theme_pressure(alerts: &[AlertEvent], matches: &[AlertMatches]) -> f64 {
    alerts
        .iter()
        .zip(matches)
        .map(|(alert, m)| {
            let base = alert.severity_value().unwrap_or(0.0) * alert.effective_confidence();
            m.themes.iter().map(|t| base * t.weight).sum::<f64>()
        })
        .sum()
}

/// Σ `severity × confidence × entity_weight` per (alert, chokepoint) pair.
#[must_use]
pub fn chokepoint_factor(alerts: &[AlertEvent], matches: &[AlertMatches]) -> f64 {
    alerts
        .iter()
        .zip(matches)
        .map(|(alert, m)| {
            let base = alert.severity_value().unwrap_or(0.0) * alert.effective_confidence();
            m.chokepoints.iter().map(|c| base * c.weight).sum::<f64>()
        })
        .sum()
}

/// Σ `weight × value / 100` over dependency inputs.
#[must_use]
pub fn dependency_pressure(inputs: &[DependencyInput]) -> f64 {
    inputs
        .iter()
        .map(|d| d.weight * f64::from(d.value) / 100.0)
        .sum()
}

/// Everything extraction produces for one family and date.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Raw values of the family's components.
    pub raw: RawComponents,
    /// Whether velocity had prior values to compare against.
    pub velocity_available: bool,
    /// Per-alert matches, parallel to the input alerts. Empty when the
    /// family does not use entity matching.
    pub matches: Vec<AlertMatches>,
    pub matched_entities: BTreeSet<String>,
    pub matched_themes: BTreeSet<String>,
}

impl Extraction {
    /// Matched entity and theme labels per alert id.
    #[must_use]
    pub fn labels_by_alert<'a>(&self, alerts: &'a [AlertEvent]) -> BTreeMap<&'a str, Vec<String>> {
        alerts
            .iter()
            .zip(&self.matches)
            .filter(|(_, m)| !m.is_empty())
            .map(|(a, m)| (a.id.as_str(), m.labels()))
            .collect()
    }
}

/// Extracts every component `family` declares.
///
/// `prior_severity_pressure` holds persisted severity-pressure values of
/// the days inside the velocity lookback, oldest first.
#[must_use]
pub fn extract(
    family: &FamilyDefinition,
    alerts: &[AlertEvent],
    prior_severity_pressure: &[f64],
    dependencies: &[DependencyInput],
) -> Extraction {
    let mut out = Extraction::default();

    if family.uses_entity_matching() {
        out.matches = alerts.iter().map(match_alert).collect();
        for m in &out.matches {
            out.matched_entities
                .extend(m.chokepoints.iter().map(|c| c.name.to_string()));
            out.matched_themes
                .extend(m.themes.iter().map(|t| t.id.to_string()));
        }
    }

    let pressure = severity_pressure(alerts);

    for spec in &family.components {
        let value = match spec.kind {
            ComponentKind::SeverityPressure => pressure,
            ComponentKind::HighImpactCount => high_impact_count(alerts),
            ComponentKind::AssetOverlapCount => asset_overlap_count(alerts),
            ComponentKind::Velocity => {
                let v = velocity(pressure, prior_severity_pressure);
                out.velocity_available = v.is_some();
                v.unwrap_or(0.0)
            }
            ComponentKind::ThemePressure => theme_pressure(alerts, &out.matches),
            ComponentKind::ChokepointFactor => chokepoint_factor(alerts, &out.matches),
            ComponentKind::Contagion | ComponentKind::RegionalStress => {
                dependency_pressure(dependencies)
            }
        };
        log::debug!("{} {}: raw {value:.4}", family.id, spec.kind);
        out.raw.set(spec.kind, value);
    }

    out
}
