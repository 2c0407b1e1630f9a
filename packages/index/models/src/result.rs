//! Computed index results and their machine-checkable breakdown.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use risk_index_alert_models::{AlertCategory, AlertType, Region};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::{Band, ComponentKind, FamilyId, RawComponents};

/// Where a component's normalization bounds came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BaselineSource {
    /// Min/max over persisted history.
    Historical,
    /// `0..=fallback_cap` because history was too short.
    Fallback,
}

/// Normalization bounds for one component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentBaseline {
    pub min: f64,
    pub max: f64,
    /// Number of historical samples the bounds were taken from.
    pub samples: u32,
    pub source: BaselineSource,
}

impl ComponentBaseline {
    /// Fallback bounds `[0, cap]`.
    #[must_use]
    pub const fn fallback(cap: f64, samples: u32) -> Self {
        Self {
            min: 0.0,
            max: cap,
            samples,
            source: BaselineSource::Fallback,
        }
    }
}

/// One component's contribution to a result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentScore {
    pub kind: ComponentKind,
    pub raw: f64,
    /// Normalized value in `[0, 1]`.
    pub normalized: f64,
    pub weight: f64,
    /// `weight * normalized`.
    pub contribution: f64,
    pub baseline: ComponentBaseline,
}

/// A same-day value read from another family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyInput {
    pub family: FamilyId,
    pub weight: f64,
    pub value: u8,
}

/// Everything that produced an index value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentBreakdown {
    /// Component scores in family order.
    pub components: Vec<ComponentScore>,
    /// Unclamped `Σ weight * normalized`.
    pub weighted_sum: f64,
    /// Set when any component normalized against its fallback cap.
    pub insufficient_history: bool,
    /// Whether prior severity pressure existed to compute velocity from.
    pub velocity_available: bool,
    /// Alerts in scope for the family and date.
    pub alert_count: usize,
    /// Named infrastructure entities matched, sorted and deduplicated.
    #[serde(default)]
    pub matched_entities: BTreeSet<String>,
    /// Theme ids matched, sorted and deduplicated.
    #[serde(default)]
    pub matched_themes: BTreeSet<String>,
    /// Same-day values of dependency families.
    #[serde(default)]
    pub dependencies: Vec<DependencyInput>,
}

impl ComponentBreakdown {
    /// Looks up a component score.
    #[must_use]
    pub fn score(&self, kind: ComponentKind) -> Option<&ComponentScore> {
        self.components.iter().find(|c| c.kind == kind)
    }

    /// Raw values of every component, as used for later baselines.
    #[must_use]
    pub fn raw(&self) -> RawComponents {
        let mut raw = RawComponents::default();
        for score in &self.components {
            raw.set(score.kind, score.raw);
        }
        raw
    }
}

/// An alert ranked as a contributor to a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub alert_id: String,
    pub headline: String,
    pub alert_type: AlertType,
    pub category: AlertCategory,
    pub severity: Option<u8>,
    pub confidence: Option<f64>,
    pub region: Option<Region>,
    /// Entities and themes this alert matched, if any.
    #[serde(default)]
    pub matched_entities: Vec<String>,
}

/// The persisted unit: one family's index for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexResult {
    pub family_id: FamilyId,
    /// Region id, or `"global"` for unscoped families.
    pub region_id: String,
    pub date: NaiveDate,
    /// Composite value in `0..=100`.
    pub value: u8,
    pub band: Band,
    pub trend_1d: Option<f64>,
    pub trend_7d: Option<f64>,
    pub breakdown: ComponentBreakdown,
    pub drivers: Vec<Driver>,
    pub interpretation: String,
    pub model_version: String,
    pub computed_at: DateTime<Utc>,
}

impl IndexResult {
    /// Whether normalization fell back to configured caps.
    #[must_use]
    pub const fn insufficient_history(&self) -> bool {
        self.breakdown.insufficient_history
    }
}
