//! Per-family configuration: components, weights, bands and dependencies.

use std::collections::BTreeSet;

use risk_index_alert_models::Region;
use serde::{Deserialize, Serialize};

use crate::{Band, ComponentKind, FamilyId};

/// Tolerance for the weight-sum check.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

const fn default_baseline_window_days() -> u32 {
    90
}

const fn default_driver_limit() -> usize {
    5
}

/// A complete index family definition.
///
/// Loaded from TOML. Everything that differs between families (weights,
/// band table and cardinality, cold-start caps, history thresholds,
/// dependencies) lives here rather than in code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FamilyDefinition {
    /// Unique family id, also the storage key.
    pub id: FamilyId,
    /// Human-readable name (e.g. `"Europe Regional Risk Index"`).
    pub name: String,
    /// Region scope. `None` means the family reads every alert.
    #[serde(default)]
    pub region: Option<Region>,
    /// Formula version tag persisted on each result.
    pub model_version: String,
    /// Minimum number of historical samples before computed baselines
    /// replace fallback caps.
    pub min_history_days: u32,
    /// Trailing window, in days, used for baselines.
    #[serde(default = "default_baseline_window_days")]
    pub baseline_window_days: u32,
    /// Maximum number of drivers kept on a result.
    #[serde(default = "default_driver_limit")]
    pub driver_limit: usize,
    /// Weighted components, in display order.
    pub components: Vec<ComponentSpec>,
    /// Band table, ascending by lower bound.
    pub bands: Vec<BandThreshold>,
    /// Families whose same-day values feed dependency-reading components.
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
}

/// One weighted component of a family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentSpec {
    /// Which raw component this is.
    pub kind: ComponentKind,
    /// Weight in the composite sum.
    pub weight: f64,
    /// Upper bound used for normalization while history is insufficient.
    pub fallback_cap: f64,
}

/// Lower bound (inclusive) of a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BandThreshold {
    /// The band.
    pub band: Band,
    /// Smallest index value in this band.
    pub min: u8,
}

/// A weighted edge to another family's same-day result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DependencySpec {
    /// The family read.
    pub family: FamilyId,
    /// Weight applied to `value / 100`.
    pub weight: f64,
}

/// Error returned when a [`FamilyDefinition`] is internally inconsistent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFamilyError {
    /// The offending family.
    pub family: String,
    /// What is wrong with it.
    pub message: String,
}

impl std::fmt::Display for InvalidFamilyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid family {}: {}", self.family, self.message)
    }
}

impl std::error::Error for InvalidFamilyError {}

impl FamilyDefinition {
    /// Region id persisted with results: the region's id, or `"global"`.
    #[must_use]
    pub fn region_id(&self) -> String {
        self.region
            .map_or_else(|| "global".to_string(), |r| r.to_string())
    }

    /// Sum of component weights.
    #[must_use]
    pub fn weight_sum(&self) -> f64 {
        self.components.iter().map(|c| c.weight).sum()
    }

    /// Looks up a component spec.
    #[must_use]
    pub fn component(&self, kind: ComponentKind) -> Option<&ComponentSpec> {
        self.components.iter().find(|c| c.kind == kind)
    }

    /// Whether any component is computed by entity/theme matching.
    #[must_use]
    pub fn uses_entity_matching(&self) -> bool {
        self.components.iter().any(|c| c.kind.uses_entity_matching())
    }

    /// Ids of the families this one depends on.
    pub fn dependency_ids(&self) -> impl Iterator<Item = &FamilyId> {
        self.dependencies.iter().map(|d| &d.family)
    }

    /// Lowest band in the table.
    #[must_use]
    pub fn lowest_band(&self) -> Band {
        self.bands.first().map_or(Band::Low, |b| b.band)
    }

    /// Band for an index value: the highest threshold whose lower bound is
    /// at most `value`.
    #[must_use]
    pub fn band_for(&self, value: u8) -> Band {
        self.bands
            .iter()
            .rev()
            .find(|b| b.min <= value)
            .map_or_else(|| self.lowest_band(), |b| b.band)
    }

    /// Number of prior days of history a run needs: the baseline window,
    /// and at least the week used by `trend_7d`.
    #[must_use]
    pub fn history_days(&self) -> u32 {
        self.baseline_window_days.max(7)
    }

    /// Checks that the definition is internally consistent.
    ///
    /// Cross-family checks (unknown dependencies, cycles) belong to the
    /// registry that holds every family.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidFamilyError`] describing the first problem found.
    #[allow(clippy::too_many_lines)]
    pub fn validate(&self) -> Result<(), InvalidFamilyError> {
        let fail = |message: String| {
            Err(InvalidFamilyError {
                family: self.id.to_string(),
                message,
            })
        };

        if self.id.as_str().trim().is_empty() {
            return fail("id is empty".to_string());
        }
        if self.name.trim().is_empty() {
            return fail("name is empty".to_string());
        }
        if self.components.is_empty() {
            return fail("no components".to_string());
        }
        if self.min_history_days == 0 {
            return fail("min_history_days must be at least 1".to_string());
        }
        if self.baseline_window_days < self.min_history_days {
            return fail(format!(
                "baseline_window_days {} is shorter than min_history_days {}",
                self.baseline_window_days, self.min_history_days
            ));
        }
        if self.driver_limit == 0 {
            return fail("driver_limit must be at least 1".to_string());
        }

        let mut kinds = BTreeSet::new();
        for spec in &self.components {
            if !kinds.insert(spec.kind) {
                return fail(format!("component {} listed twice", spec.kind));
            }
            if !spec.weight.is_finite() || spec.weight < 0.0 {
                return fail(format!("component {} has invalid weight", spec.kind));
            }
            if !spec.fallback_cap.is_finite() || spec.fallback_cap <= 0.0 {
                return fail(format!(
                    "component {} needs a positive fallback_cap",
                    spec.kind
                ));
            }
        }

        let sum = self.weight_sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return fail(format!("weights sum to {sum}, expected 1.0"));
        }

        if kinds.contains(&ComponentKind::Velocity)
            && !kinds.contains(&ComponentKind::SeverityPressure)
        {
            return fail("velocity requires a severity_pressure component".to_string());
        }

        if self.bands.len() < 2 {
            return fail("band table needs at least two bands".to_string());
        }
        if self.bands[0].min != 0 {
            return fail("lowest band must start at 0".to_string());
        }
        for pair in self.bands.windows(2) {
            if pair[1].min <= pair[0].min || pair[1].band <= pair[0].band {
                return fail(format!(
                    "bands must be strictly ascending ({} at {} then {} at {})",
                    pair[0].band, pair[0].min, pair[1].band, pair[1].min
                ));
            }
        }
        if self.bands.iter().any(|b| b.min > 100) {
            return fail("band thresholds must be within 0..=100".to_string());
        }

        let reads_dependencies = self.components.iter().any(|c| c.kind.reads_dependencies());
        if reads_dependencies && self.dependencies.is_empty() {
            return fail("dependency-reading component without dependencies".to_string());
        }
        if !reads_dependencies && !self.dependencies.is_empty() {
            return fail("dependencies declared but no component reads them".to_string());
        }
        let mut seen = BTreeSet::new();
        for dep in &self.dependencies {
            if dep.family == self.id {
                return fail("family depends on itself".to_string());
            }
            if !seen.insert(&dep.family) {
                return fail(format!("dependency {} listed twice", dep.family));
            }
            if !dep.weight.is_finite() || dep.weight <= 0.0 {
                return fail(format!("dependency {} has invalid weight", dep.family));
            }
        }

        Ok(())
    }
}
