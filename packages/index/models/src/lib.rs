#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Index family definitions and composite index result types.
//!
//! An index family is one named composite score (global, regional, or
//! market stress) with its own component set, weight vector, band table and
//! cold-start caps, all carried by [`FamilyDefinition`]. Each daily run
//! yields an [`IndexResult`] whose [`ComponentBreakdown`] records every raw
//! and normalized sub-score that produced the value.

pub mod family;
pub mod result;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use family::{
    BandThreshold, ComponentSpec, DependencySpec, FamilyDefinition, InvalidFamilyError,
};
pub use result::{
    BaselineSource, ComponentBaseline, ComponentBreakdown, ComponentScore, DependencyInput,
    Driver, IndexResult,
};

/// Identifier of an index family (e.g. `"global"`, `"europe"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FamilyId(String);

impl FamilyId {
    /// Creates a family id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FamilyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FamilyId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::borrow::Borrow<str> for FamilyId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Raw scalar components a family can be built from.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ComponentKind {
    /// Severity × category weight × confidence over high-impact alerts.
    SeverityPressure,
    /// Distinct alerts that are high-impact, regional-spike, or severity 4+.
    HighImpactCount,
    /// Distinct asset tags on asset-spike alerts.
    AssetOverlapCount,
    /// Severity pressure minus its recent mean.
    Velocity,
    /// Weighted thematic keyword matches.
    ThemePressure,
    /// Weighted named-infrastructure matches.
    ChokepointFactor,
    /// Weighted same-day values of neighboring regional families.
    #[serde(rename = "contagion_raw")]
    #[strum(serialize = "contagion_raw")]
    Contagion,
    /// Weighted same-day value of the regional family a market index tracks.
    RegionalStress,
}

impl ComponentKind {
    /// Whether this component reads other families' persisted results for
    /// the same date.
    #[must_use]
    pub const fn reads_dependencies(self) -> bool {
        matches!(self, Self::Contagion | Self::RegionalStress)
    }

    /// Whether this component is computed by entity/theme matching.
    #[must_use]
    pub const fn uses_entity_matching(self) -> bool {
        matches!(self, Self::ThemePressure | Self::ChokepointFactor)
    }

    /// Short human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::SeverityPressure => "severity pressure",
            Self::HighImpactCount => "high-impact alerts",
            Self::AssetOverlapCount => "asset overlap",
            Self::Velocity => "escalation velocity",
            Self::ThemePressure => "thematic pressure",
            Self::ChokepointFactor => "chokepoint exposure",
            Self::Contagion => "regional contagion",
            Self::RegionalStress => "regional stress",
        }
    }
}

/// Qualitative risk band, ordered from least to most severe.
///
/// Families use different subsets of these bands, so code must never assume
/// a fixed cardinality.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Band {
    /// Background conditions
    Low,
    /// Noticeable but contained activity
    Moderate,
    /// Sustained pressure
    Elevated,
    /// Serious pressure (used by some families instead of `Severe`)
    High,
    /// Serious and broadening pressure
    Severe,
    /// Crisis conditions
    Critical,
}

impl Band {
    /// Lowercase label for prose.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::Elevated => "elevated",
            Self::High => "high",
            Self::Severe => "severe",
            Self::Critical => "critical",
        }
    }
}

/// Raw, unnormalized component values for one family and date.
///
/// Missing components read as zero. Backed by a `BTreeMap` so iteration
/// and serialization order are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawComponents(BTreeMap<ComponentKind, f64>);

impl RawComponents {
    /// Returns the raw value of `kind`, or zero.
    #[must_use]
    pub fn get(&self, kind: ComponentKind) -> f64 {
        self.0.get(&kind).copied().unwrap_or(0.0)
    }

    /// Returns the raw value of `kind` if it was recorded.
    #[must_use]
    pub fn try_get(&self, kind: ComponentKind) -> Option<f64> {
        self.0.get(&kind).copied()
    }

    /// Sets the raw value of `kind`.
    pub fn set(&mut self, kind: ComponentKind, value: f64) {
        self.0.insert(kind, value);
    }
}
