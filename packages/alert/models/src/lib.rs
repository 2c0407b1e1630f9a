#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Alert event types and the closed taxonomies used to aggregate them.
//!
//! Alerts are produced upstream by the classification pipeline. This crate
//! only describes them: the canonical [`Region`], [`AlertType`] and
//! [`AlertCategory`] enums, the [`Severity`] scale, and the normalized
//! [`AlertEvent`] record that every index family consumes. Raw storage rows
//! are turned into events by [`row::AlertRow::normalize`].

pub mod row;

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Severity level for an alert, from 1 (minimal) to 5 (critical).
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
pub enum Severity {
    /// Level 1: background noise
    Minimal = 1,
    /// Level 2: localized, low consequence
    Low = 2,
    /// Level 3: notable incident
    Moderate = 3,
    /// Level 4: serious incident with regional consequences
    High = 4,
    /// Level 5: major escalation
    Critical = 5,
}

impl Severity {
    /// Returns the numeric value of this severity level.
    #[must_use]
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Creates a severity level from a numeric value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not in the range 1-5.
    pub const fn from_value(value: u8) -> Result<Self, InvalidSeverityError> {
        match value {
            1 => Ok(Self::Minimal),
            2 => Ok(Self::Low),
            3 => Ok(Self::Moderate),
            4 => Ok(Self::High),
            5 => Ok(Self::Critical),
            _ => Err(InvalidSeverityError { value }),
        }
    }

    /// Whether this severity counts toward the high-impact count regardless
    /// of the alert's type.
    #[must_use]
    pub const fn is_high_impact(self) -> bool {
        self.value() >= 4
    }
}

/// Error returned when attempting to create a [`Severity`] from an invalid
/// numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidSeverityError {
    /// The invalid severity value that was provided.
    pub value: u8,
}

impl std::fmt::Display for InvalidSeverityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid severity value {}: expected 1-5", self.value)
    }
}

impl std::error::Error for InvalidSeverityError {}

/// The kind of alert emitted by the upstream classifier.
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
pub enum AlertType {
    /// A single classified incident judged high impact.
    HighImpact,
    /// Aggregate alert raised when a region sees a burst of incidents.
    RegionalSpike,
    /// Aggregate alert raised when an asset class sees a burst of incidents.
    AssetSpike,
}

impl AlertType {
    /// Parses an upstream alert type string, accepting `snake_case`,
    /// `kebab-case` and space separated spellings in any case.
    #[must_use]
    pub fn parse_loose(raw: &str) -> Option<Self> {
        let canonical = raw.trim().to_lowercase().replace(['-', ' '], "_");
        canonical.parse().ok()
    }

    /// Whether alerts of this type are aggregates derived from other alerts
    /// rather than atomic incidents.
    #[must_use]
    pub const fn is_derived(self) -> bool {
        matches!(self, Self::RegionalSpike | Self::AssetSpike)
    }
}

/// Thematic category of an alert.
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
pub enum AlertCategory {
    /// Open armed conflict
    War,
    /// Military movements, strikes and exercises
    Military,
    /// Terrorist attacks and plots
    Terrorism,
    /// Energy supply, production and infrastructure
    Energy,
    /// Sanctions, embargoes and export controls
    Sanctions,
    /// Cyber attacks and outages
    Cyber,
    /// Trade, markets and macroeconomic shocks
    Economic,
    /// Elections, unrest and domestic politics
    Political,
    /// Negotiations, summits and diplomatic incidents
    Diplomacy,
    /// Humanitarian crises and displacement
    Humanitarian,
    /// Anything not fitting other categories
    Other,
}

impl AlertCategory {
    /// Multiplier applied to severity when this category feeds severity
    /// pressure.
    #[must_use]
    pub const fn weight(self) -> f64 {
        match self {
            Self::War | Self::Military => 1.6,
            Self::Terrorism => 1.4,
            Self::Energy | Self::Sanctions => 1.3,
            Self::Cyber => 1.1,
            Self::Diplomacy => 0.7,
            Self::Economic | Self::Political | Self::Humanitarian | Self::Other => 1.0,
        }
    }

    /// Derives a category from a free-text label or sentence.
    ///
    /// Exact `snake_case` names win; otherwise the first keyword family
    /// that matches a word in the text decides. Returns `None` when nothing
    /// matches so callers can try another field before defaulting to
    /// [`AlertCategory::Other`].
    #[must_use]
    pub fn from_text(text: &str) -> Option<Self> {
        let trimmed = text.trim().to_lowercase();
        if let Ok(exact) = trimmed.replace(['-', ' '], "_").parse::<Self>() {
            return Some(exact);
        }

        let words: Vec<&str> = trimmed
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let has = |prefixes: &[&str]| {
            words
                .iter()
                .any(|w| prefixes.iter().any(|p| w.starts_with(p)))
        };
        let has_word = |exact: &[&str]| words.iter().any(|w| exact.contains(w));

        if has_word(&["war", "wars", "warfare", "invasion", "offensive"]) || has(&["shelling"]) {
            Some(Self::War)
        } else if has(&["militar", "missile", "troop", "airstrike", "drone", "naval"]) {
            Some(Self::Military)
        } else if has(&["terror", "bombing", "hostage"]) {
            Some(Self::Terrorism)
        } else if has(&["sanction", "embargo"]) || has_word(&["tariff", "tariffs"]) {
            Some(Self::Sanctions)
        } else if has(&["energy", "pipeline", "refiner", "electricit"])
            || has_word(&["oil", "gas", "lng", "crude", "power", "grid"])
        {
            Some(Self::Energy)
        } else if has(&["cyber", "ransomware", "hack"]) {
            Some(Self::Cyber)
        } else if has(&["diplomat", "summit", "negotiat", "ceasefire", "treaty"]) {
            Some(Self::Diplomacy)
        } else if has(&["econom", "inflation", "recession", "currenc"])
            || has_word(&["market", "markets", "trade"])
        {
            Some(Self::Economic)
        } else if has(&["politic", "election", "protest", "coup", "parliament"]) {
            Some(Self::Political)
        } else if has(&["humanitarian", "refugee", "famine", "displace"]) {
            Some(Self::Humanitarian)
        } else {
            None
        }
    }
}

/// Canonical geography used by regional index families.
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
pub enum Region {
    /// EU, UK, Nordics, Balkans
    Europe,
    /// Gulf states, Levant, Iran, Iraq
    MiddleEast,
    /// Ukraine, Black Sea littoral, Caucasus
    BlackSea,
    /// East, South and Southeast Asia, Oceania
    AsiaPacific,
    /// North, Central and South America
    Americas,
    /// North and Sub-Saharan Africa
    Africa,
}

/// Upstream spellings mapped onto each [`Region`]. Keys are lowercase with
/// separators collapsed to single spaces.
const REGION_ALIASES: &[(Region, &[&str])] = &[
    (
        Region::Europe,
        &[
            "europe",
            "eu",
            "european union",
            "western europe",
            "eastern europe",
            "central europe",
            "northern europe",
            "southern europe",
            "nordics",
            "baltics",
            "baltic states",
            "balkans",
            "uk",
            "united kingdom",
        ],
    ),
    (
        Region::MiddleEast,
        &[
            "middle east",
            "mena",
            "near east",
            "levant",
            "gulf",
            "persian gulf",
            "gulf states",
            "gcc",
        ],
    ),
    (
        Region::BlackSea,
        &[
            "black sea",
            "black sea region",
            "ukraine",
            "crimea",
            "caucasus",
            "south caucasus",
        ],
    ),
    (
        Region::AsiaPacific,
        &[
            "asia pacific",
            "asia",
            "apac",
            "east asia",
            "south asia",
            "southeast asia",
            "indo pacific",
            "oceania",
        ],
    ),
    (
        Region::Americas,
        &[
            "americas",
            "north america",
            "south america",
            "latin america",
            "latam",
            "central america",
            "us",
            "usa",
            "united states",
        ],
    ),
    (
        Region::Africa,
        &[
            "africa",
            "north africa",
            "sub saharan africa",
            "west africa",
            "east africa",
            "sahel",
        ],
    ),
];

impl Region {
    /// Maps a free-text region string onto a canonical region.
    ///
    /// Matching ignores case and treats `-`, `_` and runs of whitespace as a
    /// single space. Unknown spellings return `None`; such alerts are
    /// excluded from region-scoped families.
    #[must_use]
    pub fn normalize(raw: &str) -> Option<Self> {
        let key = raw
            .to_lowercase()
            .replace(['-', '_', '/'], " ")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        if key.is_empty() {
            return None;
        }

        REGION_ALIASES
            .iter()
            .find(|(_, aliases)| aliases.contains(&key.as_str()))
            .map(|(region, _)| *region)
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Europe,
            Self::MiddleEast,
            Self::BlackSea,
            Self::AsiaPacific,
            Self::Americas,
            Self::Africa,
        ]
    }
}

/// A classified alert, normalized into canonical types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    /// Upstream alert identifier.
    pub id: String,
    /// Kind of alert.
    pub alert_type: AlertType,
    /// Severity, when the classifier provided one.
    pub severity: Option<Severity>,
    /// Classifier confidence in `[0, 1]`, when provided.
    pub confidence: Option<f64>,
    /// Canonical region, or `None` when the upstream region is unmapped.
    pub region: Option<Region>,
    /// Normalized (lowercase, trimmed) affected asset tags.
    pub asset_tags: BTreeSet<String>,
    /// Thematic category.
    pub category: AlertCategory,
    /// Headline text.
    pub headline: String,
    /// Body text.
    pub body: String,
    /// When the alert was created.
    pub created_at: DateTime<Utc>,
}

impl AlertEvent {
    /// Creates an alert with no severity, confidence, region or assets and
    /// the [`AlertCategory::Other`] category.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        alert_type: AlertType,
        headline: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            alert_type,
            severity: None,
            confidence: None,
            region: None,
            asset_tags: BTreeSet::new(),
            category: AlertCategory::Other,
            headline: headline.into(),
            body: String::new(),
            created_at,
        }
    }

    /// Sets the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Sets the confidence, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    /// Sets the canonical region.
    #[must_use]
    pub fn with_region(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: AlertCategory) -> Self {
        self.category = category;
        self
    }

    /// Sets the body text.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds asset tags, normalizing them.
    #[must_use]
    pub fn with_assets<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.asset_tags
            .extend(assets.into_iter().filter_map(|a| row::normalize_asset(a.as_ref())));
        self
    }

    /// Numeric severity, if present.
    #[must_use]
    pub fn severity_value(&self) -> Option<f64> {
        self.severity.map(|s| f64::from(s.value()))
    }

    /// Confidence used in weighted sums. A missing confidence applies no
    /// discount.
    #[must_use]
    pub fn effective_confidence(&self) -> f64 {
        self.confidence.unwrap_or(1.0)
    }

    /// Whether this alert feeds the high-impact count: explicit high-impact
    /// or regional-spike type, or severity 4+ of any type.
    #[must_use]
    pub fn counts_as_high_impact(&self) -> bool {
        matches!(
            self.alert_type,
            AlertType::HighImpact | AlertType::RegionalSpike
        ) || self.severity.is_some_and(Severity::is_high_impact)
    }

    /// Headline, body and asset tags joined for keyword matching.
    #[must_use]
    pub fn searchable_text(&self) -> String {
        let mut text = String::with_capacity(self.headline.len() + self.body.len() + 32);
        text.push_str(&self.headline);
        text.push('\n');
        text.push_str(&self.body);
        for tag in &self.asset_tags {
            text.push('\n');
            text.push_str(tag);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_from_value_roundtrip() {
        for v in 1..=5u8 {
            let severity = Severity::from_value(v).unwrap();
            assert_eq!(severity.value(), v);
        }
        assert!(Severity::from_value(0).is_err());
        assert!(Severity::from_value(6).is_err());
    }

    #[test]
    fn region_aliases_normalize_to_canonical_ids() {
        assert_eq!(Region::normalize("EU"), Some(Region::Europe));
        assert_eq!(Region::normalize("Europe"), Some(Region::Europe));
        assert_eq!(Region::normalize("Western  Europe"), Some(Region::Europe));
        assert_eq!(Region::normalize("middle-east"), Some(Region::MiddleEast));
        assert_eq!(Region::normalize("middle_east"), Some(Region::MiddleEast));
        assert_eq!(Region::normalize("Black Sea"), Some(Region::BlackSea));
        assert_eq!(Region::normalize("Atlantis"), None);
        assert_eq!(Region::normalize("   "), None);
    }

    #[test]
    fn region_ids_are_snake_case() {
        assert_eq!(Region::MiddleEast.to_string(), "middle_east");
        assert_eq!("black_sea".parse::<Region>().unwrap(), Region::BlackSea);
    }

    #[test]
    fn every_region_has_its_own_id_as_alias() {
        for region in Region::all() {
            assert_eq!(Region::normalize(region.as_ref()), Some(*region));
        }
    }

    #[test]
    fn alert_type_parses_loose_spellings() {
        assert_eq!(
            AlertType::parse_loose("high-impact"),
            Some(AlertType::HighImpact)
        );
        assert_eq!(
            AlertType::parse_loose("Regional Spike"),
            Some(AlertType::RegionalSpike)
        );
        assert_eq!(
            AlertType::parse_loose("asset_spike"),
            Some(AlertType::AssetSpike)
        );
        assert_eq!(AlertType::parse_loose("digest"), None);
    }

    #[test]
    fn category_weights_match_table() {
        assert!((AlertCategory::War.weight() - 1.6).abs() < f64::EPSILON);
        assert!((AlertCategory::Energy.weight() - 1.3).abs() < f64::EPSILON);
        assert!((AlertCategory::Diplomacy.weight() - 0.7).abs() < f64::EPSILON);
        assert!((AlertCategory::Other.weight() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn category_from_text() {
        assert_eq!(AlertCategory::from_text("sanctions"), Some(AlertCategory::Sanctions));
        assert_eq!(
            AlertCategory::from_text("Military / Defense"),
            Some(AlertCategory::Military)
        );
        assert_eq!(
            AlertCategory::from_text("Gas pipeline explosion near border"),
            Some(AlertCategory::Energy)
        );
        assert_eq!(
            AlertCategory::from_text("Software award announced"),
            None,
            "substrings of unrelated words must not match"
        );
    }

    #[test]
    fn high_impact_membership() {
        let now = Utc::now();
        let spike = AlertEvent::new("a", AlertType::RegionalSpike, "spike", now);
        let asset = AlertEvent::new("b", AlertType::AssetSpike, "asset", now);
        let severe_asset = asset.clone().with_severity(Severity::High);

        assert!(spike.counts_as_high_impact());
        assert!(!asset.counts_as_high_impact());
        assert!(severe_asset.counts_as_high_impact());
    }
}
