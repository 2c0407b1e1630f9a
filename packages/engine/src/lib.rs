#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pure index computation.
//!
//! [`evaluate`] turns one family's alert set for a date, together with the
//! family's persisted history and the same-day results of its dependencies,
//! into a value, band, trends, breakdown and ranked drivers. Nothing in
//! this crate reads storage or the wall clock, so the same inputs always
//! produce the same breakdown.

pub mod baseline;
pub mod components;
pub mod drivers;
pub mod entities;
pub mod formula;
pub mod interpretation;
pub mod normalize;
pub mod registry;
pub mod trend;

use std::collections::BTreeSet;

use chrono::{DateTime, Days, NaiveDate, Utc};
use risk_index_alert_models::AlertEvent;
use risk_index_models::{
    Band, ComponentBreakdown, ComponentKind, DependencyInput, Driver, FamilyDefinition,
    IndexResult,
};

pub use interpretation::{InterpretationError, InterpretationRequest, TextGenerator};
pub use registry::{FamilyRegistry, RegistryError};

/// Inputs to one family/date evaluation.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationInput<'a> {
    pub family: &'a FamilyDefinition,
    pub date: NaiveDate,
    /// Alerts created on `date`. Out-of-scope alerts are ignored.
    pub alerts: &'a [AlertEvent],
    /// Persisted results of this family for earlier dates. Entries outside
    /// the windows each step needs are ignored.
    pub history: &'a [IndexResult],
    /// Same-day values of the family's dependencies.
    pub dependencies: &'a [DependencyInput],
}

/// Numeric outcome of an evaluation, before interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: u8,
    pub band: Band,
    pub trend_1d: Option<f64>,
    pub trend_7d: Option<f64>,
    pub breakdown: ComponentBreakdown,
    pub drivers: Vec<Driver>,
}

impl Evaluation {
    /// Request for the interpretation step.
    #[must_use]
    pub fn interpretation_request(&self, family: &FamilyDefinition) -> InterpretationRequest {
        InterpretationRequest {
            family_id: family.id.clone(),
            family_name: family.name.clone(),
            value: self.value,
            band: self.band,
            trend_1d: self.trend_1d,
            trend_7d: self.trend_7d,
            insufficient_history: self.breakdown.insufficient_history,
            components: self.breakdown.components.clone(),
            drivers: self.drivers.clone(),
        }
    }

    /// Assembles the persisted record.
    #[must_use]
    pub fn into_result(
        self,
        family: &FamilyDefinition,
        date: NaiveDate,
        interpretation: String,
        computed_at: DateTime<Utc>,
    ) -> IndexResult {
        IndexResult {
            family_id: family.id.clone(),
            region_id: family.region_id(),
            date,
            value: self.value,
            band: self.band,
            trend_1d: self.trend_1d,
            trend_7d: self.trend_7d,
            breakdown: self.breakdown,
            drivers: self.drivers,
            interpretation,
            model_version: family.model_version.clone(),
            computed_at,
        }
    }
}

/// Alerts a family sees: region-scoped families drop alerts outside their
/// region (including unmapped ones). The result is deduplicated by id and
/// sorted by `(created_at, id)`.
#[must_use]
pub fn scope_alerts(family: &FamilyDefinition, alerts: &[AlertEvent]) -> Vec<AlertEvent> {
    let mut scoped: Vec<AlertEvent> = alerts
        .iter()
        .filter(|a| family.region.is_none() || a.region == family.region)
        .cloned()
        .collect();
    scoped.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    let mut seen = BTreeSet::new();
    scoped.retain(|a| seen.insert(a.id.clone()));
    scoped
}

fn window<'a>(
    history: &'a [IndexResult],
    family: &'a FamilyDefinition,
    date: NaiveDate,
    days: u32,
) -> impl Iterator<Item = &'a IndexResult> + 'a {
    let start = date
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(NaiveDate::MIN);
    history
        .iter()
        .filter(move |r| r.family_id == family.id && r.date >= start && r.date < date)
}

/// Evaluates one family for one date.
#[must_use]
pub fn evaluate(input: &EvaluationInput<'_>) -> Evaluation {
    let EvaluationInput {
        family,
        date,
        alerts,
        history,
        dependencies,
    } = *input;

    let alerts = scope_alerts(family, alerts);

    let mut baseline_history: Vec<&IndexResult> =
        window(history, family, date, family.baseline_window_days).collect();
    baseline_history.sort_by_key(|r| r.date);
    let baseline_raw: Vec<_> = baseline_history.iter().map(|r| r.breakdown.raw()).collect();

    let lookback = u32::try_from(components::VELOCITY_LOOKBACK_DAYS).unwrap_or(u32::MAX);
    let mut recent: Vec<&IndexResult> = window(history, family, date, lookback).collect();
    recent.sort_by_key(|r| r.date);
    let prior_pressure: Vec<f64> = recent
        .iter()
        .filter_map(|r| {
            r.breakdown
                .score(ComponentKind::SeverityPressure)
                .map(|s| s.raw)
        })
        .collect();

    let extraction = components::extract(family, &alerts, &prior_pressure, dependencies);
    let baselines = baseline::compute_baselines(family, &baseline_raw);
    let composite = formula::composite(family, &extraction.raw, &baselines);

    let week = window(history, family, date, family.history_days());
    let prior_values: Vec<(NaiveDate, u8)> = week.map(|r| (r.date, r.value)).collect();
    let trend_1d = trend::trend_1d(date, composite.value, &prior_values);
    let trend_7d = trend::trend_7d(date, composite.value, &prior_values);

    let labels = extraction.labels_by_alert(&alerts);
    let drivers = drivers::rank_drivers(family, &alerts, &labels);

    if composite.insufficient_history {
        log::debug!(
            "{} {date}: normalizing against fallback caps ({} prior results in window)",
            family.id,
            baseline_raw.len()
        );
    }

    Evaluation {
        value: composite.value,
        band: composite.band,
        trend_1d,
        trend_7d,
        breakdown: ComponentBreakdown {
            components: composite.scores,
            weighted_sum: composite.weighted_sum,
            insufficient_history: composite.insufficient_history,
            velocity_available: extraction.velocity_available,
            alert_count: alerts.len(),
            matched_entities: extraction.matched_entities,
            matched_themes: extraction.matched_themes,
            dependencies: dependencies.to_vec(),
        },
        drivers,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};
    use risk_index_alert_models::{AlertCategory, AlertType, Region, Severity};
    use risk_index_models::{BaselineSource, FamilyId};

    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, hour, 0, 0).unwrap()
    }

    fn registry() -> FamilyRegistry {
        FamilyRegistry::builtin()
    }

    fn energy_alert(id: &str, region: Region) -> AlertEvent {
        AlertEvent::new(id, AlertType::HighImpact, format!("Strike on terminal {id}"), at(6))
            .with_severity(Severity::Critical)
            .with_confidence(1.0)
            .with_category(AlertCategory::Energy)
            .with_region(region)
    }

    fn evaluate_with(
        family: &FamilyDefinition,
        alerts: &[AlertEvent],
        history: &[IndexResult],
        dependencies: &[DependencyInput],
    ) -> Evaluation {
        evaluate(&EvaluationInput {
            family,
            date: date(),
            alerts,
            history,
            dependencies,
        })
    }

    fn persisted(family: &FamilyDefinition, days_back: u64, value: u8) -> IndexResult {
        let eval = evaluate_with(family, &[], &[], &[]);
        let mut result = eval.into_result(
            family,
            date().checked_sub_days(Days::new(days_back)).unwrap(),
            String::new(),
            at(0),
        );
        result.value = value;
        result
    }

    #[test]
    fn empty_day_yields_zero_and_lowest_band() {
        let registry = registry();
        for family in registry.families() {
            let eval = evaluate_with(family, &[], &[], &[]);
            assert_eq!(eval.value, 0, "{}", family.id);
            assert_eq!(eval.band, family.lowest_band());
            assert!(eval.drivers.is_empty());
            assert_eq!(eval.trend_1d, None);
            assert_eq!(eval.trend_7d, None);
            assert!(eval.breakdown.insufficient_history);
        }
    }

    #[test]
    fn single_alert_scenario() {
        let registry = registry();
        let family = registry.get("middle_east").unwrap();
        let eval = evaluate_with(family, &[energy_alert("1", Region::MiddleEast)], &[], &[]);

        let sp = eval.breakdown.score(ComponentKind::SeverityPressure).unwrap();
        assert!((sp.raw - 6.5).abs() < 1e-12);
        assert!((sp.normalized - 0.26).abs() < 1e-12);
        assert!((sp.contribution - 0.5 * 0.26).abs() < 1e-12);
        assert_eq!(sp.baseline.source, BaselineSource::Fallback);
        assert!(eval.breakdown.insufficient_history);
        assert_eq!(eval.breakdown.alert_count, 1);
        assert_eq!(eval.drivers.len(), 1);
    }

    #[test]
    fn regional_families_drop_out_of_region_alerts() {
        let registry = registry();
        let alerts = vec![
            energy_alert("1", Region::MiddleEast),
            energy_alert("2", Region::Europe),
            AlertEvent::new("3", AlertType::HighImpact, "Unmapped", at(7)),
        ];
        let me = evaluate_with(registry.get("middle_east").unwrap(), &alerts, &[], &[]);
        assert_eq!(me.breakdown.alert_count, 1);

        let global = evaluate_with(registry.get("global").unwrap(), &alerts, &[], &[]);
        assert_eq!(global.breakdown.alert_count, 3);
    }

    #[test]
    fn contagion_scenario() {
        let registry = registry();
        let europe = registry.get("europe").unwrap();
        let deps = vec![DependencyInput {
            family: FamilyId::new("middle_east"),
            weight: 0.6,
            value: 60,
        }];
        let eval = evaluate_with(europe, &[], &[], &deps);
        let contagion = eval.breakdown.score(ComponentKind::Contagion).unwrap();
        assert!((contagion.raw - 0.36).abs() < 1e-12);
        assert!((contagion.normalized - 0.36).abs() < 1e-12);
        assert_eq!(eval.breakdown.dependencies, deps);
    }

    #[test]
    fn velocity_needs_prior_days() {
        let registry = registry();
        let global = registry.get("global").unwrap();
        let alerts = vec![energy_alert("1", Region::Europe)];

        let cold = evaluate_with(global, &alerts, &[], &[]);
        assert!(!cold.breakdown.velocity_available);
        assert!(cold.breakdown.score(ComponentKind::Velocity).unwrap().raw.abs() < 1e-12);

        let history = vec![persisted(global, 2, 10), persisted(global, 1, 12)];
        let warm = evaluate_with(global, &alerts, &history, &[]);
        assert!(warm.breakdown.velocity_available);
        // prior severity pressure was 0 on both days
        assert!((warm.breakdown.score(ComponentKind::Velocity).unwrap().raw - 6.5).abs() < 1e-12);
    }

    #[test]
    fn trends_follow_persisted_history() {
        let registry = registry();
        let family = registry.get("black_sea").unwrap();

        let one_day = vec![persisted(family, 1, 5)];
        let eval = evaluate_with(family, &[], &one_day, &[]);
        assert_eq!(eval.trend_1d, Some(-5.0));
        assert_eq!(eval.trend_7d, None);

        let three_days = vec![
            persisted(family, 1, 6),
            persisted(family, 4, 3),
            persisted(family, 6, 0),
        ];
        let eval = evaluate_with(family, &[], &three_days, &[]);
        assert_eq!(eval.trend_1d, Some(-6.0));
        assert_eq!(eval.trend_7d, Some(-3.0));
    }

    #[test]
    fn enough_history_switches_to_historical_baselines() {
        let registry = registry();
        let family = registry.get("black_sea").unwrap();
        let history: Vec<_> = (1..=u64::from(family.min_history_days))
            .map(|d| persisted(family, d, 0))
            .collect();
        let eval = evaluate_with(family, &[], &history, &[]);
        assert!(!eval.breakdown.insufficient_history);
        assert!(
            eval.breakdown
                .components
                .iter()
                .all(|c| c.baseline.source == BaselineSource::Historical)
        );
    }

    #[test]
    fn evaluation_is_deterministic() {
        let registry = registry();
        let family = registry.get("market_stress").unwrap();
        let alerts = vec![
            energy_alert("2", Region::MiddleEast).with_body("Tankers rerouted from Hormuz"),
            energy_alert("1", Region::BlackSea).with_body("Explosion at Novorossiysk terminal"),
        ];
        let deps = vec![DependencyInput {
            family: FamilyId::new("europe"),
            weight: 1.0,
            value: 40,
        }];
        let a = evaluate_with(family, &alerts, &[], &deps);
        let mut reversed = alerts.clone();
        reversed.reverse();
        let b = evaluate_with(family, &reversed, &[], &deps);
        assert_eq!(a, b);
        assert!(a.breakdown.matched_entities.contains("Strait of Hormuz"));
        assert!(a.breakdown.matched_entities.contains("Novorossiysk"));
        assert_eq!(a.band, family.band_for(a.value));
    }

    fn saturating_alerts(per_region: usize) -> Vec<AlertEvent> {
        Region::all()
            .iter()
            .flat_map(|region| {
                (0..per_region).map(move |i| {
                    energy_alert(&format!("{region}-{i}"), *region)
                        .with_body(format!(
                            "Explosion at Novorossiysk terminal, tankers rerouted from Hormuz, \
                             sanctions and price spike, report {i}"
                        ))
                        .with_assets(["crude oil", "natural gas", "wheat"])
                })
            })
            .collect()
    }

    #[test]
    fn saturated_days_stay_in_range_for_every_family() {
        let registry = registry();
        let today = saturating_alerts(40);
        let busier = saturating_alerts(120);

        for family in registry.families() {
            let deps: Vec<_> = family
                .dependencies
                .iter()
                .map(|d| DependencyInput {
                    family: d.family.clone(),
                    weight: d.weight,
                    value: 100,
                })
                .collect();
            let history: Vec<_> = (1..=3)
                .map(|days_back| {
                    evaluate_with(family, &busier, &[], &deps).into_result(
                        family,
                        date().checked_sub_days(Days::new(days_back)).unwrap(),
                        String::new(),
                        at(0),
                    )
                })
                .collect();

            let eval = evaluate_with(family, &today, &history, &deps);

            assert!(eval.breakdown.insufficient_history, "{}", family.id);
            if let Some(velocity) = eval.breakdown.score(ComponentKind::Velocity) {
                assert!(eval.breakdown.velocity_available, "{}", family.id);
                assert!(velocity.raw < 0.0, "{}: {}", family.id, velocity.raw);
            }
            for score in &eval.breakdown.components {
                assert!(
                    (0.0..=1.0).contains(&score.normalized),
                    "{} {}: {}",
                    family.id,
                    score.kind,
                    score.normalized
                );
            }
            assert!((0.0..=1.0).contains(&eval.breakdown.weighted_sum), "{}", family.id);
            assert!((1..=100).contains(&eval.value), "{}: {}", family.id, eval.value);
            assert_eq!(eval.band, family.band_for(eval.value), "{}", family.id);
        }
    }
}
