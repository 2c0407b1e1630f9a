//! Driver ranking and deduplication.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use risk_index_alert_models::AlertEvent;
use risk_index_models::{Driver, FamilyDefinition};

static PUNCTUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}\s]+").expect("valid regex"));

/// Lowercases, strips punctuation and collapses whitespace.
#[must_use]
pub fn normalize_headline(headline: &str) -> String {
    let lower = headline.to_lowercase();
    let stripped = PUNCTUATION_RE.replace_all(&lower, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn rank(a: &AlertEvent, b: &AlertEvent) -> Ordering {
    b.severity
        .cmp(&a.severity)
        .then_with(|| b.effective_confidence().total_cmp(&a.effective_confidence()))
        .then_with(|| a.id.cmp(&b.id))
}

/// Picks, ranks and deduplicates the alerts that drove a result.
///
/// Families with market components draw from alerts that matched an entity
/// or theme, other families from high-impact alerts. Derived spike alerts
/// only enter the pool when no atomic candidate exists, and every alert is
/// used when the pool is still empty. Ranking is by severity then
/// confidence, both descending, with the alert id breaking ties.
#[must_use]
pub fn rank_drivers(
    family: &FamilyDefinition,
    alerts: &[AlertEvent],
    labels: &BTreeMap<&str, Vec<String>>,
) -> Vec<Driver> {
    let mut pool: Vec<&AlertEvent> = if family.uses_entity_matching() {
        let matched: Vec<&AlertEvent> = alerts
            .iter()
            .filter(|a| labels.contains_key(a.id.as_str()))
            .collect();
        let atomic: Vec<&AlertEvent> = matched
            .iter()
            .copied()
            .filter(|a| !a.alert_type.is_derived())
            .collect();
        if atomic.is_empty() { matched } else { atomic }
    } else {
        alerts
            .iter()
            .filter(|a| !a.alert_type.is_derived())
            .collect()
    };
    if pool.is_empty() {
        pool = alerts.iter().collect();
    }

    pool.sort_by(|a, b| rank(a, b));

    let mut seen = HashSet::new();
    pool.into_iter()
        .filter(|a| seen.insert(normalize_headline(&a.headline)))
        .take(family.driver_limit)
        .map(|a| Driver {
            alert_id: a.id.clone(),
            headline: a.headline.clone(),
            alert_type: a.alert_type,
            category: a.category,
            severity: a.severity.map(risk_index_alert_models::Severity::value),
            confidence: a.confidence,
            region: a.region,
            matched_entities: labels.get(a.id.as_str()).cloned().unwrap_or_default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone as _, Utc};
    use risk_index_alert_models::{AlertType, Severity};
    use risk_index_models::{Band, BandThreshold, ComponentKind, ComponentSpec, FamilyId};

    use super::*;

    fn family(kind: ComponentKind, driver_limit: usize) -> FamilyDefinition {
        FamilyDefinition {
            id: FamilyId::new("test"),
            name: "Test".to_string(),
            region: None,
            model_version: "v1".to_string(),
            min_history_days: 14,
            baseline_window_days: 90,
            driver_limit,
            components: vec![ComponentSpec {
                kind,
                weight: 1.0,
                fallback_cap: 10.0,
            }],
            bands: vec![
                BandThreshold {
                    band: Band::Low,
                    min: 0,
                },
                BandThreshold {
                    band: Band::High,
                    min: 50,
                },
            ],
            dependencies: vec![],
        }
    }

    fn alert(id: &str, alert_type: AlertType, headline: &str) -> AlertEvent {
        AlertEvent::new(
            id,
            alert_type,
            headline,
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn headline_normalization() {
        assert_eq!(
            normalize_headline("  Pipeline   BLAST: Flows halted!! "),
            "pipeline blast flows halted"
        );
    }

    #[test]
    fn ranks_by_severity_then_confidence_then_id() {
        let alerts = vec![
            alert("c", AlertType::HighImpact, "third").with_severity(Severity::High),
            alert("b", AlertType::HighImpact, "second")
                .with_severity(Severity::Critical)
                .with_confidence(0.4),
            alert("a", AlertType::HighImpact, "first")
                .with_severity(Severity::Critical)
                .with_confidence(0.9),
            alert("d", AlertType::HighImpact, "fourth").with_severity(Severity::High),
        ];
        let drivers = rank_drivers(
            &family(ComponentKind::SeverityPressure, 5),
            &alerts,
            &BTreeMap::new(),
        );
        let ids: Vec<_> = drivers.iter().map(|d| d.alert_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn dedupes_headlines_and_truncates() {
        let alerts = vec![
            alert("1", AlertType::HighImpact, "Refinery fire in Haifa")
                .with_severity(Severity::Critical),
            alert("2", AlertType::HighImpact, "refinery FIRE in Haifa!")
                .with_severity(Severity::High),
            alert("3", AlertType::HighImpact, "Port closed").with_severity(Severity::Moderate),
            alert("4", AlertType::HighImpact, "Talks stall").with_severity(Severity::Low),
        ];
        let drivers = rank_drivers(
            &family(ComponentKind::SeverityPressure, 2),
            &alerts,
            &BTreeMap::new(),
        );
        let ids: Vec<_> = drivers.iter().map(|d| d.alert_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn prefers_atomic_alerts_then_falls_back_to_everything() {
        let alerts = vec![
            alert("spike", AlertType::RegionalSpike, "Spike").with_severity(Severity::Critical),
            alert("atomic", AlertType::HighImpact, "Atomic").with_severity(Severity::Low),
        ];
        let fam = family(ComponentKind::SeverityPressure, 5);
        let drivers = rank_drivers(&fam, &alerts, &BTreeMap::new());
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[0].alert_id, "atomic");

        let drivers = rank_drivers(&fam, &alerts[..1], &BTreeMap::new());
        assert_eq!(drivers[0].alert_id, "spike");
    }

    #[test]
    fn market_families_use_matched_alerts_and_carry_entities() {
        let alerts = vec![
            alert("x", AlertType::HighImpact, "Unrelated").with_severity(Severity::Critical),
            alert("y", AlertType::HighImpact, "Hormuz").with_severity(Severity::Moderate),
        ];
        let mut labels = BTreeMap::new();
        labels.insert("y", vec!["Strait of Hormuz".to_string()]);

        let drivers = rank_drivers(
            &family(ComponentKind::ChokepointFactor, 5),
            &alerts,
            &labels,
        );
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[0].alert_id, "y");
        assert_eq!(drivers[0].matched_entities, vec!["Strait of Hormuz"]);
    }

    #[test]
    fn market_families_drop_matched_spikes_when_atomic_matches_exist() {
        let alerts = vec![
            alert("spike", AlertType::RegionalSpike, "Hormuz spike")
                .with_severity(Severity::Critical),
            alert("atomic", AlertType::HighImpact, "Tanker seized in Hormuz")
                .with_severity(Severity::Moderate),
        ];
        let mut labels = BTreeMap::new();
        labels.insert("spike", vec!["Strait of Hormuz".to_string()]);
        labels.insert("atomic", vec!["Strait of Hormuz".to_string()]);
        let fam = family(ComponentKind::ChokepointFactor, 5);

        let drivers = rank_drivers(&fam, &alerts, &labels);
        let ids: Vec<_> = drivers.iter().map(|d| d.alert_id.as_str()).collect();
        assert_eq!(ids, vec!["atomic"]);

        labels.remove("atomic");
        let drivers = rank_drivers(&fam, &alerts, &labels);
        let ids: Vec<_> = drivers.iter().map(|d| d.alert_id.as_str()).collect();
        assert_eq!(ids, vec!["spike"]);
    }
}
