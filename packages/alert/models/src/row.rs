//! Upstream alert rows and their normalization into [`AlertEvent`]s.
//!
//! The classification pipeline writes alerts with loosely structured
//! fields: free-text regions, asset tags as either a JSON array or a
//! delimited string, and a metadata JSON blob that may repeat (or be the
//! only carrier of) category, severity and confidence. Column values win
//! over metadata values.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{AlertCategory, AlertEvent, AlertType, Region, Severity};

static CATEGORY_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*category\s*:\s*(.+?)\s*$").expect("valid regex"));

/// An alert as read from storage, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRow {
    /// Upstream alert identifier.
    pub id: String,
    /// Alert type string (`high_impact`, `regional-spike`, ...).
    pub alert_type: String,
    /// Severity column, if populated.
    pub severity: Option<i64>,
    /// Confidence column, if populated. Either a fraction or a percentage.
    pub confidence: Option<f64>,
    /// Free-text region.
    pub region: Option<String>,
    /// Asset tags as a JSON array or a `,`/`;`/`|` delimited string.
    pub assets: Option<String>,
    /// Classifier metadata JSON object.
    pub classification: Option<String>,
    /// Headline.
    pub title: String,
    /// Body text.
    pub body: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Error returned when a row's alert type is not one of the known kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAlertTypeError {
    /// The alert id.
    pub id: String,
    /// The unrecognized type string.
    pub alert_type: String,
}

impl std::fmt::Display for UnknownAlertTypeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "alert {} has unknown type {:?}",
            self.id, self.alert_type
        )
    }
}

impl std::error::Error for UnknownAlertTypeError {}

/// The subset of classifier metadata this crate understands.
#[derive(Debug, Default, Deserialize)]
struct Classification {
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    severity: Option<serde_json::Value>,
    #[serde(default)]
    confidence: Option<serde_json::Value>,
    #[serde(default)]
    region: Option<String>,
}

impl AlertRow {
    /// Normalizes this row into an [`AlertEvent`].
    ///
    /// # Errors
    ///
    /// Returns [`UnknownAlertTypeError`] if the alert type is not recognized.
    pub fn normalize(&self) -> Result<AlertEvent, UnknownAlertTypeError> {
        let alert_type =
            AlertType::parse_loose(&self.alert_type).ok_or_else(|| UnknownAlertTypeError {
                id: self.id.clone(),
                alert_type: self.alert_type.clone(),
            })?;

        let meta: Classification = self
            .classification
            .as_deref()
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_default();

        let severity = self
            .severity
            .or_else(|| meta.severity.as_ref().and_then(json_number).map(round_i64))
            .and_then(parse_severity);

        let confidence = self
            .confidence
            .or_else(|| meta.confidence.as_ref().and_then(json_number))
            .and_then(parse_confidence);

        let region = self
            .region
            .as_deref()
            .and_then(Region::normalize)
            .or_else(|| meta.region.as_deref().and_then(Region::normalize));

        let body = self.body.clone().unwrap_or_default();

        let category = meta
            .category
            .as_deref()
            .and_then(AlertCategory::from_text)
            .or_else(|| {
                CATEGORY_LINE_RE
                    .captures(&body)
                    .and_then(|c| c.get(1))
                    .and_then(|m| AlertCategory::from_text(m.as_str()))
            })
            .or_else(|| AlertCategory::from_text(&self.title))
            .unwrap_or(AlertCategory::Other);

        Ok(AlertEvent {
            id: self.id.clone(),
            alert_type,
            severity,
            confidence,
            region,
            asset_tags: self.assets.as_deref().map(parse_assets).unwrap_or_default(),
            category,
            headline: self.title.trim().to_string(),
            body,
            created_at: self.created_at,
        })
    }
}

fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn round_i64(value: f64) -> i64 {
    value.round() as i64
}

fn parse_severity(value: i64) -> Option<Severity> {
    u8::try_from(value)
        .ok()
        .and_then(|v| Severity::from_value(v).ok())
}

/// Accepts fractions in `[0, 1]` and percentages in `[2, 100]`.
///
/// Values just above 1 are overshooting fractions and values above 100
/// overshooting percentages; both clamp to 1.
fn parse_confidence(value: f64) -> Option<f64> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let fraction = match value {
        v if v <= 1.0 => v,
        v if v < 2.0 => 1.0,
        v => v / 100.0,
    };
    Some(fraction.clamp(0.0, 1.0))
}

/// Normalizes a single asset tag: trimmed, lowercase, internal whitespace
/// collapsed. Empty tags are dropped.
#[must_use]
pub fn normalize_asset(raw: &str) -> Option<String> {
    let tag = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if tag.is_empty() { None } else { Some(tag) }
}

/// Parses an asset tag list from a JSON array or a delimited string.
#[must_use]
pub fn parse_assets(raw: &str) -> BTreeSet<String> {
    if let Ok(list) = serde_json::from_str::<Vec<String>>(raw) {
        return list.iter().filter_map(|a| normalize_asset(a)).collect();
    }
    raw.split([',', ';', '|'])
        .filter_map(normalize_asset)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> AlertRow {
        AlertRow {
            id: "42".to_string(),
            alert_type: "high-impact".to_string(),
            severity: None,
            confidence: None,
            region: None,
            assets: None,
            classification: None,
            title: "  Strike on export terminal  ".to_string(),
            body: None,
            created_at: DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn columns_take_precedence_over_metadata() {
        let mut r = row();
        r.severity = Some(4);
        r.confidence = Some(0.9);
        r.region = Some("Western Europe".to_string());
        r.classification = Some(
            r#"{"category":"diplomacy","severity":2,"confidence":0.1,"region":"gulf"}"#
                .to_string(),
        );

        let event = r.normalize().unwrap();
        assert_eq!(event.alert_type, AlertType::HighImpact);
        assert_eq!(event.severity, Some(Severity::High));
        assert_eq!(event.confidence, Some(0.9));
        assert_eq!(event.region, Some(Region::Europe));
        assert_eq!(event.category, AlertCategory::Diplomacy);
        assert_eq!(event.headline, "Strike on export terminal");
    }

    #[test]
    fn metadata_fills_missing_columns() {
        let mut r = row();
        r.classification =
            Some(r#"{"severity":"5","confidence":80,"region":"Persian Gulf"}"#.to_string());

        let event = r.normalize().unwrap();
        assert_eq!(event.severity, Some(Severity::Critical));
        assert!((event.confidence.unwrap() - 0.8).abs() < 1e-12);
        assert_eq!(event.region, Some(Region::MiddleEast));
    }

    #[test]
    fn confidence_rescales_percentages_and_clamps_overshoot() {
        assert_eq!(parse_confidence(0.35), Some(0.35));
        assert_eq!(parse_confidence(1.5), Some(1.0));
        assert_eq!(parse_confidence(250.0), Some(1.0));
        assert_eq!(parse_confidence(-0.2), None);
        assert!((parse_confidence(72.0).unwrap() - 0.72).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_severity_is_dropped() {
        let mut r = row();
        r.severity = Some(9);
        assert_eq!(r.normalize().unwrap().severity, None);
    }

    #[test]
    fn category_falls_back_to_body_line_then_headline() {
        let mut r = row();
        r.body = Some("Reported overnight.\nCategory: Sanctions\nMore text".to_string());
        assert_eq!(r.normalize().unwrap().category, AlertCategory::Sanctions);

        let r = row();
        assert_eq!(r.normalize().unwrap().category, AlertCategory::Other);

        let mut r = row();
        r.title = "Missile strike on refinery".to_string();
        assert_eq!(r.normalize().unwrap().category, AlertCategory::Military);
    }

    #[test]
    fn unknown_type_is_an_error() {
        let mut r = row();
        r.alert_type = "weekly_digest".to_string();
        let err = r.normalize().unwrap_err();
        assert_eq!(err.alert_type, "weekly_digest");
    }

    #[test]
    fn assets_parse_from_json_or_delimited_text() {
        let from_json = parse_assets(r#"["Brent", " TTF ", ""]"#);
        assert_eq!(
            from_json.into_iter().collect::<Vec<_>>(),
            vec!["brent".to_string(), "ttf".to_string()]
        );

        let from_text = parse_assets("LNG; natural  gas | Brent,brent");
        assert_eq!(
            from_text.into_iter().collect::<Vec<_>>(),
            vec![
                "brent".to_string(),
                "lng".to_string(),
                "natural gas".to_string()
            ]
        );
    }
}
