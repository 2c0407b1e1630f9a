//! Read-only access to the classified alert stream.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use moosicbox_json_utils::database::ToValue as _;
use risk_index_alert_models::{AlertEvent, Region, row::AlertRow};
use switchy_database::{Database, DatabaseValue};

use crate::{StoreError, conversion, midnight};

/// Source of the alerts created on a calendar day.
#[async_trait]
pub trait AlertSource: Send + Sync {
    /// Returns every alert with `created_at` in `[date 00:00, date+1 00:00)`
    /// UTC, sorted by `(created_at, id)`.
    ///
    /// With a region filter only alerts whose normalized region matches are
    /// returned; alerts with no recognizable region never match a filter.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the underlying storage cannot be read.
    async fn fetch_alerts(
        &self,
        date: NaiveDate,
        region: Option<Region>,
    ) -> Result<Vec<AlertEvent>, StoreError>;
}

/// Half-open UTC bounds of a calendar day.
pub(crate) fn day_bounds(date: NaiveDate) -> Result<(NaiveDateTime, NaiveDateTime), StoreError> {
    let next = date
        .checked_add_days(Days::new(1))
        .ok_or_else(|| StoreError::Conversion {
            message: format!("No day after {date}"),
        })?;
    Ok((midnight(date), midnight(next)))
}

/// Sorts by `(created_at, id)` and applies the optional region filter.
pub(crate) fn finish(mut alerts: Vec<AlertEvent>, region: Option<Region>) -> Vec<AlertEvent> {
    if let Some(region) = region {
        alerts.retain(|a| a.region == Some(region));
    }
    alerts.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    alerts
}

/// [`AlertSource`] over the `alerts` table.
#[derive(Clone)]
pub struct PgAlertSource {
    db: Arc<dyn Database>,
}

impl PgAlertSource {
    /// Creates a source over an open connection.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

fn row_to_alert_row(row: &switchy_database::Row) -> Result<AlertRow, StoreError> {
    let created_at: NaiveDateTime =
        row.to_value("created_at").map_err(conversion("created_at"))?;
    Ok(AlertRow {
        id: row.to_value("id").map_err(conversion("id"))?,
        alert_type: row.to_value("alert_type").map_err(conversion("alert_type"))?,
        severity: row.to_value("severity").map_err(conversion("severity"))?,
        confidence: row.to_value("confidence").map_err(conversion("confidence"))?,
        region: row.to_value("region").map_err(conversion("region"))?,
        assets: row.to_value("assets").map_err(conversion("assets"))?,
        classification: row
            .to_value("classification")
            .map_err(conversion("classification"))?,
        title: row.to_value("title").map_err(conversion("title"))?,
        body: row.to_value("body").map_err(conversion("body"))?,
        created_at: DateTime::<Utc>::from_naive_utc_and_offset(created_at, Utc),
    })
}

/// Decodes and normalizes rows, skipping the ones that cannot be used.
fn rows_to_alerts(rows: &[switchy_database::Row]) -> Vec<AlertEvent> {
    let mut alerts = Vec::with_capacity(rows.len());
    for row in rows {
        let alert_row = match row_to_alert_row(row) {
            Ok(alert_row) => alert_row,
            Err(e) => {
                log::warn!("Skipping undecodable alert row: {e}");
                continue;
            }
        };
        match alert_row.normalize() {
            Ok(alert) => alerts.push(alert),
            Err(e) => log::warn!("Skipping alert: {e}"),
        }
    }
    alerts
}

#[async_trait]
impl AlertSource for PgAlertSource {
    async fn fetch_alerts(
        &self,
        date: NaiveDate,
        region: Option<Region>,
    ) -> Result<Vec<AlertEvent>, StoreError> {
        let (start, end) = day_bounds(date)?;

        let rows = self
            .db
            .query_raw_params(
                "SELECT id, alert_type, severity, confidence, region, assets,
                        classification, title, body, created_at
                 FROM alerts
                 WHERE created_at >= $1 AND created_at < $2
                 ORDER BY created_at, id",
                &[DatabaseValue::DateTime(start), DatabaseValue::DateTime(end)],
            )
            .await?;

        let alerts = rows_to_alerts(&rows);

        log::debug!(
            "Fetched {} alerts for {date} ({} rows)",
            alerts.len(),
            rows.len()
        );

        Ok(finish(alerts, region))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use risk_index_alert_models::AlertType;
    use switchy_database::Row;

    use super::*;

    fn alert_row(id: &str, created_at: DatabaseValue) -> Row {
        let columns = vec![
            ("id", DatabaseValue::String(id.to_string())),
            ("alert_type", DatabaseValue::String("high_impact".to_string())),
            ("severity", DatabaseValue::Int64(4)),
            ("confidence", DatabaseValue::Real64(0.8)),
            ("region", DatabaseValue::String("Ukraine".to_string())),
            ("assets", DatabaseValue::Null),
            ("classification", DatabaseValue::Null),
            ("title", DatabaseValue::String(format!("Alert {id}"))),
            ("body", DatabaseValue::Null),
            ("created_at", created_at),
        ];
        Row {
            columns: columns
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    #[test]
    fn undecodable_rows_are_skipped_not_backdated() {
        let at = NaiveDate::from_ymd_opt(2025, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        let rows = vec![
            alert_row("good", DatabaseValue::DateTime(at)),
            alert_row("bad", DatabaseValue::Null),
        ];

        let alerts = rows_to_alerts(&rows);

        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "good");
        assert_eq!(alerts[0].created_at.naive_utc(), at);
        assert_eq!(alerts[0].severity, Some(risk_index_alert_models::Severity::High));
    }

    #[test]
    fn day_bounds_are_half_open_midnights() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
        let (start, end) = day_bounds(date).unwrap();
        assert_eq!(start.to_string(), "2025-02-28 00:00:00");
        assert_eq!(end.to_string(), "2025-03-01 00:00:00");
    }

    #[test]
    fn finish_sorts_and_filters_by_region() {
        let at = |h| Utc.with_ymd_and_hms(2025, 3, 1, h, 0, 0).unwrap();
        let alerts = vec![
            AlertEvent::new("b", AlertType::HighImpact, "b", at(9)).with_region(Region::Europe),
            AlertEvent::new("a", AlertType::HighImpact, "a", at(9)).with_region(Region::Europe),
            AlertEvent::new("c", AlertType::HighImpact, "c", at(1)),
            AlertEvent::new("d", AlertType::HighImpact, "d", at(2)).with_region(Region::BlackSea),
        ];

        let all: Vec<_> = finish(alerts.clone(), None)
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(all, vec!["c", "d", "a", "b"]);

        let europe: Vec<_> = finish(alerts, Some(Region::Europe))
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(europe, vec!["a", "b"]);
    }
}
