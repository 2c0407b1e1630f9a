//! Index result persistence.
//!
//! One row per `(family_id, index_date)`. The breakdown and drivers are
//! serialized to JSON here and nowhere else; everything above this module
//! works with typed values.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use moosicbox_json_utils::database::ToValue as _;
use risk_index_models::{Band, FamilyId, IndexResult};
use strum_macros::{AsRefStr, Display};
use switchy_database::{Database, DatabaseValue};

use crate::{StoreError, conversion, midnight};

/// What a [`IndexStore::save`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SaveOutcome {
    /// No record existed; one was written.
    Inserted,
    /// A record existed and `force` replaced it.
    Overwritten,
    /// A record existed and was left untouched.
    AlreadyExists,
}

/// Persistent store of computed index results.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Persists `result`. Without `force` an existing `(family, date)`
    /// record is left untouched and [`SaveOutcome::AlreadyExists`] is
    /// returned. Either the full record is written or nothing is.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    async fn save(&self, result: &IndexResult, force: bool) -> Result<SaveOutcome, StoreError>;

    /// Returns the result for `family` on `date`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn get(
        &self,
        family: &FamilyId,
        date: NaiveDate,
    ) -> Result<Option<IndexResult>, StoreError>;

    /// Returns the most recent result for `family`, optionally restricted
    /// to a region id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn get_latest(
        &self,
        family: &FamilyId,
        region: Option<&str>,
    ) -> Result<Option<IndexResult>, StoreError>;

    /// Returns results for `family` with `from <= date <= to`, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn get_history(
        &self,
        family: &FamilyId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<IndexResult>, StoreError>;

    /// Whether a result exists for `family` on `date`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the read fails.
    async fn exists(&self, family: &FamilyId, date: NaiveDate) -> Result<bool, StoreError> {
        Ok(self.get(family, date).await?.is_some())
    }
}

const SELECT_COLUMNS: &str = "family_id, region_id, index_date, value, band, trend_1d, trend_7d,
     components, drivers, interpretation, model_version, computed_at";

/// [`IndexStore`] over the `risk_indices` table.
#[derive(Clone)]
pub struct PgIndexStore {
    db: Arc<dyn Database>,
}

impl PgIndexStore {
    /// Creates a store over an open connection.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

fn opt_real(value: Option<f64>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, DatabaseValue::Real64)
}

fn row_to_result(row: &switchy_database::Row) -> Result<IndexResult, StoreError> {
    let family_id: String = row.to_value("family_id").map_err(conversion("family_id"))?;
    let date: NaiveDateTime = row.to_value("index_date").map_err(conversion("index_date"))?;
    let computed_at: NaiveDateTime =
        row.to_value("computed_at").map_err(conversion("computed_at"))?;

    let value: i32 = row.to_value("value").map_err(conversion("value"))?;
    let value = u8::try_from(value)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or_else(|| StoreError::Conversion {
            message: format!("Index value {value} out of range"),
        })?;

    let band: String = row.to_value("band").map_err(conversion("band"))?;
    let band: Band = band.parse().map_err(|_| StoreError::Conversion {
        message: format!("Unknown band {band:?}"),
    })?;

    let components: String = row.to_value("components").map_err(conversion("components"))?;
    let drivers: String = row.to_value("drivers").map_err(conversion("drivers"))?;

    Ok(IndexResult {
        family_id: FamilyId::new(family_id),
        region_id: row.to_value("region_id").map_err(conversion("region_id"))?,
        date: date.date(),
        value,
        band,
        trend_1d: row.to_value("trend_1d").map_err(conversion("trend_1d"))?,
        trend_7d: row.to_value("trend_7d").map_err(conversion("trend_7d"))?,
        breakdown: serde_json::from_str(&components)?,
        drivers: serde_json::from_str(&drivers)?,
        interpretation: row
            .to_value("interpretation")
            .map_err(conversion("interpretation"))?,
        model_version: row
            .to_value("model_version")
            .map_err(conversion("model_version"))?,
        computed_at: DateTime::<Utc>::from_naive_utc_and_offset(computed_at, Utc),
    })
}

#[async_trait]
impl IndexStore for PgIndexStore {
    async fn save(&self, result: &IndexResult, force: bool) -> Result<SaveOutcome, StoreError> {
        let components = serde_json::to_string(&result.breakdown)?;
        let drivers = serde_json::to_string(&result.drivers)?;

        let conflict = if force {
            "ON CONFLICT (family_id, index_date) DO UPDATE SET
                 region_id = EXCLUDED.region_id,
                 value = EXCLUDED.value,
                 band = EXCLUDED.band,
                 trend_1d = EXCLUDED.trend_1d,
                 trend_7d = EXCLUDED.trend_7d,
                 components = EXCLUDED.components,
                 drivers = EXCLUDED.drivers,
                 interpretation = EXCLUDED.interpretation,
                 insufficient_history = EXCLUDED.insufficient_history,
                 model_version = EXCLUDED.model_version,
                 computed_at = EXCLUDED.computed_at"
        } else {
            "ON CONFLICT (family_id, index_date) DO NOTHING"
        };

        let sql = format!(
            "INSERT INTO risk_indices (
                family_id, region_id, index_date, value, band, trend_1d, trend_7d,
                components, drivers, interpretation, insufficient_history,
                model_version, computed_at
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             {conflict}
             RETURNING (xmax = 0) AS inserted"
        );

        let rows = self
            .db
            .query_raw_params(
                &sql,
                &[
                    DatabaseValue::String(result.family_id.to_string()),
                    DatabaseValue::String(result.region_id.clone()),
                    DatabaseValue::DateTime(midnight(result.date)),
                    DatabaseValue::Int32(i32::from(result.value)),
                    DatabaseValue::String(result.band.to_string()),
                    opt_real(result.trend_1d),
                    opt_real(result.trend_7d),
                    DatabaseValue::String(components),
                    DatabaseValue::String(drivers),
                    DatabaseValue::String(result.interpretation.clone()),
                    DatabaseValue::Bool(result.insufficient_history()),
                    DatabaseValue::String(result.model_version.clone()),
                    DatabaseValue::DateTime(result.computed_at.naive_utc()),
                ],
            )
            .await?;

        let outcome = match rows.first() {
            None => SaveOutcome::AlreadyExists,
            Some(row) => {
                let inserted: bool = row.to_value("inserted").map_err(conversion("inserted"))?;
                if inserted {
                    SaveOutcome::Inserted
                } else {
                    SaveOutcome::Overwritten
                }
            }
        };

        log::debug!("{} {}: {outcome}", result.family_id, result.date);
        Ok(outcome)
    }

    async fn get(
        &self,
        family: &FamilyId,
        date: NaiveDate,
    ) -> Result<Option<IndexResult>, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM risk_indices
                     WHERE family_id = $1 AND index_date = $2"
                ),
                &[
                    DatabaseValue::String(family.to_string()),
                    DatabaseValue::DateTime(midnight(date)),
                ],
            )
            .await?;

        rows.first().map(row_to_result).transpose()
    }

    async fn get_latest(
        &self,
        family: &FamilyId,
        region: Option<&str>,
    ) -> Result<Option<IndexResult>, StoreError> {
        let mut params = vec![DatabaseValue::String(family.to_string())];
        let region_filter = region.map_or("", |region| {
            params.push(DatabaseValue::String(region.to_string()));
            " AND region_id = $2"
        });

        let rows = self
            .db
            .query_raw_params(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM risk_indices
                     WHERE family_id = $1{region_filter}
                     ORDER BY index_date DESC
                     LIMIT 1"
                ),
                &params,
            )
            .await?;

        rows.first().map(row_to_result).transpose()
    }

    async fn get_history(
        &self,
        family: &FamilyId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<IndexResult>, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM risk_indices
                     WHERE family_id = $1 AND index_date >= $2 AND index_date <= $3
                     ORDER BY index_date ASC"
                ),
                &[
                    DatabaseValue::String(family.to_string()),
                    DatabaseValue::DateTime(midnight(from)),
                    DatabaseValue::DateTime(midnight(to)),
                ],
            )
            .await?;

        rows.iter().map(row_to_result).collect()
    }

    async fn exists(&self, family: &FamilyId, date: NaiveDate) -> Result<bool, StoreError> {
        let rows = self
            .db
            .query_raw_params(
                "SELECT 1 AS present FROM risk_indices
                 WHERE family_id = $1 AND index_date = $2",
                &[
                    DatabaseValue::String(family.to_string()),
                    DatabaseValue::DateTime(midnight(date)),
                ],
            )
            .await?;

        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone as _;
    use risk_index_models::ComponentBreakdown;
    use switchy_database::Row;

    use super::*;

    fn breakdown_json() -> String {
        serde_json::to_string(&ComponentBreakdown {
            components: vec![],
            weighted_sum: 0.42,
            insufficient_history: false,
            velocity_available: true,
            alert_count: 3,
            matched_entities: BTreeSet::new(),
            matched_themes: BTreeSet::new(),
            dependencies: vec![],
        })
        .unwrap()
    }

    fn row(overrides: &[(&str, DatabaseValue)]) -> Row {
        let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let mut columns = vec![
            ("family_id", DatabaseValue::String("europe".to_string())),
            ("region_id", DatabaseValue::String("europe".to_string())),
            ("index_date", DatabaseValue::DateTime(midnight(date))),
            ("value", DatabaseValue::Int32(42)),
            ("band", DatabaseValue::String("ELEVATED".to_string())),
            ("trend_1d", DatabaseValue::Null),
            ("trend_7d", DatabaseValue::Real64(-3.5)),
            ("components", DatabaseValue::String(breakdown_json())),
            ("drivers", DatabaseValue::String("[]".to_string())),
            ("interpretation", DatabaseValue::String("Steady.".to_string())),
            ("model_version", DatabaseValue::String("europe-v1".to_string())),
            (
                "computed_at",
                DatabaseValue::DateTime(midnight(date) + chrono::Duration::hours(6)),
            ),
        ];
        for (name, value) in overrides {
            if let Some(column) = columns.iter_mut().find(|(c, _)| c == name) {
                column.1 = value.clone();
            }
        }
        Row {
            columns: columns
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    #[test]
    fn decodes_a_complete_row() {
        let result = row_to_result(&row(&[])).unwrap();

        assert_eq!(result.family_id, FamilyId::new("europe"));
        assert_eq!(result.date, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
        assert_eq!(result.value, 42);
        assert_eq!(result.band, Band::Elevated);
        assert_eq!(result.trend_1d, None);
        assert_eq!(result.trend_7d, Some(-3.5));
        assert!((result.breakdown.weighted_sum - 0.42).abs() < f64::EPSILON);
        assert_eq!(
            result.computed_at,
            Utc.with_ymd_and_hms(2025, 3, 4, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn undecodable_columns_are_errors_not_defaults() {
        for column in ["value", "computed_at", "family_id", "band", "model_version"] {
            let err = row_to_result(&row(&[(column, DatabaseValue::Null)])).unwrap_err();
            assert!(
                matches!(err, StoreError::Conversion { .. }),
                "{column}: {err}"
            );
        }
    }

    #[test]
    fn out_of_range_value_is_rejected() {
        let err = row_to_result(&row(&[("value", DatabaseValue::Int32(140))])).unwrap_err();
        assert!(matches!(err, StoreError::Conversion { .. }));
    }
}
