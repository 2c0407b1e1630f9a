//! In-memory [`AlertSource`] and [`IndexStore`].
//!
//! Used by tests and dry runs. Writes can be made to fail for chosen dates
//! so callers can exercise partial-failure paths.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use risk_index_alert_models::{AlertEvent, Region};
use risk_index_models::{FamilyId, IndexResult};
use tokio::sync::RwLock;

use crate::StoreError;
use crate::alerts::{AlertSource, day_bounds, finish};
use crate::store::{IndexStore, SaveOutcome};

#[derive(Debug, Default)]
struct Failures {
    saves: BTreeSet<NaiveDate>,
    alert_reads: BTreeSet<NaiveDate>,
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    results: RwLock<BTreeMap<(FamilyId, NaiveDate), IndexResult>>,
    alerts: RwLock<Vec<AlertEvent>>,
    failures: RwLock<Failures>,
    writes: AtomicUsize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends alerts to the stream.
    pub async fn add_alerts(&self, alerts: impl IntoIterator<Item = AlertEvent>) {
        self.alerts.write().await.extend(alerts);
    }

    /// Makes every save of a result dated `date` fail.
    pub async fn fail_saves_on(&self, date: NaiveDate) {
        self.failures.write().await.saves.insert(date);
    }

    /// Makes alert reads for `date` fail.
    pub async fn fail_alert_reads_on(&self, date: NaiveDate) {
        self.failures.write().await.alert_reads.insert(date);
    }

    /// Clears all injected failures.
    pub async fn clear_failures(&self) {
        *self.failures.write().await = Failures::default();
    }

    /// Number of records written or overwritten so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of stored results.
    pub async fn len(&self) -> usize {
        self.results.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.results.read().await.is_empty()
    }
}

#[async_trait]
impl AlertSource for MemoryStore {
    async fn fetch_alerts(
        &self,
        date: NaiveDate,
        region: Option<Region>,
    ) -> Result<Vec<AlertEvent>, StoreError> {
        if self.failures.read().await.alert_reads.contains(&date) {
            return Err(StoreError::Unavailable {
                message: format!("alert stream unavailable for {date}"),
            });
        }

        let (start, end) = day_bounds(date)?;
        let alerts = self
            .alerts
            .read()
            .await
            .iter()
            .filter(|a| {
                let created = a.created_at.naive_utc();
                created >= start && created < end
            })
            .cloned()
            .collect();

        Ok(finish(alerts, region))
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn save(&self, result: &IndexResult, force: bool) -> Result<SaveOutcome, StoreError> {
        if self.failures.read().await.saves.contains(&result.date) {
            return Err(StoreError::Unavailable {
                message: format!("write rejected for {} {}", result.family_id, result.date),
            });
        }

        let key = (result.family_id.clone(), result.date);
        let mut results = self.results.write().await;

        let outcome = match results.get(&key) {
            Some(_) if !force => return Ok(SaveOutcome::AlreadyExists),
            Some(_) => SaveOutcome::Overwritten,
            None => SaveOutcome::Inserted,
        };

        results.insert(key, result.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(outcome)
    }

    async fn get(
        &self,
        family: &FamilyId,
        date: NaiveDate,
    ) -> Result<Option<IndexResult>, StoreError> {
        Ok(self
            .results
            .read()
            .await
            .get(&(family.clone(), date))
            .cloned())
    }

    async fn get_latest(
        &self,
        family: &FamilyId,
        region: Option<&str>,
    ) -> Result<Option<IndexResult>, StoreError> {
        Ok(self
            .results
            .read()
            .await
            .values()
            .filter(|r| &r.family_id == family)
            .filter(|r| region.is_none_or(|region| r.region_id == region))
            .max_by_key(|r| r.date)
            .cloned())
    }

    async fn get_history(
        &self,
        family: &FamilyId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<IndexResult>, StoreError> {
        if from > to {
            return Ok(vec![]);
        }

        Ok(self
            .results
            .read()
            .await
            .range((family.clone(), from)..=(family.clone(), to))
            .map(|(_, r)| r.clone())
            .collect())
    }
}
