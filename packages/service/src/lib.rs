#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Orchestration of index families.
//!
//! [`IndexService`] sequences one family/date computation: resolve the
//! family, read same-day dependency results, read the day's alerts and the
//! family's history, evaluate, interpret, and persist with skip-unless-forced
//! semantics. [`IndexService::compute_all`] walks the family dependency DAG
//! for a date and [`IndexService::backfill`] walks a date range, recording
//! per-day outcomes instead of stopping at the first failure.

pub mod backfill;
pub mod clock;
pub mod config;
pub mod progress;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use risk_index_database::{AlertSource, IndexStore, SaveOutcome, StoreError};
use risk_index_engine::interpretation::interpret;
use risk_index_engine::{EvaluationInput, FamilyRegistry, TextGenerator, evaluate};
use risk_index_models::{DependencyInput, FamilyDefinition, FamilyId, IndexResult};

pub use backfill::{BackfillReport, DayOutcome, DayStatus};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::ServiceConfig;
pub use progress::{NullProgress, ProgressCallback, null_progress};

/// Errors from [`IndexService`] operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// No family with this id is registered.
    #[error("Unknown index family: {0}")]
    UnknownFamily(String),

    /// The family exists but is not enabled in this service's config.
    #[error("Index family {0} is disabled")]
    FamilyDisabled(String),

    /// The alert stream could not be read for the date.
    #[error("Alerts unavailable for {family} on {date}: {source}")]
    DataUnavailable {
        family: FamilyId,
        date: NaiveDate,
        #[source]
        source: StoreError,
    },

    /// A dependency has no persisted result for the date.
    #[error("{family} on {date} requires {dependency}, which has no result for that date")]
    DependencyMissing {
        family: FamilyId,
        dependency: FamilyId,
        date: NaiveDate,
    },

    /// A dependency failed earlier in the same [`IndexService::compute_all`] run.
    #[error("{family} skipped: dependency {dependency} failed")]
    DependencyFailed {
        family: FamilyId,
        dependency: FamilyId,
    },

    /// Reading or writing index results failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// `from` is after `to`.
    #[error("Invalid date range: {from} is after {to}")]
    InvalidRange { from: NaiveDate, to: NaiveDate },
}

impl IndexError {
    /// Whether this is a clean skip for a missing input rather than a
    /// failure.
    #[must_use]
    pub const fn is_missing_input(&self) -> bool {
        matches!(self, Self::DependencyMissing { .. })
    }
}

/// Result of [`IndexService::compute`].
#[derive(Debug, Clone, PartialEq)]
pub enum ComputeOutcome {
    /// A record was computed and written.
    Computed(IndexResult),
    /// A record already existed and `force` was not set. Carries the
    /// stored record, untouched.
    AlreadyExists(IndexResult),
}

impl ComputeOutcome {
    #[must_use]
    pub const fn result(&self) -> &IndexResult {
        match self {
            Self::Computed(result) | Self::AlreadyExists(result) => result,
        }
    }

    #[must_use]
    pub fn into_result(self) -> IndexResult {
        match self {
            Self::Computed(result) | Self::AlreadyExists(result) => result,
        }
    }

    #[must_use]
    pub const fn is_computed(&self) -> bool {
        matches!(self, Self::Computed(_))
    }
}

/// Computes, persists and serves index results.
pub struct IndexService {
    registry: FamilyRegistry,
    alerts: Arc<dyn AlertSource>,
    store: Arc<dyn IndexStore>,
    generator: Option<Arc<dyn TextGenerator>>,
    config: ServiceConfig,
    clock: Arc<dyn Clock>,
}

impl IndexService {
    /// Creates a service with the system clock and template-only
    /// interpretation.
    #[must_use]
    pub fn new(
        registry: FamilyRegistry,
        alerts: Arc<dyn AlertSource>,
        store: Arc<dyn IndexStore>,
        config: ServiceConfig,
    ) -> Self {
        config.warn_unknown(&registry);
        Self {
            registry,
            alerts,
            store,
            generator: None,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Tries `generator` before the template for interpretation text.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn registry(&self) -> &FamilyRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Enabled families in dependency order.
    pub fn enabled_families(&self) -> impl Iterator<Item = &FamilyDefinition> {
        self.registry
            .families()
            .filter(|f| self.config.is_enabled(&f.id))
    }

    fn family(&self, id: &str) -> Result<&FamilyDefinition, IndexError> {
        self.registry
            .get(id)
            .ok_or_else(|| IndexError::UnknownFamily(id.to_string()))
    }

    fn enabled_family(&self, id: &str) -> Result<&FamilyDefinition, IndexError> {
        let family = self.family(id)?;
        if !self.config.is_enabled(&family.id) {
            return Err(IndexError::FamilyDisabled(id.to_string()));
        }
        Ok(family)
    }

    async fn dependency_inputs(
        &self,
        family: &FamilyDefinition,
        date: NaiveDate,
    ) -> Result<Vec<DependencyInput>, IndexError> {
        let mut inputs = Vec::with_capacity(family.dependencies.len());
        for dependency in &family.dependencies {
            let Some(result) = self.store.get(&dependency.family, date).await? else {
                log::warn!(
                    "{} {date}: dependency {} has no result, skipping",
                    family.id,
                    dependency.family
                );
                return Err(IndexError::DependencyMissing {
                    family: family.id.clone(),
                    dependency: dependency.family.clone(),
                    date,
                });
            };
            inputs.push(DependencyInput {
                family: dependency.family.clone(),
                weight: dependency.weight,
                value: result.value,
            });
        }
        Ok(inputs)
    }

    async fn history(
        &self,
        family: &FamilyDefinition,
        date: NaiveDate,
    ) -> Result<Vec<IndexResult>, IndexError> {
        let Some(to) = date.pred_opt() else {
            return Ok(vec![]);
        };
        let from = date
            .checked_sub_days(Days::new(u64::from(family.history_days())))
            .unwrap_or(NaiveDate::MIN);
        Ok(self.store.get_history(&family.id, from, to).await?)
    }

    /// Computes and persists `family` for `date`.
    ///
    /// Without `force` an existing record is returned untouched as
    /// [`ComputeOutcome::AlreadyExists`]. With `force` the record is
    /// recomputed and overwritten.
    ///
    /// # Errors
    ///
    /// * [`IndexError::UnknownFamily`] / [`IndexError::FamilyDisabled`] if
    ///   the family cannot be computed by this service
    /// * [`IndexError::DependencyMissing`] if a dependency has no result
    ///   for `date`
    /// * [`IndexError::DataUnavailable`] if the alert stream read fails
    /// * [`IndexError::Store`] if reading or writing results fails
    pub async fn compute(
        &self,
        family_id: &str,
        date: NaiveDate,
        force: bool,
    ) -> Result<ComputeOutcome, IndexError> {
        let family = self.enabled_family(family_id)?;

        if !force && let Some(existing) = self.store.get(&family.id, date).await? {
            log::debug!("{} {date}: already computed, skipping", family.id);
            return Ok(ComputeOutcome::AlreadyExists(existing));
        }

        let dependencies = self.dependency_inputs(family, date).await?;

        let alerts = self
            .alerts
            .fetch_alerts(date, family.region)
            .await
            .map_err(|source| IndexError::DataUnavailable {
                family: family.id.clone(),
                date,
                source,
            })?;

        let history = self.history(family, date).await?;

        let evaluation = evaluate(&EvaluationInput {
            family,
            date,
            alerts: &alerts,
            history: &history,
            dependencies: &dependencies,
        });

        let request = evaluation.interpretation_request(family);
        let interpretation = interpret(
            self.generator.as_deref(),
            &request,
            self.config.generation_timeout,
        )
        .await;

        let result = evaluation.into_result(family, date, interpretation, self.clock.now());

        match self.store.save(&result, force).await? {
            SaveOutcome::AlreadyExists => {
                log::info!("{} {date}: written concurrently, keeping stored record", family.id);
                let existing = self.store.get(&family.id, date).await?;
                Ok(ComputeOutcome::AlreadyExists(existing.unwrap_or(result)))
            }
            outcome => {
                log::info!(
                    "{} {date}: {} {} ({} alerts{}) [{outcome}]",
                    family.id,
                    result.value,
                    result.band,
                    result.breakdown.alert_count,
                    if result.insufficient_history() {
                        ", insufficient history"
                    } else {
                        ""
                    }
                );
                Ok(ComputeOutcome::Computed(result))
            }
        }
    }

    /// Computes every enabled family for `date` in dependency order.
    ///
    /// A family whose dependency failed in this run is marked
    /// [`IndexError::DependencyFailed`] without being attempted. Results are
    /// returned in the order the families were visited.
    pub async fn compute_all(
        &self,
        date: NaiveDate,
        force: bool,
    ) -> Vec<(FamilyId, Result<ComputeOutcome, IndexError>)> {
        let mut failed: BTreeSet<FamilyId> = BTreeSet::new();
        let mut outcomes = Vec::new();

        for family in self.enabled_families() {
            let blocked = family
                .dependency_ids()
                .find(|dependency| failed.contains(*dependency))
                .cloned();

            let outcome = match blocked {
                Some(dependency) => {
                    log::warn!("{} {date}: dependency {dependency} failed, skipping", family.id);
                    Err(IndexError::DependencyFailed {
                        family: family.id.clone(),
                        dependency,
                    })
                }
                None => self.compute(family.id.as_str(), date, force).await,
            };

            if let Err(e) = &outcome {
                if !matches!(e, IndexError::DependencyFailed { .. }) {
                    log::error!("{} {date}: {e}", family.id);
                }
                failed.insert(family.id.clone());
            }

            outcomes.push((family.id.clone(), outcome));
        }

        outcomes
    }

    /// Stored result for `family` on `date`.
    ///
    /// # Errors
    ///
    /// [`IndexError::UnknownFamily`] or [`IndexError::Store`].
    pub async fn get(
        &self,
        family_id: &str,
        date: NaiveDate,
    ) -> Result<Option<IndexResult>, IndexError> {
        let family = self.family(family_id)?;
        Ok(self.store.get(&family.id, date).await?)
    }

    /// Most recent stored result for `family`, optionally for one region.
    ///
    /// # Errors
    ///
    /// [`IndexError::UnknownFamily`] or [`IndexError::Store`].
    pub async fn get_latest(
        &self,
        family_id: &str,
        region: Option<&str>,
    ) -> Result<Option<IndexResult>, IndexError> {
        let family = self.family(family_id)?;
        Ok(self.store.get_latest(&family.id, region).await?)
    }

    /// Stored results for `family` with `from <= date <= to`, ascending.
    ///
    /// # Errors
    ///
    /// [`IndexError::UnknownFamily`], [`IndexError::InvalidRange`] or
    /// [`IndexError::Store`].
    pub async fn get_history(
        &self,
        family_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<IndexResult>, IndexError> {
        let family = self.family(family_id)?;
        if from > to {
            return Err(IndexError::InvalidRange { from, to });
        }
        Ok(self.store.get_history(&family.id, from, to).await?)
    }
}
