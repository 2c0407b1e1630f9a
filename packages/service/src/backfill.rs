//! Multi-day computation for one family.

use std::sync::Arc;

use chrono::NaiveDate;
use risk_index_models::{Band, FamilyId};
use serde::Serialize;
use strum_macros::AsRefStr;

use crate::progress::ProgressCallback;
use crate::{ComputeOutcome, IndexError, IndexService};

/// What happened on one day of a backfill.
#[derive(Debug, Clone, PartialEq, Serialize, AsRefStr)]
#[serde(tag = "status", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DayStatus {
    /// A record was computed and written.
    Computed { value: u8, band: Band },
    /// A record already existed and was left alone.
    AlreadyExists { value: u8, band: Band },
    /// A dependency had no result for the day.
    DependencyMissing { dependency: FamilyId },
    /// The day failed; later days were still attempted.
    Failed { error: String },
}

impl DayStatus {
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists { .. } | Self::DependencyMissing { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayOutcome {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub status: DayStatus,
}

/// Per-day outcomes of a backfill with totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackfillReport {
    pub family: FamilyId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub computed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub days: Vec<DayOutcome>,
}

impl BackfillReport {
    fn record(&mut self, date: NaiveDate, status: DayStatus) {
        match &status {
            DayStatus::Computed { .. } => self.computed += 1,
            DayStatus::AlreadyExists { .. } | DayStatus::DependencyMissing { .. } => {
                self.skipped += 1;
            }
            DayStatus::Failed { .. } => self.failed += 1,
        }
        self.days.push(DayOutcome { date, status });
    }
}

fn day_status(outcome: Result<ComputeOutcome, IndexError>) -> DayStatus {
    match outcome {
        Ok(ComputeOutcome::Computed(result)) => DayStatus::Computed {
            value: result.value,
            band: result.band,
        },
        Ok(ComputeOutcome::AlreadyExists(result)) => DayStatus::AlreadyExists {
            value: result.value,
            band: result.band,
        },
        Err(IndexError::DependencyMissing { dependency, .. }) => {
            DayStatus::DependencyMissing { dependency }
        }
        Err(e) => DayStatus::Failed {
            error: e.to_string(),
        },
    }
}

impl IndexService {
    /// Computes `family` for every date in `from..=to`, oldest first, so
    /// each day sees the previous days' results as history.
    ///
    /// Per-day failures are recorded in the report and do not stop the run.
    ///
    /// # Errors
    ///
    /// * [`IndexError::UnknownFamily`] / [`IndexError::FamilyDisabled`] if
    ///   the family cannot be computed
    /// * [`IndexError::InvalidRange`] if `from` is after `to`
    pub async fn backfill(
        &self,
        family_id: &str,
        from: NaiveDate,
        to: NaiveDate,
        force: bool,
        progress: Arc<dyn ProgressCallback>,
    ) -> Result<BackfillReport, IndexError> {
        let family = self.enabled_family(family_id)?.id.clone();
        if from > to {
            return Err(IndexError::InvalidRange { from, to });
        }

        let total = u64::try_from((to - from).num_days() + 1).unwrap_or(0);
        progress.set_total(total);
        log::info!("Backfilling {family} from {from} to {to} ({total} days)");

        let mut report = BackfillReport {
            family: family.clone(),
            from,
            to,
            computed: 0,
            skipped: 0,
            failed: 0,
            days: Vec::new(),
        };

        for date in from.iter_days().take_while(|d| *d <= to) {
            progress.set_message(format!("{family} {date}"));

            let outcome = self.compute(family.as_str(), date, force).await;
            if let Err(e) = &outcome
                && !e.is_missing_input()
            {
                log::error!("{family} {date}: {e}");
            }

            report.record(date, day_status(outcome));
            progress.inc(1);
        }

        let summary = format!(
            "{family}: {} computed, {} skipped, {} failed",
            report.computed, report.skipped, report.failed
        );
        log::info!("{summary}");
        progress.finish(summary);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use risk_index_alert_models::Region;
    use risk_index_database::MemoryStore;

    use super::*;
    use crate::ServiceConfig;
    use crate::progress::null_progress;
    use crate::tests::{alert, day, service};

    #[derive(Default)]
    struct Counting {
        total: AtomicU64,
        done: AtomicU64,
    }

    impl ProgressCallback for Counting {
        fn set_total(&self, total: u64) {
            self.total.store(total, Ordering::SeqCst);
        }
        fn inc(&self, delta: u64) {
            self.done.fetch_add(delta, Ordering::SeqCst);
        }
        fn set_message(&self, _msg: String) {}
        fn finish(&self, _msg: String) {}
    }

    #[tokio::test]
    async fn backfill_continues_past_storage_failures() {
        let store = Arc::new(MemoryStore::new());
        store
            .add_alerts([alert("a1", 2, Region::Europe), alert("a2", 4, Region::Europe)])
            .await;
        store.fail_saves_on(day(3)).await;
        let service = service(&store, ServiceConfig::default());
        let progress = Arc::new(Counting::default());

        let report = service
            .backfill("global", day(1), day(5), false, progress.clone())
            .await
            .unwrap();

        assert_eq!(report.computed, 4);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.days.len(), 5);
        assert_eq!(report.days[2].date, day(3));
        assert!(matches!(report.days[2].status, DayStatus::Failed { .. }));
        assert_eq!(progress.total.load(Ordering::SeqCst), 5);
        assert_eq!(progress.done.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn second_backfill_skips_existing_days() {
        let store = Arc::new(MemoryStore::new());
        store.fail_saves_on(day(3)).await;
        let service = service(&store, ServiceConfig::default());

        service
            .backfill("global", day(1), day(5), false, null_progress())
            .await
            .unwrap();
        store.clear_failures().await;
        let report = service
            .backfill("global", day(1), day(5), false, null_progress())
            .await
            .unwrap();

        assert_eq!(report.computed, 1);
        assert_eq!(report.skipped, 4);
        assert_eq!(report.failed, 0);
        assert!(matches!(report.days[2].status, DayStatus::Computed { .. }));
        assert_eq!(report.days[0].status.as_ref(), "already_exists");
    }

    #[tokio::test]
    async fn missing_dependency_days_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store, ServiceConfig::default());

        let report = service
            .backfill("europe", day(1), day(2), false, null_progress())
            .await
            .unwrap();

        assert_eq!(report.skipped, 2);
        assert_eq!(report.failed, 0);
        assert!(report.days.iter().all(|d| d.status.is_skipped()));
    }

    #[tokio::test]
    async fn backfill_rejects_inverted_range() {
        let store = Arc::new(MemoryStore::new());
        let service = service(&store, ServiceConfig::default());

        let err = service
            .backfill("global", day(5), day(1), false, null_progress())
            .await
            .unwrap_err();

        assert!(matches!(err, IndexError::InvalidRange { .. }));
        assert!(store.is_empty().await);
    }

    #[test]
    fn day_outcome_serializes_flat() {
        let outcome = DayOutcome {
            date: day(1),
            status: DayStatus::Computed {
                value: 42,
                band: Band::Elevated,
            },
        };

        let json = serde_json::to_value(&outcome).unwrap();

        assert_eq!(json["date"], "2025-03-01");
        assert_eq!(json["status"], "computed");
        assert_eq!(json["value"], 42);
        assert_eq!(json["band"], "ELEVATED");
    }
}
