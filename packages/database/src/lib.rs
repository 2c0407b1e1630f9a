#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Storage for the risk index engine.
//!
//! Two seams: [`alerts::AlertSource`] reads a day's classified alerts and
//! [`store::IndexStore`] persists computed results with idempotent write
//! semantics. Both have a Postgres implementation on `switchy_database`
//! (raw parameterized SQL, schema applied by `switchy_schema` embedded
//! migrations) and an in-memory implementation in [`memory`].

pub mod alerts;
pub mod db;
pub mod memory;
pub mod store;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use include_dir::{Dir, include_dir};
use switchy_database::Database;
use switchy_schema::discovery::embedded::EmbeddedMigrationSource;
use switchy_schema::runner::MigrationRunner;

pub use alerts::{AlertSource, PgAlertSource};
pub use memory::MemoryStore;
pub use store::{IndexStore, PgIndexStore, SaveOutcome};

/// Embedded SQL migrations from the `migrations/` directory.
static MIGRATIONS_DIR: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/../../migrations");

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] switchy_schema::MigrationError),

    /// Breakdown or driver JSON could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// The backing store refused the operation.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of what went wrong.
        message: String,
    },
}

/// Runs all pending database migrations.
///
/// # Errors
///
/// Returns [`StoreError`] if any migration fails to apply.
pub async fn run_migrations(db: &dyn Database) -> Result<(), StoreError> {
    let source = EmbeddedMigrationSource::new(&MIGRATIONS_DIR);
    let runner = MigrationRunner::new(Box::new(source));
    runner.run(db).await?;
    log::info!("Database migrations completed successfully");
    Ok(())
}

/// Maps a column decode failure to [`StoreError::Conversion`].
pub(crate) fn conversion<E: std::fmt::Display>(
    column: &str,
) -> impl FnOnce(E) -> StoreError + '_ {
    move |e| StoreError::Conversion {
        message: format!("Failed to parse {column}: {e}"),
    }
}

/// Midnight UTC of `date`.
///
/// `switchy_database` sends parameters in binary format, so dates travel as
/// `DatabaseValue::DateTime` against `TIMESTAMP` columns.
#[must_use]
pub fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}
