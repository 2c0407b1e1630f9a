#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the risk index engine.
//!
//! Results are printed to stdout as pretty JSON; logs go to stderr through
//! [`risk_index_cli_utils::init_logger`].

mod output;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use risk_index_cli_utils::IndicatifProgress;
use risk_index_database::{
    AlertSource, IndexStore, PgAlertSource, PgIndexStore, db, run_migrations,
};
use risk_index_engine::FamilyRegistry;
use risk_index_narrative::LlmNarrator;
use risk_index_service::{IndexService, ServiceConfig};

/// Directory of family TOML files overriding the embedded definitions.
const FAMILY_DIR_ENV: &str = "RISK_INDEX_FAMILY_DIR";

#[derive(Parser)]
#[command(name = "risk_index", about = "Composite risk index engine")]
struct Cli {
    /// Comma-separated family ids to enable (overrides `RISK_INDEX_FAMILIES`)
    #[arg(long, global = true)]
    families: Option<String>,
    /// Directory of family TOML overrides (overrides `RISK_INDEX_FAMILY_DIR`)
    #[arg(long, global = true)]
    family_dir: Option<PathBuf>,
    /// Ask the configured LLM provider for interpretation text
    #[arg(long, global = true)]
    narrate: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// List index families in dependency order
    Families,
    /// Compute one family, or every enabled family, for a date
    Compute {
        /// Family id (e.g., "europe")
        #[arg(long, conflicts_with = "all", required_unless_present = "all")]
        family: Option<String>,
        /// Compute every enabled family in dependency order
        #[arg(long)]
        all: bool,
        /// Date to compute (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Recompute and overwrite an existing result
        #[arg(long)]
        force: bool,
    },
    /// Compute a family for every date in a range
    Backfill {
        #[arg(long)]
        family: String,
        /// First date (inclusive)
        #[arg(long)]
        from: NaiveDate,
        /// Last date (inclusive)
        #[arg(long)]
        to: NaiveDate,
        /// Recompute and overwrite existing results
        #[arg(long)]
        force: bool,
    },
    /// Print the stored result for a family and date
    Show {
        #[arg(long)]
        family: String,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Print the most recent stored result for a family
    Latest {
        #[arg(long)]
        family: String,
        /// Region id (e.g., "`black_sea`")
        #[arg(long)]
        region: Option<String>,
    },
    /// Print stored results for a family over a date range
    History {
        #[arg(long)]
        family: String,
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
}

fn load_registry(cli_dir: Option<PathBuf>) -> Result<FamilyRegistry, Box<dyn std::error::Error>> {
    let dir = cli_dir.or_else(|| std::env::var_os(FAMILY_DIR_ENV).map(PathBuf::from));
    if let Some(dir) = &dir {
        log::info!("Loading family overrides from {}", dir.display());
    }
    Ok(FamilyRegistry::load(dir.as_deref())?)
}

async fn build_service(
    registry: FamilyRegistry,
    families: Option<String>,
    narrate: bool,
) -> Result<IndexService, Box<dyn std::error::Error>> {
    let db = db::connect_from_env().await?;
    run_migrations(db.as_ref()).await?;

    let alerts: Arc<dyn AlertSource> = Arc::new(PgAlertSource::new(Arc::clone(&db)));
    let store: Arc<dyn IndexStore> = Arc::new(PgIndexStore::new(db));

    let service = IndexService::new(registry, alerts, store, ServiceConfig::from_env(families));

    if !narrate {
        return Ok(service);
    }

    match LlmNarrator::from_env() {
        Ok(narrator) => Ok(service.with_generator(Arc::new(narrator))),
        Err(e) => {
            log::warn!("Narrative generation disabled: {e}");
            Ok(service)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = risk_index_cli_utils::init_logger();
    let cli = Cli::parse();

    let registry = load_registry(cli.family_dir)?;

    if matches!(cli.command, Commands::Families) {
        output::print(&output::families(&registry))?;
        return Ok(());
    }

    if matches!(cli.command, Commands::Migrate) {
        log::info!("Running database migrations...");
        let db = db::connect_from_env().await?;
        run_migrations(db.as_ref()).await?;
        log::info!("Migrations complete.");
        return Ok(());
    }

    let service = build_service(registry, cli.families, cli.narrate).await?;

    match cli.command {
        Commands::Migrate | Commands::Families => {}
        Commands::Compute {
            family: Some(family),
            all: false,
            date,
            force,
        } => {
            let outcome = service.compute(&family, date, force).await;
            let failed = outcome.is_err();
            output::print(&output::compute_entry(family.as_str(), &outcome))?;
            if failed {
                return Err(format!("{family} {date} failed").into());
            }
        }
        Commands::Compute { date, force, .. } => {
            let outcomes = service.compute_all(date, force).await;
            let entries: Vec<_> = outcomes
                .iter()
                .map(|(family, outcome)| output::compute_entry(family.as_str(), outcome))
                .collect();
            output::print(&entries)?;
            let failed = outcomes
                .iter()
                .filter(|(_, o)| o.as_ref().is_err_and(|e| !e.is_missing_input()))
                .count();
            if failed > 0 {
                return Err(format!("{failed} families failed for {date}").into());
            }
        }
        Commands::Backfill {
            family,
            from,
            to,
            force,
        } => {
            let progress = IndicatifProgress::days_bar(&multi, &family);
            let report = service.backfill(&family, from, to, force, progress).await?;
            output::print(&report)?;
        }
        Commands::Show { family, date } => {
            let result = service
                .get(&family, date)
                .await?
                .ok_or_else(|| format!("No result for {family} on {date}"))?;
            output::print(&result)?;
        }
        Commands::Latest { family, region } => {
            let result = service
                .get_latest(&family, region.as_deref())
                .await?
                .ok_or_else(|| format!("No results for {family}"))?;
            output::print(&result)?;
        }
        Commands::History { family, from, to } => {
            let results = service.get_history(&family, from, to).await?;
            output::print(&results)?;
        }
    }

    Ok(())
}
