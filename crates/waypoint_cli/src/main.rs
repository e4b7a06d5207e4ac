//! Command-line probe over `waypoint_core`.
//!
//! Reads the local stores and the settings database; never talks to a remote
//! backend.

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use waypoint_core::config::default_data_dir;
use waypoint_core::{
    CoreConfig, DailyPlanService, Entity, EntityKind, LocalStores, Repository, SettingsStore,
};

#[derive(Debug, Parser)]
#[command(name = "waypoint", version, about = "Inspect local Waypoint data")]
struct Cli {
    /// Config file; defaults to `<data dir>/waypoint.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that the core library links.
    Ping,
    /// List records of one kind (trips, events, daily_tasks, daily_routines).
    List { kind: String },
    /// Create today's (or `--date`) tasks from routines and print the day.
    Plan {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete daily tasks dated strictly before `--before`.
    PruneTasks {
        #[arg(long)]
        before: NaiveDate,
    },
    /// Show the persisted sync flag and last successful sync.
    SyncStatus,
    EnableSync,
    DisableSync,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Ping = cli.command {
        println!("waypoint_core ping={}", waypoint_core::ping());
        println!("waypoint_core version={}", waypoint_core::core_version());
        return Ok(());
    }

    let config_path = cli
        .config
        .unwrap_or_else(|| default_data_dir().join("waypoint.toml"));
    let config = CoreConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    waypoint_core::init_from_config(&config).context("starting logging")?;

    match cli.command {
        Command::Ping => {}
        Command::List { kind } => {
            let Some(kind) = EntityKind::parse(&kind) else {
                bail!("unknown kind `{kind}`");
            };
            list(&LocalStores::open(config.store_dir()), kind).await?;
        }
        Command::Plan { date } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let service = DailyPlanService::from_stores(&LocalStores::open(config.store_dir()));
            let created = service.generate_from_routines(date).await?;
            println!("created={}", created.len());
            for task in service.tasks_for(date).await? {
                let mark = if task.is_completed { "x" } else { " " };
                println!("[{mark}] {} {}", task.id, task.title);
            }
        }
        Command::PruneTasks { before } => {
            let service = DailyPlanService::from_stores(&LocalStores::open(config.store_dir()));
            let removed = service.prune_before(before).await?;
            println!("removed={removed}");
        }
        Command::SyncStatus => {
            let settings = open_settings(&config)?;
            println!("enabled={}", settings.sync_enabled()?);
            match settings.last_sync_at()? {
                Some(at) => println!("last_success_at={}", at.to_rfc3339()),
                None => println!("last_success_at=never"),
            }
        }
        Command::EnableSync => {
            open_settings(&config)?.set_sync_enabled(true)?;
            println!("enabled=true");
        }
        Command::DisableSync => {
            open_settings(&config)?.set_sync_enabled(false)?;
            println!("enabled=false");
        }
    }
    Ok(())
}

fn open_settings(config: &CoreConfig) -> Result<SettingsStore> {
    let path = config.settings_db_path();
    let settings = SettingsStore::open(&path)
        .with_context(|| format!("opening {}", path.display()))?;
    settings.seed_sync_enabled(config.sync.enabled_by_default)?;
    Ok(settings)
}

async fn list(stores: &LocalStores, kind: EntityKind) -> Result<()> {
    match kind {
        EntityKind::Trip => print_records(stores.trips.fetch_all().await?),
        EntityKind::Event => print_records(stores.events.fetch_all().await?),
        EntityKind::DailyTask => print_records(stores.daily_tasks.fetch_all().await?),
        EntityKind::DailyRoutine => print_records(stores.daily_routines.fetch_all().await?),
    }
    Ok(())
}

fn print_records<E: Entity>(records: Vec<E>) {
    println!("kind={} count={}", E::KIND, records.len());
    for record in records {
        println!("{} updated_at={}", record.id(), record.updated_at().to_rfc3339());
    }
}
