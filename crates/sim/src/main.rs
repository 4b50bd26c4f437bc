//! Scripted combat duels against a locally hosted runtime.
//!
//! Run with: `cargo run -p combat-sim -- --rounds 20 --seed 7`
mod duel;
mod engine;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use combat_content::{ConfigLoader, PrototypeLoader};
use runtime::{InMemorySpawnPoints, Runtime};

use duel::{Duel, OutputFormat};
use engine::DemoDamage;

/// Run scripted duels against the combat runtime
#[derive(Parser)]
#[command(name = "combat-sim")]
#[command(about = "Scripted combat duels", long_about = None)]
#[command(version)]
struct Cli {
    /// Combat config TOML (defaults plus COMBAT_* environment overrides
    /// when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// NPC prototypes RON file (a small built-in bestiary when omitted)
    #[arg(short, long, value_name = "FILE")]
    prototypes: Option<PathBuf>,

    /// Number of exchanges to run
    #[arg(short, long, default_value_t = 10)]
    rounds: u32,

    /// Roll seed; overrides the config
    #[arg(short, long)]
    seed: Option<u64>,

    /// Level of the simulated adventurer
    #[arg(long, default_value_t = 5)]
    level: u32,

    /// Also write logs to `combat-sim.log` in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_dir.as_deref())?;

    let mut combat = ConfigLoader::load_with_env(cli.config.as_deref())?;
    if cli.seed.is_some() {
        combat.seed = cli.seed;
    }
    let catalog = match &cli.prototypes {
        Some(path) => PrototypeLoader::load_catalog(path)
            .with_context(|| format!("loading prototypes from {}", path.display()))?,
        None => PrototypeLoader::parse(duel::BESTIARY)?.into_iter().collect(),
    };
    tracing::info!(
        prototypes = catalog.len(),
        seed = ?combat.seed,
        rounds = cli.rounds,
        "starting simulation"
    );

    let spawn_points = InMemorySpawnPoints::new();
    let runtime = Runtime::builder()
        .combat_config(combat)
        .catalog(catalog.clone())
        .damage_engine(DemoDamage)
        .spawn_points(spawn_points.clone())
        .build()
        .await?;

    let duel = Duel::new(runtime.handle(), cli.format);
    let summary = duel
        .run(&catalog, &spawn_points, cli.level, cli.rounds)
        .await?;
    tracing::info!(
        exchanges = summary.exchanges,
        kills = summary.kills,
        damage = summary.damage_dealt,
        "simulation finished"
    );

    runtime.shutdown().await?;
    Ok(())
}

/// Stderr logging, plus a file layer when `log_dir` is given.
///
/// The returned guard flushes the file writer when dropped.
fn setup_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::never(dir, "combat-sim.log");
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    if let Some(dir) = log_dir {
        tracing::info!("Log file: {}/combat-sim.log", dir.display());
    }
    Ok(guard)
}
