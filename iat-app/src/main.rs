//! `iat` - run Implicit Association Test sessions in the terminal and export
//! their data.

mod app;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use iat_core::SessionPersistence;
use iat_store::JsonDirStore;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use app::App;
use config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "iat", about = "Implicit Association Test session runner")]
struct Cli {
    /// Config file (defaults to ~/.iat/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the data directory from the config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Administer one session
    Run {
        #[arg(long, short)]
        participant: String,
    },
    /// List stored sessions
    List,
    /// Export trial results as CSV (UTF-8 with BOM)
    Export {
        #[arg(long, short, default_value = "iat_export.csv")]
        out: PathBuf,
        /// Only these sessions; all when omitted
        #[arg(long = "session")]
        sessions: Vec<String>,
    },
    /// Per-block statistics for one stored session
    Summary {
        #[arg(long)]
        session: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load(cli.config.as_deref());
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }
    init_tracing(&config.data_dir());

    match cli.command {
        Command::Run { participant } => App::new(&config, participant)?.run(),
        Command::List => list(&config),
        Command::Export { out, sessions } => export(&config, &out, &sessions),
        Command::Summary { session } => summary(&config, &session),
    }
}

fn init_tracing(data_dir: &Path) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_path = data_dir.join("iat.log");
    let file = fs::create_dir_all(data_dir)
        .and_then(|_| OpenOptions::new().create(true).append(true).open(&log_path));

    match file {
        Ok(file) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter)
                .init();
            tracing::info!(path = %log_path.display(), "Logging initialized");
        }
        // The terminal belongs to the participant; no log is better than a
        // garbled screen.
        Err(_) => tracing_subscriber::registry().with(env_filter).init(),
    }
}

fn open_store(config: &AppConfig) -> Result<JsonDirStore> {
    let dir = config.sessions_dir();
    JsonDirStore::open(&dir).with_context(|| format!("opening session store at {}", dir.display()))
}

fn list(config: &AppConfig) -> Result<()> {
    let store = open_store(config)?;
    let records = store.list()?;
    if records.is_empty() {
        println!("No sessions stored in {}", store.root().display());
        return Ok(());
    }
    for record in records {
        println!(
            "{}\t{}\t{}\t{} trials",
            record.session_id,
            record.participant_id,
            record.started_at.format("%Y-%m-%d %H:%M:%S"),
            record.results.len()
        );
    }
    Ok(())
}

fn export(config: &AppConfig, out: &Path, sessions: &[String]) -> Result<()> {
    let store = open_store(config)?;
    let records: Vec<_> = if sessions.is_empty() {
        store.list()?
    } else {
        sessions
            .iter()
            .map(|id| {
                store
                    .get(id)?
                    .with_context(|| format!("no stored session {id}"))
            })
            .collect::<Result<_>>()?
    };

    let rows = iat_store::export_csv_file(out, &records)
        .with_context(|| format!("writing {}", out.display()))?;
    println!("Exported {rows} trials from {} sessions to {}", records.len(), out.display());
    Ok(())
}

fn summary(config: &AppConfig, session: &str) -> Result<()> {
    let store = open_store(config)?;
    let record = store
        .get(session)?
        .with_context(|| format!("no stored session {session}"))?;

    println!("{} ({})", record.session_id, record.participant_id);
    for block in iat_experiment::BlockPlan::standard().blocks() {
        let stats = record.statistics_for(block.id);
        println!(
            "  block {}  {:>3} trials  accuracy {:>5.1}%  mean latency {:>6.0} ms",
            block.id, stats.trials, stats.accuracy_percent, stats.mean_latency_ms
        );
    }
    let experiment = &config.experiment;
    let s = record.summary(experiment.compatible_block, experiment.incompatible_block);
    println!("  IAT effect {:.0} ms", s.iat_effect_ms);
    Ok(())
}
