mod cli;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use patientdb::config::{DEFAULT_CHANNEL_NAME, EngineMode, RegistryConfig, SyncMode};
use patientdb::facade::DatabaseHandle;
use patientdb::session::Session;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::app::App;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EngineArg {
    /// Connection on a dedicated worker thread
    Worker,
    /// Connection on the blocking pool
    InProcess,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SyncArg {
    /// Show the records carried by change messages
    Mirror,
    /// Re-fetch the listing when a change message arrives
    Reconcile,
}

#[derive(Parser, Debug)]
#[command(name = "patientdb")]
#[command(version, about = "Patient registration console on an embedded SQL database")]
struct Args {
    /// Database file path or `sqlite://` URL
    #[arg(long, env = "PATIENTDB_DATABASE", default_value = "patients.db")]
    database: String,

    /// Keep the database in memory (nothing is saved)
    #[arg(long)]
    in_memory: bool,

    #[arg(long, value_enum, env = "PATIENTDB_ENGINE", default_value_t = EngineArg::Worker)]
    engine: EngineArg,

    #[arg(long, value_enum, env = "PATIENTDB_SYNC", default_value_t = SyncArg::Mirror)]
    sync: SyncArg,

    /// Name of the change channel shared by sessions
    #[arg(long, env = "PATIENTDB_CHANNEL", default_value = DEFAULT_CHANNEL_NAME)]
    channel: String,

    /// Do not announce writes to other sessions
    #[arg(long)]
    no_broadcast: bool,

    /// Sessions opened at startup
    #[arg(long, default_value_t = 1)]
    tabs: usize,

    /// Log file used while the terminal UI is running
    #[arg(long, env = "PATIENTDB_LOG_FILE", default_value = "patientdb.log")]
    log_file: PathBuf,

    /// Run one SQL text, print the result and exit
    #[arg(long, short = 'e')]
    execute: Option<String>,
}

impl Args {
    fn config(&self) -> Result<RegistryConfig> {
        let base = if self.in_memory {
            RegistryConfig::in_memory()
        } else if self.database.starts_with("sqlite:") {
            RegistryConfig::from_url(&self.database)
                .with_context(|| format!("invalid database URL {}", self.database))?
        } else {
            RegistryConfig::new(&self.database)
        };

        let config = base
            .engine_mode(match self.engine {
                EngineArg::Worker => EngineMode::Worker,
                EngineArg::InProcess => EngineMode::InProcess,
            })
            .sync_mode(match self.sync {
                SyncArg::Mirror => SyncMode::Mirror,
                SyncArg::Reconcile => SyncMode::Reconcile,
            })
            .channel_name(&self.channel)
            .broadcast_writes(!self.no_broadcast);

        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.config()?;

    match &args.execute {
        Some(sql) => {
            init_tracing(None)?;
            run_once(config, sql).await
        }
        None => {
            // The terminal belongs to the UI, so logs go to a file.
            init_tracing(Some(&args.log_file))?;
            info!(database = %config.to_url(), "starting patientdb");
            let handle = DatabaseHandle::new(config);
            let mut app = App::new(handle, args.tabs);
            app.run().await
        }
    }
}

async fn run_once(config: RegistryConfig, sql: &str) -> Result<()> {
    let handle = DatabaseHandle::open(config)
        .await
        .context("failed to open database")?;
    let mut session = Session::open(handle.clone()).context("failed to open session")?;

    session
        .bootstrap()
        .await
        .context("failed to create patients table")?;
    let outcome = session
        .execute_query(sql)
        .await
        .context("query failed")?;

    if outcome.class.is_read() {
        if let Some(first) = outcome.results.first() {
            first.print();
        }
    } else {
        for result in &outcome.results {
            result.print();
        }
    }

    session.close();
    handle.dispose().await.context("failed to close database")?;
    Ok(())
}

fn init_tracing(log_file: Option<&PathBuf>) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("patientdb=info"));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}
