//! SpinZone - live power and heart rate zones for BLE indoor bikes
//!
//! Main entry point for the command-line application.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use spinzone::recording::RecordingSink;
use spinzone::sensors::BtleplugTransport;
use spinzone::session::{Session, SessionMode, SessionOutcome, SessionState, SessionTiming};
use spinzone::storage::config::{
    load_config, load_devices, load_user, update_document, DataPaths,
};
use spinzone::storage::TrainingStore;
use spinzone::ui::TerminalDashboard;

/// Default log filter; the BLE stack and HTTP client are noisy at info.
const DEFAULT_LOG_FILTER: &str = "info,btleplug=warn,reqwest=warn,hyper=warn";

#[derive(Parser)]
#[command(
    name = "spinzone",
    version,
    about = "Live power and heart rate zones for BLE indoor bikes"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Data directory holding devices.json, users.json, training.json and settings.toml
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Ride a live workout
    Workout {
        /// Workout length in minutes (0 = until interrupted)
        #[arg(long, default_value_t = 0)]
        minutes: u64,
    },

    /// Record training samples at a fixed resistance
    Train {
        /// Resistance the bike is set to (0-99)
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..100))]
        resistance: u8,
    },

    /// Show or change configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print device names, user profile and settings
    Show,

    /// Set the BLE name of the bike
    SetBike { name: String },

    /// Set the BLE name of the heart rate monitor
    SetHrm { name: String },

    /// Set the rider's name
    SetName { name: String },

    /// Set the rider's age in years
    SetAge {
        #[arg(value_parser = clap::value_parser!(u32).range(1..=120))]
        age: u32,
    },

    /// Set the rider's Functional Threshold Power in watts
    SetFtp {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        ftp: u32,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_file.as_deref()) {
        eprintln!("error: {:#}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!("Starting SpinZone v{}", env!("CARGO_PKG_VERSION"));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let (file_layer, stderr_layer) = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), None)
        }
        None => {
            let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            (None, Some(layer))
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let paths = cli.data_dir.map(DataPaths::new).unwrap_or_default();
    tracing::debug!("Using data directory {}", paths.dir().display());

    match cli.command {
        Command::Workout { minutes } => {
            let duration = (minutes > 0).then(|| Duration::from_secs(minutes * 60));
            run_session(&paths, SessionMode::Workout { duration })
        }
        Command::Train { resistance } => run_session(&paths, SessionMode::Training { resistance }),
        Command::Config { action } => run_config(&paths, action),
    }
}

fn run_session(paths: &DataPaths, mode: SessionMode) -> Result<()> {
    // Configuration problems surface before any BLE call
    let devices = load_devices(paths).context("Failed to load device names")?;
    let user = load_user(paths).context("Failed to load user profile")?;
    let config = load_config(paths).context("Failed to load settings")?;
    let store = TrainingStore::load_or_init(&paths.training())
        .context("Failed to load training store")?;
    let sink = RecordingSink::from_settings(&config.influx).context("Failed to set up recording")?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async {
        let transport = Arc::new(
            BtleplugTransport::new()
                .await
                .context("Failed to initialize BLE adapter")?,
        );

        let mut session = Session::new(
            transport,
            &devices,
            &user,
            sink,
            TerminalDashboard::stdout(),
            SessionTiming::from(&config),
        )?
        .with_training_store(store, paths.training());

        let signals = tokio::spawn(stop_on_signal(session.state().clone()));
        let outcome = session.run(mode).await;
        signals.abort();

        match outcome.context("Session failed")? {
            SessionOutcome::Completed => tracing::info!("Session complete"),
            SessionOutcome::Cancelled => tracing::info!("Session cancelled before it started"),
        }
        Ok::<_, anyhow::Error>(())
    })
}

/// Stop the session on every interrupt or terminate signal.
async fn stop_on_signal(state: SessionState) {
    loop {
        shutdown_signal().await;
        tracing::info!("Received shutdown signal, stopping session");
        state.stop();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn run_config(paths: &DataPaths, action: ConfigCommand) -> Result<()> {
    let (path, key, value) = match action {
        ConfigCommand::Show => return show_config(paths),
        ConfigCommand::SetBike { name } => (paths.devices(), "bike", non_empty(name)?),
        ConfigCommand::SetHrm { name } => (paths.devices(), "hrm", non_empty(name)?),
        ConfigCommand::SetName { name } => (paths.users(), "name", non_empty(name)?),
        ConfigCommand::SetAge { age } => (paths.users(), "age", age.into()),
        ConfigCommand::SetFtp { ftp } => (paths.users(), "ftp", ftp.into()),
    };

    update_document(&path, key, value)
        .with_context(|| format!("Failed to update {}", path.display()))?;
    tracing::info!("Updated {} in {}", key, path.display());
    println!("Saved {} to {}", key, path.display());
    Ok(())
}

fn non_empty(name: String) -> Result<serde_json::Value> {
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Name must not be empty");
    }
    Ok(name.into())
}

fn show_config(paths: &DataPaths) -> Result<()> {
    println!("Data directory: {}", paths.dir().display());

    match load_devices(paths) {
        Ok(devices) => println!("Bike: {}\nHRM: {}", devices.bike, devices.hrm),
        Err(e) => println!("Devices: {}", e),
    }

    match load_user(paths) {
        Ok(user) => {
            println!("Name: {}\nAge: {}\nFTP: {} W", user.name, user.age, user.ftp);
            if let Ok(zones) = user.heart_zones() {
                println!("Max heart rate: {:.0} BPM", zones.max_heart_rate());
            }
        }
        Err(e) => println!("User: {}", e),
    }

    let config = load_config(paths).context("Failed to load settings")?;
    let settings = toml::to_string_pretty(&config).context("Failed to render settings")?;
    println!("\n{}", settings);
    Ok(())
}
