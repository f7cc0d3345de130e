//! CLI Entry Point for converge-dsp
//!
//! Provides command-line interface for:
//! - Running a driver session against a Converge Pro 2 unit, reconnecting on loss
//! - Validating a configuration file without connecting
//! - Sending one raw protocol line and printing the replies
//!
//! # Usage
//!
//! ```bash
//! converge-dsp run --config config/converge.toml
//! converge-dsp check --config config/converge.toml
//! converge-dsp send --config config/converge.toml "EP MIC 101 LEVEL GAIN"
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use converge_dsp::config::AppConfig;
use converge_dsp::{feedback, host, logging};
use dsp_core::driver::DriverFactory;
use dsp_driver_clearone::ConvergePro2Factory;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "converge-dsp")]
#[command(about = "ClearOne Converge Pro 2 protocol host", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and keep the device model synchronized until interrupted
    Run {
        #[arg(long, default_value = "config/converge.toml")]
        config: PathBuf,
    },

    /// Validate a configuration file
    Check {
        #[arg(long, default_value = "config/converge.toml")]
        config: PathBuf,
    },

    /// Send one raw line and print what the unit answers
    Send {
        #[arg(long, default_value = "config/converge.toml")]
        config: PathBuf,

        /// Protocol line, without terminator
        line: String,

        /// How long to collect replies
        #[arg(long, default_value = "1000")]
        wait_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dsp_driver_clearone::link();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => run(config).await,
        Commands::Check { config } => check(config),
        Commands::Send {
            config,
            line,
            wait_ms,
        } => send(config, line, Duration::from_millis(wait_ms)).await,
    }
}

fn load(path: &PathBuf) -> Result<AppConfig> {
    let config = AppConfig::load_from(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    logging::init_from_config(&config).map_err(|e| anyhow!(e))?;
    if let Err(e) = config.validate() {
        tracing::error!(error = format!("{:#}", e), "configuration rejected");
        return Err(e);
    }
    Ok(config)
}

async fn run(path: PathBuf) -> Result<()> {
    let config = load(&path)?;
    let driver = match ConvergePro2Factory.build(config.device.clone()) {
        Ok(driver) => driver,
        Err(e) => {
            tracing::error!(error = format!("{:#}", e), "driver construction failed");
            return Err(e);
        }
    };
    tracing::info!(
        application = %config.application.name,
        driver = ConvergePro2Factory.name(),
        transport = %config.transport.describe(),
        "starting"
    );

    let feedback = feedback::spawn_feedback_logging(&driver);

    tokio::select! {
        _ = host::run_forever(&driver, &config) => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for ctrl-c")?;
            tracing::info!("interrupted, shutting down");
        }
    }

    for task in feedback {
        task.abort();
    }
    Ok(())
}

fn check(path: PathBuf) -> Result<()> {
    let config = load(&path)?;
    let driver = ConvergePro2Factory.build(config.device.clone())?;
    println!(
        "{}: {} level controls, {} dialers, {} presets via {}",
        path.display(),
        driver.levels().len(),
        driver.dialers().len(),
        driver.presets().len(),
        config.transport.describe()
    );
    Ok(())
}

async fn send(path: PathBuf, line: String, window: Duration) -> Result<()> {
    let config = load(&path)?;
    for reply in host::send_raw(&config, &line, window).await? {
        println!("{}", reply);
    }
    Ok(())
}
