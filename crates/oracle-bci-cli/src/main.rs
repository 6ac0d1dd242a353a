//! # oracle-bci
//!
//! Headless operator front-end for the oracle-bci pipeline.
//! Runs a session against a text carousel, streams synthetic sensor
//! traffic for dry runs, writes a model template, and prints the
//! effective configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod app;
mod commands;

use commands::{cmd_config, cmd_init_model, cmd_run, cmd_simulate};

use oracle_bci::{ControlMode, PipelineConfig};

/// Drive a carousel from EEG and motion streamed over OSC.
#[derive(Parser)]
#[command(name = "oracle-bci", version, about)]
struct Cli {
    /// Path to oracle.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Listener bind address override
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Listener port override
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Model artifact path override
    #[arg(short, long, global = true)]
    model: Option<PathBuf>,

    /// Direction source: classifier or motion
    #[arg(long, global = true)]
    mode: Option<ControlMode>,

    /// Enable verbose logging (set RUST_LOG for fine-grained control)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a session and drive the text carousel (default)
    Run,

    /// Stream synthetic OSC sensor traffic to a listener
    Simulate {
        /// Listener address to send to
        #[arg(short, long, default_value = "127.0.0.1:5000")]
        target: String,

        /// Session length in seconds
        #[arg(short, long, default_value_t = 10.0)]
        seconds: f64,

        /// Do not send the stop marker at the end
        #[arg(long)]
        keep_open: bool,
    },

    /// Write the built-in lateralization model template
    InitModel {
        /// Destination (defaults to the configured model path)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "oracle_bci=debug,oracle_bci_cli=debug"
    } else {
        "oracle_bci=warn,oracle_bci_cli=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = match PipelineConfig::discover(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}", "Config error:".red(), e);
            std::process::exit(2);
        }
    };
    apply_cli_overrides(&mut config, &cli);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            if let Err(e) = cmd_run(config).await {
                eprintln!("{} {}", "Session failed:".red(), e);
                std::process::exit(1);
            }
        }
        Command::Simulate {
            target,
            seconds,
            keep_open,
        } => cmd_simulate(&config, &target, seconds, keep_open).await?,
        Command::InitModel { path, force } => {
            let path = path.unwrap_or_else(|| config.inference.model_path.clone());
            cmd_init_model(&path, force)?;
        }
        Command::Config => cmd_config(&config)?,
    }

    Ok(())
}

fn apply_cli_overrides(config: &mut PipelineConfig, cli: &Cli) {
    if let Some(bind) = &cli.bind {
        config.listener.address.clone_from(bind);
    }
    if let Some(port) = cli.port {
        config.listener.port = port;
    }
    if let Some(model) = &cli.model {
        config.inference.model_path.clone_from(model);
    }
    if let Some(mode) = cli.mode {
        config.control.mode = mode;
    }
}
