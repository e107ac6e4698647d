#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level as TraceLevel, error};
use tracing_subscriber::FmtSubscriber;

use slicer_bridge::constants::app;
use slicer_bridge::{BridgeSettings, Locations, Resolver, detect_all};

#[derive(Parser, Debug)]
#[command(name = "slicer-bridge", version, about = app::NAME)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the filament list of the target slicer and print it as JSON
    Resolve {
        /// Target slicer (`bambu`, `orca`)
        target: String,
        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
        /// Settings file to use instead of the default location
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },
    /// Report which slicers are installed
    Detect {
        #[arg(long)]
        pretty: bool,
    },
    /// Print the default settings file location
    ConfigPath {
        /// Write default settings there if no file exists yet
        #[arg(long)]
        init: bool,
    },
}

/// `/health`-style payload
#[derive(Serialize)]
struct Health<T: Serialize> {
    status: &'static str,
    slicers: T,
}

fn init_logging() -> Result<()> {
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    // stdout carries JSON
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .context("Failed to serialize output")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{json}").context("Failed to write output")?;
    Ok(())
}

fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Command::Resolve {
            target,
            pretty,
            config,
        } => {
            let settings = match config {
                Some(path) => match BridgeSettings::load_explicit(&path) {
                    Ok(settings) => settings,
                    Err(e) => {
                        error!(error = ?e, "Cannot load settings");
                        return Ok(ExitCode::from(2));
                    }
                },
                None => BridgeSettings::load(),
            };
            let result = Resolver::new(Locations::from_env(), settings).resolve(&target);
            print_json(&result, pretty)?;
            Ok(if result.is_ok() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Command::Detect { pretty } => {
            let health = Health {
                status: "ok",
                slicers: detect_all(&Locations::from_env()),
            };
            print_json(&health, pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::ConfigPath { init } => {
            let path = BridgeSettings::config_path();
            if init {
                BridgeSettings::init_at(&path)?;
            }
            println!("{}", path.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging() {
        eprintln!("{e:#}");
        return ExitCode::from(2);
    }
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!(error = ?e, "slicer-bridge failed");
            ExitCode::from(2)
        }
    }
}
