//! ---
//! dbfo_section: "05-networking-external-interfaces"
//! dbfo_subsection: "binary"
//! dbfo_type: "source"
//! dbfo_scope: "code"
//! dbfo_description: "Operator CLI for configuration checks and failover drills."
//! dbfo_version: "v0.1.0"
//! dbfo_owner: "platform-reliability"
//! ---
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dbfo_common::config::AppConfig;
use dbfo_common::logging::{init_console, init_tracing};
use tracing::info;

mod drill;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "DBFO database failover control utility",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", global = true, help = "Path to configuration file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Load and validate the configuration, then print a summary")]
    CheckConfig,
    #[command(about = "Probe one instance of a simulated fleet")]
    Probe {
        #[arg(long, value_name = "FILE", help = "Fleet description (TOML)")]
        fleet: PathBuf,
        #[arg(value_name = "INSTANCE_ID")]
        instance_id: String,
    },
    #[command(about = "Run one failover invocation against a simulated fleet")]
    Handle {
        #[arg(long, value_name = "FILE", help = "Fleet description (TOML)")]
        fleet: PathBuf,
        #[arg(
            long,
            value_name = "FILE",
            conflicts_with = "alarm_name",
            help = "Event JSON file, '-' for stdin"
        )]
        event: Option<PathBuf>,
        #[arg(long, help = "Alarm name for a synthesised event")]
        alarm_name: Option<String>,
        #[arg(long, help = "Print Prometheus metrics after the run")]
        metrics: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    let mut candidates = Vec::new();
    if let Some(path) = path {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/dbfo.toml"));
    candidates.push(PathBuf::from("/etc/dbfo/dbfo.toml"));
    let loaded = AppConfig::load_with_source(&candidates)?;
    info!(config_path = %loaded.source.display(), "configuration loaded");
    Ok(loaded.config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::CheckConfig => {
            init_console();
            let config = load_config(cli.config.as_ref())?;
            println!("{}", drill::summarize(&config));
        }
        Commands::Probe { fleet, instance_id } => {
            init_console();
            let config = load_config(cli.config.as_ref())?;
            let fleet = drill::FleetFile::load(&fleet)?;
            let status = drill::probe(&config, fleet, &instance_id).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Handle {
            fleet,
            event,
            alarm_name,
            metrics,
        } => {
            let config = load_config(cli.config.as_ref())?;
            init_tracing("dbfoctl", &config.logging)?;
            let fleet = drill::FleetFile::load(&fleet)?;
            let raw_event = drill::read_event(event.as_deref(), alarm_name.as_deref())?;
            let report = drill::handle(&config, fleet, &raw_event).await?;
            println!("{}", serde_json::to_string_pretty(&report.response)?);
            if metrics {
                if let Some(text) = report.metrics {
                    print!("{}", text);
                }
            }
        }
    }
    Ok(())
}
