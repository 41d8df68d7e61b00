//! ---
//! dmc_section: "05-networking-external-interfaces"
//! dmc_subsection: "binary"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Command line client for exercising a remote media controller."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dmc_common::{init_tracing, AppConfig, LoadedAppConfig};
use dmc_core::metrics::encode_text;
use dmc_core::{
    new_registry, ControllerBuilder, DirectMediaController, InMemoryTransport, RpcMetrics,
};

mod script;

const DEFAULT_CONFIG_CANDIDATES: &[&str] = &["dmc.toml", "/etc/dmc/dmc.toml"];

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Media controller slide and widget client",
    long_about = None
)]
struct Cli {
    /// Configuration file (falls back to DMC_CONFIG, then ./dmc.toml and /etc/dmc/dmc.toml).
    #[arg(long, short = 'c', value_name = "FILE", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a step script against the media controller.
    Run(RunCommand),
    /// Validate the configuration and print a summary.
    #[command(name = "check-config")]
    CheckConfig,
}

#[derive(Debug, Args)]
struct RunCommand {
    /// Script of slide, widget and clear steps.
    #[arg(value_name = "SCRIPT")]
    script: PathBuf,

    /// Use an in-process media controller instead of connecting.
    #[arg(long)]
    dry_run: bool,

    /// Print RPC metrics in Prometheus text format when done.
    #[arg(long)]
    dump_metrics: bool,
}

fn load_config(explicit: Option<PathBuf>) -> Result<LoadedAppConfig> {
    match explicit {
        Some(path) => Ok(LoadedAppConfig {
            config: AppConfig::from_path(path.clone())?,
            source: path,
        }),
        None => AppConfig::load_with_source(DEFAULT_CONFIG_CANDIDATES),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = load_config(cli.config)?;
    match cli.command {
        Commands::CheckConfig => check_config(&loaded),
        Commands::Run(cmd) => run(cmd, loaded.config).await,
    }
}

fn check_config(loaded: &LoadedAppConfig) -> Result<()> {
    let config = &loaded.config;
    println!("configuration {} is valid", loaded.source.display());
    println!("  endpoint: {}", config.endpoint);
    println!("  targets: {}", config.targets.join(", "));
    println!(
        "  slides: {}",
        config.slides.keys().cloned().collect::<Vec<_>>().join(", ")
    );
    println!(
        "  widgets: {}",
        config.widgets.keys().cloned().collect::<Vec<_>>().join(", ")
    );
    Ok(())
}

async fn run(cmd: RunCommand, config: AppConfig) -> Result<()> {
    let _tracing = init_tracing("dmcctl", &config)?;
    let script = script::Script::from_path(&cmd.script)?;

    let metrics = if cmd.dump_metrics || config.metrics.enabled {
        Some(RpcMetrics::new(new_registry()).context("failed to register rpc metrics")?)
    } else {
        None
    };

    let controller = if cmd.dry_run {
        let mut builder =
            ControllerBuilder::new(Arc::new(InMemoryTransport::new())).with_config(&config);
        if let Some(metrics) = metrics.clone() {
            builder = builder.metrics(metrics);
        }
        builder.build()?
    } else {
        DirectMediaController::connect(&config, metrics.clone()).await?
    };

    for line in script::execute(&controller, &script).await? {
        println!("{line}");
    }

    if cmd.dump_metrics {
        if let Some(metrics) = &metrics {
            print!("{}", encode_text(&metrics.registry())?);
        }
    }
    Ok(())
}
