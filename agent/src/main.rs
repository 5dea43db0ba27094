//! hookwatch
//!
//! Lists the probe catalogue, validates configuration and replays recorded
//! probe traces through the engine.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use hookwatch_agent::host::replay::ReplayHost;
use hookwatch_agent::host::sink::{JsonLinesSink, TeeSink, TracingSink};
use hookwatch_agent::host::EventSink;
use hookwatch_agent::{trace, Config, Engine, ProbeRegistry, CATALOGUE};
use hookwatch_shared::CategoryMask;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Lines buffered for the JSON writer before events are dropped
const JSON_SINK_CAPACITY: usize = 4096;

#[derive(Parser)]
#[command(name = "hookwatch")]
#[command(about = "Entry/exit probe engine for emulated firmware", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List every probe in the catalogue
    Probes,

    /// Replay a recorded JSON-lines probe trace
    Replay(ReplayArgs),

    /// Load and validate a configuration file
    CheckConfig {
        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
struct ReplayArgs {
    /// Trace file
    trace: PathBuf,

    /// Enabled categories (e.g. "network,exec", "all", "0x21")
    #[arg(short, long)]
    mask: Option<CategoryMask>,

    /// Enable the privileged restart trigger
    #[arg(long)]
    restart: bool,

    /// Arm the execute trigger
    #[arg(long)]
    arm_execute: bool,

    /// Also write events as JSON lines to this file
    #[arg(long)]
    json_out: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install().map_err(|e| anyhow::anyhow!("{}", e))?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    match cli.command {
        Commands::Probes => {
            list_probes();
            Ok(())
        }
        Commands::Replay(args) => replay(args).await,
        Commands::CheckConfig { config } => check_config(config),
    }
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (text, json) = match format {
        LogFormat::Text => (Some(tracing_subscriber::fmt::layer().with_target(false)), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text)
        .with(json)
        .init();
}

fn list_probes() {
    println!("{:<20} {:<10} {}", "SYMBOL", "CATEGORY", "RETURN");
    for desc in CATALOGUE.iter() {
        println!(
            "{:<20} {:<10} {}",
            desc.symbol,
            desc.category,
            if desc.exit.is_some() { "yes" } else { "-" }
        );
    }
}

fn check_config(path: Option<PathBuf>) -> Result<()> {
    let config = Config::load(path.as_deref())?;
    info!("Configuration is valid");
    print!("{}", config.to_toml()?);
    Ok(())
}

async fn replay(args: ReplayArgs) -> Result<()> {
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(mask) = args.mask {
        config.mask = mask;
    }
    config.restart_enabled |= args.restart;
    config.execute_armed |= args.arm_execute;
    config.validate().context("Invalid configuration")?;

    if config.restart_enabled && !nix::unistd::Uid::effective().is_root() {
        warn!("Not running as root; dropping capabilities on reboot will fail");
    }

    info!("Replaying {} with mask {}", args.trace.display(), config.mask);

    let mut sink = TeeSink::new().with(Arc::new(TracingSink));
    let writer = match &args.json_out {
        Some(path) => {
            let (json, handle) = JsonLinesSink::spawn(path, JSON_SINK_CAPACITY).await?;
            sink = sink.with(Arc::new(json));
            Some(handle)
        }
        None => None,
    };

    let engine = Engine::builder(&config)
        .sink(Arc::new(sink) as Arc<dyn EventSink>)
        .build();
    let mut host = ReplayHost::new();
    let registry = ProbeRegistry::new();

    if let Err(e) = registry.register_all(&mut host) {
        warn!("{}", e);
    }

    let result = tokio::select! {
        summary = trace::replay_file(&engine, &host, &args.trace) => Some(summary),
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping replay");
            None
        }
    };

    registry.unregister_all(&mut host);

    // The JSON writer finishes once the engine's sink is gone.
    drop(engine);
    if let Some(handle) = writer {
        handle.await.context("JSON writer task failed")??;
    }

    if let Some(summary) = result.transpose()? {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}
