use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use warm_transfer::{
    build_orchestrator, init_telemetry, serve, AppState, OperatingMode, WarmTransferConfig,
};

#[derive(Parser)]
#[command(name = "warm-transfer")]
#[command(about = "Emergency warm-transfer responder: rings a technician, parks the customer, bridges them")]
#[command(long_about = "Warm Transfer listens for emergency triggers, calls the chosen technician with a \
                       spoken briefing, holds any calling customer in a queue, and bridges the technician \
                       into that queue once the briefing call ends. Run 'warm-transfer serve' to start.")]
struct Cli {
    /// Configuration file (defaults to warm-transfer.toml when present)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server (default when no subcommand is given)
    Serve {
        /// Address to listen on, overriding server.bind
        #[arg(long, help = "Listen address, e.g. 0.0.0.0:5000")]
        bind: Option<SocketAddr>,
        /// Operating mode, overriding the configured one
        #[arg(long, help = "NORMAL places calls, TESTING only logs")]
        mode: Option<OperatingMode>,
    },
    /// Print the effective configuration with secrets redacted
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    WarmTransferConfig::load_env_file()?;
    let config = WarmTransferConfig::load(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Config) => config_command(&config),
        Some(Commands::Serve { bind, mode }) => {
            tokio::runtime::Runtime::new()?.block_on(async { serve_command(config, bind, mode).await })
        }
        None => tokio::runtime::Runtime::new()?
            .block_on(async { serve_command(config, None, None).await }),
    }
}

fn config_command(config: &WarmTransferConfig) -> Result<()> {
    print!("{}", config.redacted().to_toml()?);
    Ok(())
}

async fn serve_command(
    mut config: WarmTransferConfig,
    bind: Option<SocketAddr>,
    mode: Option<OperatingMode>,
) -> Result<()> {
    if let Some(mode) = mode {
        config.mode = mode;
    }

    init_telemetry(&config.observability)?;

    let addr = match bind {
        Some(addr) => addr,
        None => config
            .server
            .bind
            .parse()
            .with_context(|| format!("invalid server.bind '{}'", config.server.bind))?,
    };

    for setting in config.missing_settings() {
        warn!(setting = setting, "Required setting is not configured; triggers will fail");
    }

    let orchestrator = build_orchestrator(&config)?;
    info!(
        mode = %config.mode,
        branch = %orchestrator.branch().branch_id,
        settings_source = %settings_source(&config),
        "Starting warm transfer responder"
    );

    serve(
        addr,
        AppState {
            orchestrator: Arc::new(orchestrator),
        },
    )
    .await
}

fn settings_source(config: &WarmTransferConfig) -> String {
    match config.tenancy.branch.as_deref() {
        Some(branch) => format!("branch settings from {} ({branch})", config.tenancy.admin_url),
        None if Path::new(warm_transfer::config::DEFAULT_CONFIG_FILE).exists() => {
            warm_transfer::config::DEFAULT_CONFIG_FILE.to_string()
        }
        None => "environment".to_string(),
    }
}
