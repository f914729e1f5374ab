use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::{fmt, EnvFilter};

use logerrors::agent::Agent;
use logerrors::config::Config;

/// Windowed statistics of database warnings, errors and fatal events.
#[derive(Parser)]
#[command(name = "logerrors", about)]
struct Cli {
    /// Path to the YAML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    /// Overrides `log_level` from the configuration file.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,
}

/// Build-time version info.
mod version {
    /// Release version string.
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    /// Full version string with platform info.
    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle version subcommand before anything else.
    if let Some(Command::Version) = &cli.command {
        println!("logerrors {}", version::full());
        return Ok(());
    }

    let cfg = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    // Initialize tracing.
    let log_level = cli.log_level.as_deref().unwrap_or(&cfg.log_level);
    let filter =
        EnvFilter::try_new(log_level).with_context(|| format!("invalid log level: {log_level}"))?;

    fmt().with_env_filter(filter).with_target(true).init();

    tracing::info!(
        version = version::RELEASE,
        commit = version::git_commit(),
        "starting logerrors",
    );

    // Build and run the tokio runtime.
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;

    rt.block_on(run(cfg, cli.config))
}

async fn run(cfg: Config, config_path: Option<PathBuf>) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("registering SIGTERM handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("registering SIGHUP handler")?;

    let mut agent = Agent::new(cfg)?;
    agent.start().await?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received SIGINT, shutting down");
                break;
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
                break;
            }
            _ = sighup.recv() => {
                let Some(path) = &config_path else {
                    tracing::warn!("received SIGHUP without --config, nothing to reload");
                    continue;
                };
                tracing::info!(path = %path.display(), "received SIGHUP, reloading config");
                match Config::load(path) {
                    Ok(new_cfg) => {
                        if let Err(e) = agent.reload(new_cfg) {
                            tracing::error!(error = ?e, "config reload failed");
                        }
                    }
                    Err(e) => tracing::error!(error = ?e, "config reload failed"),
                }
            }
        }
    }

    // Graceful shutdown.
    agent.stop().await?;

    tracing::info!("logerrors stopped");

    Ok(())
}
