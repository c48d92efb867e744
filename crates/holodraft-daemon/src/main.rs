//! HoloDraft Daemon - Main entry point
//!
//! Runs the host bridge and serves it to browser and AR hosts over WebSocket.

mod api;
mod config;
mod server;
mod state;
mod ws;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "holodraft")]
#[command(about = "HoloDraft CAD model viewer and measurement daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "holodraft.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Write a default configuration file to the config path and exit
    #[arg(long)]
    write_default_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(&args.log_level)));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if args.write_default_config {
        config::save_default_config(&args.config)?;
        println!("Wrote default configuration to {}", args.config.display());
        return Ok(());
    }

    info!("HoloDraft v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    // Override bind address if specified
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }

    info!(
        bind = %config.daemon.bind,
        download_dir = %config.bridge.download_dir,
        "Configuration loaded"
    );

    let state = state::AppState::new(config.clone());
    server::run(state, &config.daemon.bind).await?;

    Ok(())
}

/// Filter directive for a `--log-level` value; unknown levels fall back to info
fn level_directive(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive("warn"), "warn");
        assert_eq!(level_directive("verbose"), "info");
    }

    #[test]
    fn test_log_level_defaults_to_info() {
        let args = Args::parse_from(["holodraft"]);
        assert_eq!(level_directive(&args.log_level), "info");
        assert_eq!(args.config, PathBuf::from("holodraft.toml"));
    }
}
