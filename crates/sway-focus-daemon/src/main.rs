//! sway-focus daemon
//!
//! Watches window focus and runs the sway command configured for the
//! newly focused application.

mod watcher;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Parser;
use sway_focus_config::{Config, DEFAULT_CONFIG_PATH};
use sway_focus_ipc::{
    get_socket_path, Client, Context, EventDispatcher, EventType, IpcError,
    DEFAULT_CHANNEL_BUFFER,
};
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

use crate::watcher::FocusWatcher;

#[derive(Parser, Debug)]
#[command(name = "sway-focused")]
#[command(about = "Run sway commands when window focus changes")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Path to the sway socket (overrides config and $SWAYSOCK)
    #[arg(short, long)]
    socket: Option<PathBuf>,

    /// Deadline for each query and command, in milliseconds
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Expand tilde in config path
    let config_path: PathBuf = shellexpand::tilde(&args.config).into_owned().into();
    let loaded = load_config(&config_path)?;
    let log_level = loaded
        .as_ref()
        .map(|config| config.global.log_level)
        .unwrap_or_default();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.as_str())),
        )
        .init();

    let config = match loaded {
        Some(config) => {
            tracing::info!(
                "Loaded configuration with {} rule(s) from {}",
                config.rules.len(),
                config_path.display()
            );
            config
        }
        None => {
            tracing::warn!(
                "Configuration file {} not found, using defaults",
                config_path.display()
            );
            Config::default()
        }
    };

    let socket_path = match args.socket.or_else(|| config.global.socket.clone()) {
        Some(path) => path,
        None => get_socket_path()?,
    };
    let timeout = Duration::from_millis(args.timeout_ms.unwrap_or(config.global.timeout_ms));

    let root = Context::background();
    spawn_signal_handler(root.clone())?;

    let client = Client::connect(&root.with_timeout(timeout), &socket_path)
        .await
        .with_context(|| format!("connecting to sway at {}", socket_path.display()))?;
    let mut watcher = FocusWatcher::new(client, config, timeout);

    if let Err(e) = watcher.apply_current(&root).await {
        tracing::warn!("Failed to apply rule for the current focus: {}", e);
    }

    let (dispatcher, events) = EventDispatcher::with_stream(DEFAULT_CHANNEL_BUFFER);
    let reader = dispatcher
        .spawn_reader(&root, &socket_path, &[EventType::Window])
        .await
        .context("subscribing to window events")?;

    tracing::info!("sway-focus daemon started");

    let watched = watcher.run(&root, events).await;
    watcher.close().await;
    // The reader exits once the watcher drops the receiving end or the root context fires
    root.cancel();

    let read = reader.await.context("event reader task panicked")?;

    tracing::info!("Shutting down...");

    match watched {
        Ok(()) | Err(IpcError::Canceled) => {}
        Err(e) => return Err(e.into()),
    }
    match read {
        Ok(()) | Err(IpcError::Canceled) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Load the config file, or `None` when it does not exist
fn load_config(path: &Path) -> Result<Option<Config>> {
    if !path.exists() {
        return Ok(None);
    }

    sway_focus_config::parse_config(path)
        .map(Some)
        .with_context(|| format!("loading configuration from {}", path.display()))
}

/// Cancel `ctx` on SIGINT or SIGTERM
fn spawn_signal_handler(ctx: Context) -> Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT"),
            _ = terminate.recv() => tracing::info!("Received SIGTERM"),
        }
        ctx.cancel();
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_must_be_positive() {
        assert!(Args::try_parse_from(["sway-focused", "--timeout-ms", "0"]).is_err());

        let args = Args::try_parse_from(["sway-focused", "--timeout-ms", "250"]).unwrap();
        assert_eq!(args.timeout_ms, Some(250));
    }

    #[test]
    fn test_timeout_defaults_to_config() {
        let args = Args::try_parse_from(["sway-focused"]).unwrap();
        assert_eq!(args.timeout_ms, None);
        assert_eq!(args.config, DEFAULT_CONFIG_PATH);
    }
}
