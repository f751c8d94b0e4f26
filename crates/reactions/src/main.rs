//! # reactions
//!
//! Reactions broadcaster binary: loads settings, starts the HTTP/WebSocket
//! server, and shuts it down gracefully on Ctrl-C or SIGTERM.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use reactions_core::logging;
use reactions_server::config::ServerConfig;
use reactions_server::server::ReactionsServer;
use reactions_settings::{DEFAULT_SETTINGS_PATH, ReactionsSettings};
use tracing::Instrument;

/// Real-time reaction broadcaster.
#[derive(Parser, Debug)]
#[command(name = "reactions", about = "Real-time reaction broadcaster")]
struct Cli {
    /// Settings file (JSON). A missing file means defaults.
    #[arg(long, default_value = DEFAULT_SETTINGS_PATH)]
    config: PathBuf,

    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings, 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Log filter directive (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Flags win over the settings file and the environment.
    fn apply_overrides(&self, settings: &mut ReactionsSettings) {
        if let Some(host) = &self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = &self.log_level {
            settings.logging.level.clone_from(level);
        }
    }

    fn resolve_settings(&self) -> Result<ReactionsSettings> {
        let mut settings = reactions_settings::load_settings_from_path(&self.config)
            .with_context(|| format!("Failed to load settings from {}", self.config.display()))?;
        self.apply_overrides(&mut settings);
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.resolve_settings()?;

    let log_config = settings.logging.to_log_config();
    logging::init_subscriber(&log_config).context("Failed to initialise logging")?;
    if log_config.stacktrace {
        logging::log_panics_with_backtrace();
    }

    run(settings).instrument(logging::service_span()).await
}

async fn run(settings: ReactionsSettings) -> Result<()> {
    let metrics = reactions_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let server = ReactionsServer::new(ServerConfig::from(&settings)).with_metrics(metrics);
    let addr = server
        .listen()
        .await
        .with_context(|| format!("Failed to bind {}", server.config().bind_addr()))?;
    tracing::info!("reactions service listening on http://{addr}");

    shutdown_signal().await?;
    tracing::info!("shutting down");
    server.shutdown().await;
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate =
            signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.context("Failed to listen for ctrl-c")?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["reactions"]);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_SETTINGS_PATH));
        assert!(cli.host.is_none());
        assert!(cli.port.is_none());
        assert!(cli.log_level.is_none());
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::parse_from([
            "reactions",
            "--host",
            "127.0.0.1",
            "--port",
            "9100",
            "--log-level",
            "debug",
        ]);
        let mut settings = ReactionsSettings::default();
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.server.port, 9100);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn absent_flags_keep_settings() {
        let cli = Cli::parse_from(["reactions"]);
        let mut settings = ReactionsSettings::default();
        settings.server.port = 7000;
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.server.port, 7000);
        assert_eq!(settings.server.host, "0.0.0.0");
    }

    #[test]
    fn invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"hub": {{"broadcastIntervalMs": 0}}}}"#).unwrap();
        let cli = Cli::parse_from(["reactions", "--config", file.path().to_str().unwrap()]);
        let err = cli.resolve_settings().unwrap_err();
        assert!(format!("{err:#}").contains("broadcastIntervalMs"));
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(Cli::try_parse_from(["reactions", "--port", "http"]).is_err());
    }
}
