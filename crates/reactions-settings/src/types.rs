//! Settings types.
//!
//! All durations are stored as milliseconds to keep the JSON file flat.
//! Server and socket sections expose [`Duration`] accessors; hub timings are
//! resolved by the server's own config.

use std::time::Duration;

use reactions_core::logging::{DEFAULT_OUTPUT, LogConfig, LogFormat};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReactionsSettings {
    /// HTTP listener settings.
    pub server: ServerSettings,
    /// WebSocket upgrade settings.
    pub socket: SocketSettings,
    /// Connection hub and broadcast settings.
    pub hub: HubSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl ReactionsSettings {
    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let hub = &self.hub;
        if hub.broadcast_interval_ms == 0 {
            return Err(invalid("hub.broadcastIntervalMs must be > 0"));
        }
        if hub.pong_wait_ms < 100 {
            return Err(invalid("hub.pongWaitMs must be at least 100"));
        }
        if hub.write_wait_ms == 0 {
            return Err(invalid("hub.writeWaitMs must be > 0"));
        }
        if hub.delivery_timeout_ms == 0 || hub.delivery_timeout_ms >= hub.broadcast_interval_ms {
            return Err(invalid(
                "hub.deliveryTimeoutMs must be > 0 and shorter than hub.broadcastIntervalMs",
            ));
        }
        if hub.send_queue_size == 0 {
            return Err(invalid("hub.sendQueueSize must be > 0"));
        }
        if hub.event_buffer == 0 {
            return Err(invalid("hub.eventBuffer must be > 0"));
        }
        if self.socket.max_message_size == 0 {
            return Err(invalid("socket.maxMessageSize must be > 0"));
        }
        if self.logging.output.iter().any(String::is_empty) {
            return Err(invalid("logging.output entries must not be empty"));
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> SettingsError {
    SettingsError::InvalidValue(msg.to_string())
}

/// HTTP listener settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port (`0` auto-assigns).
    pub port: u16,
    /// Per-request timeout for plain HTTP routes, in milliseconds.
    pub request_timeout_ms: u64,
    /// Upper bound on graceful shutdown, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl ServerSettings {
    /// Request timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Shutdown timeout as a [`Duration`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout_ms: 10_000,
            shutdown_timeout_ms: 15_000,
        }
    }
}

/// WebSocket upgrade settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocketSettings {
    /// Time allowed for the upgrade request to complete, in milliseconds.
    pub handshake_timeout_ms: u64,
    /// Read buffer capacity in bytes.
    pub read_buffer_size: usize,
    /// Write buffer capacity in bytes.
    pub write_buffer_size: usize,
    /// Largest inbound message accepted, in bytes.
    pub max_message_size: usize,
}

impl SocketSettings {
    /// Handshake timeout as a [`Duration`].
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

impl Default for SocketSettings {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 8_000,
            read_buffer_size: 4096,
            write_buffer_size: 4096,
            max_message_size: 64 * 1024,
        }
    }
}

/// Connection hub and broadcast settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HubSettings {
    /// Period between snapshot broadcasts, in milliseconds.
    pub broadcast_interval_ms: u64,
    /// Read deadline refreshed by each pong, in milliseconds.
    pub pong_wait_ms: u64,
    /// Time allowed for a single frame write, in milliseconds.
    pub write_wait_ms: u64,
    /// Time a broadcast may wait on one client's queue, in milliseconds.
    pub delivery_timeout_ms: u64,
    /// Outbound snapshots buffered per client.
    pub send_queue_size: usize,
    /// Inbound reactions buffered between pumps and the aggregation loop.
    pub event_buffer: usize,
    /// Period of the connected-clients log line, in milliseconds (`0` disables).
    pub stats_interval_ms: u64,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            broadcast_interval_ms: 10_000,
            pong_wait_ms: 20_000,
            write_wait_ms: 10_000,
            delivery_timeout_ms: 2_000,
            send_queue_size: 8,
            event_buffer: 64,
            stats_interval_ms: 5_000,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Filter directive (`RUST_LOG` takes precedence when set).
    pub level: String,
    /// Line encoding.
    pub format: LogFormat,
    /// Destinations: `"stdout"`, `"stderr"`, or file paths (appended).
    pub output: Vec<String>,
    /// Include source file and line in records.
    pub log_caller: bool,
    /// Log panics with a captured backtrace.
    pub stacktrace: bool,
}

impl LoggingSettings {
    /// Subscriber configuration for [`reactions_core::logging::init_subscriber`].
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            level: self.level.clone(),
            format: self.format,
            output: self.output.clone(),
            log_caller: self.log_caller,
            stacktrace: self.stacktrace,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            output: vec![DEFAULT_OUTPUT.to_string()],
            log_caller: false,
            stacktrace: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_defaults() {
        insta::assert_json_snapshot!(ReactionsSettings::default(), @r#"
        {
          "server": {
            "host": "0.0.0.0",
            "port": 8000,
            "requestTimeoutMs": 10000,
            "shutdownTimeoutMs": 15000
          },
          "socket": {
            "handshakeTimeoutMs": 8000,
            "readBufferSize": 4096,
            "writeBufferSize": 4096,
            "maxMessageSize": 65536
          },
          "hub": {
            "broadcastIntervalMs": 10000,
            "pongWaitMs": 20000,
            "writeWaitMs": 10000,
            "deliveryTimeoutMs": 2000,
            "sendQueueSize": 8,
            "eventBuffer": 64,
            "statsIntervalMs": 5000
          },
          "logging": {
            "level": "info",
            "format": "compact",
            "output": [
              "app.log"
            ],
            "logCaller": false,
            "stacktrace": true
          }
        }
        "#);
    }

    #[test]
    fn duration_accessors() {
        let settings = ReactionsSettings::default();
        assert_eq!(settings.server.shutdown_timeout(), Duration::from_secs(15));
        assert_eq!(settings.server.request_timeout(), Duration::from_secs(10));
        assert_eq!(settings.socket.handshake_timeout(), Duration::from_secs(8));
    }

    #[test]
    fn zero_broadcast_interval_rejected() {
        let mut settings = ReactionsSettings::default();
        settings.hub.broadcast_interval_ms = 0;
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue(_))
        ));
    }

    #[test]
    fn delivery_timeout_must_be_shorter_than_interval() {
        let mut settings = ReactionsSettings::default();
        settings.hub.delivery_timeout_ms = settings.hub.broadcast_interval_ms;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("deliveryTimeoutMs"));
    }

    #[test]
    fn tiny_pong_wait_rejected() {
        let mut settings = ReactionsSettings::default();
        settings.hub.pong_wait_ms = 10;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn zero_queue_sizes_rejected() {
        let mut settings = ReactionsSettings::default();
        settings.hub.send_queue_size = 0;
        assert!(settings.validate().is_err());

        let mut settings = ReactionsSettings::default();
        settings.hub.event_buffer = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn log_config_conversion() {
        let logging = LoggingSettings {
            level: "debug".into(),
            format: LogFormat::Json,
            output: vec!["stdout".into(), "app.log".into()],
            log_caller: true,
            stacktrace: false,
        };
        let cfg = logging.to_log_config();
        assert_eq!(cfg.level, "debug");
        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.output, vec!["stdout".to_string(), "app.log".to_string()]);
        assert!(cfg.log_caller);
        assert!(!cfg.stacktrace);
    }

    #[test]
    fn empty_log_output_entry_rejected() {
        let mut settings = ReactionsSettings::default();
        settings.logging.output = vec!["stderr".into(), String::new()];
        assert!(settings.validate().is_err());

        settings.logging.output.clear();
        assert!(settings.validate().is_ok());
    }
}
