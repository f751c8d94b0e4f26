//! Logging configuration types.

use serde::{Deserialize, Serialize};

/// Log destination used when none is configured.
pub const DEFAULT_OUTPUT: &str = "app.log";

/// Output encoding for log lines.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable single-line output.
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parse from string (case-insensitive). Unknown values yield `None`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "compact" | "text" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Subscriber configuration.
#[derive(Clone, Debug)]
pub struct LogConfig {
    /// Filter directive, e.g. `"info"` or `"reactions_server=debug"`.
    pub level: String,
    /// Line encoding.
    pub format: LogFormat,
    /// Destinations: `"stdout"`, `"stderr"`, or file paths opened for append.
    pub output: Vec<String>,
    /// Include source file and line in each record.
    pub log_caller: bool,
    /// Log panics with a captured backtrace.
    pub stacktrace: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Compact,
            output: vec![DEFAULT_OUTPUT.into()],
            log_caller: false,
            stacktrace: true,
        }
    }
}
