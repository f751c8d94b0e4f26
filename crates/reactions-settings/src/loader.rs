//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`ReactionsSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over defaults
//! 3. Apply `REACTIONS_*` environment overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::Path;

use reactions_core::logging::LogFormat;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::ReactionsSettings;

/// Settings file consulted when no path is given on the command line.
pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.json";

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults (plus env overrides). If the
/// file contains invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<ReactionsSettings> {
    load_with_env(path, |key| std::env::var(key).ok())
}

/// Same as [`load_settings_from_path`] with a caller-supplied variable lookup.
pub fn load_with_env<F>(path: &Path, lookup: F) -> Result<ReactionsSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = serde_json::to_value(ReactionsSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: ReactionsSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings, lookup);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Integers must parse and fall within the given range, booleans accept
/// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`. Invalid values are
/// ignored and the file/default value is kept.
pub fn apply_env_overrides<F>(settings: &mut ReactionsSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let string = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let u64_in = |key: &str, min: u64, max: u64| {
        lookup(key).and_then(|v| parse_u64_range(&v, min, max))
    };
    let usize_in = |key: &str, min: usize, max: usize| {
        lookup(key).and_then(|v| parse_usize_range(&v, min, max))
    };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = string("REACTIONS_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = lookup("REACTIONS_PORT").and_then(|v| parse_u16_range(&v, 0, 65535)) {
        settings.server.port = v;
    }
    if let Some(v) = u64_in("REACTIONS_SHUTDOWN_TIMEOUT_MS", 100, 600_000) {
        settings.server.shutdown_timeout_ms = v;
    }

    // ── Hub ─────────────────────────────────────────────────────────
    if let Some(v) = u64_in("REACTIONS_BROADCAST_INTERVAL_MS", 10, 3_600_000) {
        settings.hub.broadcast_interval_ms = v;
    }
    if let Some(v) = u64_in("REACTIONS_PONG_WAIT_MS", 100, 600_000) {
        settings.hub.pong_wait_ms = v;
    }
    if let Some(v) = u64_in("REACTIONS_WRITE_WAIT_MS", 10, 600_000) {
        settings.hub.write_wait_ms = v;
    }
    if let Some(v) = u64_in("REACTIONS_DELIVERY_TIMEOUT_MS", 1, 600_000) {
        settings.hub.delivery_timeout_ms = v;
    }
    if let Some(v) = usize_in("REACTIONS_SEND_QUEUE_SIZE", 1, 65_536) {
        settings.hub.send_queue_size = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = string("REACTIONS_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = lookup("REACTIONS_LOG_FORMAT").and_then(|v| LogFormat::parse(&v)) {
        settings.logging.format = v;
    }
    if let Some(v) = string("REACTIONS_LOG_OUTPUT") {
        settings.logging.output = parse_list(&v);
    }
    if let Some(v) = lookup("REACTIONS_LOG_CALLER").and_then(|v| parse_bool(&v)) {
        settings.logging.log_caller = v;
    }
    if let Some(v) = lookup("REACTIONS_LOG_STACKTRACE").and_then(|v| parse_bool(&v)) {
        settings.logging.stacktrace = v;
    }
}

/// Comma-separated list with blank entries dropped.
fn parse_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_u16_range(s: &str, min: u16, max: u16) -> Option<u16> {
    s.trim().parse::<u16>().ok().filter(|v| (min..=max).contains(v))
}

fn parse_u64_range(s: &str, min: u64, max: u64) -> Option<u64> {
    s.trim().parse::<u64>().ok().filter(|v| (min..=max).contains(v))
}

fn parse_usize_range(s: &str, min: usize, max: usize) -> Option<usize> {
    s.trim().parse::<usize>().ok().filter(|v| (min..=max).contains(v))
}
