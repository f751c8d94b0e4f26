//! # reactions-settings
//!
//! Configuration for the reactions broadcaster, loaded from three layers
//! (in priority order):
//! 1. **Compiled defaults**: [`ReactionsSettings::default()`]
//! 2. **Settings file**: JSON, deep-merged over defaults
//! 3. **Environment variables**: `REACTIONS_*` overrides (highest priority)
//!
//! The binary applies CLI flags on top of the loaded value.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{DEFAULT_SETTINGS_PATH, deep_merge, load_settings_from_path};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = ReactionsSettings::default();
        let _path = std::path::Path::new(DEFAULT_SETTINGS_PATH);
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = ReactionsSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.server.port, 8000);
        assert_eq!(settings.hub.broadcast_interval_ms, 10_000);
        assert_eq!(settings.hub.pong_wait_ms, 20_000);
        assert_eq!(settings.socket.read_buffer_size, 4096);
        assert_eq!(settings.logging.level, "info");
    }
}
