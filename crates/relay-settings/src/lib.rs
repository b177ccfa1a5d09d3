//! # relay-settings
//!
//! Configuration management with layered sources for relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`RelaySettings::default()`]
//! 2. **User file** — `~/.relay/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `RELAY_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use relay_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("poll interval: {}ms", settings.wait_gate.poll_interval_ms);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
static SETTINGS: OnceLock<RelaySettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.relay/settings.json` with env var
/// overrides. If loading or validation fails, returns compiled defaults.
pub fn get_settings() -> &'static RelaySettings {
    SETTINGS.get_or_init(|| {
        load_settings()
            .and_then(|s| s.validate().map(|()| s))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default settings");
                RelaySettings::default()
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = RelaySettings::default();
        let _path = settings_path();
    }

    #[test]
    fn global_settings_are_valid() {
        let settings = get_settings();
        assert!(settings.validate().is_ok());
    }
}
