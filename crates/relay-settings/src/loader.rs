//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`RelaySettings::default()`]
//! 2. If `~/.relay/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)

use std::fmt::Display;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::RelaySettings;

const LOG_LEVEL: &str = "RELAY_LOG_LEVEL";
const POLL_INTERVAL_MS: &str = "RELAY_WAIT_POLL_INTERVAL_MS";
const WAIT_TIMEOUT_MS: &str = "RELAY_WAIT_TIMEOUT_MS";
const CHANNEL_CAPACITY: &str = "RELAY_CHANNEL_CAPACITY";

/// Resolve the path to the settings file (`~/.relay/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".relay").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<RelaySettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults. Unreadable files and invalid JSON are
/// errors that name the file.
pub fn load_settings_from_path(path: &Path) -> Result<RelaySettings> {
    let mut settings = read_layered(path)?;
    apply_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn read_layered(path: &Path) -> Result<RelaySettings> {
    if !path.exists() {
        debug!(?path, "settings file not found, using defaults");
        return Ok(RelaySettings::default());
    }
    let defaults = serde_json::to_value(RelaySettings::default())?;

    debug!(?path, "loading settings from file");
    let parse_err = |source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let user: Value = serde_json::from_str(&content).map_err(parse_err)?;
    serde_json::from_value(deep_merge(defaults, user)).map_err(parse_err)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
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

/// Apply `RELAY_*` overrides, reading each variable through `lookup`.
///
/// Empty, unparseable, or out-of-range values leave the setting untouched.
fn apply_overrides(settings: &mut RelaySettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(level) = lookup(LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
        settings.logging.level = level;
    }
    if let Some(ms) = bounded(&lookup, POLL_INTERVAL_MS, 1..=1_000) {
        settings.wait_gate.poll_interval_ms = ms;
    }
    if let Some(ms) = bounded(&lookup, WAIT_TIMEOUT_MS, 1..=600_000) {
        settings.wait_gate.default_timeout_ms = ms;
    }
    if let Some(capacity) = bounded(&lookup, CHANNEL_CAPACITY, 1..=65_536) {
        settings.memory.channel_capacity = capacity;
    }
}

fn bounded<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    range: RangeInclusive<T>,
) -> Option<T>
where
    T: FromStr + PartialOrd + Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(n) if range.contains(&n) => Some(n),
        _ => {
            warn!(
                key,
                value = %raw,
                min = %range.start(),
                max = %range.end(),
                "ignoring invalid settings override"
            );
            None
        }
    }
}
