//! Settings types.
//!
//! All structs serialize as camelCase to match `settings.json`.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelaySettings {
    /// Logging output.
    pub logging: LoggingSettings,
    /// Wait gate timing.
    pub wait_gate: WaitGateSettings,
    /// In-memory connection sizing.
    pub memory: MemorySettings,
}

impl RelaySettings {
    /// Reject values that would make the runtime misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.wait_gate.poll_interval_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "waitGate.pollIntervalMs must be greater than zero".into(),
            ));
        }
        if self.wait_gate.default_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "waitGate.defaultTimeoutMs must be greater than zero".into(),
            ));
        }
        if self.memory.channel_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "memory.channelCapacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level passed to the env filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

/// Wait gate timing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaitGateSettings {
    /// Sleep between state checks while waiting.
    pub poll_interval_ms: u64,
    /// Timeout used by callers that don't pass one.
    pub default_timeout_ms: u64,
}

impl Default for WaitGateSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1,
            default_timeout_ms: 10_000,
        }
    }
}

/// In-memory connection settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemorySettings {
    /// Outbound queue capacity per connection.
    pub channel_capacity: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}
