//! Vendor profile resolution.
//!
//! Turns the free-text manufacturer and optional datapoint overrides from
//! configuration into an immutable [`DeviceProfile`]. Vendor matching happens
//! once here; nothing downstream compares manufacturer strings.

use crate::config::DoorConfig;
use serde::{Deserialize, Serialize};

/// Alarm datapoint reported by every known controller family.
pub const DEFAULT_ALARM_DP: &str = "12";

/// Controller family, which decides datapoint defaults and value encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VendorKind {
    /// Enumerated string status (`opened`, `opening`, ...) and `open`/`close` commands.
    KoganLike,
    /// Boolean status and a single boolean action datapoint.
    WofeaLike,
    /// Boolean status and action, generic datapoint layout.
    Generic,
}

impl VendorKind {
    /// Match a manufacturer string, ignoring case and surrounding whitespace.
    pub fn from_manufacturer(manufacturer: &str) -> Self {
        match manufacturer.trim().to_lowercase().as_str() {
            "kogan" => VendorKind::KoganLike,
            "wofea" => VendorKind::WofeaLike,
            _ => VendorKind::Generic,
        }
    }

    pub fn default_action_dp(self) -> &'static str {
        match self {
            VendorKind::KoganLike => "101",
            VendorKind::WofeaLike => "1",
            VendorKind::Generic => "1",
        }
    }

    pub fn default_status_dp(self) -> &'static str {
        match self {
            VendorKind::KoganLike => "102",
            VendorKind::WofeaLike => "101",
            VendorKind::Generic => "2",
        }
    }

    /// Whether status and commands are plain booleans rather than enumerated strings.
    pub fn uses_boolean_status(self) -> bool {
        !matches!(self, VendorKind::KoganLike)
    }
}

/// Resolved, immutable per-door device profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub vendor: VendorKind,
    /// Trimmed manufacturer as configured. Only used for log output.
    pub manufacturer: String,
    pub action_dp: String,
    pub status_dp: String,
    pub travel_time_dp: Option<String>,
    pub alarm_dp: String,
    pub flip_state: bool,
}

/// An override counts only when present and non-blank.
fn override_or(custom: Option<&str>, default: &str) -> String {
    custom
        .map(str::trim)
        .filter(|dp| !dp.is_empty())
        .unwrap_or(default)
        .to_string()
}

impl DeviceProfile {
    /// Resolve the profile for a door from its raw configuration.
    pub fn resolve(config: &DoorConfig) -> Self {
        let manufacturer = config
            .manufacturer
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        let vendor = VendorKind::from_manufacturer(&manufacturer);

        Self {
            vendor,
            action_dp: override_or(config.dp_action.as_deref(), vendor.default_action_dp()),
            status_dp: override_or(config.dp_status.as_deref(), vendor.default_status_dp()),
            travel_time_dp: config
                .dp_travel_time
                .as_deref()
                .map(str::trim)
                .filter(|dp| !dp.is_empty())
                .map(str::to_string),
            alarm_dp: override_or(config.dp_alarm.as_deref(), DEFAULT_ALARM_DP),
            flip_state: config.flip_state,
            manufacturer,
        }
    }

    /// Prefix for log lines, e.g. `Kogan GarageDoor`.
    pub fn log_prefix(&self) -> String {
        if self.manufacturer.is_empty() {
            "GarageDoor".to_string()
        } else {
            format!("{} GarageDoor", self.manufacturer)
        }
    }
}
