//! Remembered form values (`booking_config.json`).
//!
//! The file is a flat JSON object. Values are written as strings; on load,
//! numbers and booleans are accepted too, since older files stored them
//! natively. Loading and saving are best-effort: a missing, unreadable or
//! malformed file behaves as "nothing remembered".

use crate::error::CliResult;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Default settings file, relative to the working directory
pub const DEFAULT_SETTINGS_PATH: &str = "booking_config.json";

/// Placeholder printed instead of the password
pub const MASK: &str = "********";

/// Remembered values, each as entered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Portal username
    pub username: Option<String>,
    /// Portal password
    pub password: Option<String>,
    /// Day of month
    pub day: Option<String>,
    /// Month (1-12)
    pub month: Option<String>,
    /// Slot index, `"0"`..`"3"`
    pub slot_idx: Option<String>,
    /// Day-click attempts
    pub day_attempts: Option<String>,
    /// Wait for midnight, `"true"`/`"false"`
    pub wait_midnight: Option<String>,
    /// Fall back to other slots, `"true"`/`"false"`
    pub try_other_slots: Option<String>,
}

impl Settings {
    /// Load settings, treating any failure as "nothing remembered"
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(settings) => settings,
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "settings not loaded");
                Self::default()
            }
        }
    }

    /// Load settings, surfacing errors
    pub fn try_load(path: &Path) -> CliResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let map: Map<String, Value> = serde_json::from_str(&raw)?;
        Ok(Self::from_map(&map))
    }

    /// Save settings, swallowing any failure
    pub fn save(&self, path: &Path) {
        if let Err(err) = self.try_save(path) {
            tracing::debug!(path = %path.display(), %err, "settings not saved");
        }
    }

    /// Save settings, surfacing errors
    pub fn try_save(&self, path: &Path) -> CliResult<()> {
        let json = serde_json::to_string_pretty(&self.to_map())?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Delete the settings file. Returns whether there was one.
    pub fn clear(path: &Path) -> CliResult<bool> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Whether nothing is remembered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_map().is_empty()
    }

    /// `"true"` in any letter case
    #[must_use]
    pub fn flag(value: Option<&str>) -> bool {
        value.is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    /// Key/value pairs for display, password masked
    #[must_use]
    pub fn display_entries(&self) -> Vec<(&'static str, String)> {
        self.to_map()
            .into_iter()
            .map(|(key, value)| {
                let shown = if key == "password" {
                    MASK.to_string()
                } else {
                    value
                };
                (key, shown)
            })
            .collect()
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let get = |key: &str| map.get(key).and_then(scalar);
        Self {
            username: get("username"),
            password: get("password"),
            day: get("day"),
            month: get("month"),
            slot_idx: get("slot_idx"),
            day_attempts: get("day_attempts"),
            wait_midnight: get("wait_midnight"),
            try_other_slots: get("try_other_slots"),
        }
    }

    fn to_map(&self) -> BTreeMap<&'static str, String> {
        [
            ("username", &self.username),
            ("password", &self.password),
            ("day", &self.day),
            ("month", &self.month),
            ("slot_idx", &self.slot_idx),
            ("day_attempts", &self.day_attempts),
            ("wait_midnight", &self.wait_midnight),
            ("try_other_slots", &self.try_other_slots),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.clone().map(|v| (key, v)))
        .collect()
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
