//! Settings, operating mode and pipeline options.
//!
//! [`Settings`] and [`RuntimeMode`] are read-only views onto state owned elsewhere (user
//! preferences, build/runtime configuration). [`IngestionOptions`] tunes the pipeline itself.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, IngestionResult};
use crate::ingestion::observability::IngestionSeverity;

/// User preference keys read by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingKey {
    ReceiveCgm,
    ReceiveInsulin,
    ReceiveCarbs,
    ReceiveTempTarget,
    ReceiveTbrEb,
    ReceiveProfileSwitch,
    ReceiveTherapyEvents,
    ReceiveOfflineEvent,
    ReceiveProfileStore,
    /// Epoch millis of the last local profile edit.
    LocalProfileLastChange,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReceiveCgm => "receive_cgm",
            Self::ReceiveInsulin => "receive_insulin",
            Self::ReceiveCarbs => "receive_carbs",
            Self::ReceiveTempTarget => "receive_temp_target",
            Self::ReceiveTbrEb => "receive_tbr_eb",
            Self::ReceiveProfileSwitch => "receive_profile_switch",
            Self::ReceiveTherapyEvents => "receive_therapy_events",
            Self::ReceiveOfflineEvent => "receive_offline_event",
            Self::ReceiveProfileStore => "receive_profile_store",
            Self::LocalProfileLastChange => "local_profile_last_change",
        }
    }
}

/// Read access to user preferences.
pub trait Settings: Send + Sync {
    fn get_bool(&self, key: SettingKey, default: bool) -> bool;
    fn get_long(&self, key: SettingKey, default: i64) -> i64;
}

/// Operating mode of this node.
pub trait RuntimeMode: Send + Sync {
    /// The node only consumes remote data; most admission gates open.
    fn client_only_mode(&self) -> bool;
    fn engineering_mode(&self) -> bool;
    /// The remote store is the selected glucose source.
    fn remote_reading_source_enabled(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Long(i64),
}

/// [`Settings`] backed by an in-memory map.
///
/// Deserializes from a JSON object keyed by snake_case setting names:
///
/// ```
/// use glucose_sync_ingest::config::{InMemorySettings, SettingKey, Settings};
///
/// let settings = InMemorySettings::from_json_str(r#"{"receive_carbs": true, "local_profile_last_change": 1000}"#).unwrap();
/// assert!(settings.get_bool(SettingKey::ReceiveCarbs, false));
/// assert_eq!(settings.get_long(SettingKey::LocalProfileLastChange, 0), 1000);
/// ```
#[derive(Debug, Default)]
pub struct InMemorySettings {
    values: RwLock<HashMap<SettingKey, SettingValue>>,
}

impl InMemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(input: &str) -> IngestionResult<Self> {
        let values: HashMap<SettingKey, SettingValue> =
            serde_json::from_str(input).map_err(|e| IngestionError::Config {
                message: format!("invalid settings document: {e}"),
            })?;
        Ok(Self {
            values: RwLock::new(values),
        })
    }

    /// Builder-style setter.
    pub fn with(self, key: SettingKey, value: SettingValue) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: SettingKey, value: SettingValue) {
        self.values
            .write()
            .expect("settings lock poisoned")
            .insert(key, value);
    }

    pub fn set_bool(&self, key: SettingKey, value: bool) {
        self.set(key, SettingValue::Bool(value));
    }

    pub fn set_long(&self, key: SettingKey, value: i64) {
        self.set(key, SettingValue::Long(value));
    }

    fn get(&self, key: SettingKey) -> Option<SettingValue> {
        self.values.read().expect("settings lock poisoned").get(&key).copied()
    }
}

impl Settings for InMemorySettings {
    fn get_bool(&self, key: SettingKey, default: bool) -> bool {
        match self.get(key) {
            Some(SettingValue::Bool(b)) => b,
            _ => default,
        }
    }

    fn get_long(&self, key: SettingKey, default: i64) -> i64 {
        match self.get(key) {
            Some(SettingValue::Long(v)) => v,
            _ => default,
        }
    }
}

/// Plain [`RuntimeMode`] value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeFlags {
    pub client_only: bool,
    pub engineering: bool,
    pub remote_reading_source: bool,
}

impl RuntimeMode for ModeFlags {
    fn client_only_mode(&self) -> bool {
        self.client_only
    }

    fn engineering_mode(&self) -> bool {
        self.engineering
    }

    fn remote_reading_source_enabled(&self) -> bool {
        self.remote_reading_source
    }
}

/// Options controlling ingestion behavior.
///
/// Use [`Default`] for common cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionOptions {
    /// A reading newer than this (relative to now) clears the stale-data alarms.
    pub fresh_reading_window_ms: i64,
    /// Action label of the diagnostic line emitted when a batch fails.
    pub diagnostic_action: String,
    /// Severity at or above which a failed batch is also reported via `on_alert`.
    pub alert_at_or_above: IngestionSeverity,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            fresh_reading_window_ms: 5 * 60 * 1000,
            diagnostic_action: "◄ ERROR".to_string(),
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

impl IngestionOptions {
    /// Load options from a JSON document; missing fields take their defaults.
    pub fn from_json_str(input: &str) -> IngestionResult<Self> {
        let opts: Self = serde_json::from_str(input).map_err(|e| IngestionError::Config {
            message: format!("invalid options document: {e}"),
        })?;
        if opts.fresh_reading_window_ms < 0 {
            return Err(IngestionError::Config {
                message: "fresh_reading_window_ms must be >= 0".to_string(),
            });
        }
        Ok(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_fall_back_to_defaults() {
        let s = InMemorySettings::new();
        assert!(!s.get_bool(SettingKey::ReceiveInsulin, false));
        assert!(s.get_bool(SettingKey::ReceiveProfileStore, true));
        assert_eq!(s.get_long(SettingKey::LocalProfileLastChange, 7), 7);
    }

    #[test]
    fn settings_type_mismatch_uses_default() {
        let s = InMemorySettings::new().with(SettingKey::ReceiveCarbs, SettingValue::Long(1));
        assert!(!s.get_bool(SettingKey::ReceiveCarbs, false));
    }

    #[test]
    fn settings_reject_unknown_keys() {
        let err = InMemorySettings::from_json_str(r#"{"receive_everything": true}"#).unwrap_err();
        assert!(err.to_string().contains("invalid settings document"));
    }

    #[test]
    fn key_names_match_serde_names() {
        for key in [SettingKey::ReceiveTbrEb, SettingKey::LocalProfileLastChange] {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
    }

    #[test]
    fn options_load_with_defaults() {
        let opts = IngestionOptions::from_json_str(r#"{"fresh_reading_window_ms": 60000}"#).unwrap();
        assert_eq!(opts.fresh_reading_window_ms, 60_000);
        assert_eq!(opts.diagnostic_action, "◄ ERROR");
        assert_eq!(opts.alert_at_or_above, IngestionSeverity::Critical);

        assert!(IngestionOptions::from_json_str(r#"{"fresh_reading_window_ms": -1}"#).is_err());
    }

    #[test]
    fn mode_flags_deserialize_partially() {
        let mode: ModeFlags = serde_json::from_str(r#"{"engineering": true}"#).unwrap();
        assert!(mode.engineering_mode());
        assert!(!mode.client_only_mode());
    }
}
