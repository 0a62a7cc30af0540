//! Profile stores and the collaborators that build and activate them.
//!
//! A profile store snapshot from the remote store looks like:
//!
//! ```json
//! {
//!   "defaultProfile": "Default",
//!   "startDate": "2024-03-01T10:00:00.000Z",
//!   "units": "mg/dl",
//!   "store": {
//!     "Default": {
//!       "dia": 5,
//!       "carbratio": [{"time": "00:00", "value": 10}],
//!       "sens": [{"time": "00:00", "value": 50}],
//!       "basal": [{"time": "00:00", "timeAsSeconds": 0, "value": 0.8}],
//!       "target_low": [{"time": "00:00", "value": 100}],
//!       "target_high": [{"time": "00:00", "value": 120}]
//!     }
//!   }
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{IngestionError, IngestionResult};
use crate::types::GlucoseUnit;
use crate::wire::legacy::{value_as_f64, value_as_i64};

/// One time-of-day block of a profile schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBlock")]
pub struct ProfileBlock {
    /// Seconds since local midnight at which the block starts.
    pub time_as_seconds: i64,
    pub value: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBlock {
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    time_as_seconds: Option<Value>,
    value: Value,
}

impl TryFrom<RawBlock> for ProfileBlock {
    type Error = String;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        let value = value_as_f64(&raw.value).ok_or_else(|| format!("invalid block value {}", raw.value))?;
        let time_as_seconds = match (raw.time_as_seconds.as_ref().and_then(value_as_i64), raw.time.as_deref()) {
            (Some(secs), _) if (0..86_400).contains(&secs) => secs,
            (Some(secs), _) => return Err(format!("block timeAsSeconds {secs} outside the day")),
            (None, Some(hhmm)) => parse_hhmm(hhmm).ok_or_else(|| format!("invalid block time '{hhmm}'"))?,
            (None, None) => return Err("block has neither time nor timeAsSeconds".to_string()),
        };
        Ok(Self { time_as_seconds, value })
    }
}

fn parse_hhmm(text: &str) -> Option<i64> {
    let (h, m) = text.trim().split_once(':')?;
    let h: i64 = h.parse().ok()?;
    let m: i64 = m.parse().ok()?;
    ((0..24).contains(&h) && (0..60).contains(&m)).then_some(h * 3600 + m * 60)
}

/// A single named therapy profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PureProfile {
    #[serde(default)]
    pub units: Option<GlucoseUnit>,
    #[serde(default)]
    pub timezone: Option<String>,
    /// Duration of insulin action, hours.
    #[serde(deserialize_with = "lenient_number")]
    pub dia: f64,
    pub carbratio: Vec<ProfileBlock>,
    pub sens: Vec<ProfileBlock>,
    pub basal: Vec<ProfileBlock>,
    pub target_low: Vec<ProfileBlock>,
    pub target_high: Vec<ProfileBlock>,
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    value_as_f64(&v).ok_or_else(|| serde::de::Error::custom(format!("expected number, got {v}")))
}

impl PureProfile {
    /// Parse and validate a profile document. Returns `None` if it is malformed.
    pub fn from_json(value: &Value) -> Option<Self> {
        let mut profile = Self::deserialize(value).ok()?;
        if profile.dia <= 0.0 {
            return None;
        }
        for blocks in [
            &mut profile.carbratio,
            &mut profile.sens,
            &mut profile.basal,
            &mut profile.target_low,
            &mut profile.target_high,
        ] {
            if blocks.is_empty() {
                return None;
            }
            blocks.sort_by_key(|b| b.time_as_seconds);
        }
        Some(profile)
    }

    /// Sum of the basal schedule over 24 hours, in units.
    pub fn total_daily_basal(&self) -> f64 {
        let mut total = 0.0;
        for (i, block) in self.basal.iter().enumerate() {
            let end = self.basal.get(i + 1).map_or(86_400, |next| next.time_as_seconds);
            total += block.value * (end - block.time_as_seconds) as f64 / 3600.0;
        }
        total
    }
}

/// Parsed profile store snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileStore {
    default_profile: Option<String>,
    units: Option<GlucoseUnit>,
    start_date: i64,
    profiles: BTreeMap<String, Value>,
}

impl ProfileStore {
    /// Build a store from a raw snapshot.
    ///
    /// Only the outer shape is checked here; individual profiles are validated lazily by
    /// [`ProfileStore::specific_profile`].
    pub fn from_json(raw: &Value) -> IngestionResult<Self> {
        let obj = raw.as_object().ok_or_else(|| IngestionError::Profile {
            message: "profile store must be a json object".to_string(),
        })?;

        let profiles = match obj.get("store") {
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Some(other) => {
                return Err(IngestionError::Profile {
                    message: format!("profile store 'store' must be an object, got {other}"),
                });
            }
            None => BTreeMap::new(),
        };

        Ok(Self {
            default_profile: obj.get("defaultProfile").and_then(Value::as_str).map(str::to_string),
            units: obj.get("units").and_then(Value::as_str).map(GlucoseUnit::parse),
            start_date: start_date_of(obj),
            profiles,
        })
    }

    /// Creation timestamp in epoch milliseconds, 0 if the snapshot does not declare one.
    pub fn start_date(&self) -> i64 {
        self.start_date
    }

    pub fn default_profile_name(&self) -> Option<&str> {
        self.default_profile.as_deref()
    }

    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }

    /// The named profile, with the store-level units applied if the profile has none.
    pub fn specific_profile(&self, name: &str) -> Option<PureProfile> {
        let mut profile = PureProfile::from_json(self.profiles.get(name)?)?;
        profile.units = profile.units.or(self.units);
        Some(profile)
    }

    pub fn default_profile(&self) -> Option<PureProfile> {
        self.specific_profile(self.default_profile.as_deref()?)
    }
}

fn start_date_of(obj: &serde_json::Map<String, Value>) -> i64 {
    if let Some(iso) = obj.get("startDate").and_then(Value::as_str) {
        return DateTime::parse_from_rfc3339(iso)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0);
    }
    obj.get("date").and_then(value_as_i64).unwrap_or(0)
}

/// Builds a [`ProfileStore`] from a raw snapshot.
pub trait ProfileStoreFactory: Send + Sync {
    fn build(&self, raw: &Value) -> IngestionResult<ProfileStore>;
}

/// Default factory: [`ProfileStore::from_json`].
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonProfileStoreFactory;

impl ProfileStoreFactory for JsonProfileStoreFactory {
    fn build(&self, raw: &Value) -> IngestionResult<ProfileStore> {
        ProfileStore::from_json(raw)
    }
}

/// The active profile source.
pub trait ProfileSource: Send + Sync {
    /// Make `store` the active profile store.
    fn load_from_store(&self, store: ProfileStore);

    /// Resolve a profile by name from the active store.
    fn specific_profile(&self, name: &str) -> Option<PureProfile>;
}

/// Profile source keeping the active store in memory.
#[derive(Debug, Default)]
pub struct InMemoryProfileSource {
    active: RwLock<Option<ProfileStore>>,
}

impl InMemoryProfileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: ProfileStore) -> Self {
        Self {
            active: RwLock::new(Some(store)),
        }
    }

    pub fn active_store(&self) -> Option<ProfileStore> {
        self.active.read().expect("profile source lock poisoned").clone()
    }
}

impl ProfileSource for InMemoryProfileSource {
    fn load_from_store(&self, store: ProfileStore) {
        *self.active.write().expect("profile source lock poisoned") = Some(store);
    }

    fn specific_profile(&self, name: &str) -> Option<PureProfile> {
        self.active
            .read()
            .expect("profile source lock poisoned")
            .as_ref()?
            .specific_profile(name)
    }
}
