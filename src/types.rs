//! Canonical persistence model.
//!
//! Every ingestor normalizes its wire input into these types before handing them to the
//! [`crate::staging::StagingBuffer`]. Records are identified for upsert by
//! [`RecordMeta::remote_id`] (or [`GlucoseValue::remote_id`] / [`Food::remote_id`]).

use serde::{Deserialize, Serialize};

use crate::profile::PureProfile;

/// Conversion factor between mmol/L and mg/dL.
pub const MMOLL_TO_MGDL: f64 = 18.0;

/// Unit a glucose quantity is expressed in on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GlucoseUnit {
    #[default]
    MgDl,
    MmolL,
}

impl GlucoseUnit {
    /// Lenient parse: anything starting with `mmol` is mmol/L, everything else mg/dL.
    pub fn parse(text: &str) -> Self {
        if text.trim().to_ascii_lowercase().starts_with("mmol") {
            Self::MmolL
        } else {
            Self::MgDl
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MgDl => "mg/dl",
            Self::MmolL => "mmol",
        }
    }

    /// Convert `value` expressed in this unit to mg/dL.
    pub fn to_mgdl(&self, value: f64) -> f64 {
        match self {
            Self::MgDl => value,
            Self::MmolL => value * MMOLL_TO_MGDL,
        }
    }
}

impl From<String> for GlucoseUnit {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

impl From<GlucoseUnit> for String {
    fn from(unit: GlucoseUnit) -> Self {
        unit.as_str().to_string()
    }
}

/// Trend direction reported with a glucose reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrendArrow {
    #[default]
    None,
    TripleUp,
    DoubleUp,
    SingleUp,
    FortyFiveUp,
    Flat,
    FortyFiveDown,
    SingleDown,
    DoubleDown,
    TripleDown,
}

impl TrendArrow {
    /// Parse a remote `direction` string. Unknown or missing directions map to [`TrendArrow::None`].
    pub fn from_direction(direction: Option<&str>) -> Self {
        match direction {
            Some("TripleUp") => Self::TripleUp,
            Some("DoubleUp") => Self::DoubleUp,
            Some("SingleUp") => Self::SingleUp,
            Some("FortyFiveUp") => Self::FortyFiveUp,
            Some("Flat") => Self::Flat,
            Some("FortyFiveDown") => Self::FortyFiveDown,
            Some("SingleDown") => Self::SingleDown,
            Some("DoubleDown") => Self::DoubleDown,
            Some("TripleDown") => Self::TripleDown,
            _ => Self::None,
        }
    }
}

/// Device that produced a glucose reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SourceSensor {
    DexcomNativeUnknown,
    DexcomG5Native,
    DexcomG6Native,
    DexcomG7Native,
    DexcomG5Xdrip,
    DexcomG6Xdrip,
    Libre1Other,
    Libre1Net,
    Libre1Blue,
    Libre2Native,
    Libre3,
    Mm600Series,
    Eversense,
    Glimp,
    Poctech,
    Glunovo,
    Intelligo,
    Nightscout,
    Random,
    #[default]
    Unknown,
}

const SOURCE_SENSOR_NAMES: &[(&str, SourceSensor)] = &[
    ("Dexcom Native", SourceSensor::DexcomNativeUnknown),
    ("G5 Native", SourceSensor::DexcomG5Native),
    ("G6 Native", SourceSensor::DexcomG6Native),
    ("G7", SourceSensor::DexcomG7Native),
    ("G5 Native / G5 Native", SourceSensor::DexcomG5Xdrip),
    ("G6 Native / G6 Native", SourceSensor::DexcomG6Xdrip),
    ("Other App", SourceSensor::Libre1Other),
    ("Network libre", SourceSensor::Libre1Net),
    ("BlueReader", SourceSensor::Libre1Blue),
    ("Libre2", SourceSensor::Libre2Native),
    ("Libre3", SourceSensor::Libre3),
    ("MM600Series", SourceSensor::Mm600Series),
    ("Eversense", SourceSensor::Eversense),
    ("Glimp", SourceSensor::Glimp),
    ("Poctech", SourceSensor::Poctech),
    ("Glunovo", SourceSensor::Glunovo),
    ("Intelligo", SourceSensor::Intelligo),
    ("Nightscout", SourceSensor::Nightscout),
    ("Random", SourceSensor::Random),
    ("Unknown", SourceSensor::Unknown),
];

impl SourceSensor {
    /// Parse a remote `device` string. Unrecognized devices map to [`SourceSensor::Unknown`].
    pub fn from_device(device: Option<&str>) -> Self {
        let Some(device) = device else {
            return Self::Unknown;
        };
        SOURCE_SENSOR_NAMES
            .iter()
            .find(|(name, _)| *name == device)
            .map(|(_, sensor)| *sensor)
            .unwrap_or(Self::Unknown)
    }

    /// Device string used by the remote store for this sensor.
    pub fn as_str(&self) -> &'static str {
        SOURCE_SENSOR_NAMES
            .iter()
            .find(|(_, sensor)| sensor == self)
            .map(|(name, _)| *name)
            .unwrap_or("Unknown")
    }
}

/// Canonical glucose reading.
///
/// Only constructed when both `timestamp` and `value` are known; partial readings are dropped
/// during normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlucoseValue {
    /// Epoch milliseconds of the measurement.
    pub timestamp: i64,
    /// Glucose in mg/dL.
    pub value: f64,
    /// Raw/filtered sensor signal, if the source reports one.
    pub raw: Option<f64>,
    pub noise: Option<f64>,
    pub trend_arrow: TrendArrow,
    pub source_sensor: SourceSensor,
    pub remote_id: Option<String>,
}

/// Fields shared by every canonical treatment.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RecordMeta {
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub utc_offset_ms: i64,
    pub is_valid: bool,
    pub remote_id: Option<String>,
    pub pump_id: Option<i64>,
    pub pump_serial: Option<String>,
}

/// Closed set of treatment kinds handled by the treatment ingestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TreatmentKind {
    Bolus,
    Carbs,
    TemporaryTarget,
    TemporaryBasal,
    EffectiveProfileSwitch,
    ProfileSwitch,
    BolusCalculatorResult,
    TherapyEvent,
    OfflineEvent,
    ExtendedBolus,
}

impl TreatmentKind {
    pub const ALL: [TreatmentKind; 10] = [
        Self::Bolus,
        Self::Carbs,
        Self::TemporaryTarget,
        Self::TemporaryBasal,
        Self::EffectiveProfileSwitch,
        Self::ProfileSwitch,
        Self::BolusCalculatorResult,
        Self::TherapyEvent,
        Self::OfflineEvent,
        Self::ExtendedBolus,
    ];

    /// Staging category name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bolus => "boluses",
            Self::Carbs => "carbs",
            Self::TemporaryTarget => "temporary_targets",
            Self::TemporaryBasal => "temporary_basals",
            Self::EffectiveProfileSwitch => "effective_profile_switches",
            Self::ProfileSwitch => "profile_switches",
            Self::BolusCalculatorResult => "bolus_calculator_results",
            Self::TherapyEvent => "therapy_events",
            Self::OfflineEvent => "offline_events",
            Self::ExtendedBolus => "extended_boluses",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BolusType {
    #[default]
    Normal,
    Smb,
    Priming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemporaryBasalType {
    #[default]
    Normal,
    EmulatedPumpSuspend,
    PumpSuspend,
    SuperBolus,
    FakeExtended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemporaryTargetReason {
    #[default]
    #[serde(rename = "Custom")]
    Custom,
    #[serde(rename = "Hypo")]
    Hypoglycemia,
    #[serde(rename = "Activity")]
    Activity,
    #[serde(rename = "Eating Soon")]
    EatingSoon,
    #[serde(rename = "Automation")]
    Automation,
    #[serde(rename = "Wear")]
    Wear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfflineReason {
    DisconnectPump,
    Suspend,
    DisableLoop,
    SuperBolus,
    #[default]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bolus {
    pub meta: RecordMeta,
    /// Units of insulin.
    pub amount: f64,
    pub bolus_type: BolusType,
    pub is_basal_insulin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Carbs {
    pub meta: RecordMeta,
    /// Grams.
    pub amount: f64,
    /// Milliseconds over which the carbs are absorbed; 0 for instant carbs.
    pub duration_ms: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporaryTarget {
    pub meta: RecordMeta,
    /// Milliseconds; 0 ends a running target.
    pub duration_ms: i64,
    pub reason: TemporaryTargetReason,
    pub low_mgdl: f64,
    pub high_mgdl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporaryBasal {
    pub meta: RecordMeta,
    pub duration_ms: i64,
    /// U/h when `is_absolute`, percent otherwise.
    pub rate: f64,
    pub is_absolute: bool,
    pub basal_type: TemporaryBasalType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveProfileSwitch {
    pub meta: RecordMeta,
    pub profile: PureProfile,
    pub original_profile_name: String,
    pub original_customized_name: String,
    pub original_timeshift_ms: i64,
    pub original_percentage: i32,
    pub original_duration_ms: i64,
    pub original_end: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSwitch {
    pub meta: RecordMeta,
    pub profile_name: String,
    pub profile: PureProfile,
    pub timeshift_ms: i64,
    pub percentage: i32,
    pub duration_ms: i64,
}

/// Snapshot of a bolus-calculator run as stored by the remote store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BolusCalculation {
    #[serde(rename = "targetBGLow")]
    pub target_bg_low: f64,
    #[serde(rename = "targetBGHigh")]
    pub target_bg_high: f64,
    pub isf: f64,
    pub ic: f64,
    #[serde(rename = "bolusIOB")]
    pub bolus_iob: f64,
    #[serde(rename = "basalIOB")]
    pub basal_iob: f64,
    pub glucose_value: f64,
    pub carbs: f64,
    pub total_insulin: f64,
    pub percentage_correction: i32,
    pub profile_name: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BolusCalculatorResult {
    pub meta: RecordMeta,
    pub calculation: BolusCalculation,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TherapyEvent {
    pub meta: RecordMeta,
    /// Remote `eventType` (e.g. `"Sensor Change"`, `"Note"`).
    pub event_type: String,
    pub duration_ms: i64,
    pub glucose: Option<f64>,
    pub glucose_type: Option<String>,
    pub note: Option<String>,
    pub entered_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfflineEvent {
    pub meta: RecordMeta,
    pub duration_ms: i64,
    pub reason: OfflineReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendedBolus {
    pub meta: RecordMeta,
    pub duration_ms: i64,
    pub amount: f64,
    pub is_emulating_temp_basal: bool,
}

/// Canonical treatment: one case per [`TreatmentKind`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Treatment {
    Bolus(Bolus),
    Carbs(Carbs),
    TemporaryTarget(TemporaryTarget),
    TemporaryBasal(TemporaryBasal),
    EffectiveProfileSwitch(EffectiveProfileSwitch),
    ProfileSwitch(ProfileSwitch),
    BolusCalculatorResult(BolusCalculatorResult),
    TherapyEvent(TherapyEvent),
    OfflineEvent(OfflineEvent),
    ExtendedBolus(ExtendedBolus),
}

impl Treatment {
    pub fn kind(&self) -> TreatmentKind {
        match self {
            Self::Bolus(_) => TreatmentKind::Bolus,
            Self::Carbs(_) => TreatmentKind::Carbs,
            Self::TemporaryTarget(_) => TreatmentKind::TemporaryTarget,
            Self::TemporaryBasal(_) => TreatmentKind::TemporaryBasal,
            Self::EffectiveProfileSwitch(_) => TreatmentKind::EffectiveProfileSwitch,
            Self::ProfileSwitch(_) => TreatmentKind::ProfileSwitch,
            Self::BolusCalculatorResult(_) => TreatmentKind::BolusCalculatorResult,
            Self::TherapyEvent(_) => TreatmentKind::TherapyEvent,
            Self::OfflineEvent(_) => TreatmentKind::OfflineEvent,
            Self::ExtendedBolus(_) => TreatmentKind::ExtendedBolus,
        }
    }

    pub fn meta(&self) -> &RecordMeta {
        match self {
            Self::Bolus(t) => &t.meta,
            Self::Carbs(t) => &t.meta,
            Self::TemporaryTarget(t) => &t.meta,
            Self::TemporaryBasal(t) => &t.meta,
            Self::EffectiveProfileSwitch(t) => &t.meta,
            Self::ProfileSwitch(t) => &t.meta,
            Self::BolusCalculatorResult(t) => &t.meta,
            Self::TherapyEvent(t) => &t.meta,
            Self::OfflineEvent(t) => &t.meta,
            Self::ExtendedBolus(t) => &t.meta,
        }
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.meta().remote_id.as_deref()
    }
}

/// Canonical food catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Food {
    pub name: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub portion: f64,
    /// Grams of carbohydrate per portion.
    pub carbs: i32,
    pub fat: Option<i32>,
    pub protein: Option<i32>,
    pub energy: Option<i32>,
    pub unit: String,
    pub gi: Option<i32>,
    pub is_valid: bool,
    pub remote_id: Option<String>,
}

impl Food {
    /// Deletion marker for the food with the given remote id.
    ///
    /// Storage must treat this as "invalidate by id", never as a real entry.
    pub fn tombstone(remote_id: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            category: None,
            subcategory: None,
            portion: 0.0,
            carbs: 0,
            fat: None,
            protein: None,
            energy: None,
            unit: "g".to_string(),
            gi: None,
            is_valid: false,
            remote_id: Some(remote_id.into()),
        }
    }

    pub fn is_tombstone(&self) -> bool {
        !self.is_valid && self.name.is_empty() && self.portion == 0.0 && self.carbs == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_arrow_parses_known_directions() {
        assert_eq!(TrendArrow::from_direction(Some("DoubleUp")), TrendArrow::DoubleUp);
        assert_eq!(TrendArrow::from_direction(Some("Flat")), TrendArrow::Flat);
        assert_eq!(TrendArrow::from_direction(Some("NOT COMPUTABLE")), TrendArrow::None);
        assert_eq!(TrendArrow::from_direction(None), TrendArrow::None);
    }

    #[test]
    fn source_sensor_round_trips_device_names() {
        assert_eq!(SourceSensor::from_device(Some("G6 Native")), SourceSensor::DexcomG6Native);
        assert_eq!(SourceSensor::DexcomG6Native.as_str(), "G6 Native");
        assert_eq!(SourceSensor::from_device(Some("xDrip-Whatever")), SourceSensor::Unknown);
        assert_eq!(SourceSensor::from_device(None), SourceSensor::Unknown);
    }

    #[test]
    fn glucose_unit_is_lenient() {
        assert_eq!(GlucoseUnit::parse("mmol/L"), GlucoseUnit::MmolL);
        assert_eq!(GlucoseUnit::parse("mg/dl"), GlucoseUnit::MgDl);
        assert_eq!(GlucoseUnit::parse("whatever"), GlucoseUnit::MgDl);
        assert_eq!(GlucoseUnit::MmolL.to_mgdl(5.0), 90.0);
    }

    #[test]
    fn tombstone_carries_only_the_remote_id() {
        let t = Food::tombstone("abc");
        assert!(t.is_tombstone());
        assert_eq!(t.remote_id.as_deref(), Some("abc"));
        assert!(t.name.is_empty());
    }
}
