//! Pre-typed records from the current client.
//!
//! These mirror the remote store's v3 documents closely. Mapping them to the canonical model is
//! infallible except where a record embeds a nested document (profiles, bolus-calculator
//! results) that has to be parsed on its own.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::profile::{ProfileSource, PureProfile};
use crate::types::{
    Bolus, BolusCalculation, BolusCalculatorResult, BolusType, Carbs, EffectiveProfileSwitch, ExtendedBolus, Food,
    GlucoseUnit, GlucoseValue, OfflineEvent, OfflineReason, ProfileSwitch, RecordMeta, SourceSensor,
    TemporaryBasal, TemporaryBasalType, TemporaryTarget, TemporaryTargetReason, TherapyEvent, TreatmentKind,
    TrendArrow,
};

fn default_true() -> bool {
    true
}

/// A typed glucose reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SgvRecord {
    pub date: i64,
    /// mg/dL.
    pub sgv: f64,
    #[serde(default)]
    pub filtered: Option<f64>,
    #[serde(default)]
    pub noise: Option<f64>,
    #[serde(default)]
    pub direction: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
}

impl SgvRecord {
    pub fn to_glucose_value(&self) -> GlucoseValue {
        GlucoseValue {
            timestamp: self.date,
            value: self.sgv,
            raw: self.filtered,
            noise: self.noise,
            trend_arrow: TrendArrow::from_direction(self.direction.as_deref()),
            source_sensor: SourceSensor::from_device(self.device.as_deref()),
            remote_id: self.identifier.clone(),
        }
    }
}

/// A typed food catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodRecord {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sub_category: Option<String>,
    pub portion: f64,
    #[serde(default)]
    pub unit: String,
    pub carbs: i32,
    #[serde(default)]
    pub fat: Option<i32>,
    #[serde(default)]
    pub protein: Option<i32>,
    #[serde(default)]
    pub energy: Option<i32>,
    #[serde(default)]
    pub gi: Option<i32>,
    #[serde(default = "default_true")]
    pub is_valid: bool,
    #[serde(default)]
    pub identifier: Option<String>,
}

impl FoodRecord {
    pub fn to_food(&self) -> Food {
        Food {
            name: self.name.clone(),
            category: self.category.clone(),
            subcategory: self.sub_category.clone(),
            portion: self.portion,
            carbs: self.carbs,
            fat: self.fat,
            protein: self.protein,
            energy: self.energy,
            unit: self.unit.clone(),
            gi: self.gi,
            is_valid: self.is_valid,
            remote_id: self.identifier.clone(),
        }
    }
}

/// Fields every typed treatment carries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentHeader {
    /// Epoch milliseconds. Records without a date are skipped by the ingestor.
    #[serde(default)]
    pub date: Option<i64>,
    #[serde(default)]
    pub identifier: Option<String>,
    /// Minutes east of UTC.
    #[serde(default)]
    pub utc_offset: Option<i64>,
    #[serde(default = "default_true")]
    pub is_valid: bool,
    #[serde(default)]
    pub pump_id: Option<i64>,
    #[serde(default)]
    pub pump_serial: Option<String>,
}

impl TreatmentHeader {
    pub fn dated(date: i64) -> Self {
        Self {
            date: Some(date),
            is_valid: true,
            ..Default::default()
        }
    }

    fn meta(&self, timestamp: i64) -> RecordMeta {
        RecordMeta {
            timestamp,
            utc_offset_ms: self.utc_offset.unwrap_or(0).saturating_mul(60_000),
            is_valid: self.is_valid,
            remote_id: self.identifier.clone(),
            pump_id: self.pump_id,
            pump_serial: self.pump_serial.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBolus {
    #[serde(flatten)]
    pub header: TreatmentHeader,
    pub insulin: f64,
    #[serde(rename = "type", default)]
    pub bolus_type: BolusType,
    #[serde(default)]
    pub is_basal_insulin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCarbs {
    #[serde(flatten)]
    pub header: TreatmentHeader,
    pub carbs: f64,
    /// Milliseconds.
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTemporaryTarget {
    #[serde(flatten)]
    pub header: TreatmentHeader,
    /// Milliseconds; 0 cancels a running target.
    pub duration: i64,
    pub target_bottom: f64,
    pub target_top: f64,
    #[serde(default)]
    pub units: GlucoseUnit,
    #[serde(default)]
    pub reason: TemporaryTargetReason,
}

impl WireTemporaryTarget {
    pub fn target_bottom_mgdl(&self) -> f64 {
        self.units.to_mgdl(self.target_bottom)
    }

    pub fn target_top_mgdl(&self) -> f64 {
        self.units.to_mgdl(self.target_top)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTemporaryBasal {
    #[serde(flatten)]
    pub header: TreatmentHeader,
    pub duration: i64,
    pub rate: f64,
    pub is_absolute: bool,
    #[serde(rename = "type", default)]
    pub basal_type: TemporaryBasalType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEffectiveProfileSwitch {
    #[serde(flatten)]
    pub header: TreatmentHeader,
    pub profile_json: Value,
    pub original_profile_name: String,
    #[serde(default)]
    pub original_customized_name: String,
    #[serde(default)]
    pub original_timeshift: i64,
    #[serde(default = "default_percentage")]
    pub original_percentage: i32,
    #[serde(default)]
    pub original_duration: i64,
    #[serde(default)]
    pub original_end: i64,
}

fn default_percentage() -> i32 {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireProfileSwitch {
    #[serde(flatten)]
    pub header: TreatmentHeader,
    /// Name of the profile switched to.
    pub profile: String,
    /// Embedded profile document; absent when the switch was entered on the remote side.
    #[serde(default)]
    pub profile_json: Option<Value>,
    #[serde(default)]
    pub timeshift: Option<i64>,
    #[serde(default)]
    pub percentage: Option<i32>,
    #[serde(default)]
    pub duration: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireBolusWizard {
    #[serde(flatten)]
    pub header: TreatmentHeader,
    /// JSON text of the calculator run.
    #[serde(default)]
    pub bolus_calculator_result: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTherapyEvent {
    #[serde(flatten)]
    pub header: TreatmentHeader,
    pub event_type: String,
    #[serde(default)]
    pub duration: i64,
    #[serde(default)]
    pub glucose: Option<f64>,
    #[serde(default)]
    pub glucose_type: Option<String>,
    #[serde(default)]
    pub units: GlucoseUnit,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub entered_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireOfflineEvent {
    #[serde(flatten)]
    pub header: TreatmentHeader,
    pub duration: i64,
    #[serde(default)]
    pub reason: OfflineReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireExtendedBolus {
    #[serde(flatten)]
    pub header: TreatmentHeader,
    pub duration: i64,
    #[serde(rename = "enteredinsulin")]
    pub entered_insulin: f64,
    #[serde(default)]
    pub is_emulating_temp_basal: bool,
}

/// A typed treatment, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WireTreatment {
    Bolus(WireBolus),
    Carbs(WireCarbs),
    TemporaryTarget(WireTemporaryTarget),
    TemporaryBasal(WireTemporaryBasal),
    EffectiveProfileSwitch(WireEffectiveProfileSwitch),
    ProfileSwitch(WireProfileSwitch),
    BolusWizard(WireBolusWizard),
    TherapyEvent(WireTherapyEvent),
    OfflineEvent(WireOfflineEvent),
    ExtendedBolus(WireExtendedBolus),
}

impl WireTreatment {
    pub fn header(&self) -> &TreatmentHeader {
        match self {
            Self::Bolus(t) => &t.header,
            Self::Carbs(t) => &t.header,
            Self::TemporaryTarget(t) => &t.header,
            Self::TemporaryBasal(t) => &t.header,
            Self::EffectiveProfileSwitch(t) => &t.header,
            Self::ProfileSwitch(t) => &t.header,
            Self::BolusWizard(t) => &t.header,
            Self::TherapyEvent(t) => &t.header,
            Self::OfflineEvent(t) => &t.header,
            Self::ExtendedBolus(t) => &t.header,
        }
    }

    pub fn date(&self) -> Option<i64> {
        self.header().date
    }

    /// Canonical kind this record normalizes into.
    pub fn kind(&self) -> TreatmentKind {
        match self {
            Self::Bolus(_) => TreatmentKind::Bolus,
            Self::Carbs(_) => TreatmentKind::Carbs,
            Self::TemporaryTarget(_) => TreatmentKind::TemporaryTarget,
            Self::TemporaryBasal(_) => TreatmentKind::TemporaryBasal,
            Self::EffectiveProfileSwitch(_) => TreatmentKind::EffectiveProfileSwitch,
            Self::ProfileSwitch(_) => TreatmentKind::ProfileSwitch,
            Self::BolusWizard(_) => TreatmentKind::BolusCalculatorResult,
            Self::TherapyEvent(_) => TreatmentKind::TherapyEvent,
            Self::OfflineEvent(_) => TreatmentKind::OfflineEvent,
            Self::ExtendedBolus(_) => TreatmentKind::ExtendedBolus,
        }
    }
}

impl WireBolus {
    pub fn to_bolus(&self, timestamp: i64) -> Bolus {
        Bolus {
            meta: self.header.meta(timestamp),
            amount: self.insulin,
            bolus_type: self.bolus_type,
            is_basal_insulin: self.is_basal_insulin,
        }
    }
}

impl WireCarbs {
    pub fn to_carbs(&self, timestamp: i64) -> Carbs {
        Carbs {
            meta: self.header.meta(timestamp),
            amount: self.carbs,
            duration_ms: self.duration.unwrap_or(0),
            notes: self.notes.clone(),
        }
    }
}

impl WireTemporaryTarget {
    pub fn to_temporary_target(&self, timestamp: i64) -> TemporaryTarget {
        TemporaryTarget {
            meta: self.header.meta(timestamp),
            duration_ms: self.duration,
            reason: self.reason,
            low_mgdl: self.target_bottom_mgdl(),
            high_mgdl: self.target_top_mgdl(),
        }
    }
}

impl WireTemporaryBasal {
    pub fn to_temporary_basal(&self, timestamp: i64) -> TemporaryBasal {
        TemporaryBasal {
            meta: self.header.meta(timestamp),
            duration_ms: self.duration,
            rate: self.rate,
            is_absolute: self.is_absolute,
            basal_type: self.basal_type,
        }
    }
}

impl WireEffectiveProfileSwitch {
    /// `None` if the embedded profile document is not a valid profile.
    pub fn to_effective_profile_switch(&self, timestamp: i64) -> Option<EffectiveProfileSwitch> {
        let profile = PureProfile::from_json(&self.profile_json)?;
        Some(EffectiveProfileSwitch {
            meta: self.header.meta(timestamp),
            profile,
            original_profile_name: self.original_profile_name.clone(),
            original_customized_name: self.original_customized_name.clone(),
            original_timeshift_ms: self.original_timeshift,
            original_percentage: self.original_percentage,
            original_duration_ms: self.original_duration,
            original_end: self.original_end,
        })
    }
}

impl WireProfileSwitch {
    /// Uses the embedded profile if present, otherwise resolves [`Self::profile`] by name from
    /// the active profile source. `None` if neither yields a valid profile.
    pub fn to_profile_switch(&self, timestamp: i64, source: &dyn ProfileSource) -> Option<ProfileSwitch> {
        let profile = match &self.profile_json {
            Some(json) => PureProfile::from_json(json)?,
            None => source.specific_profile(&self.profile)?,
        };
        Some(ProfileSwitch {
            meta: self.header.meta(timestamp),
            profile_name: self.profile.clone(),
            profile,
            timeshift_ms: self.timeshift.unwrap_or(0),
            percentage: self.percentage.unwrap_or(100),
            duration_ms: self.duration.unwrap_or(0),
        })
    }
}

impl WireBolusWizard {
    /// `None` if the calculator document is missing or malformed.
    pub fn to_bolus_calculator_result(&self, timestamp: i64) -> Option<BolusCalculatorResult> {
        let text = self.bolus_calculator_result.as_deref()?;
        let calculation: BolusCalculation = serde_json::from_str(text).ok()?;
        Some(BolusCalculatorResult {
            meta: self.header.meta(timestamp),
            calculation,
        })
    }
}

impl WireTherapyEvent {
    pub fn to_therapy_event(&self, timestamp: i64) -> TherapyEvent {
        TherapyEvent {
            meta: self.header.meta(timestamp),
            event_type: self.event_type.clone(),
            duration_ms: self.duration,
            glucose: self.glucose.map(|g| self.units.to_mgdl(g)),
            glucose_type: self.glucose_type.clone(),
            note: self.notes.clone(),
            entered_by: self.entered_by.clone(),
        }
    }
}

impl WireOfflineEvent {
    pub fn to_offline_event(&self, timestamp: i64) -> OfflineEvent {
        OfflineEvent {
            meta: self.header.meta(timestamp),
            duration_ms: self.duration,
            reason: self.reason,
        }
    }
}

impl WireExtendedBolus {
    pub fn to_extended_bolus(&self, timestamp: i64) -> ExtendedBolus {
        ExtendedBolus {
            meta: self.header.meta(timestamp),
            duration_ms: self.duration,
            amount: self.entered_insulin,
            is_emulating_temp_basal: self.is_emulating_temp_basal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::InMemoryProfileSource;
    use serde_json::json;

    #[test]
    fn typed_treatments_decode_by_kind_tag() {
        let t: WireTreatment = serde_json::from_value(json!({
            "kind": "Bolus",
            "date": 1000,
            "identifier": "b1",
            "utcOffset": 60,
            "insulin": 1.5,
            "type": "SMB"
        }))
        .unwrap();

        assert_eq!(t.kind(), TreatmentKind::Bolus);
        assert_eq!(t.date(), Some(1000));
        let WireTreatment::Bolus(b) = t else {
            panic!("expected bolus");
        };
        let bolus = b.to_bolus(1000);
        assert_eq!(bolus.bolus_type, BolusType::Smb);
        assert_eq!(bolus.meta.utc_offset_ms, 3_600_000);
        assert_eq!(bolus.meta.remote_id.as_deref(), Some("b1"));
        assert!(bolus.meta.is_valid);
    }

    #[test]
    fn utc_offset_minutes_saturate_when_converted() {
        let header = TreatmentHeader {
            utc_offset: Some(i64::MAX / 2),
            ..TreatmentHeader::dated(1)
        };
        assert_eq!(header.meta(1).utc_offset_ms, i64::MAX);
    }

    #[test]
    fn temp_target_converts_mmol_targets() {
        let tt = WireTemporaryTarget {
            header: TreatmentHeader::dated(1),
            duration: 60_000,
            target_bottom: 5.0,
            target_top: 6.0,
            units: GlucoseUnit::MmolL,
            reason: TemporaryTargetReason::Activity,
        };
        let canonical = tt.to_temporary_target(1);
        assert_eq!(canonical.low_mgdl, 90.0);
        assert_eq!(canonical.high_mgdl, 108.0);
    }

    #[test]
    fn bolus_wizard_requires_a_parseable_document() {
        let mut wizard = WireBolusWizard {
            header: TreatmentHeader::dated(1),
            bolus_calculator_result: None,
        };
        assert!(wizard.to_bolus_calculator_result(1).is_none());

        wizard.bolus_calculator_result = Some("{not json".to_string());
        assert!(wizard.to_bolus_calculator_result(1).is_none());

        wizard.bolus_calculator_result = Some(r#"{"totalInsulin": 2.5, "targetBGLow": 100}"#.to_string());
        let result = wizard.to_bolus_calculator_result(1).unwrap();
        assert_eq!(result.calculation.total_insulin, 2.5);
        assert_eq!(result.calculation.target_bg_low, 100.0);
    }

    #[test]
    fn profile_switch_falls_back_to_active_source() {
        let ps = WireProfileSwitch {
            header: TreatmentHeader::dated(1),
            profile: "Default".to_string(),
            profile_json: None,
            timeshift: None,
            percentage: Some(120),
            duration: None,
        };
        let empty = InMemoryProfileSource::new();
        assert!(ps.to_profile_switch(1, &empty).is_none());
    }

    #[test]
    fn sgv_record_maps_directly() {
        let sgv = SgvRecord {
            date: 5,
            sgv: 99.0,
            filtered: None,
            noise: Some(1.0),
            direction: Some("Flat".to_string()),
            device: None,
            identifier: Some("s1".to_string()),
        };
        let gv = sgv.to_glucose_value();
        assert_eq!(gv.trend_arrow, TrendArrow::Flat);
        assert_eq!(gv.source_sensor, SourceSensor::Unknown);
        assert_eq!(gv.remote_id.as_deref(), Some("s1"));
    }
}
