//! Admission policy for treatments.
//!
//! [`AdmissionPolicy`] is a snapshot of the relevant settings and mode flags, captured once per
//! batch. [`AdmissionPolicy::admits`] is a pure function of that snapshot and the treatment
//! kind, so the whole table can be tested without running an ingestor.
//!
//! | Kind | Admitted when |
//! |---|---|
//! | Bolus | `receive_insulin` or client-only |
//! | Carbs | `receive_carbs` or client-only |
//! | TemporaryTarget | `receive_temp_target` or client-only (range checked separately) |
//! | TemporaryBasal | (engineering and `receive_tbr_eb`) or client-only |
//! | EffectiveProfileSwitch | `receive_profile_switch` or client-only |
//! | ProfileSwitch | `receive_profile_switch` or client-only |
//! | BolusCalculatorResult | always |
//! | TherapyEvent | `receive_therapy_events` or client-only |
//! | OfflineEvent | (`receive_offline_event` and engineering) or client-only |
//! | ExtendedBolus | (engineering and `receive_tbr_eb`) or client-only |

use crate::config::{RuntimeMode, SettingKey, Settings};
use crate::types::TreatmentKind;

/// Lowest accepted temporary target, mg/dL.
pub const MIN_TT_MGDL: f64 = 72.0;
/// Highest accepted temporary target, mg/dL.
pub const MAX_TT_MGDL: f64 = 180.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdmissionPolicy {
    pub receive_insulin: bool,
    pub receive_carbs: bool,
    pub receive_temp_target: bool,
    pub receive_tbr_eb: bool,
    pub receive_profile_switch: bool,
    pub receive_therapy_events: bool,
    pub receive_offline_event: bool,
    pub client_only: bool,
    pub engineering: bool,
}

impl AdmissionPolicy {
    /// Read the current settings and mode. All receive flags default to off.
    pub fn capture(settings: &dyn Settings, mode: &dyn RuntimeMode) -> Self {
        Self {
            receive_insulin: settings.get_bool(SettingKey::ReceiveInsulin, false),
            receive_carbs: settings.get_bool(SettingKey::ReceiveCarbs, false),
            receive_temp_target: settings.get_bool(SettingKey::ReceiveTempTarget, false),
            receive_tbr_eb: settings.get_bool(SettingKey::ReceiveTbrEb, false),
            receive_profile_switch: settings.get_bool(SettingKey::ReceiveProfileSwitch, false),
            receive_therapy_events: settings.get_bool(SettingKey::ReceiveTherapyEvents, false),
            receive_offline_event: settings.get_bool(SettingKey::ReceiveOfflineEvent, false),
            client_only: mode.client_only_mode(),
            engineering: mode.engineering_mode(),
        }
    }

    pub fn admits(&self, kind: TreatmentKind) -> bool {
        let gate = match kind {
            TreatmentKind::Bolus => self.receive_insulin,
            TreatmentKind::Carbs => self.receive_carbs,
            TreatmentKind::TemporaryTarget => self.receive_temp_target,
            TreatmentKind::TemporaryBasal | TreatmentKind::ExtendedBolus => {
                self.engineering && self.receive_tbr_eb
            }
            TreatmentKind::EffectiveProfileSwitch | TreatmentKind::ProfileSwitch => self.receive_profile_switch,
            TreatmentKind::BolusCalculatorResult => return true,
            TreatmentKind::TherapyEvent => self.receive_therapy_events,
            TreatmentKind::OfflineEvent => self.receive_offline_event && self.engineering,
        };
        gate || self.client_only
    }
}

/// Range check for a temporary target in mg/dL.
///
/// A zero-duration target cancels a running one and is always valid. Otherwise both bounds
/// must lie within `[MIN_TT_MGDL, MAX_TT_MGDL]` and `low <= high`.
pub fn temp_target_in_range(duration_ms: i64, low_mgdl: f64, high_mgdl: f64) -> bool {
    if duration_ms <= 0 {
        return true;
    }
    let bounds = MIN_TT_MGDL..=MAX_TT_MGDL;
    bounds.contains(&low_mgdl) && bounds.contains(&high_mgdl) && low_mgdl <= high_mgdl
}
