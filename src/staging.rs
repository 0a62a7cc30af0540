//! Staging buffer: where normalized records wait for the persistence layer.
//!
//! [`StagingBuffer`] is the collaborator interface. [`InMemoryStaging`] is a reference
//! implementation with one collection per category and upsert-by-remote-id semantics: a record
//! whose remote id is already staged replaces the earlier one, records without a remote id are
//! appended.

use std::sync::Mutex;

use crate::error::{IngestionError, IngestionResult};
use crate::types::{
    Bolus, BolusCalculatorResult, Carbs, EffectiveProfileSwitch, ExtendedBolus, Food, GlucoseValue, OfflineEvent,
    ProfileSwitch, TemporaryBasal, TemporaryTarget, TherapyEvent, Treatment,
};

/// Append-only sinks per record category.
///
/// Implementations must be safe to call from several ingestors concurrently and must upsert by
/// remote id, since upstream delivery is at-least-once.
pub trait StagingBuffer: Send + Sync {
    fn stage_glucose_values(&self, values: Vec<GlucoseValue>) -> IngestionResult<()>;

    /// Stage one treatment into the collection of its kind.
    fn stage_treatment(&self, treatment: Treatment) -> IngestionResult<()>;

    /// Stage food entries; tombstones (see [`Food::tombstone`]) included.
    fn stage_foods(&self, foods: Vec<Food>) -> IngestionResult<()>;
}

/// Everything currently staged, grouped by category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedData {
    pub glucose_values: Vec<GlucoseValue>,
    pub boluses: Vec<Bolus>,
    pub carbs: Vec<Carbs>,
    pub temporary_targets: Vec<TemporaryTarget>,
    pub temporary_basals: Vec<TemporaryBasal>,
    pub effective_profile_switches: Vec<EffectiveProfileSwitch>,
    pub profile_switches: Vec<ProfileSwitch>,
    pub bolus_calculator_results: Vec<BolusCalculatorResult>,
    pub therapy_events: Vec<TherapyEvent>,
    pub offline_events: Vec<OfflineEvent>,
    pub extended_boluses: Vec<ExtendedBolus>,
    pub foods: Vec<Food>,
}

impl StagedData {
    /// Total number of staged treatments across all treatment categories.
    pub fn treatment_count(&self) -> usize {
        self.boluses.len()
            + self.carbs.len()
            + self.temporary_targets.len()
            + self.temporary_basals.len()
            + self.effective_profile_switches.len()
            + self.profile_switches.len()
            + self.bolus_calculator_results.len()
            + self.therapy_events.len()
            + self.offline_events.len()
            + self.extended_boluses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glucose_values.is_empty() && self.foods.is_empty() && self.treatment_count() == 0
    }
}

fn upsert<T>(items: &mut Vec<T>, item: T, id_of: impl Fn(&T) -> Option<&str>) {
    let existing = id_of(&item).and_then(|id| items.iter().position(|e| id_of(e) == Some(id)));
    match existing {
        Some(pos) => items[pos] = item,
        None => items.push(item),
    }
}

/// In-memory [`StagingBuffer`].
#[derive(Debug, Default)]
pub struct InMemoryStaging {
    data: Mutex<StagedData>,
}

impl InMemoryStaging {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything staged so far.
    pub fn snapshot(&self) -> StagedData {
        self.data.lock().map(|d| d.clone()).unwrap_or_default()
    }

    /// Remove and return everything staged so far.
    pub fn drain(&self) -> StagedData {
        self.data.lock().map(|mut d| std::mem::take(&mut *d)).unwrap_or_default()
    }

    fn with_data<R>(&self, category: &'static str, f: impl FnOnce(&mut StagedData) -> R) -> IngestionResult<R> {
        let mut guard = self
            .data
            .lock()
            .map_err(|_| IngestionError::staging(category, "staging lock poisoned"))?;
        Ok(f(&mut guard))
    }
}

impl StagingBuffer for InMemoryStaging {
    fn stage_glucose_values(&self, values: Vec<GlucoseValue>) -> IngestionResult<()> {
        self.with_data("glucose_values", |d| {
            for v in values {
                upsert(&mut d.glucose_values, v, |g| g.remote_id.as_deref());
            }
        })
    }

    fn stage_treatment(&self, treatment: Treatment) -> IngestionResult<()> {
        self.with_data(treatment.kind().as_str(), |d| match treatment {
            Treatment::Bolus(t) => upsert(&mut d.boluses, t, |x| x.meta.remote_id.as_deref()),
            Treatment::Carbs(t) => upsert(&mut d.carbs, t, |x| x.meta.remote_id.as_deref()),
            Treatment::TemporaryTarget(t) => upsert(&mut d.temporary_targets, t, |x| x.meta.remote_id.as_deref()),
            Treatment::TemporaryBasal(t) => upsert(&mut d.temporary_basals, t, |x| x.meta.remote_id.as_deref()),
            Treatment::EffectiveProfileSwitch(t) => {
                upsert(&mut d.effective_profile_switches, t, |x| x.meta.remote_id.as_deref())
            }
            Treatment::ProfileSwitch(t) => upsert(&mut d.profile_switches, t, |x| x.meta.remote_id.as_deref()),
            Treatment::BolusCalculatorResult(t) => {
                upsert(&mut d.bolus_calculator_results, t, |x| x.meta.remote_id.as_deref())
            }
            Treatment::TherapyEvent(t) => upsert(&mut d.therapy_events, t, |x| x.meta.remote_id.as_deref()),
            Treatment::OfflineEvent(t) => upsert(&mut d.offline_events, t, |x| x.meta.remote_id.as_deref()),
            Treatment::ExtendedBolus(t) => upsert(&mut d.extended_boluses, t, |x| x.meta.remote_id.as_deref()),
        })
    }

    fn stage_foods(&self, foods: Vec<Food>) -> IngestionResult<()> {
        self.with_data("foods", |d| {
            for f in foods {
                upsert(&mut d.foods, f, |x| x.remote_id.as_deref());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordMeta, SourceSensor, TrendArrow};

    fn gv(ts: i64, value: f64, id: Option<&str>) -> GlucoseValue {
        GlucoseValue {
            timestamp: ts,
            value,
            raw: None,
            noise: None,
            trend_arrow: TrendArrow::None,
            source_sensor: SourceSensor::Unknown,
            remote_id: id.map(str::to_string),
        }
    }

    #[test]
    fn glucose_values_upsert_by_remote_id() {
        let staging = InMemoryStaging::new();
        staging
            .stage_glucose_values(vec![gv(1, 100.0, Some("a")), gv(2, 110.0, None)])
            .unwrap();
        staging
            .stage_glucose_values(vec![gv(1, 105.0, Some("a")), gv(2, 110.0, None)])
            .unwrap();

        let snap = staging.snapshot();
        assert_eq!(snap.glucose_values.len(), 3);
        assert_eq!(snap.glucose_values[0].value, 105.0);
    }

    #[test]
    fn food_tombstone_replaces_staged_entry() {
        let staging = InMemoryStaging::new();
        let mut apple = Food::tombstone("f1");
        apple.name = "Apple".to_string();
        apple.is_valid = true;
        staging.stage_foods(vec![apple]).unwrap();
        staging.stage_foods(vec![Food::tombstone("f1")]).unwrap();

        let snap = staging.snapshot();
        assert_eq!(snap.foods.len(), 1);
        assert!(snap.foods[0].is_tombstone());
    }

    #[test]
    fn treatments_land_in_their_own_collection() {
        let staging = InMemoryStaging::new();
        let meta = RecordMeta {
            timestamp: 1,
            is_valid: true,
            remote_id: Some("c1".to_string()),
            ..Default::default()
        };
        staging
            .stage_treatment(Treatment::Carbs(Carbs {
                meta,
                amount: 20.0,
                duration_ms: 0,
                notes: None,
            }))
            .unwrap();

        let snap = staging.drain();
        assert_eq!(snap.carbs.len(), 1);
        assert_eq!(snap.treatment_count(), 1);
        assert!(staging.snapshot().is_empty());
    }
}
