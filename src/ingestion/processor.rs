//! Single entry point over the four ingestors.

use serde_json::Value;

use crate::config::IngestionOptions;
use crate::wire::{FoodBatch, ReadingBatch, WireTreatment};

use super::{Collaborators, FoodIngestor, ProfileIngestor, ReadingIngestor, TreatmentIngestor};

/// Reconciles incoming remote-store batches into the local staging buffer.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use glucose_sync_ingest::config::{InMemorySettings, IngestionOptions, ModeFlags, SettingKey};
/// use glucose_sync_ingest::ingestion::{Collaborators, IncomingDataProcessor, RecordingNotifier};
/// use glucose_sync_ingest::staging::InMemoryStaging;
/// use glucose_sync_ingest::wire::WireBatch;
///
/// let settings = Arc::new(InMemorySettings::new());
/// settings.set_bool(SettingKey::ReceiveCgm, true);
/// let staging = Arc::new(InMemoryStaging::new());
/// let collaborators = Collaborators::new(
///     settings,
///     Arc::new(ModeFlags::default()),
///     staging.clone(),
///     Arc::new(RecordingNotifier::new()),
/// );
///
/// let processor = IncomingDataProcessor::new(collaborators, IngestionOptions::default());
/// let batch = WireBatch::legacy_from_str(r#"[{"date": 1600000000000, "sgv": 120}]"#).unwrap();
/// assert!(processor.process_readings(batch));
/// assert_eq!(staging.snapshot().glucose_values.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct IncomingDataProcessor {
    readings: ReadingIngestor,
    treatments: TreatmentIngestor,
    food: FoodIngestor,
    profile: ProfileIngestor,
}

impl IncomingDataProcessor {
    pub fn new(collaborators: Collaborators, options: IngestionOptions) -> Self {
        Self {
            readings: ReadingIngestor::new(collaborators.clone(), options.clone()),
            treatments: TreatmentIngestor::new(collaborators.clone(), options.clone()),
            food: FoodIngestor::new(collaborators.clone(), options.clone()),
            profile: ProfileIngestor::new(collaborators, options),
        }
    }

    /// See [`ReadingIngestor::process`].
    pub fn process_readings(&self, batch: ReadingBatch) -> bool {
        self.readings.process(batch)
    }

    /// See [`TreatmentIngestor::process`].
    pub fn process_treatments(&self, batch: &[WireTreatment]) -> bool {
        self.treatments.process(batch)
    }

    /// See [`FoodIngestor::process`].
    pub fn process_food(&self, batch: FoodBatch) {
        self.food.process(batch)
    }

    /// See [`ProfileIngestor::process`].
    pub fn process_profile(&self, raw: &Value) {
        self.profile.process(raw)
    }
}
