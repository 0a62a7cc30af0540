#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use glucose_sync_ingest::config::{InMemorySettings, IngestionOptions, ModeFlags};
use glucose_sync_ingest::ingestion::{Collaborators, IncomingDataProcessor, RecordingNotifier};
use glucose_sync_ingest::profile::InMemoryProfileSource;
use glucose_sync_ingest::session::Watermarks;
use glucose_sync_ingest::staging::{InMemoryStaging, StagingBuffer};
use glucose_sync_ingest::time::FixedClock;
use glucose_sync_ingest::types::{Food, GlucoseValue, Treatment};
use glucose_sync_ingest::{IngestionError, IngestionResult};

pub const NOW: i64 = 1_700_000_000_000;

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{name}")).unwrap()
}

/// In-memory collaborators with handles kept for assertions.
pub struct Harness {
    pub settings: Arc<InMemorySettings>,
    pub staging: Arc<InMemoryStaging>,
    pub session: Arc<Watermarks>,
    pub notifier: Arc<RecordingNotifier>,
    pub profiles: Arc<InMemoryProfileSource>,
    pub clock: Arc<FixedClock>,
    pub mode: ModeFlags,
}

impl Harness {
    pub fn new(mode: ModeFlags) -> Self {
        Self {
            settings: Arc::new(InMemorySettings::new()),
            staging: Arc::new(InMemoryStaging::new()),
            session: Arc::new(Watermarks::new()),
            notifier: Arc::new(RecordingNotifier::new()),
            profiles: Arc::new(InMemoryProfileSource::new()),
            clock: Arc::new(FixedClock::new(NOW)),
            mode,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        self.collaborators_with_staging(self.staging.clone())
    }

    pub fn collaborators_with_staging(&self, staging: Arc<dyn StagingBuffer>) -> Collaborators {
        Collaborators::new(self.settings.clone(), Arc::new(self.mode), staging, self.notifier.clone())
            .with_session(self.session.clone())
            .with_clock(self.clock.clone())
            .with_profile_source(self.profiles.clone())
    }

    pub fn processor(&self) -> IncomingDataProcessor {
        IncomingDataProcessor::new(self.collaborators(), IngestionOptions::default())
    }
}

/// Staging buffer that accepts a fixed number of writes and refuses everything after.
pub struct FailingStaging {
    pub inner: InMemoryStaging,
    remaining: AtomicUsize,
}

impl FailingStaging {
    pub fn accepting(writes: usize) -> Self {
        Self {
            inner: InMemoryStaging::new(),
            remaining: AtomicUsize::new(writes),
        }
    }

    fn take(&self, category: &'static str) -> IngestionResult<()> {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|_| IngestionError::Staging {
                category,
                message: "database is closed".to_string(),
            })
    }
}

impl StagingBuffer for FailingStaging {
    fn stage_glucose_values(&self, values: Vec<GlucoseValue>) -> IngestionResult<()> {
        self.take("glucose_values")?;
        self.inner.stage_glucose_values(values)
    }

    fn stage_treatment(&self, treatment: Treatment) -> IngestionResult<()> {
        self.take(treatment.kind().as_str())?;
        self.inner.stage_treatment(treatment)
    }

    fn stage_foods(&self, foods: Vec<Food>) -> IngestionResult<()> {
        self.take("foods")?;
        self.inner.stage_foods(foods)
    }
}
