//! Ingestion entrypoints.
//!
//! Most callers should use [`IncomingDataProcessor`], which owns one ingestor per record
//! category and shares a single [`Collaborators`] set between them:
//!
//! - [`readings`]: glucose readings, reading watermark, stale-data alarm dismissal
//! - [`treatments`]: the ten treatment kinds, admission policy, treatment watermark
//! - [`food`]: food catalog entries and removals
//! - [`profile_snapshot`]: remote profile store snapshots
//!
//! Every ingestor reports the outcome of a batch to the configured [`Notifier`]; failures are
//! contained at the batch boundary and never escape the `process*` methods.

pub mod food;
pub mod observability;
pub mod processor;
pub mod profile_snapshot;
pub mod readings;
pub mod treatments;

use std::fmt;
use std::sync::Arc;

use crate::config::{IngestionOptions, RuntimeMode, Settings};
use crate::error::IngestionResult;
use crate::profile::{InMemoryProfileSource, JsonProfileStoreFactory, ProfileSource, ProfileStoreFactory};
use crate::session::SyncSession;
use crate::staging::StagingBuffer;
use crate::time::{Clock, SystemClock};
use crate::wire::WireBatch;

pub use food::FoodIngestor;
pub use observability::{
    severity_for_error, AlarmKind, BatchCategory, CompositeNotifier, FileNotifier, IngestionContext,
    IngestionSeverity, IngestionStats, Notification, Notifier, RecordingNotifier, TracingNotifier, WireShape,
};
pub use processor::IncomingDataProcessor;
pub use profile_snapshot::ProfileIngestor;
pub use readings::ReadingIngestor;
pub use treatments::TreatmentIngestor;

/// External collaborators shared by all ingestors.
///
/// Cloning is cheap: every collaborator is behind an [`Arc`].
#[derive(Clone)]
pub struct Collaborators {
    pub settings: Arc<dyn Settings>,
    pub mode: Arc<dyn RuntimeMode>,
    pub staging: Arc<dyn StagingBuffer>,
    /// Active sync session; watermark and profile notifications are skipped while absent.
    pub session: Option<Arc<dyn SyncSession>>,
    pub notifier: Arc<dyn Notifier>,
    pub profiles: Arc<dyn ProfileStoreFactory>,
    pub profile_source: Arc<dyn ProfileSource>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Collaborators with no session, the JSON profile factory, an empty in-memory profile
    /// source and the system clock.
    pub fn new(
        settings: Arc<dyn Settings>,
        mode: Arc<dyn RuntimeMode>,
        staging: Arc<dyn StagingBuffer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            mode,
            staging,
            session: None,
            notifier,
            profiles: Arc::new(JsonProfileStoreFactory),
            profile_source: Arc::new(InMemoryProfileSource::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_session(mut self, session: Arc<dyn SyncSession>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_profile_source(mut self, source: Arc<dyn ProfileSource>) -> Self {
        self.profile_source = source;
        self
    }

    pub fn with_profile_factory(mut self, factory: Arc<dyn ProfileStoreFactory>) -> Self {
        self.profiles = factory;
        self
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("session_set", &self.session.is_some())
            .finish_non_exhaustive()
    }
}

/// Report a finished batch to the notifier.
///
/// On failure the error is logged, written to the sync log as a diagnostic line, passed to
/// `on_failure`, and escalated via `on_alert` when its severity meets the configured threshold.
pub(crate) fn report_batch(
    collaborators: &Collaborators,
    options: &IngestionOptions,
    ctx: &IngestionContext,
    result: &IngestionResult<IngestionStats>,
) {
    let notifier = &collaborators.notifier;
    match result {
        Ok(stats) => notifier.on_success(ctx, *stats),
        Err(e) => {
            let severity = severity_for_error(e);
            tracing::error!(
                category = ?ctx.category,
                shape = ?ctx.shape,
                count = ctx.records,
                ?severity,
                error = %e,
                "batch aborted"
            );
            notifier.notify(&Notification::DiagnosticLog {
                action: options.diagnostic_action.clone(),
                message: e.to_string(),
            });
            notifier.on_failure(ctx, severity, e);
            if severity >= options.alert_at_or_above {
                notifier.on_alert(ctx, severity, e);
            }
        }
    }
}

pub(crate) fn shape_of<T>(batch: &WireBatch<T>) -> WireShape {
    match batch {
        WireBatch::Legacy(_) => WireShape::Legacy,
        WireBatch::Typed(_) => WireShape::Typed,
    }
}
