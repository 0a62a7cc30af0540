//! Glucose reading ingestion.
//!
//! A batch is normalized, the newest reading strictly before "now" becomes the watermark
//! candidate, and when one exists:
//!
//! 1. all normalized readings are staged as one batch
//! 2. the reading watermark is forwarded to the session
//! 3. both stale-data alarms are dismissed if that reading is fresh
//!
//! A batch that fails to stage leaves the watermark untouched.
//!
//! Readings in the future never count towards the watermark, but they are still staged.

use crate::config::{IngestionOptions, SettingKey};
use crate::error::IngestionResult;
use crate::types::GlucoseValue;
use crate::wire::{legacy, ReadingBatch, WireBatch};

use super::observability::{AlarmKind, BatchCategory, IngestionContext, IngestionStats, Notification};
use super::{report_batch, shape_of, Collaborators};

#[derive(Debug, Clone)]
pub struct ReadingIngestor {
    collaborators: Collaborators,
    options: IngestionOptions,
}

impl ReadingIngestor {
    pub fn new(collaborators: Collaborators, options: IngestionOptions) -> Self {
        Self {
            collaborators,
            options,
        }
    }

    /// Reading sync is on when the remote store is the selected glucose source or
    /// `receive_cgm` is set.
    pub fn enabled(&self) -> bool {
        self.collaborators.mode.remote_reading_source_enabled()
            || self.collaborators.settings.get_bool(SettingKey::ReceiveCgm, false)
    }

    /// Ingest a batch of readings.
    ///
    /// Returns `true` when at least one reading older than now was seen and the batch was
    /// staged; `false` when reading sync is disabled, nothing qualified, or staging failed.
    pub fn process(&self, batch: ReadingBatch) -> bool {
        if !self.enabled() {
            tracing::debug!(count = batch.len(), "reading sync disabled, batch ignored");
            return false;
        }

        let ctx = IngestionContext {
            category: BatchCategory::Readings,
            shape: shape_of(&batch),
            records: batch.len(),
        };
        tracing::debug!(count = ctx.records, shape = ?ctx.shape, "readings received");

        let result = self.ingest(batch);
        report_batch(&self.collaborators, &self.options, &ctx, &result);
        matches!(&result, Ok(stats) if stats.latest > 0)
    }

    fn ingest(&self, batch: ReadingBatch) -> IngestionResult<IngestionStats> {
        let (values, skipped) = normalize(batch);
        let now = self.collaborators.clock.now_millis();

        let latest = values
            .iter()
            .map(|v| v.timestamp)
            .filter(|ts| *ts < now)
            .fold(0, i64::max);

        let mut stats = IngestionStats {
            staged: 0,
            skipped,
            latest,
        };
        if latest <= 0 {
            tracing::debug!(count = values.len(), "no reading older than now, nothing staged");
            return Ok(stats);
        }

        let count = values.len();
        self.collaborators.staging.stage_glucose_values(values)?;
        stats.staged = count;
        tracing::debug!(count, latest, "readings staged");

        if let Some(session) = &self.collaborators.session {
            session.advance_reading_watermark(latest);
        }
        if now - latest < self.options.fresh_reading_window_ms {
            let notifier = &self.collaborators.notifier;
            notifier.notify(&Notification::DismissAlarm(AlarmKind::RemoteAlarm));
            notifier.notify(&Notification::DismissAlarm(AlarmKind::RemoteUrgentAlarm));
        }
        Ok(stats)
    }
}

fn normalize(batch: ReadingBatch) -> (Vec<GlucoseValue>, usize) {
    match batch {
        WireBatch::Legacy(records) => {
            let mut values = Vec::with_capacity(records.len());
            let mut skipped = 0;
            for record in &records {
                match legacy::glucose_value(record) {
                    Some(v) => values.push(v),
                    None => {
                        skipped += 1;
                        tracing::trace!(%record, "reading without timestamp or value dropped");
                    }
                }
            }
            (values, skipped)
        }
        WireBatch::Typed(records) => (records.iter().map(|r| r.to_glucose_value()).collect(), 0),
    }
}
