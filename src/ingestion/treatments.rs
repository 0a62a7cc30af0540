//! Treatment ingestion.
//!
//! Records are handled one at a time and each admitted record is staged immediately. If the
//! staging buffer fails mid-batch the remainder is abandoned, but whatever was staged before
//! the failure stays staged and the treatment watermark is left untouched.

use crate::admission::{temp_target_in_range, AdmissionPolicy};
use crate::config::IngestionOptions;
use crate::error::IngestionResult;
use crate::types::Treatment;
use crate::wire::WireTreatment;

use super::observability::{BatchCategory, IngestionContext, IngestionStats, WireShape};
use super::{report_batch, Collaborators};

#[derive(Debug, Clone)]
pub struct TreatmentIngestor {
    collaborators: Collaborators,
    options: IngestionOptions,
}

impl TreatmentIngestor {
    pub fn new(collaborators: Collaborators, options: IngestionOptions) -> Self {
        Self {
            collaborators,
            options,
        }
    }

    /// Ingest a batch of typed treatments.
    ///
    /// Returns `true` when the batch completed and contained at least one dated record,
    /// whether or not any record was admitted.
    pub fn process(&self, batch: &[WireTreatment]) -> bool {
        let ctx = IngestionContext {
            category: BatchCategory::Treatments,
            shape: WireShape::Typed,
            records: batch.len(),
        };
        tracing::debug!(count = batch.len(), "treatments received");

        let result = self.ingest(batch);
        report_batch(&self.collaborators, &self.options, &ctx, &result);
        matches!(&result, Ok(stats) if stats.latest > 0)
    }

    fn ingest(&self, batch: &[WireTreatment]) -> IngestionResult<IngestionStats> {
        let policy = AdmissionPolicy::capture(
            self.collaborators.settings.as_ref(),
            self.collaborators.mode.as_ref(),
        );
        let mut stats = IngestionStats::default();

        for record in batch {
            let kind = record.kind();
            let Some(date) = record.date() else {
                stats.skipped += 1;
                tracing::trace!(?kind, remote_id = ?record.header().identifier, "treatment without date dropped");
                continue;
            };
            stats.latest = stats.latest.max(date);

            if !policy.admits(kind) {
                stats.skipped += 1;
                tracing::trace!(?kind, remote_id = ?record.header().identifier, "treatment not admitted");
                continue;
            }

            match self.normalize(record, date) {
                Some(treatment) => {
                    self.collaborators.staging.stage_treatment(treatment)?;
                    stats.staged += 1;
                }
                None => stats.skipped += 1,
            }
        }

        if stats.latest > 0 {
            if let Some(session) = &self.collaborators.session {
                session.advance_treatment_watermark(stats.latest);
            }
        }
        tracing::debug!(staged = stats.staged, skipped = stats.skipped, latest = stats.latest, "treatments done");
        Ok(stats)
    }

    /// Convert an admitted record. `None` drops it.
    fn normalize(&self, record: &WireTreatment, date: i64) -> Option<Treatment> {
        let treatment = match record {
            WireTreatment::Bolus(t) => Treatment::Bolus(t.to_bolus(date)),
            WireTreatment::Carbs(t) => Treatment::Carbs(t.to_carbs(date)),
            WireTreatment::TemporaryTarget(t) => {
                let target = t.to_temporary_target(date);
                if !temp_target_in_range(target.duration_ms, target.low_mgdl, target.high_mgdl) {
                    tracing::debug!(
                        remote_id = ?target.meta.remote_id,
                        low = target.low_mgdl,
                        high = target.high_mgdl,
                        duration_ms = target.duration_ms,
                        "ignoring invalid temporary target"
                    );
                    return None;
                }
                Treatment::TemporaryTarget(target)
            }
            WireTreatment::TemporaryBasal(t) => Treatment::TemporaryBasal(t.to_temporary_basal(date)),
            WireTreatment::EffectiveProfileSwitch(t) => match t.to_effective_profile_switch(date) {
                Some(eps) => Treatment::EffectiveProfileSwitch(eps),
                None => {
                    tracing::debug!(remote_id = ?t.header.identifier, "effective profile switch without valid profile");
                    return None;
                }
            },
            WireTreatment::ProfileSwitch(t) => {
                match t.to_profile_switch(date, self.collaborators.profile_source.as_ref()) {
                    Some(ps) => Treatment::ProfileSwitch(ps),
                    None => {
                        tracing::debug!(
                            remote_id = ?t.header.identifier,
                            profile = %t.profile,
                            "profile switch references unknown or invalid profile"
                        );
                        return None;
                    }
                }
            }
            WireTreatment::BolusWizard(t) => match t.to_bolus_calculator_result(date) {
                Some(result) => Treatment::BolusCalculatorResult(result),
                None => {
                    tracing::debug!(remote_id = ?t.header.identifier, "bolus wizard without calculator result");
                    return None;
                }
            },
            WireTreatment::TherapyEvent(t) => Treatment::TherapyEvent(t.to_therapy_event(date)),
            WireTreatment::OfflineEvent(t) => Treatment::OfflineEvent(t.to_offline_event(date)),
            WireTreatment::ExtendedBolus(t) => Treatment::ExtendedBolus(t.to_extended_bolus(date)),
        };
        Some(treatment)
    }
}
