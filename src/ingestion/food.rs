//! Food catalog ingestion.

use crate::config::IngestionOptions;
use crate::error::{IngestionError, IngestionResult};
use crate::types::Food;
use crate::wire::{legacy, FoodBatch, WireBatch};

use super::observability::{BatchCategory, IngestionContext, IngestionStats};
use super::{report_batch, shape_of, Collaborators};

#[derive(Debug, Clone)]
pub struct FoodIngestor {
    collaborators: Collaborators,
    options: IngestionOptions,
}

impl FoodIngestor {
    pub fn new(collaborators: Collaborators, options: IngestionOptions) -> Self {
        Self {
            collaborators,
            options,
        }
    }

    /// Ingest a batch of food entries.
    ///
    /// Legacy records other than `type == "food"` are ignored; `action == "remove"` becomes a
    /// tombstone for the record's `_id`; removals without one are dropped. Everything produced
    /// is staged as one batch.
    pub fn process(&self, batch: FoodBatch) {
        let ctx = IngestionContext {
            category: BatchCategory::Food,
            shape: shape_of(&batch),
            records: batch.len(),
        };
        tracing::debug!(count = ctx.records, shape = ?ctx.shape, "food received");

        let result = self.ingest(batch);
        report_batch(&self.collaborators, &self.options, &ctx, &result);
    }

    fn ingest(&self, batch: FoodBatch) -> IngestionResult<IngestionStats> {
        let mut stats = IngestionStats::default();
        let foods = match batch {
            WireBatch::Legacy(records) => {
                let mut foods = Vec::new();
                for record in &records {
                    let obj = record
                        .as_object()
                        .ok_or_else(|| IngestionError::schema(format!("food record is not a json object: {record}")))?;
                    if legacy::record_type(obj) != Some("food") {
                        stats.skipped += 1;
                        continue;
                    }
                    if legacy::record_action(obj) == Some("remove") {
                        match legacy::string(obj, "_id") {
                            Some(id) => foods.push(Food::tombstone(id)),
                            None => {
                                stats.skipped += 1;
                                tracing::debug!(%record, "food removal without _id dropped");
                            }
                        }
                        continue;
                    }
                    match legacy::food(obj) {
                        Some(food) => foods.push(food),
                        None => {
                            stats.skipped += 1;
                            tracing::error!(%record, "error parsing food");
                        }
                    }
                }
                foods
            }
            WireBatch::Typed(records) => records.iter().map(|r| r.to_food()).collect(),
        };

        stats.staged = foods.len();
        if !foods.is_empty() {
            self.collaborators.staging.stage_foods(foods)?;
        }
        Ok(stats)
    }
}
