//! Wire shapes delivered by the transport layer.
//!
//! The remote store reaches us through two clients that emit structurally different batches:
//!
//! - the legacy client hands over untyped JSON records ([`WireBatch::Legacy`]), normalized with
//!   the lenient extractors in [`legacy`]
//! - the current client hands over records already decoded into the types in [`typed`]
//!   ([`WireBatch::Typed`]), normalized with direct mappers
//!
//! The shape is resolved once at the ingestor entry point by matching on [`WireBatch`].

pub mod legacy;
pub mod typed;

use serde_json::Value;

use crate::error::{IngestionError, IngestionResult};

pub use typed::{
    FoodRecord, SgvRecord, TreatmentHeader, WireBolus, WireBolusWizard, WireCarbs, WireEffectiveProfileSwitch,
    WireExtendedBolus, WireOfflineEvent, WireProfileSwitch, WireTemporaryBasal, WireTemporaryTarget,
    WireTherapyEvent, WireTreatment,
};

/// A batch in one of the two wire shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum WireBatch<T> {
    /// Untyped records from the legacy client.
    Legacy(Vec<Value>),
    /// Pre-typed records from the current client.
    Typed(Vec<T>),
}

impl<T> WireBatch<T> {
    /// Build a legacy batch from JSON text (see [`parse_legacy_batch`]).
    pub fn legacy_from_str(input: &str) -> IngestionResult<Self> {
        parse_legacy_batch(input).map(Self::Legacy)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Legacy(records) => records.len(),
            Self::Typed(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Glucose readings in either wire shape.
pub type ReadingBatch = WireBatch<SgvRecord>;

/// Food catalog entries in either wire shape.
pub type FoodBatch = WireBatch<FoodRecord>;

/// Parse legacy batch text into individual records.
///
/// Accepted inputs:
/// - a JSON array: `[{"sgv":120}, {"sgv":121}]`
/// - a single JSON object, treated as a one-record batch
/// - newline-delimited JSON (NDJSON)
pub fn parse_legacy_batch(input: &str) -> IngestionResult<Vec<Value>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(IngestionError::schema("legacy batch is empty"));
    }

    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        match v {
            Value::Array(items) => Ok(items),
            Value::Object(_) => Ok(vec![v]),
            _ => Err(IngestionError::schema(
                "legacy batch must be an object, an array of objects, or NDJSON",
            )),
        }
    } else {
        let mut values = Vec::new();
        for (i, line) in trimmed.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let v = serde_json::from_str::<Value>(line)
                .map_err(|e| IngestionError::schema(format!("invalid ndjson at line {}: {}", i + 1, e)))?;
            values.push(v);
        }
        Ok(values)
    }
}
