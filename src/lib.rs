//! `glucose-sync-ingest` reconciles batches fetched from a remote diabetes-tracking store into a
//! local staging buffer.
//!
//! The primary entrypoint is [`ingestion::IncomingDataProcessor`], which handles four record
//! categories:
//!
//! - **Glucose readings**: normalized, staged, reading watermark advanced, stale-data alarms
//!   dismissed when the newest reading is fresh
//! - **Treatments**: ten kinds (boluses, carbs, temporary targets, ...), each gated by user
//!   settings and the operating mode, treatment watermark advanced
//! - **Food catalog entries**: including removals, staged as tombstones
//! - **Profile store snapshots**: activated only when newer than the last local profile edit
//!
//! ## Wire shapes
//!
//! Batches arrive either as untyped JSON records from the legacy client or as pre-typed records
//! from the current client. Both are expressed as [`wire::WireBatch`]:
//!
//! ```rust
//! use glucose_sync_ingest::wire::{ReadingBatch, SgvRecord, WireBatch};
//!
//! let legacy: ReadingBatch = WireBatch::legacy_from_str(r#"[{"mills": 1000, "mgdl": "110"}]"#).unwrap();
//! let typed: ReadingBatch = WireBatch::Typed(vec![SgvRecord {
//!     date: 1000,
//!     sgv: 110.0,
//!     filtered: None,
//!     noise: None,
//!     direction: Some("Flat".to_string()),
//!     device: None,
//!     identifier: Some("r1".to_string()),
//! }]);
//! assert_eq!(legacy.len(), typed.len());
//! ```
//!
//! ## Collaborators
//!
//! Everything outside the pipeline is injected through [`ingestion::Collaborators`]: settings
//! ([`config::Settings`]), operating mode ([`config::RuntimeMode`]), the staging buffer
//! ([`staging::StagingBuffer`]), the optional sync session ([`session::SyncSession`]), the
//! notification bus ([`ingestion::Notifier`]), profile construction and lookup
//! ([`profile::ProfileStoreFactory`], [`profile::ProfileSource`]) and a [`time::Clock`].
//! In-memory implementations of each are provided.
//!
//! ## Failure handling
//!
//! - malformed records are dropped with a trace/debug line
//! - a failing batch (e.g. the staging buffer refusing a write) is aborted, logged, written to the
//!   sync log as a diagnostic, and reported as `false` where the operation returns a flag
//! - nothing already staged is rolled back
//!
//! ## Modules
//!
//! - [`ingestion`]: ingestors, the processor facade and notifiers
//! - [`admission`]: treatment admission policy
//! - [`wire`]: wire shapes and normalizers
//! - [`types`]: canonical records
//! - [`profile`]: profile model and profile store
//! - [`config`], [`staging`], [`session`], [`time`]: collaborator interfaces
//! - [`error`]: error types used across ingestion

pub mod admission;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod profile;
pub mod session;
pub mod staging;
pub mod time;
pub mod types;
pub mod wire;

pub use error::{IngestionError, IngestionResult};
pub use ingestion::{Collaborators, IncomingDataProcessor};
