//! Remote profile store snapshots.
//!
//! A snapshot replaces the active profile store when it was created after the last local
//! profile edit. Snapshots stamped on a whole second are accepted regardless of local edits.

use serde_json::Value;

use crate::config::{IngestionOptions, SettingKey};
use crate::error::IngestionResult;

use super::observability::{BatchCategory, IngestionContext, IngestionStats, WireShape};
use super::{report_batch, Collaborators};

#[derive(Debug, Clone)]
pub struct ProfileIngestor {
    collaborators: Collaborators,
    options: IngestionOptions,
}

/// Whether a snapshot created at `created_at` may replace local edits made at `last_local_change`.
pub fn snapshot_is_acceptable(created_at: i64, last_local_change: i64) -> bool {
    created_at > last_local_change || created_at % 1000 == 0
}

impl ProfileIngestor {
    pub fn new(collaborators: Collaborators, options: IngestionOptions) -> Self {
        Self {
            collaborators,
            options,
        }
    }

    /// Profile sync is on when `receive_profile_store` (default on) is set or in client-only mode.
    pub fn enabled(&self) -> bool {
        self.collaborators.settings.get_bool(SettingKey::ReceiveProfileStore, true)
            || self.collaborators.mode.client_only_mode()
    }

    /// Ingest a raw profile store snapshot.
    pub fn process(&self, raw: &Value) {
        if !self.enabled() {
            tracing::debug!("profile sync disabled, snapshot ignored");
            return;
        }

        let ctx = IngestionContext {
            category: BatchCategory::Profile,
            shape: WireShape::Legacy,
            records: 1,
        };
        let result = self.ingest(raw);
        report_batch(&self.collaborators, &self.options, &ctx, &result);
    }

    fn ingest(&self, raw: &Value) -> IngestionResult<IngestionStats> {
        let store = self.collaborators.profiles.build(raw)?;
        let created_at = store.start_date();
        let last_local_change = self
            .collaborators
            .settings
            .get_long(SettingKey::LocalProfileLastChange, 0);

        if !snapshot_is_acceptable(created_at, last_local_change) {
            tracing::debug!(created_at, last_local_change, "profile snapshot older than local edits, ignored");
            return Ok(IngestionStats {
                staged: 0,
                skipped: 1,
                latest: created_at,
            });
        }

        tracing::debug!(
            created_at,
            last_local_change,
            default_profile = ?store.default_profile_name(),
            "profile snapshot accepted"
        );
        self.collaborators.profile_source.load_from_store(store);
        if let Some(session) = &self.collaborators.session {
            session.profile_received(created_at);
        }
        Ok(IngestionStats {
            staged: 1,
            skipped: 0,
            latest: created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acceptance_rule() {
        assert!(snapshot_is_acceptable(2001, 2000));
        assert!(!snapshot_is_acceptable(1999, 2000));
        assert!(!snapshot_is_acceptable(2500, 2500));
        assert!(snapshot_is_acceptable(1000, 5000));
        assert!(!snapshot_is_acceptable(1001, 5000));
        // No creation stamp at all reads as 0.
        assert!(snapshot_is_acceptable(0, 5000));
    }
}
