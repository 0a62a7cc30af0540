mod common;

use std::sync::Arc;

use common::{fixture, FailingStaging, Harness, NOW};
use glucose_sync_ingest::config::{IngestionOptions, ModeFlags, SettingKey};
use glucose_sync_ingest::ingestion::{AlarmKind, IncomingDataProcessor, IngestionSeverity};
use glucose_sync_ingest::types::{SourceSensor, TrendArrow};
use glucose_sync_ingest::wire::{ReadingBatch, SgvRecord, WireBatch};
use serde_json::json;

fn cgm_enabled() -> Harness {
    let h = Harness::new(ModeFlags::default());
    h.settings.set_bool(SettingKey::ReceiveCgm, true);
    h
}

fn sgv(date: i64, value: f64, id: &str) -> SgvRecord {
    SgvRecord {
        date,
        sgv: value,
        filtered: None,
        noise: None,
        direction: Some("Flat".to_string()),
        device: Some("G6 Native".to_string()),
        identifier: Some(id.to_string()),
    }
}

#[test]
fn fresh_reading_is_staged_and_dismisses_alarms() {
    let h = cgm_enabled();
    let batch = WireBatch::Legacy(vec![
        json!({"date": NOW - 60_000, "sgv": 120}),
        json!({"date": NOW - 600_000, "sgv": "bad"}),
    ]);

    assert!(h.processor().process_readings(batch));

    let staged = h.staging.snapshot().glucose_values;
    assert_eq!(staged.len(), 1);
    assert_eq!(staged[0].timestamp, NOW - 60_000);
    assert_eq!(staged[0].value, 120.0);
    assert_eq!(h.session.latest_reading(), NOW - 60_000);
    assert_eq!(
        h.notifier.dismissed_alarms(),
        vec![AlarmKind::RemoteAlarm, AlarmKind::RemoteUrgentAlarm]
    );
}

#[test]
fn disabled_reading_sync_has_no_side_effects() {
    let h = Harness::new(ModeFlags::default());
    let batch = WireBatch::Typed(vec![sgv(NOW - 60_000, 100.0, "a")]);

    assert!(!h.processor().process_readings(batch));

    assert!(h.staging.snapshot().is_empty());
    assert_eq!(h.session.latest_reading(), 0);
    assert!(h.notifier.notifications().is_empty());
    assert!(h.notifier.successes().is_empty());
}

#[test]
fn remote_source_enables_reading_sync_without_setting() {
    let h = Harness::new(ModeFlags {
        remote_reading_source: true,
        ..Default::default()
    });
    let batch = WireBatch::Typed(vec![sgv(NOW - 60_000, 100.0, "a")]);
    assert!(h.processor().process_readings(batch));
    assert_eq!(h.staging.snapshot().glucose_values.len(), 1);
}

#[test]
fn old_readings_advance_watermark_without_dismissing_alarms() {
    let h = cgm_enabled();
    let batch = WireBatch::Typed(vec![sgv(NOW - 3_600_000, 100.0, "a"), sgv(NOW - 1_800_000, 110.0, "b")]);

    assert!(h.processor().process_readings(batch));

    assert_eq!(h.session.latest_reading(), NOW - 1_800_000);
    assert!(h.notifier.dismissed_alarms().is_empty());
    assert_eq!(h.staging.snapshot().glucose_values.len(), 2);
}

#[test]
fn readings_from_the_future_never_count_towards_the_watermark() {
    let h = cgm_enabled();
    let only_future = WireBatch::Typed(vec![sgv(NOW + 60_000, 100.0, "f")]);
    assert!(!h.processor().process_readings(only_future));
    assert!(h.staging.snapshot().is_empty());
    assert_eq!(h.session.latest_reading(), 0);

    let mixed = WireBatch::Typed(vec![sgv(NOW + 60_000, 100.0, "f"), sgv(NOW - 60_000, 105.0, "p")]);
    assert!(h.processor().process_readings(mixed));
    assert_eq!(h.session.latest_reading(), NOW - 60_000);
    assert_eq!(h.staging.snapshot().glucose_values.len(), 2);
}

#[test]
fn stale_redelivery_never_moves_the_watermark_backwards() {
    let h = cgm_enabled();
    let p = h.processor();
    assert!(p.process_readings(WireBatch::Typed(vec![sgv(NOW - 60_000, 100.0, "new")])));
    assert!(p.process_readings(WireBatch::Typed(vec![sgv(NOW - 900_000, 90.0, "old")])));

    assert_eq!(h.session.latest_reading(), NOW - 60_000);
}

#[test]
fn redelivered_readings_upsert_by_remote_id() {
    let h = cgm_enabled();
    let p = h.processor();
    p.process_readings(WireBatch::Typed(vec![sgv(NOW - 60_000, 100.0, "a")]));
    p.process_readings(WireBatch::Typed(vec![sgv(NOW - 60_000, 101.0, "a")]));

    let staged = h.staging.snapshot().glucose_values;
    assert_eq!(staged.len(), 1);
    assert_eq!(staged[0].value, 101.0);
}

#[test]
fn legacy_fixture_is_normalized_leniently() {
    let h = cgm_enabled();
    let batch: ReadingBatch = WireBatch::legacy_from_str(&fixture("legacy_sgvs.json")).unwrap();
    assert_eq!(batch.len(), 5);

    assert!(h.processor().process_readings(batch));

    let staged = h.staging.snapshot().glucose_values;
    let ids: Vec<_> = staged.iter().filter_map(|g| g.remote_id.as_deref()).collect();
    assert_eq!(ids, vec!["sgv-1", "sgv-2", "sgv-5"]);

    assert_eq!(staged[0].raw, Some(121_000.0));
    assert_eq!(staged[0].trend_arrow, TrendArrow::Flat);
    assert_eq!(staged[0].source_sensor, SourceSensor::DexcomG6Native);
    assert_eq!(staged[1].value, 118.0);
    assert_eq!(staged[1].trend_arrow, TrendArrow::FortyFiveDown);
    assert_eq!(staged[1].source_sensor, SourceSensor::Unknown);

    // sgv-5 lies in the future relative to the fixed clock.
    assert_eq!(h.session.latest_reading(), 1_699_999_940_000);
    assert_eq!(h.notifier.dismissed_alarms().len(), 2);

    let (_, stats) = h.notifier.successes().pop().unwrap();
    assert_eq!(stats.staged, 3);
    assert_eq!(stats.skipped, 2);
}

#[test]
fn staging_failure_is_reported_and_returns_false() {
    let h = cgm_enabled();
    let staging = Arc::new(FailingStaging::accepting(0));
    let p = IncomingDataProcessor::new(h.collaborators_with_staging(staging.clone()), IngestionOptions::default());

    assert!(!p.process_readings(WireBatch::Typed(vec![sgv(NOW - 60_000, 100.0, "a")])));

    assert!(staging.inner.snapshot().is_empty());
    assert_eq!(h.session.latest_reading(), 0);
    assert!(h.notifier.dismissed_alarms().is_empty());
    let diagnostics = h.notifier.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].0, "◄ ERROR");
    assert!(diagnostics[0].1.contains("database is closed"));
    assert_eq!(h.notifier.failures(), vec![IngestionSeverity::Critical]);
    assert_eq!(h.notifier.alerts(), vec![IngestionSeverity::Critical]);
}

#[test]
fn readings_are_staged_without_an_active_session() {
    let h = cgm_enabled();
    let mut collaborators = h.collaborators();
    collaborators.session = None;
    let p = IncomingDataProcessor::new(collaborators, IngestionOptions::default());

    assert!(p.process_readings(WireBatch::Typed(vec![sgv(NOW - 60_000, 100.0, "a")])));
    assert_eq!(h.staging.snapshot().glucose_values.len(), 1);
    assert_eq!(h.session.latest_reading(), 0);
}

#[test]
fn fresh_window_is_configurable() {
    let h = cgm_enabled();
    let opts = IngestionOptions {
        fresh_reading_window_ms: 30_000,
        ..Default::default()
    };
    let p = IncomingDataProcessor::new(h.collaborators(), opts);

    assert!(p.process_readings(WireBatch::Typed(vec![sgv(NOW - 60_000, 100.0, "a")])));
    assert!(h.notifier.dismissed_alarms().is_empty());
}
