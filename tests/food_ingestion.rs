mod common;

use std::sync::Arc;

use common::{fixture, FailingStaging, Harness};
use glucose_sync_ingest::config::{IngestionOptions, ModeFlags};
use glucose_sync_ingest::ingestion::{IncomingDataProcessor, IngestionSeverity};
use glucose_sync_ingest::wire::{FoodBatch, FoodRecord, WireBatch};
use serde_json::json;

#[test]
fn legacy_fixture_handles_foods_removals_and_other_types() {
    let h = Harness::new(ModeFlags::default());
    let batch: FoodBatch = WireBatch::legacy_from_str(&fixture("legacy_food.json")).unwrap();

    h.processor().process_food(batch);

    let foods = h.staging.snapshot().foods;
    let ids: Vec<_> = foods.iter().filter_map(|f| f.remote_id.as_deref()).collect();
    assert_eq!(ids, vec!["food-1", "food-2", "food-3"]);

    let apple = &foods[0];
    assert_eq!(apple.name, "Apple");
    assert_eq!(apple.category.as_deref(), Some("Fruit"));
    assert_eq!(apple.subcategory.as_deref(), Some("Raw"));
    assert_eq!(apple.portion, 100.0);
    assert_eq!(apple.carbs, 12);
    assert_eq!(apple.energy, Some(218));
    assert_eq!(apple.gi, Some(38));
    assert!(apple.is_valid);

    let rice = &foods[1];
    assert_eq!(rice.portion, 150.0);
    assert_eq!(rice.carbs, 40);
    assert_eq!(rice.unit, "");
    assert!(!rice.is_valid);

    assert!(foods[2].is_tombstone());
    assert!(foods[2].name.is_empty());

    let (_, stats) = h.notifier.successes().pop().unwrap();
    assert_eq!(stats.staged, 3);
    // The quickpick and the record missing its portion.
    assert_eq!(stats.skipped, 2);
}

#[test]
fn removal_replaces_a_previously_staged_food() {
    let h = Harness::new(ModeFlags::default());
    let p = h.processor();
    p.process_food(WireBatch::Legacy(vec![json!({
        "_id": "f1", "type": "food", "name": "Bread", "portion": 50, "carbs": 25
    })]));
    p.process_food(WireBatch::Legacy(vec![json!({"_id": "f1", "type": "food", "action": "remove"})]));

    let foods = h.staging.snapshot().foods;
    assert_eq!(foods.len(), 1);
    assert!(foods[0].is_tombstone());
    assert_eq!(foods[0].remote_id.as_deref(), Some("f1"));
}

#[test]
fn removal_without_id_is_dropped() {
    let h = Harness::new(ModeFlags::default());

    h.processor().process_food(WireBatch::Legacy(vec![
        json!({"type": "food", "action": "remove"}),
        json!({"_id": "f2", "type": "food", "action": "remove"}),
    ]));

    let foods = h.staging.snapshot().foods;
    assert_eq!(foods.len(), 1);
    assert_eq!(foods[0].remote_id.as_deref(), Some("f2"));
    let (_, stats) = h.notifier.successes().pop().unwrap();
    assert_eq!(stats.staged, 1);
    assert_eq!(stats.skipped, 1);
}

#[test]
fn typed_foods_map_directly() {
    let h = Harness::new(ModeFlags::default());
    let record = FoodRecord {
        name: "Banana".to_string(),
        category: Some("Fruit".to_string()),
        sub_category: None,
        portion: 120.0,
        unit: "g".to_string(),
        carbs: 27,
        fat: None,
        protein: Some(1),
        energy: None,
        gi: Some(51),
        is_valid: true,
        identifier: Some("banana".to_string()),
    };

    h.processor().process_food(WireBatch::Typed(vec![record]));

    let foods = h.staging.snapshot().foods;
    assert_eq!(foods.len(), 1);
    assert_eq!(foods[0].name, "Banana");
    assert_eq!(foods[0].protein, Some(1));
    assert_eq!(foods[0].remote_id.as_deref(), Some("banana"));
}

#[test]
fn non_object_legacy_record_aborts_the_batch() {
    let h = Harness::new(ModeFlags::default());
    let batch = WireBatch::Legacy(vec![
        json!({"_id": "f1", "type": "food", "name": "Bread", "portion": 50, "carbs": 25}),
        json!(42),
    ]);

    h.processor().process_food(batch);

    assert!(h.staging.snapshot().foods.is_empty());
    let diagnostics = h.notifier.diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert!(diagnostics[0].1.contains("food record is not a json object"));
    assert_eq!(h.notifier.failures(), vec![IngestionSeverity::Error]);
    assert!(h.notifier.alerts().is_empty());
}

#[test]
fn staging_failure_is_contained() {
    let h = Harness::new(ModeFlags::default());
    let staging = Arc::new(FailingStaging::accepting(0));
    let p = IncomingDataProcessor::new(h.collaborators_with_staging(staging.clone()), IngestionOptions::default());

    p.process_food(WireBatch::Legacy(vec![json!({"_id": "f1", "type": "food", "action": "remove"})]));

    assert!(staging.inner.snapshot().foods.is_empty());
    assert_eq!(h.notifier.failures(), vec![IngestionSeverity::Critical]);
    assert!(h.notifier.diagnostics()[0].1.contains("staging failed for foods"));
}

#[test]
fn batch_without_foods_stages_nothing() {
    let h = Harness::new(ModeFlags::default());
    let staging = Arc::new(FailingStaging::accepting(0));
    let p = IncomingDataProcessor::new(h.collaborators_with_staging(staging), IngestionOptions::default());

    p.process_food(WireBatch::Legacy(vec![json!({"_id": "q", "type": "quickpick"})]));

    assert!(h.notifier.failures().is_empty());
    assert_eq!(h.notifier.successes().len(), 1);
}
