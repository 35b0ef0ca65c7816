//! Contract Test: Single-value Upsert & Idempotency
//!
//! The upsert path runs on every reconciliation, so it must not write when
//! nothing changed, and it must survive losing a create race.
//!
//! Constraints verified:
//! - Same content twice ⇒ at most one provider write
//! - AlreadyExists on create ⇒ exactly one update, reported as success
//! - AlreadyExists with nothing to update ⇒ reported failure, no update
//! - Heartbeat refreshes never overwrite unrelated TXT records

mod common;

use common::*;
use zonebeat_core::reconcile::{Operation, Reconciler};
use zonebeat_core::traits::RecordType;

const NOW: i64 = 1_700_000_000;

#[tokio::test]
async fn matching_record_is_a_no_op() {
    let zone = FakeZone::new();
    zone.insert("example.test", RecordType::A, "10.0.0.5");

    let reconciler = Reconciler::new(zone.clone(), clock_at(NOW));
    let change = reconciler
        .upsert("example.test", RecordType::A, "10.0.0.5", false)
        .await;

    assert!(change.succeeded());
    assert_eq!(change.operation, Operation::Keep);
    assert_eq!(zone.write_count(), 0);
}

#[tokio::test]
async fn repeated_upsert_writes_once() {
    let zone = FakeZone::new();
    zone.insert("example.test", RecordType::A, "10.0.0.5");
    let reconciler = Reconciler::new(zone.clone(), clock_at(NOW));

    let first = reconciler
        .upsert("example.test", RecordType::A, "10.0.0.9", false)
        .await;
    let second = reconciler
        .upsert("example.test", RecordType::A, "10.0.0.9", false)
        .await;

    assert_eq!(first.operation, Operation::Update);
    assert_eq!(second.operation, Operation::Keep);
    assert_eq!(zone.write_count(), 1);
    assert_eq!(zone.contents("example.test", RecordType::A), vec!["10.0.0.9"]);
}

#[tokio::test]
async fn absent_record_is_created() {
    let zone = FakeZone::new();
    let reconciler = Reconciler::new(zone.clone(), clock_at(NOW));

    let change = reconciler
        .upsert("example.com", RecordType::Cname, "all.example.com", false)
        .await;

    assert_eq!(change.operation, Operation::Create);
    assert_eq!(
        zone.contents("example.com", RecordType::Cname),
        vec!["all.example.com"]
    );
}

#[tokio::test]
async fn already_exists_falls_back_to_exactly_one_update() {
    let zone = FakeZone::new();
    zone.race_on_create("e.example.com", RecordType::A, "203.0.113.1");

    let reconciler = Reconciler::new(zone.clone(), clock_at(NOW));
    let change = reconciler
        .upsert("e.example.com", RecordType::A, "203.0.113.9", false)
        .await;

    assert!(change.succeeded(), "fallback must succeed: {:?}", change);
    assert_eq!(change.operation, Operation::Update);
    assert_eq!(zone.update_count(), 1);
    assert_eq!(
        zone.calls().last(),
        Some(&Call::Update {
            id: "rec-0".to_string(),
            content: "203.0.113.9".to_string(),
        })
    );
    assert_eq!(zone.contents("e.example.com", RecordType::A), vec!["203.0.113.9"]);
}

#[tokio::test]
async fn already_exists_without_record_is_a_failure() {
    let zone = FakeZone::new();
    zone.phantom_on_create("e.example.com", RecordType::A);

    let reconciler = Reconciler::new(zone.clone(), clock_at(NOW));
    let change = reconciler
        .upsert("e.example.com", RecordType::A, "203.0.113.9", false)
        .await;

    assert!(!change.succeeded());
    assert_eq!(zone.update_count(), 0);
    assert_eq!(zone.create_count(), 1, "no retry at this layer");
}

#[tokio::test]
async fn ensure_exists_treats_already_exists_as_present() {
    let zone = FakeZone::new();
    zone.race_on_create("i.example.com", RecordType::A, "10.0.0.7");

    let reconciler = Reconciler::new(zone.clone(), clock_at(NOW));
    let changes = reconciler
        .reconcile("i.example.com", RecordType::A, &desired(&["10.0.0.7"]), false)
        .await;

    assert!(changes.is_success());
    assert_eq!(zone.update_count(), 0);
    assert_eq!(zone.contents("i.example.com", RecordType::A), vec!["10.0.0.7"]);
}

#[tokio::test]
async fn heartbeat_refresh_leaves_other_txt_alone() {
    let zone = FakeZone::new();
    zone.insert("example.com", RecordType::Txt, "\"v=spf1 -all\"");

    let reconciler = Reconciler::new(zone.clone(), clock_at(NOW));
    let change = reconciler.upsert_heartbeat("example.com").await;

    assert_eq!(change.operation, Operation::Create);
    assert_eq!(
        zone.contents("example.com", RecordType::Txt),
        vec![heartbeat(NOW), "\"v=spf1 -all\"".to_string()]
    );
}

#[tokio::test]
async fn heartbeat_refresh_updates_in_place() {
    let zone = FakeZone::new();
    let id = zone.insert("example.com", RecordType::Txt, &heartbeat(NOW - 300));

    let reconciler = Reconciler::new(zone.clone(), clock_at(NOW));
    let change = reconciler.upsert_heartbeat("example.com").await;

    assert_eq!(change.operation, Operation::Update);
    assert!(zone.contains_id(&id));
    assert_eq!(
        zone.contents("example.com", RecordType::Txt),
        vec![heartbeat(NOW)]
    );
}

#[tokio::test]
async fn owner_id_is_embedded_in_heartbeat() {
    let zone = FakeZone::new();
    let reconciler =
        Reconciler::new(zone.clone(), clock_at(NOW)).with_owner_id(Some("web-3".to_string()));

    reconciler.upsert_heartbeat("example.com").await;

    assert_eq!(
        zone.contents("example.com", RecordType::Txt),
        vec![format!("\"{},web-3\"", NOW)]
    );
}
