//! Contract Test: Partial Failure Isolation
//!
//! A failure while reconciling one name must not abort the run. The report
//! counts it, the other names still converge, and the run as a whole is
//! marked unsuccessful.

mod common;

use common::*;
use std::net::IpAddr;
use zonebeat_core::config::NamesConfig;
use zonebeat_core::plan::{Discovered, SyncPlan};
use zonebeat_core::reconcile::Reconciler;
use zonebeat_core::traits::RecordType;

const NOW: i64 = 1_700_000_000;

fn ip(raw: &str) -> IpAddr {
    raw.parse().unwrap()
}

fn names() -> NamesConfig {
    NamesConfig {
        internal: Some("a.example.com".to_string()),
        external: Some("b.example.com".to_string()),
        ..NamesConfig::default()
    }
}

fn discovered() -> Discovered {
    Discovered {
        internal: vec![ip("10.0.0.1")],
        external_v4: Some(ip("203.0.113.5")),
        external_v6: None,
    }
}

#[tokio::test]
async fn failing_name_does_not_block_others() {
    let zone = FakeZone::new();
    zone.fail_name("a.example.com");

    let reconciler = Reconciler::new(zone.clone(), clock_at(NOW));
    let plan = SyncPlan::build(&names(), &discovered(), false);
    let report = reconciler.run_plan(&plan).await;

    assert!(!report.is_success());
    assert!(report.succeeded() < report.total());
    assert!(report.failed() > 0);

    assert_eq!(zone.contents("b.example.com", RecordType::A), vec!["203.0.113.5"]);
    assert_eq!(
        zone.contents("b.example.com", RecordType::Txt),
        vec![heartbeat(NOW)]
    );

    let b = report.changes_for("b.example.com").unwrap();
    assert!(b.is_success());
    let a = report.changes_for("a.example.com").unwrap();
    assert!(!a.is_success());
}

#[tokio::test]
async fn clean_run_is_a_success() {
    let zone = FakeZone::new();

    let reconciler = Reconciler::new(zone.clone(), clock_at(NOW));
    let plan = SyncPlan::build(&names(), &discovered(), false);
    let report = reconciler.run_plan(&plan).await;

    assert!(report.is_success());
    assert_eq!(report.succeeded(), report.total());
    assert_eq!(report.summary().created, 4);
}

#[tokio::test]
async fn run_without_operations_is_not_a_success() {
    let zone = FakeZone::new();

    let reconciler = Reconciler::new(zone.clone(), clock_at(NOW));
    let report = reconciler.run_plan(&SyncPlan::default()).await;

    assert_eq!(report.total(), 0);
    assert!(!report.is_success());
}

#[tokio::test]
async fn vanished_external_address_removes_record() {
    let zone = FakeZone::new();
    zone.insert("b.example.com", RecordType::A, "203.0.113.5");
    zone.insert("b.example.com", RecordType::Txt, &heartbeat(NOW - 600));

    let reconciler = Reconciler::new(zone.clone(), clock_at(NOW));
    let gone = Discovered {
        internal: vec![ip("10.0.0.1")],
        external_v4: None,
        external_v6: None,
    };
    let report = reconciler
        .run_plan(&SyncPlan::build(&names(), &gone, false))
        .await;

    assert!(report.is_success());
    assert!(zone.contents("b.example.com", RecordType::A).is_empty());
    assert!(zone.contents("b.example.com", RecordType::Txt).is_empty());
}
