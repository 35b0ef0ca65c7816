//! Contract Test: Sweep Loop & Shutdown
//!
//! The cleanup service runs one cycle immediately, then one per interval,
//! keeps going when a cycle fails, and stops on the shutdown signal.

mod common;

use common::*;
use std::time::Duration;
use zonebeat_core::error::Error;
use zonebeat_core::sweep::Sweeper;
use zonebeat_core::traits::RecordType;

const NOW: i64 = 10_000;

fn sweeper(zone: &std::sync::Arc<FakeZone>, clock: std::sync::Arc<zonebeat_core::FixedClock>) -> Sweeper {
    Sweeper::new(zone.clone(), clock, vec!["s.example.com".to_string()], 900).unwrap()
}

#[tokio::test]
async fn first_cycle_runs_immediately_and_shutdown_is_clean() {
    let zone = FakeZone::new();
    zone.insert("s.example.com", RecordType::A, "10.0.0.4");
    zone.insert("s.example.com", RecordType::Txt, &heartbeat(1));

    let sweeper = sweeper(&zone, clock_at(NOW));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move {
        sweeper
            .run_with_shutdown(Duration::from_secs(3600), shutdown_rx)
            .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(zone.all().is_empty(), "first cycle must not wait for the interval");

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn later_cycles_see_heartbeats_expire() {
    let zone = FakeZone::new();
    zone.insert("s.example.com", RecordType::A, "10.0.0.4");
    zone.insert("s.example.com", RecordType::Txt, &heartbeat(NOW));

    let clock = clock_at(NOW);
    let sweeper = sweeper(&zone, clock.clone());
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move {
        sweeper
            .run_with_shutdown(Duration::from_millis(200), shutdown_rx)
            .await
    });

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(zone.all().len(), 2, "fresh heartbeat must survive");

    clock.advance(3600);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(zone.all().is_empty());

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn failing_cycle_does_not_stop_the_loop() {
    let zone = FakeZone::new();
    zone.fail_zone_listing();

    let sweeper = sweeper(&zone, clock_at(NOW));
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move {
        sweeper
            .run_with_shutdown(Duration::from_millis(50), shutdown_rx)
            .await
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    let listings = zone
        .calls()
        .iter()
        .filter(|c| matches!(c, Call::ListByType { .. }))
        .count();
    assert!(listings >= 2, "expected repeated cycles, got {}", listings);
}

#[tokio::test]
async fn zero_interval_is_rejected() {
    let zone = FakeZone::new();
    let sweeper = sweeper(&zone, clock_at(NOW));
    let (_shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let result = sweeper.run_with_shutdown(Duration::ZERO, shutdown_rx).await;

    assert!(matches!(result, Err(Error::Config(_))));
    assert!(zone.calls().is_empty());
}
