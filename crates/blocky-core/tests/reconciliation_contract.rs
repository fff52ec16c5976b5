//! Architectural Contract Test: Membership Reconciliation
//!
//! Constraints verified:
//! - When resolution results drift, exactly the missing members are
//!   added and exactly the stale ones removed
//! - Addresses that stay resolved are never removed and re-added
//!
//! If this test fails, the set is being rebuilt instead of reconciled,
//! which opens windows where live entries are briefly unblocked.

mod common;

use blocky_core::BlockyEngine;
use common::*;
use std::time::Duration;

#[tokio::test]
async fn drifting_resolution_adds_and_removes_exactly_the_difference() {
    let resolver = ScriptedResolver::new()
        .with_domain("youtube.com", &["142.250.0.1", "142.250.0.2"]);
    let firewall = MockFirewall::new();

    let (engine, _event_rx) = BlockyEngine::new(
        Box::new(resolver.clone()),
        Box::new(firewall.clone()),
        vec!["youtube.com".to_string()],
        Vec::new(),
        fast_engine_config(),
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    // Let the initial membership settle, then drift the answer
    tokio::time::sleep(Duration::from_millis(80)).await;
    resolver.set_addresses("youtube.com", &["142.250.0.2", "142.250.0.3"]);
    tokio::time::sleep(Duration::from_millis(80)).await;

    let members = firewall.members();
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    let expected: std::collections::BTreeSet<_> =
        [ip("142.250.0.2"), ip("142.250.0.3")].into_iter().collect();
    assert_eq!(members, expected);

    // 142.250.0.1 went stale and was removed; 142.250.0.2 stayed put
    assert_eq!(firewall.removed_log(), vec![ip("142.250.0.1")]);
    let adds = firewall.added_log();
    assert_eq!(
        adds.iter().filter(|a| **a == ip("142.250.0.2")).count(),
        1,
        "a surviving member must not be re-added"
    );
}

#[tokio::test]
async fn sync_failure_is_retried_on_the_next_cycle() {
    let resolver = ScriptedResolver::new().with_domain("youtube.com", &["142.250.0.1"]);
    let firewall = MockFirewall::new();
    firewall.fail_next_lists(1);

    let (engine, mut event_rx) = BlockyEngine::new(
        Box::new(resolver.clone()),
        Box::new(firewall.clone()),
        vec!["youtube.com".to_string()],
        Vec::new(),
        fast_engine_config(),
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(120)).await;
    let members = firewall.members();
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    // First cycle failed, a later one converged anyway
    assert!(members.contains(&ip("142.250.0.1")));

    let mut saw_sync_failure = false;
    while let Ok(event) = event_rx.try_recv() {
        if let blocky_core::EngineEvent::SyncFailed { .. } = event {
            saw_sync_failure = true;
        }
    }
    assert!(saw_sync_failure, "expected a SyncFailed event for the first cycle");
}
