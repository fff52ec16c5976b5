//! Architectural Contract Test: Partial Resolution Failure
//!
//! Constraints verified:
//! - A domain that fails to resolve is reported and skipped
//! - The same cycle still synchronizes the domains that did resolve
//! - The engine keeps running across resolution failures
//!
//! If this test fails, one dead domain can blank the whole blocklist.

mod common;

use blocky_core::{BlockyEngine, EngineEvent};
use common::*;
use std::time::Duration;

#[tokio::test]
async fn failing_domain_does_not_abort_the_cycle() {
    let resolver = ScriptedResolver::new()
        .with_domain("youtube.com", &["142.250.0.1"])
        .with_failure("broken.example");
    let firewall = MockFirewall::new();

    let (engine, mut event_rx) = BlockyEngine::new(
        Box::new(resolver.clone()),
        Box::new(firewall.clone()),
        vec!["youtube.com".to_string(), "broken.example".to_string()],
        Vec::new(),
        fast_engine_config(),
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let members = firewall.members();
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    // The healthy domain's address was synchronized
    assert!(members.contains(&ip("142.250.0.1")));

    // The broken domain was reported, and the engine completed cycles anyway
    let mut saw_resolution_failure = false;
    let mut saw_completed_cycle = false;
    while let Ok(event) = event_rx.try_recv() {
        match event {
            EngineEvent::ResolutionFailed { domain, .. } => {
                assert_eq!(domain, "broken.example");
                saw_resolution_failure = true;
            }
            EngineEvent::CycleCompleted { blocked, .. } => {
                assert_eq!(blocked, 1);
                saw_completed_cycle = true;
            }
            _ => {}
        }
    }
    assert!(saw_resolution_failure, "expected a ResolutionFailed event");
    assert!(saw_completed_cycle, "expected completed cycles despite the failure");
}
