//! Architectural Contract Test: Whitelist Filtering
//!
//! Constraints verified:
//! - A whitelisted address never reaches the firewall backend, even
//!   when a blocked domain resolves to it
//!
//! If this test fails, blocky can cut the host off from its own
//! gateway or DNS.

mod common;

use blocky_core::BlockyEngine;
use common::*;
use std::time::Duration;

#[tokio::test]
async fn whitelisted_addresses_never_enter_the_set() {
    let resolver = ScriptedResolver::new()
        .with_domain("youtube.com", &["142.250.0.1", "10.0.0.1"]);
    let firewall = MockFirewall::new();

    let (engine, _event_rx) = BlockyEngine::new(
        Box::new(resolver.clone()),
        Box::new(firewall.clone()),
        vec!["youtube.com".to_string()],
        vec![ip("10.0.0.1")],
        fast_engine_config(),
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let handle = tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let members = firewall.members();
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();

    assert_eq!(members.into_iter().collect::<Vec<_>>(), vec![ip("142.250.0.1")]);
    assert!(
        !firewall.added_log().contains(&ip("10.0.0.1")),
        "whitelisted address was passed to the backend"
    );
}
