// # blocky-core
//
// Core library for the blocky domain-blocklist system.
//
// ## Architecture Overview
//
// This library provides the core functionality for keeping a firewall
// set in step with the addresses a list of domains resolves to:
// - **DomainResolver**: Trait for resolving hostnames to addresses
// - **FirewallBackend**: Trait for the address set and its rule
// - **BlockyEngine**: Core engine driving the resolve → filter →
//   synchronize cycle on a fixed interval
// - **BlockyConfig**: INI-backed configuration with validation
//
// ## Design Principles
//
// 1. **Separation of Concerns**: the engine owns scheduling, retry and
//    decisions; backends execute single operations
// 2. **Idempotency**: an unchanged resolution result causes no firewall
//    mutations; set and rule creation are safe to repeat
// 3. **Partial-failure tolerance**: one unresolvable domain never stops
//    a cycle, one failed cycle never stops the process
// 4. **Library-First**: the daemon is a thin wiring layer over this crate

pub mod config;
pub mod domains;
pub mod engine;
pub mod error;
pub mod filter;
pub mod sync;
pub mod traits;

// Re-export core types for convenience
pub use config::{BlockyConfig, EngineConfig, LogConfig, LogFacility, LogLevel, LogType};
pub use engine::{BlockyEngine, EngineEvent};
pub use error::{Error, Result};
pub use sync::{SyncReport, reconcile_set};
pub use traits::{DomainResolver, FirewallBackend, FirewallSpec, MatchFlag, RuleTarget};
