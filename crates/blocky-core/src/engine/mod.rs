//! Core blocky engine
//!
//! The BlockyEngine is responsible for:
//! - Resolving the configured domains on a fixed interval
//! - Filtering whitelisted local addresses out of the result
//! - Reconciling the firewall set against the filtered result
//! - Keeping the blocking rule in place
//!
//! ## Cycle Flow
//!
//! ```text
//! every check_every seconds:
//!   DomainResolver ── per-domain lookups (parallel, bounded timeout)
//!        │
//!        ▼
//!   whitelist filter (pure)
//!        │
//!        ▼
//!   FirewallBackend ── diff against current members, add/remove
//! ```
//!
//! A domain that fails to resolve is logged and skipped for the cycle;
//! a failed synchronization is logged and retried on the next cycle.
//! Cycles never overlap: a slow cycle delays the next tick.

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::filter;
use crate::sync::{self, SyncReport};
use crate::traits::{DomainResolver, FirewallBackend};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Events emitted by the BlockyEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started, set and rule in place
    Started {
        domain_count: usize,
    },

    /// A cycle finished and the set matches the desired membership
    CycleCompleted {
        cycle: u64,
        blocked: usize,
        added: usize,
        removed: usize,
    },

    /// A domain failed to resolve this cycle (recovered)
    ResolutionFailed {
        domain: String,
        error: String,
    },

    /// A cycle's synchronization failed (retried next cycle)
    SyncFailed {
        cycle: u64,
        error: String,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Core blocky engine
///
/// Orchestrates the resolve → filter → synchronize cycle.
///
/// ## Lifecycle
///
/// 1. Create with [`BlockyEngine::new()`]
/// 2. Start with [`BlockyEngine::run()`] (or
///    [`BlockyEngine::run_with_shutdown()`] when the caller manages
///    shutdown signalling itself)
/// 3. Engine runs until a shutdown signal, then deletes its rule and
///    destroys its set
///
/// ## Threading
///
/// One engine task; DNS lookups fan out within a cycle and are joined
/// before the synchronizer runs, so the firewall set never sees a
/// partial cycle. The engine is the sole mutator of its set.
pub struct BlockyEngine {
    /// Resolver for per-domain lookups
    resolver: Arc<dyn DomainResolver>,

    /// Backend owning the block set and its rule
    firewall: Box<dyn FirewallBackend>,

    /// Domains to resolve each cycle
    domains: Vec<String>,

    /// Addresses that must never enter the set
    whitelist: BTreeSet<IpAddr>,

    /// Engine tuning
    config: EngineConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,

    /// Membership applied by the last successful cycle
    last_applied: Mutex<Option<BTreeSet<IpAddr>>>,
}

impl BlockyEngine {
    /// Create a new blocky engine
    ///
    /// # Parameters
    ///
    /// - `resolver`: domain resolver implementation
    /// - `firewall`: firewall backend bound to the block set
    /// - `domains`: expanded domain list (must be non-empty)
    /// - `whitelist`: local addresses to exclude
    /// - `config`: engine tuning
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields
    /// engine events
    pub fn new(
        resolver: Box<dyn DomainResolver>,
        firewall: Box<dyn FirewallBackend>,
        domains: Vec<String>,
        whitelist: Vec<IpAddr>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        if domains.is_empty() {
            return Err(Error::domain_source("engine needs at least one domain"));
        }
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            resolver: Arc::from(resolver),
            firewall,
            domains,
            whitelist: whitelist.into_iter().collect(),
            config,
            event_tx: tx,
            last_applied: Mutex::new(None),
        };

        Ok((engine, rx))
    }

    /// Run the engine
    ///
    /// Ensures the set and rule exist, then cycles until a shutdown
    /// signal (SIGINT) is received. On shutdown the rule is deleted and
    /// the set destroyed.
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the engine with a caller-provided shutdown signal
    ///
    /// Used by contract tests and by daemons that manage OS signals
    /// themselves and translate them into the oneshot.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        // Set and rule before the first cycle; both are idempotent
        self.firewall.ensure_set().await?;
        self.firewall.ensure_rule().await?;

        self.emit_event(EngineEvent::Started {
            domain_count: self.domains.len(),
        });
        info!(
            domains = self.domains.len(),
            set = self.firewall.set_name(),
            interval = ?self.config.check_interval,
            "engine started"
        );

        let mut interval = tokio::time::interval(self.config.check_interval);
        // A slow cycle delays the next one; cycles never overlap
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut cycle: u64 = 0;

        if let Some(mut rx) = shutdown_rx {
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        cycle += 1;
                        if let Err(e) = self.run_cycle(cycle).await {
                            error!("cycle {} failed: {}", cycle, e);
                            self.emit_event(EngineEvent::SyncFailed {
                                cycle,
                                error: e.to_string(),
                            });
                        }
                    }

                    _ = &mut rx => {
                        info!("Shutdown signal received");
                        self.emit_event(EngineEvent::Stopped {
                            reason: "Shutdown signal".to_string(),
                        });
                        break;
                    }
                }
            }
        } else {
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        cycle += 1;
                        if let Err(e) = self.run_cycle(cycle).await {
                            error!("cycle {} failed: {}", cycle, e);
                            self.emit_event(EngineEvent::SyncFailed {
                                cycle,
                                error: e.to_string(),
                            });
                        }
                    }

                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutdown signal received");
                        self.emit_event(EngineEvent::Stopped {
                            reason: "Shutdown signal".to_string(),
                        });
                        break;
                    }
                }
            }
        }

        self.teardown().await;
        info!("engine stopped");

        Ok(())
    }

    /// Run one resolve → filter → synchronize cycle
    async fn run_cycle(&self, cycle: u64) -> Result<()> {
        let resolved = self.resolve_all().await;
        let desired = filter::apply_whitelist(resolved, &self.whitelist);

        if self.config.summary_every_cycles > 0 && cycle % self.config.summary_every_cycles == 0 {
            let listing = desired
                .iter()
                .map(|ip| ip.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            info!("Blocked IP addresses: {}", listing);
        }

        let unchanged = {
            let last = self.last_applied.lock().await;
            last.as_ref() == Some(&desired)
        };
        if unchanged {
            debug!("cycle {}: membership unchanged ({} addresses)", cycle, desired.len());
            self.emit_event(EngineEvent::CycleCompleted {
                cycle,
                blocked: desired.len(),
                added: 0,
                removed: 0,
            });
            return Ok(());
        }

        let report: SyncReport = sync::reconcile_set(self.firewall.as_ref(), &desired).await?;
        if !report.is_noop() {
            info!(
                "cycle {}: {} blocked ({} added, {} removed)",
                cycle,
                desired.len(),
                report.added,
                report.removed
            );
        }

        *self.last_applied.lock().await = Some(desired.clone());

        self.emit_event(EngineEvent::CycleCompleted {
            cycle,
            blocked: desired.len(),
            added: report.added,
            removed: report.removed,
        });
        Ok(())
    }

    /// Resolve every domain concurrently, tolerating per-domain failure
    ///
    /// All lookups complete or time out before this returns; the
    /// synchronizer never sees a partial cycle.
    async fn resolve_all(&self) -> BTreeSet<IpAddr> {
        let mut lookups = JoinSet::new();
        for domain in &self.domains {
            let resolver = Arc::clone(&self.resolver);
            let domain = domain.clone();
            let timeout = self.config.resolve_timeout;
            lookups.spawn(async move {
                let outcome = tokio::time::timeout(timeout, resolver.resolve(&domain)).await;
                (domain, outcome)
            });
        }

        let mut resolved = BTreeSet::new();
        while let Some(joined) = lookups.join_next().await {
            let (domain, outcome) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("resolution task failed: {}", e);
                    continue;
                }
            };
            match outcome {
                Ok(Ok(addrs)) => {
                    debug!("resolved {} to {} address(es)", domain, addrs.len());
                    resolved.extend(addrs);
                }
                Ok(Err(e)) => {
                    warn!("failed to resolve {}: {}", domain, e);
                    self.emit_event(EngineEvent::ResolutionFailed {
                        domain,
                        error: e.to_string(),
                    });
                }
                Err(_) => {
                    warn!(
                        "resolution of {} timed out after {:?}",
                        domain, self.config.resolve_timeout
                    );
                    self.emit_event(EngineEvent::ResolutionFailed {
                        domain,
                        error: "timed out".to_string(),
                    });
                }
            }
        }
        resolved
    }

    /// Remove the rule and destroy the set on clean shutdown
    ///
    /// Failures are logged; shutdown proceeds regardless.
    async fn teardown(&self) {
        if let Err(e) = self.firewall.delete_rule().await {
            warn!("failed to delete rule on shutdown: {}", e);
        }
        if let Err(e) = self.firewall.destroy_set().await {
            warn!("failed to destroy set {} on shutdown: {}", self.firewall.set_name(), e);
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Dropped events only cost monitoring detail, never block a cycle
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full or closed, dropping event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_events_are_comparable() {
        let event = EngineEvent::ResolutionFailed {
            domain: "youtube.com".to_string(),
            error: "timed out".to_string(),
        };
        assert_eq!(event.clone(), event);
    }
}
