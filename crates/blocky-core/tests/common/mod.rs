//! Test doubles and common utilities for architecture contract tests
//!
//! Minimal in-memory stand-ins for the resolver and firewall seams,
//! with call counters so tests can assert how the engine drives them.

use async_trait::async_trait;
use blocky_core::config::EngineConfig;
use blocky_core::error::{Error, Result};
use blocky_core::traits::{DomainResolver, FirewallBackend};
use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A resolver with scripted per-domain results
///
/// Clones share state, so a test can keep one handle for assertions
/// and mid-run script changes while the engine owns another.
#[derive(Clone)]
pub struct ScriptedResolver {
    answers: Arc<Mutex<HashMap<String, Vec<IpAddr>>>>,
    failing: Arc<Mutex<BTreeSet<String>>>,
    resolve_call_count: Arc<AtomicUsize>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self {
            answers: Arc::new(Mutex::new(HashMap::new())),
            failing: Arc::new(Mutex::new(BTreeSet::new())),
            resolve_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Script a domain's addresses
    pub fn with_domain(self, domain: &str, addrs: &[&str]) -> Self {
        self.set_addresses(domain, addrs);
        self
    }

    /// Script a domain to fail resolution
    pub fn with_failure(self, domain: &str) -> Self {
        self.failing.lock().unwrap().insert(domain.to_string());
        self
    }

    /// Change a domain's addresses mid-run
    pub fn set_addresses(&self, domain: &str, addrs: &[&str]) {
        let parsed = addrs.iter().map(|a| a.parse().unwrap()).collect();
        self.answers.lock().unwrap().insert(domain.to_string(), parsed);
    }

    pub fn resolve_call_count(&self) -> usize {
        self.resolve_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DomainResolver for ScriptedResolver {
    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>> {
        self.resolve_call_count.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(domain) {
            return Err(Error::resolution(domain, "scripted failure"));
        }
        Ok(self
            .answers
            .lock()
            .unwrap()
            .get(domain)
            .cloned()
            .unwrap_or_default())
    }

    fn resolver_name(&self) -> &'static str {
        "scripted"
    }
}

/// An in-memory firewall backend tracking every call
#[derive(Clone)]
pub struct MockFirewall {
    members: Arc<Mutex<BTreeSet<IpAddr>>>,
    /// Every address ever passed to add_member, in order
    added_log: Arc<Mutex<Vec<IpAddr>>>,
    removed_log: Arc<Mutex<Vec<IpAddr>>>,
    list_calls: Arc<AtomicUsize>,
    ensure_set_calls: Arc<AtomicUsize>,
    ensure_rule_calls: Arc<AtomicUsize>,
    delete_rule_calls: Arc<AtomicUsize>,
    destroy_set_calls: Arc<AtomicUsize>,
    /// Remaining number of list_members calls that fail
    fail_lists: Arc<AtomicUsize>,
}

impl MockFirewall {
    pub fn new() -> Self {
        Self {
            members: Arc::new(Mutex::new(BTreeSet::new())),
            added_log: Arc::new(Mutex::new(Vec::new())),
            removed_log: Arc::new(Mutex::new(Vec::new())),
            list_calls: Arc::new(AtomicUsize::new(0)),
            ensure_set_calls: Arc::new(AtomicUsize::new(0)),
            ensure_rule_calls: Arc::new(AtomicUsize::new(0)),
            delete_rule_calls: Arc::new(AtomicUsize::new(0)),
            destroy_set_calls: Arc::new(AtomicUsize::new(0)),
            fail_lists: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make the next `n` list_members calls fail
    pub fn fail_next_lists(&self, n: usize) {
        self.fail_lists.store(n, Ordering::SeqCst);
    }

    pub fn members(&self) -> BTreeSet<IpAddr> {
        self.members.lock().unwrap().clone()
    }

    pub fn added_log(&self) -> Vec<IpAddr> {
        self.added_log.lock().unwrap().clone()
    }

    pub fn removed_log(&self) -> Vec<IpAddr> {
        self.removed_log.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn ensure_set_calls(&self) -> usize {
        self.ensure_set_calls.load(Ordering::SeqCst)
    }

    pub fn ensure_rule_calls(&self) -> usize {
        self.ensure_rule_calls.load(Ordering::SeqCst)
    }

    pub fn delete_rule_calls(&self) -> usize {
        self.delete_rule_calls.load(Ordering::SeqCst)
    }

    pub fn destroy_set_calls(&self) -> usize {
        self.destroy_set_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FirewallBackend for MockFirewall {
    async fn ensure_set(&self) -> Result<()> {
        self.ensure_set_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn destroy_set(&self) -> Result<()> {
        self.destroy_set_calls.fetch_add(1, Ordering::SeqCst);
        self.members.lock().unwrap().clear();
        Ok(())
    }

    async fn list_members(&self) -> Result<BTreeSet<IpAddr>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_lists
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::firewall("scripted list failure"));
        }
        Ok(self.members.lock().unwrap().clone())
    }

    async fn add_member(&self, ip: IpAddr) -> Result<()> {
        self.added_log.lock().unwrap().push(ip);
        self.members.lock().unwrap().insert(ip);
        Ok(())
    }

    async fn remove_member(&self, ip: IpAddr) -> Result<()> {
        self.removed_log.lock().unwrap().push(ip);
        self.members.lock().unwrap().remove(&ip);
        Ok(())
    }

    async fn ensure_rule(&self) -> Result<()> {
        self.ensure_rule_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_rule(&self) -> Result<()> {
        self.delete_rule_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "mock"
    }

    fn set_name(&self) -> &str {
        "blocky_test"
    }
}

/// Engine tuning with millisecond cycles for tests
pub fn fast_engine_config() -> EngineConfig {
    EngineConfig {
        check_interval: Duration::from_millis(25),
        resolve_timeout: Duration::from_millis(500),
        summary_every_cycles: 0,
        event_channel_capacity: 100,
    }
}

/// Helper to parse an address in tests
pub fn ip(addr: &str) -> IpAddr {
    addr.parse().unwrap()
}
