// # Firewall Backend Trait
//
// Defines the interface for the firewall set and its blocking rule.
//
// ## Implementations
//
// - ipset/iptables: `blocky-firewall-ipset` crate
//
// A backend is bound to exactly one set and one rule (see
// [`FirewallSpec`]). The engine is the sole caller and serializes its
// mutations within a cycle, so implementations never see concurrent
// writes to the same set. Backends execute single operations and report
// failure; the engine decides what to retry and when. They must not
// cache membership across calls or decide which addresses belong in
// the set.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::net::IpAddr;

/// Which side of the packet the set is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchFlag {
    /// Match source addresses
    Src,
    /// Match destination addresses
    Dst,
}

impl MatchFlag {
    /// Flag spelling used by the firewall tooling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Src => "src",
            Self::Dst => "dst",
        }
    }
}

/// Verdict of the rule referencing the set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget {
    /// Drop matching packets
    Drop,
    /// Accept matching packets (used for the local whitelist rule)
    Accept,
}

impl RuleTarget {
    /// Target spelling used by the firewall tooling
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Drop => "DROP",
            Self::Accept => "ACCEPT",
        }
    }
}

/// Everything a backend needs to know about its set and rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallSpec {
    /// Firewall table (e.g. "filter")
    pub table: String,
    /// Chain the rule lives in (e.g. "FORWARD")
    pub chain: String,
    /// Name of the address set
    pub set_name: String,
    /// Zero-based insertion position in the chain
    pub rule_pos: u32,
    /// Which packet side the set matches
    pub match_flag: MatchFlag,
    /// Rule verdict
    pub target: RuleTarget,
    /// Comment identifying the rule, used for idempotent detection
    pub comment: String,
}

impl FirewallSpec {
    /// Spec for the blocking rule of the named set
    pub fn blocking(table: &str, chain: &str, set_name: &str, rule_pos: u32) -> Self {
        Self {
            table: table.to_string(),
            chain: chain.to_string(),
            set_name: set_name.to_string(),
            rule_pos,
            match_flag: MatchFlag::Src,
            target: RuleTarget::Drop,
            comment: "Blocky IPTables Rule".to_string(),
        }
    }

    /// Spec for the local whitelist pass rule
    pub fn whitelist(table: &str, chain: &str, set_name: &str, rule_pos: u32) -> Self {
        Self {
            table: table.to_string(),
            chain: chain.to_string(),
            set_name: set_name.to_string(),
            rule_pos,
            match_flag: MatchFlag::Dst,
            target: RuleTarget::Accept,
            comment: "Blocky Whitelist IPTables Rule".to_string(),
        }
    }
}

/// Trait for firewall set implementations
///
/// # Idempotency
///
/// `ensure_set` and `ensure_rule` must be safe to call when the set or
/// rule already exists; `add_member`/`remove_member` must tolerate the
/// member already being present/absent.
#[async_trait]
pub trait FirewallBackend: Send + Sync {
    /// Create the set if it does not exist
    async fn ensure_set(&self) -> Result<(), crate::Error>;

    /// Destroy the set (clean shutdown)
    async fn destroy_set(&self) -> Result<(), crate::Error>;

    /// Current members of the set
    async fn list_members(&self) -> Result<BTreeSet<IpAddr>, crate::Error>;

    /// Add a member to the set
    async fn add_member(&self, ip: IpAddr) -> Result<(), crate::Error>;

    /// Remove a member from the set
    async fn remove_member(&self, ip: IpAddr) -> Result<(), crate::Error>;

    /// Insert the rule referencing the set if it is not already present
    async fn ensure_rule(&self) -> Result<(), crate::Error>;

    /// Delete the rule (clean shutdown)
    async fn delete_rule(&self) -> Result<(), crate::Error>;

    /// Get the backend name (for logging/debugging)
    fn backend_name(&self) -> &'static str;

    /// Name of the set this backend manages
    fn set_name(&self) -> &str;
}
