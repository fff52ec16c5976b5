// # Domain Resolver Trait
//
// Defines the interface for resolving hostnames to addresses.
//
// ## Implementations
//
// - Hickory-based: `blocky-resolver-hickory` crate
//
// Implementations perform one lookup per call and return whatever
// addresses the name currently has. They do not retry, cache across
// cycles, or decide what gets blocked; all of that is owned by
// `BlockyEngine`. A name that exists but has no addresses resolves to
// an empty list, not an error.

use async_trait::async_trait;
use std::net::IpAddr;

/// Trait for DNS resolution implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe; the engine fans lookups out
/// across tasks within a cycle.
#[async_trait]
pub trait DomainResolver: Send + Sync {
    /// Resolve a hostname to its current addresses
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<IpAddr>)`: addresses the name resolves to (possibly empty)
    /// - `Err(Error)`: the lookup itself failed (network, servfail, ...)
    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>, crate::Error>;

    /// Get the resolver name (for logging/debugging)
    fn resolver_name(&self) -> &'static str;
}
