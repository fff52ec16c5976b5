// # Hickory Domain Resolver
//
// This crate provides the DNS resolution backend for the blocky system,
// built on hickory-resolver.
//
// ## Behavior
//
// - A-record (IPv4) lookups only: the block set is a hash:ip IPv4 set,
//   so AAAA answers would be unusable anyway
// - NXDOMAIN and empty answers resolve to an empty address list, not an
//   error; the engine treats them as "nothing to block for this name"
// - Transport failures (timeouts, SERVFAIL, no upstream) surface as
//   `Error::Resolution` and are handled per-domain by the engine

use blocky_core::traits::DomainResolver;
use blocky_core::{Error, Result};

use std::net::IpAddr;
use std::time::Duration;

use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{LookupIpStrategy, ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;

/// Hickory-based resolver
pub struct HickoryResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryResolver {
    /// Create a resolver from the system configuration (resolv.conf)
    pub fn from_system_conf() -> Result<Self> {
        let resolver = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| Error::config(format!("cannot read system resolver config: {}", e)))?;
        Ok(Self { resolver })
    }

    /// Create a resolver with default upstreams and the given timeout
    ///
    /// Used when the system configuration is unreadable (containers,
    /// odd chroots).
    pub fn with_defaults(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.ip_strategy = LookupIpStrategy::Ipv4Only;
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), opts);
        Self { resolver }
    }
}

#[async_trait::async_trait]
impl DomainResolver for HickoryResolver {
    async fn resolve(&self, domain: &str) -> Result<Vec<IpAddr>> {
        match self.resolver.lookup_ip(domain).await {
            Ok(lookup) => Ok(lookup.iter().filter(|ip| ip.is_ipv4()).collect()),
            Err(e) => match e.kind() {
                // Nonexistent or address-less names block nothing
                ResolveErrorKind::NoRecordsFound { .. } => {
                    tracing::debug!("{} has no records", domain);
                    Ok(Vec::new())
                }
                _ => Err(Error::resolution(domain, e.to_string())),
            },
        }
    }

    fn resolver_name(&self) -> &'static str {
        "hickory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_construction_works() {
        let resolver = HickoryResolver::with_defaults(Duration::from_secs(5));
        assert_eq!(resolver.resolver_name(), "hickory");
    }
}
