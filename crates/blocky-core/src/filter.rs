//! Whitelist filter
//!
//! Pure set subtraction, applied between resolution and synchronization
//! so a whitelisted local address never reaches the firewall set.

use std::collections::BTreeSet;
use std::net::IpAddr;

/// Remove whitelisted addresses from a resolved set
pub fn apply_whitelist(resolved: BTreeSet<IpAddr>, whitelist: &BTreeSet<IpAddr>) -> BTreeSet<IpAddr> {
    if whitelist.is_empty() {
        return resolved;
    }
    resolved
        .into_iter()
        .filter(|ip| !whitelist.contains(ip))
        .collect()
}
