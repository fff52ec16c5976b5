//! Set reconciliation
//!
//! Computes the difference between desired and actual set membership and
//! applies it through a [`FirewallBackend`]. Entries are added before
//! stale ones are removed, so an address that stays blocked across a
//! cycle is never absent from the set at any point of evaluation.

use crate::error::Result;
use crate::traits::FirewallBackend;
use std::collections::BTreeSet;
use std::net::IpAddr;
use tracing::debug;

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    /// Members added this pass
    pub added: usize,
    /// Members removed this pass
    pub removed: usize,
}

impl SyncReport {
    /// True when the pass made no changes
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

/// Reconcile the backend's set against `desired`
///
/// Adds missing members, removes stale ones, leaves the rest untouched.
pub async fn reconcile_set(
    backend: &dyn FirewallBackend,
    desired: &BTreeSet<IpAddr>,
) -> Result<SyncReport> {
    let current = backend.list_members().await?;

    let mut report = SyncReport::default();

    for ip in desired.difference(&current) {
        backend.add_member(*ip).await?;
        report.added += 1;
    }
    for ip in current.difference(desired) {
        backend.remove_member(*ip).await?;
        report.removed += 1;
    }

    debug!(
        set = backend.set_name(),
        added = report.added,
        removed = report.removed,
        "reconciled set membership"
    );
    Ok(report)
}
