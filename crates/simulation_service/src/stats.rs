//! Routing counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counts how calls were routed. Shared by the local and hybrid routers.
#[derive(Debug, Default)]
pub struct RoutingStats {
    local_dispatches: AtomicU64,
    remote_dispatches: AtomicU64,
    rejected: AtomicU64,
    broadcasts: AtomicU64,
}

/// Point-in-time copy of [`RoutingStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoutingStatsSnapshot {
    /// Calls executed against a locally hosted region
    pub local_dispatches: u64,
    /// Calls handed to the remote transport
    pub remote_dispatches: u64,
    /// Calls refused before dispatch because no destination was given
    pub rejected: u64,
    /// Position updates offered to every local scene
    pub broadcasts: u64,
}

impl RoutingStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_local(&self) {
        self.local_dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_remote(&self) {
        self.remote_dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RoutingStatsSnapshot {
        RoutingStatsSnapshot {
            local_dispatches: self.local_dispatches.load(Ordering::Relaxed),
            remote_dispatches: self.remote_dispatches.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
        }
    }
}
