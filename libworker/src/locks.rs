use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use log::debug;

/// Seam to the global-DDL-lock subsystem.
///
/// The supervisor drives only two moments of its lifecycle: bringing the
/// subsystem up once per database, and keeping its notion of the group size
/// current after every reconciliation.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// One-time startup, called while the supervisor is registering.
    async fn startup(&self) -> Result<()>;

    /// Refresh the number of nodes participating in lock acquisition.
    fn set_peer_count(&self, peers: usize);
}

/// Lock manager that only remembers the peer count.
///
/// Used by deployments without the DDL-lock subsystem and by tests.
#[derive(Debug, Default)]
pub struct NullLockManager {
    peers: AtomicUsize,
}

impl NullLockManager {
    pub fn new() -> Self {
        NullLockManager::default()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LockManager for NullLockManager {
    async fn startup(&self) -> Result<()> {
        debug!("lock manager startup (null implementation)");
        Ok(())
    }

    fn set_peer_count(&self, peers: usize) {
        self.peers.store(peers, Ordering::SeqCst);
    }
}
