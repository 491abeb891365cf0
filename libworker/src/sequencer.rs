use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use log::debug;

/// Seam to the distributed-sequence subsystem.
///
/// The supervisor polls it every pass of its steady-state loop. The poll
/// methods that return `bool` report whether the subsystem has work in
/// flight that wants another poll soon rather than a full-length sleep.
#[async_trait]
pub trait Sequencer: Send + Sync {
    /// One-time startup with the initial group size, after the first
    /// reconciliation has established it.
    async fn init(&self, peers: usize) -> Result<()>;

    /// Refresh the group size after a reconciliation.
    fn set_peer_count(&self, peers: usize);

    /// Start any elections whose sequences have run dry.
    async fn start_elections_if_due(&self) -> Result<bool>;

    /// Cast votes in elections started by other nodes.
    async fn vote_if_due(&self) -> Result<bool>;

    /// Tally elections this node started that have reached quorum.
    async fn tally(&self) -> Result<()>;

    /// Hand won chunks to the sequences that requested them.
    async fn refill_sequence_chunks(&self) -> Result<()>;
}

/// Sequencer that only remembers the peer count.
///
/// Used by deployments without distributed sequences and by tests.
#[derive(Debug, Default)]
pub struct NullSequencer {
    peers: AtomicUsize,
}

impl NullSequencer {
    pub fn new() -> Self {
        NullSequencer::default()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sequencer for NullSequencer {
    async fn init(&self, peers: usize) -> Result<()> {
        debug!("sequencer init with {peers} peer(s) (null implementation)");
        self.peers.store(peers, Ordering::SeqCst);
        Ok(())
    }

    fn set_peer_count(&self, peers: usize) {
        self.peers.store(peers, Ordering::SeqCst);
    }

    async fn start_elections_if_due(&self) -> Result<bool> {
        Ok(false)
    }

    async fn vote_if_due(&self) -> Result<bool> {
        Ok(false)
    }

    async fn tally(&self) -> Result<()> {
        Ok(())
    }

    async fn refill_sequence_chunks(&self) -> Result<()> {
        Ok(())
    }
}
