use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::registry::SpawnArg;

/// Restart hint carried on every apply-worker spawn descriptor.
pub const APPLY_RESTART_INTERVAL: Duration = Duration::from_secs(5);

/// Everything the process supervisor needs to start one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnDescriptor {
    /// Human-readable worker name for logs and process listings.
    pub name: String,
    /// Registry generation and slot index; the launcher passes the packed
    /// form through its spawn channel.
    pub arg: SpawnArg,
    /// How long to wait before restarting the worker after an abnormal exit.
    pub restart_interval: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("launcher refused to register worker {name:?}")]
    Refused { name: String },
    #[error("failed to start worker {name:?}")]
    Failed {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Handle to a worker the launcher accepted.
///
/// Dropping it detaches; the launcher keeps running the worker regardless.
#[derive(Debug)]
pub struct LaunchHandle {
    task: JoinHandle<()>,
}

impl LaunchHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        LaunchHandle { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Seam to whatever actually runs worker tasks.
///
/// The coordination core only registers intent; the launcher owns process or
/// task lifetime, restarts included.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Register `descriptor` for execution. An error fails the whole
    /// reconciliation pass that requested the launch.
    async fn register(&self, descriptor: SpawnDescriptor) -> Result<LaunchHandle, LaunchError>;
}
