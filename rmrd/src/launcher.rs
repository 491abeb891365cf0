use std::sync::Arc;

use async_trait::async_trait;
use libworker::{
    LaunchError, LaunchHandle, SpawnArg, SpawnDescriptor, WorkerLauncher, WorkerRegistry,
    WorkerSlot,
};
use log::{debug, info};
use tokio::sync::watch;

/// Runs apply workers as tokio tasks.
///
/// The replication wire protocol lives elsewhere; the task spawned here
/// validates its spawn argument against the registry and then parks until
/// shutdown, holding the slot it was handed.
pub struct TaskLauncher {
    registry: Arc<WorkerRegistry>,
    shutdown: watch::Receiver<bool>,
}

impl TaskLauncher {
    pub fn new(registry: Arc<WorkerRegistry>, shutdown: watch::Receiver<bool>) -> Self {
        TaskLauncher { registry, shutdown }
    }
}

#[async_trait]
impl WorkerLauncher for TaskLauncher {
    async fn register(&self, descriptor: SpawnDescriptor) -> Result<LaunchHandle, LaunchError> {
        info!("starting worker {:?}", descriptor.name);
        let task = tokio::spawn(apply_worker(
            descriptor.name,
            descriptor.arg.pack(),
            self.registry.clone(),
            self.shutdown.clone(),
        ));
        Ok(LaunchHandle::new(task))
    }
}

/// Apply worker body. Unpacks its spawn argument, bails out if the registry
/// has moved on since it was scheduled, then idles until shutdown.
pub async fn apply_worker(
    name: String,
    packed_arg: u32,
    registry: Arc<WorkerRegistry>,
    mut shutdown: watch::Receiver<bool>,
) {
    let arg = SpawnArg::unpack(packed_arg);
    {
        let inner = registry.read().await;
        if arg.generation != inner.generation() {
            debug!(
                "worker {name:?} has stale generation {} (now {}), exiting",
                arg.generation,
                inner.generation()
            );
            return;
        }
        if !matches!(inner.slot(arg.slot as usize), WorkerSlot::Apply(_)) {
            debug!("worker {name:?} found no apply state in slot {}, exiting", arg.slot);
            return;
        }
    }
    debug!("worker {name:?} running in slot {}", arg.slot);
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
    debug!("worker {name:?} shutting down");
}
