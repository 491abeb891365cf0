use std::collections::HashMap;
use std::sync::Arc;

use common::{NodeId, TimelineId};
use libworker::{
    Bootstrap, ConnectionsSource, CoordError, LockManager, PerDbSupervisor, Sequencer, SpawnArg,
    SupervisorSettings, SupervisorState, Wakeup, WorkerLauncher, WorkerRegistry, WorkerSlot,
};
use log::{debug, error, info};
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::config::DatabaseConfig;

/// Top-level task that keeps one supervisor alive per configured database.
///
/// It owns the shared registrar wakeup: a committed connection change for a
/// database with no registered supervisor lands here, and each signal
/// triggers a scan that respawns whatever is missing. Supervisor slots are
/// reused across respawns; a database whose slot is gone entirely gets a
/// fresh one allocated.
pub struct Registrar {
    pub local_sysid: u64,
    pub local_timeline: TimelineId,
    pub databases: Vec<DatabaseConfig>,
    pub registry: Arc<WorkerRegistry>,
    pub source: Arc<dyn ConnectionsSource>,
    pub launcher: Arc<dyn WorkerLauncher>,
    pub sequencer: Arc<dyn Sequencer>,
    pub locks: Arc<dyn LockManager>,
    pub bootstrap: Arc<dyn Bootstrap>,
    pub settings: Arc<RwLock<SupervisorSettings>>,
    pub shutdown: watch::Receiver<bool>,
}

impl Registrar {
    pub async fn run(self) {
        let wakeup = Wakeup::new();
        self.registry
            .write()
            .await
            .set_registrar_wakeup(wakeup.handle());
        info!("registrar watching {} database(s)", self.databases.len());

        let mut shutdown = self.shutdown.clone();
        let mut tasks: HashMap<String, JoinHandle<()>> = HashMap::new();
        loop {
            if *shutdown.borrow() {
                break;
            }
            self.ensure_supervisors(&mut tasks).await;
            let wait = self.settings.read().await.wake_interval;
            tokio::select! {
                _ = wakeup.notified() => {
                    debug!("registrar woken, rescanning databases");
                }
                _ = sleep(wait) => {}
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("registrar exiting");
    }

    /// Spawn a supervisor for every configured database that has none
    /// running. Failures are logged and retried on the next signal.
    async fn ensure_supervisors(&self, tasks: &mut HashMap<String, JoinHandle<()>>) {
        for db in &self.databases {
            if let Some(task) = tasks.get(&db.name)
                && !task.is_finished()
            {
                continue;
            }
            match self.spawn_supervisor(db).await {
                Ok(task) => {
                    tasks.insert(db.name.clone(), task);
                }
                Err(err) => {
                    error!("cannot spawn supervisor for database {:?}: {err}", db.name);
                }
            }
        }
    }

    async fn spawn_supervisor(&self, db: &DatabaseConfig) -> Result<JoinHandle<()>, CoordError> {
        let arg = {
            let mut inner = self.registry.write().await;
            let existing = (0..inner.capacity()).find(|&idx| {
                matches!(inner.slot(idx), WorkerSlot::Supervisor(state) if state.dbname == db.name)
            });
            let idx = match existing {
                Some(idx) => idx,
                None => inner.allocate_slot(WorkerSlot::Supervisor(SupervisorState {
                    dboid: None,
                    dbname: db.name.clone(),
                    wakeup: None,
                    peer_count: 0,
                }))?,
            };
            SpawnArg {
                generation: inner.generation(),
                slot: idx as u16,
            }
        };

        let supervisor = PerDbSupervisor {
            local: NodeId::new(self.local_sysid, self.local_timeline, db.dboid),
            dbname: db.name.clone(),
            arg,
            registry: self.registry.clone(),
            source: self.source.clone(),
            launcher: self.launcher.clone(),
            sequencer: self.sequencer.clone(),
            locks: self.locks.clone(),
            bootstrap: self.bootstrap.clone(),
            settings: self.settings.clone(),
            shutdown: self.shutdown.clone(),
        };
        let dbname = db.name.clone();
        info!("spawning supervisor for database {dbname:?} in slot {}", arg.slot);
        Ok(tokio::spawn(async move {
            if let Err(err) = supervisor.run().await {
                error!("supervisor for database {dbname:?} failed: {err}");
            }
        }))
    }
}
