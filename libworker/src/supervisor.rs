use std::sync::Arc;
use std::time::Duration;

use common::NodeId;
use log::{debug, info};
use tokio::sync::{RwLock, watch};
use tokio::time::sleep;

use crate::bootstrap::Bootstrap;
use crate::error::CoordError;
use crate::launcher::WorkerLauncher;
use crate::locks::LockManager;
use crate::reconciler::launch_apply_workers;
use crate::registry::{SpawnArg, WorkerRegistry, WorkerSlot};
use crate::sequencer::Sequencer;
use crate::store::ConnectionsSource;
use crate::wakeup::Wakeup;

/// Retry interval while the sequencer reports elections or votes in flight.
const PENDING_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Tunables a running supervisor re-reads on every pass, so a configuration
/// reload takes effect without restarting the task.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    /// Upper bound on one idle pass of the steady-state loop. A committer
    /// that dies between writing the connections table and signalling the
    /// wakeup is caught by the next timed pass.
    pub wake_interval: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        SupervisorSettings {
            wake_interval: Duration::from_secs(180),
        }
    }
}

/// The long-lived coordination task for one replicated database.
///
/// Lifecycle: check the spawn generation, publish identity and wakeup handle
/// into the pre-allocated registry slot, bring up the lock manager and
/// bootstrap, reconcile once, initialize the sequencer, then loop on
/// wakeups until shut down. The slot's database id is cleared on the way
/// out, success or not.
pub struct PerDbSupervisor {
    pub local: NodeId,
    pub dbname: String,
    pub arg: SpawnArg,
    pub registry: Arc<WorkerRegistry>,
    pub source: Arc<dyn ConnectionsSource>,
    pub launcher: Arc<dyn WorkerLauncher>,
    pub sequencer: Arc<dyn Sequencer>,
    pub locks: Arc<dyn LockManager>,
    pub bootstrap: Arc<dyn Bootstrap>,
    pub settings: Arc<RwLock<SupervisorSettings>>,
    pub shutdown: watch::Receiver<bool>,
}

impl PerDbSupervisor {
    /// Run the supervisor to completion.
    ///
    /// A stale spawn generation is a normal exit, not an error; the registry
    /// was reset after this task was scheduled and somebody else owns the
    /// slot index now.
    pub async fn run(self) -> Result<(), CoordError> {
        let slot = self.arg.slot as usize;
        let wakeup = Wakeup::new();
        {
            let mut inner = self.registry.write().await;
            if self.arg.generation != inner.generation() {
                debug!(
                    "supervisor for database {:?} started with stale generation {} (now {}), exiting",
                    self.dbname,
                    self.arg.generation,
                    inner.generation()
                );
                return Ok(());
            }
            match inner.slot_mut(slot) {
                WorkerSlot::Supervisor(state) => {
                    state.dboid = Some(self.local.dboid);
                    state.wakeup = Some(wakeup.handle());
                }
                _ => return Err(CoordError::NotASupervisorSlot { slot }),
            }
        }
        info!(
            "supervisor for database {:?} registered in slot {slot}",
            self.dbname
        );

        let result = self.steady_state(&wakeup).await;

        {
            let mut inner = self.registry.write().await;
            if let WorkerSlot::Supervisor(state) = inner.slot_mut(slot) {
                state.dboid = None;
            }
        }
        info!("supervisor for database {:?} exiting", self.dbname);
        result
    }

    async fn steady_state(&self, wakeup: &Wakeup) -> Result<(), CoordError> {
        self.locks.startup().await?;
        self.bootstrap.init_database(&self.dbname).await?;
        let peers = self.reconcile().await?;
        self.sequencer.init(peers).await?;

        let mut shutdown = self.shutdown.clone();
        loop {
            if *shutdown.borrow() {
                break;
            }

            let mut poll_soon = false;
            poll_soon |= self.sequencer.start_elections_if_due().await?;
            poll_soon |= self.sequencer.vote_if_due().await?;
            self.sequencer.tally().await?;
            self.sequencer.refill_sequence_chunks().await?;

            let wait = if poll_soon {
                PENDING_POLL_INTERVAL
            } else {
                self.settings.read().await.wake_interval
            };

            let woken = tokio::select! {
                _ = wakeup.notified() => true,
                _ = sleep(wait) => false,
                res = shutdown.changed() => {
                    if res.is_err() {
                        // all senders gone counts as shutdown
                        break;
                    }
                    false
                }
            };
            if woken {
                debug!("supervisor for database {:?} woken, reconciling", self.dbname);
                self.reconcile().await?;
            }
        }
        Ok(())
    }

    async fn reconcile(&self) -> Result<usize, CoordError> {
        launch_apply_workers(
            self.local,
            self.arg.slot as usize,
            &self.registry,
            self.source.as_ref(),
            self.launcher.as_ref(),
            self.sequencer.as_ref(),
            self.locks.as_ref(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use common::ConnectionRow;
    use tokio::time::{Instant, timeout};

    use super::*;
    use crate::bootstrap::NullBootstrap;
    use crate::launcher::{LaunchError, LaunchHandle, SpawnDescriptor};
    use crate::locks::NullLockManager;
    use crate::sequencer::NullSequencer;
    use crate::store::MemoryConnectionStore;

    struct NoopLauncher;

    #[async_trait]
    impl WorkerLauncher for NoopLauncher {
        async fn register(&self, descriptor: SpawnDescriptor) -> Result<LaunchHandle, LaunchError> {
            debug!("test launcher accepted {:?}", descriptor.name);
            Ok(LaunchHandle::new(tokio::spawn(async {})))
        }
    }

    struct Harness {
        registry: Arc<WorkerRegistry>,
        store: Arc<MemoryConnectionStore>,
        sequencer: Arc<NullSequencer>,
        settings: Arc<RwLock<SupervisorSettings>>,
        shutdown: watch::Sender<bool>,
        arg: SpawnArg,
    }

    async fn harness(rows: Vec<ConnectionRow>) -> (Harness, PerDbSupervisor) {
        let registry = Arc::new(WorkerRegistry::new(8));
        let args = registry
            .preload_supervisors(&["alpha".to_string()])
            .await
            .unwrap();
        let store = Arc::new(MemoryConnectionStore::with_rows(rows));
        let sequencer = Arc::new(NullSequencer::new());
        let (tx, rx) = watch::channel(false);
        let arg = args[0].1;
        let settings = Arc::new(RwLock::new(SupervisorSettings {
            wake_interval: Duration::from_millis(50),
        }));
        let supervisor = PerDbSupervisor {
            local: NodeId::new(100, 1, 5),
            dbname: "alpha".to_string(),
            arg,
            registry: registry.clone(),
            source: store.clone(),
            launcher: Arc::new(NoopLauncher),
            sequencer: sequencer.clone(),
            locks: Arc::new(NullLockManager::new()),
            bootstrap: Arc::new(NullBootstrap::new()),
            settings: settings.clone(),
            shutdown: rx,
        };
        (
            Harness {
                registry,
                store,
                sequencer,
                settings,
                shutdown: tx,
                arg,
            },
            supervisor,
        )
    }

    async fn wait_for_apply_slot(registry: &WorkerRegistry, dboid: u32, remote: NodeId) {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if registry.read().await.find_apply_slot(dboid, &remote).is_some() {
                return;
            }
            assert!(
                Instant::now() < deadline,
                "apply slot for {remote} never appeared"
            );
            sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn stale_generation_exits_without_registering() {
        let (h, supervisor) = harness(vec![ConnectionRow::new("100", 1, 6)]).await;
        h.registry.write().await.reset();
        supervisor.run().await.unwrap();
        let inner = h.registry.read().await;
        assert!(matches!(inner.slot(h.arg.slot as usize), WorkerSlot::Empty));
        assert_eq!(h.sequencer.peer_count(), 0);
    }

    #[tokio::test]
    async fn lifecycle_reconciles_then_clears_dboid_on_shutdown() {
        let rows = vec![
            ConnectionRow::new("100", 1, 5),
            ConnectionRow::new("100", 1, 6),
        ];
        let (h, supervisor) = harness(rows).await;
        let task = tokio::spawn(supervisor.run());

        wait_for_apply_slot(&h.registry, 5, NodeId::new(100, 1, 6)).await;
        assert_eq!(h.sequencer.peer_count(), 2);

        h.shutdown.send(true).unwrap();
        timeout(Duration::from_secs(2), task)
            .await
            .expect("supervisor should stop")
            .unwrap()
            .unwrap();

        let inner = h.registry.read().await;
        match inner.slot(h.arg.slot as usize) {
            WorkerSlot::Supervisor(state) => {
                assert_eq!(state.dboid, None);
                assert_eq!(state.peer_count, 2);
            }
            other => panic!("expected the supervisor slot to survive, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wakeup_signal_triggers_a_fresh_reconciliation() {
        let (h, supervisor) = harness(vec![ConnectionRow::new("100", 1, 5)]).await;
        // long interval so only the signal can trigger the second pass
        h.settings.write().await.wake_interval = Duration::from_secs(600);
        let task = tokio::spawn(supervisor.run());

        // first reconciliation publishes the handle
        let deadline = Instant::now() + Duration::from_secs(2);
        let handle = loop {
            {
                let inner = h.registry.read().await;
                if let WorkerSlot::Supervisor(state) = inner.slot(h.arg.slot as usize) {
                    if let Some(handle) = state.wakeup.clone() {
                        if state.dboid.is_some() {
                            break handle;
                        }
                    }
                }
            }
            assert!(Instant::now() < deadline, "supervisor never registered");
            sleep(Duration::from_millis(10)).await;
        };

        let mut txn = h.store.begin();
        txn.upsert(ConnectionRow::new("200", 3, 9));
        txn.commit().await;
        handle.signal();

        wait_for_apply_slot(&h.registry, 5, NodeId::new(200, 3, 9)).await;

        h.shutdown.send(true).unwrap();
        timeout(Duration::from_secs(2), task)
            .await
            .expect("supervisor should stop")
            .unwrap()
            .unwrap();
    }
}
