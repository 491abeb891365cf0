use common::NodeId;
use log::{debug, info};

use crate::error::CoordError;
use crate::launcher::{APPLY_RESTART_INTERVAL, SpawnDescriptor, WorkerLauncher};
use crate::locks::LockManager;
use crate::registry::{ApplyWorkerState, SpawnArg, WorkerRegistry, WorkerSlot};
use crate::sequencer::Sequencer;
use crate::store::ConnectionsSource;

/// Make the set of registered apply workers match the connections table.
///
/// Every row not naming the local node gets an apply slot and a launch
/// request; rows that already have a slot are skipped, so repeated passes
/// cannot create duplicates. The total row count, the local node's own row
/// included, is recorded as the live peer count in the supervisor slot and
/// pushed to the lock manager and sequencer.
///
/// A launch failure aborts the pass. Slots allocated before the failure stay
/// put; the next pass finds them and skips straight to the rows that still
/// need a worker.
pub async fn launch_apply_workers(
    local: NodeId,
    supervisor_slot: usize,
    registry: &WorkerRegistry,
    source: &dyn ConnectionsSource,
    launcher: &dyn WorkerLauncher,
    sequencer: &dyn Sequencer,
    locks: &dyn LockManager,
) -> Result<usize, CoordError> {
    let rows = source.rows().await?;
    let peer_count = rows.len();

    for row in &rows {
        if row.is_node(&local) {
            continue;
        }
        let remote = row.node_id()?;

        // check-then-allocate stays under one write guard; the launch runs
        // after the guard is gone
        let descriptor = {
            let mut inner = registry.write().await;
            if let Some(idx) = inner.find_apply_slot(local.dboid, &remote) {
                debug!("apply worker for peer {remote} already in slot {idx}");
                continue;
            }
            let idx = inner.allocate_slot(WorkerSlot::Apply(ApplyWorkerState {
                dboid: local.dboid,
                remote,
                replay_stop_lsn: None,
                forward_changesets: false,
            }))?;
            SpawnDescriptor {
                name: format!("apply {local}->{remote}"),
                arg: SpawnArg {
                    generation: inner.generation(),
                    slot: idx as u16,
                },
                restart_interval: APPLY_RESTART_INTERVAL,
            }
        };

        info!("registering worker {:?}", descriptor.name);
        launcher.register(descriptor).await?;
    }

    {
        let mut inner = registry.write().await;
        match inner.slot_mut(supervisor_slot) {
            WorkerSlot::Supervisor(state) => state.peer_count = peer_count,
            _ => {
                return Err(CoordError::NotASupervisorSlot {
                    slot: supervisor_slot,
                });
            }
        }
    }
    locks.set_peer_count(peer_count);
    sequencer.set_peer_count(peer_count);
    debug!("database {} now has {peer_count} peer(s)", local.dboid);

    Ok(peer_count)
}
