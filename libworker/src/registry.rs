use common::{DatabaseId, NodeId};
use log::debug;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::CoordError;
use crate::wakeup::WakeupHandle;

/// Argument handed to a worker task at spawn time, packed into a u32 so it
/// survives any opaque one-word spawn channel: high half is the registry
/// generation the slot was handed out under, low half is the slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnArg {
    pub generation: u16,
    pub slot: u16,
}

impl SpawnArg {
    pub fn pack(self) -> u32 {
        ((self.generation as u32) << 16) | self.slot as u32
    }

    pub fn unpack(raw: u32) -> Self {
        SpawnArg {
            generation: (raw >> 16) as u16,
            slot: (raw & 0xffff) as u16,
        }
    }
}

/// State of a per-database supervisor slot.
///
/// The slot is allocated at preload time with only the database name filled
/// in. The supervisor task publishes `dboid` and its wakeup handle when it
/// registers, and clears `dboid` again on exit. `wakeup` stays `None` while
/// the task is starting; signalling is skipped in that window because the
/// task will run a full scan on its own anyway.
#[derive(Debug, Default)]
pub struct SupervisorState {
    pub dboid: Option<DatabaseId>,
    pub dbname: String,
    pub wakeup: Option<WakeupHandle>,
    pub peer_count: usize,
}

/// State of one apply worker slot, keyed by the owning database plus the
/// remote node's identity triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyWorkerState {
    pub dboid: DatabaseId,
    pub remote: NodeId,
    pub replay_stop_lsn: Option<u64>,
    pub forward_changesets: bool,
}

/// One entry of the fixed-capacity worker table.
#[derive(Debug, Default)]
pub enum WorkerSlot {
    #[default]
    Empty,
    Supervisor(SupervisorState),
    Apply(ApplyWorkerState),
}

/// The shared worker table plus everything that has to change under the same
/// lock: the generation counter and the registrar's wakeup handle.
#[derive(Debug)]
pub struct RegistryInner {
    generation: u16,
    slots: Vec<WorkerSlot>,
    registrar_wakeup: Option<WakeupHandle>,
}

/// Shared registry of live and intended workers.
///
/// All lookups and mutations go through a lock guard: take [`read`] for
/// scans, [`write`] for anything that inserts or mutates, and hold the guard
/// across a check-then-allocate sequence so nobody can race it. The methods
/// on [`RegistryInner`] never take the lock themselves.
///
/// [`read`]: WorkerRegistry::read
/// [`write`]: WorkerRegistry::write
#[derive(Debug)]
pub struct WorkerRegistry {
    inner: RwLock<RegistryInner>,
}

impl WorkerRegistry {
    /// Create a registry with room for `max_workers` workers of any kind.
    pub fn new(max_workers: usize) -> Self {
        assert!(
            max_workers > 0 && max_workers <= usize::from(u16::MAX) + 1,
            "max_workers must fit the 16-bit slot index of a spawn argument"
        );
        let mut slots = Vec::with_capacity(max_workers);
        slots.resize_with(max_workers, WorkerSlot::default);
        WorkerRegistry {
            inner: RwLock::new(RegistryInner {
                generation: 1,
                slots,
                registrar_wakeup: None,
            }),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().await
    }

    /// Allocate the supervisor slot for every named database, before any
    /// supervisor task runs. Returns the spawn argument for each database in
    /// input order. Registering the same database name twice is refused.
    pub async fn preload_supervisors(
        &self,
        dbnames: &[String],
    ) -> Result<Vec<(String, SpawnArg)>, CoordError> {
        let mut inner = self.write().await;
        let mut args = Vec::with_capacity(dbnames.len());
        for dbname in dbnames {
            let duplicate = inner.slots.iter().any(|slot| {
                matches!(slot, WorkerSlot::Supervisor(state) if state.dbname == *dbname)
            });
            if duplicate {
                return Err(CoordError::DuplicateSupervisor {
                    dbname: dbname.clone(),
                });
            }
            let idx = inner.allocate_slot(WorkerSlot::Supervisor(SupervisorState {
                dboid: None,
                dbname: dbname.clone(),
                wakeup: None,
                peer_count: 0,
            }))?;
            debug!("preloaded supervisor slot {idx} for database {dbname:?}");
            args.push((
                dbname.clone(),
                SpawnArg {
                    generation: inner.generation(),
                    slot: idx as u16,
                },
            ));
        }
        Ok(args)
    }
}

impl RegistryInner {
    pub fn generation(&self) -> u16 {
        self.generation
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, idx: usize) -> &WorkerSlot {
        &self.slots[idx]
    }

    pub fn slot_mut(&mut self, idx: usize) -> &mut WorkerSlot {
        &mut self.slots[idx]
    }

    /// Wipe every slot and move to the next generation, so that spawn
    /// arguments handed out before the reset identify themselves as stale.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = WorkerSlot::Empty;
        }
        self.registrar_wakeup = None;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Find the supervisor slot registered for `dboid`.
    ///
    /// Linear scan; hold the lock at least shared. A slot whose supervisor
    /// has not yet published its database id will not match. Finding a slot
    /// says nothing about whether the task behind it is actually running.
    pub fn find_supervisor_slot(&self, dboid: DatabaseId) -> Option<usize> {
        self.slots.iter().position(|slot| {
            matches!(slot, WorkerSlot::Supervisor(state) if state.dboid == Some(dboid))
        })
    }

    /// Find the apply worker slot for the peer `remote` of database `dboid`.
    ///
    /// Same scan and locking rules as [`find_supervisor_slot`].
    ///
    /// [`find_supervisor_slot`]: RegistryInner::find_supervisor_slot
    pub fn find_apply_slot(&self, dboid: DatabaseId, remote: &NodeId) -> Option<usize> {
        self.slots.iter().position(|slot| {
            matches!(slot, WorkerSlot::Apply(state)
                if state.dboid == dboid && state.remote == *remote)
        })
    }

    /// Claim the first empty slot for `slot`. Hold the lock exclusively, and
    /// keep holding it if the allocation must stay atomic with a preceding
    /// lookup.
    pub fn allocate_slot(&mut self, slot: WorkerSlot) -> Result<usize, CoordError> {
        let idx = self
            .slots
            .iter()
            .position(|s| matches!(s, WorkerSlot::Empty))
            .ok_or(CoordError::OutOfSlots)?;
        self.slots[idx] = slot;
        Ok(idx)
    }

    pub fn registrar_wakeup(&self) -> Option<&WakeupHandle> {
        self.registrar_wakeup.as_ref()
    }

    pub fn set_registrar_wakeup(&mut self, handle: WakeupHandle) {
        self.registrar_wakeup = Some(handle);
    }
}
