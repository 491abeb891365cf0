use common::MalformedSysid;

use crate::launcher::LaunchError;

/// Errors of the coordination core.
///
/// Everything here is fatal to the pass or task that hit it; recovery is the
/// restart policy of whoever launched that task. A stale spawn generation is
/// deliberately not in this list: workers detect it and exit normally.
#[derive(Debug, thiserror::Error)]
pub enum CoordError {
    #[error("no free worker slot in the registry")]
    OutOfSlots,
    #[error("a supervisor slot already exists for database {dbname:?}")]
    DuplicateSupervisor { dbname: String },
    #[error("slot {slot} does not hold a supervisor")]
    NotASupervisorSlot { slot: usize },
    #[error(transparent)]
    MalformedSysid(#[from] MalformedSysid),
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
