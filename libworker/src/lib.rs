pub mod bootstrap;
pub mod error;
pub mod launcher;
pub mod locks;
pub mod notifier;
pub mod reconciler;
pub mod registry;
pub mod sequencer;
pub mod store;
pub mod supervisor;
pub mod wakeup;

// re-export selected public API
pub use bootstrap::{Bootstrap, NullBootstrap};
pub use error::CoordError;
pub use launcher::{APPLY_RESTART_INTERVAL, LaunchError, LaunchHandle, SpawnDescriptor, WorkerLauncher};
pub use locks::{LockManager, NullLockManager};
pub use notifier::ConnectionChangeNotifier;
pub use reconciler::launch_apply_workers;
pub use registry::{ApplyWorkerState, SpawnArg, SupervisorState, WorkerRegistry, WorkerSlot};
pub use sequencer::{NullSequencer, Sequencer};
pub use store::{ConnectionsSource, MemoryConnectionStore, Transaction};
pub use supervisor::{PerDbSupervisor, SupervisorSettings};
pub use wakeup::{Wakeup, WakeupHandle};
