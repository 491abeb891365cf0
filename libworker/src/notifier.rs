use std::sync::Arc;

use common::DatabaseId;
use log::debug;

use crate::registry::{WorkerRegistry, WorkerSlot};
use crate::store::Transaction;

const CONNECTIONS_CHANGED_HOOK: &str = "connections-changed";

/// Defers the "connections changed, recheck" signal until the transaction
/// that touched the connections table actually commits.
///
/// Marking the same transaction more than once is a no-op, and a transaction
/// that rolls back signals nobody. Committed changes produce exactly one
/// wakeup attempt.
pub struct ConnectionChangeNotifier {
    registry: Arc<WorkerRegistry>,
}

impl ConnectionChangeNotifier {
    pub fn new(registry: Arc<WorkerRegistry>) -> Self {
        ConnectionChangeNotifier { registry }
    }

    /// Mark `txn` as carrying a connection change for database `dboid`.
    /// Returns whether this call set the mark (false when already marked).
    pub fn connection_changed(&self, txn: &mut Transaction, dboid: DatabaseId) -> bool {
        let registry = self.registry.clone();
        let added = txn.register_commit_hook(
            CONNECTIONS_CHANGED_HOOK,
            Box::new(move || Box::pin(async move { signal_for_database(&registry, dboid).await })),
        );
        if !added {
            debug!("connection change for database {dboid} already pending in this transaction");
        }
        added
    }
}

/// Wake whoever is responsible for database `dboid`: the registered
/// supervisor if it has published its handle, otherwise the registrar.
async fn signal_for_database(registry: &WorkerRegistry, dboid: DatabaseId) {
    let inner = registry.write().await;
    match inner.find_supervisor_slot(dboid) {
        Some(idx) => {
            if let WorkerSlot::Supervisor(state) = inner.slot(idx) {
                match &state.wakeup {
                    Some(handle) => {
                        if handle.signal() {
                            debug!("woke supervisor for database {dboid} in slot {idx}");
                        } else {
                            debug!("supervisor for database {dboid} is gone, signal dropped");
                        }
                    }
                    // still starting; its first reconciliation sees the change
                    None => debug!("supervisor for database {dboid} has not published a handle"),
                }
            }
        }
        None => match inner.registrar_wakeup() {
            Some(handle) => {
                handle.signal();
                debug!("no supervisor for database {dboid}, woke the registrar");
            }
            None => debug!("no supervisor for database {dboid} and no registrar to wake"),
        },
    }
}
