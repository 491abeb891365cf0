use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use common::ConnectionRow;
use log::debug;

/// Read access to the connections table.
///
/// Implementations run their own internal read snapshot; callers must not be
/// inside an open [`Transaction`] of their own when they ask.
#[async_trait]
pub trait ConnectionsSource: Send + Sync {
    /// Every row of the connections table, the local node's own row included.
    async fn rows(&self) -> Result<Vec<ConnectionRow>>;
}

/// A deferred action run after a transaction commits.
pub type CommitHook = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

enum Change {
    Upsert(ConnectionRow),
    Remove(ConnectionRow),
}

/// In-memory connections table with explicit transactions.
///
/// Stands in for the SQL table in tests and standalone deployments. Rows are
/// keyed by their identity triple; an upsert replaces the matching row.
#[derive(Default)]
pub struct MemoryConnectionStore {
    rows: Mutex<Vec<ConnectionRow>>,
}

impl MemoryConnectionStore {
    pub fn new() -> Self {
        MemoryConnectionStore::default()
    }

    pub fn with_rows(rows: Vec<ConnectionRow>) -> Self {
        MemoryConnectionStore {
            rows: Mutex::new(rows),
        }
    }

    /// Open a transaction against this store.
    pub fn begin(self: &Arc<Self>) -> Transaction {
        Transaction {
            store: self.clone(),
            changes: Vec::new(),
            hooks: Vec::new(),
            hook_tags: HashSet::new(),
        }
    }

    /// A point-in-time copy of the table.
    pub fn snapshot(&self) -> Vec<ConnectionRow> {
        self.rows.lock().expect("connections store lock poisoned").clone()
    }
}

#[async_trait]
impl ConnectionsSource for MemoryConnectionStore {
    async fn rows(&self) -> Result<Vec<ConnectionRow>> {
        Ok(self.snapshot())
    }
}

fn same_identity(a: &ConnectionRow, b: &ConnectionRow) -> bool {
    a.sysid == b.sysid && a.timeline == b.timeline && a.dboid == b.dboid
}

/// One open transaction against a [`MemoryConnectionStore`].
///
/// Changes are staged until [`commit`] applies them and then runs the
/// registered commit hooks, in registration order. Dropping the transaction
/// without committing, or calling [`rollback`], discards both the staged
/// changes and the hooks.
///
/// [`commit`]: Transaction::commit
/// [`rollback`]: Transaction::rollback
pub struct Transaction {
    store: Arc<MemoryConnectionStore>,
    changes: Vec<Change>,
    hooks: Vec<CommitHook>,
    hook_tags: HashSet<&'static str>,
}

impl Transaction {
    /// Stage an insert-or-replace of `row`.
    pub fn upsert(&mut self, row: ConnectionRow) {
        self.changes.push(Change::Upsert(row));
    }

    /// Stage removal of the row with `row`'s identity triple.
    pub fn remove(&mut self, row: ConnectionRow) {
        self.changes.push(Change::Remove(row));
    }

    /// Register a commit hook, at most once per `tag` within this
    /// transaction. Returns whether the hook was actually added.
    pub fn register_commit_hook(&mut self, tag: &'static str, hook: CommitHook) -> bool {
        if !self.hook_tags.insert(tag) {
            return false;
        }
        self.hooks.push(hook);
        true
    }

    /// Apply the staged changes, then run the commit hooks.
    pub async fn commit(self) {
        {
            let mut rows = self
                .store
                .rows
                .lock()
                .expect("connections store lock poisoned");
            for change in self.changes {
                match change {
                    Change::Upsert(row) => {
                        match rows.iter_mut().find(|r| same_identity(r, &row)) {
                            Some(existing) => *existing = row,
                            None => rows.push(row),
                        }
                    }
                    Change::Remove(row) => rows.retain(|r| !same_identity(r, &row)),
                }
            }
        }
        debug!("transaction committed, running {} hook(s)", self.hooks.len());
        for hook in self.hooks {
            hook().await;
        }
    }

    /// Discard the staged changes and hooks without applying anything.
    pub fn rollback(self) {
        debug!("transaction rolled back, {} hook(s) dropped", self.hooks.len());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_hook(counter: Arc<AtomicUsize>) -> CommitHook {
        Box::new(move || {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test]
    async fn commit_applies_staged_rows() {
        let store = Arc::new(MemoryConnectionStore::new());
        let mut txn = store.begin();
        txn.upsert(ConnectionRow::new("100", 1, 6));
        txn.upsert(ConnectionRow::new("100", 1, 7));
        txn.commit().await;
        assert_eq!(store.snapshot().len(), 2);

        // replace, not duplicate
        let mut txn = store.begin();
        txn.upsert(ConnectionRow::new("100", 1, 6));
        txn.commit().await;
        assert_eq!(store.snapshot().len(), 2);

        let mut txn = store.begin();
        txn.remove(ConnectionRow::new("100", 1, 7));
        txn.commit().await;
        assert_eq!(store.snapshot(), vec![ConnectionRow::new("100", 1, 6)]);
    }

    #[tokio::test]
    async fn rollback_discards_rows_and_hooks() {
        let store = Arc::new(MemoryConnectionStore::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let mut txn = store.begin();
        txn.upsert(ConnectionRow::new("100", 1, 6));
        txn.register_commit_hook("test", counting_hook(fired.clone()));
        txn.rollback();
        assert!(store.snapshot().is_empty());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn commit_hooks_run_once_per_tag() {
        let store = Arc::new(MemoryConnectionStore::new());
        let fired = Arc::new(AtomicUsize::new(0));
        let mut txn = store.begin();
        assert!(txn.register_commit_hook("test", counting_hook(fired.clone())));
        assert!(!txn.register_commit_hook("test", counting_hook(fired.clone())));
        assert!(txn.register_commit_hook("other", counting_hook(fired.clone())));
        txn.commit().await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn source_rows_includes_every_row() {
        let store = MemoryConnectionStore::with_rows(vec![
            ConnectionRow::new("100", 1, 5),
            ConnectionRow::new("100", 1, 6),
            ConnectionRow::new("200", 1, 5),
        ]);
        let rows = ConnectionsSource::rows(&store).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], ConnectionRow::new("100", 1, 5));
    }
}
