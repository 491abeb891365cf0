use std::sync::{Arc, Weak};

use tokio::sync::Notify;

/// Owner side of a worker's wakeup signal.
///
/// The owning task keeps the `Wakeup` and waits on it; everything else only
/// ever sees a [`WakeupHandle`]. When the owner exits the `Wakeup` drops with
/// it and outstanding handles go dead.
#[derive(Debug, Default)]
pub struct Wakeup {
    notify: Arc<Notify>,
}

impl Wakeup {
    pub fn new() -> Self {
        Wakeup {
            notify: Arc::new(Notify::new()),
        }
    }

    /// A weak signalling handle that can be published into shared state.
    pub fn handle(&self) -> WakeupHandle {
        WakeupHandle {
            notify: Arc::downgrade(&self.notify),
        }
    }

    /// Wait until someone signals the handle. A signal delivered while the
    /// owner was not waiting is buffered, so a wake between two waits is not
    /// lost.
    pub async fn notified(&self) {
        self.notify.notified().await;
    }
}

/// Signalling side of a [`Wakeup`].
///
/// The handle holds a weak reference only, it never keeps the owner alive.
/// Signalling after the owner is gone is a no-op.
#[derive(Debug, Clone)]
pub struct WakeupHandle {
    notify: Weak<Notify>,
}

impl WakeupHandle {
    /// Wake the owner. Returns whether the owner was still alive.
    pub fn signal(&self) -> bool {
        match self.notify.upgrade() {
            Some(notify) => {
                notify.notify_one();
                true
            }
            None => false,
        }
    }
}
