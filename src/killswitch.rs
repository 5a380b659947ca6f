use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::time::{self, Duration};

/// Process-wide cooperative cancellation flag. Monotonic: `false -> true`
/// only, never resets. Safe for many readers and many writers; reads are
/// lock-free, writes are a single atomic store plus a notify wakeup so
/// sleepers don't have to poll.
#[derive(Clone)]
pub struct Killswitch {
    engaged: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Killswitch {
    pub fn new() -> Self {
        Self {
            engaged: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Engage the killswitch. Idempotent.
    pub fn engage(&self) {
        self.engaged.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn engaged(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early if the killswitch engages.
    /// Returns `true` if the sleep completed, `false` if it was cut short
    /// by cancellation.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.engaged() {
            return false;
        }
        let notified = self.notify.notified();
        tokio::select! {
            _ = time::sleep(duration) => !self.engaged(),
            _ = notified => false,
        }
    }

    /// Resolves once the killswitch engages. Returns immediately if it is
    /// already engaged.
    pub async fn wait_engaged(&self) {
        if self.engaged() {
            return;
        }
        let notified = self.notify.notified();
        if self.engaged() {
            return;
        }
        notified.await;
    }
}

impl Default for Killswitch {
    fn default() -> Self {
        Self::new()
    }
}
