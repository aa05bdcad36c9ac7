use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Record of a native-side cancellation request.
///
/// Armed by the first `Cancelling` notification it hears; the waiting task
/// then starts the grace timer or stops retrying. Arming again is a no-op.
#[derive(Default)]
pub struct CancellationSignal {
    armed: AtomicBool,
    reason: Mutex<Option<String>>,
    notify: Notify,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` only for the call that armed the signal. The first
    /// non-empty reason is kept, even if it arrives after arming.
    pub fn arm(&self, reason: &str) -> bool {
        if !reason.is_empty() {
            self.reason.lock().get_or_insert_with(|| reason.to_owned());
        }
        if self.armed.swap(true, Ordering::AcqRel) {
            return false;
        }
        // notify_one keeps a permit if nobody is waiting yet
        self.notify.notify_one();
        true
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> String {
        self.reason.lock().clone().unwrap_or_default()
    }

    /// Completes once the signal has been armed.
    pub async fn armed(&self) {
        if self.is_armed() {
            return;
        }
        self.notify.notified().await;
    }
}
