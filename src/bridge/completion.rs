use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::Result;

/// Single-resolution outcome slot shared between the waiting task and the
/// callback threads. The first `resolve` wins, later ones are dropped.
pub(crate) struct Completion<T> {
    sender: Mutex<Option<oneshot::Sender<Result<T>>>>,
    resolved: AtomicBool,
}

impl<T> Completion<T> {
    pub(crate) fn new() -> (Arc<Self>, oneshot::Receiver<Result<T>>) {
        let (tx, rx) = oneshot::channel();
        let completion = Arc::new(Self {
            sender: Mutex::new(Some(tx)),
            resolved: AtomicBool::new(false),
        });
        (completion, rx)
    }

    /// Returns `true` if this call decided the outcome.
    pub(crate) fn resolve(&self, outcome: Result<T>) -> bool {
        let Some(sender) = self.sender.lock().take() else {
            return false;
        };
        self.resolved.store(true, Ordering::Release);
        // the receiver may already be gone if the caller dropped the future
        let _ = sender.send(outcome);
        true
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }
}
