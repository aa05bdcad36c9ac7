use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;

use crate::ids::IdAllocator;

mod types;

pub use types::*;

pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub struct SubscriptionTag;

static SUBSCRIPTION_IDS: IdAllocator<SubscriptionTag> = IdAllocator::new();

const FAULT_CATEGORY: &str = "event-handlers";

/// Multicast delivery of one notification kind to independently subscribed
/// observers.
///
/// Observers run outside the registration lock, against a snapshot taken at
/// dispatch time, so they may subscribe or unsubscribe from inside a callback.
pub struct EventDispatcher<T> {
    name: &'static str,
    observers: RwLock<Vec<(i32, Observer<T>)>>,
    fault_sink: Option<Arc<EventDispatcher<LogEntry>>>,
}

impl<T> EventDispatcher<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            observers: RwLock::new(Vec::new()),
            fault_sink: None,
        }
    }

    /// Observer panics caught by [`dispatch`](Self::dispatch) are reported to `sink`.
    pub fn with_fault_sink(mut self, sink: Arc<EventDispatcher<LogEntry>>) -> Self {
        self.fault_sink = Some(sink);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe<F>(&self, observer: F) -> i32
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SUBSCRIPTION_IDS.next();
        self.observers.write().push((id, Arc::new(observer)));
        id
    }

    /// Like [`subscribe`](Self::subscribe), but the observer is removed when the
    /// returned guard is dropped.
    pub fn subscribe_scoped<F>(self: &Arc<Self>, observer: F) -> Subscription<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.subscribe(observer);
        Subscription {
            dispatcher: Arc::clone(self),
            id,
        }
    }

    /// Removes the oldest observer registered under `id`. Ids wrap around, so
    /// at most one observer goes per call.
    pub fn unsubscribe(&self, id: i32) -> bool {
        let mut observers = self.observers.write();
        match observers.iter().position(|(existing, _)| *existing == id) {
            Some(index) => {
                observers.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.read().len()
    }

    fn snapshot(&self) -> Vec<Observer<T>> {
        self.observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }

    /// Delivers `event` to every observer, each inside its own panic boundary.
    pub fn dispatch(&self, event: &T) {
        for observer in self.snapshot() {
            let outcome = catch_unwind(AssertUnwindSafe(|| observer(event)));
            if let Err(payload) = outcome {
                self.report_fault(payload);
            }
        }
    }

    /// Delivery for high-frequency notifications: stops at the first observer
    /// that panics, but never lets the panic reach the producer.
    pub fn dispatch_fast(&self, event: &T) {
        let observers = self.snapshot();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            for observer in &observers {
                observer(event);
            }
        }));
        if let Err(payload) = outcome {
            debug!(
                "observer of '{}' panicked, remaining observers skipped: {}",
                self.name,
                panic_message(&*payload)
            );
        }
    }

    fn report_fault(&self, payload: Box<dyn Any + Send>) {
        let message = format!(
            "an observer of '{}' panicked (ignored): {}",
            self.name,
            panic_message(&*payload)
        );
        warn!("{}", message);

        // the log dispatcher has no sink, so a broken log observer cannot recurse
        if let Some(sink) = &self.fault_sink {
            sink.dispatch_fast(&LogEntry::new(LogLevel::Warning, FAULT_CATEGORY, message));
        }
    }
}

/// Removes its observer from the dispatcher on drop.
pub struct Subscription<T> {
    dispatcher: Arc<EventDispatcher<T>>,
    id: i32,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> i32 {
        self.id
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.dispatcher.unsubscribe(self.id);
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
