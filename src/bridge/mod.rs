//! Turns the begin-command / notification-stream contract of a native proxy
//! into a single awaitable outcome.
//!
//! A run subscribes its handlers, fires the synchronous `begin` command and
//! then parks on a oneshot channel. Native threads resolve the run through a
//! shared [`Completion`]; the timeout and the cancellation grace timer are
//! driven by the waiting task, so callbacks never need a runtime.

use std::future::pending;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::time::{sleep_until, Instant};

use crate::error::{classify_fatal_error, Error, FailureScope, NativeError, Result};
use crate::events::{
    panic_message, CancellationNotice, EventDispatcher, FatalError, Progress, StateChanged,
    Subscription,
};
use crate::ids::IdAllocator;
use crate::native::{NativeCallbacks, Verdict};
use crate::state::{is_monotonic, OperationState, Phase};

mod cancellation;
mod completion;
mod retry;

pub use cancellation::CancellationSignal;
pub use retry::{is_connection_unstable, run_with_retries, Attempt, RetryPolicy};

use completion::Completion;

/// How long a run waits for the native layer to confirm a cancellation before
/// resolving it on its own.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(2500);

const DEFAULT_CANCEL_REASON: &str = "cancelled by the native layer";

struct RunTag;

static RUN_IDS: IdAllocator<RunTag> = IdAllocator::new();

/// Outcome of one run together with what the retry coordinator needs to know
/// about it.
#[derive(Debug)]
pub struct RunReport<T> {
    pub outcome: Result<T>,
    /// Progress notifications seen since the last `Idle` state.
    pub progress_events: usize,
    pub cancellation_requested: bool,
    pub cancellation_reason: String,
}

impl<T> RunReport<T> {
    pub fn from_outcome(outcome: Result<T>) -> Self {
        Self {
            outcome,
            progress_events: 0,
            cancellation_requested: false,
            cancellation_reason: String::new(),
        }
    }
}

pub struct OperationBridge<S> {
    callbacks: Arc<NativeCallbacks<S>>,
    grace_period: Duration,
}

impl<S: OperationState> OperationBridge<S> {
    pub fn new(callbacks: Arc<NativeCallbacks<S>>) -> Self {
        Self {
            callbacks,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn callbacks(&self) -> &Arc<NativeCallbacks<S>> {
        &self.callbacks
    }

    fn scope() -> FailureScope {
        if S::KIND.is_transfer() {
            FailureScope::Transfer
        } else {
            FailureScope::Device
        }
    }

    /// Runs one operation to completion.
    ///
    /// `begin` is invoked exactly once, synchronously, after the handlers are
    /// in place. `on_success` turns the terminal-success notification into
    /// the returned value. Without a `timeout` the run waits indefinitely.
    pub async fn run<T, V, B, F>(
        &self,
        resource: Option<&str>,
        timeout: Option<Duration>,
        begin: B,
        on_success: F,
    ) -> Result<T>
    where
        T: Send + 'static,
        V: Verdict,
        B: FnOnce() -> std::result::Result<V, NativeError>,
        F: Fn(&StateChanged<S>) -> T + Send + Sync + 'static,
    {
        self.run_observed(resource, timeout, begin, on_success)
            .await
            .outcome
    }

    /// Like [`run`](Self::run), but also reports progress and cancellation
    /// activity observed during the run.
    pub async fn run_observed<T, V, B, F>(
        &self,
        resource: Option<&str>,
        timeout: Option<Duration>,
        begin: B,
        on_success: F,
    ) -> RunReport<T>
    where
        T: Send + 'static,
        V: Verdict,
        B: FnOnce() -> std::result::Result<V, NativeError>,
        F: Fn(&StateChanged<S>) -> T + Send + Sync + 'static,
    {
        let run_id = RUN_IDS.next();
        let category = self.callbacks.category();
        let target = resource.unwrap_or("device");

        let (completion, mut rx) = Completion::new();
        let cancellation = Arc::new(CancellationSignal::new());
        let progress_events = Arc::new(AtomicUsize::new(0));

        // dropped on every exit path, including when this future is dropped
        let _subscriptions = self.subscribe_run(
            run_id,
            resource,
            &completion,
            &cancellation,
            &progress_events,
            on_success,
        );

        debug!(
            "[{}#{}] beginning {} of {}",
            category,
            run_id,
            S::KIND.as_str(),
            target
        );
        self.begin(run_id, resource, &completion, begin);

        let timeout_at = timeout.map(|timeout| Instant::now() + timeout);
        let mut timed_out = false;
        let mut grace_at: Option<Instant> = None;
        let mut grace_elapsed = false;

        let outcome = loop {
            tokio::select! {
                biased;

                received = &mut rx => {
                    break received.unwrap_or_else(|_| {
                        Err(Error::internal(resource, "run ended without an outcome"))
                    });
                }

                _ = sleep_until_opt(timeout_at), if !timed_out => {
                    timed_out = true;
                    let timeout = timeout.unwrap_or_default();
                    let failure = Error::Timeout {
                        resource: resource.map(str::to_owned),
                        timeout,
                    };
                    if completion.resolve(Err(failure)) {
                        warn!(
                            "[{}#{}] {} of {} timed out after {}ms",
                            category,
                            run_id,
                            S::KIND.as_str(),
                            target,
                            timeout.as_millis()
                        );
                        self.emit_synthetic(run_id, resource, S::error_state());
                    }
                }

                _ = cancellation.armed(), if grace_at.is_none() => {
                    debug!(
                        "[{}#{}] cancellation requested, waiting up to {}ms for confirmation",
                        category,
                        run_id,
                        self.grace_period.as_millis()
                    );
                    grace_at = Some(Instant::now() + self.grace_period);
                }

                _ = sleep_until_opt(grace_at), if grace_at.is_some() && !grace_elapsed => {
                    grace_elapsed = true;
                    let reason = cancel_reason(cancellation.reason());
                    if completion.resolve(Err(Error::Cancelled { reason: reason.clone() })) {
                        warn!(
                            "[{}#{}] native layer did not confirm the cancellation in time, forcing it",
                            category,
                            run_id
                        );
                        self.emit_synthetic(run_id, resource, S::cancelled_state());
                        if S::KIND.is_transfer() {
                            self.callbacks.on_cancelled(&reason);
                        }
                    }
                }
            }
        };

        match &outcome {
            Ok(_) => info!(
                "[{}#{}] {} of {} completed",
                category,
                run_id,
                S::KIND.as_str(),
                target
            ),
            Err(err) => warn!("[{}#{}] {}", category, run_id, err),
        }

        RunReport {
            outcome,
            progress_events: progress_events.load(Ordering::Acquire),
            cancellation_requested: cancellation.is_armed(),
            cancellation_reason: cancellation.reason(),
        }
    }

    /// Collects cancellation requests for `resource` until the returned watch
    /// is dropped. Unlike the per-run handlers it also hears requests made
    /// between runs, e.g. while a retry loop sleeps.
    pub fn watch_cancellation(&self, resource: Option<&str>) -> CancellationWatch<S> {
        let signal = Arc::new(CancellationSignal::new());
        let target: Option<Arc<str>> = resource.map(Arc::from);

        let state_changed = {
            let signal = signal.clone();
            self.callbacks
                .state_changed()
                .subscribe_scoped(move |event: &StateChanged<S>| {
                    let new = event.new_state;
                    if (new.is_cancelling() || new.is_cancelled())
                        && concerns(target.as_deref(), event.resource.as_deref())
                    {
                        signal.arm("");
                    }
                })
        };

        let notice = |dispatcher: &Arc<EventDispatcher<CancellationNotice>>| {
            let signal = signal.clone();
            dispatcher.subscribe_scoped(move |notice: &CancellationNotice| {
                signal.arm(&notice.reason);
            })
        };
        let cancelling = notice(self.callbacks.cancelling());
        let cancelled = notice(self.callbacks.cancelled());

        CancellationWatch {
            signal,
            _state_changed: state_changed,
            _notices: (cancelling, cancelled),
        }
    }

    fn begin<T, V, B>(
        &self,
        run_id: i32,
        resource: Option<&str>,
        completion: &Completion<T>,
        begin: B,
    ) where
        V: Verdict,
        B: FnOnce() -> std::result::Result<V, NativeError>,
    {
        let failure = match catch_unwind(AssertUnwindSafe(begin)) {
            Ok(Ok(verdict)) if verdict.is_success() => return,
            Ok(Ok(verdict)) => {
                warn!(
                    "[{}#{}] native layer refused to begin: {:?}",
                    self.callbacks.category(),
                    run_id,
                    verdict
                );
                completion.resolve(Err(verdict.into_error(resource)));
                return;
            }
            Ok(Err(source)) => Error::InternalError {
                resource: resource.map(str::to_owned),
                message: source.to_string(),
                source: Some(source),
            },
            Err(payload) => Error::internal(
                resource,
                format!("native command panicked: {}", panic_message(&*payload)),
            ),
        };

        error!("[{}#{}] {}", self.callbacks.category(), run_id, failure);
        if completion.resolve(Err(failure)) {
            self.emit_synthetic(run_id, resource, S::error_state());
        }
    }

    fn emit_synthetic(&self, run_id: i32, resource: Option<&str>, state: S) {
        debug!(
            "[{}#{}] emitting synthetic {:?} -> {:?}",
            self.callbacks.category(),
            run_id,
            S::neutral(),
            state
        );
        self.callbacks
            .emit_state_changed(StateChanged::new(resource, S::neutral(), state));
    }

    fn subscribe_run<T, F>(
        &self,
        run_id: i32,
        resource: Option<&str>,
        completion: &Arc<Completion<T>>,
        cancellation: &Arc<CancellationSignal>,
        progress_events: &Arc<AtomicUsize>,
        on_success: F,
    ) -> RunSubscriptions<S>
    where
        T: Send + 'static,
        F: Fn(&StateChanged<S>) -> T + Send + Sync + 'static,
    {
        let category = self.callbacks.category();
        let target: Option<Arc<str>> = resource.map(Arc::from);

        let state_changed = {
            let target = target.clone();
            let completion = completion.clone();
            let cancellation = cancellation.clone();
            let progress_events = progress_events.clone();
            self.callbacks
                .state_changed()
                .subscribe_scoped(move |event: &StateChanged<S>| {
                    if !concerns(target.as_deref(), event.resource.as_deref()) {
                        return;
                    }

                    let (old, new) = (event.old_state, event.new_state);
                    if !is_monotonic(old, new) {
                        warn!(
                            "[{}#{}] unexpected transition {:?} -> {:?}",
                            category, run_id, old, new
                        );
                    }

                    if new.phase() == Phase::Idle {
                        progress_events.store(0, Ordering::Release);
                    } else if new.is_terminal_success() {
                        if !completion.is_resolved() {
                            completion.resolve(Ok(on_success(event)));
                        }
                    } else if new.is_cancelling() {
                        cancellation.arm("");
                    } else if new.is_cancelled() {
                        completion.resolve(Err(cancelled(cancellation.reason())));
                    }
                })
        };

        let fatal_error = {
            let scope = Self::scope();
            let target = target.clone();
            let completion = completion.clone();
            self.callbacks
                .fatal_error()
                .subscribe_scoped(move |event: &FatalError| {
                    if !concerns(target.as_deref(), event.resource.as_deref()) {
                        return;
                    }
                    let resource = event.resource.as_deref().or(target.as_deref());
                    completion.resolve(Err(classify_fatal_error(
                        scope,
                        resource,
                        &event.message,
                        event.code,
                    )));
                })
        };

        let progress = {
            let target = target.clone();
            let progress_events = progress_events.clone();
            self.callbacks
                .progress()
                .subscribe_scoped(move |event: &Progress| {
                    if concerns(target.as_deref(), event.resource.as_deref()) {
                        progress_events.fetch_add(1, Ordering::AcqRel);
                    }
                })
        };

        let cancellation_notices = S::KIND.is_transfer().then(|| {
            let signal = cancellation.clone();
            let cancelling = self
                .callbacks
                .cancelling()
                .subscribe_scoped(move |notice: &CancellationNotice| {
                    signal.arm(&notice.reason);
                });

            let signal = cancellation.clone();
            let completion = completion.clone();
            let cancelled = self
                .callbacks
                .cancelled()
                .subscribe_scoped(move |notice: &CancellationNotice| {
                    let reason = if notice.reason.is_empty() {
                        signal.reason()
                    } else {
                        notice.reason.clone()
                    };
                    completion.resolve(Err(cancelled(reason)));
                });

            (cancelling, cancelled)
        });

        RunSubscriptions {
            _state_changed: state_changed,
            _fatal_error: fatal_error,
            _progress: progress,
            _cancellation_notices: cancellation_notices,
        }
    }
}

pub struct CancellationWatch<S> {
    signal: Arc<CancellationSignal>,
    _state_changed: Subscription<StateChanged<S>>,
    _notices: (
        Subscription<CancellationNotice>,
        Subscription<CancellationNotice>,
    ),
}

impl<S> CancellationWatch<S> {
    pub fn signal(&self) -> &CancellationSignal {
        &self.signal
    }
}

struct RunSubscriptions<S> {
    _state_changed: Subscription<StateChanged<S>>,
    _fatal_error: Subscription<FatalError>,
    _progress: Subscription<Progress>,
    _cancellation_notices: Option<(
        Subscription<CancellationNotice>,
        Subscription<CancellationNotice>,
    )>,
}

fn cancelled(reason: String) -> Error {
    Error::Cancelled {
        reason: cancel_reason(reason),
    }
}

fn cancel_reason(reason: String) -> String {
    if reason.is_empty() {
        DEFAULT_CANCEL_REASON.to_owned()
    } else {
        reason
    }
}

/// Notifications without a resource id concern every run.
fn concerns(target: Option<&str>, reported: Option<&str>) -> bool {
    match (target, reported) {
        (Some(target), Some(reported)) => target == reported,
        _ => true,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}
