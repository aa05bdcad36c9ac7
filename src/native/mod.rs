//! The boundary towards the platform SDKs.
//!
//! A native proxy implements one of the `*Proxy` traits (the command surface)
//! and, once attached, reports everything that happens on the device through
//! [`NativeCallbacks`] (the callback surface). Callbacks may be invoked from
//! any thread.

use std::sync::Arc;

use bytes::Bytes;
use log::error;
use parking_lot::Mutex;

use crate::error::NativeError;
use crate::events::{
    BusyStateChanged, CancellationNotice, EventDispatcher, FatalError, LogEntry, LogLevel, Progress, StateChanged,
};
use crate::state::{
    DownloadState, ErasureState, InstallationState, OperationState, ResetState, UploadState,
};

mod types;

pub use types::*;

pub trait NativeProxy: Send + Sync {
    type State: OperationState;

    /// Wires the proxy to the callback surface it must report to.
    fn attach(&self, callbacks: Arc<NativeCallbacks<Self::State>>);

    /// Asks the native layer to stop the running operation. Confirmation
    /// arrives asynchronously as a `cancelling`/`cancelled` notification.
    fn cancel(&self, _reason: &str) -> bool {
        false
    }

    fn disconnect(&self) -> bool;
}

pub trait PausableProxy: NativeProxy {
    fn pause(&self) -> bool;

    fn resume(&self) -> bool;
}

pub trait FirmwareInstallerProxy: NativeProxy<State = InstallationState> {
    fn begin_installation(
        &self,
        firmware: &[u8],
        options: &InstallOptions,
    ) -> Result<InstallationVerdict, NativeError>;
}

pub trait FileUploaderProxy: PausableProxy<State = UploadState> {
    fn begin_upload(
        &self,
        remote_path: &str,
        data: &[u8],
        settings: &TransferSettings,
    ) -> Result<UploadVerdict, NativeError>;
}

pub trait FileDownloaderProxy: PausableProxy<State = DownloadState> {
    fn begin_download(
        &self,
        remote_path: &str,
        settings: &TransferSettings,
    ) -> Result<DownloadVerdict, NativeError>;
}

pub trait FirmwareEraserProxy: NativeProxy<State = ErasureState> {
    fn begin_erasure(&self, image_index: u32) -> Result<ErasureVerdict, NativeError>;
}

pub trait DeviceResetterProxy: NativeProxy<State = ResetState> {
    fn begin_reset(&self) -> Result<ResetVerdict, NativeError>;
}

/// Callback surface of one operation client.
///
/// Every notification kind has its own dispatcher. State changes, fatal errors
/// and cancellation notices get fully isolated delivery; log and progress
/// notifications use the faster stop-on-first-panic mode.
pub struct NativeCallbacks<S> {
    category: &'static str,
    state_changed: Arc<EventDispatcher<StateChanged<S>>>,
    fatal_error: Arc<EventDispatcher<FatalError>>,
    progress: Arc<EventDispatcher<Progress>>,
    log: Arc<EventDispatcher<LogEntry>>,
    cancelling: Arc<EventDispatcher<CancellationNotice>>,
    cancelled: Arc<EventDispatcher<CancellationNotice>>,
    busy_state_changed: Arc<EventDispatcher<BusyStateChanged>>,
    state: Mutex<S>,
    last_fatal_error: Mutex<Option<FatalError>>,
}

impl<S: OperationState> NativeCallbacks<S> {
    pub fn new(category: &'static str) -> Self {
        let log = Arc::new(EventDispatcher::new("log"));
        Self {
            category,
            state_changed: Arc::new(
                EventDispatcher::new("state-changed").with_fault_sink(log.clone()),
            ),
            fatal_error: Arc::new(
                EventDispatcher::new("fatal-error").with_fault_sink(log.clone()),
            ),
            progress: Arc::new(EventDispatcher::new("progress").with_fault_sink(log.clone())),
            cancelling: Arc::new(EventDispatcher::new("cancelling").with_fault_sink(log.clone())),
            cancelled: Arc::new(EventDispatcher::new("cancelled").with_fault_sink(log.clone())),
            busy_state_changed: Arc::new(
                EventDispatcher::new("busy-state-changed").with_fault_sink(log.clone()),
            ),
            log,
            state: Mutex::new(S::neutral()),
            last_fatal_error: Mutex::new(None),
        }
    }

    pub fn category(&self) -> &'static str {
        self.category
    }

    /// Last state reported through this surface, synthetic ones included.
    pub fn state(&self) -> S {
        *self.state.lock()
    }

    pub fn last_fatal_error(&self) -> Option<FatalError> {
        self.last_fatal_error.lock().clone()
    }

    pub fn on_state_changed(&self, resource: Option<&str>, old_state: S, new_state: S) {
        self.emit_state_changed(StateChanged::new(resource, old_state, new_state));
    }

    /// State change carrying the operation's result, e.g. the downloaded bytes
    /// on `* -> Complete`.
    pub fn on_state_changed_with_data(
        &self,
        resource: Option<&str>,
        old_state: S,
        new_state: S,
        data: impl Into<Bytes>,
    ) {
        self.emit_state_changed(StateChanged::new(resource, old_state, new_state).with_data(data));
    }

    pub fn emit_state_changed(&self, event: StateChanged<S>) {
        *self.state.lock() = event.new_state;
        self.state_changed.dispatch(&event);
    }

    pub fn on_fatal_error(&self, resource: Option<&str>, message: &str, code: ErrorCode) {
        error!("[{}] fatal error [{}]: {}", self.category, code, message);

        let event = FatalError {
            resource: resource.map(str::to_owned),
            message: message.to_owned(),
            code,
        };
        *self.last_fatal_error.lock() = Some(event.clone());

        self.log.dispatch_fast(
            &LogEntry::new(
                LogLevel::Error,
                self.category,
                format!("[{}] {}", code, message),
            )
            .for_resource(resource),
        );
        self.fatal_error.dispatch(&event);
    }

    pub fn on_progress(
        &self,
        resource: Option<&str>,
        percentage: u8,
        current_throughput: f32,
        average_throughput: f32,
    ) {
        self.progress.dispatch_fast(&Progress {
            resource: resource.map(str::to_owned),
            percentage: percentage.min(100),
            current_throughput,
            average_throughput,
        });
    }

    pub fn on_log(&self, resource: Option<&str>, message: &str, category: &str, level: LogLevel) {
        let facade_level: log::Level = level.into();
        log::log!(facade_level, "[{}/{}] {}", self.category, category, message);

        self.log.dispatch_fast(&LogEntry {
            resource: resource.map(str::to_owned),
            message: message.to_owned(),
            category: category.to_owned(),
            level,
        });
    }

    pub fn on_cancelling(&self, reason: &str) {
        self.cancelling.dispatch(&CancellationNotice {
            reason: reason.to_owned(),
        });
    }

    pub fn on_cancelled(&self, reason: &str) {
        self.cancelled.dispatch(&CancellationNotice {
            reason: reason.to_owned(),
        });
    }

    pub fn on_busy_state_changed(&self, busy: bool) {
        self.busy_state_changed.dispatch(&BusyStateChanged { busy });
    }

    pub fn state_changed(&self) -> &Arc<EventDispatcher<StateChanged<S>>> {
        &self.state_changed
    }

    pub fn fatal_error(&self) -> &Arc<EventDispatcher<FatalError>> {
        &self.fatal_error
    }

    pub fn progress(&self) -> &Arc<EventDispatcher<Progress>> {
        &self.progress
    }

    pub fn log(&self) -> &Arc<EventDispatcher<LogEntry>> {
        &self.log
    }

    pub fn cancelling(&self) -> &Arc<EventDispatcher<CancellationNotice>> {
        &self.cancelling
    }

    pub fn cancelled(&self) -> &Arc<EventDispatcher<CancellationNotice>> {
        &self.cancelled
    }

    pub fn busy_state_changed(&self) -> &Arc<EventDispatcher<BusyStateChanged>> {
        &self.busy_state_changed
    }

    /// Total number of observers across all notification kinds.
    pub fn subscriber_count(&self) -> usize {
        self.state_changed.subscriber_count()
            + self.fatal_error.subscriber_count()
            + self.progress.subscriber_count()
            + self.log.subscriber_count()
            + self.cancelling.subscriber_count()
            + self.cancelled.subscriber_count()
            + self.busy_state_changed.subscriber_count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn tracks_last_state_and_fatal_error() {
        let callbacks = NativeCallbacks::<ResetState>::new("device-resetter");
        assert_eq!(callbacks.state(), ResetState::None);

        callbacks.on_state_changed(None, ResetState::Idle, ResetState::Resetting);
        assert_eq!(callbacks.state(), ResetState::Resetting);

        callbacks.on_fatal_error(None, "device went away", ErrorCode::GENERIC);
        let last = callbacks.last_fatal_error().expect("fatal error recorded");
        assert_eq!(last.message, "device went away");
        assert_eq!(last.code, ErrorCode::GENERIC);
    }

    #[test]
    fn forwards_busy_state_changes() {
        let callbacks = NativeCallbacks::<InstallationState>::new("firmware-installer");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        callbacks
            .busy_state_changed()
            .subscribe(move |event: &BusyStateChanged| sink.lock().push(event.busy));
        assert_eq!(callbacks.subscriber_count(), 1);

        callbacks.on_busy_state_changed(true);
        callbacks.on_busy_state_changed(false);

        assert_eq!(*seen.lock(), vec![true, false]);
    }

    #[test]
    fn fatal_errors_are_mirrored_to_the_log_stream() {
        let callbacks = NativeCallbacks::<ErasureState>::new("firmware-eraser");
        let entries = Arc::new(Mutex::new(Vec::new()));
        let sink = entries.clone();
        callbacks
            .log()
            .subscribe(move |entry: &LogEntry| sink.lock().push(entry.clone()));

        callbacks.on_fatal_error(None, "flash erase failed", ErrorCode::CORRUPT);

        let entries = entries.lock();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Error);
        assert_eq!(entries[0].category, "firmware-eraser");
        assert!(entries[0].message.contains("flash erase failed"));
    }

    #[test]
    fn panicking_state_observer_is_reported_on_the_log_stream() {
        let callbacks = NativeCallbacks::<DownloadState>::new("file-downloader");
        let faults = Arc::new(AtomicUsize::new(0));
        let seen = faults.clone();
        callbacks.log().subscribe(move |_: &LogEntry| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        callbacks
            .state_changed()
            .subscribe(|_: &StateChanged<DownloadState>| panic!("observer bug"));

        callbacks.on_state_changed(Some("/a"), DownloadState::Idle, DownloadState::Downloading);

        assert_eq!(faults.load(Ordering::SeqCst), 1);
        assert_eq!(callbacks.state(), DownloadState::Downloading);
    }

    #[test]
    fn progress_percentage_is_clamped() {
        let callbacks = NativeCallbacks::<UploadState>::new("file-uploader");
        let last = Arc::new(Mutex::new(None));
        let sink = last.clone();
        callbacks
            .progress()
            .subscribe(move |p: &Progress| *sink.lock() = Some(p.percentage));

        callbacks.on_progress(Some("/a"), 150, 1.0, 1.0);
        assert_eq!(*last.lock(), Some(100));
    }
}
