//! Scripted stand-in for a platform SDK.
//!
//! Every `begin_*` call pops the next [`Script`] and replays its steps on a
//! freshly spawned thread, the way native SDKs call back from their own
//! threads.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mcumgr::native::{
    DeviceResetterProxy, DownloadVerdict, ErasureVerdict, FileDownloaderProxy, FileUploaderProxy,
    FirmwareEraserProxy, FirmwareInstallerProxy, InstallationVerdict, NativeProxy, PausableProxy,
    ResetVerdict, UploadVerdict,
};
use mcumgr::{
    DownloadState, ErasureState, ErrorCode, InstallOptions, InstallationState, NativeCallbacks,
    NativeError, OperationState, ResetState, StateChanged, TransferSettings, UploadState,
};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
pub enum Step<S> {
    State(S, S),
    Data(S, S, Vec<u8>),
    Fatal(&'static str, ErrorCode),
    Progress(u8),
    Cancelling(&'static str),
    Cancelled(&'static str),
    Wait(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Begin {
    Accept,
    Refuse,
    Busy,
    Fault,
    Panic,
}

#[derive(Debug, Clone)]
pub struct Script<S> {
    pub begin: Begin,
    pub steps: Vec<Step<S>>,
}

impl<S> Script<S> {
    pub fn accept(steps: Vec<Step<S>>) -> Self {
        Self {
            begin: Begin::Accept,
            steps,
        }
    }

    pub fn begin(begin: Begin) -> Self {
        Self {
            begin,
            steps: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub resource: Option<String>,
    pub settings: TransferSettings,
}

struct Inner<S> {
    callbacks: Mutex<Option<Arc<NativeCallbacks<S>>>>,
    scripts: Mutex<VecDeque<Script<S>>>,
    on_cancel: Mutex<Vec<Step<S>>>,
    calls: Mutex<Vec<Call>>,
    cancel_reasons: Mutex<Vec<String>>,
}

/// Cloneable handle: one clone goes into the client, the test keeps another.
pub struct FakeProxy<S>(Arc<Inner<S>>);

impl<S> Clone for FakeProxy<S> {
    fn clone(&self) -> Self {
        FakeProxy(self.0.clone())
    }
}

impl<S: OperationState> FakeProxy<S> {
    pub fn new() -> Self {
        FakeProxy(Arc::new(Inner {
            callbacks: Mutex::new(None),
            scripts: Mutex::new(VecDeque::new()),
            on_cancel: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            cancel_reasons: Mutex::new(Vec::new()),
        }))
    }

    pub fn with_scripts(scripts: Vec<Script<S>>) -> Self {
        let proxy = Self::new();
        proxy.0.scripts.lock().extend(scripts);
        proxy
    }

    pub fn push(&self, script: Script<S>) {
        self.0.scripts.lock().push_back(script);
    }

    /// Steps replayed when the client asks to cancel.
    pub fn on_cancel(&self, steps: Vec<Step<S>>) {
        *self.0.on_cancel.lock() = steps;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.calls.lock().clone()
    }

    pub fn cancel_reasons(&self) -> Vec<String> {
        self.0.cancel_reasons.lock().clone()
    }

    pub fn callbacks(&self) -> Arc<NativeCallbacks<S>> {
        self.0
            .callbacks
            .lock()
            .clone()
            .expect("proxy was not attached")
    }

    fn start(
        &self,
        resource: Option<&str>,
        settings: TransferSettings,
    ) -> Result<Begin, NativeError> {
        self.0.calls.lock().push(Call {
            resource: resource.map(str::to_owned),
            settings,
        });

        // without a script the device stays silent forever
        let script = self
            .0
            .scripts
            .lock()
            .pop_front()
            .unwrap_or_else(|| Script::accept(Vec::new()));

        match script.begin {
            Begin::Accept => {
                self.play(resource, script.steps);
                Ok(Begin::Accept)
            }
            Begin::Fault => Err("entry point not found in native library".into()),
            Begin::Panic => panic!("native library is missing"),
            other => Ok(other),
        }
    }

    fn play(&self, resource: Option<&str>, steps: Vec<Step<S>>) {
        if steps.is_empty() {
            return;
        }
        let callbacks = self.callbacks();
        let resource = resource.map(str::to_owned);
        thread::spawn(move || {
            let resource = resource.as_deref();
            for step in steps {
                match step {
                    Step::State(old, new) => callbacks.on_state_changed(resource, old, new),
                    Step::Data(old, new, data) => {
                        callbacks.on_state_changed_with_data(resource, old, new, data)
                    }
                    Step::Fatal(message, code) => callbacks.on_fatal_error(resource, message, code),
                    Step::Progress(percentage) => {
                        callbacks.on_progress(resource, percentage, 10.0, 10.0)
                    }
                    Step::Cancelling(reason) => callbacks.on_cancelling(reason),
                    Step::Cancelled(reason) => callbacks.on_cancelled(reason),
                    Step::Wait(duration) => thread::sleep(duration),
                }
            }
        });
    }
}

fn verdict<V>(begun: Result<Begin, NativeError>, ok: V, refused: V, busy: V) -> Result<V, NativeError> {
    Ok(match begun? {
        Begin::Accept => ok,
        Begin::Busy => busy,
        _ => refused,
    })
}

impl<S: OperationState> NativeProxy for FakeProxy<S> {
    type State = S;

    fn attach(&self, callbacks: Arc<NativeCallbacks<S>>) {
        *self.0.callbacks.lock() = Some(callbacks);
    }

    fn cancel(&self, reason: &str) -> bool {
        self.0.cancel_reasons.lock().push(reason.to_owned());
        let steps = self.0.on_cancel.lock().clone();
        self.play(None, steps);
        true
    }

    fn disconnect(&self) -> bool {
        true
    }
}

impl<S: OperationState> PausableProxy for FakeProxy<S> {
    fn pause(&self) -> bool {
        true
    }

    fn resume(&self) -> bool {
        true
    }
}

impl FileDownloaderProxy for FakeProxy<DownloadState> {
    fn begin_download(
        &self,
        remote_path: &str,
        settings: &TransferSettings,
    ) -> Result<DownloadVerdict, NativeError> {
        verdict(
            self.start(Some(remote_path), *settings),
            DownloadVerdict::Success,
            DownloadVerdict::FailedInvalidSettings,
            DownloadVerdict::FailedDownloadAlreadyInProgress,
        )
    }
}

impl FileUploaderProxy for FakeProxy<UploadState> {
    fn begin_upload(
        &self,
        remote_path: &str,
        _data: &[u8],
        settings: &TransferSettings,
    ) -> Result<UploadVerdict, NativeError> {
        verdict(
            self.start(Some(remote_path), *settings),
            UploadVerdict::Success,
            UploadVerdict::FailedInvalidData,
            UploadVerdict::FailedUploadAlreadyInProgress,
        )
    }
}

impl FirmwareInstallerProxy for FakeProxy<InstallationState> {
    fn begin_installation(
        &self,
        _firmware: &[u8],
        options: &InstallOptions,
    ) -> Result<InstallationVerdict, NativeError> {
        verdict(
            self.start(None, options.transfer),
            InstallationVerdict::Success,
            InstallationVerdict::FailedInvalidSettings,
            InstallationVerdict::FailedInstallationAlreadyInProgress,
        )
    }
}

impl FirmwareEraserProxy for FakeProxy<ErasureState> {
    fn begin_erasure(&self, _image_index: u32) -> Result<ErasureVerdict, NativeError> {
        verdict(
            self.start(None, TransferSettings::default()),
            ErasureVerdict::Success,
            ErasureVerdict::FailedErrorUponCommencing,
            ErasureVerdict::FailedOtherErasureAlreadyInProgress,
        )
    }
}

impl DeviceResetterProxy for FakeProxy<ResetState> {
    fn begin_reset(&self) -> Result<ResetVerdict, NativeError> {
        verdict(
            self.start(None, TransferSettings::default()),
            ResetVerdict::Success,
            ResetVerdict::FailedErrorUponCommencing,
            ResetVerdict::FailedErrorUponCommencing,
        )
    }
}

/// Records every state change seen on `callbacks`, synthetic ones included.
pub fn record_states<S: OperationState>(callbacks: &NativeCallbacks<S>) -> Arc<Mutex<Vec<(S, S)>>> {
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    callbacks
        .state_changed()
        .subscribe(move |event: &StateChanged<S>| sink.lock().push((event.old_state, event.new_state)));
    states
}

/// Happy-path download of `data`.
pub fn download_of(data: &[u8]) -> Script<DownloadState> {
    Script::accept(vec![
        Step::State(DownloadState::None, DownloadState::Idle),
        Step::State(DownloadState::Idle, DownloadState::Downloading),
        Step::Progress(50),
        Step::Data(DownloadState::Downloading, DownloadState::Complete, data.to_vec()),
    ])
}

/// Download that dies with a transient link error.
pub fn failed_download() -> Script<DownloadState> {
    Script::accept(vec![
        Step::State(DownloadState::None, DownloadState::Idle),
        Step::State(DownloadState::Idle, DownloadState::Downloading),
        Step::Fatal("link lost", ErrorCode::GENERIC),
        Step::State(DownloadState::Downloading, DownloadState::Error),
    ])
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
