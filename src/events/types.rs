use bytes::Bytes;

use crate::native::ErrorCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Verbose = 2,
    Info = 3,
    Warning = 4,
    Error = 5,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => log::Level::Trace,
            LogLevel::Debug | LogLevel::Verbose => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warning => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChanged<S> {
    pub resource: Option<String>,
    pub old_state: S,
    pub new_state: S,
    /// Payload attached to the terminal-success transition of a download.
    pub data: Option<Bytes>,
}

impl<S> StateChanged<S> {
    pub fn new(resource: Option<&str>, old_state: S, new_state: S) -> Self {
        Self {
            resource: resource.map(str::to_owned),
            old_state,
            new_state,
            data: None,
        }
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalError {
    pub resource: Option<String>,
    pub message: String,
    pub code: ErrorCode,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub resource: Option<String>,
    pub percentage: u8,
    /// KB/s over the most recent window.
    pub current_throughput: f32,
    /// KB/s since the transfer started.
    pub average_throughput: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub resource: Option<String>,
    pub message: String,
    pub category: String,
    pub level: LogLevel,
}

impl LogEntry {
    pub fn new(level: LogLevel, category: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            resource: None,
            message: message.into(),
            category: category.into(),
            level,
        }
    }

    pub fn for_resource(mut self, resource: Option<&str>) -> Self {
        self.resource = resource.map(str::to_owned);
        self
    }
}

/// Payload of the transfer-only `cancelling`/`cancelled` notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CancellationNotice {
    pub reason: String,
}

/// The device started (`busy`) or stopped talking to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyStateChanged {
    pub busy: bool,
}
