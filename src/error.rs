use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::native::ErrorCode;

/// Fault raised by a native command outside of its documented verdicts,
/// e.g. missing entry points in the platform library.
pub type NativeError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Operation on {} timed out after {}ms", display_resource(.resource), .timeout.as_millis())]
    Timeout {
        resource: Option<String>,
        timeout: Duration,
    },

    #[error("Operation cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("Access to {} denied by the device: {message} [{code}]", display_resource(.resource))]
    Unauthorized {
        resource: Option<String>,
        message: String,
        code: ErrorCode,
    },

    #[error("Remote resource '{resource}' not found [{code}]")]
    ResourceNotFound {
        resource: String,
        message: String,
        code: ErrorCode,
    },

    #[error("All {attempts} attempts on '{resource}' failed")]
    AllAttemptsFailed {
        resource: String,
        attempts: u32,
        #[source]
        last: Box<Error>,
    },

    #[error("Internal error while operating on {}: {message}", display_resource(.resource))]
    InternalError {
        resource: Option<String>,
        message: String,
        #[source]
        source: Option<NativeError>,
    },

    #[error("Operation on {} errored out: {message} [{code}]", display_resource(.resource))]
    ErroredOut {
        resource: Option<String>,
        message: String,
        code: ErrorCode,
    },

    #[error("Another operation is already in progress on {}", display_resource(.resource))]
    AlreadyInProgress { resource: Option<String> },

    #[error("Native layer rejected the command: {verdict}")]
    Rejected { verdict: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Discriminant of [`Error`], handy for matching without destructuring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    Cancelled,
    Unauthorized,
    ResourceNotFound,
    AllAttemptsFailed,
    InternalError,
    ErroredOut,
    AlreadyInProgress,
    Rejected,
    InvalidArgument,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Cancelled { .. } => ErrorKind::Cancelled,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::ResourceNotFound { .. } => ErrorKind::ResourceNotFound,
            Error::AllAttemptsFailed { .. } => ErrorKind::AllAttemptsFailed,
            Error::InternalError { .. } => ErrorKind::InternalError,
            Error::ErroredOut { .. } => ErrorKind::ErroredOut,
            Error::AlreadyInProgress { .. } => ErrorKind::AlreadyInProgress,
            Error::Rejected { .. } => ErrorKind::Rejected,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }

    /// Device error code behind this failure, or [`ErrorCode::UNSET`] when the
    /// failure did not originate from the device.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Error::Unauthorized { code, .. }
            | Error::ResourceNotFound { code, .. }
            | Error::ErroredOut { code, .. } => *code,
            Error::AllAttemptsFailed { last, .. } => last.error_code(),
            _ => ErrorCode::UNSET,
        }
    }

    /// Whether the retry coordinator may reissue the request after this failure.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ErroredOut { code, .. } => *code != ErrorCode::FS_IS_DIRECTORY,
            _ => false,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    pub(crate) fn internal(resource: Option<&str>, message: impl Into<String>) -> Self {
        Error::InternalError {
            resource: resource.map(str::to_owned),
            message: message.into(),
            source: None,
        }
    }
}

/// Whether a fatal error concerns a file transfer (where "not found" is meaningful)
/// or a device-wide operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    Transfer,
    Device,
}

/// Maps a fatal-error notification onto the typed taxonomy.
///
/// Structured codes win over message inspection. The substring checks mirror
/// what the native SDKs print when they drop the structured code.
pub fn classify_fatal_error(
    scope: FailureScope,
    resource: Option<&str>,
    message: &str,
    code: ErrorCode,
) -> Error {
    let normalized = message.to_uppercase().replace("NO_ENTRY (5)", "NO ENTRY (5)");

    if code == ErrorCode::ACCESS_DENIED || normalized.contains("UNRECOGNIZED (11)") {
        return Error::Unauthorized {
            resource: resource.map(str::to_owned),
            message: message.to_owned(),
            code,
        };
    }

    if scope == FailureScope::Transfer {
        // TODO: drop the "NO ENTRY (5)" substring match once both SDKs report FS_NOT_FOUND as a code
        let not_found = code == ErrorCode::FS_NOT_FOUND || normalized.contains("NO ENTRY (5)");
        if not_found {
            return Error::ResourceNotFound {
                resource: resource.unwrap_or_default().to_owned(),
                message: message.to_owned(),
                code,
            };
        }
    }

    Error::ErroredOut {
        resource: resource.map(str::to_owned),
        message: message.to_owned(),
        code,
    }
}

fn display_resource(resource: &Option<String>) -> DisplayResource<'_> {
    DisplayResource(resource.as_deref())
}

struct DisplayResource<'a>(Option<&'a str>);

impl fmt::Display for DisplayResource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(resource) => write!(f, "'{}'", resource),
            None => f.write_str("device"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_denied_code_maps_to_unauthorized() {
        let err = classify_fatal_error(
            FailureScope::Device,
            None,
            "denied",
            ErrorCode::ACCESS_DENIED,
        );
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.error_code(), ErrorCode::ACCESS_DENIED);
    }

    #[test]
    fn unrecognized_message_maps_to_unauthorized() {
        let err = classify_fatal_error(
            FailureScope::Transfer,
            Some("/a.bin"),
            "McuMgr error: unrecognized (11)",
            ErrorCode::UNSET,
        );
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn filesystem_not_found_maps_to_resource_not_found_for_transfers() {
        let err = classify_fatal_error(
            FailureScope::Transfer,
            Some("/logs/a.bin"),
            "boom",
            ErrorCode::FS_NOT_FOUND,
        );
        match err {
            Error::ResourceNotFound { resource, code, .. } => {
                assert_eq!(resource, "/logs/a.bin");
                assert_eq!(code, ErrorCode::FS_NOT_FOUND);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn no_entry_message_heuristic_matches_both_platform_spellings() {
        for message in ["Mcu Mgr Error: NO_ENTRY (5)", "mcu mgr error: no entry (5)"] {
            let err = classify_fatal_error(
                FailureScope::Transfer,
                Some("/a"),
                message,
                ErrorCode::UNSET,
            );
            assert_eq!(err.kind(), ErrorKind::ResourceNotFound, "{message}");
            assert_eq!(err.error_code(), ErrorCode::UNSET);
        }
    }

    #[test]
    fn not_found_is_generic_for_device_wide_operations() {
        let err = classify_fatal_error(
            FailureScope::Device,
            None,
            "no entry (5)",
            ErrorCode::FS_NOT_FOUND,
        );
        assert_eq!(err.kind(), ErrorKind::ErroredOut);
        assert_eq!(err.error_code(), ErrorCode::FS_NOT_FOUND);
    }

    #[test]
    fn generic_failure_keeps_code_and_message() {
        let err = classify_fatal_error(
            FailureScope::Transfer,
            Some("/a"),
            "link lost",
            ErrorCode::GENERIC,
        );
        assert!(err.is_retryable());
        assert!(err.to_string().contains("link lost"));
        assert_eq!(err.error_code(), ErrorCode::GENERIC);
    }

    #[test]
    fn all_attempts_failed_reports_inner_code() {
        let err = Error::AllAttemptsFailed {
            resource: "/a".into(),
            attempts: 3,
            last: Box::new(Error::ErroredOut {
                resource: Some("/a".into()),
                message: "x".into(),
                code: ErrorCode::NO_MEMORY,
            }),
        };
        assert_eq!(err.error_code(), ErrorCode::NO_MEMORY);
        assert!(!err.is_retryable());
    }

    #[test]
    fn bridge_side_failures_report_unset_code() {
        let timeout = Error::Timeout {
            resource: None,
            timeout: Duration::from_millis(100),
        };
        assert_eq!(timeout.error_code(), ErrorCode::UNSET);
        assert_eq!(timeout.to_string(), "Operation on device timed out after 100ms");
        assert!(Error::Cancelled { reason: "user".into() }.is_cancellation());
    }
}
