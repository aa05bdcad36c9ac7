use std::fmt;
use std::time::Duration;

use crate::error::Error;

/// Device-reported error code, flattened across SMP v1 return codes and the
/// per-group (v2) codes, which are offset by `group * 1000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(pub i32);

impl ErrorCode {
    /// No code was received from the device.
    pub const UNSET: ErrorCode = ErrorCode(-99);
    /// The native layer failed with something other than a device error.
    pub const GENERIC: ErrorCode = ErrorCode(-1);

    pub const OK: ErrorCode = ErrorCode(0);
    pub const UNKNOWN: ErrorCode = ErrorCode(1);
    pub const NO_MEMORY: ErrorCode = ErrorCode(2);
    pub const IN_VALUE: ErrorCode = ErrorCode(3);
    pub const TIMEOUT: ErrorCode = ErrorCode(4);
    pub const NO_ENTRY: ErrorCode = ErrorCode(5);
    pub const BAD_STATE: ErrorCode = ErrorCode(6);
    pub const TOO_LARGE: ErrorCode = ErrorCode(7);
    pub const NOT_SUPPORTED: ErrorCode = ErrorCode(8);
    pub const CORRUPT: ErrorCode = ErrorCode(9);
    pub const BUSY: ErrorCode = ErrorCode(10);
    pub const ACCESS_DENIED: ErrorCode = ErrorCode(11);
    pub const PROTOCOL_VERSION_TOO_OLD: ErrorCode = ErrorCode(12);
    pub const PROTOCOL_VERSION_TOO_NEW: ErrorCode = ErrorCode(13);

    pub const IMAGE_NO_FREE_SLOT: ErrorCode = ErrorCode(2009);
    pub const IMAGE_FLASH_WRITE_FAILED: ErrorCode = ErrorCode(2012);
    pub const IMAGE_INVALID_HASH: ErrorCode = ErrorCode(2024);
    pub const IMAGE_ALREADY_PENDING: ErrorCode = ErrorCode(2028);

    pub const FS_UNKNOWN: ErrorCode = ErrorCode(9001);
    pub const FS_INVALID_NAME: ErrorCode = ErrorCode(9002);
    pub const FS_NOT_FOUND: ErrorCode = ErrorCode(9003);
    pub const FS_IS_DIRECTORY: ErrorCode = ErrorCode(9004);
    pub const FS_OPEN_FAILED: ErrorCode = ErrorCode(9005);
    pub const FS_READ_FAILED: ErrorCode = ErrorCode(9007);
    pub const FS_WRITE_FAILED: ErrorCode = ErrorCode(9010);
    pub const FS_READ_ONLY: ErrorCode = ErrorCode(9015);

    pub fn is_unset(self) -> bool {
        self == ErrorCode::UNSET
    }

    fn name(self) -> Option<&'static str> {
        let name = match self {
            ErrorCode::UNSET => "unset",
            ErrorCode::GENERIC => "generic",
            ErrorCode::OK => "ok",
            ErrorCode::UNKNOWN => "unknown",
            ErrorCode::NO_MEMORY => "no memory",
            ErrorCode::IN_VALUE => "invalid value",
            ErrorCode::TIMEOUT => "timeout",
            ErrorCode::NO_ENTRY => "no entry",
            ErrorCode::BAD_STATE => "bad state",
            ErrorCode::TOO_LARGE => "too large",
            ErrorCode::NOT_SUPPORTED => "not supported",
            ErrorCode::CORRUPT => "corrupt",
            ErrorCode::BUSY => "busy",
            ErrorCode::ACCESS_DENIED => "access denied",
            ErrorCode::PROTOCOL_VERSION_TOO_OLD => "protocol version too old",
            ErrorCode::PROTOCOL_VERSION_TOO_NEW => "protocol version too new",
            ErrorCode::IMAGE_NO_FREE_SLOT => "image: no free slot",
            ErrorCode::IMAGE_FLASH_WRITE_FAILED => "image: flash write failed",
            ErrorCode::IMAGE_INVALID_HASH => "image: invalid hash",
            ErrorCode::IMAGE_ALREADY_PENDING => "image: already pending",
            ErrorCode::FS_UNKNOWN => "fs: unknown",
            ErrorCode::FS_INVALID_NAME => "fs: invalid name",
            ErrorCode::FS_NOT_FOUND => "fs: not found",
            ErrorCode::FS_IS_DIRECTORY => "fs: is a directory",
            ErrorCode::FS_OPEN_FAILED => "fs: open failed",
            ErrorCode::FS_READ_FAILED => "fs: read failed",
            ErrorCode::FS_WRITE_FAILED => "fs: write failed",
            ErrorCode::FS_READ_ONLY => "fs: read-only filesystem",
            _ => return None,
        };
        Some(name)
    }
}

impl Default for ErrorCode {
    fn default() -> Self {
        ErrorCode::UNSET
    }
}

impl From<i32> for ErrorCode {
    fn from(value: i32) -> Self {
        ErrorCode(value)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "code {}", self.0),
        }
    }
}

/// Immediate answer of a `begin_*` command, before the device did anything.
pub trait Verdict: Copy + fmt::Debug + Send {
    fn is_success(self) -> bool;

    fn is_already_in_progress(self) -> bool;

    fn into_error(self, resource: Option<&str>) -> Error {
        if self.is_already_in_progress() {
            Error::AlreadyInProgress {
                resource: resource.map(str::to_owned),
            }
        } else {
            Error::Rejected {
                verdict: format!("{:?}", self),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallationVerdict {
    Success = 0,
    FailedGivenFirmwareUnhealthy = 0b0001,
    FailedInvalidSettings = 0b0011,
    FailedInstallationInitializationErroredOut = 0b0101,
    FailedInstallationAlreadyInProgress = 0b1001,
}

impl Verdict for InstallationVerdict {
    fn is_success(self) -> bool {
        self == InstallationVerdict::Success
    }

    fn is_already_in_progress(self) -> bool {
        self == InstallationVerdict::FailedInstallationAlreadyInProgress
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadVerdict {
    Success = 0,
    FailedInvalidSettings = 0b0001,
    FailedInvalidData = 0b0011,
    FailedErrorUponCommencing = 0b0101,
    FailedUploadAlreadyInProgress = 0b1001,
}

impl Verdict for UploadVerdict {
    fn is_success(self) -> bool {
        self == UploadVerdict::Success
    }

    fn is_already_in_progress(self) -> bool {
        self == UploadVerdict::FailedUploadAlreadyInProgress
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadVerdict {
    Success = 0,
    FailedInvalidSettings = 0b0001,
    FailedErrorUponCommencing = 0b0011,
    FailedDownloadAlreadyInProgress = 0b0101,
}

impl Verdict for DownloadVerdict {
    fn is_success(self) -> bool {
        self == DownloadVerdict::Success
    }

    fn is_already_in_progress(self) -> bool {
        self == DownloadVerdict::FailedDownloadAlreadyInProgress
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErasureVerdict {
    Success = 0,
    FailedErrorUponCommencing = 0b0001,
    FailedOtherErasureAlreadyInProgress = 0b0011,
}

impl Verdict for ErasureVerdict {
    fn is_success(self) -> bool {
        self == ErasureVerdict::Success
    }

    fn is_already_in_progress(self) -> bool {
        self == ErasureVerdict::FailedOtherErasureAlreadyInProgress
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetVerdict {
    Success = 0,
    FailedErrorUponCommencing = 0b0001,
}

impl Verdict for ResetVerdict {
    fn is_success(self) -> bool {
        self == ResetVerdict::Success
    }

    fn is_already_in_progress(self) -> bool {
        false
    }
}

/// Transport tuning forwarded to the native SDK. `None` leaves the SDK default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSettings {
    /// Android only.
    pub initial_mtu_size: Option<u32>,
    /// Android only.
    pub window_capacity: Option<u32>,
    /// Android only.
    pub memory_alignment: Option<u32>,
    /// Apple only.
    pub pipeline_depth: Option<u32>,
    /// Apple only.
    pub byte_alignment: Option<u32>,
}

impl TransferSettings {
    /// The most conservative settings known to work over flaky links.
    pub const FAILSAFE: TransferSettings = TransferSettings {
        initial_mtu_size: Some(23),
        window_capacity: Some(1),
        memory_alignment: Some(1),
        pipeline_depth: Some(1),
        byte_alignment: Some(1),
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InstallationMode {
    TestOnly = 0,
    ConfirmOnly = 1,
    #[default]
    TestAndConfirm = 2,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOptions {
    pub mode: InstallationMode,
    pub erase_settings: Option<bool>,
    pub estimated_swap_time: Option<Duration>,
    pub transfer: TransferSettings,
}

impl InstallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: InstallationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn erase_settings(mut self, erase: bool) -> Self {
        self.erase_settings = Some(erase);
        self
    }

    pub fn with_estimated_swap_time(mut self, swap_time: Duration) -> Self {
        self.estimated_swap_time = Some(swap_time);
        self
    }

    pub fn with_transfer_settings(mut self, settings: TransferSettings) -> Self {
        self.transfer = settings;
        self
    }
}
