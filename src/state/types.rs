use super::{OperationKind, OperationState, Phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallationState {
    None = 0,
    Idle = 1,
    Validating = 2,
    Uploading = 3,
    Paused = 4,
    Testing = 5,
    Confirming = 6,
    Resetting = 7,
    Complete = 8,
    Cancelled = 9,
    Error = 10,
    Cancelling = 11,
}

impl OperationState for InstallationState {
    const KIND: OperationKind = OperationKind::Installation;

    fn phase(self) -> Phase {
        use InstallationState::*;
        match self {
            None => Phase::Neutral,
            Idle => Phase::Idle,
            Validating | Uploading | Paused | Testing | Confirming | Resetting => Phase::Active,
            Cancelling => Phase::Cancelling,
            Complete | Cancelled | Error => Phase::Terminal,
        }
    }

    fn neutral() -> Self {
        InstallationState::None
    }

    fn error_state() -> Self {
        InstallationState::Error
    }

    fn cancelled_state() -> Self {
        InstallationState::Cancelled
    }

    fn is_terminal_success(self) -> bool {
        self == InstallationState::Complete
    }

    fn is_cancelled(self) -> bool {
        self == InstallationState::Cancelled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadState {
    None = 0,
    Idle = 1,
    Uploading = 2,
    Paused = 3,
    Complete = 4,
    Cancelled = 5,
    Error = 6,
    Cancelling = 7,
    Resuming = 8,
}

impl OperationState for UploadState {
    const KIND: OperationKind = OperationKind::Upload;

    fn phase(self) -> Phase {
        use UploadState::*;
        match self {
            None => Phase::Neutral,
            Idle => Phase::Idle,
            Uploading | Paused | Resuming => Phase::Active,
            Cancelling => Phase::Cancelling,
            Complete | Cancelled | Error => Phase::Terminal,
        }
    }

    fn neutral() -> Self {
        UploadState::None
    }

    fn error_state() -> Self {
        UploadState::Error
    }

    fn cancelled_state() -> Self {
        UploadState::Cancelled
    }

    fn is_terminal_success(self) -> bool {
        self == UploadState::Complete
    }

    fn is_cancelled(self) -> bool {
        self == UploadState::Cancelled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadState {
    None = 0,
    Idle = 1,
    Downloading = 2,
    Paused = 3,
    Complete = 4,
    Cancelled = 5,
    Error = 6,
    Cancelling = 7,
    Resuming = 8,
}

impl OperationState for DownloadState {
    const KIND: OperationKind = OperationKind::Download;

    fn phase(self) -> Phase {
        use DownloadState::*;
        match self {
            None => Phase::Neutral,
            Idle => Phase::Idle,
            Downloading | Paused | Resuming => Phase::Active,
            Cancelling => Phase::Cancelling,
            Complete | Cancelled | Error => Phase::Terminal,
        }
    }

    fn neutral() -> Self {
        DownloadState::None
    }

    fn error_state() -> Self {
        DownloadState::Error
    }

    fn cancelled_state() -> Self {
        DownloadState::Cancelled
    }

    fn is_terminal_success(self) -> bool {
        self == DownloadState::Complete
    }

    fn is_cancelled(self) -> bool {
        self == DownloadState::Cancelled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErasureState {
    None = 0,
    Idle = 1,
    Erasing = 2,
    Complete = 3,
    Failed = 4,
}

impl OperationState for ErasureState {
    const KIND: OperationKind = OperationKind::Erasure;

    fn phase(self) -> Phase {
        match self {
            ErasureState::None => Phase::Neutral,
            ErasureState::Idle => Phase::Idle,
            ErasureState::Erasing => Phase::Active,
            ErasureState::Complete | ErasureState::Failed => Phase::Terminal,
        }
    }

    fn neutral() -> Self {
        ErasureState::None
    }

    fn error_state() -> Self {
        ErasureState::Failed
    }

    fn is_terminal_success(self) -> bool {
        self == ErasureState::Complete
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetState {
    None = 0,
    Idle = 1,
    Resetting = 2,
    Complete = 3,
    Failed = 4,
}

impl OperationState for ResetState {
    const KIND: OperationKind = OperationKind::Reset;

    fn phase(self) -> Phase {
        match self {
            ResetState::None => Phase::Neutral,
            ResetState::Idle => Phase::Idle,
            ResetState::Resetting => Phase::Active,
            ResetState::Complete | ResetState::Failed => Phase::Terminal,
        }
    }

    fn neutral() -> Self {
        ResetState::None
    }

    fn error_state() -> Self {
        ResetState::Failed
    }

    fn is_terminal_success(self) -> bool {
        self == ResetState::Complete
    }
}
