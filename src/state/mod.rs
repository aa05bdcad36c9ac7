//! Per-kind operation states and the rules the bridge reads out of them.
//!
//! The native layer is the source of truth for transitions; nothing here
//! rejects a reported transition. The bridge only asks what a reported state
//! *means* (success, cancelling, cancelled) and warns on transitions that break
//! the partial order.

use std::fmt::Debug;

mod types;

pub use types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Installation,
    Upload,
    Download,
    Erasure,
    Reset,
}

impl OperationKind {
    pub fn is_transfer(self) -> bool {
        matches!(self, OperationKind::Upload | OperationKind::Download)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Installation => "installation",
            OperationKind::Upload => "upload",
            OperationKind::Download => "download",
            OperationKind::Erasure => "erasure",
            OperationKind::Reset => "reset",
        }
    }
}

/// Coarse position of a state in the lifecycle, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Neutral,
    Idle,
    Active,
    Cancelling,
    Terminal,
}

pub trait OperationState: Copy + Eq + Debug + Send + Sync + 'static {
    const KIND: OperationKind;

    fn phase(self) -> Phase;

    /// The `None` state, used as the old state of synthetic notifications.
    fn neutral() -> Self;

    fn error_state() -> Self;

    /// Kinds without a dedicated cancelled state report their error state.
    fn cancelled_state() -> Self {
        Self::error_state()
    }

    fn is_terminal_success(self) -> bool;

    fn is_cancelled(self) -> bool {
        false
    }

    fn is_cancelling(self) -> bool {
        self.phase() == Phase::Cancelling
    }

    fn is_terminal(self) -> bool {
        self.phase() == Phase::Terminal
    }
}

/// Whether `old -> new` respects the kind's partial order.
///
/// Terminal states never move on, `None`/`Idle` cannot be re-entered once the
/// operation went active, and `Cancelling` is only reachable from an active
/// state. Synthetic `None -> error` notifications are legal.
pub fn is_monotonic<S: OperationState>(old: S, new: S) -> bool {
    let (from, to) = (old.phase(), new.phase());

    if from == Phase::Terminal {
        return false;
    }
    if to == Phase::Cancelling {
        return from == Phase::Active;
    }
    if from >= Phase::Active && to <= Phase::Idle {
        return false;
    }
    to >= from
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_happy_paths() {
        use DownloadState::*;
        assert!(is_monotonic(None, Idle));
        assert!(is_monotonic(Idle, Downloading));
        assert!(is_monotonic(Downloading, Paused));
        assert!(is_monotonic(Paused, Resuming));
        assert!(is_monotonic(Resuming, Downloading));
        assert!(is_monotonic(Downloading, Complete));
        // tiny files skip straight to complete
        assert!(is_monotonic(Idle, Complete));
        assert!(is_monotonic(Downloading, Cancelling));
        assert!(is_monotonic(Cancelling, Cancelled));
    }

    #[test]
    fn rejects_leaving_terminal_states() {
        use InstallationState::*;
        assert!(!is_monotonic(Complete, Idle));
        assert!(!is_monotonic(Error, Uploading));
        assert!(!is_monotonic(Cancelled, Cancelling));
    }

    #[test]
    fn rejects_reentering_idle_once_active() {
        assert!(!is_monotonic(UploadState::Uploading, UploadState::Idle));
        assert!(!is_monotonic(ResetState::Resetting, ResetState::None));
    }

    #[test]
    fn cancelling_only_from_active() {
        assert!(!is_monotonic(UploadState::Idle, UploadState::Cancelling));
        assert!(!is_monotonic(UploadState::Cancelling, UploadState::Cancelling));
        assert!(!is_monotonic(UploadState::Cancelling, UploadState::Uploading));
    }

    #[test]
    fn synthetic_notifications_are_legal() {
        assert!(is_monotonic(ErasureState::neutral(), ErasureState::error_state()));
        assert!(is_monotonic(
            DownloadState::neutral(),
            DownloadState::cancelled_state()
        ));
    }

    #[test]
    fn kinds_without_cancellation_fall_back_to_error_state() {
        assert_eq!(ResetState::cancelled_state(), ResetState::Failed);
        assert_eq!(ErasureState::cancelled_state(), ErasureState::Failed);
        assert_eq!(UploadState::cancelled_state(), UploadState::Cancelled);
    }

    #[test]
    fn transfer_kinds() {
        assert!(DownloadState::KIND.is_transfer());
        assert!(UploadState::KIND.is_transfer());
        assert!(!InstallationState::KIND.is_transfer());
        assert_eq!(ErasureState::KIND.as_str(), "erasure");
    }
}
