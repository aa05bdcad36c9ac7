//! High-level clients, one per operation kind.

use tokio::sync::{Mutex, MutexGuard};

use crate::error::{Error, NativeError, Result};
use crate::native::Verdict;

mod downloader;
mod eraser;
mod installer;
pub mod paths;
mod resetter;
mod uploader;

pub use downloader::FileDownloader;
pub use eraser::FirmwareEraser;
pub use installer::FirmwareInstaller;
pub use resetter::DeviceResetter;
pub use uploader::FileUploader;

/// Allows one operation per client at a time.
#[derive(Default)]
pub(crate) struct Exclusive(Mutex<()>);

impl Exclusive {
    pub(crate) fn acquire(&self, resource: Option<&str>) -> Result<MutexGuard<'_, ()>> {
        self.0.try_lock().map_err(|_| Error::AlreadyInProgress {
            resource: resource.map(str::to_owned),
        })
    }
}

/// Result of a fire-and-forget `begin_*` call, with the run left to the
/// callbacks.
pub(crate) fn check_verdict<V: Verdict>(
    begun: std::result::Result<V, NativeError>,
    resource: Option<&str>,
) -> Result<()> {
    match begun {
        Ok(verdict) if verdict.is_success() => Ok(()),
        Ok(verdict) => Err(verdict.into_error(resource)),
        Err(source) => Err(Error::InternalError {
            resource: resource.map(str::to_owned),
            message: source.to_string(),
            source: Some(source),
        }),
    }
}

pub(crate) fn invalid_config(message: &'static str) -> Error {
    Error::InvalidArgument(message.to_owned())
}
