//! McuMgr Operation Library
//!
//! This library drives device-management operations (firmware installation,
//! file upload and download, firmware erasure, device reset) on top of a
//! platform SDK that owns the transport. The SDK is reached through a native
//! proxy: commands return immediately with a verdict, and everything else is
//! reported back through callbacks, possibly from foreign threads.
//!
//! # Features
//! - One awaitable outcome per operation, with optional timeout
//! - Retries with fail-safe transfer settings for flaky links
//! - Cooperative cancellation with a grace period
//! - Typed errors carrying the device error code
//! - Panic-isolated event observers
//!
//! # Examples
//!
//! ## Downloading a File
//! ```rust,ignore
//! use std::time::Duration;
//! use mcumgr::{FileDownloader, OperationConfig};
//!
//! #[tokio::main]
//! async fn main() -> mcumgr::Result<()> {
//!     let config = OperationConfig::new()
//!         .with_timeout(Duration::from_secs(30))
//!         .with_max_attempts(5);
//!
//!     // `proxy` implements `FileDownloaderProxy` on top of the platform SDK
//!     let downloader = FileDownloader::with_config(proxy, config)?;
//!     let data = downloader.download("/logs/a.bin").await?;
//!     println!("got {} bytes", data.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Installing Firmware
//! ```rust,ignore
//! use mcumgr::{InstallOptions, InstallationMode, OperationConfig};
//!
//! #[tokio::main]
//! async fn main() -> mcumgr::Result<()> {
//!     let options = InstallOptions::new()
//!         .with_mode(InstallationMode::TestAndConfirm)
//!         .erase_settings(false);
//!
//!     let firmware = std::fs::read("app_update.bin").expect("firmware image");
//!     mcumgr::install_firmware(proxy, &firmware, &options, mcumgr::new_config()).await
//! }
//! ```
//!
//! ## Watching Progress
//! ```rust,ignore
//! let uploader = mcumgr::FileUploader::new(proxy);
//! let _progress = uploader.events().progress().subscribe_scoped(|p| {
//!     println!("{}% at {:.1} KB/s", p.percentage, p.current_throughput);
//! });
//! uploader.upload("/lfs/config.json", &bytes).await?;
//! ```

pub mod bridge;
mod config;
mod error;
pub mod events;
pub mod ids;
pub mod native;
pub mod operations;
pub mod state;

pub use bridge::{
    CancellationSignal, CancellationWatch, OperationBridge, RetryPolicy, RunReport,
};
pub use config::OperationConfig;
pub use error::{classify_fatal_error, Error, ErrorKind, FailureScope, NativeError, Result};
pub use events::{
    BusyStateChanged, CancellationNotice, EventDispatcher, FatalError, LogEntry, LogLevel,
    Progress, StateChanged, Subscription,
};
pub use native::{
    ErrorCode, InstallOptions, InstallationMode, NativeCallbacks, TransferSettings,
};
pub use operations::{DeviceResetter, FileDownloader, FileUploader, FirmwareEraser, FirmwareInstaller};
pub use state::{
    DownloadState, ErasureState, InstallationState, OperationKind, OperationState, ResetState,
    UploadState,
};

use bytes::Bytes;
use native::{FileDownloaderProxy, FirmwareInstallerProxy};

/// Installs a firmware image in one go
pub async fn install_firmware<P>(
    proxy: P,
    firmware: &[u8],
    options: &InstallOptions,
    config: OperationConfig,
) -> Result<()>
where
    P: FirmwareInstallerProxy,
{
    let installer = FirmwareInstaller::with_config(proxy, config)?;
    installer.install(firmware, options).await
}

/// Downloads a single remote file, retrying per `config`
pub async fn download_file<P>(proxy: P, remote_path: &str, config: OperationConfig) -> Result<Bytes>
where
    P: FileDownloaderProxy,
{
    let downloader = FileDownloader::with_config(proxy, config)?;
    downloader.download(remote_path).await
}

/// Creates a new operation configuration with default settings
pub fn new_config() -> OperationConfig {
    OperationConfig::new()
}
