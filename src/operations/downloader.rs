use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use log::{info, warn};

use super::{check_verdict, invalid_config, paths, Exclusive};
use crate::bridge::{run_with_retries, OperationBridge};
use crate::config::OperationConfig;
use crate::error::{Error, Result};
use crate::events::{FatalError, StateChanged};
use crate::native::{FileDownloaderProxy, NativeCallbacks};
use crate::state::DownloadState;

/// Downloads remote files, retrying transient failures.
pub struct FileDownloader<P> {
    proxy: P,
    bridge: OperationBridge<DownloadState>,
    config: OperationConfig,
    busy: Exclusive,
}

impl<P: FileDownloaderProxy> FileDownloader<P> {
    pub fn new(proxy: P) -> Self {
        Self::build(proxy, OperationConfig::default())
    }

    pub fn with_config(proxy: P, config: OperationConfig) -> Result<Self> {
        config.validate().map_err(invalid_config)?;
        Ok(Self::build(proxy, config))
    }

    fn build(proxy: P, config: OperationConfig) -> Self {
        let callbacks = Arc::new(NativeCallbacks::new("file-downloader"));
        proxy.attach(callbacks.clone());
        Self {
            proxy,
            bridge: OperationBridge::new(callbacks).with_grace_period(config.grace_period),
            config,
            busy: Exclusive::default(),
        }
    }

    /// Notification streams of this client.
    pub fn events(&self) -> &NativeCallbacks<DownloadState> {
        self.bridge.callbacks()
    }

    pub fn config(&self) -> &OperationConfig {
        &self.config
    }

    pub fn state(&self) -> DownloadState {
        self.events().state()
    }

    pub fn last_fatal_error(&self) -> Option<FatalError> {
        self.events().last_fatal_error()
    }

    /// Downloads `remote_path`, retrying per the configured policy.
    pub async fn download(&self, remote_path: &str) -> Result<Bytes> {
        let remote_path = paths::prepare_remote_path(remote_path)?;
        let _busy = self.busy.acquire(Some(&remote_path))?;
        self.download_exclusive(&remote_path).await
    }

    /// Downloads each path in turn. Files missing on the device map to `None`;
    /// any other failure aborts the batch.
    pub async fn download_many<I, S>(&self, remote_paths: I) -> Result<HashMap<String, Option<Bytes>>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let remote_paths = paths::sanitize_remote_paths(remote_paths)?;
        let _busy = self.busy.acquire(None)?;

        let mut results = HashMap::with_capacity(remote_paths.len());
        for remote_path in remote_paths {
            match self.download_exclusive(&remote_path).await {
                Ok(data) => {
                    results.insert(remote_path, Some(data));
                }
                Err(Error::ResourceNotFound { .. }) => {
                    warn!("'{}' not found on the device, skipping", remote_path);
                    results.insert(remote_path, None);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(results)
    }

    async fn download_exclusive(&self, remote_path: &str) -> Result<Bytes> {
        info!("Downloading '{}'", remote_path);

        // also hears cancellation requested between attempts
        let watch = self.bridge.watch_cancellation(Some(remote_path));
        let proxy = &self.proxy;
        let bridge = &self.bridge;
        run_with_retries(
            remote_path,
            &self.config.retry_policy(),
            self.config.transfer,
            watch.signal(),
            move |attempt| {
                bridge.run_observed(
                    Some(remote_path),
                    attempt.timeout,
                    move || proxy.begin_download(remote_path, &attempt.settings),
                    |event: &StateChanged<DownloadState>| event.data.clone().unwrap_or_default(),
                )
            },
        )
        .await
    }

    /// Starts a download without waiting for it. Results arrive through
    /// [`events`](Self::events).
    pub fn begin_download(&self, remote_path: &str) -> Result<()> {
        let remote_path = paths::prepare_remote_path(remote_path)?;
        check_verdict(
            self.proxy.begin_download(&remote_path, &self.config.transfer),
            Some(&remote_path),
        )
    }

    pub fn pause(&self) -> bool {
        self.proxy.pause()
    }

    pub fn resume(&self) -> bool {
        self.proxy.resume()
    }

    pub fn cancel(&self, reason: &str) -> bool {
        self.proxy.cancel(reason)
    }

    pub fn disconnect(&self) -> bool {
        self.proxy.disconnect()
    }
}
