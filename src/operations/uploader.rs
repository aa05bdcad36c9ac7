use std::sync::Arc;

use log::info;

use super::{check_verdict, invalid_config, paths, Exclusive};
use crate::bridge::OperationBridge;
use crate::config::OperationConfig;
use crate::error::Result;
use crate::events::FatalError;
use crate::native::{FileUploaderProxy, NativeCallbacks};
use crate::state::UploadState;

/// Uploads files to the device, one attempt per file.
pub struct FileUploader<P> {
    proxy: P,
    bridge: OperationBridge<UploadState>,
    config: OperationConfig,
    busy: Exclusive,
}

impl<P: FileUploaderProxy> FileUploader<P> {
    pub fn new(proxy: P) -> Self {
        Self::build(proxy, OperationConfig::default())
    }

    pub fn with_config(proxy: P, config: OperationConfig) -> Result<Self> {
        config.validate().map_err(invalid_config)?;
        Ok(Self::build(proxy, config))
    }

    fn build(proxy: P, config: OperationConfig) -> Self {
        let callbacks = Arc::new(NativeCallbacks::new("file-uploader"));
        proxy.attach(callbacks.clone());
        Self {
            proxy,
            bridge: OperationBridge::new(callbacks).with_grace_period(config.grace_period),
            config,
            busy: Exclusive::default(),
        }
    }

    pub fn events(&self) -> &NativeCallbacks<UploadState> {
        self.bridge.callbacks()
    }

    pub fn config(&self) -> &OperationConfig {
        &self.config
    }

    pub fn state(&self) -> UploadState {
        self.events().state()
    }

    pub fn last_fatal_error(&self) -> Option<FatalError> {
        self.events().last_fatal_error()
    }

    pub async fn upload(&self, remote_path: &str, data: &[u8]) -> Result<()> {
        let remote_path = paths::prepare_remote_path(remote_path)?;
        let _busy = self.busy.acquire(Some(&remote_path))?;
        self.upload_exclusive(&remote_path, data).await
    }

    /// Uploads the files in order and stops at the first failure.
    pub async fn upload_many<I, S, D>(&self, files: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, D)>,
        S: AsRef<str>,
        D: AsRef<[u8]>,
    {
        let files = paths::sanitize_remote_paths_with_data(files)?;
        let _busy = self.busy.acquire(None)?;

        for (remote_path, data) in &files {
            self.upload_exclusive(remote_path, data.as_ref()).await?;
        }
        Ok(())
    }

    async fn upload_exclusive(&self, remote_path: &str, data: &[u8]) -> Result<()> {
        info!("Uploading {} bytes to '{}'", data.len(), remote_path);

        let settings = self.config.transfer;
        self.bridge
            .run(
                Some(remote_path),
                self.config.timeout,
                || self.proxy.begin_upload(remote_path, data, &settings),
                |_| (),
            )
            .await
    }

    pub fn begin_upload(&self, remote_path: &str, data: &[u8]) -> Result<()> {
        let remote_path = paths::prepare_remote_path(remote_path)?;
        check_verdict(
            self.proxy
                .begin_upload(&remote_path, data, &self.config.transfer),
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
