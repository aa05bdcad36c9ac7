use std::sync::Arc;

use log::info;

use super::{check_verdict, invalid_config, Exclusive};
use crate::bridge::OperationBridge;
use crate::config::OperationConfig;
use crate::error::{Error, Result};
use crate::events::FatalError;
use crate::native::{FirmwareInstallerProxy, InstallOptions, NativeCallbacks};
use crate::state::InstallationState;

/// Uploads a firmware image and walks the device through test, confirm and
/// reset.
pub struct FirmwareInstaller<P> {
    proxy: P,
    bridge: OperationBridge<InstallationState>,
    config: OperationConfig,
    busy: Exclusive,
}

impl<P: FirmwareInstallerProxy> FirmwareInstaller<P> {
    pub fn new(proxy: P) -> Self {
        Self::build(proxy, OperationConfig::default())
    }

    pub fn with_config(proxy: P, config: OperationConfig) -> Result<Self> {
        config.validate().map_err(invalid_config)?;
        Ok(Self::build(proxy, config))
    }

    fn build(proxy: P, config: OperationConfig) -> Self {
        let callbacks = Arc::new(NativeCallbacks::new("firmware-installer"));
        proxy.attach(callbacks.clone());
        Self {
            proxy,
            bridge: OperationBridge::new(callbacks).with_grace_period(config.grace_period),
            config,
            busy: Exclusive::default(),
        }
    }

    pub fn events(&self) -> &NativeCallbacks<InstallationState> {
        self.bridge.callbacks()
    }

    pub fn config(&self) -> &OperationConfig {
        &self.config
    }

    pub fn state(&self) -> InstallationState {
        self.events().state()
    }

    pub fn last_fatal_error(&self) -> Option<FatalError> {
        self.events().last_fatal_error()
    }

    pub async fn install(&self, firmware: &[u8], options: &InstallOptions) -> Result<()> {
        validate_firmware(firmware)?;
        let _busy = self.busy.acquire(None)?;

        info!(
            "Installing {} bytes of firmware ({:?})",
            firmware.len(),
            options.mode
        );
        self.bridge
            .run(
                None,
                self.config.timeout,
                || self.proxy.begin_installation(firmware, options),
                |_| (),
            )
            .await
    }

    pub fn begin_installation(&self, firmware: &[u8], options: &InstallOptions) -> Result<()> {
        validate_firmware(firmware)?;
        check_verdict(self.proxy.begin_installation(firmware, options), None)
    }

    pub fn cancel(&self, reason: &str) -> bool {
        self.proxy.cancel(reason)
    }

    pub fn disconnect(&self) -> bool {
        self.proxy.disconnect()
    }
}

fn validate_firmware(firmware: &[u8]) -> Result<()> {
    if firmware.is_empty() {
        return Err(Error::InvalidArgument("firmware image is empty".into()));
    }
    Ok(())
}
