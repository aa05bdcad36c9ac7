use std::sync::Arc;

use log::info;

use super::{check_verdict, invalid_config, Exclusive};
use crate::bridge::OperationBridge;
use crate::config::OperationConfig;
use crate::error::Result;
use crate::events::FatalError;
use crate::native::{FirmwareEraserProxy, NativeCallbacks};
use crate::state::ErasureState;

pub struct FirmwareEraser<P> {
    proxy: P,
    bridge: OperationBridge<ErasureState>,
    config: OperationConfig,
    busy: Exclusive,
}

impl<P: FirmwareEraserProxy> FirmwareEraser<P> {
    pub fn new(proxy: P) -> Self {
        Self::build(proxy, OperationConfig::default())
    }

    pub fn with_config(proxy: P, config: OperationConfig) -> Result<Self> {
        config.validate().map_err(invalid_config)?;
        Ok(Self::build(proxy, config))
    }

    fn build(proxy: P, config: OperationConfig) -> Self {
        let callbacks = Arc::new(NativeCallbacks::new("firmware-eraser"));
        proxy.attach(callbacks.clone());
        Self {
            proxy,
            bridge: OperationBridge::new(callbacks).with_grace_period(config.grace_period),
            config,
            busy: Exclusive::default(),
        }
    }

    pub fn events(&self) -> &NativeCallbacks<ErasureState> {
        self.bridge.callbacks()
    }

    pub fn state(&self) -> ErasureState {
        self.events().state()
    }

    pub fn last_fatal_error(&self) -> Option<FatalError> {
        self.events().last_fatal_error()
    }

    /// Erases the firmware image in slot `image_index` (usually 1, the
    /// secondary slot).
    pub async fn erase(&self, image_index: u32) -> Result<()> {
        let _busy = self.busy.acquire(None)?;

        info!("Erasing image {}", image_index);
        self.bridge
            .run(
                None,
                self.config.timeout,
                || self.proxy.begin_erasure(image_index),
                |_| (),
            )
            .await
    }

    pub fn begin_erasure(&self, image_index: u32) -> Result<()> {
        check_verdict(self.proxy.begin_erasure(image_index), None)
    }

    pub fn disconnect(&self) -> bool {
        self.proxy.disconnect()
    }
}
