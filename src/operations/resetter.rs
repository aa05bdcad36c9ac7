use std::sync::Arc;

use log::info;

use super::{check_verdict, invalid_config, Exclusive};
use crate::bridge::OperationBridge;
use crate::config::OperationConfig;
use crate::error::Result;
use crate::events::FatalError;
use crate::native::{DeviceResetterProxy, NativeCallbacks};
use crate::state::ResetState;

pub struct DeviceResetter<P> {
    proxy: P,
    bridge: OperationBridge<ResetState>,
    config: OperationConfig,
    busy: Exclusive,
}

impl<P: DeviceResetterProxy> DeviceResetter<P> {
    pub fn new(proxy: P) -> Self {
        Self::build(proxy, OperationConfig::default())
    }

    pub fn with_config(proxy: P, config: OperationConfig) -> Result<Self> {
        config.validate().map_err(invalid_config)?;
        Ok(Self::build(proxy, config))
    }

    fn build(proxy: P, config: OperationConfig) -> Self {
        let callbacks = Arc::new(NativeCallbacks::new("device-resetter"));
        proxy.attach(callbacks.clone());
        Self {
            proxy,
            bridge: OperationBridge::new(callbacks).with_grace_period(config.grace_period),
            config,
            busy: Exclusive::default(),
        }
    }

    pub fn events(&self) -> &NativeCallbacks<ResetState> {
        self.bridge.callbacks()
    }

    pub fn state(&self) -> ResetState {
        self.events().state()
    }

    pub fn last_fatal_error(&self) -> Option<FatalError> {
        self.events().last_fatal_error()
    }

    pub async fn reset(&self) -> Result<()> {
        let _busy = self.busy.acquire(None)?;

        info!("Resetting device");
        self.bridge
            .run(
                None,
                self.config.timeout,
                || self.proxy.begin_reset(),
                |_| (),
            )
            .await
    }

    pub fn begin_reset(&self) -> Result<()> {
        check_verdict(self.proxy.begin_reset(), None)
    }

    pub fn disconnect(&self) -> bool {
        self.proxy.disconnect()
    }
}
