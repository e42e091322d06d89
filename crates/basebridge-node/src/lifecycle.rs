//! [`LifecycleGate`] – starts and stops the driver's control loop.
//!
//! Both transitions are idempotent and never fail from the caller's point of
//! view: a driver error is logged at error level and the gate carries on.

use std::sync::Arc;

use basebridge_hal::BaseDriver;
use basebridge_types::RunState;
use tracing::{error, info};

pub struct LifecycleGate {
    driver: Arc<dyn BaseDriver>,
}

impl LifecycleGate {
    pub fn new(driver: Arc<dyn BaseDriver>) -> Self {
        Self { driver }
    }

    /// Start the driver control loop.
    pub fn enable(&self) {
        info!("enabling base control loop");
        if let Err(e) = self.driver.run() {
            error!(error = %e, "failed to enable base");
        }
    }

    /// Stop the driver control loop.  Safe before any [`enable`](Self::enable).
    pub fn disable(&self) {
        info!("disabling base control loop");
        if let Err(e) = self.driver.stop() {
            error!(error = %e, "failed to disable base");
        }
    }

    pub fn state(&self) -> RunState {
        self.driver.run_state()
    }
}
