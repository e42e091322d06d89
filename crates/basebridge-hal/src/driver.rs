//! The [`BaseDriver`] trait: everything the bridge needs from the base
//! controller driver.
//!
//! The driver owns the serial link, the authoritative telemetry state and the
//! control loop.  The bridge only ever talks to this trait, so a hardware
//! driver, the in-process [`SimDriver`][crate::sim::SimDriver] or a test
//! double can be swapped without touching routing or odometry logic.
//!
//! # Signals
//!
//! Instead of ad-hoc signal wiring, the driver exposes
//! [`BaseDriver::subscribe`]: the bridge registers one [`SignalHandler`] per
//! [`TelemetryTag`] and the driver invokes it, synchronously and on its own
//! thread, whenever fresh data for that tag is available.  Handlers then read
//! the data back through [`BaseDriver::snapshot`].  Firings of the same tag
//! are serialized by the driver; different tags may fire concurrently.
//!
//! # Diagnostics
//!
//! Drivers also produce free-form log lines (link drops, checksum errors,
//! firmware warnings).  [`BaseDriver::subscribe_diagnostics`] hands those to
//! a [`DiagnosticHandler`] together with a [`Level`], so the host decides
//! where they end up.

use std::sync::Arc;

use basebridge_types::{
    BridgeError, CompositeCommand, RunState, TelemetryEvent, TelemetryTag, VelocityCommand,
    WheelSide,
};
use tracing::Level;

/// Callback invoked by the driver when a telemetry tag fires.
pub type SignalHandler = Arc<dyn Fn() + Send + Sync>;

/// Callback invoked with each driver diagnostic line.
pub type DiagnosticHandler = Arc<dyn Fn(Level, &str) + Send + Sync>;

/// A mobile-base controller driver.
///
/// All methods take `&self`: drivers are shared between the thread that
/// detects telemetry and the host thread that dispatches commands, so they
/// use interior mutability.
pub trait BaseDriver: Send + Sync {
    /// Register `handler` to be called whenever `tag` fires.  Multiple
    /// handlers per tag are allowed and are called in registration order.
    fn subscribe(&self, tag: TelemetryTag, handler: SignalHandler);

    /// Register `handler` for driver diagnostics.  Every handler sees every
    /// line, on whichever thread the driver emits it from.
    fn subscribe_diagnostics(&self, handler: DiagnosticHandler);

    /// Current snapshot for `tag`, or `None` if nothing has been read yet.
    fn snapshot(&self, tag: TelemetryTag) -> Option<TelemetryEvent>;

    /// Send a velocity or angle setpoint to one wheel.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DriverUnavailable`] when the base is not
    /// connected.
    fn set_wheel(&self, side: WheelSide, value: f64) -> Result<(), BridgeError>;

    /// Send a base velocity.  Range and safety clamping are the driver's job.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DriverUnavailable`] when the base is not
    /// connected.
    fn set_base_velocity(&self, command: VelocityCommand) -> Result<(), BridgeError>;

    /// Forward an opaque device command.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DriverUnavailable`] when the base is not
    /// connected.
    fn send_command(&self, command: &CompositeCommand) -> Result<(), BridgeError>;

    /// Start the control loop.  Calling it while running is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DriverUnavailable`] when the base is not
    /// connected.
    fn run(&self) -> Result<(), BridgeError>;

    /// Stop the control loop.  Calling it while stopped is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::DriverUnavailable`] when the base is not
    /// connected.
    fn stop(&self) -> Result<(), BridgeError>;

    /// Whether the control loop is running.
    fn run_state(&self) -> RunState;

    /// Whether the link to the base is up.
    fn is_connected(&self) -> bool;
}
