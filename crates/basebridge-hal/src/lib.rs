//! `basebridge-hal` – the driver boundary.
//!
//! # Modules
//!
//! - [`driver`] – [`BaseDriver`]: the capability interface every base
//!   controller driver implements (telemetry signals, snapshots, actuation,
//!   control-loop start/stop, diagnostics).
//! - [`sim`] – [`SimDriver`]: an in-process kinematic base that needs no
//!   hardware, used by tests and headless runs.

pub mod driver;
pub mod sim;

pub use driver::{BaseDriver, DiagnosticHandler, SignalHandler};
pub use sim::{DriverCall, SimDriver};
