//! In-process simulated base for tests and headless runs.
//!
//! [`SimDriver`] implements [`BaseDriver`] without any hardware.  It records
//! every accepted actuation call, integrates commanded wheel speeds into
//! encoder travel on [`SimDriver::step`], and fires telemetry signals the same
//! way a real driver would: synchronously, from the caller's thread.
//!
//! # Example
//!
//! ```rust
//! use basebridge_hal::{BaseDriver, SimDriver};
//! use basebridge_types::{TelemetryEvent, TelemetryTag, VelocityCommand};
//!
//! let sim = SimDriver::new(0.23);
//! sim.run().unwrap();
//! sim.set_base_velocity(VelocityCommand { linear: 0.5, angular: 0.0 }).unwrap();
//! sim.step(0.1);
//!
//! let Some(TelemetryEvent::WheelState(state)) = sim.snapshot(TelemetryTag::WheelState) else {
//!     panic!("wheel state expected after a step");
//! };
//! assert!((state.delta.left_m - 0.05).abs() < 1e-12);
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use basebridge_types::{
    BridgeError, CompositeCommand, RunState, SensorCoreData, TelemetryEvent, TelemetryTag,
    TimeData, VelocityCommand, WheelDelta, WheelJoint, WheelSide, WheelState,
};
use tracing::{Level, debug};

use crate::driver::{BaseDriver, DiagnosticHandler, SignalHandler};

/// Encoder resolution of the simulated base (ticks per metre of travel).
pub const TICKS_PER_METER: f64 = 11_724.0;

/// Wheel radius of the simulated base (metres).
pub const WHEEL_RADIUS: f64 = 0.035;

/// An actuation call accepted by the simulated driver.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Wheel { side: WheelSide, value: f64 },
    Velocity(VelocityCommand),
    Command(CompositeCommand),
    Run,
    Stop,
}

#[derive(Default)]
struct SimState {
    handlers: HashMap<TelemetryTag, Vec<SignalHandler>>,
    diagnostics: Vec<DiagnosticHandler>,
    snapshots: HashMap<TelemetryTag, TelemetryEvent>,
    calls: Vec<DriverCall>,
    run_state: RunState,
    disconnected: bool,
    /// Commanded wheel surface speeds (m/s), left then right.
    wheel_speed: [f64; 2],
    /// Total wheel travel (m), left then right.
    travel: [f64; 2],
    sequence: u64,
    uptime_ms: u32,
}

/// Simulated differential-drive base.
pub struct SimDriver {
    wheel_separation: f64,
    state: Mutex<SimState>,
}

impl SimDriver {
    /// Create a connected, stopped simulated base.
    pub fn new(wheel_separation: f64) -> Self {
        Self {
            wheel_separation,
            state: Mutex::new(SimState::default()),
        }
    }

    /// Every actuation call accepted so far, oldest first.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.lock().calls.clone()
    }

    /// Simulate the serial link dropping (`false`) or coming back (`true`).
    pub fn set_connected(&self, connected: bool) {
        self.lock().disconnected = !connected;
    }

    /// Replace the snapshot for the event's tag without firing it.
    pub fn set_snapshot(&self, event: TelemetryEvent) {
        self.lock().snapshots.insert(event.tag(), event);
    }

    /// Replace the snapshot for the event's tag and fire the tag.
    pub fn push(&self, event: TelemetryEvent) {
        let tag = event.tag();
        self.set_snapshot(event);
        self.signal(tag);
    }

    /// Fire `tag` without touching its snapshot.
    pub fn signal(&self, tag: TelemetryTag) {
        // Handlers read snapshots back, so the lock must be released first.
        let handlers = self.lock().handlers.get(&tag).cloned().unwrap_or_default();
        for handler in handlers {
            handler();
        }
    }

    /// Emit a diagnostic line to every diagnostic handler.
    pub fn diagnostic(&self, level: Level, message: &str) {
        let handlers = self.lock().diagnostics.clone();
        for handler in handlers {
            handler(level, message);
        }
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// While running, commanded wheel speeds are turned into travel, and the
    /// wheel-state, core-sensor and time channels fire.  A stopped base does
    /// nothing.
    pub fn step(&self, dt: f64) {
        {
            let mut state = self.lock();
            if state.run_state != RunState::Enabled {
                return;
            }
            let left_m = state.wheel_speed[0] * dt;
            let right_m = state.wheel_speed[1] * dt;
            state.travel[0] += left_m;
            state.travel[1] += right_m;
            state.sequence += 1;
            state.uptime_ms = state.uptime_ms.wrapping_add((dt * 1000.0).round() as u32);

            let joint = |side: usize| WheelJoint {
                position_rad: state.travel[side] / WHEEL_RADIUS,
                velocity_rad_s: state.wheel_speed[side] / WHEEL_RADIUS,
            };
            let wheels = WheelState {
                left: Some(joint(0)),
                right: Some(joint(1)),
                delta: WheelDelta {
                    sequence: state.sequence,
                    left_m,
                    right_m,
                    elapsed_s: dt,
                },
            };
            let core = SensorCoreData {
                time_stamp: state.uptime_ms as u16,
                left_encoder: encoder_ticks(state.travel[0]),
                right_encoder: encoder_ticks(state.travel[1]),
                battery: 165,
                ..match state.snapshots.get(&TelemetryTag::SensorCore) {
                    Some(TelemetryEvent::SensorCore(previous)) => *previous,
                    _ => SensorCoreData::default(),
                }
            };
            let time = TimeData {
                uptime_ms: state.uptime_ms,
            };
            state
                .snapshots
                .insert(TelemetryTag::WheelState, TelemetryEvent::WheelState(wheels));
            state
                .snapshots
                .insert(TelemetryTag::SensorCore, TelemetryEvent::SensorCore(core));
            state
                .snapshots
                .insert(TelemetryTag::TimeInfo, TelemetryEvent::TimeInfo(time));
        }
        self.signal(TelemetryTag::WheelState);
        self.signal(TelemetryTag::SensorCore);
        self.signal(TelemetryTag::TimeInfo);
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn connected_state(&self, action: &str) -> Result<MutexGuard<'_, SimState>, BridgeError> {
        let state = self.lock();
        if !state.disconnected {
            return Ok(state);
        }
        drop(state);
        self.diagnostic(Level::WARN, &format!("{action} rejected: serial link is down"));
        Err(BridgeError::DriverUnavailable("simulated base is disconnected".to_string()))
    }
}

fn encoder_ticks(travel_m: f64) -> u16 {
    // Truncating to u16 reproduces the hardware counter wrap.
    (travel_m * TICKS_PER_METER).round() as i64 as u16
}

impl BaseDriver for SimDriver {
    fn subscribe(&self, tag: TelemetryTag, handler: SignalHandler) {
        self.lock().handlers.entry(tag).or_default().push(handler);
    }

    fn subscribe_diagnostics(&self, handler: DiagnosticHandler) {
        self.lock().diagnostics.push(handler);
    }

    fn snapshot(&self, tag: TelemetryTag) -> Option<TelemetryEvent> {
        self.lock().snapshots.get(&tag).cloned()
    }

    fn set_wheel(&self, side: WheelSide, value: f64) -> Result<(), BridgeError> {
        let mut state = self.connected_state("wheel command")?;
        let index = match side {
            WheelSide::Left => 0,
            WheelSide::Right => 1,
        };
        state.wheel_speed[index] = value * WHEEL_RADIUS;
        state.calls.push(DriverCall::Wheel { side, value });
        Ok(())
    }

    fn set_base_velocity(&self, command: VelocityCommand) -> Result<(), BridgeError> {
        let mut state = self.connected_state("velocity command")?;
        let half_turn = command.angular * self.wheel_separation / 2.0;
        state.wheel_speed = [command.linear - half_turn, command.linear + half_turn];
        state.calls.push(DriverCall::Velocity(command));
        Ok(())
    }

    fn send_command(&self, command: &CompositeCommand) -> Result<(), BridgeError> {
        let mut state = self.connected_state("device command")?;
        debug!(code = command.code, bytes = command.data.len(), "sim device command");
        state.calls.push(DriverCall::Command(command.clone()));
        Ok(())
    }

    fn run(&self) -> Result<(), BridgeError> {
        let mut state = self.connected_state("run")?;
        state.run_state = RunState::Enabled;
        state.calls.push(DriverCall::Run);
        Ok(())
    }

    fn stop(&self) -> Result<(), BridgeError> {
        let mut state = self.connected_state("stop")?;
        state.run_state = RunState::Disabled;
        state.wheel_speed = [0.0, 0.0];
        state.calls.push(DriverCall::Stop);
        Ok(())
    }

    fn run_state(&self) -> RunState {
        self.lock().run_state
    }

    fn is_connected(&self) -> bool {
        !self.lock().disconnected
    }
}
