//! Inbound commands accepted by the bridge.

use serde::{Deserialize, Serialize};

/// Drive wheel addressed by a wheel command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WheelSide {
    Left,
    Right,
}

impl std::fmt::Display for WheelSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WheelSide::Left => write!(f, "left"),
            WheelSide::Right => write!(f, "right"),
        }
    }
}

/// Setpoint for a single wheel.  `target` names the wheel joint and must match
/// the channel the command arrives on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WheelCommand {
    pub target: String,
    /// Velocity or angle setpoint; its interpretation belongs to the driver.
    pub value: f64,
}

/// Base velocity command (m/s, rad/s).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VelocityCommand {
    pub linear: f64,
    pub angular: f64,
}

/// Device command (sound, LEDs, digital outputs, …) passed to the driver
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompositeCommand {
    pub code: u8,
    pub data: Vec<u8>,
}

/// Whether the driver's control loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunState {
    Enabled,
    #[default]
    Disabled,
}
