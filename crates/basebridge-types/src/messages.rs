//! Outbound messages that are derived rather than forwarded.
//!
//! Plain sensor channels publish the driver snapshot struct as-is; the types
//! here are assembled by the bridge (merged joint state, IMU, odometry,
//! transforms and bumper/cliff transition events).

use serde::{Deserialize, Serialize};

use crate::geometry::{Quaternion, Vec3};

/// Merged left/right wheel joint state.
///
/// `name`, `position` and `velocity` are parallel vectors ordered left, right.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JointState {
    pub name: Vec<String>,
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub effort: Vec<f64>,
}

/// Inertial measurement expressed in the robot base frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imu {
    pub frame_id: String,
    pub orientation: Quaternion,
    pub angular_velocity: Vec3,
    pub linear_acceleration: Vec3,
}

/// Position and orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quaternion,
}

/// Linear and angular velocity.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vec3,
    pub angular: Vec3,
}

/// Integrated pose of `child_frame_id` in `frame_id`, with the velocity
/// expressed in `child_frame_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Odometry {
    pub frame_id: String,
    pub child_frame_id: String,
    pub pose: Pose,
    pub twist: Twist,
}

/// Rigid-body transform between two named frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStamped {
    pub frame_id: String,
    pub child_frame_id: String,
    pub translation: Vec3,
    pub rotation: Quaternion,
}

/// Which of the three front sensors an event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorPosition {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BumperState {
    Released,
    Pressed,
}

/// A bumper changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BumperEvent {
    pub bumper: SensorPosition,
    pub state: BumperState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CliffState {
    Floor,
    Cliff,
}

/// A cliff sensor changed state.  `bottom` is the raw floor-distance reading
/// at the time of the transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliffEvent {
    pub sensor: SensorPosition,
    pub state: CliffState,
    pub bottom: u16,
}
