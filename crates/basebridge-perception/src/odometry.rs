//! Differential-drive odometry integrator.
//!
//! Consumes [`WheelDelta`]s (left/right wheel travel since the previous
//! event) and integrates a planar [`Pose2D`] in the odometry frame.
//!
//! For wheel travel `dl`, `dr` and wheel separation `b`:
//!
//! ```text
//! dθ = (dr − dl) / b
//! d  = (dl + dr) / 2
//! straight (|dθ| ≈ 0):  dx = d,            dy = 0
//! arc:                  dx = r · sin dθ,   dy = r · (1 − cos dθ),   r = d / dθ
//! ```
//!
//! `(dx, dy)` is expressed in the robot frame at the start of the motion and
//! is rotated by the current heading before being added to the pose.
//!
//! # Example
//!
//! ```rust
//! use basebridge_perception::odometry::OdometryIntegrator;
//! use basebridge_types::WheelDelta;
//!
//! let mut odom = OdometryIntegrator::new(0.23);
//! odom.integrate(&WheelDelta { sequence: 1, left_m: 0.05, right_m: 0.05, elapsed_s: 0.1 });
//!
//! assert!((odom.pose().x - 0.05).abs() < 1e-12);
//! assert!((odom.rates().vx - 0.5).abs() < 1e-12);
//! ```

use std::f64::consts::{PI, TAU};

use basebridge_types::WheelDelta;
use tracing::debug;

/// Below this heading change the motion is treated as a straight line.
const STRAIGHT_THRESHOLD: f64 = 1e-9;

/// Wrap `angle` into (−π, π].
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Planar pose in the odometry frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose2D {
    /// Metres.
    pub x: f64,
    /// Metres.
    pub y: f64,
    /// Radians, counter-clockwise from +X, always within (−π, π].
    pub heading: f64,
}

impl Pose2D {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            x,
            y,
            heading: wrap_angle(heading),
        }
    }
}

/// Instantaneous rate estimate in the robot frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseUpdateRate {
    /// Forward velocity (m/s).
    pub vx: f64,
    /// Lateral velocity (m/s).
    pub vy: f64,
    /// Yaw rate (rad/s).
    pub vtheta: f64,
}

/// Integrates wheel deltas into a [`Pose2D`] and a [`PoseUpdateRate`].
#[derive(Debug, Clone)]
pub struct OdometryIntegrator {
    wheel_separation: f64,
    pose: Pose2D,
    rates: PoseUpdateRate,
    last_sequence: Option<u64>,
}

impl OdometryIntegrator {
    /// Create an integrator at the origin.  `wheel_separation` is the distance
    /// between the wheel contact points in metres and must be positive.
    pub fn new(wheel_separation: f64) -> Self {
        Self {
            wheel_separation,
            pose: Pose2D::default(),
            rates: PoseUpdateRate::default(),
            last_sequence: None,
        }
    }

    /// Current pose.
    pub fn pose(&self) -> Pose2D {
        self.pose
    }

    /// Rates computed by the most recent integration step.
    pub fn rates(&self) -> PoseUpdateRate {
        self.rates
    }

    pub fn wheel_separation(&self) -> f64 {
        self.wheel_separation
    }

    /// Move the pose back to the origin and clear the rates.
    pub fn reset(&mut self) {
        self.pose = Pose2D::default();
        self.rates = PoseUpdateRate::default();
    }

    /// Apply one wheel delta.
    ///
    /// Returns `false` without touching pose or rates when `delta` carries the
    /// same sequence number as the previously integrated delta.
    pub fn integrate(&mut self, delta: &WheelDelta) -> bool {
        if self.last_sequence == Some(delta.sequence) {
            debug!(sequence = delta.sequence, "wheel delta already integrated");
            return false;
        }
        self.last_sequence = Some(delta.sequence);

        let step = body_displacement(delta.left_m, delta.right_m, self.wheel_separation);

        let (sin_h, cos_h) = self.pose.heading.sin_cos();
        self.pose = Pose2D {
            x: self.pose.x + step.x * cos_h - step.y * sin_h,
            y: self.pose.y + step.x * sin_h + step.y * cos_h,
            heading: wrap_angle(self.pose.heading + step.heading),
        };

        self.rates = if delta.elapsed_s > 0.0 && delta.elapsed_s.is_finite() {
            PoseUpdateRate {
                vx: step.x / delta.elapsed_s,
                vy: step.y / delta.elapsed_s,
                vtheta: step.heading / delta.elapsed_s,
            }
        } else {
            PoseUpdateRate::default()
        };
        true
    }
}

/// Robot-frame displacement produced by `left` / `right` wheel travel.
///
/// `heading` of the result is the unwrapped rotation.
pub fn body_displacement(left: f64, right: f64, wheel_separation: f64) -> Pose2D {
    let dtheta = (right - left) / wheel_separation;
    let distance = (left + right) / 2.0;

    if dtheta.abs() < STRAIGHT_THRESHOLD {
        Pose2D {
            x: distance,
            y: 0.0,
            heading: dtheta,
        }
    } else {
        let radius = distance / dtheta;
        Pose2D {
            x: radius * dtheta.sin(),
            y: radius * (1.0 - dtheta.cos()),
            heading: dtheta,
        }
    }
}
