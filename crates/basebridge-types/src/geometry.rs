//! Geometry primitives shared by outbound messages.
//!
//! Quaternions use the (w, x, y, z) convention.  Planar robots only ever
//! rotate about Z, so [`Quaternion::from_yaw`] and [`Quaternion::yaw`] are the
//! conversions used on the hot path.

use serde::{Deserialize, Serialize};

/// A 3-D vector (metres for translations, per-second units for twists).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A unit quaternion representing a 3-D rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1).
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `yaw` radians about the +Z axis.
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw * 0.5;
        Self::new(half.cos(), 0.0, 0.0, half.sin())
    }

    /// Heading about +Z encoded by this quaternion, in (−π, π].
    pub fn yaw(self) -> f64 {
        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny_cosp.atan2(cosy_cosp)
    }
}
