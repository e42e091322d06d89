//! Rigid-body transforms between named frames.
//!
//! [`Transform3D`] is a translation plus quaternion rotation.  A planar
//! [`Pose2D`] of frame B expressed in frame A lifts to the transform
//! `T_A_B` through [`Transform3D::from_pose`].
//!
//! # Example
//!
//! ```rust
//! use basebridge_perception::odometry::Pose2D;
//! use basebridge_perception::transform::Transform3D;
//!
//! // base is 1 m forward of odom and turned 90° left.
//! let t = Transform3D::from_pose(&Pose2D::new(1.0, 0.0, std::f64::consts::FRAC_PI_2));
//! let msg = t.to_message("odom", "base_footprint");
//!
//! assert_eq!(msg.translation.x, 1.0);
//! assert!((msg.rotation.yaw() - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
//! ```

use basebridge_types::{Quaternion, TransformStamped, Vec3};

use crate::odometry::Pose2D;

/// A rigid-body 3-D transform: the pose of frame B relative to frame A.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform3D {
    /// Create a transform from a translation and rotation.
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// Lift a planar pose onto the ground plane (z = 0, yaw-only rotation).
    pub fn from_pose(pose: &Pose2D) -> Self {
        Self::new(
            Vec3::new(pose.x, pose.y, 0.0),
            Quaternion::from_yaw(pose.heading),
        )
    }

    /// Stamp this transform with its frame names.
    pub fn to_message(
        &self,
        frame_id: impl Into<String>,
        child_frame_id: impl Into<String>,
    ) -> TransformStamped {
        TransformStamped {
            frame_id: frame_id.into(),
            child_frame_id: child_frame_id.into(),
            translation: self.translation,
            rotation: self.rotation,
        }
    }
}
