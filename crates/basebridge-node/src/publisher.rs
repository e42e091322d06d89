//! Odometry and `odom → base` transform publication.
//!
//! [`OdometryPublisher`] turns the integrator's pose and rates into an
//! [`Odometry`] message and, when enabled, a [`TransformStamped`].  Both are
//! built from the same [`Transform3D`] and stamped with the same timestamp, so
//! consumers can pair them.

use basebridge_middleware::{EventBus, Topic};
use basebridge_perception::{Pose2D, PoseUpdateRate, Transform3D};
use basebridge_types::{EventPayload, Odometry, Pose, TransformStamped, Twist, Vec3};
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::config::NodeConfig;

/// Builds and publishes odometry for one `odom → base` frame pair.
#[derive(Debug, Clone)]
pub struct OdometryPublisher {
    odom_frame: String,
    base_frame: String,
    publish_tf: bool,
}

impl OdometryPublisher {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            odom_frame: config.odom_frame.clone(),
            base_frame: config.base_frame.clone(),
            publish_tf: config.publish_tf,
        }
    }

    pub fn publishes_transform(&self) -> bool {
        self.publish_tf
    }

    /// `odom → base` for `pose`.
    pub fn transform(&self, pose: &Pose2D) -> TransformStamped {
        Transform3D::from_pose(pose).to_message(&self.odom_frame, &self.base_frame)
    }

    /// Pose plus robot-frame velocity.
    pub fn odometry(&self, pose: &Pose2D, rates: &PoseUpdateRate) -> Odometry {
        let t = Transform3D::from_pose(pose);
        Odometry {
            frame_id: self.odom_frame.clone(),
            child_frame_id: self.base_frame.clone(),
            pose: Pose {
                position: t.translation,
                orientation: t.rotation,
            },
            twist: Twist {
                linear: Vec3::new(rates.vx, rates.vy, 0.0),
                angular: Vec3::new(0.0, 0.0, rates.vtheta),
            },
        }
    }

    /// Publish odometry, then the transform if enabled, both stamped `stamp`.
    ///
    /// Callers hold the pose lock across this call so that a concurrent
    /// integration step cannot slip between the two messages.
    pub fn publish(
        &self,
        bus: &EventBus,
        stamp: DateTime<Utc>,
        pose: &Pose2D,
        rates: &PoseUpdateRate,
    ) {
        let odometry = self.odometry(pose, rates);
        if let Err(e) = bus.publish(Topic::Odometry, stamp, EventPayload::Odometry(odometry)) {
            warn!(error = %e, "failed to publish odometry");
        }
        if self.publish_tf {
            let transform = self.transform(pose);
            if let Err(e) = bus.publish(Topic::Transform, stamp, EventPayload::Transform(transform)) {
                warn!(error = %e, "failed to publish transform");
            }
        }
    }
}
