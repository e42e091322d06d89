//! `basebridge-perception` – dead reckoning for the mobile base.
//!
//! Turns wheel encoder travel into the pose estimate published as odometry.
//!
//! # Modules
//!
//! - [`odometry`] – [`OdometryIntegrator`][odometry::OdometryIntegrator]:
//!   differential-drive integration of [`Pose2D`][odometry::Pose2D] and
//!   [`PoseUpdateRate`][odometry::PoseUpdateRate].
//! - [`transform`] – [`Transform3D`][transform::Transform3D]: rigid-body
//!   transforms between named reference frames.

pub mod odometry;
pub mod transform;

pub use odometry::{OdometryIntegrator, Pose2D, PoseUpdateRate, wrap_angle};
pub use transform::Transform3D;
