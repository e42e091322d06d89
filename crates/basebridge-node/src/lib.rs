//! `basebridge-node` – the bridge between a base driver and the event bus.
//!
//! # Modules
//!
//! - [`channels`] – [`ChannelRegistry`]: one handler per telemetry tag, one
//!   outbound message per firing, written against the [`ChannelSink`] trait.
//! - [`router`] – [`TelemetryRouter`]: the [`ChannelSink`] that reads driver
//!   snapshots and owns the odometry, joint-merge and contact-edge state
//!   behind a single lock.
//! - [`publisher`] – [`OdometryPublisher`]: odometry plus the `odom → base`
//!   transform, sharing one timestamp.
//! - [`dispatcher`] – [`CommandDispatcher`]: validates wheel, velocity and
//!   device commands and forwards them to the driver.
//! - [`lifecycle`] – [`LifecycleGate`]: idempotent enable / disable.
//! - [`node`] – [`DeviceNode`] and [`BaseNode`]: the host-facing plug-in.
//! - [`config`] – [`NodeConfig`]: TOML + environment configuration.
//! - [`telemetry`] – [`init_tracing`]: log subscriber with optional OTLP
//!   export.

pub mod channels;
pub mod config;
pub mod dispatcher;
pub mod lifecycle;
pub mod node;
pub mod publisher;
pub mod router;
pub mod telemetry;

pub use channels::{ChannelHandler, ChannelRegistry, ChannelSink};
pub use config::NodeConfig;
pub use dispatcher::{COMMAND_TOPICS, CommandDispatcher};
pub use lifecycle::LifecycleGate;
pub use node::{BaseNode, DeviceNode};
pub use publisher::OdometryPublisher;
pub use router::{JointMerger, JointSlot, TelemetryRouter};
pub use telemetry::{TracerProviderGuard, init_tracing};
