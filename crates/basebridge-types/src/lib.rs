//! `basebridge-types` – shared vocabulary of the bridge.
//!
//! # Modules
//!
//! - [`telemetry`] – driver-side [`TelemetryTag`]s and snapshot payloads.
//! - [`messages`] – outbound messages assembled by the bridge.
//! - [`commands`] – inbound wheel, velocity and device commands.
//! - [`geometry`] – [`Vec3`] and [`Quaternion`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub mod commands;
pub mod geometry;
pub mod messages;
pub mod telemetry;

pub use commands::{CompositeCommand, RunState, VelocityCommand, WheelCommand, WheelSide};
pub use geometry::{Quaternion, Vec3};
pub use messages::{
    BumperEvent, BumperState, CliffEvent, CliffState, Imu, JointState, Odometry, Pose,
    SensorPosition, TransformStamped, Twist,
};
pub use telemetry::{
    CliffData, CurrentData, DockIrData, EepromData, GpInputData, GyroRawData, InertiaData,
    IrData, MagnetData, SENSOR_CENTER, SENSOR_LEFT, SENSOR_RIGHT, SensorCoreData, TelemetryEvent,
    TelemetryTag, TimeData, VersionInfo, WheelDelta, WheelJoint, WheelState,
};

/// Unified message envelope carried on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Topic the event was published on, e.g. `"sensors/core"`.
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` with a fresh id.
    pub fn new(source: impl Into<String>, timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            source: source.into(),
            payload,
        }
    }
}

/// Every message kind routed over the bus, outbound and inbound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    JointState(JointState),
    SensorCore(SensorCoreData),
    Ir(IrData),
    DockIr(DockIrData),
    Imu(Imu),
    Inertia(InertiaData),
    Cliff(CliffData),
    Current(CurrentData),
    Magnet(MagnetData),
    HardwareVersion(VersionInfo),
    FirmwareVersion(VersionInfo),
    Time(TimeData),
    GyroRaw(GyroRawData),
    Eeprom(EepromData),
    GpInput(GpInputData),
    Odometry(Odometry),
    Transform(TransformStamped),
    BumperEvent(BumperEvent),
    CliffEvent(CliffEvent),
    WheelCommand(WheelCommand),
    VelocityCommand(VelocityCommand),
    DeviceCommand(CompositeCommand),
}

/// Error type shared by every bridge crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BridgeError {
    #[error("Malformed command on {channel}: {reason}")]
    MalformedCommand { channel: String, reason: String },

    #[error("No telemetry available for {0:?}")]
    MissingTelemetry(TelemetryTag),

    #[error("Driver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("Channel Error: {0}")]
    Channel(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),
}
