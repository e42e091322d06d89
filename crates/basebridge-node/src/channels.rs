//! The telemetry channel table.
//!
//! [`ChannelRegistry`] maps every [`TelemetryTag`] to exactly one
//! [`ChannelHandler`].  When the driver fires a tag, the router reads the
//! driver's current snapshot and hands it to the handler, which publishes
//! one outbound message on the tag's topic.
//!
//! A missing snapshot (or one of the wrong variant) never suppresses the
//! message: the handler falls back to the zeroed payload and logs the gap at
//! debug level.
//!
//! Handlers only see a [`ChannelSink`]: somewhere to publish, a way to read
//! other snapshots, and the two pieces of shared state a firing may touch.

use std::collections::HashMap;

use basebridge_middleware::Topic;
use basebridge_types::{
    BridgeError, BumperEvent, BumperState, CliffEvent, CliffState, EventPayload, Imu, InertiaData,
    Quaternion, SENSOR_CENTER, SENSOR_LEFT, SENSOR_RIGHT, SensorCoreData, SensorPosition,
    TelemetryEvent, TelemetryTag, Vec3, WheelState,
};
use chrono::{DateTime, Utc};
use tracing::debug;

/// What a channel handler may do with a firing.
pub trait ChannelSink {
    /// Publish one message on `topic`.
    fn emit(&self, topic: Topic, stamp: DateTime<Utc>, payload: EventPayload);

    /// Frame the base-mounted sensors report in.
    fn base_frame(&self) -> &str;

    /// The driver's current snapshot for `tag`.
    fn snapshot(&self, tag: TelemetryTag) -> Option<TelemetryEvent>;

    /// Merge `wheels` into the joint state and publish it, then, when
    /// `integrate` is set, integrate the delta and publish odometry.  All of
    /// it happens under one lock.
    fn apply_wheels(&self, wheels: &WheelState, integrate: bool, stamp: DateTime<Utc>);

    /// Store the latest bumper and cliff bitfields, returning the previous
    /// pair.
    fn swap_contacts(&self, bumper: u8, cliff: u8) -> (u8, u8);
}

/// Handles one firing of a telemetry tag.
///
/// `snapshot` is whatever the driver held for the tag at fire time; `stamp`
/// is the timestamp every message produced by this firing carries.
pub type ChannelHandler = fn(&dyn ChannelSink, Option<TelemetryEvent>, DateTime<Utc>);

/// Tag → handler table.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    handlers: HashMap<TelemetryTag, ChannelHandler>,
}

impl ChannelRegistry {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The table covering every tag.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(TelemetryTag::WheelState, wheel_state);
        registry.register(TelemetryTag::SensorCore, sensor_core);
        registry.register(TelemetryTag::Ir, ir);
        registry.register(TelemetryTag::DockIr, dock_ir);
        registry.register(TelemetryTag::Inertia, inertia);
        registry.register(TelemetryTag::Cliff, cliff);
        registry.register(TelemetryTag::Current, current);
        registry.register(TelemetryTag::Magnet, magnet);
        registry.register(TelemetryTag::HardwareInfo, hardware_info);
        registry.register(TelemetryTag::FirmwareInfo, firmware_info);
        registry.register(TelemetryTag::TimeInfo, time_info);
        registry.register(TelemetryTag::GyroRaw, gyro_raw);
        registry.register(TelemetryTag::Eeprom, eeprom);
        registry.register(TelemetryTag::GpInput, gp_input);
        registry
    }

    /// Bind `handler` to `tag`, returning the handler it replaces.
    pub fn register(&mut self, tag: TelemetryTag, handler: ChannelHandler) -> Option<ChannelHandler> {
        self.handlers.insert(tag, handler)
    }

    pub fn handler(&self, tag: TelemetryTag) -> Option<ChannelHandler> {
        self.handlers.get(&tag).copied()
    }

    /// Registered tags in [`TelemetryTag::ALL`] order.
    pub fn tags(&self) -> Vec<TelemetryTag> {
        TelemetryTag::ALL
            .into_iter()
            .filter(|tag| self.handlers.contains_key(tag))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Zeroed payload for a tag whose snapshot is absent or of the wrong kind.
fn fallback<T: Default>(tag: TelemetryTag, snapshot: Option<TelemetryEvent>) -> T {
    let reason = BridgeError::MissingTelemetry(tag);
    match snapshot {
        None => debug!(?tag, "{reason}; publishing defaults"),
        Some(other) => debug!(?tag, got = ?other.tag(), "{reason}; publishing defaults"),
    }
    T::default()
}

/// Generates a handler that forwards the snapshot payload unchanged.
macro_rules! forward {
    ($name:ident, $variant:ident, $topic:ident, $payload:ident) => {
        fn $name(sink: &dyn ChannelSink, snapshot: Option<TelemetryEvent>, stamp: DateTime<Utc>) {
            let data = match snapshot {
                Some(TelemetryEvent::$variant(data)) => data,
                other => fallback(TelemetryTag::$variant, other),
            };
            sink.emit(Topic::$topic, stamp, EventPayload::$payload(data));
        }
    };
}

forward!(ir, Ir, Ir, Ir);
forward!(dock_ir, DockIr, DockIr, DockIr);
forward!(cliff, Cliff, Cliff, Cliff);
forward!(current, Current, Current, Current);
forward!(magnet, Magnet, Magnet, Magnet);
forward!(hardware_info, HardwareInfo, HardwareVersion, HardwareVersion);
forward!(firmware_info, FirmwareInfo, FirmwareVersion, FirmwareVersion);
forward!(time_info, TimeInfo, Time, Time);
forward!(gyro_raw, GyroRaw, GyroRaw, GyroRaw);
forward!(eeprom, Eeprom, Eeprom, Eeprom);
forward!(gp_input, GpInput, GpInput, GpInput);

/// Gyro firing: the derived IMU message, then the raw reading.
fn inertia(sink: &dyn ChannelSink, snapshot: Option<TelemetryEvent>, stamp: DateTime<Utc>) {
    let data = match snapshot {
        Some(TelemetryEvent::Inertia(data)) => data,
        other => fallback(TelemetryTag::Inertia, other),
    };
    sink.emit(
        Topic::Imu,
        stamp,
        EventPayload::Imu(imu_message(&data, sink.base_frame())),
    );
    sink.emit(Topic::Inertia, stamp, EventPayload::Inertia(data));
}

/// Wheel firing: joints always, odometry only for a real reading.
///
/// A zeroed fallback carries `sequence: 0`; integrating it would mark the
/// driver's own first sequence number as already seen.
pub(crate) fn wheel_state(
    sink: &dyn ChannelSink,
    snapshot: Option<TelemetryEvent>,
    stamp: DateTime<Utc>,
) {
    let (wheels, integrate) = match snapshot {
        Some(TelemetryEvent::WheelState(wheels)) => (wheels, true),
        other => (fallback::<WheelState>(TelemetryTag::WheelState, other), false),
    };
    sink.apply_wheels(&wheels, integrate, stamp);
}

const SENSOR_BITS: [(u8, SensorPosition); 3] = [
    (SENSOR_LEFT, SensorPosition::Left),
    (SENSOR_CENTER, SensorPosition::Center),
    (SENSOR_RIGHT, SensorPosition::Right),
];

/// Sensors whose bit differs between `previous` and `current`, with the new
/// bit value.
fn changed_bits(previous: u8, current: u8) -> impl Iterator<Item = (SensorPosition, bool)> {
    let changed = previous ^ current;
    SENSOR_BITS
        .into_iter()
        .filter(move |(bit, _)| changed & bit != 0)
        .map(move |(bit, position)| (position, current & bit != 0))
}

/// Index of a sensor in the right / centre / left ordered cliff readings.
fn cliff_index(position: SensorPosition) -> usize {
    match position {
        SensorPosition::Right => 0,
        SensorPosition::Center => 1,
        SensorPosition::Left => 2,
    }
}

/// Core-sensor firing: forward the packet, then publish one bumper / cliff
/// event per changed bit.
pub(crate) fn sensor_core(
    sink: &dyn ChannelSink,
    snapshot: Option<TelemetryEvent>,
    stamp: DateTime<Utc>,
) {
    let core: SensorCoreData = match snapshot {
        Some(TelemetryEvent::SensorCore(core)) => core,
        other => fallback(TelemetryTag::SensorCore, other),
    };
    sink.emit(Topic::SensorCore, stamp, EventPayload::SensorCore(core));

    let bottom = match sink.snapshot(TelemetryTag::Cliff) {
        Some(TelemetryEvent::Cliff(cliff)) => cliff.bottom,
        _ => [0; 3],
    };
    let (bumper_was, cliff_was) = sink.swap_contacts(core.bumper, core.cliff);

    for (bumper, pressed) in changed_bits(bumper_was, core.bumper) {
        let event = BumperEvent {
            bumper,
            state: if pressed {
                BumperState::Pressed
            } else {
                BumperState::Released
            },
        };
        debug!(?bumper, state = ?event.state, "bumper edge");
        sink.emit(Topic::BumperEvents, stamp, EventPayload::BumperEvent(event));
    }
    for (sensor, cliff) in changed_bits(cliff_was, core.cliff) {
        let event = CliffEvent {
            sensor,
            state: if cliff {
                CliffState::Cliff
            } else {
                CliffState::Floor
            },
            bottom: bottom[cliff_index(sensor)],
        };
        debug!(?sensor, state = ?event.state, "cliff edge");
        sink.emit(Topic::CliffEvents, stamp, EventPayload::CliffEvent(event));
    }
}

/// IMU message for a gyro reading: yaw-only orientation, yaw rate, and the
/// raw accelerometer counts.
pub fn imu_message(data: &InertiaData, frame_id: &str) -> Imu {
    let [ax, ay, az] = data.acc;
    Imu {
        frame_id: frame_id.to_string(),
        orientation: Quaternion::from_yaw(data.angle_rad),
        angular_velocity: Vec3::new(0.0, 0.0, data.angle_rate_rad_s),
        linear_acceleration: Vec3::new(f64::from(ax), f64::from(ay), f64::from(az)),
    }
}
