//! Telemetry produced by the base driver.
//!
//! The driver signals a [`TelemetryTag`] whenever new data of that kind is
//! available, and exposes the current snapshot as a [`TelemetryEvent`].  The
//! snapshot structs double as the payload of the matching outbound message,
//! so most channels forward them unchanged.

use serde::{Deserialize, Serialize};

/// Discriminant of a [`TelemetryEvent`], used to subscribe to driver signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TelemetryTag {
    WheelState,
    SensorCore,
    Ir,
    DockIr,
    Inertia,
    Cliff,
    Current,
    Magnet,
    HardwareInfo,
    FirmwareInfo,
    TimeInfo,
    GyroRaw,
    Eeprom,
    GpInput,
}

impl TelemetryTag {
    /// Every tag, in a stable order.
    pub const ALL: [TelemetryTag; 14] = [
        TelemetryTag::WheelState,
        TelemetryTag::SensorCore,
        TelemetryTag::Ir,
        TelemetryTag::DockIr,
        TelemetryTag::Inertia,
        TelemetryTag::Cliff,
        TelemetryTag::Current,
        TelemetryTag::Magnet,
        TelemetryTag::HardwareInfo,
        TelemetryTag::FirmwareInfo,
        TelemetryTag::TimeInfo,
        TelemetryTag::GyroRaw,
        TelemetryTag::Eeprom,
        TelemetryTag::GpInput,
    ];
}

/// Snapshot of one telemetry channel as held by the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TelemetryEvent {
    WheelState(WheelState),
    SensorCore(SensorCoreData),
    Ir(IrData),
    DockIr(DockIrData),
    Inertia(InertiaData),
    Cliff(CliffData),
    Current(CurrentData),
    Magnet(MagnetData),
    HardwareInfo(VersionInfo),
    FirmwareInfo(VersionInfo),
    TimeInfo(TimeData),
    GyroRaw(GyroRawData),
    Eeprom(EepromData),
    GpInput(GpInputData),
}

impl TelemetryEvent {
    /// The tag this snapshot belongs to.
    pub fn tag(&self) -> TelemetryTag {
        match self {
            TelemetryEvent::WheelState(_) => TelemetryTag::WheelState,
            TelemetryEvent::SensorCore(_) => TelemetryTag::SensorCore,
            TelemetryEvent::Ir(_) => TelemetryTag::Ir,
            TelemetryEvent::DockIr(_) => TelemetryTag::DockIr,
            TelemetryEvent::Inertia(_) => TelemetryTag::Inertia,
            TelemetryEvent::Cliff(_) => TelemetryTag::Cliff,
            TelemetryEvent::Current(_) => TelemetryTag::Current,
            TelemetryEvent::Magnet(_) => TelemetryTag::Magnet,
            TelemetryEvent::HardwareInfo(_) => TelemetryTag::HardwareInfo,
            TelemetryEvent::FirmwareInfo(_) => TelemetryTag::FirmwareInfo,
            TelemetryEvent::TimeInfo(_) => TelemetryTag::TimeInfo,
            TelemetryEvent::GyroRaw(_) => TelemetryTag::GyroRaw,
            TelemetryEvent::Eeprom(_) => TelemetryTag::Eeprom,
            TelemetryEvent::GpInput(_) => TelemetryTag::GpInput,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Wheels
// ────────────────────────────────────────────────────────────────────────────

/// Joint state of a single drive wheel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelJoint {
    /// Accumulated wheel angle (radians).
    pub position_rad: f64,
    /// Wheel angular velocity (rad/s).
    pub velocity_rad_s: f64,
}

/// Wheel travel since the previous wheel-state event.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelDelta {
    /// Monotonic counter assigned by the driver; a repeated value means no
    /// new encoder data.
    pub sequence: u64,
    /// Left wheel travel (metres, positive forward).
    pub left_m: f64,
    /// Right wheel travel (metres, positive forward).
    pub right_m: f64,
    /// Time covered by this delta (seconds).
    pub elapsed_s: f64,
}

/// Wheel telemetry.  Either side may be absent when the driver only refreshed
/// one wheel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WheelState {
    pub left: Option<WheelJoint>,
    pub right: Option<WheelJoint>,
    pub delta: WheelDelta,
}

// ────────────────────────────────────────────────────────────────────────────
// Sensors
// ────────────────────────────────────────────────────────────────────────────

/// Bit of the bumper / cliff / wheel-drop bitfields for the right sensor.
pub const SENSOR_RIGHT: u8 = 0x01;
/// Bit for the centre sensor.
pub const SENSOR_CENTER: u8 = 0x02;
/// Bit for the left sensor.
pub const SENSOR_LEFT: u8 = 0x04;

/// Core sensor packet: bumpers, cliffs, encoders, buttons and power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SensorCoreData {
    /// Driver clock in milliseconds (wraps).
    pub time_stamp: u16,
    pub bumper: u8,
    pub wheel_drop: u8,
    pub cliff: u8,
    pub left_encoder: u16,
    pub right_encoder: u16,
    pub left_pwm: i8,
    pub right_pwm: i8,
    pub buttons: u8,
    pub charger: u8,
    /// Battery voltage in 0.1 V units.
    pub battery: u8,
    pub over_current: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IrData {
    pub obstacle: [u8; 3],
}

/// Docking-station infrared receivers (right, centre, left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DockIrData {
    pub docking: [u8; 3],
}

/// On-board gyro heading and raw accelerometer readings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InertiaData {
    pub angle_rad: f64,
    pub angle_rate_rad_s: f64,
    pub acc: [i16; 3],
}

/// Raw floor-distance readings from the cliff sensors (right, centre, left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CliffData {
    pub bottom: [u16; 3],
}

/// Motor currents (left, right) in 10 mA units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CurrentData {
    pub current: [u8; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MagnetData {
    pub field: [i16; 3],
}

/// Hardware or firmware version triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionInfo {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeData {
    pub uptime_ms: u32,
}

/// Raw three-axis gyro samples accumulated since the previous packet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GyroRawData {
    pub frame_id: u8,
    pub samples: Vec<[u16; 3]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EepromData {
    pub frame_id: u8,
    pub data: Vec<u8>,
}

/// General-purpose digital and analog inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GpInputData {
    pub digital_input: u16,
    pub analog_input: [u16; 4],
}
