//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.  Sending never blocks or awaits, which lets driver callbacks
//! publish straight from the driver's own thread.
//!
//! # Topics
//!
//! Every outbound message kind and every inbound command kind has its own
//! [`Topic`] lane:
//!
//! | Topic | Direction | Traffic |
//! |---|---|---|
//! | [`Topic::JointStates`] | out | Merged left/right wheel joints |
//! | [`Topic::Odometry`], [`Topic::Transform`] | out | Integrated pose |
//! | `Topic::SensorCore` … `Topic::GpInput` | out | One lane per telemetry channel |
//! | [`Topic::Inertia`] | out | Raw gyro reading, alongside the derived [`Topic::Imu`] |
//! | [`Topic::BumperEvents`], [`Topic::CliffEvents`] | out | Sensor transitions |
//! | `Topic::*Command` | in | Wheel, velocity and device commands |

use basebridge_types::{BridgeError, Event, EventPayload, TelemetryTag};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Enumeration of all routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    JointStates,
    SensorCore,
    Ir,
    DockIr,
    Imu,
    Inertia,
    Cliff,
    Current,
    Magnet,
    HardwareVersion,
    FirmwareVersion,
    Time,
    GyroRaw,
    Eeprom,
    GpInput,
    Odometry,
    Transform,
    BumperEvents,
    CliffEvents,
    WheelLeftCommand,
    WheelRightCommand,
    VelocityCommand,
    DeviceCommand,
}

impl Topic {
    /// Number of topics.
    pub const COUNT: usize = 23;

    /// Every topic, in discriminant order.
    pub const ALL: [Topic; Topic::COUNT] = [
        Topic::JointStates,
        Topic::SensorCore,
        Topic::Ir,
        Topic::DockIr,
        Topic::Imu,
        Topic::Inertia,
        Topic::Cliff,
        Topic::Current,
        Topic::Magnet,
        Topic::HardwareVersion,
        Topic::FirmwareVersion,
        Topic::Time,
        Topic::GyroRaw,
        Topic::Eeprom,
        Topic::GpInput,
        Topic::Odometry,
        Topic::Transform,
        Topic::BumperEvents,
        Topic::CliffEvents,
        Topic::WheelLeftCommand,
        Topic::WheelRightCommand,
        Topic::VelocityCommand,
        Topic::DeviceCommand,
    ];

    /// Wire name of the topic, used as the `source` of published events.
    pub fn name(self) -> &'static str {
        match self {
            Topic::JointStates => "joint_states",
            Topic::SensorCore => "sensors/core",
            Topic::Ir => "sensors/ir",
            Topic::DockIr => "sensors/dock_ir",
            Topic::Imu => "sensors/imu",
            Topic::Inertia => "sensors/inertia",
            Topic::Cliff => "sensors/cliff",
            Topic::Current => "sensors/current",
            Topic::Magnet => "sensors/magnet",
            Topic::HardwareVersion => "debug/hardware_version",
            Topic::FirmwareVersion => "debug/firmware_version",
            Topic::Time => "debug/time",
            Topic::GyroRaw => "debug/gyro_raw",
            Topic::Eeprom => "debug/eeprom",
            Topic::GpInput => "sensors/gp_input",
            Topic::Odometry => "odom",
            Topic::Transform => "tf",
            Topic::BumperEvents => "events/bumper",
            Topic::CliffEvents => "events/cliff",
            Topic::WheelLeftCommand => "commands/wheel_left",
            Topic::WheelRightCommand => "commands/wheel_right",
            Topic::VelocityCommand => "commands/velocity",
            Topic::DeviceCommand => "commands/device",
        }
    }

    /// The outbound lane fed by a telemetry channel.
    pub fn for_tag(tag: TelemetryTag) -> Topic {
        match tag {
            TelemetryTag::WheelState => Topic::JointStates,
            TelemetryTag::SensorCore => Topic::SensorCore,
            TelemetryTag::Ir => Topic::Ir,
            TelemetryTag::DockIr => Topic::DockIr,
            TelemetryTag::Inertia => Topic::Imu,
            TelemetryTag::Cliff => Topic::Cliff,
            TelemetryTag::Current => Topic::Current,
            TelemetryTag::Magnet => Topic::Magnet,
            TelemetryTag::HardwareInfo => Topic::HardwareVersion,
            TelemetryTag::FirmwareInfo => Topic::FirmwareVersion,
            TelemetryTag::TimeInfo => Topic::Time,
            TelemetryTag::GyroRaw => Topic::GyroRaw,
            TelemetryTag::Eeprom => Topic::Eeprom,
            TelemetryTag::GpInput => Topic::GpInput,
        }
    }

    /// `true` for lanes carrying inbound commands.
    pub fn is_command(self) -> bool {
        matches!(
            self,
            Topic::WheelLeftCommand
                | Topic::WheelRightCommand
                | Topic::VelocityCommand
                | Topic::DeviceCommand
        )
    }
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    channels: [broadcast::Sender<Event>; Topic::COUNT],
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently and is
    /// raised to 1 if zero.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            channels: std::array::from_fn(|_| broadcast::channel(capacity).0),
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event.
    /// Returns `Ok(0)` when no subscribers are currently listening on the
    /// topic (this is a normal condition, not an error).
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, BridgeError> {
        match self.topic_sender(topic).send(event) {
            Ok(n) => Ok(n),
            Err(broadcast::error::SendError(_)) => Ok(0),
        }
    }

    /// Wrap `payload` in a fresh [`Event`] stamped with `timestamp` and
    /// publish it on `topic`.
    pub fn publish(
        &self,
        topic: Topic,
        timestamp: DateTime<Utc>,
        payload: EventPayload,
    ) -> Result<usize, BridgeError> {
        self.publish_to(topic, Event::new(topic.name(), timestamp, payload))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        &self.channels[topic as usize]
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// A receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Returns:
    /// * `Ok(event)` – a successfully received event.
    /// * `Err(broadcast::error::RecvError::Lagged(n))` – the subscriber fell
    ///   behind and `n` messages were dropped.
    /// * `Err(broadcast::error::RecvError::Closed)` – the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Take the next buffered event without waiting.
    ///
    /// Returns `None` when nothing is pending or the bus is closed.  Lag is
    /// logged and skipped over.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(topic = self.topic.name(), lagged_by = n, "TopicReceiver lagged");
                    continue;
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
            }
        }
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}
