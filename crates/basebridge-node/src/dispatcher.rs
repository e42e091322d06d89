//! [`CommandDispatcher`] – validates inbound commands and forwards them to
//! the driver.
//!
//! | Topic | Payload | Driver call |
//! |---|---|---|
//! | `commands/wheel_left` | `WheelCommand` targeting the left joint | `set_wheel(Left, value)` |
//! | `commands/wheel_right` | `WheelCommand` targeting the right joint | `set_wheel(Right, value)` |
//! | `commands/velocity` | `VelocityCommand` | `set_base_velocity` |
//! | `commands/device` | `CompositeCommand` | `send_command` |
//!
//! Dispatch never blocks, never retries, and never touches the pose or the
//! run state.  Rejected commands are logged and dropped.

use std::sync::Arc;

use basebridge_hal::BaseDriver;
use basebridge_middleware::{EventBus, Topic, TopicReceiver};
use basebridge_types::{BridgeError, EventPayload, WheelCommand, WheelSide};
use tracing::{debug, warn};

use crate::config::NodeConfig;

/// Inbound topics, in drain order.
pub const COMMAND_TOPICS: [Topic; 4] = [
    Topic::WheelLeftCommand,
    Topic::WheelRightCommand,
    Topic::VelocityCommand,
    Topic::DeviceCommand,
];

pub struct CommandDispatcher {
    driver: Arc<dyn BaseDriver>,
    wheel_left: String,
    wheel_right: String,
    inbox: Vec<TopicReceiver>,
}

impl CommandDispatcher {
    pub fn new(driver: Arc<dyn BaseDriver>, config: &NodeConfig) -> Self {
        Self {
            driver,
            wheel_left: config.wheel_left.clone(),
            wheel_right: config.wheel_right.clone(),
            inbox: Vec::new(),
        }
    }

    /// Subscribe to every command topic on `bus`, replacing any previous
    /// subscriptions.
    pub fn subscribe(&mut self, bus: &EventBus) {
        self.inbox = COMMAND_TOPICS
            .iter()
            .map(|&topic| bus.subscribe_to(topic))
            .collect();
    }

    pub fn is_subscribed(&self) -> bool {
        !self.inbox.is_empty()
    }

    /// Dispatch every command waiting on the subscribed topics.
    ///
    /// Returns how many commands reached the driver successfully.
    pub fn drain(&mut self) -> usize {
        let mut pending = Vec::new();
        for rx in &mut self.inbox {
            while let Some(event) = rx.try_recv() {
                pending.push((rx.topic(), event.payload));
            }
        }

        let mut delivered = 0;
        for (topic, payload) in pending {
            match self.dispatch(topic, &payload) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(topic = topic.name(), error = %e, "command dropped"),
            }
        }
        delivered
    }

    /// Validate one command and forward it.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::MalformedCommand`] when `topic` is not a command
    ///   topic, the payload kind does not match it, a wheel command names the
    ///   wrong joint, or a wheel value is not finite.  No driver call is made.
    /// - [`BridgeError::DriverUnavailable`] passed through from the driver.
    pub fn dispatch(&self, topic: Topic, payload: &EventPayload) -> Result<(), BridgeError> {
        match (topic, payload) {
            (Topic::WheelLeftCommand, EventPayload::WheelCommand(cmd)) => {
                self.wheel(topic, WheelSide::Left, &self.wheel_left, cmd)
            }
            (Topic::WheelRightCommand, EventPayload::WheelCommand(cmd)) => {
                self.wheel(topic, WheelSide::Right, &self.wheel_right, cmd)
            }
            (Topic::VelocityCommand, EventPayload::VelocityCommand(cmd)) => {
                debug!(linear = cmd.linear, angular = cmd.angular, "velocity command");
                self.driver.set_base_velocity(*cmd)
            }
            (Topic::DeviceCommand, EventPayload::DeviceCommand(cmd)) => {
                debug!(code = cmd.code, len = cmd.data.len(), "device command");
                self.driver.send_command(cmd)
            }
            (topic, _) if !topic.is_command() => Err(malformed(topic, "not a command topic")),
            (topic, _) => Err(malformed(topic, "payload kind does not match topic")),
        }
    }

    fn wheel(
        &self,
        topic: Topic,
        side: WheelSide,
        expected: &str,
        cmd: &WheelCommand,
    ) -> Result<(), BridgeError> {
        if cmd.target != expected {
            return Err(malformed(
                topic,
                format!("target '{}' is not the {side} wheel '{expected}'", cmd.target),
            ));
        }
        if !cmd.value.is_finite() {
            return Err(malformed(topic, format!("value {} is not finite", cmd.value)));
        }
        debug!(%side, value = cmd.value, "wheel command");
        self.driver.set_wheel(side, cmd.value)
    }
}

fn malformed(topic: Topic, reason: impl Into<String>) -> BridgeError {
    BridgeError::MalformedCommand {
        channel: topic.name().to_string(),
        reason: reason.into(),
    }
}
