//! [`BaseNode`] – the bridge as a host plug-in.
//!
//! Hosts drive the bridge through the [`DeviceNode`] capability:
//!
//! 1. [`init`](DeviceNode::init) binds one driver signal handler per
//!    registered telemetry tag and routes driver diagnostics into the log,
//! 2. [`advertise_topics`](DeviceNode::advertise_topics) reports the
//!    outbound topics,
//! 3. [`subscribe_topics`](DeviceNode::subscribe_topics) opens the command
//!    inbox,
//! 4. [`process_inputs`](DeviceNode::process_inputs) and
//!    [`process_outputs`](DeviceNode::process_outputs) are pumped from the
//!    host loop.
//!
//! Telemetry does not wait for the host loop: the driver's signal handlers
//! publish directly from the driver thread.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use basebridge_hal::SimDriver;
//! use basebridge_middleware::{EventBus, Topic};
//! use basebridge_node::{BaseNode, DeviceNode, NodeConfig};
//!
//! let config = NodeConfig::default();
//! let sim = Arc::new(SimDriver::new(config.wheel_separation));
//! let bus = EventBus::new(config.bus_capacity);
//! let mut odom = bus.subscribe_to(Topic::Odometry);
//!
//! let mut node = BaseNode::new(sim.clone(), bus, config).unwrap();
//! node.init().unwrap();
//! node.subscribe_topics().unwrap();
//! node.enable();
//!
//! sim.step(0.1);
//! node.process_inputs();
//! node.process_outputs();
//! assert!(odom.try_recv().is_some());
//! ```

use std::sync::Arc;

use basebridge_hal::{BaseDriver, DiagnosticHandler, SignalHandler};
use basebridge_middleware::{EventBus, Topic};
use basebridge_types::{BridgeError, RunState};
use tracing::{Level, debug, error, info, warn};

use crate::config::NodeConfig;
use crate::dispatcher::CommandDispatcher;
use crate::lifecycle::LifecycleGate;
use crate::router::TelemetryRouter;

/// Host-facing lifecycle of a device bridge.
pub trait DeviceNode {
    /// Bind to the device.  Calling it again is a no-op.
    fn init(&mut self) -> Result<(), BridgeError>;

    /// Outbound topics this node publishes on.
    fn advertise_topics(&self) -> Vec<Topic>;

    /// Start listening for inbound commands.
    fn subscribe_topics(&mut self) -> Result<(), BridgeError>;

    /// Handle every pending inbound message.
    fn process_inputs(&mut self);

    /// Publish periodic output.
    fn process_outputs(&mut self);
}

/// Driver + bus + router, wired together.
pub struct BaseNode {
    config: NodeConfig,
    driver: Arc<dyn BaseDriver>,
    bus: EventBus,
    router: Arc<TelemetryRouter>,
    dispatcher: CommandDispatcher,
    lifecycle: LifecycleGate,
    initialised: bool,
}

impl BaseNode {
    /// Build a node around `driver`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when `config` fails validation.
    pub fn new(
        driver: Arc<dyn BaseDriver>,
        bus: EventBus,
        config: NodeConfig,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        let router = Arc::new(TelemetryRouter::new(driver.clone(), bus.clone(), &config));
        Ok(Self {
            dispatcher: CommandDispatcher::new(driver.clone(), &config),
            lifecycle: LifecycleGate::new(driver.clone()),
            config,
            driver,
            bus,
            router,
            initialised: false,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn router(&self) -> &TelemetryRouter {
        &self.router
    }

    pub fn enable(&self) {
        self.lifecycle.enable();
    }

    pub fn disable(&self) {
        self.lifecycle.disable();
    }

    pub fn run_state(&self) -> RunState {
        self.lifecycle.state()
    }
}

impl DeviceNode for BaseNode {
    fn init(&mut self) -> Result<(), BridgeError> {
        if self.initialised {
            debug!("node already initialised");
            return Ok(());
        }
        for tag in self.router.registry().tags() {
            // Weak: the driver must not keep the router alive.
            let router = Arc::downgrade(&self.router);
            let handler: SignalHandler = Arc::new(move || {
                if let Some(router) = router.upgrade() {
                    router.on_signal(tag);
                }
            });
            self.driver.subscribe(tag, handler);
        }
        let diagnostics: DiagnosticHandler = Arc::new(log_driver_line);
        self.driver.subscribe_diagnostics(diagnostics);
        self.initialised = true;
        info!(
            connected = self.driver.is_connected(),
            channels = self.router.registry().len(),
            "base node initialised"
        );
        Ok(())
    }

    fn advertise_topics(&self) -> Vec<Topic> {
        Topic::ALL
            .into_iter()
            .filter(|topic| !topic.is_command())
            .filter(|&topic| topic != Topic::Transform || self.config.publish_tf)
            .collect()
    }

    fn subscribe_topics(&mut self) -> Result<(), BridgeError> {
        self.dispatcher.subscribe(&self.bus);
        Ok(())
    }

    fn process_inputs(&mut self) {
        let delivered = self.dispatcher.drain();
        if delivered > 0 {
            debug!(delivered, "commands dispatched");
        }
    }

    fn process_outputs(&mut self) {
        self.router.publish_odometry();
    }
}

/// Re-emit a driver diagnostic at its own level under the `basebridge::driver`
/// target.
fn log_driver_line(level: Level, message: &str) {
    match level {
        Level::ERROR => error!(target: "basebridge::driver", "{message}"),
        Level::WARN => warn!(target: "basebridge::driver", "{message}"),
        Level::INFO => info!(target: "basebridge::driver", "{message}"),
        _ => debug!(target: "basebridge::driver", "{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basebridge_hal::{DriverCall, SimDriver};
    use basebridge_types::{
        EventPayload, InertiaData, SensorCoreData, TelemetryEvent, VelocityCommand, WheelCommand,
        WheelSide,
    };
    use chrono::Utc;
    use std::sync::Mutex;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::Layer;
    use tracing_subscriber::layer::{Context, SubscriberExt};

    type Lines = Arc<Mutex<Vec<(Level, String, String)>>>;

    /// Records `(level, target, message)` for every event.
    struct Capture(Lines);

    struct MessageField(String);

    impl Visit for MessageField {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for Capture {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut message = MessageField(String::new());
            event.record(&mut message);
            let meta = event.metadata();
            self.0
                .lock()
                .unwrap()
                .push((*meta.level(), meta.target().to_string(), message.0));
        }
    }

    fn node_with(config: NodeConfig) -> (Arc<SimDriver>, BaseNode) {
        let sim = Arc::new(SimDriver::new(config.wheel_separation));
        let node = BaseNode::new(sim.clone(), EventBus::new(64), config).expect("valid config");
        (sim, node)
    }

    fn ready_node() -> (Arc<SimDriver>, BaseNode) {
        let (sim, mut node) = node_with(NodeConfig::default());
        node.init().expect("init");
        node.subscribe_topics().expect("subscribe");
        (sim, node)
    }

    #[test]
    fn invalid_config_is_rejected() {
        let sim = Arc::new(SimDriver::new(0.23));
        let config = NodeConfig {
            wheel_separation: 0.0,
            ..NodeConfig::default()
        };
        assert!(matches!(
            BaseNode::new(sim, EventBus::default(), config),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn disable_before_enable_leaves_base_disabled() {
        let (_sim, node) = ready_node();
        node.disable();
        assert_eq!(node.run_state(), RunState::Disabled);
    }

    #[test]
    fn driver_signals_publish_without_host_loop() {
        let (sim, node) = ready_node();
        let mut joints = node.bus().subscribe_to(Topic::JointStates);
        let mut core = node.bus().subscribe_to(Topic::SensorCore);
        let mut time = node.bus().subscribe_to(Topic::Time);

        node.enable();
        sim.step(0.1);

        assert!(joints.try_recv().is_some());
        assert!(core.try_recv().is_some());
        assert!(time.try_recv().is_some());
    }

    #[test]
    fn init_twice_binds_handlers_once() {
        let (sim, mut node) = ready_node();
        node.init().expect("second init");
        let mut rx = node.bus().subscribe_to(Topic::SensorCore);
        sim.push(TelemetryEvent::SensorCore(SensorCoreData::default()));
        assert!(rx.try_recv().is_some());
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn velocity_command_moves_the_simulated_base() {
        let (sim, mut node) = ready_node();
        node.enable();
        node.bus()
            .publish(
                Topic::VelocityCommand,
                Utc::now(),
                EventPayload::VelocityCommand(VelocityCommand {
                    linear: 0.5,
                    angular: 0.0,
                }),
            )
            .expect("publish");
        node.process_inputs();

        for _ in 0..10 {
            sim.step(0.1);
        }
        let pose = node.router().pose();
        assert!((pose.x - 0.5).abs() < 1e-9, "x = {}", pose.x);
        assert!(pose.y.abs() < 1e-9);
        assert!((node.router().rates().vx - 0.5).abs() < 1e-9);
    }

    #[test]
    fn misaddressed_wheel_command_is_dropped() {
        let (sim, mut node) = ready_node();
        node.bus()
            .publish(
                Topic::WheelLeftCommand,
                Utc::now(),
                EventPayload::WheelCommand(WheelCommand {
                    target: "wheel_right".to_string(),
                    value: 2.0,
                }),
            )
            .expect("publish");
        node.bus()
            .publish(
                Topic::WheelRightCommand,
                Utc::now(),
                EventPayload::WheelCommand(WheelCommand {
                    target: "wheel_right".to_string(),
                    value: 2.0,
                }),
            )
            .expect("publish");
        node.process_inputs();
        assert_eq!(
            sim.calls(),
            vec![DriverCall::Wheel {
                side: WheelSide::Right,
                value: 2.0,
            }]
        );
    }

    #[test]
    fn process_outputs_pairs_odometry_and_transform() {
        let (sim, mut node) = ready_node();
        node.enable();
        node.bus()
            .publish(
                Topic::VelocityCommand,
                Utc::now(),
                EventPayload::VelocityCommand(VelocityCommand {
                    linear: 0.2,
                    angular: 0.5,
                }),
            )
            .expect("publish");
        node.process_inputs();
        sim.step(0.2);

        let mut odom_rx = node.bus().subscribe_to(Topic::Odometry);
        let mut tf_rx = node.bus().subscribe_to(Topic::Transform);
        node.process_outputs();

        let odom = odom_rx.try_recv().expect("odometry");
        let tf = tf_rx.try_recv().expect("transform");
        assert_eq!(odom.timestamp, tf.timestamp);
        let (EventPayload::Odometry(odom), EventPayload::Transform(tf)) = (odom.payload, tf.payload)
        else {
            panic!("unexpected payloads");
        };
        assert_eq!(odom.pose.position, tf.translation);
        assert_eq!(odom.pose.orientation, tf.rotation);
        assert!(tf.rotation.yaw() > 0.0);
    }

    #[test]
    fn advertised_topics_follow_publish_tf() {
        let (_sim, node) = ready_node();
        let topics = node.advertise_topics();
        assert!(topics.contains(&Topic::Odometry));
        assert!(topics.contains(&Topic::Transform));
        assert!(topics.contains(&Topic::BumperEvents));
        assert!(!topics.iter().any(|t| t.is_command()));

        let (_sim, node) = node_with(NodeConfig {
            publish_tf: false,
            ..NodeConfig::default()
        });
        assert!(!node.advertise_topics().contains(&Topic::Transform));
    }

    #[test]
    fn dropped_node_leaves_driver_usable() {
        let (sim, node) = ready_node();
        drop(node);
        sim.push(TelemetryEvent::SensorCore(SensorCoreData::default()));
        assert!(sim.is_connected());
    }

    #[test]
    fn driver_diagnostics_reach_the_log_at_their_level() {
        let lines: Lines = Arc::default();
        let subscriber = tracing_subscriber::registry().with(Capture(Arc::clone(&lines)));

        tracing::subscriber::with_default(subscriber, || {
            let (sim, _node) = ready_node();
            sim.diagnostic(Level::ERROR, "checksum mismatch");
            sim.diagnostic(Level::TRACE, "raw frame");
            sim.set_connected(false);
            assert!(sim.run().is_err());
        });

        let driver: Vec<_> = lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, target, _)| target == "basebridge::driver")
            .map(|(level, _, message)| (*level, message.clone()))
            .collect();
        assert_eq!(
            driver,
            vec![
                (Level::ERROR, "checksum mismatch".to_string()),
                (Level::DEBUG, "raw frame".to_string()),
                (Level::WARN, "run rejected: serial link is down".to_string()),
            ]
        );
    }

    #[test]
    fn inertia_firing_publishes_raw_and_derived_lanes() {
        let (sim, node) = ready_node();
        let mut imu = node.bus().subscribe_to(Topic::Imu);
        let mut raw = node.bus().subscribe_to(Topic::Inertia);
        let data = InertiaData {
            angle_rad: 0.5,
            angle_rate_rad_s: -0.1,
            acc: [1, 2, 3],
        };

        sim.push(TelemetryEvent::Inertia(data));

        let imu = imu.try_recv().expect("imu");
        let raw = raw.try_recv().expect("raw inertia");
        assert_eq!(imu.timestamp, raw.timestamp);
        assert_eq!(raw.source, "sensors/inertia");
        assert_eq!(raw.payload, EventPayload::Inertia(data));
        let EventPayload::Imu(imu) = imu.payload else {
            panic!("expected imu");
        };
        assert!((imu.orientation.yaw() - 0.5).abs() < 1e-12);
        assert!(node.advertise_topics().contains(&Topic::Inertia));
    }
}
