//! [`TelemetryRouter`] – turns driver signals into bus messages.
//!
//! The router owns everything a telemetry firing touches: the driver handle
//! (to read snapshots back), the bus, the channel table, and the shared
//! state behind one mutex:
//!
//! - the [`OdometryIntegrator`] (pose and rates),
//! - the per-side wheel joint merge,
//! - the last bumper / cliff bitfields, for edge detection.
//!
//! The router is the [`ChannelSink`] the channel handlers run against.  Wheel
//! firings integrate and publish odometry without releasing that lock, so
//! `process_outputs` never observes a half-applied step.

use std::sync::{Arc, Mutex, MutexGuard};

use basebridge_hal::BaseDriver;
use basebridge_middleware::{EventBus, Topic};
use basebridge_perception::{OdometryIntegrator, Pose2D, PoseUpdateRate};
use basebridge_types::{EventPayload, JointState, TelemetryEvent, TelemetryTag, WheelJoint, WheelState};
use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use crate::channels::{ChannelRegistry, ChannelSink};
use crate::config::NodeConfig;
use crate::publisher::OdometryPublisher;

// ─────────────────────────────────────────────────────────────────────────────
// Wheel joint merge
// ─────────────────────────────────────────────────────────────────────────────

/// Last known state of one wheel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JointSlot {
    pub joint: WheelJoint,
    /// `None` until the side first reports.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Coalesces left/right wheel reports into one joint-state message.
///
/// Each side is last-write-wins; a side that has never reported stays zero.
#[derive(Debug, Clone, Default)]
pub struct JointMerger {
    left: JointSlot,
    right: JointSlot,
}

impl JointMerger {
    pub fn update(&mut self, wheels: &WheelState, stamp: DateTime<Utc>) {
        if let Some(joint) = wheels.left {
            self.left = JointSlot {
                joint,
                updated_at: Some(stamp),
            };
        }
        if let Some(joint) = wheels.right {
            self.right = JointSlot {
                joint,
                updated_at: Some(stamp),
            };
        }
    }

    pub fn left(&self) -> JointSlot {
        self.left
    }

    pub fn right(&self) -> JointSlot {
        self.right
    }

    /// Joint-state message naming the wheels `[left, right]`.
    pub fn message(&self, names: &[String; 2]) -> JointState {
        JointState {
            name: names.to_vec(),
            position: vec![self.left.joint.position_rad, self.right.joint.position_rad],
            velocity: vec![self.left.joint.velocity_rad_s, self.right.joint.velocity_rad_s],
            effort: Vec::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

/// Bumper / cliff bitfields seen on the previous core-sensor firing.
#[derive(Debug, Clone, Copy, Default)]
struct ContactBaseline {
    bumper: u8,
    cliff: u8,
}

struct RouterState {
    odometry: OdometryIntegrator,
    joints: JointMerger,
    contacts: ContactBaseline,
}

/// Routes driver telemetry onto the bus and owns the odometry state.
pub struct TelemetryRouter {
    driver: Arc<dyn BaseDriver>,
    bus: EventBus,
    registry: ChannelRegistry,
    publisher: OdometryPublisher,
    wheel_joints: [String; 2],
    base_frame: String,
    state: Mutex<RouterState>,
}

impl TelemetryRouter {
    /// Build a router with the standard channel table.  `config` is assumed
    /// to be validated.
    pub fn new(driver: Arc<dyn BaseDriver>, bus: EventBus, config: &NodeConfig) -> Self {
        Self::with_registry(driver, bus, config, ChannelRegistry::standard())
    }

    pub fn with_registry(
        driver: Arc<dyn BaseDriver>,
        bus: EventBus,
        config: &NodeConfig,
        registry: ChannelRegistry,
    ) -> Self {
        Self {
            driver,
            bus,
            registry,
            publisher: OdometryPublisher::new(config),
            wheel_joints: [config.wheel_left.clone(), config.wheel_right.clone()],
            base_frame: config.base_frame.clone(),
            state: Mutex::new(RouterState {
                odometry: OdometryIntegrator::new(config.wheel_separation),
                joints: JointMerger::default(),
                contacts: ContactBaseline::default(),
            }),
        }
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.registry
    }

    /// Handle one firing of `tag`: read the driver's snapshot and run the
    /// tag's handler.  Unregistered tags are ignored.
    pub fn on_signal(&self, tag: TelemetryTag) {
        let Some(handler) = self.registry.handler(tag) else {
            debug!(?tag, "no channel registered; signal ignored");
            return;
        };
        let snapshot = self.driver.snapshot(tag);
        handler(self, snapshot, Utc::now());
    }

    /// Re-publish odometry (and the transform) for the current pose with a
    /// fresh timestamp.
    pub fn publish_odometry(&self) {
        let state = self.lock();
        self.publisher.publish(
            &self.bus,
            Utc::now(),
            &state.odometry.pose(),
            &state.odometry.rates(),
        );
    }

    pub fn pose(&self) -> Pose2D {
        self.lock().odometry.pose()
    }

    pub fn rates(&self) -> PoseUpdateRate {
        self.lock().odometry.rates()
    }

    /// Current per-side joint merge state, left then right.
    pub fn joints(&self) -> (JointSlot, JointSlot) {
        let state = self.lock();
        (state.joints.left(), state.joints.right())
    }

    /// Move the pose back to the origin.  Joint state and contact baselines
    /// are untouched.
    pub fn reset_pose(&self) {
        self.lock().odometry.reset();
        debug!("odometry pose reset");
    }

    fn lock(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ChannelSink for TelemetryRouter {
    fn emit(&self, topic: Topic, stamp: DateTime<Utc>, payload: EventPayload) {
        match self.bus.publish(topic, stamp, payload) {
            Ok(receivers) => trace!(topic = topic.name(), receivers, "published"),
            Err(e) => warn!(topic = topic.name(), error = %e, "publish failed"),
        }
    }

    fn base_frame(&self) -> &str {
        &self.base_frame
    }

    fn snapshot(&self, tag: TelemetryTag) -> Option<TelemetryEvent> {
        self.driver.snapshot(tag)
    }

    fn apply_wheels(&self, wheels: &WheelState, integrate: bool, stamp: DateTime<Utc>) {
        let mut state = self.lock();
        state.joints.update(wheels, stamp);
        let joints = state.joints.message(&self.wheel_joints);
        self.emit(Topic::JointStates, stamp, EventPayload::JointState(joints));

        if integrate && state.odometry.integrate(&wheels.delta) {
            let pose = state.odometry.pose();
            let rates = state.odometry.rates();
            self.publisher.publish(&self.bus, stamp, &pose, &rates);
        }
    }

    fn swap_contacts(&self, bumper: u8, cliff: u8) -> (u8, u8) {
        let mut state = self.lock();
        let previous = state.contacts;
        state.contacts = ContactBaseline { bumper, cliff };
        (previous.bumper, previous.cliff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basebridge_hal::SimDriver;
    use basebridge_middleware::TopicReceiver;
    use basebridge_types::{
        BumperEvent, BumperState, CliffData, CliffEvent, CliffState, IrData, SENSOR_CENTER,
        SENSOR_LEFT, SENSOR_RIGHT, SensorCoreData, SensorPosition, VersionInfo, WheelDelta,
    };
    use std::f64::consts::PI;

    const EPS: f64 = 1e-9;

    fn router_with(config: &NodeConfig) -> (Arc<SimDriver>, EventBus, TelemetryRouter) {
        let sim = Arc::new(SimDriver::new(config.wheel_separation));
        let bus = EventBus::new(64);
        let router = TelemetryRouter::new(sim.clone(), bus.clone(), config);
        (sim, bus, router)
    }

    fn drain(rx: &mut TopicReceiver) -> Vec<EventPayload> {
        std::iter::from_fn(|| rx.try_recv().map(|event| event.payload)).collect()
    }

    fn wheels(sequence: u64, left_m: f64, right_m: f64, elapsed_s: f64) -> TelemetryEvent {
        TelemetryEvent::WheelState(WheelState {
            left: Some(WheelJoint {
                position_rad: left_m,
                velocity_rad_s: 0.0,
            }),
            right: Some(WheelJoint {
                position_rad: right_m,
                velocity_rad_s: 0.0,
            }),
            delta: WheelDelta {
                sequence,
                left_m,
                right_m,
                elapsed_s,
            },
        })
    }

    #[test]
    fn every_tag_publishes_once_per_firing_even_without_data() {
        let (_sim, bus, router) = router_with(&NodeConfig::default());
        let mut receivers: Vec<_> = TelemetryTag::ALL
            .iter()
            .map(|&tag| (tag, bus.subscribe_to(Topic::for_tag(tag))))
            .collect();

        for _ in 0..3 {
            for tag in TelemetryTag::ALL {
                router.on_signal(tag);
            }
        }

        for (tag, rx) in &mut receivers {
            assert_eq!(drain(rx).len(), 3, "{tag:?} did not publish once per firing");
        }
    }

    #[test]
    fn forwarded_payload_is_read_at_fire_time() {
        let (sim, bus, router) = router_with(&NodeConfig::default());
        let mut rx = bus.subscribe_to(Topic::Ir);

        sim.set_snapshot(TelemetryEvent::Ir(IrData { obstacle: [1, 2, 3] }));
        router.on_signal(TelemetryTag::Ir);
        sim.set_snapshot(TelemetryEvent::Ir(IrData { obstacle: [4, 5, 6] }));
        router.on_signal(TelemetryTag::Ir);

        assert_eq!(
            drain(&mut rx),
            vec![
                EventPayload::Ir(IrData { obstacle: [1, 2, 3] }),
                EventPayload::Ir(IrData { obstacle: [4, 5, 6] }),
            ]
        );
    }

    #[test]
    fn missing_snapshot_publishes_defaults() {
        let (sim, bus, router) = router_with(&NodeConfig::default());
        let mut rx = bus.subscribe_to(Topic::HardwareVersion);

        sim.set_snapshot(TelemetryEvent::FirmwareInfo(VersionInfo {
            major: 1,
            minor: 2,
            patch: 3,
        }));
        router.on_signal(TelemetryTag::HardwareInfo);
        assert_eq!(
            drain(&mut rx),
            vec![EventPayload::HardwareVersion(VersionInfo::default())]
        );
    }

    #[test]
    fn messages_get_fresh_ids() {
        let (_sim, bus, router) = router_with(&NodeConfig::default());
        let mut rx = bus.subscribe_to(Topic::Time);
        router.on_signal(TelemetryTag::TimeInfo);
        router.on_signal(TelemetryTag::TimeInfo);
        let first = rx.try_recv().expect("first");
        let second = rx.try_recv().expect("second");
        assert_ne!(first.id, second.id);
        assert!(second.timestamp >= first.timestamp);
    }

    #[test]
    fn straight_wheel_firing_publishes_joints_and_odometry() {
        let (sim, bus, router) = router_with(&NodeConfig::default());
        let mut joints_rx = bus.subscribe_to(Topic::JointStates);
        let mut odom_rx = bus.subscribe_to(Topic::Odometry);
        let mut tf_rx = bus.subscribe_to(Topic::Transform);

        sim.set_snapshot(wheels(1, 0.05, 0.05, 0.1));
        router.on_signal(TelemetryTag::WheelState);

        let pose = router.pose();
        assert!((pose.x - 0.05).abs() < EPS);
        assert!(pose.heading.abs() < EPS);
        assert!((router.rates().vx - 0.5).abs() < EPS);

        let joints = joints_rx.try_recv().expect("joint state");
        let odom = odom_rx.try_recv().expect("odometry");
        let tf = tf_rx.try_recv().expect("transform");
        assert_eq!(joints.timestamp, odom.timestamp);
        assert_eq!(odom.timestamp, tf.timestamp);

        let EventPayload::JointState(joints) = joints.payload else {
            panic!("expected joint state");
        };
        assert_eq!(joints.name, vec!["wheel_left".to_string(), "wheel_right".to_string()]);
        assert_eq!(joints.position, vec![0.05, 0.05]);

        let EventPayload::Odometry(odom) = odom.payload else {
            panic!("expected odometry");
        };
        assert!((odom.pose.position.x - 0.05).abs() < EPS);
        assert!((odom.twist.linear.x - 0.5).abs() < EPS);
        assert!(odom.twist.angular.z.abs() < EPS);
    }

    #[test]
    fn spin_in_place_turns_clockwise() {
        let (sim, _bus, router) = router_with(&NodeConfig::default());
        sim.set_snapshot(wheels(1, 0.02, -0.02, 0.1));
        router.on_signal(TelemetryTag::WheelState);

        let pose = router.pose();
        assert!(pose.x.abs() < EPS && pose.y.abs() < EPS);
        assert!((pose.heading + 0.174).abs() < 1e-3);
    }

    #[test]
    fn repeated_wheel_sequence_does_not_move_the_pose() {
        let (sim, bus, router) = router_with(&NodeConfig::default());
        let mut joints_rx = bus.subscribe_to(Topic::JointStates);
        let mut odom_rx = bus.subscribe_to(Topic::Odometry);

        sim.set_snapshot(wheels(4, 0.1, 0.1, 0.1));
        router.on_signal(TelemetryTag::WheelState);
        router.on_signal(TelemetryTag::WheelState);

        assert!((router.pose().x - 0.1).abs() < EPS);
        assert_eq!(drain(&mut joints_rx).len(), 2);
        assert_eq!(drain(&mut odom_rx).len(), 1);
    }

    #[test]
    fn one_sided_report_keeps_other_side() {
        let (sim, bus, router) = router_with(&NodeConfig::default());
        let mut rx = bus.subscribe_to(Topic::JointStates);

        sim.set_snapshot(TelemetryEvent::WheelState(WheelState {
            left: Some(WheelJoint {
                position_rad: 2.0,
                velocity_rad_s: 1.0,
            }),
            right: None,
            delta: WheelDelta {
                sequence: 1,
                ..WheelDelta::default()
            },
        }));
        router.on_signal(TelemetryTag::WheelState);

        let (left, right) = router.joints();
        assert!(left.updated_at.is_some());
        assert_eq!(right, JointSlot::default());

        sim.set_snapshot(TelemetryEvent::WheelState(WheelState {
            left: None,
            right: Some(WheelJoint {
                position_rad: 3.0,
                velocity_rad_s: -1.0,
            }),
            delta: WheelDelta {
                sequence: 2,
                ..WheelDelta::default()
            },
        }));
        router.on_signal(TelemetryTag::WheelState);

        let payloads = drain(&mut rx);
        let EventPayload::JointState(last) = &payloads[1] else {
            panic!("expected joint state");
        };
        assert_eq!(last.position, vec![2.0, 3.0]);
        assert_eq!(last.velocity, vec![1.0, -1.0]);
    }

    #[test]
    fn publish_odometry_restamps_current_pose() {
        let (sim, bus, router) = router_with(&NodeConfig::default());
        sim.set_snapshot(wheels(1, 0.2, 0.2, 0.1));
        router.on_signal(TelemetryTag::WheelState);

        let mut odom_rx = bus.subscribe_to(Topic::Odometry);
        let mut tf_rx = bus.subscribe_to(Topic::Transform);
        router.publish_odometry();
        router.publish_odometry();

        let odoms = drain(&mut odom_rx);
        assert_eq!(odoms.len(), 2);
        assert_eq!(odoms[0], odoms[1]);
        assert_eq!(drain(&mut tf_rx).len(), 2);
    }

    #[test]
    fn reset_pose_returns_to_origin() {
        let (sim, _bus, router) = router_with(&NodeConfig::default());
        sim.set_snapshot(wheels(1, 0.3, 0.1, 0.1));
        router.on_signal(TelemetryTag::WheelState);
        router.reset_pose();
        assert_eq!(router.pose(), Pose2D::default());
    }

    #[test]
    fn heading_stays_wrapped_over_many_turns() {
        let (sim, _bus, router) = router_with(&NodeConfig::default());
        let step = 0.3 * NodeConfig::default().wheel_separation / 2.0;
        for seq in 1..200 {
            sim.set_snapshot(wheels(seq, -step, step, 0.05));
            router.on_signal(TelemetryTag::WheelState);
            let heading = router.pose().heading;
            assert!(heading > -PI && heading <= PI);
        }
    }

    #[test]
    fn bumper_and_cliff_edges_are_published() {
        let (sim, bus, router) = router_with(&NodeConfig::default());
        let mut bumper_rx = bus.subscribe_to(Topic::BumperEvents);
        let mut cliff_rx = bus.subscribe_to(Topic::CliffEvents);
        sim.set_snapshot(TelemetryEvent::Cliff(CliffData {
            bottom: [100, 200, 300],
        }));

        let core = |bumper, cliff| {
            TelemetryEvent::SensorCore(SensorCoreData {
                bumper,
                cliff,
                ..SensorCoreData::default()
            })
        };

        sim.set_snapshot(core(SENSOR_LEFT | SENSOR_RIGHT, SENSOR_CENTER));
        router.on_signal(TelemetryTag::SensorCore);
        assert_eq!(
            drain(&mut bumper_rx),
            vec![
                EventPayload::BumperEvent(BumperEvent {
                    bumper: SensorPosition::Left,
                    state: BumperState::Pressed,
                }),
                EventPayload::BumperEvent(BumperEvent {
                    bumper: SensorPosition::Right,
                    state: BumperState::Pressed,
                }),
            ]
        );
        assert_eq!(
            drain(&mut cliff_rx),
            vec![EventPayload::CliffEvent(CliffEvent {
                sensor: SensorPosition::Center,
                state: CliffState::Cliff,
                bottom: 200,
            })]
        );

        // Unchanged bits produce nothing.
        router.on_signal(TelemetryTag::SensorCore);
        assert!(drain(&mut bumper_rx).is_empty());
        assert!(drain(&mut cliff_rx).is_empty());

        sim.set_snapshot(core(SENSOR_LEFT, 0));
        router.on_signal(TelemetryTag::SensorCore);
        assert_eq!(
            drain(&mut bumper_rx),
            vec![EventPayload::BumperEvent(BumperEvent {
                bumper: SensorPosition::Right,
                state: BumperState::Released,
            })]
        );
        assert_eq!(
            drain(&mut cliff_rx),
            vec![EventPayload::CliffEvent(CliffEvent {
                sensor: SensorPosition::Center,
                state: CliffState::Floor,
                bottom: 200,
            })]
        );
    }

    #[test]
    fn custom_registry_limits_routed_tags() {
        let config = NodeConfig::default();
        let sim = Arc::new(SimDriver::new(config.wheel_separation));
        let bus = EventBus::new(8);
        let mut registry = ChannelRegistry::new();
        registry.register(TelemetryTag::WheelState, crate::channels::wheel_state);
        let router = TelemetryRouter::with_registry(sim, bus.clone(), &config, registry);

        let mut ir_rx = bus.subscribe_to(Topic::Ir);
        router.on_signal(TelemetryTag::Ir);
        assert!(ir_rx.try_recv().is_none());
    }

    #[test]
    fn early_signal_does_not_swallow_first_delta() {
        let (sim, bus, router) = router_with(&NodeConfig::default());
        let mut joints_rx = bus.subscribe_to(Topic::JointStates);
        let mut odom_rx = bus.subscribe_to(Topic::Odometry);

        // Fired before the driver has read anything.
        router.on_signal(TelemetryTag::WheelState);
        assert_eq!(drain(&mut joints_rx).len(), 1);
        assert!(drain(&mut odom_rx).is_empty());

        sim.set_snapshot(wheels(0, 0.05, 0.05, 0.1));
        router.on_signal(TelemetryTag::WheelState);

        assert!((router.pose().x - 0.05).abs() < EPS, "x = {}", router.pose().x);
        assert_eq!(drain(&mut odom_rx).len(), 1);
    }

    #[test]
    fn concurrent_firing_and_republish_keep_pairs_consistent() {
        const STEPS: u64 = 200;
        let config = NodeConfig::default();
        let sim = Arc::new(SimDriver::new(config.wheel_separation));
        let bus = EventBus::new(4096);
        let router = TelemetryRouter::new(sim.clone(), bus.clone(), &config);
        let mut odom_rx = bus.subscribe_to(Topic::Odometry);
        let mut tf_rx = bus.subscribe_to(Topic::Transform);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for seq in 1..=STEPS {
                    sim.set_snapshot(wheels(seq, 0.01, 0.012, 0.01));
                    router.on_signal(TelemetryTag::WheelState);
                }
            });
            scope.spawn(|| {
                for _ in 0..STEPS {
                    router.publish_odometry();
                }
            });
        });

        let odoms: Vec<_> = std::iter::from_fn(|| odom_rx.try_recv()).collect();
        let tfs: Vec<_> = std::iter::from_fn(|| tf_rx.try_recv()).collect();
        assert_eq!(odoms.len(), 2 * STEPS as usize);
        assert_eq!(odoms.len(), tfs.len());

        for (odom, tf) in odoms.into_iter().zip(tfs) {
            assert_eq!(odom.timestamp, tf.timestamp);
            let (EventPayload::Odometry(odom), EventPayload::Transform(tf)) =
                (odom.payload, tf.payload)
            else {
                panic!("unexpected payloads");
            };
            assert_eq!(odom.pose.position, tf.translation);
            assert_eq!(odom.pose.orientation, tf.rotation);
        }
    }
}
