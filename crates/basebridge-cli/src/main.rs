//! `basebridge-cli` – runs the bridge against the simulated base.
//!
//! This binary is a minimal host for [`BaseNode`]:
//!
//! 1. Loads `~/.basebridge/config.toml` (or `--config PATH`), falling back to
//!    defaults when the file is absent.
//! 2. Initialises tracing via [`basebridge_node::init_tracing`].
//! 3. Wires a [`SimDriver`], the [`EventBus`] and the node, then enables the
//!    base and optionally sends one velocity command.
//! 4. Pumps `process_inputs` / `process_outputs` at `--rate` Hz, stepping the
//!    simulation in between.
//! 5. Intercepts **Ctrl-C** to disable the base and exit.

mod args;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::Parser;
use colored::Colorize;
use tracing::{error, info, warn};

use basebridge_hal::SimDriver;
use basebridge_middleware::{EventBus, Topic};
use basebridge_node::{BaseNode, DeviceNode, NodeConfig, config};
use basebridge_types::{EventPayload, VelocityCommand};

use args::CliArgs;

fn main() {
    let args = CliArgs::parse();
    let _guard = basebridge_node::init_tracing("basebridge");

    // ── Configuration ─────────────────────────────────────────────────────
    let path = args.config.clone().unwrap_or_else(config::config_path);
    let cfg = match config::load_from(&path) {
        Ok(Some(cfg)) => {
            info!(path = %path.display(), "config loaded");
            cfg
        }
        Ok(None) => {
            info!(path = %path.display(), "no config file; using defaults");
            let mut cfg = NodeConfig::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "config rejected");
            std::process::exit(1);
        }
    };

    // ── Shutdown flag ─────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the base will not be disabled on Ctrl-C");
    }

    // ── Wiring ────────────────────────────────────────────────────────────
    let sim = Arc::new(SimDriver::new(cfg.wheel_separation));
    let bus = EventBus::new(cfg.bus_capacity);
    let mut odometry = bus.subscribe_to(Topic::Odometry);

    let mut node = match BaseNode::new(sim.clone(), bus.clone(), cfg) {
        Ok(node) => node,
        Err(e) => {
            error!(error = %e, "failed to build node");
            std::process::exit(1);
        }
    };
    if let Err(e) = node.init().and_then(|()| node.subscribe_topics()) {
        error!(error = %e, "failed to start node");
        std::process::exit(1);
    }
    let topics: Vec<&str> = node.advertise_topics().into_iter().map(Topic::name).collect();
    info!(?topics, "publishing");

    print_banner(&node);
    node.enable();

    if args.linear != 0.0 || args.angular != 0.0 {
        let command = VelocityCommand {
            linear: args.linear,
            angular: args.angular,
        };
        if let Err(e) = bus.publish(
            Topic::VelocityCommand,
            chrono::Utc::now(),
            EventPayload::VelocityCommand(command),
        ) {
            warn!(error = %e, "failed to queue velocity command");
        }
    }

    // ── Host loop ─────────────────────────────────────────────────────────
    let period = Duration::from_secs_f64(1.0 / args.rate_hz);
    let mut last_report = Instant::now();
    while !shutdown.load(Ordering::SeqCst) {
        let started = Instant::now();

        node.process_inputs();
        sim.step(period.as_secs_f64());
        node.process_outputs();

        let mut latest = None;
        while let Some(event) = odometry.try_recv() {
            latest = Some(event);
        }
        if last_report.elapsed() >= Duration::from_secs(1)
            && let Some(event) = latest
            && let EventPayload::Odometry(odom) = event.payload
        {
            println!(
                "  {} x={:+.3} y={:+.3} yaw={:+.3}  v={:+.3} w={:+.3}",
                "odom".cyan(),
                odom.pose.position.x,
                odom.pose.position.y,
                odom.pose.orientation.yaw(),
                odom.twist.linear.x,
                odom.twist.angular.z,
            );
            last_report = Instant::now();
        }

        if let Some(rest) = period.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    println!();
    println!("{}", "⚠  Ctrl-C received – disabling base …".yellow().bold());
    node.disable();
    println!("{}", "  ✓ Base disabled.".green());
}

fn print_banner(node: &BaseNode) {
    let cfg = node.config();
    println!();
    println!("  {} {}", "basebridge".bold().cyan(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!(
        "  {} → {}  separation {} m  tf {}",
        cfg.odom_frame.bold(),
        cfg.base_frame.bold(),
        cfg.wheel_separation,
        if cfg.publish_tf { "on".green() } else { "off".yellow() },
    );
    println!("  Press {} to stop.\n", "Ctrl-C".bold());
}
