//! Node configuration – reads `~/.basebridge/config.toml`.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration.  Values are resolved in three steps: TOML file,
//! `BASEBRIDGE_*` environment overrides, then [`NodeConfig::validate`].

use std::fs;
use std::path::{Path, PathBuf};

use basebridge_types::BridgeError;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Frame names, wheel geometry and bus sizing for one base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Parent frame of the published odometry and transform.
    #[serde(default = "default_odom_frame")]
    pub odom_frame: String,

    /// Child frame (the robot body).
    #[serde(default = "default_base_frame")]
    pub base_frame: String,

    /// Publish `odom → base` on the transform topic in addition to odometry.
    #[serde(default = "default_publish_tf")]
    pub publish_tf: bool,

    /// Distance between the wheel contact points (metres).
    #[serde(default = "default_wheel_separation")]
    pub wheel_separation: f64,

    /// Joint name of the left wheel; left-wheel commands must target it.
    #[serde(default = "default_wheel_left")]
    pub wheel_left: String,

    #[serde(default = "default_wheel_right")]
    pub wheel_right: String,

    /// Per-topic broadcast buffer size.
    #[serde(default = "default_bus_capacity")]
    pub bus_capacity: usize,
}

fn default_odom_frame() -> String {
    "odom".to_string()
}
fn default_base_frame() -> String {
    "base_footprint".to_string()
}
fn default_publish_tf() -> bool {
    true
}
fn default_wheel_separation() -> f64 {
    0.23
}
fn default_wheel_left() -> String {
    "wheel_left".to_string()
}
fn default_wheel_right() -> String {
    "wheel_right".to_string()
}
fn default_bus_capacity() -> usize {
    256
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            odom_frame: default_odom_frame(),
            base_frame: default_base_frame(),
            publish_tf: default_publish_tf(),
            wheel_separation: default_wheel_separation(),
            wheel_left: default_wheel_left(),
            wheel_right: default_wheel_right(),
            bus_capacity: default_bus_capacity(),
        }
    }
}

impl NodeConfig {
    /// Parse a TOML document.  Missing keys take their defaults.  No
    /// environment overrides or validation are applied.
    pub fn from_toml_str(raw: &str) -> Result<Self, BridgeError> {
        toml::from_str(raw).map_err(|e| BridgeError::Config(format!("Failed to parse config: {e}")))
    }

    /// Check the invariants the node relies on.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when the wheel separation is not a
    /// positive finite number, when any frame or joint name is empty, or when
    /// the two frames or the two joints share a name.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if !(self.wheel_separation.is_finite() && self.wheel_separation > 0.0) {
            return Err(BridgeError::Config(format!(
                "wheel_separation must be positive and finite, got {}",
                self.wheel_separation
            )));
        }
        for (field, value) in [
            ("odom_frame", &self.odom_frame),
            ("base_frame", &self.base_frame),
            ("wheel_left", &self.wheel_left),
            ("wheel_right", &self.wheel_right),
        ] {
            if value.trim().is_empty() {
                return Err(BridgeError::Config(format!("{field} must not be empty")));
            }
        }
        if self.odom_frame == self.base_frame {
            return Err(BridgeError::Config(format!(
                "odom_frame and base_frame are both '{}'",
                self.odom_frame
            )));
        }
        if self.wheel_left == self.wheel_right {
            return Err(BridgeError::Config(format!(
                "wheel_left and wheel_right are both '{}'",
                self.wheel_left
            )));
        }
        Ok(())
    }
}

/// Return the path to `~/.basebridge/config.toml`, or `$BASEBRIDGE_CONFIG`
/// when set.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("BASEBRIDGE_CONFIG") {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".basebridge").join("config.toml")
}

/// Load, override and validate the config at `path`.  Returns `None` if the
/// file does not exist.
pub fn load_from(path: &Path) -> Result<Option<NodeConfig>, BridgeError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        BridgeError::Config(format!("Failed to read config at {}: {e}", path.display()))
    })?;
    let mut cfg = NodeConfig::from_toml_str(&raw)?;
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(Some(cfg))
}

/// Apply `BASEBRIDGE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `BASEBRIDGE_ODOM_FRAME` | `odom_frame` |
/// | `BASEBRIDGE_BASE_FRAME` | `base_frame` |
/// | `BASEBRIDGE_PUBLISH_TF` | `publish_tf` (`true`/`false`/`1`/`0`) |
/// | `BASEBRIDGE_WHEEL_SEPARATION` | `wheel_separation` |
///
/// Unparsable values are ignored with a warning.
pub fn apply_env_overrides(cfg: &mut NodeConfig) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides(cfg: &mut NodeConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("BASEBRIDGE_ODOM_FRAME") {
        cfg.odom_frame = v;
    }
    if let Some(v) = lookup("BASEBRIDGE_BASE_FRAME") {
        cfg.base_frame = v;
    }
    if let Some(v) = lookup("BASEBRIDGE_PUBLISH_TF") {
        match v.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => cfg.publish_tf = true,
            "false" | "0" => cfg.publish_tf = false,
            other => warn!(value = other, "ignoring unparsable BASEBRIDGE_PUBLISH_TF"),
        }
    }
    if let Some(v) = lookup("BASEBRIDGE_WHEEL_SEPARATION") {
        match v.trim().parse::<f64>() {
            Ok(separation) => cfg.wheel_separation = separation,
            Err(e) => warn!(value = %v, error = %e, "ignoring unparsable BASEBRIDGE_WHEEL_SEPARATION"),
        }
    }
}
