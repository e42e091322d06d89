//! Command-line flags.

use std::path::PathBuf;

use clap::Parser;

/// Run the base bridge against the simulated base.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "basebridge", version)]
pub struct CliArgs {
    /// Config file (default: ~/.basebridge/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Host loop frequency in Hz
    #[arg(long = "rate", value_name = "HZ", default_value = "20", value_parser = positive)]
    pub rate_hz: f64,

    /// Linear velocity sent once the base is enabled (m/s)
    #[arg(long, value_name = "M_PER_S", default_value = "0")]
    #[arg(allow_negative_numbers = true, value_parser = finite)]
    pub linear: f64,

    /// Angular velocity sent once the base is enabled (rad/s)
    #[arg(long, value_name = "RAD_PER_S", default_value = "0")]
    #[arg(allow_negative_numbers = true, value_parser = finite)]
    pub angular: f64,
}

fn finite(raw: &str) -> Result<f64, String> {
    let value: f64 = raw.parse().map_err(|e| format!("'{raw}' is not a number ({e})"))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("'{raw}' is not finite"))
    }
}

fn positive(raw: &str) -> Result<f64, String> {
    let value = finite(raw)?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(format!("must be positive, got {value}"))
    }
}
