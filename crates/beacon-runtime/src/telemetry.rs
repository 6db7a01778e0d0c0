//! Tracing setup for hosts that don't install their own subscriber

use beacon_core::{BeaconError, BeaconResult};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Log output configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            filter: "beacon=info".to_string(),
            json: false,
            with_target: true,
        }
    }
}

impl TelemetryConfig {
    pub fn env_filter(&self) -> BeaconResult<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&self.filter)
                .map_err(|e| BeaconError::Tracing(e.to_string())),
        }
    }
}

/// Install a global fmt subscriber. Fails instead of panicking if one is
/// already installed.
pub fn init_tracing(config: &TelemetryConfig) -> BeaconResult<()> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| BeaconError::Tracing(e.to_string()))
}
