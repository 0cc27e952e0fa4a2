//! Configuration loading for tangocam.
//!
//! Configuration is split by concern:
//!
//! - **Capture** (`CaptureConfig`): the coordinator's timing and quality
//!   policy - timeout, retry budgets, point cloud thresholds.
//! - **Telemetry** (`TelemetryConfig`): log filtering.
//! - **Simulation** (`SimulationConfig`): event rates and fault injection for
//!   the `tangocam` driver binary.
//!
//! # Usage
//!
//! ```rust,no_run
//! use tangoconf::TangoConfig;
//!
//! let config = TangoConfig::load().expect("Failed to load config");
//! println!("timeout: {}ms", config.capture.timeout_ms);
//! println!("log level: {}", config.telemetry.log_level);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/tangocam/config.toml` (system)
//! 2. `~/.config/tangocam/config.toml` (user)
//! 3. `./tangocam.toml` (local override, replaced by a CLI path when given)
//! 4. Environment variables (`TANGOCAM_*`)
//!
//! # Example Config
//!
//! ```toml
//! [capture]
//! timeout_ms = 1000
//! max_pose_retries = 5
//! max_point_cloud_retries = 10
//! min_confidence = 0.3
//! max_range = 4.0
//! min_yield = 0.5
//!
//! [telemetry]
//! log_level = "info"
//!
//! [simulation]
//! frame_interval_ms = 33
//! point_cloud_interval_ms = 200
//! pose_failures = 2
//! ```

pub mod capture;
pub mod loader;
pub mod telemetry;

pub use capture::CaptureConfig;
pub use loader::{discover_config_files_with_override, ConfigSources};
pub use telemetry::{SimulationConfig, TelemetryConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete tangocam configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TangoConfig {
    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl TangoConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with `config_path` taking the place of the local
    /// `./tangocam.toml` override.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = TangoConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            let file_config = loader::load_from_file(&path)?;
            config = loader::merge_configs(config, file_config);
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# tangocam configuration\n\n");

        output.push_str("[capture]\n");
        output.push_str(&format!("timeout_ms = {}\n", self.capture.timeout_ms));
        output.push_str(&format!("max_pose_retries = {}\n", self.capture.max_pose_retries));
        output.push_str(&format!(
            "max_point_cloud_retries = {}\n",
            self.capture.max_point_cloud_retries
        ));
        output.push_str(&format!("min_confidence = {:?}\n", self.capture.min_confidence));
        output.push_str(&format!("max_range = {:?}\n", self.capture.max_range));
        output.push_str(&format!("min_yield = {:?}\n", self.capture.min_yield));
        output.push_str(&format!(
            "pose_wait_timeout_ms = {}\n",
            self.capture.pose_wait_timeout_ms
        ));
        output.push_str(&format!(
            "pose_poll_interval_ms = {}\n",
            self.capture.pose_poll_interval_ms
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = \"{}\"\n", self.telemetry.log_level));

        output.push_str("\n[simulation]\n");
        output.push_str(&format!(
            "frame_interval_ms = {}\n",
            self.simulation.frame_interval_ms
        ));
        output.push_str(&format!(
            "point_cloud_interval_ms = {}\n",
            self.simulation.point_cloud_interval_ms
        ));
        output.push_str(&format!(
            "points_per_cloud = {}\n",
            self.simulation.points_per_cloud
        ));
        output.push_str(&format!("pose_failures = {}\n", self.simulation.pose_failures));
        output.push_str(&format!(
            "low_yield_clouds = {}\n",
            self.simulation.low_yield_clouds
        ));
        output.push_str(&format!("depth = {}\n", self.simulation.depth));

        output
    }
}
