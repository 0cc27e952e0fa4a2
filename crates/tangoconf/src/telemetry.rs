//! Telemetry and simulation driver configuration.

use serde::{Deserialize, Serialize};

/// Log filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level or full `EnvFilter` directive (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

/// Event rates and injected faults for the simulated sensing service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Interval between camera frames; each frame yields an image event
    /// and a frame tick.
    /// Default: 33 (~30fps)
    #[serde(default = "SimulationConfig::default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Interval between point cloud events.
    /// Default: 200 (5Hz)
    #[serde(default = "SimulationConfig::default_point_cloud_interval_ms")]
    pub point_cloud_interval_ms: u64,

    /// Points per generated cloud.
    /// Default: 2048
    #[serde(default = "SimulationConfig::default_points_per_cloud")]
    pub points_per_cloud: usize,

    /// Time-indexed pose queries that fail per capture before succeeding.
    /// Default: 1
    #[serde(default = "SimulationConfig::default_pose_failures")]
    pub pose_failures: u32,

    /// Low-yield clouds emitted per capture before a clean one.
    /// Default: 2
    #[serde(default = "SimulationConfig::default_low_yield_clouds")]
    pub low_yield_clouds: u32,

    /// Whether the simulated device reports depth support.
    /// Default: true
    #[serde(default = "SimulationConfig::default_depth")]
    pub depth: bool,
}

impl SimulationConfig {
    fn default_frame_interval_ms() -> u64 {
        33
    }

    fn default_point_cloud_interval_ms() -> u64 {
        200
    }

    fn default_points_per_cloud() -> usize {
        2048
    }

    fn default_pose_failures() -> u32 {
        1
    }

    fn default_low_yield_clouds() -> u32 {
        2
    }

    fn default_depth() -> bool {
        true
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: Self::default_frame_interval_ms(),
            point_cloud_interval_ms: Self::default_point_cloud_interval_ms(),
            points_per_cloud: Self::default_points_per_cloud(),
            pose_failures: Self::default_pose_failures(),
            low_yield_clouds: Self::default_low_yield_clouds(),
            depth: Self::default_depth(),
        }
    }
}
