//! Capture policy - timing budget, retry budgets and point cloud thresholds.

use serde::{Deserialize, Serialize};

/// Policy for one capture cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Time allowed between start and terminal delivery.
    /// Default: 1000
    #[serde(default = "CaptureConfig::default_timeout_ms")]
    pub timeout_ms: u64,

    /// Image events that may be deferred waiting for a time-indexed pose
    /// before falling back to the latest known pose.
    /// Default: 5
    #[serde(default = "CaptureConfig::default_max_pose_retries")]
    pub max_pose_retries: u32,

    /// Point clouds that may be discarded for low yield before one is
    /// accepted regardless.
    /// Default: 10
    #[serde(default = "CaptureConfig::default_max_point_cloud_retries")]
    pub max_point_cloud_retries: u32,

    /// Minimum per-point confidence.
    /// Default: 0.3
    #[serde(default = "CaptureConfig::default_min_confidence")]
    pub min_confidence: f32,

    /// Maximum depth (metres) along the camera axis.
    /// Default: 4.0
    #[serde(default = "CaptureConfig::default_max_range")]
    pub max_range: f32,

    /// A cloud whose yield is at or below this is retried.
    /// Default: 0.5
    #[serde(default = "CaptureConfig::default_min_yield")]
    pub min_yield: f64,

    /// How long `wait_for_valid_pose` polls before giving up.
    /// Default: 5000
    #[serde(default = "CaptureConfig::default_pose_wait_timeout_ms")]
    pub pose_wait_timeout_ms: u64,

    /// Delay between polls in `wait_for_valid_pose`.
    /// Default: 100
    #[serde(default = "CaptureConfig::default_pose_poll_interval_ms")]
    pub pose_poll_interval_ms: u64,
}

impl CaptureConfig {
    fn default_timeout_ms() -> u64 {
        1000
    }

    fn default_max_pose_retries() -> u32 {
        5
    }

    fn default_max_point_cloud_retries() -> u32 {
        10
    }

    fn default_min_confidence() -> f32 {
        0.3
    }

    fn default_max_range() -> f32 {
        4.0
    }

    fn default_min_yield() -> f64 {
        0.5
    }

    fn default_pose_wait_timeout_ms() -> u64 {
        5000
    }

    fn default_pose_poll_interval_ms() -> u64 {
        100
    }

    /// Capture timeout in nanoseconds, the unit the coordinator's clock uses.
    pub fn timeout_ns(&self) -> u64 {
        self.timeout_ms.saturating_mul(1_000_000)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timeout_ms: Self::default_timeout_ms(),
            max_pose_retries: Self::default_max_pose_retries(),
            max_point_cloud_retries: Self::default_max_point_cloud_retries(),
            min_confidence: Self::default_min_confidence(),
            max_range: Self::default_max_range(),
            min_yield: Self::default_min_yield(),
            pose_wait_timeout_ms: Self::default_pose_wait_timeout_ms(),
            pose_poll_interval_ms: Self::default_pose_poll_interval_ms(),
        }
    }
}
