//! Config file discovery, loading, and environment variable overlay.

use crate::{CaptureConfig, ConfigError, SimulationConfig, TangoConfig, TelemetryConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli). Only returns
/// files that exist.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/tangocam/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("tangocam/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("tangocam.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Load config from a TOML file.
pub fn load_from_file(path: &Path) -> Result<TangoConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    parse_toml(&contents, path)
}

fn parse_toml(contents: &str, path: &Path) -> Result<TangoConfig, ConfigError> {
    toml::from_str(contents).map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Take `overlay` unless it still holds the compiled default.
fn pick<T: PartialEq>(base: T, overlay: T, default: T) -> T {
    if overlay != default {
        overlay
    } else {
        base
    }
}

/// Merge two configs field by field, with `overlay` taking precedence
/// wherever it differs from the compiled defaults.
pub fn merge_configs(base: TangoConfig, overlay: TangoConfig) -> TangoConfig {
    let cap = CaptureConfig::default();
    let tel = TelemetryConfig::default();
    let sim = SimulationConfig::default();

    TangoConfig {
        capture: CaptureConfig {
            timeout_ms: pick(base.capture.timeout_ms, overlay.capture.timeout_ms, cap.timeout_ms),
            max_pose_retries: pick(
                base.capture.max_pose_retries,
                overlay.capture.max_pose_retries,
                cap.max_pose_retries,
            ),
            max_point_cloud_retries: pick(
                base.capture.max_point_cloud_retries,
                overlay.capture.max_point_cloud_retries,
                cap.max_point_cloud_retries,
            ),
            min_confidence: pick(
                base.capture.min_confidence,
                overlay.capture.min_confidence,
                cap.min_confidence,
            ),
            max_range: pick(base.capture.max_range, overlay.capture.max_range, cap.max_range),
            min_yield: pick(base.capture.min_yield, overlay.capture.min_yield, cap.min_yield),
            pose_wait_timeout_ms: pick(
                base.capture.pose_wait_timeout_ms,
                overlay.capture.pose_wait_timeout_ms,
                cap.pose_wait_timeout_ms,
            ),
            pose_poll_interval_ms: pick(
                base.capture.pose_poll_interval_ms,
                overlay.capture.pose_poll_interval_ms,
                cap.pose_poll_interval_ms,
            ),
        },
        telemetry: TelemetryConfig {
            log_level: pick(base.telemetry.log_level, overlay.telemetry.log_level, tel.log_level),
        },
        simulation: SimulationConfig {
            frame_interval_ms: pick(
                base.simulation.frame_interval_ms,
                overlay.simulation.frame_interval_ms,
                sim.frame_interval_ms,
            ),
            point_cloud_interval_ms: pick(
                base.simulation.point_cloud_interval_ms,
                overlay.simulation.point_cloud_interval_ms,
                sim.point_cloud_interval_ms,
            ),
            points_per_cloud: pick(
                base.simulation.points_per_cloud,
                overlay.simulation.points_per_cloud,
                sim.points_per_cloud,
            ),
            pose_failures: pick(
                base.simulation.pose_failures,
                overlay.simulation.pose_failures,
                sim.pose_failures,
            ),
            low_yield_clouds: pick(
                base.simulation.low_yield_clouds,
                overlay.simulation.low_yield_clouds,
                sim.low_yield_clouds,
            ),
            depth: pick(base.simulation.depth, overlay.simulation.depth, sim.depth),
        },
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut TangoConfig, sources: &mut ConfigSources) {
    apply_overrides_from(env::vars(), config, sources);
}

/// Apply `TANGOCAM_*` (and `RUST_LOG`) overrides from an arbitrary variable set.
///
/// Values that fail to parse are skipped and not recorded as overrides.
pub fn apply_overrides_from<I>(vars: I, config: &mut TangoConfig, sources: &mut ConfigSources)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        let applied = match key.as_str() {
            "TANGOCAM_TIMEOUT_MS" => set_parsed(&mut config.capture.timeout_ms, &value),
            "TANGOCAM_MAX_POSE_RETRIES" => set_parsed(&mut config.capture.max_pose_retries, &value),
            "TANGOCAM_MAX_POINT_CLOUD_RETRIES" => {
                set_parsed(&mut config.capture.max_point_cloud_retries, &value)
            }
            "TANGOCAM_MIN_CONFIDENCE" => set_parsed(&mut config.capture.min_confidence, &value),
            "TANGOCAM_MAX_RANGE" => set_parsed(&mut config.capture.max_range, &value),
            "TANGOCAM_MIN_YIELD" => set_parsed(&mut config.capture.min_yield, &value),
            "TANGOCAM_LOG_LEVEL" | "RUST_LOG" => {
                config.telemetry.log_level = value;
                true
            }
            "TANGOCAM_SIM_POSE_FAILURES" => {
                set_parsed(&mut config.simulation.pose_failures, &value)
            }
            "TANGOCAM_SIM_DEPTH" => set_parsed(&mut config.simulation.depth, &value),
            _ => false,
        };
        if applied {
            sources.env_overrides.push(key);
        }
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, value: &str) -> bool {
    match value.trim().parse() {
        Ok(v) => {
            *slot = v;
            true
        }
        Err(_) => false,
    }
}
