//! The upstream sensing service
//!
//! The service owns the cameras and the motion tracker. It fires the
//! coordinator's `on_*` handlers from its own threads once connected, and
//! answers pose and calibration queries.

use thiserror::Error;

use crate::intrinsics::{CameraId, CameraIntrinsics};
use crate::pose::PoseSource;

/// What the service reported on connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServiceInfo {
    /// Depth is configured and the point cloud callback is attached.
    pub depth_supported: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("failed to connect to sensing service: {0}")]
    Connect(String),

    #[error("sensing service is not connected")]
    NotConnected,

    #[error("{0:?} camera does not report intrinsics")]
    Unsupported(CameraId),
}

pub trait SensingService: PoseSource {
    /// Configure and connect. Callbacks may start firing before this returns.
    fn connect(&self) -> Result<ServiceInfo, ServiceError>;

    fn disconnect(&self);

    /// Restart motion tracking from the current device position.
    fn reset_motion_tracking(&self) {}

    fn camera_intrinsics(&self, camera: CameraId) -> Result<CameraIntrinsics, ServiceError> {
        Err(ServiceError::Unsupported(camera))
    }
}
