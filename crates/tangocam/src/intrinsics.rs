//! Camera calibration reporting

use serde::{Deserialize, Serialize};

/// Cameras exposed by the sensing service, in its id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraId {
    Color,
    RgbIr,
    Fisheye,
    Depth,
}

impl CameraId {
    pub const ALL: [CameraId; 4] = [
        CameraId::Color,
        CameraId::RgbIr,
        CameraId::Fisheye,
        CameraId::Depth,
    ];
}

/// Pinhole intrinsics plus the service's five distortion coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub camera: CameraId,
    pub width: u32,
    pub height: u32,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub distortion: [f64; 5],
}

impl CameraIntrinsics {
    /// Horizontal field of view in radians.
    pub fn horizontal_fov(&self) -> f64 {
        2.0 * (0.5 * self.width as f64).atan2(self.fx)
    }

    /// Vertical field of view in radians.
    pub fn vertical_fov(&self) -> f64 {
        2.0 * (0.5 * self.height as f64).atan2(self.fy)
    }

    /// Camera matrix K.
    pub fn k(&self) -> [[f64; 3]; 3] {
        [
            [self.fx, 0.0, self.cx],
            [0.0, self.fy, self.cy],
            [0.0, 0.0, 1.0],
        ]
    }
}
