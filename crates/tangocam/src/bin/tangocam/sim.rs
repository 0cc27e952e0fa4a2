//! Simulated sensing service
//!
//! Generates colour frames and point clouds on a circular trajectory and
//! injects the faults the coordinator has to absorb: time-indexed pose
//! misses and low-yield clouds, re-armed before every capture.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Instant;

use bytes::Bytes;
use tangocam::{
    pose::LATEST_POSE, CameraId, CameraIntrinsics, ImageFormat, ImageSample, PointCloudSample,
    PoseError, PoseEstimate, PoseSource, SensingService, ServiceError, ServiceInfo,
};
use tangoconf::SimulationConfig;
use tracing::debug;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

pub struct SimulatedService {
    config: SimulationConfig,
    epoch: Instant,
    connected: AtomicBool,
    pose_failures_left: AtomicU32,
    low_yield_left: AtomicU32,
}

impl SimulatedService {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            epoch: Instant::now(),
            connected: AtomicBool::new(false),
            pose_failures_left: AtomicU32::new(0),
            low_yield_left: AtomicU32::new(0),
        }
    }

    /// Reload the per-capture fault budget.
    pub fn arm_capture(&self) {
        self.pose_failures_left
            .store(self.config.pose_failures, Ordering::SeqCst);
        self.low_yield_left
            .store(self.config.low_yield_clouds, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Service clock in seconds. Never 0.0, which means "latest pose".
    fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64().max(1e-6)
    }

    fn pose_for(&self, t: f64) -> PoseEstimate {
        let half = 0.25 * t;
        PoseEstimate::new(
            [0.0, 0.0, half.sin(), half.cos()],
            [t.cos(), t.sin(), 1.5],
            t,
        )
    }

    pub fn image(&self) -> ImageSample {
        let format = ImageFormat::YCrCb420Sp;
        let len = format.byte_len(WIDTH, HEIGHT);
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        ImageSample {
            data: Bytes::from(data),
            width: WIDTH,
            height: HEIGHT,
            stride: WIDTH,
            format_code: format.code(),
            timestamp: self.now(),
        }
    }

    /// A cloud that is mostly noise while the low-yield budget lasts, mostly
    /// clean afterwards.
    pub fn point_cloud(&self) -> PointCloudSample {
        let noisy = self
            .low_yield_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let good_every = if noisy { 5 } else { 1 };

        // Interleaved x, y, z, confidence, as the depth camera delivers it
        let xyzc: Vec<f32> = (0..self.config.points_per_cloud)
            .flat_map(|i| {
                let angle = i as f32 * 0.1;
                let z = 0.5 + (i % 30) as f32 * 0.1;
                let confidence = if i % good_every == 0 { 0.9 } else { 0.1 };
                [angle.cos() * z, angle.sin() * z, z, confidence]
            })
            .collect();
        PointCloudSample::from_xyzc(&xyzc, self.now())
    }
}

impl PoseSource for SimulatedService {
    fn pose_at(&self, timestamp: f64) -> Result<PoseEstimate, PoseError> {
        if !self.is_connected() {
            return Err(PoseError::NotConnected);
        }
        if timestamp == LATEST_POSE {
            return Ok(self.pose_for(self.now()));
        }
        let miss = self
            .pose_failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if miss {
            debug!("Injected pose miss at {:.5}", timestamp);
            return Err(PoseError::Unavailable(timestamp));
        }
        Ok(self.pose_for(timestamp))
    }
}

impl SensingService for SimulatedService {
    fn connect(&self) -> Result<ServiceInfo, ServiceError> {
        if self.config.frame_interval_ms == 0 || self.config.point_cloud_interval_ms == 0 {
            return Err(ServiceError::Connect(
                "simulated camera rates must be non-zero".to_string(),
            ));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(ServiceInfo {
            depth_supported: self.config.depth,
        })
    }

    fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn camera_intrinsics(&self, camera: CameraId) -> Result<CameraIntrinsics, ServiceError> {
        let (width, height, fx) = match camera {
            CameraId::Color => (WIDTH, HEIGHT, 52.0),
            CameraId::Depth if self.config.depth => (32, 24, 26.0),
            other => return Err(ServiceError::Unsupported(other)),
        };
        Ok(CameraIntrinsics {
            camera,
            width,
            height,
            fx,
            fy: fx,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            distortion: [0.0; 5],
        })
    }
}
