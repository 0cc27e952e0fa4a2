//! Tangocam: Photo Capture Coordinator
//!
//! Takes a "photo" from a depth-sensing device. A photo is one colour image
//! paired with the device pose at its timestamp, plus (optionally) one
//! filtered point cloud. The three inputs arrive as independent callbacks
//! from the sensing service:
//!
//! - **Image** events: raw colour frames, matched to a pose
//! - **Point cloud** events: depth samples, filtered by confidence and range
//! - **Frame ticks**: display refreshes that drive completion and timeout
//!
//! [`CaptureCoordinator`] merges them into exactly one terminal outcome per
//! capture (post-process or timeout error) delivered through a [`ResultSink`].

pub mod clock;
pub mod coordinator;
pub mod image;
pub mod intrinsics;
pub mod point_cloud;
pub mod pose;
pub mod service;
pub mod session;
pub mod sink;

pub use clock::{BootClock, Clock, ManualClock};
pub use coordinator::{
    CaptureCoordinator, ImageDisposition, PointCloudDisposition, TickOutcome, STEADY_MESSAGE,
};
pub use image::{CapturedImage, ImageError, ImageFormat, ImageSample};
pub use intrinsics::{CameraId, CameraIntrinsics};
pub use point_cloud::{FilteredPointCloud, PointCloudFilter, PointCloudSample, PointSample};
pub use pose::{PoseError, PoseEstimate, PoseOrigin, PoseResolution, PoseResolver, PoseSource};
pub use service::{SensingService, ServiceError, ServiceInfo};
pub use session::{Artifact, SessionSnapshot, SlotState};
pub use sink::ResultSink;
