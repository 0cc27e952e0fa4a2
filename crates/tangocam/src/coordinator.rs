//! Capture coordination
//!
//! Merges three independent callback streams from the sensing service into
//! one capture result:
//!
//! ```text
//!   start_capture(want_point_cloud)
//!          │
//!          ▼
//!   ┌─────────────┐  on_image        ──► deliver_image        (once)
//!   │  Capturing  │  on_point_cloud  ──► deliver_point_cloud  (once)
//!   └─────────────┘  on_frame_tick   ──► request_redraw       (always)
//!          │
//!          ├── all artifacts delivered ──► notify_post_process ──► Idle
//!          └── elapsed > timeout       ──► notify_error        ──► Idle
//! ```
//!
//! The callbacks arrive on arbitrary threads with no ordering between them.
//! All session state lives in one `CaptureSession` behind one mutex. Each
//! handler claims its artifact slot under the lock, does the slow part
//! (pose lookup, filtering, sink calls) with the lock released, and re-checks
//! the session id before committing. A tick never times out a session with a
//! claim outstanding. Terminal transitions reset the session
//! before notifying the sink, so the sink may start the next capture from
//! inside its notification.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use tangoconf::CaptureConfig;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{BootClock, Clock};
use crate::image::{CapturedImage, ImageError, ImageSample};
use crate::intrinsics::{CameraId, CameraIntrinsics};
use crate::point_cloud::{PointCloudFilter, PointCloudSample};
use crate::pose::{PoseOrigin, PoseResolution, PoseResolver, LATEST_POSE};
use crate::service::{SensingService, ServiceError, ServiceInfo};
use crate::session::{timeout_message, Artifact, CaptureSession, SessionSnapshot, SlotState};
use crate::sink::ResultSink;

/// Status shown while the image is in but depth is still being gathered.
pub const STEADY_MESSAGE: &str = "Hold camera steady. Gathering point cloud";

/// What `on_image` did with an event.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageDisposition {
    /// No session, or the image is already claimed or delivered.
    Ignored,
    /// Bad format or short buffer; counted against the pose budget.
    Dropped(ImageError),
    /// Pose not available yet; waiting for the next image.
    Deferred,
    Delivered(PoseOrigin),
    /// The session ended while this event was being handled.
    Stale,
}

/// What `on_point_cloud` did with an event.
#[derive(Debug, Clone, PartialEq)]
pub enum PointCloudDisposition {
    /// No session, depth not wanted, or the cloud is already claimed or delivered.
    Ignored,
    /// Too few good points; waiting for the next cloud.
    Discarded { yield_ratio: f64, retries: u32 },
    Delivered { points: usize, yield_ratio: f64 },
    /// The session ended while this event was being handled.
    Stale,
}

/// What a frame tick decided.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Idle,
    Waiting,
    Completed(Uuid),
    TimedOut { id: Uuid, missing: Vec<Artifact> },
}

pub struct CaptureCoordinator {
    config: CaptureConfig,
    filter: PointCloudFilter,
    resolver: PoseResolver,

    service: Arc<dyn SensingService>,
    sink: Arc<dyn ResultSink>,
    clock: Arc<dyn Clock>,

    connected: AtomicBool,
    depth_supported: AtomicBool,

    session: Mutex<CaptureSession>,
}

impl CaptureCoordinator {
    /// Coordinator timed by the suspend-aware boot clock.
    pub fn new(
        config: CaptureConfig,
        service: Arc<dyn SensingService>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self::with_clock(config, service, sink, Arc::new(BootClock::new()))
    }

    pub fn with_clock(
        config: CaptureConfig,
        service: Arc<dyn SensingService>,
        sink: Arc<dyn ResultSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            filter: PointCloudFilter::from(&config),
            resolver: PoseResolver::new(config.max_pose_retries),
            config,
            service,
            sink,
            clock,
            connected: AtomicBool::new(false),
            depth_supported: AtomicBool::new(false),
            session: Mutex::new(CaptureSession::default()),
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    fn session(&self) -> MutexGuard<'_, CaptureSession> {
        // Every mutation is a whole-field store, so a poisoned guard is still consistent
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // === Service lifecycle ===

    /// Connect to the sensing service, disconnecting first if already connected.
    pub fn connect(&self) -> Result<ServiceInfo, ServiceError> {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.service.disconnect();
        }

        let info = self.service.connect()?;
        self.depth_supported
            .store(info.depth_supported, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);

        if info.depth_supported {
            info!("Sensing service connected (depth available)");
        } else {
            warn!("Sensing service connected; point clouds will not be available");
        }
        Ok(info)
    }

    pub fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.service.disconnect();
            info!("Sensing service disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn depth_supported(&self) -> bool {
        self.depth_supported.load(Ordering::SeqCst)
    }

    // === Capture control ===

    /// Open a capture session. Returns `false` without side effects if the
    /// service is not connected or a capture is already running.
    pub fn start_capture(&self, want_point_cloud: bool) -> bool {
        let mut session = self.session();
        if session.active {
            debug!("Capture {} already running; rejecting start", session.id);
            return false;
        }
        if !self.is_connected() {
            debug!("Sensing service not connected; rejecting start");
            return false;
        }

        let depth = self.depth_supported();
        if want_point_cloud && !depth {
            warn!("Point cloud requested but depth is not available; capturing image only");
        }
        session.begin(want_point_cloud, depth, self.clock.now_ns());
        info!(
            "Capture {} started (point cloud requested: {}, gathering: {})",
            session.id, session.requested_point_cloud, session.want_point_cloud
        );
        true
    }

    pub fn is_capturing(&self) -> bool {
        self.session().active
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session().snapshot()
    }

    // === Event ingestion ===

    /// Handle a raw image from the colour camera.
    pub fn on_image(&self, sample: &ImageSample) -> ImageDisposition {
        let (id, retries_used, format, data) = {
            let mut session = self.session();
            if !session.active || session.image != SlotState::Pending {
                return ImageDisposition::Ignored;
            }
            match sample.frame() {
                Ok((format, data)) => {
                    session.image = SlotState::InFlight;
                    (session.id, session.pose_retries, format, data)
                }
                Err(e) => {
                    session.pose_retries = session.pose_retries.saturating_add(1);
                    warn!("Dropping image for capture {}: {}", session.id, e);
                    return ImageDisposition::Dropped(e);
                }
            }
        };

        let pose = match self
            .resolver
            .resolve(&*self.service, sample.timestamp, retries_used)
        {
            PoseResolution::Resolved(pose) => pose,
            PoseResolution::Deferred => {
                let mut session = self.session();
                if !session.is_current(id) {
                    return ImageDisposition::Stale;
                }
                session.image = SlotState::Pending;
                session.pose_retries = session.pose_retries.saturating_add(1);
                return ImageDisposition::Deferred;
            }
        };

        let gathering_depth = {
            let session = self.session();
            if !session.is_current(id) {
                debug!("Capture {} ended before its image was delivered", id);
                return ImageDisposition::Stale;
            }
            session.want_point_cloud && session.point_cloud != SlotState::Delivered
        };
        if gathering_depth {
            self.sink.notify_status(STEADY_MESSAGE);
        }

        debug!("Delivering image for capture {}", id);
        self.sink.deliver_image(CapturedImage {
            format,
            data,
            width: sample.width,
            height: sample.height,
            stride: sample.stride,
            pose,
            timestamp: sample.timestamp,
        });

        let mut session = self.session();
        if session.is_current(id) {
            session.image = SlotState::Delivered;
        }
        debug!(
            "Got image for capture {} at {:.5} (pose {:?} at {:.5})",
            id, sample.timestamp, pose.origin, pose.timestamp
        );
        ImageDisposition::Delivered(pose.origin)
    }

    /// Handle a raw point cloud from the depth camera.
    pub fn on_point_cloud(&self, raw: &PointCloudSample) -> PointCloudDisposition {
        let (id, retries_used) = {
            let mut session = self.session();
            if !session.active
                || !session.want_point_cloud
                || session.point_cloud != SlotState::Pending
            {
                return PointCloudDisposition::Ignored;
            }
            session.point_cloud = SlotState::InFlight;
            (session.id, session.point_cloud_retries)
        };

        let filtered = self.filter.filter(raw);
        let yield_ratio = filtered.yield_ratio;
        let insufficient = raw.is_empty() || yield_ratio <= self.config.min_yield;

        if insufficient && retries_used < self.config.max_point_cloud_retries {
            let mut session = self.session();
            if !session.is_current(id) {
                return PointCloudDisposition::Stale;
            }
            session.point_cloud = SlotState::Pending;
            session.point_cloud_retries = session.point_cloud_retries.saturating_add(1);
            warn!(
                "Not enough good point cloud points ({}/{})",
                filtered.len(),
                filtered.total
            );
            return PointCloudDisposition::Discarded {
                yield_ratio,
                retries: session.point_cloud_retries,
            };
        }

        if insufficient {
            warn!(
                "Accepting low-yield point cloud ({}/{}) after {} retries",
                filtered.len(),
                filtered.total,
                retries_used
            );
        }

        if !self.session().is_current(id) {
            return PointCloudDisposition::Stale;
        }

        let points = filtered.len();
        let timestamp = filtered.timestamp;
        self.sink.deliver_point_cloud(filtered);

        let mut session = self.session();
        if session.is_current(id) {
            session.point_cloud = SlotState::Delivered;
        }
        debug!(
            "Got point cloud for capture {} at {:.5} ({} points)",
            id, timestamp, points
        );
        PointCloudDisposition::Delivered {
            points,
            yield_ratio,
        }
    }

    /// Handle a display frame tick: request a redraw, then decide whether the
    /// running capture has completed or timed out. Completion wins a tie.
    ///
    /// A session never times out while an artifact is `InFlight`, so nothing
    /// reaches the sink after that session's terminal notification.
    pub fn on_frame_tick(&self) -> TickOutcome {
        self.sink.request_redraw();

        let outcome = {
            let mut session = self.session();
            if !session.active {
                return TickOutcome::Idle;
            }
            if session.is_complete() {
                let id = session.id;
                session.end();
                TickOutcome::Completed(id)
            } else if session.has_in_flight() {
                // A handler is between its claim and its delivery; let it land
                return TickOutcome::Waiting;
            } else if self.clock.elapsed_since(session.started_at_ns) > self.config.timeout_ns() {
                let id = session.id;
                let missing = session.missing();
                session.end();
                TickOutcome::TimedOut { id, missing }
            } else {
                return TickOutcome::Waiting;
            }
        };

        match &outcome {
            TickOutcome::Completed(id) => {
                info!("Capture {} complete", id);
                self.sink.notify_post_process();
            }
            TickOutcome::TimedOut { id, missing } => {
                let message = timeout_message(missing);
                warn!("Capture {}: {}", id, message);
                self.sink.notify_error(message);
            }
            TickOutcome::Idle | TickOutcome::Waiting => {}
        }
        outcome
    }

    // === Queries ===

    /// Reset motion tracking and poll the latest pose until it is valid.
    ///
    /// Polls `pose_wait_timeout_ms / pose_poll_interval_ms` times, sleeping
    /// between polls. Blocks the calling thread; do not call from a
    /// sensing-service callback.
    pub fn wait_for_valid_pose(&self) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.service.reset_motion_tracking();

        let interval_ms = self.config.pose_poll_interval_ms.max(1);
        let attempts = (self.config.pose_wait_timeout_ms / interval_ms).max(1);
        let poll = Duration::from_millis(interval_ms);

        for attempt in 0..attempts {
            if let Ok(pose) = self.service.pose_at(LATEST_POSE) {
                if !pose.is_fallback() {
                    debug!("Valid pose after {} polls", attempt + 1);
                    return true;
                }
            }
            thread::sleep(poll);
        }
        warn!(
            "No valid pose within {}ms of resetting motion tracking",
            self.config.pose_wait_timeout_ms
        );
        false
    }

    /// Timestamp of the most recent pose, if the service has one.
    pub fn last_pose_timestamp(&self) -> Option<f64> {
        if !self.is_connected() {
            return None;
        }
        self.service.pose_at(LATEST_POSE).ok().map(|p| p.timestamp)
    }

    pub fn intrinsics(&self, camera: CameraId) -> Result<CameraIntrinsics, ServiceError> {
        if !self.is_connected() {
            return Err(ServiceError::NotConnected);
        }
        self.service.camera_intrinsics(camera)
    }

    /// Intrinsics for every camera that reports them.
    pub fn all_intrinsics(&self) -> Vec<CameraIntrinsics> {
        CameraId::ALL
            .iter()
            .filter_map(|&camera| self.intrinsics(camera).ok())
            .collect()
    }
}
