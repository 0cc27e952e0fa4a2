//! Integration tests for capture coordination
//!
//! Drives the coordinator from several threads at once, the way the sensing
//! service does, and checks the at-most-once and exactly-one-outcome rules.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use tangocam::{
    CaptureCoordinator, CapturedImage, FilteredPointCloud, ImageFormat, ImageSample,
    ManualClock, PointCloudSample, PointSample, PoseError, PoseEstimate, PoseSource,
    ResultSink, SensingService, ServiceError, ServiceInfo, TickOutcome,
};
use tangoconf::CaptureConfig;

/// Always knows where the device is.
struct SteadyService;

impl PoseSource for SteadyService {
    fn pose_at(&self, timestamp: f64) -> Result<PoseEstimate, PoseError> {
        Ok(PoseEstimate::new([0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.0], timestamp))
    }
}

impl SensingService for SteadyService {
    fn connect(&self) -> Result<ServiceInfo, ServiceError> {
        Ok(ServiceInfo {
            depth_supported: true,
        })
    }

    fn disconnect(&self) {}
}

#[derive(Default)]
struct CountingSink {
    images: AtomicU32,
    clouds: AtomicU32,
    post_process: AtomicU32,
    errors: Mutex<Vec<String>>,
}

impl ResultSink for CountingSink {
    fn deliver_image(&self, _image: CapturedImage) {
        self.images.fetch_add(1, Ordering::SeqCst);
    }

    fn deliver_point_cloud(&self, _cloud: FilteredPointCloud) {
        self.clouds.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_post_process(&self) {
        self.post_process.fetch_add(1, Ordering::SeqCst);
    }

    fn notify_error(&self, message: String) {
        self.errors.lock().unwrap().push(message);
    }

    fn request_redraw(&self) {}
}

/// Starts the next capture from inside the terminal notification.
struct RestartingSink {
    coordinator: OnceLock<Weak<CaptureCoordinator>>,
    restarts_left: AtomicU32,
    restarted: Mutex<Vec<bool>>,
    terminals: AtomicU32,
}

impl RestartingSink {
    fn new(restarts: u32) -> Self {
        Self {
            coordinator: OnceLock::new(),
            restarts_left: AtomicU32::new(restarts),
            restarted: Mutex::new(Vec::new()),
            terminals: AtomicU32::new(0),
        }
    }

    fn restart(&self) {
        self.terminals.fetch_add(1, Ordering::SeqCst);
        let budget = self
            .restarts_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if budget.is_err() {
            return;
        }
        if let Some(coordinator) = self.coordinator.get().and_then(Weak::upgrade) {
            let ok = coordinator.start_capture(false);
            self.restarted.lock().unwrap().push(ok);
        }
    }
}

impl ResultSink for RestartingSink {
    fn deliver_image(&self, _image: CapturedImage) {}

    fn deliver_point_cloud(&self, _cloud: FilteredPointCloud) {}

    fn notify_post_process(&self) {
        self.restart();
    }

    fn notify_error(&self, _message: String) {
        self.restart();
    }

    fn request_redraw(&self) {}
}

/// Fires a late frame tick from inside the steady-status notification, which
/// lands between the image handler's id re-check and its delivery.
struct InterleavingSink {
    coordinator: OnceLock<Weak<CaptureCoordinator>>,
    clock: Arc<ManualClock>,
    ticked: AtomicU32,
    log: Mutex<Vec<String>>,
}

impl InterleavingSink {
    fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            coordinator: OnceLock::new(),
            clock,
            ticked: AtomicU32::new(0),
            log: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }

    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn coordinator(&self) -> Option<Arc<CaptureCoordinator>> {
        self.coordinator.get().and_then(Weak::upgrade)
    }
}

impl ResultSink for InterleavingSink {
    fn deliver_image(&self, image: CapturedImage) {
        self.push(format!("Image@{}", image.timestamp));
    }

    fn deliver_point_cloud(&self, _cloud: FilteredPointCloud) {
        self.push("PointCloud".to_string());
    }

    fn notify_post_process(&self) {
        self.push("PostProcess".to_string());
    }

    fn notify_error(&self, message: String) {
        self.push(format!("Error({})", message));
        if let Some(coordinator) = self.coordinator() {
            self.push(format!("Restart={}", coordinator.start_capture(false)));
        }
    }

    fn request_redraw(&self) {}

    fn notify_status(&self, _message: &str) {
        if self.ticked.fetch_add(1, Ordering::SeqCst) > 0 {
            return;
        }
        self.clock.advance(Duration::from_millis(1500));
        if let Some(coordinator) = self.coordinator() {
            self.push(format!("Tick={:?}", coordinator.on_frame_tick()));
        }
    }
}

fn image(timestamp: f64) -> ImageSample {
    ImageSample {
        data: Bytes::from(vec![0u8; ImageFormat::Rgba8888.byte_len(4, 4)]),
        width: 4,
        height: 4,
        stride: 16,
        format_code: ImageFormat::HAL_RGBA_8888,
        timestamp,
    }
}

fn good_cloud(timestamp: f64) -> PointCloudSample {
    PointCloudSample::new(vec![PointSample::new(0.0, 0.0, 1.0, 0.9); 16], timestamp)
}

fn coordinator_with(
    sink: Arc<dyn ResultSink>,
    clock: Arc<ManualClock>,
) -> Arc<CaptureCoordinator> {
    let coordinator = Arc::new(CaptureCoordinator::with_clock(
        CaptureConfig::default(),
        Arc::new(SteadyService),
        sink,
        clock,
    ));
    coordinator.connect().unwrap();
    coordinator
}

#[test]
fn test_concurrent_duplicates_deliver_once() {
    let sink = Arc::new(CountingSink::default());
    let clock = Arc::new(ManualClock::new());
    let coordinator = coordinator_with(sink.clone(), clock);

    assert!(coordinator.start_capture(true));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let coordinator = coordinator.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let ts = (t * 1000 + i) as f64 + 1.0;
                    match (t + i) % 3 {
                        0 => {
                            coordinator.on_image(&image(ts));
                        }
                        1 => {
                            coordinator.on_point_cloud(&good_cloud(ts));
                        }
                        _ => {
                            coordinator.on_frame_tick();
                        }
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    coordinator.on_frame_tick();

    assert_eq!(sink.images.load(Ordering::SeqCst), 1);
    assert_eq!(sink.clouds.load(Ordering::SeqCst), 1);
    assert_eq!(sink.post_process.load(Ordering::SeqCst), 1);
    assert!(sink.errors.lock().unwrap().is_empty());
    assert!(!coordinator.is_capturing());
}

#[test]
fn test_concurrent_ticks_time_out_once() {
    let sink = Arc::new(CountingSink::default());
    let clock = Arc::new(ManualClock::new());
    let coordinator = coordinator_with(sink.clone(), clock.clone());

    assert!(coordinator.start_capture(true));
    clock.advance(Duration::from_millis(1001));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = coordinator.clone();
            thread::spawn(move || {
                (0..50)
                    .filter(|_| matches!(coordinator.on_frame_tick(), TickOutcome::TimedOut { .. }))
                    .count()
            })
        })
        .collect();
    let timeouts: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

    assert_eq!(timeouts, 1);
    assert_eq!(
        *sink.errors.lock().unwrap(),
        vec!["Timed out waiting on Image, PointCloud".to_string()]
    );
    assert_eq!(sink.post_process.load(Ordering::SeqCst), 0);
}

#[test]
fn test_late_events_after_timeout_are_ignored() {
    let sink = Arc::new(CountingSink::default());
    let clock = Arc::new(ManualClock::new());
    let coordinator = coordinator_with(sink.clone(), clock.clone());

    coordinator.start_capture(true);
    clock.advance(Duration::from_secs(2));
    coordinator.on_frame_tick();

    coordinator.on_image(&image(1.0));
    coordinator.on_point_cloud(&good_cloud(1.0));
    coordinator.on_frame_tick();

    assert_eq!(sink.images.load(Ordering::SeqCst), 0);
    assert_eq!(sink.clouds.load(Ordering::SeqCst), 0);
    assert_eq!(sink.errors.lock().unwrap().len(), 1);
}

#[test]
fn test_sink_can_restart_from_post_process() {
    let sink = Arc::new(RestartingSink::new(3));
    let clock = Arc::new(ManualClock::new());
    let coordinator = coordinator_with(sink.clone(), clock);
    sink.coordinator.set(Arc::downgrade(&coordinator)).unwrap();

    assert!(coordinator.start_capture(false));
    for i in 0..4 {
        coordinator.on_image(&image(i as f64 + 1.0));
        assert!(matches!(coordinator.on_frame_tick(), TickOutcome::Completed(_)));
    }

    assert_eq!(*sink.restarted.lock().unwrap(), vec![true, true, true]);
    assert_eq!(sink.terminals.load(Ordering::SeqCst), 4);
    assert!(!coordinator.is_capturing());
}

#[test]
fn test_sink_can_restart_from_timeout() {
    let sink = Arc::new(RestartingSink::new(1));
    let clock = Arc::new(ManualClock::new());
    let coordinator = coordinator_with(sink.clone(), clock.clone());
    sink.coordinator.set(Arc::downgrade(&coordinator)).unwrap();

    assert!(coordinator.start_capture(false));
    clock.advance(Duration::from_millis(1500));
    assert!(matches!(coordinator.on_frame_tick(), TickOutcome::TimedOut { .. }));

    assert_eq!(*sink.restarted.lock().unwrap(), vec![true]);
    assert!(coordinator.is_capturing());

    // The restarted session's budget runs from the restart, not the original start
    assert_eq!(coordinator.on_frame_tick(), TickOutcome::Waiting);
}

#[test]
fn test_in_flight_image_lands_before_timeout() {
    let clock = Arc::new(ManualClock::new());
    let sink = Arc::new(InterleavingSink::new(clock.clone()));
    let coordinator = coordinator_with(sink.clone(), clock);
    sink.coordinator.set(Arc::downgrade(&coordinator)).unwrap();

    assert!(coordinator.start_capture(true));
    coordinator.on_image(&image(1.0));
    assert!(matches!(coordinator.on_frame_tick(), TickOutcome::TimedOut { .. }));
    coordinator.on_image(&image(2.0));
    assert!(matches!(coordinator.on_frame_tick(), TickOutcome::Completed(_)));

    assert_eq!(
        sink.log(),
        vec![
            "Tick=Waiting".to_string(),
            "Image@1".to_string(),
            "Error(Timed out waiting on PointCloud)".to_string(),
            "Restart=true".to_string(),
            "Image@2".to_string(),
            "PostProcess".to_string(),
        ]
    );
}
