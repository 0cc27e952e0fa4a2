//! Channel-backed sink and per-capture reports

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tangocam::{CapturedImage, FilteredPointCloud, ImageFormat, PoseOrigin, ResultSink};
use tokio::sync::mpsc;

/// Sink notifications, forwarded to the driver loop.
#[derive(Debug, Clone)]
pub enum SinkEvent {
    Image(ImageSummary),
    PointCloud(PointCloudSummary),
    PostProcess,
    Error(String),
    Status(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageSummary {
    pub timestamp: f64,
    pub format: ImageFormat,
    pub output_code: i32,
    pub bytes: usize,
    pub pose_origin: PoseOrigin,
    pub pose_timestamp: f64,
    /// Scalar-first, the order downstream consumers expect.
    pub orientation_wxyz: [f64; 4],
    pub translation: [f64; 3],
}

impl From<CapturedImage> for ImageSummary {
    fn from(image: CapturedImage) -> Self {
        Self {
            timestamp: image.timestamp,
            format: image.format,
            output_code: image.format.output_code(),
            bytes: image.data.len(),
            pose_origin: image.pose.origin,
            pose_timestamp: image.pose.timestamp,
            orientation_wxyz: image.pose.orientation_wxyz(),
            translation: image.pose.translation,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PointCloudSummary {
    pub timestamp: f64,
    pub points: usize,
    pub total: usize,
    pub yield_ratio: f64,
}

impl From<FilteredPointCloud> for PointCloudSummary {
    fn from(cloud: FilteredPointCloud) -> Self {
        Self {
            timestamp: cloud.timestamp,
            points: cloud.len(),
            total: cloud.total,
            yield_ratio: cloud.yield_ratio,
        }
    }
}

pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
    redraws: AtomicU64,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<SinkEvent>) -> Self {
        Self {
            tx,
            redraws: AtomicU64::new(0),
        }
    }

    pub fn redraws(&self) -> u64 {
        self.redraws.load(Ordering::Relaxed)
    }

    fn send(&self, event: SinkEvent) {
        // Receiver gone means the driver is shutting down
        let _ = self.tx.send(event);
    }
}

impl ResultSink for ChannelSink {
    fn deliver_image(&self, image: CapturedImage) {
        self.send(SinkEvent::Image(image.into()));
    }

    fn deliver_point_cloud(&self, cloud: FilteredPointCloud) {
        self.send(SinkEvent::PointCloud(cloud.into()));
    }

    fn notify_post_process(&self) {
        self.send(SinkEvent::PostProcess);
    }

    fn notify_error(&self, message: String) {
        self.send(SinkEvent::Error(message));
    }

    fn request_redraw(&self) {
        self.redraws.fetch_add(1, Ordering::Relaxed);
    }

    fn notify_status(&self, message: &str) {
        self.send(SinkEvent::Status(message.to_string()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    TimedOut,
}

/// One JSON line per capture.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    pub index: usize,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
    pub statuses: Vec<String>,
    pub image: Option<ImageSummary>,
    pub point_cloud: Option<PointCloudSummary>,
}

/// Collects sink events for the capture in progress.
#[derive(Debug, Default)]
pub struct ReportBuilder {
    statuses: Vec<String>,
    image: Option<ImageSummary>,
    point_cloud: Option<PointCloudSummary>,
}

impl ReportBuilder {
    /// Fold one event in. Returns the finished report on a terminal event.
    pub fn record(&mut self, index: usize, elapsed_ms: u64, event: SinkEvent) -> Option<CaptureReport> {
        let (outcome, error) = match event {
            SinkEvent::Image(image) => {
                self.image = Some(image);
                return None;
            }
            SinkEvent::PointCloud(cloud) => {
                self.point_cloud = Some(cloud);
                return None;
            }
            SinkEvent::Status(message) => {
                self.statuses.push(message);
                return None;
            }
            SinkEvent::PostProcess => (Outcome::Completed, None),
            SinkEvent::Error(message) => (Outcome::TimedOut, Some(message)),
        };

        let done = std::mem::take(self);
        Some(CaptureReport {
            index,
            outcome,
            error,
            elapsed_ms,
            statuses: done.statuses,
            image: done.image,
            point_cloud: done.point_cloud,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloud() -> PointCloudSummary {
        PointCloudSummary {
            timestamp: 1.0,
            points: 10,
            total: 12,
            yield_ratio: 10.0 / 12.0,
        }
    }

    #[test]
    fn test_builder_resets_after_terminal_event() {
        let mut builder = ReportBuilder::default();
        assert!(builder
            .record(0, 5, SinkEvent::PointCloud(cloud()))
            .is_none());
        assert!(builder
            .record(0, 5, SinkEvent::Status("hold".into()))
            .is_none());

        let report = builder
            .record(0, 12, SinkEvent::Error("Timed out waiting on Image".into()))
            .unwrap();
        assert_eq!(report.outcome, Outcome::TimedOut);
        assert_eq!(report.statuses, vec!["hold".to_string()]);
        assert!(report.image.is_none());
        assert!(report.point_cloud.is_some());

        let next = builder.record(1, 3, SinkEvent::PostProcess).unwrap();
        assert!(next.point_cloud.is_none());
        assert!(next.statuses.is_empty());
    }

    #[test]
    fn test_report_json_shape() {
        let mut builder = ReportBuilder::default();
        let report = builder.record(2, 40, SinkEvent::PostProcess).unwrap();
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["outcome"], "completed");
        assert_eq!(value["index"], 2);
        assert!(value.get("error").is_none());
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);

        sink.request_redraw();
        sink.request_redraw();
        sink.notify_post_process();

        assert_eq!(sink.redraws(), 2);
        assert!(matches!(rx.recv().await, Some(SinkEvent::PostProcess)));
    }
}
