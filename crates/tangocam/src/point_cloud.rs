//! Point cloud quality filtering
//!
//! Depth samples carry a per-point confidence. Points that are unconfident or
//! too far from the camera are dropped, and the fraction that survives (the
//! yield) decides whether a cloud is worth keeping.

use serde::{Deserialize, Serialize};

/// One depth sample in the depth camera frame (metres).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub confidence: f32,
}

impl PointSample {
    pub fn new(x: f32, y: f32, z: f32, confidence: f32) -> Self {
        Self { x, y, z, confidence }
    }
}

/// A raw point cloud event from the sensing service.
#[derive(Debug, Clone, Default)]
pub struct PointCloudSample {
    pub points: Vec<PointSample>,
    /// Capture time in seconds on the service's clock.
    pub timestamp: f64,
}

impl PointCloudSample {
    pub fn new(points: Vec<PointSample>, timestamp: f64) -> Self {
        Self { points, timestamp }
    }

    /// Decode interleaved `x, y, z, confidence` floats.
    ///
    /// A trailing partial point is ignored.
    pub fn from_xyzc(data: &[f32], timestamp: f64) -> Self {
        let points = data
            .chunks_exact(4)
            .map(|c| PointSample::new(c[0], c[1], c[2], c[3]))
            .collect();
        Self { points, timestamp }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Points that passed the filter, ready for the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredPointCloud {
    pub points: Vec<PointSample>,
    pub timestamp: f64,
    /// Size of the unfiltered input.
    pub total: usize,
    /// `points.len() / total`, or 1.0 for an empty input.
    pub yield_ratio: f64,
}

impl FilteredPointCloud {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Confidence and range filter. Stateless; share freely across threads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointCloudFilter {
    pub min_confidence: f32,
    pub max_range: f32,
}

impl Default for PointCloudFilter {
    fn default() -> Self {
        Self {
            min_confidence: 0.3,
            max_range: 4.0,
        }
    }
}

impl From<&tangoconf::CaptureConfig> for PointCloudFilter {
    fn from(config: &tangoconf::CaptureConfig) -> Self {
        Self {
            min_confidence: config.min_confidence,
            max_range: config.max_range,
        }
    }
}

impl PointCloudFilter {
    pub fn accepts(&self, point: &PointSample) -> bool {
        point.confidence >= self.min_confidence && point.z <= self.max_range
    }

    pub fn filter(&self, raw: &PointCloudSample) -> FilteredPointCloud {
        let points: Vec<PointSample> = raw
            .points
            .iter()
            .filter(|p| self.accepts(p))
            .copied()
            .collect();

        let total = raw.points.len();
        let yield_ratio = if total == 0 {
            1.0
        } else {
            points.len() as f64 / total as f64
        };

        FilteredPointCloud {
            points,
            timestamp: raw.timestamp,
            total,
            yield_ratio,
        }
    }
}
