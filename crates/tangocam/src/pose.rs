//! Device pose lookup with a two-tier fallback
//!
//! An image is only useful with the pose it was taken from. The resolver asks
//! for the pose at the image timestamp; while the session's retry budget
//! lasts, a miss defers the image to the next image event. Once the budget is
//! spent it asks for the latest known pose (timestamp `0.0`), and if that also
//! fails it hands back an all-zero pose tagged `Fallback`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Timestamp that asks the sensing service for its most recent pose.
pub const LATEST_POSE: f64 = 0.0;

/// Where a pose came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoseOrigin {
    /// Matched the requested timestamp.
    AtTimestamp,
    /// Latest known pose, used after the retry budget ran out.
    LatestKnown,
    /// No pose was available; values are zero.
    Fallback,
}

/// Device pose in the start-of-service frame.
///
/// `orientation` is a unit quaternion stored **scalar-last** `[x, y, z, w]`,
/// the sensing service's native order. Consumers that want scalar-first use
/// [`PoseEstimate::orientation_wxyz`]. `translation` is `[x, y, z]` metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseEstimate {
    pub orientation: [f64; 4],
    pub translation: [f64; 3],
    /// Service timestamp the pose belongs to (seconds).
    pub timestamp: f64,
    pub origin: PoseOrigin,
}

impl PoseEstimate {
    pub fn new(orientation: [f64; 4], translation: [f64; 3], timestamp: f64) -> Self {
        Self {
            orientation,
            translation,
            timestamp,
            origin: PoseOrigin::AtTimestamp,
        }
    }

    /// The zero pose used when no lookup succeeds.
    pub fn fallback() -> Self {
        Self {
            orientation: [0.0; 4],
            translation: [0.0; 3],
            timestamp: 0.0,
            origin: PoseOrigin::Fallback,
        }
    }

    pub fn with_origin(mut self, origin: PoseOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Orientation reordered scalar-first `[w, x, y, z]`.
    pub fn orientation_wxyz(&self) -> [f64; 4] {
        let [x, y, z, w] = self.orientation;
        [w, x, y, z]
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == PoseOrigin::Fallback
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoseError {
    #[error("no pose available at timestamp {0:.5}")]
    Unavailable(f64),

    #[error("sensing service is not connected")]
    NotConnected,
}

/// Anything that can answer "where was the device at time t".
pub trait PoseSource: Send + Sync {
    fn pose_at(&self, timestamp: f64) -> Result<PoseEstimate, PoseError>;
}

/// Result of one resolution attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoseResolution {
    Resolved(PoseEstimate),
    /// Lookup failed with budget left; retry on the next image event.
    Deferred,
}

/// Applies the time-indexed, then latest-known, then zero policy.
#[derive(Debug, Clone, Copy)]
pub struct PoseResolver {
    max_retries: u32,
}

impl PoseResolver {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Resolve the pose for `timestamp` given how many image events this
    /// session has already deferred. Never loops and never fails.
    pub fn resolve<S: PoseSource + ?Sized>(
        &self,
        source: &S,
        timestamp: f64,
        retries_used: u32,
    ) -> PoseResolution {
        let err = match source.pose_at(timestamp) {
            Ok(pose) => {
                return PoseResolution::Resolved(pose.with_origin(PoseOrigin::AtTimestamp));
            }
            Err(e) => e,
        };

        if retries_used < self.max_retries {
            warn!(
                "Could not get pose at timestamp {:.5} ({}). Retrying ({}/{})",
                timestamp,
                err,
                retries_used + 1,
                self.max_retries
            );
            return PoseResolution::Deferred;
        }

        match source.pose_at(LATEST_POSE) {
            Ok(pose) => {
                debug!(
                    "Using latest known pose ({:.5}) for image at {:.5}",
                    pose.timestamp, timestamp
                );
                PoseResolution::Resolved(pose.with_origin(PoseOrigin::LatestKnown))
            }
            Err(e) => {
                error!("Could not get latest pose ({}); using zero pose", e);
                PoseResolution::Resolved(PoseEstimate::fallback())
            }
        }
    }
}

impl Default for PoseResolver {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Answers from a script; records every timestamp asked for.
    struct ScriptedSource {
        at_timestamp: Option<PoseEstimate>,
        latest: Option<PoseEstimate>,
        calls: Mutex<Vec<f64>>,
    }

    impl ScriptedSource {
        fn new(at_timestamp: Option<PoseEstimate>, latest: Option<PoseEstimate>) -> Self {
            Self {
                at_timestamp,
                latest,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<f64> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PoseSource for ScriptedSource {
        fn pose_at(&self, timestamp: f64) -> Result<PoseEstimate, PoseError> {
            self.calls.lock().unwrap().push(timestamp);
            let answer = if timestamp == LATEST_POSE {
                self.latest
            } else {
                self.at_timestamp
            };
            answer.ok_or(PoseError::Unavailable(timestamp))
        }
    }

    fn pose(t: f64) -> PoseEstimate {
        PoseEstimate::new([0.0, 0.0, 0.0, 1.0], [1.0, 2.0, 3.0], t)
    }

    #[test]
    fn test_resolves_at_timestamp() {
        let source = ScriptedSource::new(Some(pose(5.0)), None);
        let resolution = PoseResolver::default().resolve(&source, 5.0, 0);

        assert_eq!(
            resolution,
            PoseResolution::Resolved(pose(5.0).with_origin(PoseOrigin::AtTimestamp))
        );
        assert_eq!(source.calls(), vec![5.0]);
    }

    #[test]
    fn test_defers_while_budget_remains() {
        let source = ScriptedSource::new(None, Some(pose(9.0)));
        let resolver = PoseResolver::new(5);

        for used in 0..5 {
            assert_eq!(resolver.resolve(&source, 5.0, used), PoseResolution::Deferred);
        }
        // Only time-indexed queries while deferring
        assert!(source.calls().iter().all(|&t| t == 5.0));
    }

    #[test]
    fn test_falls_back_to_latest_after_budget() {
        let source = ScriptedSource::new(None, Some(pose(9.0)));
        let resolution = PoseResolver::new(5).resolve(&source, 5.0, 5);

        match resolution {
            PoseResolution::Resolved(p) => {
                assert_eq!(p.origin, PoseOrigin::LatestKnown);
                assert_eq!(p.timestamp, 9.0);
            }
            other => panic!("expected resolved, got {:?}", other),
        }
        assert_eq!(source.calls(), vec![5.0, LATEST_POSE]);
    }

    #[test]
    fn test_zero_pose_when_everything_fails() {
        let source = ScriptedSource::new(None, None);
        let resolution = PoseResolver::new(5).resolve(&source, 5.0, 5);

        let PoseResolution::Resolved(p) = resolution else {
            panic!("expected resolved");
        };
        assert!(p.is_fallback());
        assert_eq!(p.orientation, [0.0; 4]);
        assert_eq!(p.translation, [0.0; 3]);
    }

    #[test]
    fn test_zero_budget_goes_straight_to_latest() {
        let source = ScriptedSource::new(None, Some(pose(1.0)));
        let resolution = PoseResolver::new(0).resolve(&source, 5.0, 0);
        assert!(matches!(
            resolution,
            PoseResolution::Resolved(PoseEstimate { origin: PoseOrigin::LatestKnown, .. })
        ));
    }

    #[test]
    fn test_scalar_first_reorder() {
        let p = PoseEstimate::new([0.1, 0.2, 0.3, 0.9], [0.0; 3], 0.0);
        assert_eq!(p.orientation_wxyz(), [0.9, 0.1, 0.2, 0.3]);
    }
}
