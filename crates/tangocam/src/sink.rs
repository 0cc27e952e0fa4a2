//! Outbound notifications to the capture consumer

use crate::image::CapturedImage;
use crate::point_cloud::FilteredPointCloud;

/// Receives capture results.
///
/// Called from whichever sensing-service thread drove the transition, never
/// with the coordinator's lock held, so implementations may call back into
/// the coordinator (for example to start the next capture).
pub trait ResultSink: Send + Sync {
    /// At most once per session.
    fn deliver_image(&self, image: CapturedImage);

    /// At most once per session, and only for sessions that want depth.
    fn deliver_point_cloud(&self, cloud: FilteredPointCloud);

    /// Every wanted artifact has been delivered; the session is closed.
    fn notify_post_process(&self);

    /// The session timed out; `message` names what was missing.
    fn notify_error(&self, message: String);

    /// Sent on every frame tick, capturing or not.
    fn request_redraw(&self);

    /// Transient user-facing status, e.g. asking the user to hold still.
    fn notify_status(&self, _message: &str) {}
}
