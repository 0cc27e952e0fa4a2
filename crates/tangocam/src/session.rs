//! The capture session record
//!
//! One `CaptureSession` exists per coordinator and is only ever touched under
//! the coordinator's lock. Each artifact slot moves `Pending -> InFlight ->
//! Delivered`; `InFlight` is the claim that keeps a second concurrent event of
//! the same kind out while the first is being resolved or delivered.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Progress of one artifact within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SlotState {
    #[default]
    Pending,
    InFlight,
    Delivered,
}

/// The artifacts a capture waits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Artifact {
    Image,
    PointCloud,
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Artifact::Image => write!(f, "Image"),
            Artifact::PointCloud => write!(f, "PointCloud"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CaptureSession {
    pub id: Uuid,
    pub active: bool,
    /// What the caller asked for.
    pub requested_point_cloud: bool,
    /// What this session waits on: requested and supported by the device.
    pub want_point_cloud: bool,
    pub image: SlotState,
    pub point_cloud: SlotState,
    pub started_at_ns: u64,
    pub pose_retries: u32,
    pub point_cloud_retries: u32,
}

impl CaptureSession {
    /// Reset everything and open a new session.
    pub fn begin(&mut self, requested_point_cloud: bool, depth_supported: bool, now_ns: u64) {
        *self = Self {
            id: Uuid::new_v4(),
            active: true,
            requested_point_cloud,
            want_point_cloud: requested_point_cloud && depth_supported,
            started_at_ns: now_ns,
            ..Self::default()
        };
    }

    /// Fold back to idle after a terminal transition.
    pub fn end(&mut self) {
        *self = Self::default();
    }

    /// True if `id` still names the running session.
    pub fn is_current(&self, id: Uuid) -> bool {
        self.active && self.id == id
    }

    pub fn is_complete(&self) -> bool {
        self.image == SlotState::Delivered
            && (!self.want_point_cloud || self.point_cloud == SlotState::Delivered)
    }

    /// True while a handler holds a claim it has not yet released or delivered.
    pub fn has_in_flight(&self) -> bool {
        self.image == SlotState::InFlight || self.point_cloud == SlotState::InFlight
    }

    /// Artifacts not yet delivered, in reporting order.
    pub fn missing(&self) -> Vec<Artifact> {
        let mut missing = Vec::new();
        if self.image != SlotState::Delivered {
            missing.push(Artifact::Image);
        }
        if self.want_point_cloud && self.point_cloud != SlotState::Delivered {
            missing.push(Artifact::PointCloud);
        }
        missing
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.active.then_some(self.id),
            active: self.active,
            requested_point_cloud: self.requested_point_cloud,
            want_point_cloud: self.want_point_cloud,
            image: self.image,
            point_cloud: self.point_cloud,
            pose_retries: self.pose_retries,
            point_cloud_retries: self.point_cloud_retries,
        }
    }
}

/// Read-only copy of the session for callers and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: Option<Uuid>,
    pub active: bool,
    pub requested_point_cloud: bool,
    pub want_point_cloud: bool,
    pub image: SlotState,
    pub point_cloud: SlotState,
    pub pose_retries: u32,
    pub point_cloud_retries: u32,
}

/// Diagnostic sent to the sink when a session times out.
pub fn timeout_message(missing: &[Artifact]) -> String {
    let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
    format!("Timed out waiting on {}", names.join(", "))
}
