use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::{Position3D, Rotation3D};

/// One rigid body as reported by the motion-capture system, in world frame
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RigidBodyPose {
    pub name: String,
    pub position: Position3D,
    pub rotation: Rotation3D,
    #[serde(default = "default_tracked")]
    pub tracked: bool,
}

fn default_tracked() -> bool {
    true
}

/// All rigid bodies reported by the capture system in one frame
pub type RigidBodyFrame = Vec<RigidBodyPose>;

impl RigidBodyPose {
    pub fn new(name: &str, position: Position3D, rotation: Rotation3D) -> Self {
        RigidBodyPose {
            name: String::from(name),
            position,
            rotation,
            tracked: true,
        }
    }

    pub fn untracked(name: &str) -> Self {
        RigidBodyPose {
            name: String::from(name),
            position: [0., 0., 0.],
            rotation: [0., 0., 0., 1.],
            tracked: false,
        }
    }
}

/// The message sent to the session target: pose of the phone in the local
/// frame of the hololens, plus tracking flags.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelativeTransformSample {
    pub relative_position: Position3D,
    pub relative_rotation: Rotation3D,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_world_position: Option<Position3D>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_world_rotation: Option<Rotation3D>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hololens_world_position: Option<Position3D>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hololens_world_rotation: Option<Rotation3D>,
    /// Milliseconds since Unix epoch
    pub timestamp: i64,
    pub phone_tracked: bool,
    pub hololens_tracked: bool,
}

impl RelativeTransformSample {
    /// Tracking-status-only sample: pose fields are zeroed, world fields omitted
    pub fn tracking_status(phone_tracked: bool, hololens_tracked: bool) -> Self {
        RelativeTransformSample {
            relative_position: [0.; 3],
            relative_rotation: [0.; 4],
            phone_world_position: None,
            phone_world_rotation: None,
            hololens_world_position: None,
            hololens_world_rotation: None,
            timestamp: timestamp_millis(),
            phone_tracked,
            hololens_tracked,
        }
    }

    pub fn is_status_only(&self) -> bool {
        !(self.phone_tracked && self.hololens_tracked)
    }
}

pub fn timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
