//! Pose types exchanged with the AR peer
//!
//! Units follow the AR client's frame (meters, degrees).

use serde::{Deserialize, Serialize};

/// Frame type the AR client expects for poses
pub const DEFAULT_FRAME_TYPE: &str = "unity";

/// Three-component vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl From<[f64; 3]> for Vector3 {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self { x, y, z }
    }
}

/// Position + orientation (Euler angles)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vector3,
    pub orientation: Vector3,
}

impl Pose {
    pub const fn new(position: Vector3, orientation: Vector3) -> Self {
        Self {
            position,
            orientation,
        }
    }
}

/// Pose tagged with the coordinate frame it is expressed in
///
/// Serialized flat: `{"frame_type": .., "position": .., "orientation": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    #[serde(default = "default_frame_type")]
    pub frame_type: String,

    #[serde(flatten)]
    pub pose: Pose,
}

impl PoseFrame {
    pub fn new(frame_type: impl Into<String>, pose: Pose) -> Self {
        Self {
            frame_type: frame_type.into(),
            pose,
        }
    }
}

impl Default for PoseFrame {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_TYPE, Pose::default())
    }
}

fn default_frame_type() -> String {
    DEFAULT_FRAME_TYPE.to_string()
}

/// Player or avatar descriptor announced in heartbeats
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Actor {
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub name: String,
}

impl Actor {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
        }
    }
}

/// Step sizes the AR client uses while the user positions the scene
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PositioningSpeed {
    #[serde(default)]
    pub position: f64,

    #[serde(default)]
    pub rotation: f64,
}
