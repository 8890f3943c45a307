mod capability;
pub use capability::{AssetLoader, CaptureSource, LandmarkSource, Renderer, SceneAsset};

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// MediaPipe face-mesh indices used by the alignment pipeline.
pub mod landmarks {
    /// Number of points in a face-mesh frame without iris refinement.
    pub const FACE_MESH_POINTS: usize = 468;
    /// Number of points when refined (iris) landmarks are enabled.
    pub const FACE_MESH_REFINED_POINTS: usize = 478;

    pub const LEFT_EYE_CORNER: usize = 133;
    pub const RIGHT_EYE_CORNER: usize = 362;
    pub const NOSE_BRIDGE: usize = 6;
    pub const FOREHEAD: usize = 10;
    pub const CHIN: usize = 152;
    pub const LEFT_TEMPLE: usize = 127;
    pub const RIGHT_TEMPLE: usize = 356;
    pub const LEFT_JAW: usize = 172;
    pub const RIGHT_JAW: usize = 397;
}

/// One detection result: normalized x,y in [0,1] and z as relative depth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkFrame {
    points: Vec<Vec3>,
}

impl LandmarkFrame {
    pub fn new(points: Vec<Vec3>) -> Self {
        Self { points }
    }

    pub fn get(&self, index: usize) -> Option<Vec3> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }
}

impl From<Vec<Vec3>> for LandmarkFrame {
    fn from(points: Vec<Vec3>) -> Self {
        Self::new(points)
    }
}

/// Rigid placement of the overlay: position, orientation and uniform scale.
///
/// Used both for the per-detection target and for the smoothed pose that is
/// actually displayed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub orientation: Quat,
    pub scale: f32,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            scale: 1.0,
        }
    }
}

impl Pose {
    pub fn new(position: Vec3, orientation: Quat, scale: f32) -> Self {
        Self {
            position,
            orientation,
            scale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaceShapeCategory {
    Round,
    Square,
    Rectangular,
    Triangular,
    Oval,
}

impl FaceShapeCategory {
    pub const ALL: [FaceShapeCategory; 5] = [
        Self::Round,
        Self::Square,
        Self::Rectangular,
        Self::Triangular,
        Self::Oval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Round => "round",
            Self::Square => "square",
            Self::Rectangular => "rectangular",
            Self::Triangular => "triangular",
            Self::Oval => "oval",
        }
    }
}

impl std::fmt::Display for FaceShapeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A captured video frame handed to the landmark source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
    pub data: Vec<u8>,
}

/// Settings passed to the landmark source when it is initialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    pub max_faces: u32,
    pub refine_landmarks: bool,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            max_faces: 1,
            refine_landmarks: true,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}
