pub use api::{FaceShapeCategory, LandmarkFrame, Pose};

pub mod config;
mod face_shape;
pub mod geometry;
mod smoothing;

pub use config::TryOnConfig;
pub use face_shape::{classify, FaceShapeVote};
pub use geometry::{Extraction, FaceShapeRatios, GeometryExtractor};
pub use smoothing::{ease_lerp, ease_lerp_vec3, PoseSmoother};

/// Why a frame produced no usable face this tick. Both cases are transient:
/// the caller keeps the last pose and face shape.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("Landmark {index} missing from frame of {len} points")]
    MissingLandmarks { index: usize, len: usize },
    #[error("Degenerate landmark geometry: {0}")]
    DegenerateGeometry(&'static str),
}
