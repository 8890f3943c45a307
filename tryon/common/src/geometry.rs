//! Pose targets and face-shape ratios derived from a single landmark frame.
//!
//! Everything here is a pure function of the frame and the configuration.

use api::{LandmarkFrame, Pose};
use glam::{Mat3, Quat, Vec3};

use crate::config::{LandmarkLayout, PlacementConfig, ScaleConfig, TryOnConfig};
use crate::ExtractError;

/// The named landmarks the pipeline reads out of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacePoints {
    pub left_eye: Vec3,
    pub right_eye: Vec3,
    pub nose: Vec3,
    pub chin: Vec3,
    pub forehead: Vec3,
    pub left_temple: Vec3,
    pub right_temple: Vec3,
    pub left_jaw: Vec3,
    pub right_jaw: Vec3,
}

impl FacePoints {
    pub fn from_frame(frame: &LandmarkFrame, layout: &LandmarkLayout) -> Result<Self, ExtractError> {
        let pick = |index: usize| {
            frame.get(index).ok_or(ExtractError::MissingLandmarks {
                index,
                len: frame.len(),
            })
        };

        let points = Self {
            left_eye: pick(layout.left_eye)?,
            right_eye: pick(layout.right_eye)?,
            nose: pick(layout.nose)?,
            chin: pick(layout.chin)?,
            forehead: pick(layout.forehead)?,
            left_temple: pick(layout.left_temple)?,
            right_temple: pick(layout.right_temple)?,
            left_jaw: pick(layout.left_jaw)?,
            right_jaw: pick(layout.right_jaw)?,
        };

        if !points.is_finite() {
            return Err(ExtractError::DegenerateGeometry("non-finite landmark"));
        }
        Ok(points)
    }

    fn is_finite(&self) -> bool {
        [
            self.left_eye,
            self.right_eye,
            self.nose,
            self.chin,
            self.forehead,
            self.left_temple,
            self.right_temple,
            self.left_jaw,
            self.right_jaw,
        ]
        .iter()
        .all(|p| p.is_finite())
    }

    pub fn eye_center(&self) -> Vec3 {
        (self.left_eye + self.right_eye) * 0.5
    }

    /// Distance between the eye corners in the image plane.
    pub fn eye_distance(&self) -> f32 {
        planar_distance(self.left_eye, self.right_eye)
    }
}

/// Inputs to the face-shape classifier, all measured in the image plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceShapeRatios {
    pub face_width: f32,
    pub face_length: f32,
    pub jaw_width: f32,
}

impl FaceShapeRatios {
    pub fn from_points(points: &FacePoints) -> Self {
        Self {
            face_width: planar_distance(points.left_temple, points.right_temple),
            face_length: planar_distance(points.chin, points.forehead),
            jaw_width: planar_distance(points.left_jaw, points.right_jaw),
        }
    }
}

fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    a.truncate().distance(b.truncate())
}

/// Eye distance relative to the reference, clamped to `[min_scale, max_scale]`.
pub fn target_scale(eye_distance: f32, config: &ScaleConfig) -> f32 {
    let raw = eye_distance / config.reference_eye_distance * config.calibration_factor;
    raw.max(config.min_scale).min(config.max_scale)
}

pub fn target_position(points: &FacePoints, config: &PlacementConfig) -> Vec3 {
    let eye_center = points.eye_center();
    let vertical_offset =
        (points.nose.y - eye_center.y) * config.nose_offset_gain + config.vertical_bias;

    Vec3::new(
        -(eye_center.x - 0.5) * config.horizontal_gain,
        -(eye_center.y - 0.5) * config.vertical_gain + vertical_offset,
        config.depth_bias - eye_center.z * config.depth_gain,
    )
}

/// Orthonormal face frame (eye axis, nose-chin axis, their cross product)
/// rotated into model space by the configured correction.
pub fn target_orientation(points: &FacePoints, config: &PlacementConfig) -> Result<Quat, ExtractError> {
    let face_axis = (points.right_eye - points.left_eye)
        .try_normalize()
        .ok_or(ExtractError::DegenerateGeometry("eye corners coincide"))?;
    let up_axis = (points.nose - points.chin)
        .try_normalize()
        .ok_or(ExtractError::DegenerateGeometry("nose and chin coincide"))?;
    let forward = face_axis
        .cross(up_axis)
        .try_normalize()
        .ok_or(ExtractError::DegenerateGeometry("eye axis parallel to nose-chin axis"))?;
    let up_axis = forward.cross(face_axis);

    let basis = Quat::from_mat3(&Mat3::from_cols(face_axis, up_axis, forward));
    Ok((basis * correction_rotation(config)).normalize())
}

pub fn correction_rotation(config: &PlacementConfig) -> Quat {
    Quat::from_rotation_x(config.correction_pitch - config.downward_tilt)
}

/// Everything one detection contributes: the pose to chase and the shape ratios.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extraction {
    pub target: Pose,
    pub ratios: FaceShapeRatios,
}

#[derive(Debug, Clone, Default)]
pub struct GeometryExtractor {
    layout: LandmarkLayout,
    scale: ScaleConfig,
    placement: PlacementConfig,
}

impl GeometryExtractor {
    pub fn new(config: &TryOnConfig) -> Self {
        Self {
            layout: config.layout.clone(),
            scale: config.scale.clone(),
            placement: config.placement.clone(),
        }
    }

    pub fn layout(&self) -> &LandmarkLayout {
        &self.layout
    }

    pub fn extract(&self, frame: &LandmarkFrame) -> Result<Extraction, ExtractError> {
        let points = FacePoints::from_frame(frame, &self.layout)?;
        Ok(Extraction {
            target: self.pose_target(&points)?,
            ratios: FaceShapeRatios::from_points(&points),
        })
    }

    pub fn pose_target(&self, points: &FacePoints) -> Result<Pose, ExtractError> {
        Ok(Pose {
            position: target_position(points, &self.placement),
            orientation: target_orientation(points, &self.placement)?,
            scale: target_scale(points.eye_distance(), &self.scale),
        })
    }
}
