use anyhow::{bail, Context, Result};
use api::{landmarks, DetectorOptions};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Which face-mesh indices feed the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LandmarkLayout {
    pub left_eye: usize,
    pub right_eye: usize,
    pub nose: usize,
    pub chin: usize,
    pub forehead: usize,
    pub left_temple: usize,
    pub right_temple: usize,
    pub left_jaw: usize,
    pub right_jaw: usize,
}

impl Default for LandmarkLayout {
    fn default() -> Self {
        Self {
            left_eye: landmarks::LEFT_EYE_CORNER,
            right_eye: landmarks::RIGHT_EYE_CORNER,
            nose: landmarks::NOSE_BRIDGE,
            chin: landmarks::CHIN,
            forehead: landmarks::FOREHEAD,
            left_temple: landmarks::LEFT_TEMPLE,
            right_temple: landmarks::RIGHT_TEMPLE,
            left_jaw: landmarks::LEFT_JAW,
            right_jaw: landmarks::RIGHT_JAW,
        }
    }
}

impl LandmarkLayout {
    /// Smallest frame length that contains every configured index.
    pub fn required_len(&self) -> usize {
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
        .into_iter()
        .max()
        .map_or(0, |max| max + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleConfig {
    pub reference_eye_distance: f32,
    pub calibration_factor: f32,
    pub min_scale: f32,
    pub max_scale: f32,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            reference_eye_distance: 0.06,
            calibration_factor: 1.0,
            min_scale: 0.2,
            max_scale: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub horizontal_gain: f32,
    pub vertical_gain: f32,
    /// Applied to `nose.y - eye_center.y` to pull the anchor up to eye level.
    pub nose_offset_gain: f32,
    pub vertical_bias: f32,
    pub depth_gain: f32,
    pub depth_bias: f32,
    /// Rotation about X mapping detector space into model space, radians.
    pub correction_pitch: f32,
    /// Subtracted from `correction_pitch`, radians.
    pub downward_tilt: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            horizontal_gain: 20.0,
            vertical_gain: 5.0,
            nose_offset_gain: -8.0,
            vertical_bias: -0.3,
            depth_gain: 5.0,
            depth_bias: 0.0,
            correction_pitch: std::f32::consts::PI,
            downward_tilt: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub position_factor: f32,
    pub orientation_factor: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            position_factor: 0.2,
            orientation_factor: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaceShapeThresholds {
    /// `length / width` at or above this is rectangular.
    pub rectangular_ratio: f32,
    /// Fraction of face length within which length and width count as equal.
    pub round_tolerance: f32,
    /// Jaw wider than this fraction of face width is square.
    pub square_jaw_ratio: f32,
    /// Jaw narrower than this fraction of face width is triangular.
    pub triangular_jaw_ratio: f32,
    /// Majority-vote window over recent detections. 1 keeps raw per-frame results.
    pub vote_window: usize,
}

impl Default for FaceShapeThresholds {
    fn default() -> Self {
        Self {
            rectangular_ratio: 1.5,
            round_tolerance: 0.1,
            square_jaw_ratio: 0.9,
            triangular_jaw_ratio: 0.8,
            vote_window: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_scale: f32,
    pub user_scale_factor: f32,
    pub reduction_factor: f32,
    /// Asset loaded when the session starts, if any.
    pub initial_model: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_scale: 0.3,
            user_scale_factor: 1.0,
            reduction_factor: 1.0,
            initial_model: None,
        }
    }
}

impl ModelConfig {
    pub fn initial_scale(&self) -> f32 {
        self.base_scale * self.user_scale_factor * self.reduction_factor
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_fps: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_fps: 60.0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TryOnConfig {
    pub layout: LandmarkLayout,
    pub scale: ScaleConfig,
    pub placement: PlacementConfig,
    pub smoothing: SmoothingConfig,
    pub face_shape: FaceShapeThresholds,
    pub detector: DetectorOptions,
    pub model: ModelConfig,
    pub session: SessionConfig,
}

impl TryOnConfig {
    pub fn validate(&self) -> Result<()> {
        let in_unit = |f: f32| f > 0.0 && f <= 1.0;
        if !in_unit(self.smoothing.position_factor) {
            bail!(
                "smoothing.position_factor must be in (0, 1], got {}",
                self.smoothing.position_factor
            );
        }
        if !in_unit(self.smoothing.orientation_factor) {
            bail!(
                "smoothing.orientation_factor must be in (0, 1], got {}",
                self.smoothing.orientation_factor
            );
        }
        if self.scale.reference_eye_distance.is_nan() || self.scale.reference_eye_distance <= 0.0 {
            bail!(
                "scale.reference_eye_distance must be positive, got {}",
                self.scale.reference_eye_distance
            );
        }
        if self.scale.min_scale > self.scale.max_scale {
            bail!(
                "scale.min_scale ({}) exceeds scale.max_scale ({})",
                self.scale.min_scale,
                self.scale.max_scale
            );
        }
        if self.face_shape.vote_window == 0 {
            bail!("face_shape.vote_window must be at least 1");
        }
        if !self.session.max_fps.is_finite() || self.session.max_fps <= 0.0 {
            bail!("session.max_fps must be positive and finite, got {}", self.session.max_fps);
        }
        Ok(())
    }

    /// Read the config at `path`, writing the defaults there first if it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading config from {:?}", path);
            let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
            let config: Self = serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("Failed to parse {:?}", path))?;
            config.validate()?;
            Ok(config)
        } else {
            info!("Config not found. Creating default at {:?}", path);
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config dir: {:?}", parent))?;
            }
        }
        let file = File::create(path).context("Failed to create config file")?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)
            .context("Failed to serialize config")?;
        Ok(())
    }
}
