use api::Pose;
use glam::Vec3;

use crate::config::SmoothingConfig;

/// Interpolate with weight `1 - (1 - factor)^3`, which closes the gap faster
/// than a plain lerp while still damping one-frame outliers.
pub fn ease_lerp(start: f32, end: f32, factor: f32) -> f32 {
    let t = 1.0 - (1.0 - factor).powi(3);
    start + (end - start) * t
}

pub fn ease_lerp_vec3(start: Vec3, end: Vec3, factor: f32) -> Vec3 {
    Vec3::new(
        ease_lerp(start.x, end.x, factor),
        ease_lerp(start.y, end.y, factor),
        ease_lerp(start.z, end.z, factor),
    )
}

/// Holds the displayed pose and moves it toward each new target.
///
/// Position is eased per axis, orientation is slerped with its own (smaller)
/// factor, scale is taken from the target as-is.
#[derive(Debug, Clone)]
pub struct PoseSmoother {
    position_factor: f32,
    orientation_factor: f32,
    displayed: Pose,
    initialized: bool,
}

impl Default for PoseSmoother {
    fn default() -> Self {
        Self::new(&SmoothingConfig::default())
    }
}

impl PoseSmoother {
    pub fn new(config: &SmoothingConfig) -> Self {
        Self {
            position_factor: config.position_factor,
            orientation_factor: config.orientation_factor,
            displayed: Pose::default(),
            initialized: false,
        }
    }

    /// Step toward `target`. With `None` the displayed pose is left untouched.
    pub fn update(&mut self, target: Option<&Pose>) -> Option<Pose> {
        if let Some(target) = target {
            let current = &mut self.displayed;
            current.position = ease_lerp_vec3(current.position, target.position, self.position_factor);
            current.orientation = current
                .orientation
                .slerp(target.orientation, self.orientation_factor)
                .normalize();
            current.scale = target.scale;
            self.initialized = true;
        }
        self.displayed()
    }

    /// The displayed pose, or `None` until the first target has been seen.
    pub fn displayed(&self) -> Option<Pose> {
        self.initialized.then_some(self.displayed)
    }

    pub fn reset(&mut self) {
        self.displayed = Pose::default();
        self.initialized = false;
    }
}
