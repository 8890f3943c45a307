//! Capabilities the engine consumes but does not implement.
//!
//! Every method may block; the session runs them off the scheduling task and
//! routes results back before touching any shared state.

use anyhow::Result;

use crate::{DetectorOptions, ImageFrame, LandmarkFrame, Pose};

pub trait CaptureSource: Send + 'static {
    /// Acquire the device. Failure here is fatal for the session.
    fn open(&mut self) -> Result<()>;

    /// Latest frame, or `None` if the device has nothing new yet.
    fn frame(&mut self) -> Result<Option<ImageFrame>>;

    fn close(&mut self);
}

pub trait LandmarkSource: Send + 'static {
    fn initialize(&mut self, options: &DetectorOptions) -> Result<()>;

    /// Run detection on one image. `Ok(None)` means no face was found.
    fn detect(&mut self, image: &ImageFrame) -> Result<Option<LandmarkFrame>>;

    fn close(&mut self) {}
}

/// A loaded scene-graph node together with the GPU resources backing it.
pub trait SceneAsset: Send {
    fn transform(&self) -> Pose;

    fn set_transform(&mut self, pose: &Pose);

    fn depth_test(&self) -> bool;

    fn set_depth_test(&mut self, enabled: bool);

    /// Free geometry buffers and materials. Called exactly once per asset.
    fn release(&mut self);

    /// Bytes of resident geometry, for diagnostics.
    fn byte_size(&self) -> usize {
        0
    }
}

pub trait AssetLoader: Send + Sync + 'static {
    fn load(&self, path: &str) -> Result<Box<dyn SceneAsset>>;
}

pub trait Renderer: Send {
    fn render(&mut self, overlay: Option<&dyn SceneAsset>) -> Result<()>;
}
