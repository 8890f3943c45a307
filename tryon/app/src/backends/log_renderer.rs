use anyhow::Result;
use api::{Pose, Renderer, SceneAsset};
use log::trace;

/// Logs what would be drawn each frame.
#[derive(Debug, Default)]
pub struct LogRenderer {
    frames: u64,
    last_transform: Option<Pose>,
}

impl LogRenderer {
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_transform(&self) -> Option<Pose> {
        self.last_transform
    }
}

impl Renderer for LogRenderer {
    fn render(&mut self, overlay: Option<&dyn SceneAsset>) -> Result<()> {
        self.frames += 1;
        self.last_transform = overlay.map(|asset| asset.transform());
        match self.last_transform {
            Some(pose) => trace!(
                "frame {}: overlay at {:?} scale {:.3}",
                self.frames,
                pose.position,
                pose.scale
            ),
            None => trace!("frame {}: no overlay", self.frames),
        }
        Ok(())
    }
}
