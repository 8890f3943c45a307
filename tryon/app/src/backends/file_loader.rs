use anyhow::{Context, Result};
use api::{AssetLoader, Pose, SceneAsset};
use log::debug;
use std::path::PathBuf;

/// Reads asset files into memory. The bytes stand in for uploaded buffers.
#[derive(Debug, Clone)]
pub struct FileAssetLoader {
    root: PathBuf,
}

impl FileAssetLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetLoader for FileAssetLoader {
    fn load(&self, path: &str) -> Result<Box<dyn SceneAsset>> {
        let full_path = self.root.join(path.trim_start_matches('/'));
        let bytes = std::fs::read(&full_path)
            .with_context(|| format!("Failed to read asset {:?}", full_path))?;
        debug!("Read {} bytes from {:?}", bytes.len(), full_path);
        Ok(Box::new(FileAsset::new(path, bytes)))
    }
}

#[derive(Debug)]
pub struct FileAsset {
    name: String,
    bytes: Vec<u8>,
    transform: Pose,
    depth_test: bool,
}

impl FileAsset {
    pub fn new(name: &str, bytes: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            bytes,
            transform: Pose::default(),
            depth_test: true,
        }
    }
}

impl SceneAsset for FileAsset {
    fn transform(&self) -> Pose {
        self.transform
    }

    fn set_transform(&mut self, pose: &Pose) {
        self.transform = *pose;
    }

    fn depth_test(&self) -> bool {
        self.depth_test
    }

    fn set_depth_test(&mut self, enabled: bool) {
        self.depth_test = enabled;
    }

    fn release(&mut self) {
        debug!("Freeing {} bytes held by {:?}", self.bytes.len(), self.name);
        self.bytes = Vec::new();
    }

    fn byte_size(&self) -> usize {
        self.bytes.len()
    }
}
