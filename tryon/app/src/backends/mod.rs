//! Stand-ins for the external capabilities so the binary runs without a
//! camera, a detector model or a GPU.

pub mod file_loader;
pub mod log_renderer;
pub mod replay;

pub use file_loader::{FileAsset, FileAssetLoader};
pub use log_renderer::LogRenderer;
pub use replay::{replay_pair, LandmarkRecording, ReplayCapture, ReplayDetector};
