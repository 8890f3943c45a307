use crate::session::SessionState;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("Capture device unavailable: {0}")]
    CaptureUnavailable(String),
    #[error("Landmark detector failed to initialize: {0}")]
    DetectorInitFailure(String),
    #[error("Capture failed while tracking: {0}")]
    CaptureLost(String),
    #[error("Landmark detection failed: {0}")]
    DetectorFailed(String),
    #[error("Failed to load asset {path:?}: {reason}")]
    AssetLoadFailure { path: String, reason: String },
    #[error("Model manager is shut down, dropped request for {path:?}")]
    ModelManagerClosed { path: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Cannot {action} while session is {state:?}")]
    InvalidState {
        action: &'static str,
        state: SessionState,
    },
}

impl SessionError {
    /// Fatal errors end the session; the rest are reported and absorbed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::CaptureUnavailable(_)
                | Self::DetectorInitFailure(_)
                | Self::CaptureLost(_)
                | Self::DetectorFailed(_)
        )
    }
}
