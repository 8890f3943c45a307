pub mod backends;
pub mod error;
pub mod overlay;
pub mod session;

pub use error::SessionError;
pub use overlay::{LoadOutcome, LoadTicket, OverlayModel, OverlayModelManager};
pub use session::{ControlCommand, OverlayControl, SessionState, SessionStats, TrackingSession};
