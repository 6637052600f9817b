//! Session lifecycle: shared task flags, notification handlers and the
//! orchestrator that runs them.

pub mod handlers;
pub mod orchestrator;
pub mod state;

pub use handlers::{BikeHandler, BikeStatus, HeartHandler, HeartStatus, ResistanceSource};
pub use orchestrator::{
    DisplayFeed, Session, SessionError, SessionMode, SessionOutcome, SessionTiming,
};
pub use state::{LoopStatus, SessionState, TaskId};
