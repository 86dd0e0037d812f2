//! Stream-to-file recording
//!
//! - RecordingSession drives the writer lifecycle: temp-path recording,
//!   packet forwarding, and publish on stop
//! - RecordingState / RecordingEvent report what the session is doing

pub mod session;
pub mod state;

pub use session::{Clock, RecordingSession, TEMP_SUFFIX};
pub use state::{RecordingEvent, RecordingOutput, RecordingStarted, RecordingState};
