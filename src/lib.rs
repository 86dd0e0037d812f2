//! Stream Recorder - records selected tracks of a live stream to disk.
//!
//! A [`RecordingSession`] writes into a temporary file while recording and,
//! on stop, moves it to a path built from a macro template such as
//! `/rec/${Application}/${Stream}_${StartTime:YYYYMMDDhhmmss}.ts`.

pub mod config;
pub mod media;
pub mod path;
pub mod recorder;
pub mod utils;

pub use config::{FilePublisherConfig, StreamContext, StreamIdentity};
pub use media::{ContainerWriter, PacketFlags, Track, TrackQuality, WriterFactory};
pub use recorder::{RecordingEvent, RecordingOutput, RecordingSession, RecordingState};
pub use utils::{RecordingError, RecordingResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the tracing subscriber.
///
/// Honors `RUST_LOG`, defaulting to debug output for this crate. Does nothing
/// if a global subscriber is already set.
pub fn init_tracing() {
    let installed = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stream_recorder=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Stream recorder v{}", env!("CARGO_PKG_VERSION"));
    }
}
