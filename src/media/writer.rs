//! Container writer seam
//!
//! The muxer that serializes packets into an on-disk container lives outside
//! this crate. The recorder drives it through [`ContainerWriter`].

use super::track::{MediaType, PacketFlags, TrackQuality};
use std::path::{Path, PathBuf};

/// Container format used for in-progress recordings
pub const CONTAINER_FORMAT: &str = "mpegts";

/// A binary muxer producing one container file.
///
/// Call order is `set_path`, any number of `add_track`, `start`, any number of
/// `put_data`, then `stop`. After `stop` returns, every packet accepted by
/// `put_data` must be durably written.
pub trait ContainerWriter: Send {
    /// Set the output file and container format
    fn set_path(&mut self, path: &Path, format: &str) -> anyhow::Result<()>;

    /// Register a track with the writer
    fn add_track(
        &mut self,
        media_type: MediaType,
        track_id: i32,
        quality: &TrackQuality,
    ) -> anyhow::Result<()>;

    /// Open the output and write the container header
    fn start(&mut self) -> anyhow::Result<()>;

    /// Write one timestamped packet
    fn put_data(
        &mut self,
        track_id: i32,
        pts: i64,
        dts: i64,
        flags: PacketFlags,
        payload: &[u8],
    ) -> anyhow::Result<()>;

    /// Finalize and flush the output
    fn stop(&mut self) -> anyhow::Result<()>;

    /// Output path configured with `set_path`
    fn path(&self) -> PathBuf;
}

/// Creates a fresh writer for every recording
pub trait WriterFactory: Send + Sync {
    fn create(&self) -> Box<dyn ContainerWriter>;
}

impl<F> WriterFactory for F
where
    F: Fn() -> Box<dyn ContainerWriter> + Send + Sync,
{
    fn create(&self) -> Box<dyn ContainerWriter> {
        self()
    }
}
