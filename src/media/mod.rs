//! Media model shared between the stream and the writer
//!
//! Track descriptors, the per-track quality snapshot, and the writer seam.

pub mod track;
pub mod writer;

pub use track::{CodecId, MediaType, PacketFlags, Rational, Track, TrackQuality};
pub use writer::{ContainerWriter, WriterFactory, CONTAINER_FORMAT};
