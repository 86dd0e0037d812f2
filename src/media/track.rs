//! Track descriptors
//!
//! Read-only descriptions of the elementary streams carried by a live stream.

use serde::{Deserialize, Serialize};

/// Kind of elementary stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Video,
    Audio,
    Data,
}

/// Codec carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    H264,
    H265,
    Vp8,
    Vp9,
    Aac,
    Opus,
    Mp3,
    Unknown,
}

/// Rational number, used for time bases (e.g. 1/90000)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub num: i32,
    pub den: i32,
}

impl Rational {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }
}

/// Per-packet flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketFlags {
    #[default]
    None,
    /// Packet starts a keyframe / random access point
    Key,
}

/// Live descriptor of one track, owned by the stream
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: i32,
    pub media_type: MediaType,
    pub codec_id: CodecId,
    /// Bits per second
    pub bitrate: i32,
    pub time_base: Rational,
    pub width: i32,
    pub height: i32,
    /// Audio sample rate in Hz
    pub sample_rate: i32,
    /// Audio channel count
    pub channels: u32,
}

impl Track {
    /// Create a video track descriptor
    pub fn video(id: i32, codec_id: CodecId, width: i32, height: i32, bitrate: i32) -> Self {
        Self {
            id,
            media_type: MediaType::Video,
            codec_id,
            bitrate,
            time_base: Rational::new(1, 90_000),
            width,
            height,
            sample_rate: 0,
            channels: 0,
        }
    }

    /// Create an audio track descriptor
    pub fn audio(id: i32, codec_id: CodecId, sample_rate: i32, channels: u32, bitrate: i32) -> Self {
        Self {
            id,
            media_type: MediaType::Audio,
            codec_id,
            bitrate,
            time_base: Rational::new(1, sample_rate),
            width: 0,
            height: 0,
            sample_rate,
            channels,
        }
    }
}

/// Per-track configuration handed to the writer.
///
/// Built fresh from the live [`Track`] every time a recording starts, and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackQuality {
    pub codec_id: CodecId,
    pub bitrate: i32,
    pub time_base: Rational,
    pub width: i32,
    pub height: i32,
    pub sample_rate: i32,
    pub channels: u32,
}

impl From<&Track> for TrackQuality {
    fn from(track: &Track) -> Self {
        Self {
            codec_id: track.codec_id,
            bitrate: track.bitrate,
            time_base: track.time_base,
            width: track.width,
            height: track.height,
            sample_rate: track.sample_rate,
            channels: track.channels,
        }
    }
}
