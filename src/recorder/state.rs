//! Recording state management
//!
//! Defines the session state machine, status events, and recording results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Current state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No writer, packets are discarded
    #[default]
    Idle,
    /// A writer is open and receiving packets
    Recording,
}

/// Status events emitted by a recording session.
///
/// Best-effort failures (a rejected track or packet) do not stop the
/// recording; they are reported here so callers can observe them.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    /// Writer started on the temp path
    Started { id: Uuid, temp_path: PathBuf },
    /// Writer refused a track; the other tracks are still recorded
    TrackRejected { track_id: i32, reason: String },
    /// Writer refused a packet; recording continues
    PacketRejected { track_id: i32, reason: String },
    /// Temp file moved to its final path
    Published { id: Uuid, path: PathBuf },
    /// Start or publish failed
    Error(String),
}

/// Returned by a successful start
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStarted {
    pub id: Uuid,

    /// File the writer records into until publish
    pub temp_path: PathBuf,

    /// Track ids the writer accepted
    pub tracks: Vec<i32>,
}

/// Result of a completed recording
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingOutput {
    pub id: Uuid,

    /// Final, user-visible path of the recording
    pub path: PathBuf,

    /// Path reserved for the info/metadata file
    pub info_path: PathBuf,

    pub tracks: Vec<i32>,

    /// Packets accepted by the writer
    pub packets_written: u64,

    /// Packets the writer refused
    pub packets_rejected: u64,

    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
}

impl RecordingOutput {
    /// Wall-clock duration of the recording in milliseconds
    pub fn duration_ms(&self) -> i64 {
        (self.stopped_at - self.started_at).num_milliseconds()
    }
}
