//! Recording session
//!
//! Drives one writer per recording: records the selected tracks into a temp
//! file, forwards packets while recording, and on stop moves the temp file to
//! its final path.

use super::state::{RecordingEvent, RecordingOutput, RecordingStarted, RecordingState};
use crate::config::StreamContext;
use crate::media::{ContainerWriter, PacketFlags, TrackQuality, WriterFactory, CONTAINER_FORMAT};
use crate::path::{ensure_directory, parent_dir, resolve, MacroContext};
use crate::utils::{RecordingError, RecordingResult};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Suffix marking a recording that has not been published yet
pub const TEMP_SUFFIX: &str = ".tmp";

/// Wall-clock source for time macros
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// One open recording. Shared with packet delivery through an `Arc`.
struct ActiveRecording {
    id: Uuid,
    temp_path: PathBuf,
    tracks: Vec<i32>,
    started_at: DateTime<Utc>,

    /// Taken by stop; late packets find `None` and are dropped
    writer: Mutex<Option<Box<dyn ContainerWriter>>>,

    packets_written: AtomicU64,
    packets_rejected: AtomicU64,
}

/// Records a live stream into a container file
pub struct RecordingSession {
    factory: Arc<dyn WriterFactory>,
    clock: Clock,

    /// Held only to clone or swap the handle, never across writer I/O
    active: RwLock<Option<Arc<ActiveRecording>>>,

    /// Serializes start and stop
    control: Mutex<()>,

    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingSession {
    /// Create an idle session using `factory` for its writers
    pub fn new(factory: impl WriterFactory + 'static) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            factory: Arc::new(factory),
            clock: Arc::new(|| Local::now().naive_local()),
            active: RwLock::new(None),
            control: Mutex::new(()),
            event_tx,
        }
    }

    /// Replace the wall-clock source used for time macros
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn state(&self) -> RecordingState {
        if self.active.read().is_some() {
            RecordingState::Recording
        } else {
            RecordingState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecordingState::Recording
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: RecordingEvent) {
        let _ = self.event_tx.send(event);
    }

    fn resolve_template(&self, template: &str, ctx: &StreamContext) -> String {
        let macros = MacroContext::new(&ctx.identity, (self.clock)());
        resolve(template, &macros)
    }

    /// Path the writer records into, resolved now
    pub fn temp_output_path(&self, ctx: &StreamContext) -> PathBuf {
        let mut path = self.resolve_template(&ctx.config.file_path, ctx);
        path.push_str(TEMP_SUFFIX);
        PathBuf::from(path)
    }

    /// Final recording path, resolved now
    pub fn output_path(&self, ctx: &StreamContext) -> PathBuf {
        PathBuf::from(self.resolve_template(&ctx.config.file_path, ctx))
    }

    /// Info/metadata path, resolved now
    pub fn info_output_path(&self, ctx: &StreamContext) -> PathBuf {
        PathBuf::from(self.resolve_template(&ctx.config.file_info_path, ctx))
    }

    fn provision(&self, file_path: &Path) -> RecordingResult<()> {
        let dir = parent_dir(file_path);
        ensure_directory(&dir).map_err(|source| {
            let err = RecordingError::Directory { path: dir, source };
            tracing::error!("{}", err);
            self.emit(RecordingEvent::Error(err.to_string()));
            err
        })
    }

    fn report_failure(&self, err: RecordingError) -> RecordingError {
        tracing::error!("{}", err);
        self.emit(RecordingEvent::Error(err.to_string()));
        err
    }

    /// Start recording.
    ///
    /// Only tracks listed in `selected_tracks` are recorded; an empty list
    /// records every track. A track the writer refuses is skipped and
    /// reported. Any other failure leaves the session idle.
    pub fn start_recording(
        &self,
        ctx: &StreamContext,
        selected_tracks: &[i32],
    ) -> RecordingResult<RecordingStarted> {
        let _control = self.control.lock();

        if self.active.read().is_some() {
            return Err(RecordingError::AlreadyRecording);
        }

        let temp_path = self.temp_output_path(ctx);
        tracing::debug!("Temp output path: {:?}", temp_path);

        self.provision(&temp_path)?;

        let mut writer = self.factory.create();
        if let Err(e) = writer.set_path(&temp_path, CONTAINER_FORMAT) {
            return Err(self.report_failure(RecordingError::WriterSetup {
                path: temp_path,
                reason: format!("{e:#}"),
            }));
        }

        let mut tracks = Vec::new();
        for track in ctx.tracks.values() {
            if !selected_tracks.is_empty() && !selected_tracks.contains(&track.id) {
                continue;
            }

            let quality = TrackQuality::from(track);
            match writer.add_track(track.media_type, track.id, &quality) {
                Ok(()) => tracks.push(track.id),
                Err(e) => {
                    let reason = format!("{e:#}");
                    tracing::warn!("Failed to add track {}: {}", track.id, reason);
                    self.emit(RecordingEvent::TrackRejected {
                        track_id: track.id,
                        reason,
                    });
                }
            }
        }

        if let Err(e) = writer.start() {
            return Err(self.report_failure(RecordingError::WriterStart(format!("{e:#}"))));
        }

        let active = Arc::new(ActiveRecording {
            id: Uuid::new_v4(),
            temp_path: temp_path.clone(),
            tracks: tracks.clone(),
            started_at: Utc::now(),
            writer: Mutex::new(Some(writer)),
            packets_written: AtomicU64::new(0),
            packets_rejected: AtomicU64::new(0),
        });
        let id = active.id;
        *self.active.write() = Some(active);

        self.emit(RecordingEvent::Started {
            id,
            temp_path: temp_path.clone(),
        });
        tracing::info!(
            "Recording {} started: {}/{} tracks={:?} -> {:?}",
            id,
            ctx.identity.application_name(),
            ctx.identity.stream,
            tracks,
            temp_path
        );

        Ok(RecordingStarted {
            id,
            temp_path,
            tracks,
        })
    }

    /// Forward one packet to the writer.
    ///
    /// Dropped silently when idle. A packet the writer refuses is reported and
    /// the recording continues.
    pub fn forward_packet(
        &self,
        track_id: i32,
        pts: i64,
        dts: i64,
        flags: PacketFlags,
        payload: &[u8],
    ) {
        let Some(active) = self.active.read().clone() else {
            return;
        };

        let mut guard = active.writer.lock();
        let Some(writer) = guard.as_mut() else {
            return;
        };

        match writer.put_data(track_id, pts, dts, flags, payload) {
            Ok(()) => {
                active.packets_written.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                active.packets_rejected.fetch_add(1, Ordering::Relaxed);
                let reason = format!("{e:#}");
                tracing::warn!("Failed to add packet for track {}: {}", track_id, reason);
                self.emit(RecordingEvent::PacketRejected { track_id, reason });
            }
        }
    }

    /// Stop recording and publish the file.
    ///
    /// Returns `Ok(None)` when nothing was recording. The session is idle
    /// afterwards whatever the outcome; if publishing fails the temp file stays
    /// where it is.
    pub fn stop_recording(&self, ctx: &StreamContext) -> RecordingResult<Option<RecordingOutput>> {
        let _control = self.control.lock();

        let Some(active) = self.active.write().take() else {
            return Ok(None);
        };

        let writer = active.writer.lock().take();
        let temp_path = match writer {
            Some(mut writer) => {
                if let Err(e) = writer.stop() {
                    tracing::warn!("Writer failed to finalize {:?}: {:#}", active.temp_path, e);
                }
                writer.path()
            }
            None => active.temp_path.clone(),
        };

        let output_path = self.output_path(ctx);
        let info_path = self.info_output_path(ctx);

        self.provision(&output_path)?;
        self.provision(&info_path)?;

        if let Err(source) = std::fs::rename(&temp_path, &output_path) {
            return Err(self.report_failure(RecordingError::Publish {
                from: temp_path,
                to: output_path,
                source,
            }));
        }

        let output = RecordingOutput {
            id: active.id,
            path: output_path,
            info_path,
            tracks: active.tracks.clone(),
            packets_written: active.packets_written.load(Ordering::Relaxed),
            packets_rejected: active.packets_rejected.load(Ordering::Relaxed),
            started_at: active.started_at,
            stopped_at: Utc::now(),
        };

        self.emit(RecordingEvent::Published {
            id: output.id,
            path: output.path.clone(),
        });
        tracing::info!(
            "Recording {} published: {:?} ({} packets, {}ms)",
            output.id,
            output.path,
            output.packets_written,
            output.duration_ms()
        );

        Ok(Some(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilePublisherConfig, StreamIdentity};
    use crate::media::writer::mock::{MockFailures, MockLog, MockWriter};
    use crate::media::{CodecId, MediaType, Track};
    use chrono::NaiveDate;
    use std::sync::atomic::AtomicUsize;
    use tempfile::{tempdir, TempDir};

    struct Harness {
        log: Arc<Mutex<MockLog>>,
        created: Arc<AtomicUsize>,
        now: Arc<Mutex<NaiveDateTime>>,
        session: RecordingSession,
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn harness(failures: MockFailures) -> Harness {
        let log = Arc::new(Mutex::new(MockLog::default()));
        let created = Arc::new(AtomicUsize::new(0));
        let now = Arc::new(Mutex::new(at(10, 0, 0)));

        let factory = {
            let log = log.clone();
            let created = created.clone();
            move || -> Box<dyn ContainerWriter> {
                created.fetch_add(1, Ordering::SeqCst);
                Box::new(MockWriter::new(log.clone(), failures.clone()))
            }
        };
        let clock = {
            let now = now.clone();
            move || *now.lock()
        };

        Harness {
            log,
            created,
            now,
            session: RecordingSession::new(factory).with_clock(clock),
        }
    }

    fn context(root: &Path, file_path: &str) -> StreamContext {
        let config = FilePublisherConfig {
            file_path: format!("{}/{}", root.display(), file_path),
            file_info_path: format!("{}/info/${{Stream}}.xml", root.display()),
        };

        StreamContext::new(StreamIdentity::new("default", "#default#live", "abc"), config)
            .with_track(Track::video(1, CodecId::H264, 1280, 720, 2_000_000))
            .with_track(Track::audio(2, CodecId::Aac, 48_000, 2, 128_000))
            .with_track(Track::video(3, CodecId::H265, 1920, 1080, 4_000_000))
    }

    fn default_context(dir: &TempDir) -> StreamContext {
        context(dir.path(), "${Application}/${Stream}_${StartTime:YYYYMMDD}.ts")
    }

    #[test]
    fn test_record_and_publish() {
        let dir = tempdir().unwrap();
        let ctx = default_context(&dir);
        let h = harness(MockFailures::default());

        let started = h.session.start_recording(&ctx, &[]).unwrap();
        assert!(h.session.is_recording());
        assert_eq!(started.temp_path, dir.path().join("live/abc_20240501.ts.tmp"));
        assert!(started.temp_path.exists());

        for i in 0..5 {
            h.session.forward_packet(1, i * 3000, i * 3000, PacketFlags::Key, b"video");
            h.session.forward_packet(2, i * 1024, i * 1024, PacketFlags::None, b"audio");
        }

        let output = h.session.stop_recording(&ctx).unwrap().unwrap();
        assert_eq!(h.session.state(), RecordingState::Idle);
        assert_eq!(output.path, dir.path().join("live/abc_20240501.ts"));
        assert_eq!(output.info_path, dir.path().join("info/abc.xml"));
        assert_eq!(output.packets_written, 10);
        assert_eq!(output.packets_rejected, 0);
        assert_eq!(output.id, started.id);

        assert!(output.path.exists());
        assert!(!started.temp_path.exists());
        assert!(dir.path().join("info").is_dir());
        assert_eq!(std::fs::read(&output.path).unwrap().len(), 50);

        let log = h.log.lock();
        assert_eq!(log.format.as_deref(), Some(CONTAINER_FORMAT));
        assert!(log.started && log.stopped);
        // Publish moves the file the writer reports, not a re-resolved path
        assert_eq!(log.path_reads, 1);
        assert_eq!(log.packets.len(), 10);
        assert_eq!(log.packets[0], (1, 0, 0, PacketFlags::Key, b"video".to_vec()));
    }

    #[test]
    fn test_selected_tracks_only() {
        let dir = tempdir().unwrap();
        let ctx = default_context(&dir);
        let h = harness(MockFailures::default());

        let started = h.session.start_recording(&ctx, &[2]).unwrap();
        assert_eq!(started.tracks, vec![2]);

        let log = h.log.lock();
        assert_eq!(log.tracks.len(), 1);
        let (media_type, id, quality) = &log.tracks[0];
        assert_eq!(*media_type, MediaType::Audio);
        assert_eq!(*id, 2);
        assert_eq!(quality.sample_rate, 48_000);
        assert_eq!(quality.channels, 2);
    }

    #[test]
    fn test_empty_selection_records_all_tracks() {
        let dir = tempdir().unwrap();
        let ctx = default_context(&dir);
        let h = harness(MockFailures::default());

        let started = h.session.start_recording(&ctx, &[]).unwrap();
        assert_eq!(started.tracks, vec![1, 2, 3]);

        let ids: Vec<i32> = h.log.lock().tracks.iter().map(|t| t.1).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let dir = tempdir().unwrap();
        let ctx = default_context(&dir);
        let h = harness(MockFailures::default());

        assert!(h.session.stop_recording(&ctx).unwrap().is_none());
        assert_eq!(h.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_directory_failure_leaves_session_idle() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("blocker"), b"x").unwrap();
        let ctx = context(dir.path(), "blocker/${Stream}.ts");
        let h = harness(MockFailures::default());
        let mut events = h.session.subscribe();

        let err = h.session.start_recording(&ctx, &[]).unwrap_err();
        assert!(matches!(err, RecordingError::Directory { .. }));
        assert_eq!(h.session.state(), RecordingState::Idle);
        assert_eq!(h.created.load(Ordering::SeqCst), 0);
        assert!(h.log.lock().path.is_none());
        assert!(matches!(events.try_recv(), Ok(RecordingEvent::Error(_))));
    }

    #[test]
    fn test_writer_setup_failure_leaves_session_idle() {
        let dir = tempdir().unwrap();
        let ctx = default_context(&dir);
        let h = harness(MockFailures {
            set_path: true,
            ..Default::default()
        });

        let err = h.session.start_recording(&ctx, &[]).unwrap_err();
        assert!(matches!(err, RecordingError::WriterSetup { .. }));
        assert!(!h.session.is_recording());
        assert!(h.log.lock().tracks.is_empty());
    }

    #[test]
    fn test_writer_start_failure_leaves_session_idle() {
        let dir = tempdir().unwrap();
        let ctx = default_context(&dir);
        let h = harness(MockFailures {
            start: true,
            ..Default::default()
        });

        let err = h.session.start_recording(&ctx, &[]).unwrap_err();
        assert!(matches!(err, RecordingError::WriterStart(_)));
        assert!(!h.session.is_recording());

        // Packets after a failed start go nowhere
        h.session.forward_packet(1, 0, 0, PacketFlags::Key, b"video");
        assert!(h.log.lock().packets.is_empty());
    }

    #[test]
    fn test_rejected_track_is_skipped() {
        let dir = tempdir().unwrap();
        let ctx = default_context(&dir);
        let h = harness(MockFailures {
            reject_track: Some(3),
            ..Default::default()
        });
        let mut events = h.session.subscribe();

        let started = h.session.start_recording(&ctx, &[]).unwrap();
        assert_eq!(started.tracks, vec![1, 2]);
        assert!(h.session.is_recording());

        match events.try_recv().unwrap() {
            RecordingEvent::TrackRejected { track_id, .. } => assert_eq!(track_id, 3),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(matches!(events.try_recv(), Ok(RecordingEvent::Started { .. })));
    }

    #[test]
    fn test_rejected_packet_does_not_stop_recording() {
        let dir = tempdir().unwrap();
        let ctx = default_context(&dir);
        let h = harness(MockFailures {
            reject_packet_track: Some(9),
            ..Default::default()
        });

        h.session.start_recording(&ctx, &[]).unwrap();
        let mut events = h.session.subscribe();

        h.session.forward_packet(9, 0, 0, PacketFlags::None, b"bad");
        h.session.forward_packet(1, 0, 0, PacketFlags::Key, b"good");
        assert!(h.session.is_recording());
        assert!(matches!(
            events.try_recv(),
            Ok(RecordingEvent::PacketRejected { track_id: 9, .. })
        ));

        let output = h.session.stop_recording(&ctx).unwrap().unwrap();
        assert_eq!(output.packets_written, 1);
        assert_eq!(output.packets_rejected, 1);
    }

    #[test]
    fn test_packets_dropped_when_idle() {
        let h = harness(MockFailures::default());

        h.session.forward_packet(1, 0, 0, PacketFlags::Key, b"video");
        assert!(h.log.lock().packets.is_empty());
    }

    #[test]
    fn test_start_while_recording_is_rejected() {
        let dir = tempdir().unwrap();
        let ctx = default_context(&dir);
        let h = harness(MockFailures::default());

        h.session.start_recording(&ctx, &[]).unwrap();
        let err = h.session.start_recording(&ctx, &[]).unwrap_err();
        assert!(matches!(err, RecordingError::AlreadyRecording));
        assert_eq!(h.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_time_macros_use_stop_time_for_final_path() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path(), "${Stream}_${StartTime:hhmmss}.ts");
        let h = harness(MockFailures::default());

        let started = h.session.start_recording(&ctx, &[]).unwrap();
        assert_eq!(started.temp_path, dir.path().join("abc_100000.ts.tmp"));

        *h.now.lock() = at(10, 0, 5);
        let output = h.session.stop_recording(&ctx).unwrap().unwrap();
        assert_eq!(output.path, dir.path().join("abc_100005.ts"));
        assert!(output.path.exists());
        assert!(!started.temp_path.exists());
    }

    #[test]
    fn test_publish_failure_keeps_temp_file() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path(), "${Stream}.ts");
        let h = harness(MockFailures::default());

        let started = h.session.start_recording(&ctx, &[]).unwrap();
        h.session.forward_packet(1, 0, 0, PacketFlags::Key, b"video");

        // Block the final path's directory with a regular file
        let blocked = StreamContext {
            config: FilePublisherConfig {
                file_path: format!("{}/blocker/${{Stream}}.ts", dir.path().display()),
                ..ctx.config.clone()
            },
            ..ctx.clone()
        };
        std::fs::write(dir.path().join("blocker"), b"x").unwrap();

        let err = h.session.stop_recording(&blocked).unwrap_err();
        assert!(matches!(err, RecordingError::Directory { .. }));
        assert!(started.temp_path.exists());
        assert!(!h.session.is_recording());
        assert!(h.log.lock().stopped);
    }

    #[test]
    fn test_rename_failure_keeps_temp_file() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path(), "${Stream}.ts");
        let h = harness(MockFailures::default());

        let started = h.session.start_recording(&ctx, &[]).unwrap();

        // A non-empty directory at the final path cannot be replaced by a file
        let target = dir.path().join("abc.ts");
        std::fs::create_dir_all(target.join("occupied")).unwrap();

        let err = h.session.stop_recording(&ctx).unwrap_err();
        assert!(matches!(err, RecordingError::Publish { .. }));
        assert!(started.temp_path.exists());
    }

    #[test]
    fn test_session_restarts_after_stop() {
        let dir = tempdir().unwrap();
        let ctx = context(dir.path(), "${Stream}_${StartTime:hhmmss}.ts");
        let h = harness(MockFailures::default());

        h.session.start_recording(&ctx, &[]).unwrap();
        let first = h.session.stop_recording(&ctx).unwrap().unwrap();

        *h.now.lock() = at(11, 0, 0);
        h.session.start_recording(&ctx, &[1]).unwrap();
        let second = h.session.stop_recording(&ctx).unwrap().unwrap();

        assert_ne!(first.id, second.id);
        assert!(first.path.exists());
        assert!(second.path.exists());
        assert_eq!(h.created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_forward_during_stop() {
        let dir = tempdir().unwrap();
        let ctx = default_context(&dir);
        let h = harness(MockFailures::default());

        h.session.start_recording(&ctx, &[]).unwrap();

        let output = std::thread::scope(|s| {
            for track_id in 1..=3 {
                let session = &h.session;
                s.spawn(move || {
                    for i in 0..500 {
                        session.forward_packet(track_id, i, i, PacketFlags::None, b"x");
                    }
                });
            }
            h.session.stop_recording(&ctx).unwrap().unwrap()
        });

        // Everything the writer accepted made it into the published file
        let written = std::fs::read(&output.path).unwrap().len() as u64;
        assert_eq!(written, output.packets_written);
        assert!(!h.session.is_recording());
    }
}
