//! recording.rs
//! Idle/Recording lifecycle driven by per-frame detection outcomes.
//!
//! - Idle → Recording: first non-empty detection. Opens a sink, persists a
//!   snapshot at the same timestamp, notifies text + photo.
//! - Recording: any non-empty detection refreshes `last_detection_at`; empty
//!   frames keep the session open while inside the cooldown window.
//! - Recording → Idle: `now - last_detection_at >= cooldown`. Finishes the
//!   sink and notifies with a link to the video.
//!
//! The open sink lives inside `RecordingSession`, and the machine holds at most
//! one `Option<RecordingSession>`: sink present ⇔ Recording, never two sessions.

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use log::{info, warn};

use crate::media::{
    frame::Frame,
    sink::{MediaSink, SinkFactory},
    store::{self, MediaKind, MediaStore},
};
use crate::notify::outbox::{Notification, Outbox};

pub const COOLDOWN: Duration = Duration::from_secs(5);

pub const RECORDING_STARTED_TEXT: &str = "Presence detected. Recording started.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    Idle,
    Recording,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    None,
    Started { video: String, photo: Option<String> },
    Stopped { video: String },
    /// Detection seen but the sink could not be opened; still Idle.
    StartFailed,
}

pub struct RecordingSession {
    sink: Box<dyn MediaSink>,
    started_at: Instant,
    last_detection_at: Instant,
    file_name: String,
    path: PathBuf,
    write_failed: bool,
}

pub struct RecordingStateMachine {
    session: Option<RecordingSession>,
    cooldown: Duration,
    sinks: Box<dyn SinkFactory>,
    store: MediaStore,
    outbox: Outbox,
    frame_size: (u32, u32),
    fps: u32,
}

impl RecordingStateMachine {
    pub fn new(
        sinks: impl SinkFactory + 'static,
        store: MediaStore,
        outbox: Outbox,
        frame_size: (u32, u32),
        fps: u32,
    ) -> Self {
        Self {
            session: None,
            cooldown: COOLDOWN,
            sinks: Box::new(sinks),
            store,
            outbox,
            frame_size,
            fps,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn state(&self) -> RecordingState {
        match self.session {
            Some(_) => RecordingState::Recording,
            None => RecordingState::Idle,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    pub fn current_file(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.file_name.as_str())
    }

    pub fn last_detection_at(&self) -> Option<Instant> {
        self.session.as_ref().map(|s| s.last_detection_at)
    }

    /// Feeds one frame's detection outcome, naming new artifacts by local time.
    pub fn observe(&mut self, detected: bool, frame: &Frame, now: Instant) -> Transition {
        self.observe_with(detected, frame, now, store::stamp_now)
    }

    /// As `observe`, with the artifact stamp supplied by the caller.
    /// `stamp` is only called on the Idle → Recording edge.
    pub fn observe_with(
        &mut self,
        detected: bool,
        frame: &Frame,
        now: Instant,
        stamp: impl FnOnce() -> String,
    ) -> Transition {
        match self.session.as_mut() {
            None if detected => self.start(frame, now, &stamp()),
            None => Transition::None,
            Some(session) if detected => {
                session.last_detection_at = now;
                Transition::None
            }
            Some(session) => {
                if now.saturating_duration_since(session.last_detection_at) >= self.cooldown {
                    self.stop()
                } else {
                    Transition::None
                }
            }
        }
    }

    /// Appends a frame to the open session; no-op while Idle.
    pub fn write_frame(&mut self, frame: &Frame) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if let Err(e) = session.sink.write_frame(frame) {
            if !session.write_failed {
                warn!("[Recorder] frame write to {} failed: {}", session.path.display(), e);
                session.write_failed = true;
            }
        }
    }

    /// Closes any open session without notifying. Used at teardown.
    pub fn close(&mut self) -> Option<String> {
        let session = self.session.take()?;
        let name = session.file_name.clone();
        finish_session(session);
        Some(name)
    }

    fn start(&mut self, frame: &Frame, now: Instant, stamp: &str) -> Transition {
        let video = MediaStore::file_name(MediaKind::Video, stamp);
        let path = self.store.path_for(MediaKind::Video, &video);

        let sink = match self.sinks.open(&path, self.frame_size, self.fps) {
            Ok(sink) => sink,
            Err(e) => {
                warn!("[Recorder] could not open sink, staying idle: {}", e);
                return Transition::StartFailed;
            }
        };

        info!("[Recorder] presence detected, recording to {}", path.display());
        self.session = Some(RecordingSession {
            sink,
            started_at: now,
            last_detection_at: now,
            file_name: video.clone(),
            path,
            write_failed: false,
        });

        let photo = match self.store.save_snapshot(frame, stamp) {
            Ok(name) => Some(name),
            Err(e) => {
                warn!("[Recorder] snapshot failed: {}", e);
                None
            }
        };

        self.outbox.text(RECORDING_STARTED_TEXT);
        if let Some(name) = &photo {
            self.outbox.photo(name.clone());
        }

        Transition::Started { video, photo }
    }

    fn stop(&mut self) -> Transition {
        let Some(session) = self.session.take() else {
            return Transition::None;
        };
        let video = session.file_name.clone();
        info!(
            "[Recorder] no detection for {:?}, stopped {} after {:.1}s",
            self.cooldown,
            video,
            session.started_at.elapsed().as_secs_f32()
        );
        finish_session(session);

        self.outbox.post(Notification::Video(video.clone()));
        Transition::Stopped { video }
    }
}

impl Drop for RecordingStateMachine {
    fn drop(&mut self) {
        self.close();
    }
}

fn finish_session(session: RecordingSession) {
    let path = session.path.display().to_string();
    if let Err(e) = session.sink.finish() {
        warn!("[Recorder] failed to finish {}: {}", path, e);
    }
}
