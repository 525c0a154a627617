//! # Sensing Loop
//!
//! One iteration per captured frame:
//! 1. Shutdown (button or remote flag): stop the command server, exit
//! 2. Read a frame; a capture failure is fatal
//! 3. Serve a pending photo request, whatever the monitoring state
//! 4. Debounced monitor-toggle button flips monitoring and notifies
//! 5. Paused: LEDs off, sleep, next iteration
//! 6. Detection on cadence (cached in between)
//! 7. Recording state machine and presence LED
//! 8. Overlay, write to the open session, yield
//!
//! The loop exclusively owns every composite piece of state (session, cached
//! boxes, debouncer); only `ControlState` is shared with the server.

use std::{
    thread,
    time::{Duration, Instant},
};

use log::{error, info, warn};
use spin_sleep::SpinSleeper;

use crate::control::{debounce::Debouncer, state::SharedControl};
use crate::hardware::{gpio::DigitalIo, indicators::IndicatorPanel};
use crate::media::{
    capture::FrameSource,
    frame::{IDLE_COLOR, RECORDING_COLOR, draw_boxes},
    store::{self, MediaStore},
};
use crate::monitor::{
    detection::{DetectionCadence, Detector},
    recording::RecordingStateMachine,
};
use crate::notify::outbox::Outbox;
use crate::server::http::ServerHandle;

pub const TICK: Duration = Duration::from_millis(1);
pub const PAUSE: Duration = Duration::from_millis(500);

pub const MONITORING_STOPPED_TEXT: &str = "Monitoring stopped from the camera button.";
pub const MONITORING_RESUMED_TEXT: &str = "Monitoring resumed from the camera button.";
pub const SHUTDOWN_TEXT: &str = "The camera program is shutting down.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    ShutdownRequested,
    ButtonPressed,
    CaptureFailed,
}

pub struct SensingLoop<S: FrameSource, D: Detector, G: DigitalIo> {
    control: SharedControl,
    source: S,
    cadence: DetectionCadence<D>,
    recorder: RecordingStateMachine,
    store: MediaStore,
    outbox: Outbox,
    panel: IndicatorPanel<G>,
    toggle: Debouncer,
    server: Option<ServerHandle>,
    frame_index: u64,
    paused: bool,
    sleeper: SpinSleeper,
    tick: Duration,
    pause: Duration,
}

impl<S: FrameSource, D: Detector, G: DigitalIo> SensingLoop<S, D, G> {
    pub fn new(
        control: SharedControl,
        source: S,
        cadence: DetectionCadence<D>,
        recorder: RecordingStateMachine,
        store: MediaStore,
        outbox: Outbox,
        panel: IndicatorPanel<G>,
    ) -> Self {
        Self {
            control,
            source,
            cadence,
            recorder,
            store,
            outbox,
            panel,
            toggle: Debouncer::default(),
            server: None,
            frame_index: 0,
            paused: false,
            sleeper: SpinSleeper::default(),
            tick: TICK,
            pause: PAUSE,
        }
    }

    /// Server stopped and joined when the loop ends.
    pub fn with_server(mut self, server: ServerHandle) -> Self {
        self.server = Some(server);
        self
    }

    pub fn with_timing(mut self, tick: Duration, pause: Duration) -> Self {
        self.tick = tick;
        self.pause = pause;
        self
    }

    pub fn with_debouncer(mut self, toggle: Debouncer) -> Self {
        self.toggle = toggle;
        self
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn recorder(&self) -> &RecordingStateMachine {
        &self.recorder
    }

    /// Runs until an exit condition, then tears everything down.
    pub fn run(mut self) -> ExitReason {
        info!("[Sensing] loop started");
        let reason = loop {
            if let Some(reason) = self.step() {
                break reason;
            }
        };
        info!("[Sensing] loop exiting: {:?}", reason);
        self.teardown();
        reason
    }

    /// One iteration. `Some` means the loop must end.
    pub fn step(&mut self) -> Option<ExitReason> {
        if self.panel.shutdown_pressed() {
            info!("[Sensing] shutdown button pressed");
            self.stop_server();
            return Some(ExitReason::ButtonPressed);
        }
        if self.control.is_shutdown_requested() {
            self.stop_server();
            return Some(ExitReason::ShutdownRequested);
        }

        let mut frame = match self.source.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("[Sensing] frame capture failed: {}", e);
                return Some(ExitReason::CaptureFailed);
            }
        };

        if self.control.consume_photo_request() {
            match self.store.save_snapshot(&frame, &store::stamp_now()) {
                Ok(name) => {
                    info!("[Sensing] photo {} taken on request", name);
                    self.outbox.photo(name);
                }
                Err(e) => warn!("[Sensing] requested photo failed: {}", e),
            }
        }

        let pressed = self.panel.toggle_pressed();
        if self.toggle.on_edge(pressed) {
            let enabled = self.control.toggle_monitoring();
            info!("[Sensing] monitoring {} by button", if enabled { "resumed" } else { "stopped" });
            self.outbox.text(if enabled {
                MONITORING_RESUMED_TEXT
            } else {
                MONITORING_STOPPED_TEXT
            });
            thread::sleep(self.pause);
        }

        if !self.control.is_monitoring() {
            self.panel.set_monitoring(false);
            self.panel.set_presence(false);
            self.paused = true;
            thread::sleep(self.pause);
            return None;
        }
        self.panel.set_monitoring(true);

        // boxes cached before a pause describe a scene that may be gone
        if std::mem::take(&mut self.paused) {
            self.cadence.reset();
        }

        let detected = !self.cadence.update(self.frame_index, &frame).is_empty();
        self.recorder.observe(detected, &frame, Instant::now());
        self.panel.set_presence(detected);

        let color = if self.recorder.is_recording() {
            RECORDING_COLOR
        } else {
            IDLE_COLOR
        };
        draw_boxes(&mut frame, self.cadence.last(), color);
        self.recorder.write_frame(&frame);

        self.frame_index += 1;
        self.sleeper.sleep(self.tick);
        None
    }

    fn stop_server(&self) {
        if let Some(server) = &self.server {
            server.stop();
        }
    }

    fn teardown(&mut self) {
        self.outbox.text(SHUTDOWN_TEXT);

        if let Some(mut server) = self.server.take() {
            server.stop();
            server.join();
        }
        if let Some(video) = self.recorder.close() {
            info!("[Sensing] closed {} at shutdown", video);
        }
        self.source.release();
        self.panel.shutdown_sequence();
        self.panel.release();
        info!("[Sensing] teardown complete after {} frames", self.frame_index);
    }
}
