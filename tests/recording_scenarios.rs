// Recording lifecycle driven by scripted detection timelines, with the
// notification worker delivering into an in-memory transport.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use picam_guard::{
    media::{frame::Frame, sink::MemorySinkFactory, store::MediaStore},
    monitor::recording::{RECORDING_STARTED_TEXT, RecordingState, RecordingStateMachine, Transition},
    notify::{
        dispatcher::{Endpoint, NotificationDispatcher},
        memory::MemoryTransport,
        outbox::{Outbox, VIDEO_RECORDED_TEXT},
    },
};

const STEP_MS: u64 = 100;

struct Scenario {
    _dir: tempfile::TempDir,
    sinks: MemorySinkFactory,
    machine: RecordingStateMachine,
    t0: Instant,
}

impl Scenario {
    fn new(outbox: Outbox) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = MediaStore::new(dir.path().join("photo"), dir.path().join("video"));
        store.ensure_dirs().unwrap();
        let sinks = MemorySinkFactory::new();
        let machine = RecordingStateMachine::new(sinks.clone(), store, outbox, (32, 24), 15);
        Self {
            _dir: dir,
            sinks,
            machine,
            t0: Instant::now(),
        }
    }

    /// Plays 100 ms frames from 0 to `until_ms`; `present(ms)` decides detection.
    /// Returns (ms, transition) for every non-trivial transition.
    fn play(&mut self, until_ms: u64, present: impl Fn(u64) -> bool) -> Vec<(u64, Transition)> {
        let frame = Frame::new(32, 24);
        let mut out = Vec::new();
        for ms in (0..=until_ms).step_by(STEP_MS as usize) {
            let now = self.t0 + Duration::from_millis(ms);
            let t = self
                .machine
                .observe_with(present(ms), &frame, now, || format!("at_{:05}", ms));
            self.machine.write_frame(&frame);
            assert!(self.sinks.log().open_sessions() <= 1, "two sessions open at {} ms", ms);
            if t != Transition::None {
                out.push((ms, t));
            }
        }
        out
    }
}

#[test]
fn detections_at_0_1_2_close_at_7() {
    let (outbox, _rx) = Outbox::detached(64);
    let mut s = Scenario::new(outbox);

    let transitions = s.play(10_000, |ms| matches!(ms, 0 | 1_000 | 2_000));
    assert_eq!(
        transitions,
        vec![
            (
                0,
                Transition::Started {
                    video: "at_00000.mp4".into(),
                    photo: Some("at_00000.jpg".into())
                }
            ),
            (
                7_000,
                Transition::Stopped {
                    video: "at_00000.mp4".into()
                }
            ),
        ]
    );
    // frames 0..7000 exclusive of the closing frame
    assert_eq!(s.sinks.log().frames_written, 70);
}

#[test]
fn bursts_four_seconds_apart_are_one_session() {
    let (outbox, _rx) = Outbox::detached(64);
    let mut s = Scenario::new(outbox);

    let transitions = s.play(12_000, |ms| ms < 500 || (4_000..4_500).contains(&ms));
    assert_eq!(transitions.len(), 2);
    assert_eq!(transitions[0].0, 0);
    assert_eq!(transitions[1].0, 4_400 + 5_000);
    assert_eq!(s.sinks.log().opened.len(), 1);
}

#[test]
fn bursts_beyond_cooldown_are_two_sessions() {
    let (outbox, _rx) = Outbox::detached(64);
    let mut s = Scenario::new(outbox);

    let transitions = s.play(20_000, |ms| ms == 0 || ms == 8_000);
    let starts = transitions
        .iter()
        .filter(|(_, t)| matches!(t, Transition::Started { .. }))
        .count();
    assert_eq!(starts, 2);
    assert_eq!(s.sinks.log().opened.len(), 2);
    assert_eq!(s.machine.state(), RecordingState::Idle);
}

#[test]
fn notifications_reach_the_transport() {
    let transport = MemoryTransport::new();
    let dispatcher = Arc::new(NotificationDispatcher::new(transport.clone(), "https://cam.example"));
    let (outbox, worker) = Outbox::spawn(dispatcher, "U123".into(), 16).unwrap();

    let mut s = Scenario::new(outbox);
    s.play(6_000, |ms| ms == 0);
    drop(s);
    worker.join().unwrap();

    let sent = transport.sent();
    assert!(sent.iter().all(|m| m.endpoint == Endpoint::Push));
    assert!(sent.iter().all(|m| m.body["to"] == "U123"));

    let image = sent
        .iter()
        .find(|m| m.body["messages"][0]["type"] == "image")
        .unwrap();
    assert_eq!(
        image.body["messages"][0]["originalContentUrl"],
        "https://cam.example/image?file=at_00000.jpg"
    );

    let texts = transport.texts();
    assert_eq!(texts[0], RECORDING_STARTED_TEXT);
    assert_eq!(
        texts.last().unwrap(),
        &format!("{}https://cam.example/video?file=at_00000.mp4", VIDEO_RECORDED_TEXT)
    );
}
