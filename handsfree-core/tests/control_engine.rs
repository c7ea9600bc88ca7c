use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use handsfree_core::actuator::ActuatorCall;
use handsfree_core::landmark::{index, Finger, LANDMARK_COUNT};
use handsfree_core::{
    ActionEvent, ActionRecord, ActionSource, ActuatorHandle, AudioSource, ControlConfig,
    ControlEngine, FrameSize, HandDetection, HandsfreeError, LandmarkFrame, LandmarkSource,
    MouseButton, OpenAudio, Point, RecognizerHandle, RecordingActuator, ScreenSize, SourceFrame,
    StubRecognizer,
};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;

const FRAME: FrameSize = FrameSize::new(640.0, 480.0);
const SCREEN: ScreenSize = ScreenSize::new(1920.0, 1080.0);
const FRAME_MS: u64 = 33;

const OPEN_PALM: [bool; 5] = [true; 5];
const POINTER: [bool; 5] = [false, true, false, false, false];

/// Upright hand with its middle knuckle at `(cx, cy)`.
fn hand(cx: f32, cy: f32, up: [bool; 5]) -> LandmarkFrame {
    let mut pts = [Point::default(); LANDMARK_COUNT];
    pts[index::WRIST] = Point::new(cx, cy + 100.0);
    pts[index::THUMB_CMC] = Point::new(cx - 30.0, cy + 70.0);
    pts[index::THUMB_MCP] = Point::new(cx - 40.0, cy + 45.0);
    pts[index::THUMB_IP] = Point::new(cx - 45.0, cy + 20.0);
    pts[index::THUMB_TIP] = if up[0] {
        Point::new(cx - 55.0, cy - 20.0)
    } else {
        Point::new(cx - 20.0, cy + 40.0)
    };
    let fingers = [
        (Finger::Index, -20.0),
        (Finger::Middle, 0.0),
        (Finger::Ring, 20.0),
        (Finger::Pinky, 40.0),
    ];
    for (slot, (finger, dx)) in fingers.into_iter().enumerate() {
        let x = cx + dx;
        pts[finger.proximal() - 1] = Point::new(x, cy);
        pts[finger.proximal()] = Point::new(x, cy - 30.0);
        pts[finger.proximal() + 1] = Point::new(x, cy - 55.0);
        pts[finger.tip()] = if up[slot + 1] {
            Point::new(x, cy - 80.0)
        } else {
            Point::new(x, cy - 10.0)
        };
    }
    LandmarkFrame::new(pts)
}

fn pinch(cx: f32, cy: f32) -> LandmarkFrame {
    let mut pts = *hand(cx, cy, POINTER).points();
    let tip = pts[index::INDEX_TIP];
    pts[index::THUMB_TIP] = Point::new(tip.x - 5.0, tip.y + 5.0);
    LandmarkFrame::new(pts)
}

/// Replays landmark frames on a synthetic 30 fps clock.
struct ReplaySource {
    start: Instant,
    frames: VecDeque<Option<LandmarkFrame>>,
    served: u64,
    /// After the script, keep serving empty frames instead of ending.
    endless: bool,
}

impl ReplaySource {
    fn new(frames: Vec<Option<LandmarkFrame>>) -> Self {
        Self {
            start: Instant::now(),
            frames: frames.into(),
            served: 0,
            endless: false,
        }
    }
}

impl LandmarkSource for ReplaySource {
    fn next_frame(&mut self) -> handsfree_core::Result<Option<SourceFrame>> {
        let hand = match self.frames.pop_front() {
            Some(hand) => hand,
            None if self.endless => {
                thread::sleep(Duration::from_millis(5));
                None
            }
            None => return Ok(None),
        };
        let captured_at = self.start + Duration::from_millis(self.served * FRAME_MS);
        self.served += 1;
        Ok(Some(SourceFrame {
            captured_at,
            size: FRAME,
            hand: hand.map(|landmarks| HandDetection {
                landmarks,
                confidence: 0.95,
            }),
        }))
    }
}

/// Room noise, then one burst of speech per phrase, then nothing.
struct ScriptedMic {
    blocks: VecDeque<Vec<f32>>,
}

impl AudioSource for ScriptedMic {
    fn sample_rate(&self) -> u32 {
        16_000
    }

    fn read(&mut self, out: &mut Vec<f32>, _max: usize, wait: Duration) -> handsfree_core::Result<usize> {
        match self.blocks.pop_front() {
            Some(block) => {
                out.extend_from_slice(&block);
                Ok(block.len())
            }
            None => {
                thread::sleep(wait);
                Ok(0)
            }
        }
    }
}

fn scripted_mic(phrases: usize) -> OpenAudio {
    Arc::new(move || {
        let mut blocks = VecDeque::from([vec![0.001; 8_000]]);
        for _ in 0..phrases {
            blocks.push_back(vec![0.4; 6_400]);
            blocks.push_back(vec![0.0; 16_000]);
        }
        Ok(Box::new(ScriptedMic { blocks }) as Box<dyn AudioSource>)
    })
}

fn scratch_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("handsfree-it-{}-{name}", std::process::id()))
}

fn engine(name: &str, phrases: &[&str], voice_enabled: bool) -> (ControlEngine, RecordingActuator) {
    let config = ControlConfig {
        screenshot_dir: Some(scratch_dir(name)),
        voice_listen_timeout_secs: 1.0,
        ..ControlConfig::default()
    };
    let actuator = RecordingActuator::new();
    let engine = ControlEngine::new(
        config,
        ActuatorHandle::new(actuator.clone()),
        RecognizerHandle::new(StubRecognizer::with_phrases(phrases.iter().copied())),
        voice_enabled,
    )
    .expect("engine");
    (engine, actuator)
}

fn recv_record_with_timeout(
    rx: &mut broadcast::Receiver<ActionRecord>,
    timeout: Duration,
) -> ActionRecord {
    let start = Instant::now();
    loop {
        match rx.try_recv() {
            Ok(record) => return record,
            Err(TryRecvError::Empty) => {
                if start.elapsed() >= timeout {
                    panic!("timed out waiting for action record");
                }
                thread::sleep(Duration::from_millis(5));
            }
            Err(TryRecvError::Lagged(_)) => continue,
            Err(TryRecvError::Closed) => panic!("action channel closed unexpectedly"),
        }
    }
}

#[test]
fn palm_hold_enables_control_then_a_quick_pinch_clicks() {
    let (engine, actuator) = engine("gesture", &[], false);
    let mut records = engine.subscribe_actions();

    let mut frames = Vec::new();
    // ~1.2 s of open palm arms mouse control.
    frames.extend((0..36).map(|_| Some(hand(320.0, 240.0, OPEN_PALM))));
    frames.extend((0..5).map(|i| Some(hand(300.0 + i as f32 * 4.0, 240.0, POINTER))));
    // ~100 ms pinch, then release.
    frames.extend((0..3).map(|_| Some(pinch(320.0, 240.0))));
    // Pointer frames until the double-click window expires.
    frames.extend((0..15).map(|_| Some(hand(320.0, 240.0, POINTER))));
    frames.push(None);
    let mut source = ReplaySource::new(frames);

    engine
        .run_frames(&mut source, SCREEN, None)
        .expect("stream ends cleanly");

    assert!(engine.state().mouse_enabled());
    let first = recv_record_with_timeout(&mut records, Duration::from_secs(1));
    assert_eq!(first.action, ActionEvent::ToggleEnabled);
    assert_eq!(first.source, ActionSource::Gesture);
    let second = recv_record_with_timeout(&mut records, Duration::from_secs(1));
    assert_eq!(second.action, ActionEvent::ClickLeft);

    let calls = actuator.calls();
    assert!(calls.iter().any(|c| matches!(c, ActuatorCall::MoveTo(..))));
    assert_eq!(
        calls
            .iter()
            .filter(|c| **c == ActuatorCall::Click(MouseButton::Left))
            .count(),
        1
    );
    assert!(!calls.contains(&ActuatorCall::MouseDown));

    let d = engine.frame_diagnostics_snapshot();
    assert_eq!(d.frames, 60);
    assert_eq!(d.hands, 59);
    assert_eq!(d.actions, 2);
}

#[test]
fn spoken_screenshot_lands_in_the_screenshot_dir() {
    let (engine, actuator) = engine("voice", &["take a screenshot please"], true);
    let mut records = engine.subscribe_actions();

    engine.start_voice(scripted_mic(1)).expect("voice start");
    let record = recv_record_with_timeout(&mut records, Duration::from_secs(5));
    engine.shutdown();

    assert_eq!(record.source, ActionSource::Voice);
    assert_eq!(record.action, ActionEvent::CaptureScreenshot);
    assert_eq!(record.phrase.as_deref(), Some("take a screenshot please"));
    match actuator.calls().as_slice() {
        [ActuatorCall::Screenshot(path)] => {
            assert!(path.starts_with(scratch_dir("voice")));
            assert!(path.to_string_lossy().ends_with(".png"));
        }
        other => panic!("unexpected actuator calls: {other:?}"),
    }
    assert!(!engine.voice_running());
    assert_eq!(engine.voice_diagnostics_snapshot().segments, 1);
}

#[test]
fn voice_can_disable_mouse_control_while_gestures_run() {
    let (engine, _actuator) = engine("both", &["stop"], true);
    engine.state().set_mouse_enabled(true);
    let engine = Arc::new(engine);

    let frames_engine = Arc::clone(&engine);
    let frames = thread::spawn(move || {
        let mut source = ReplaySource::new(Vec::new());
        source.endless = true;
        frames_engine.run_frames(&mut source, SCREEN, None)
    });

    engine.start_voice(scripted_mic(1)).expect("voice start");
    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.state().mouse_enabled() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert!(!engine.state().mouse_enabled());

    // A second gesture loop is refused while the first runs.
    let mut other = ReplaySource::new(Vec::new());
    assert!(matches!(
        engine.run_frames(&mut other, SCREEN, None),
        Err(HandsfreeError::AlreadyRunning)
    ));

    engine.shutdown();
    frames
        .join()
        .expect("frame thread panicked")
        .expect("clean exit");
}

struct UnpluggedCamera;

impl LandmarkSource for UnpluggedCamera {
    fn next_frame(&mut self) -> handsfree_core::Result<Option<SourceFrame>> {
        Err(HandsfreeError::CameraUnavailable("no camera at index 0".into()))
    }
}

#[test]
fn losing_the_camera_leaves_voice_commands_running() {
    let (engine, _actuator) = engine("camera-lost", &[], true);
    engine.start_voice(scripted_mic(0)).expect("voice start");

    let result = engine.run_frames(&mut UnpluggedCamera, SCREEN, None);
    assert!(matches!(result, Err(HandsfreeError::CameraUnavailable(_))));
    assert!(engine.voice_running(), "camera loss must not stop the listener");

    engine.shutdown();
    assert!(!engine.voice_running());
}
