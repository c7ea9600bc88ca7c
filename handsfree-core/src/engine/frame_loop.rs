//! Blocking gesture loop.
//!
//! ## Per-frame stages
//!
//! ```text
//! 1. Drain keyboard commands (toggle mouse / voice, screenshot, quit)
//! 2. LandmarkSource::next_frame → SourceFrame
//! 3. Confidence gate → Option<HandPose>
//! 4. ActionDispatcher::process → at most one move + one action
//! 5. ActionExecutor::execute (ActionSource::Gesture)
//! ```
//!
//! The loop owns nothing that must outlive it except the held left button;
//! on every exit path it asks the dispatcher for a final release.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use crossbeam_channel::Receiver;
use tracing::{debug, error, info, warn};

use crate::{
    action::ActionEvent,
    actuator::ActionExecutor,
    config::ControlConfig,
    dispatcher::ActionDispatcher,
    error::{HandsfreeError, Result},
    gesture::GestureClassifier,
    ipc::{
        events::{ActionSource, Subsystem, SubsystemStatus},
        EventHub,
    },
    landmark::{LandmarkSource, SourceFrame},
};

/// Consecutive recoverable source errors tolerated before giving up.
const MAX_CONSECUTIVE_SOURCE_ERRORS: usize = 50;

/// Commands from the keyboard controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    ToggleMouse,
    ToggleVoice,
    Screenshot,
    Quit,
}

#[derive(Default)]
pub struct FrameDiagnostics {
    pub frames: AtomicUsize,
    pub hands: AtomicUsize,
    pub low_confidence: AtomicUsize,
    pub actions: AtomicUsize,
    pub source_errors: AtomicUsize,
}

impl FrameDiagnostics {
    pub fn reset(&self) {
        self.frames.store(0, Ordering::Relaxed);
        self.hands.store(0, Ordering::Relaxed);
        self.low_confidence.store(0, Ordering::Relaxed);
        self.actions.store(0, Ordering::Relaxed);
        self.source_errors.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> FrameDiagnosticsSnapshot {
        FrameDiagnosticsSnapshot {
            frames: self.frames.load(Ordering::Relaxed),
            hands: self.hands.load(Ordering::Relaxed),
            low_confidence: self.low_confidence.load(Ordering::Relaxed),
            actions: self.actions.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDiagnosticsSnapshot {
    pub frames: usize,
    pub hands: usize,
    pub low_confidence: usize,
    pub actions: usize,
    pub source_errors: usize,
}

/// All context the loop needs, passed as one struct.
pub struct FrameLoopContext {
    pub config: ControlConfig,
    pub classifier: GestureClassifier,
    pub dispatcher: ActionDispatcher,
    pub executor: ActionExecutor,
    pub hub: EventHub,
    pub running: Arc<AtomicBool>,
    pub keys: Option<Receiver<KeyCommand>>,
    pub diagnostics: Arc<FrameDiagnostics>,
}

/// Run until `ctx.running` goes false, the source ends, or the camera is
/// lost. Only the last case is an error.
pub fn run(mut ctx: FrameLoopContext, source: &mut dyn LandmarkSource) -> Result<()> {
    info!("frame loop started");
    ctx.hub.status(Subsystem::Camera, SubsystemStatus::Starting, None);

    let mut result = Ok(());
    let mut consecutive_errors = 0usize;
    let mut announced = false;

    while ctx.running.load(Ordering::Relaxed) {
        drain_keys(&ctx);
        if !ctx.running.load(Ordering::Relaxed) {
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("landmark stream ended");
                break;
            }
            Err(HandsfreeError::CameraUnavailable(detail)) => {
                error!(%detail, "camera lost");
                result = Err(HandsfreeError::CameraUnavailable(detail));
                break;
            }
            Err(e) => {
                ctx.diagnostics.source_errors.fetch_add(1, Ordering::Relaxed);
                consecutive_errors += 1;
                warn!(consecutive = consecutive_errors, "landmark frame dropped: {e}");
                if consecutive_errors == 1 {
                    ctx.hub
                        .status(Subsystem::Camera, SubsystemStatus::Degraded, Some(e.to_string()));
                }
                if consecutive_errors >= MAX_CONSECUTIVE_SOURCE_ERRORS {
                    error!("too many consecutive landmark errors, stopping");
                    result = Err(e);
                    break;
                }
                continue;
            }
        };

        if consecutive_errors > 0 || !announced {
            ctx.hub.status(Subsystem::Camera, SubsystemStatus::Running, None);
            announced = true;
        }
        consecutive_errors = 0;
        process_frame(&mut ctx, frame);
    }

    if let Some(release) = ctx.dispatcher.shutdown() {
        info!("releasing held button on exit");
        execute(&ctx, ActionSource::Gesture, release);
    }

    let d = ctx.diagnostics.snapshot();
    info!(
        frames = d.frames,
        hands = d.hands,
        low_confidence = d.low_confidence,
        actions = d.actions,
        source_errors = d.source_errors,
        "frame loop stopped"
    );
    match &result {
        Ok(()) => ctx.hub.status(Subsystem::Camera, SubsystemStatus::Stopped, None),
        Err(e) => ctx
            .hub
            .status(Subsystem::Camera, SubsystemStatus::Error, Some(e.to_string())),
    }
    result
}

fn process_frame(ctx: &mut FrameLoopContext, frame: SourceFrame) {
    ctx.diagnostics.frames.fetch_add(1, Ordering::Relaxed);

    let pose = match &frame.hand {
        Some(hand) if hand.confidence >= ctx.config.detection_confidence => {
            ctx.diagnostics.hands.fetch_add(1, Ordering::Relaxed);
            Some(ctx.classifier.classify(&hand.landmarks))
        }
        Some(hand) => {
            ctx.diagnostics.low_confidence.fetch_add(1, Ordering::Relaxed);
            debug!(confidence = hand.confidence, "hand below detection confidence");
            None
        }
        None => None,
    };

    let actions = ctx
        .dispatcher
        .process(pose.as_ref(), frame.size, frame.captured_at);
    for event in actions.events() {
        execute(ctx, ActionSource::Gesture, event);
    }
}

fn drain_keys(ctx: &FrameLoopContext) {
    let Some(keys) = ctx.keys.as_ref() else {
        return;
    };
    while let Ok(key) = keys.try_recv() {
        debug!(?key, "key command");
        let state = ctx.dispatcher.state();
        match key {
            KeyCommand::ToggleMouse => {
                let enabled = state.toggle_mouse_enabled();
                info!(enabled, "mouse control toggled from keyboard");
                execute(ctx, ActionSource::Keyboard, ActionEvent::ToggleEnabled);
            }
            KeyCommand::ToggleVoice => {
                let enabled = state.toggle_voice_enabled();
                info!(enabled, "voice commands toggled from keyboard");
                execute(ctx, ActionSource::Keyboard, ActionEvent::ToggleVoice);
            }
            KeyCommand::Screenshot => {
                execute(ctx, ActionSource::Keyboard, ActionEvent::CaptureScreenshot)
            }
            KeyCommand::Quit => {
                info!("quit requested from keyboard");
                ctx.running.store(false, Ordering::SeqCst);
                return;
            }
        }
    }
}

fn execute(ctx: &FrameLoopContext, source: ActionSource, action: ActionEvent) {
    let counted = !matches!(action, ActionEvent::MoveCursor { .. });
    // Failures are already logged and published by the executor.
    if ctx.executor.execute(source, action, None).is_ok() && counted {
        ctx.diagnostics.actions.fetch_add(1, Ordering::Relaxed);
    }
}
