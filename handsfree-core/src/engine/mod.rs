//! `ControlEngine`: top-level lifecycle controller.
//!
//! ## Lifecycle
//!
//! ```text
//! ControlEngine::new()
//!     ├─► start_voice(open)   → voice listener thread, microphone opened on it
//!     └─► run_frames(source)  → gesture loop on the calling thread, blocks
//!             └─► shutdown()  → running=false, voice stopped, button released
//! ```
//!
//! ## Threading
//!
//! The gesture loop runs on whichever thread calls `run_frames` (the app's
//! main thread). The voice listener owns a dedicated thread because the
//! capture stream must be opened and dropped on one thread. The two meet
//! only in `SharedControlState` and the `ActuatorHandle` input lock.

pub mod frame_loop;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use crossbeam_channel::Receiver;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    actuator::{ActionExecutor, ActuatorHandle},
    audio::OpenAudio,
    config::ControlConfig,
    cursor::ScreenSize,
    dispatcher::ActionDispatcher,
    error::{HandsfreeError, Result},
    gesture::GestureClassifier,
    ipc::{
        events::{ActionRecord, StatusEvent, VoiceActivityEvent},
        EventHub,
    },
    landmark::LandmarkSource,
    recognition::RecognizerHandle,
    state::SharedControlState,
    voice::{CommandRouter, VoiceDiagnosticsSnapshot, VoiceSegmentListener},
};

pub use frame_loop::{FrameDiagnostics, FrameDiagnosticsSnapshot, KeyCommand};

/// How long `shutdown` waits for the voice thread.
const VOICE_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// The top-level engine handle.
///
/// `ControlEngine` is `Send + Sync`; all fields use interior mutability.
/// Wrap in `Arc<ControlEngine>` to call `shutdown` from a signal handler.
pub struct ControlEngine {
    config: ControlConfig,
    state: SharedControlState,
    hub: EventHub,
    executor: ActionExecutor,
    voice: VoiceSegmentListener,
    /// `true` while the gesture loop runs.
    running: Arc<AtomicBool>,
    frame_diagnostics: Arc<FrameDiagnostics>,
}

impl ControlEngine {
    /// Build the engine and make sure the screenshot directory exists.
    /// Nothing is captured until `start_voice` / `run_frames`.
    pub fn new(
        mut config: ControlConfig,
        actuator: ActuatorHandle,
        recognizer: RecognizerHandle,
        voice_enabled: bool,
    ) -> Result<Self> {
        config.normalize();
        let screenshot_dir = config.screenshot_dir();
        std::fs::create_dir_all(&screenshot_dir)?;

        let state = SharedControlState::new().with_voice_enabled(voice_enabled);
        let hub = EventHub::new();
        let executor = ActionExecutor::new(actuator, screenshot_dir, hub.clone());
        let router = CommandRouter::new(state.clone(), config.voice_scroll_step);
        let voice = VoiceSegmentListener::new(
            config.clone(),
            recognizer,
            router,
            executor.clone(),
            hub.clone(),
        );

        Ok(Self {
            config,
            state,
            hub,
            executor,
            voice,
            running: Arc::new(AtomicBool::new(false)),
            frame_diagnostics: Arc::new(FrameDiagnostics::default()),
        })
    }

    pub fn config(&self) -> &ControlConfig {
        &self.config
    }

    pub fn state(&self) -> &SharedControlState {
        &self.state
    }

    pub fn hub(&self) -> &EventHub {
        &self.hub
    }

    pub fn subscribe_actions(&self) -> broadcast::Receiver<ActionRecord> {
        self.hub.subscribe_actions()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.hub.subscribe_status()
    }

    pub fn subscribe_voice_activity(&self) -> broadcast::Receiver<VoiceActivityEvent> {
        self.hub.subscribe_voice_activity()
    }

    /// Start the voice listener. Blocks until the microphone is open.
    pub fn start_voice(&self, open: OpenAudio) -> Result<()> {
        self.voice.start(open)
    }

    pub fn voice_running(&self) -> bool {
        self.voice.is_running()
    }

    /// Run the gesture loop on the calling thread until `shutdown`, a
    /// `KeyCommand::Quit`, the end of `source`, or camera loss.
    ///
    /// # Errors
    /// - `HandsfreeError::AlreadyRunning` if a loop is active.
    /// - `HandsfreeError::CameraUnavailable` when the camera goes away.
    pub fn run_frames(
        &self,
        source: &mut dyn LandmarkSource,
        screen: ScreenSize,
        keys: Option<Receiver<KeyCommand>>,
    ) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HandsfreeError::AlreadyRunning);
        }
        self.frame_diagnostics.reset();
        info!(
            width = screen.width,
            height = screen.height,
            "gesture control starting"
        );

        let ctx = frame_loop::FrameLoopContext {
            config: self.config.clone(),
            classifier: GestureClassifier::default(),
            dispatcher: ActionDispatcher::new(&self.config, screen, self.state.clone()),
            executor: self.executor.clone(),
            hub: self.hub.clone(),
            running: Arc::clone(&self.running),
            keys,
            diagnostics: Arc::clone(&self.frame_diagnostics),
        };
        let result = frame_loop::run(ctx, source);
        self.running.store(false, Ordering::SeqCst);
        result
    }

    /// Stop both loops. Safe to call more than once and from any thread.
    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("gesture loop stop requested");
        }
        if self.voice.stop().is_ok() && !self.voice.join_timeout(VOICE_JOIN_TIMEOUT) {
            warn!("voice listener still busy after shutdown timeout");
        }
    }

    pub fn frame_diagnostics_snapshot(&self) -> FrameDiagnosticsSnapshot {
        self.frame_diagnostics.snapshot()
    }

    pub fn voice_diagnostics_snapshot(&self) -> VoiceDiagnosticsSnapshot {
        self.voice.diagnostics_snapshot()
    }
}
