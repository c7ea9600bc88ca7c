//! `handsfree`: terminal host for the hands-free control engine.
//!
//! Wires concrete adapters into `ControlEngine`: enigo for input injection,
//! a landmark helper process for the camera, cpal for the microphone, and
//! the HTTP (or stub) speech recognizer. The gesture loop runs on the main
//! thread; Ctrl+C or Q stops everything.

mod actuator;
mod keyboard;
mod landmark_source;
mod settings;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::Receiver;
use handsfree_core::{
    ActuatorHandle, ControlEngine, HandsfreeError, HttpRecognizer, KeyCommand, MicrophoneSource,
    RecognizerHandle, RecordingActuator, ScreenSize, StubRecognizer, SubsystemStatus,
};
use settings::{default_settings_path, load_settings, save_settings, AppSettings, RecognizerKind};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::actuator::EnigoActuator;
use crate::keyboard::CrlfWriter;
use crate::landmark_source::SubprocessLandmarkSource;

/// Screen assumed in `--dry-run`, where no display is queried.
const DRY_RUN_SCREEN: ScreenSize = ScreenSize::new(1920.0, 1080.0);

#[derive(Parser)]
#[command(name = "handsfree", about = "Control the desktop with hand gestures and voice")]
struct Cli {
    /// Settings file (default: platform data dir, or $HANDSFREE_SETTINGS).
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Log actions instead of injecting input.
    #[arg(long)]
    dry_run: bool,
    /// Do not open the microphone.
    #[arg(long)]
    no_voice: bool,
    /// Do not read M/V/S/Q from the terminal.
    #[arg(long)]
    no_keys: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let keys_enabled = !cli.no_keys && std::io::stdin().is_terminal();

    // ── Tracing ───────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("handsfree=info,handsfree_core=info")),
        )
        .with_writer(|| CrlfWriter(std::io::stderr()))
        .init();

    info!("handsfree starting");

    // ── Settings ──────────────────────────────────────────────────────────
    let settings_path = cli.settings.clone().unwrap_or_else(default_settings_path);
    let (settings, first_run) = load_settings(&settings_path);
    if first_run {
        match save_settings(&settings_path, &settings) {
            Ok(()) => info!(path = %settings_path.display(), "wrote default settings"),
            Err(e) => warn!(path = %settings_path.display(), "could not write settings: {e}"),
        }
    }

    // ── Adapters ──────────────────────────────────────────────────────────
    let (actuator, screen) = if cli.dry_run {
        info!("dry run: actions are logged, not injected");
        (ActuatorHandle::new(RecordingActuator::new()), DRY_RUN_SCREEN)
    } else {
        let (actuator, screen) = EnigoActuator::open().context("input injection unavailable")?;
        (ActuatorHandle::new(actuator), screen)
    };
    let recognizer = build_recognizer(&settings);

    let engine = Arc::new(
        ControlEngine::new(
            settings.control.clone(),
            actuator,
            recognizer,
            settings.voice_enabled_at_start,
        )
        .context("failed to build control engine")?,
    );
    spawn_status_logger(&engine);

    let signal_engine = Arc::clone(&engine);
    ctrlc::set_handler(move || signal_engine.shutdown()).context("failed to set Ctrl+C handler")?;

    // ── Voice ─────────────────────────────────────────────────────────────
    if cli.no_voice {
        info!("voice commands disabled by flag");
    } else if let Err(e) =
        engine.start_voice(MicrophoneSource::opener(settings.preferred_input_device.clone()))
    {
        warn!("voice commands unavailable: {e}");
    }

    // ── Keys ──────────────────────────────────────────────────────────────
    let keys_running = Arc::new(AtomicBool::new(true));
    let (key_tx, key_rx) = crossbeam_channel::unbounded();
    let key_reader = if keys_enabled {
        info!("keys: M toggle mouse, V toggle voice, S screenshot, Q quit");
        Some(keyboard::spawn_reader(key_tx, Arc::clone(&keys_running))?)
    } else {
        drop(key_tx);
        None
    };
    info!("hold an open palm for a second to enable mouse control");

    // ── Gestures (blocks) ─────────────────────────────────────────────────
    let gestures = SubprocessLandmarkSource::spawn(&settings.landmark_command, &settings.control)
        .and_then(|mut source| engine.run_frames(&mut source, screen, Some(key_rx.clone())));
    if let Err(e) = gestures {
        error!("gesture control ended: {e}");
        if keeps_voice_running(&e, engine.voice_running()) {
            info!("continuing with voice commands only");
            voice_only(&engine, &key_rx);
        }
    }

    engine.shutdown();
    keys_running.store(false, Ordering::SeqCst);
    if let Some(reader) = key_reader {
        let _ = reader.join();
    }

    let frames = engine.frame_diagnostics_snapshot();
    let voice = engine.voice_diagnostics_snapshot();
    info!(
        frames = frames.frames,
        gesture_actions = frames.actions,
        voice_segments = voice.segments,
        voice_actions = voice.actions,
        "handsfree stopped"
    );
    Ok(())
}

fn build_recognizer(settings: &AppSettings) -> RecognizerHandle {
    if settings.recognizer == RecognizerKind::Stub {
        info!("speech recognizer: stub");
        return RecognizerHandle::new(StubRecognizer::new());
    }
    let config = settings.resolved_transcription();
    if config.api_key.is_none() {
        warn!("no transcription API key (settings or OPENAI_API_KEY); requests may be rejected");
    }
    let endpoint = config.endpoint.clone();
    match HttpRecognizer::new(config) {
        Ok(recognizer) => {
            info!(%endpoint, "speech recognizer: http");
            RecognizerHandle::new(recognizer)
        }
        Err(e) => {
            warn!("http recognizer unavailable, using stub: {e}");
            RecognizerHandle::new(StubRecognizer::new())
        }
    }
}

/// Log every status change; the engine already logs each action.
fn spawn_status_logger(engine: &ControlEngine) {
    let mut status = engine.subscribe_status();
    let spawned = std::thread::Builder::new()
        .name("status-log".into())
        .spawn(move || loop {
            match status.blocking_recv() {
                Ok(event) => match event.status {
                    SubsystemStatus::Degraded | SubsystemStatus::Error => warn!(
                        subsystem = ?event.subsystem,
                        status = ?event.status,
                        detail = event.detail.as_deref().unwrap_or(""),
                        "status"
                    ),
                    _ => info!(subsystem = ?event.subsystem, status = ?event.status, "status"),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "status log lagged"),
                Err(RecvError::Closed) => break,
            }
        });
    if let Err(e) = spawned {
        warn!("status logging unavailable: {e}");
    }
}

/// Camera-side failures leave the microphone alone; voice keeps serving.
fn keeps_voice_running(error: &HandsfreeError, voice_running: bool) -> bool {
    voice_running
        && matches!(
            error,
            HandsfreeError::CameraUnavailable(_)
                | HandsfreeError::LandmarkSource(_)
                | HandsfreeError::MalformedFrame { .. }
                | HandsfreeError::Io(_)
        )
}

/// Without a camera, keep serving voice commands until quit.
fn voice_only(engine: &ControlEngine, keys: &Receiver<KeyCommand>) {
    while engine.voice_running() {
        match keys.recv_timeout(Duration::from_millis(100)) {
            Ok(KeyCommand::Quit) => break,
            Ok(KeyCommand::ToggleVoice) => {
                let enabled = engine.state().toggle_voice_enabled();
                info!(enabled, "voice commands toggled from keyboard");
            }
            Ok(other) => info!(?other, "key ignored without a camera"),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                std::thread::sleep(Duration::from_millis(100))
            }
        }
    }
}
