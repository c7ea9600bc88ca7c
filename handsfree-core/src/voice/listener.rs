//! `VoiceSegmentListener`: background speech-command loop.
//!
//! ## Lifecycle
//!
//! ```text
//! new()
//!   └─► start(open)   → worker spawned, microphone opened on it, calibrated
//!         └─► stop()  → running=false; worker exits after its current read
//! ```
//!
//! ## Per-segment stages
//!
//! ```text
//! capture_segment → resample to 16 kHz → recognize → route → execute
//! ```
//!
//! Every failure after startup (no speech, network, rejected request, a
//! device hiccup) is counted, logged and published as `Degraded`; the loop
//! keeps listening. Only repeated device failures end it.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, info_span, warn};

use super::{
    router::{CommandRouter, RouteOutcome},
    segmenter::{capture_segment, record_ambient, Segment, SegmentLimits},
};
use crate::{
    actuator::ActionExecutor,
    audio::{
        resample::{RateConverter, RECOGNIZER_SAMPLE_RATE},
        AudioSource, OpenAudio,
    },
    buffering::chunk::AudioChunk,
    config::ControlConfig,
    error::{HandsfreeError, Result},
    ipc::{
        events::{ActionSource, Subsystem, SubsystemStatus},
        EventHub,
    },
    recognition::{RecognitionError, RecognizerHandle},
    vad::{EnergyVad, VoiceActivityDetector},
};

/// Quiet time that closes a phrase.
const PAUSE_THRESHOLD: Duration = Duration::from_millis(800);

/// Resampler block size on the listener thread.
const RESAMPLE_CHUNK: usize = 1024;

/// Consecutive device errors tolerated before the listener gives up.
const MAX_DEVICE_ERRORS: usize = 5;

const DEVICE_RETRY_DELAY: Duration = Duration::from_millis(200);

#[derive(Default)]
pub struct VoiceDiagnostics {
    pub segments: AtomicUsize,
    pub timeouts: AtomicUsize,
    pub no_speech: AtomicUsize,
    pub network_errors: AtomicUsize,
    pub rejected: AtomicUsize,
    pub device_errors: AtomicUsize,
    pub actions: AtomicUsize,
}

impl VoiceDiagnostics {
    pub fn reset(&self) {
        self.segments.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
        self.no_speech.store(0, Ordering::Relaxed);
        self.network_errors.store(0, Ordering::Relaxed);
        self.rejected.store(0, Ordering::Relaxed);
        self.device_errors.store(0, Ordering::Relaxed);
        self.actions.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> VoiceDiagnosticsSnapshot {
        VoiceDiagnosticsSnapshot {
            segments: self.segments.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            no_speech: self.no_speech.load(Ordering::Relaxed),
            network_errors: self.network_errors.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            actions: self.actions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceDiagnosticsSnapshot {
    pub segments: usize,
    pub timeouts: usize,
    pub no_speech: usize,
    pub network_errors: usize,
    pub rejected: usize,
    pub device_errors: usize,
    pub actions: usize,
}

/// Everything the worker thread owns.
struct ListenerContext {
    config: ControlConfig,
    recognizer: RecognizerHandle,
    router: CommandRouter,
    executor: ActionExecutor,
    hub: EventHub,
    running: Arc<AtomicBool>,
    diagnostics: Arc<VoiceDiagnostics>,
}

/// `Send + Sync`; share behind an `Arc` if several owners need `stop()`.
pub struct VoiceSegmentListener {
    config: ControlConfig,
    recognizer: RecognizerHandle,
    router: CommandRouter,
    executor: ActionExecutor,
    hub: EventHub,
    /// Run flag of the current worker. Each `start` installs a fresh flag so
    /// a worker still draining after `stop` can only clear its own.
    running: Mutex<Arc<AtomicBool>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    diagnostics: Arc<VoiceDiagnostics>,
}

impl VoiceSegmentListener {
    pub fn new(
        config: ControlConfig,
        recognizer: RecognizerHandle,
        router: CommandRouter,
        executor: ActionExecutor,
        hub: EventHub,
    ) -> Self {
        Self {
            config,
            recognizer,
            router,
            executor,
            hub,
            running: Mutex::new(Arc::new(AtomicBool::new(false))),
            worker: Mutex::new(None),
            diagnostics: Arc::new(VoiceDiagnostics::default()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().load(Ordering::SeqCst)
    }

    /// Spawn the worker and block until `open` has succeeded or failed on it.
    ///
    /// # Errors
    /// - `HandsfreeError::AlreadyRunning` if a worker is active.
    /// - whatever `open` returns for the device.
    pub fn start(&self, open: OpenAudio) -> Result<()> {
        let running = {
            let mut current = self.running.lock();
            if current.load(Ordering::SeqCst) {
                return Err(HandsfreeError::AlreadyRunning);
            }
            let fresh = Arc::new(AtomicBool::new(true));
            *current = Arc::clone(&fresh);
            fresh
        };
        // A previous worker may still be draining its last read; its own flag
        // is already false, so it exits.
        if let Some(previous) = self.worker.lock().take() {
            let _ = previous.join();
        }

        self.diagnostics.reset();
        self.hub.status(Subsystem::Voice, SubsystemStatus::Starting, None);

        let ctx = ListenerContext {
            config: self.config.clone(),
            recognizer: self.recognizer.clone(),
            router: self.router.clone(),
            executor: self.executor.clone(),
            hub: self.hub.clone(),
            running: Arc::clone(&running),
            diagnostics: Arc::clone(&self.diagnostics),
        };

        // Sync oneshot: the worker reports whether the microphone opened.
        let (open_tx, open_rx) = std::sync::mpsc::channel::<Result<u32>>();

        let spawned = std::thread::Builder::new()
            .name("voice-listener".into())
            .spawn(move || {
                // Open on this thread: the capture stream must not cross threads.
                let source = match open() {
                    Ok(source) => {
                        let _ = open_tx.send(Ok(source.sample_rate()));
                        source
                    }
                    Err(e) => {
                        let _ = open_tx.send(Err(e));
                        ctx.running.store(false, Ordering::SeqCst);
                        return;
                    }
                };
                listen(ctx, source);
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                running.store(false, Ordering::SeqCst);
                return Err(HandsfreeError::Io(e));
            }
        };

        match open_rx.recv() {
            Ok(Ok(sample_rate)) => {
                *self.worker.lock() = Some(handle);
                info!(sample_rate, "voice listener started");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                running.store(false, Ordering::SeqCst);
                self.hub
                    .status(Subsystem::Voice, SubsystemStatus::Error, Some(e.to_string()));
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                running.store(false, Ordering::SeqCst);
                self.hub.status(
                    Subsystem::Voice,
                    SubsystemStatus::Error,
                    Some("listener failed to start".into()),
                );
                Err(HandsfreeError::Other(anyhow::anyhow!(
                    "voice listener thread died unexpectedly"
                )))
            }
        }
    }

    /// Ask the worker to exit. Returns once the flag is cleared; the
    /// microphone is released when the worker finishes its current read.
    ///
    /// # Errors
    /// - `HandsfreeError::NotRunning` if no worker is active.
    pub fn stop(&self) -> Result<()> {
        if !self.running.lock().swap(false, Ordering::SeqCst) {
            return Err(HandsfreeError::NotRunning);
        }
        info!("voice listener stop requested");
        Ok(())
    }

    /// Wait up to `timeout` for the worker to exit. `true` if it has.
    ///
    /// A recognizer request in flight can outlast the timeout; the worker
    /// then exits on its own after the request returns.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let finished = match self.worker.lock().as_ref() {
                Some(handle) => handle.is_finished(),
                None => return true,
            };
            if finished {
                if let Some(handle) = self.worker.lock().take() {
                    let _ = handle.join();
                }
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    pub fn diagnostics_snapshot(&self) -> VoiceDiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }
}

impl Drop for VoiceSegmentListener {
    fn drop(&mut self) {
        self.running.lock().store(false, Ordering::SeqCst);
    }
}

fn listen(ctx: ListenerContext, mut source: Box<dyn AudioSource>) {
    let sample_rate = source.sample_rate();
    let limits = SegmentLimits {
        listen_timeout: ctx.config.voice_listen_timeout(),
        phrase_time_limit: ctx.config.voice_phrase_time_limit(),
        ..SegmentLimits::default()
    };
    let hangover = (PAUSE_THRESHOLD.as_secs_f64() / limits.window.as_secs_f64()).ceil() as u32;
    let mut vad = EnergyVad::new(ctx.config.voice_rms_threshold(), hangover);

    let mut converter = match RateConverter::new(sample_rate, RECOGNIZER_SAMPLE_RATE, RESAMPLE_CHUNK)
    {
        Ok(converter) => converter,
        Err(e) => {
            error!("voice listener cannot resample: {e}");
            finish(&ctx, source, SubsystemStatus::Error, Some(e.to_string()));
            return;
        }
    };

    match record_ambient(
        source.as_mut(),
        ctx.config.voice_noise_duration(),
        &ctx.running,
    ) {
        Ok(Some(ambient)) => vad.calibrate(&ambient),
        Ok(None) => {
            finish(&ctx, source, SubsystemStatus::Stopped, None);
            return;
        }
        Err(e) => warn!("ambient calibration skipped: {e}"),
    }

    ctx.hub.status(Subsystem::Voice, SubsystemStatus::Running, None);
    info!(
        sample_rate,
        threshold = vad.threshold(),
        "voice listener ready"
    );

    let mut device_errors = 0usize;
    while ctx.running.load(Ordering::Relaxed) {
        let segment = match capture_segment(source.as_mut(), &mut vad, &limits, &ctx.running) {
            Ok(segment) => {
                device_errors = 0;
                segment
            }
            Err(e) => {
                ctx.diagnostics.device_errors.fetch_add(1, Ordering::Relaxed);
                device_errors += 1;
                warn!(consecutive = device_errors, "microphone read failed: {e}");
                if device_errors >= MAX_DEVICE_ERRORS {
                    finish(&ctx, source, SubsystemStatus::Error, Some(e.to_string()));
                    return;
                }
                ctx.hub
                    .status(Subsystem::Voice, SubsystemStatus::Degraded, Some(e.to_string()));
                std::thread::sleep(DEVICE_RETRY_DELAY);
                continue;
            }
        };

        match segment {
            Segment::Cancelled => break,
            Segment::Timeout => {
                ctx.diagnostics.timeouts.fetch_add(1, Ordering::Relaxed);
                debug!("no speech within listen timeout");
            }
            Segment::Speech { chunk, peak_rms } => {
                ctx.diagnostics.segments.fetch_add(1, Ordering::Relaxed);
                let duration_ms = (chunk.duration_secs() * 1000.0).round() as u64;
                ctx.hub.voice_activity(peak_rms, duration_ms);
                handle_segment(&ctx, &mut converter, chunk);
            }
        }
    }

    finish(&ctx, source, SubsystemStatus::Stopped, None);
}

fn handle_segment(ctx: &ListenerContext, converter: &mut RateConverter, chunk: AudioChunk) {
    let span = info_span!("voice_segment", samples = chunk.samples.len());
    let _guard = span.enter();

    let audio = AudioChunk::new(converter.convert_all(&chunk.samples), RECOGNIZER_SAMPLE_RATE);
    let started = Instant::now();
    let phrase = match ctx.recognizer.recognize(&audio) {
        Ok(phrase) => phrase,
        Err(RecognitionError::NoSpeech) => {
            ctx.diagnostics.no_speech.fetch_add(1, Ordering::Relaxed);
            debug!("segment held no intelligible speech");
            return;
        }
        Err(e) => {
            let counter = match &e {
                RecognitionError::Network(_) => &ctx.diagnostics.network_errors,
                _ => &ctx.diagnostics.rejected,
            };
            counter.fetch_add(1, Ordering::Relaxed);
            warn!("speech recognition failed: {e}");
            ctx.hub
                .status(Subsystem::Voice, SubsystemStatus::Degraded, Some(e.to_string()));
            return;
        }
    };
    info!(
        text = phrase.text(),
        confidence = ?phrase.confidence(),
        latency_ms = started.elapsed().as_millis() as u64,
        "heard"
    );

    match ctx.router.route(&phrase) {
        RouteOutcome::Action(intent, action) => {
            debug!(?intent, "voice command");
            if ctx
                .executor
                .execute(ActionSource::Voice, action, Some(phrase.text()))
                .is_ok()
            {
                ctx.diagnostics.actions.fetch_add(1, Ordering::Relaxed);
            }
        }
        RouteOutcome::Unchanged(intent) => debug!(?intent, "state already as requested"),
        RouteOutcome::VoiceDisabled(_) | RouteOutcome::Unrecognized => {}
        RouteOutcome::SuppressedByDrag(intent) => {
            info!(?intent, "voice click ignored while dragging")
        }
    }
}

fn finish(
    ctx: &ListenerContext,
    source: Box<dyn AudioSource>,
    status: SubsystemStatus,
    detail: Option<String>,
) {
    drop(source);
    ctx.running.store(false, Ordering::SeqCst);
    ctx.hub.status(Subsystem::Voice, status, detail);
    let d = ctx.diagnostics.snapshot();
    info!(
        segments = d.segments,
        timeouts = d.timeouts,
        no_speech = d.no_speech,
        network_errors = d.network_errors,
        rejected = d.rejected,
        device_errors = d.device_errors,
        actions = d.actions,
        "voice listener stopped"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actuator::{ActuatorCall, ActuatorHandle, MouseButton, RecordingActuator},
        recognition::StubRecognizer,
        state::SharedControlState,
        voice::segmenter::testing::ScriptedAudio,
    };

    const RATE: u32 = 16_000;

    struct Harness {
        listener: VoiceSegmentListener,
        actuator: RecordingActuator,
        state: SharedControlState,
        hub: EventHub,
    }

    fn harness(recognizer: StubRecognizer, voice_enabled: bool) -> Harness {
        let config = ControlConfig {
            voice_listen_timeout_secs: 1.0,
            ..ControlConfig::default()
        };
        let state = SharedControlState::new().with_voice_enabled(voice_enabled);
        let hub = EventHub::new();
        let actuator = RecordingActuator::new();
        let executor = ActionExecutor::new(
            ActuatorHandle::new(actuator.clone()),
            std::env::temp_dir(),
            hub.clone(),
        );
        let router = CommandRouter::new(state.clone(), config.voice_scroll_step);
        let listener = VoiceSegmentListener::new(
            config,
            RecognizerHandle::new(recognizer),
            router,
            executor,
            hub.clone(),
        );
        Harness {
            listener,
            actuator,
            state,
            hub,
        }
    }

    /// Half a second of room noise, then `phrases` bursts of speech each
    /// followed by a second of silence; starves afterwards.
    fn spoken(phrases: usize) -> OpenAudio {
        Arc::new(move || {
            let mut blocks = vec![vec![0.001; RATE as usize / 2]];
            for _ in 0..phrases {
                blocks.push(vec![0.5; RATE as usize * 3 / 10]);
                blocks.push(vec![0.0; RATE as usize]);
            }
            let mut audio = ScriptedAudio::new(RATE, blocks);
            audio.starve = true;
            Ok(Box::new(audio) as Box<dyn AudioSource>)
        })
    }

    fn wait_for(timeout: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        done()
    }

    #[test]
    fn spoken_commands_reach_the_actuator() {
        let h = harness(StubRecognizer::with_phrases(["Click", "scroll down"]), true);
        let mut actions = h.hub.subscribe_actions();
        h.listener.start(spoken(2)).expect("start");

        assert!(wait_for(Duration::from_secs(5), || h.actuator.calls().len() >= 2));
        assert_eq!(
            h.actuator.calls(),
            vec![ActuatorCall::Click(MouseButton::Left), ActuatorCall::Scroll(-5)]
        );

        let first = actions.try_recv().expect("action record");
        assert_eq!(first.source, ActionSource::Voice);
        assert_eq!(first.phrase.as_deref(), Some("click"));

        h.listener.stop().expect("stop");
        assert!(h.listener.join_timeout(Duration::from_secs(2)));
        let d = h.listener.diagnostics_snapshot();
        assert_eq!(d.segments, 2);
        assert_eq!(d.actions, 2);
    }

    #[test]
    fn recognition_failures_are_counted_and_listening_continues() {
        let mut recognizer = StubRecognizer::new();
        recognizer.push(Err(RecognitionError::Network("connection reset".into())));
        recognizer.push(Err(RecognitionError::NoSpeech));
        recognizer.push(Ok("copy".into()));
        let h = harness(recognizer, true);
        let mut status = h.hub.subscribe_status();
        h.listener.start(spoken(3)).expect("start");

        assert!(wait_for(Duration::from_secs(5), || !h.actuator.calls().is_empty()));
        h.listener.stop().expect("stop");
        assert!(h.listener.join_timeout(Duration::from_secs(2)));

        let d = h.listener.diagnostics_snapshot();
        assert_eq!(d.network_errors, 1);
        assert_eq!(d.no_speech, 1);
        assert_eq!(d.actions, 1);

        let mut saw_degraded = false;
        while let Ok(event) = status.try_recv() {
            saw_degraded |= event.status == SubsystemStatus::Degraded;
        }
        assert!(saw_degraded);
    }

    #[test]
    fn disabled_voice_only_listens_for_voice_on() {
        let h = harness(StubRecognizer::with_phrases(["click", "voice on", "paste"]), false);
        h.listener.start(spoken(3)).expect("start");

        assert!(wait_for(Duration::from_secs(5), || h.actuator.calls().len() == 1));
        h.listener.stop().expect("stop");
        assert!(h.listener.join_timeout(Duration::from_secs(2)));

        assert!(h.state.voice_enabled());
        assert!(matches!(h.actuator.calls()[0], ActuatorCall::Keys(_)));
    }

    #[test]
    fn start_twice_is_an_error_and_stop_requires_running() {
        let h = harness(StubRecognizer::new(), true);
        assert!(matches!(h.listener.stop(), Err(HandsfreeError::NotRunning)));

        h.listener.start(spoken(0)).expect("start");
        assert!(matches!(
            h.listener.start(spoken(0)),
            Err(HandsfreeError::AlreadyRunning)
        ));
        h.listener.stop().expect("stop");
        assert!(h.listener.join_timeout(Duration::from_secs(2)));
        assert!(!h.listener.is_running());
    }

    #[test]
    fn restart_right_after_stop_does_not_wait_for_or_inherit_the_old_worker() {
        let h = harness(StubRecognizer::new(), true);
        h.listener.start(spoken(0)).expect("first start");
        h.listener.stop().expect("stop");

        // The first worker is usually still inside a read here.
        h.listener.start(spoken(0)).expect("restart");
        assert!(h.listener.is_running());

        // The first worker finishing must not clear the second one's flag.
        std::thread::sleep(Duration::from_millis(300));
        assert!(h.listener.is_running());

        h.listener.stop().expect("stop again");
        assert!(h.listener.join_timeout(Duration::from_secs(2)));
        assert!(!h.listener.is_running());
    }

    #[test]
    fn device_open_failure_is_reported_to_the_caller() {
        let h = harness(StubRecognizer::new(), true);
        let open: OpenAudio = Arc::new(|| Err(HandsfreeError::NoDefaultInputDevice));
        assert!(matches!(
            h.listener.start(open),
            Err(HandsfreeError::NoDefaultInputDevice)
        ));
        assert!(!h.listener.is_running());
    }
}
