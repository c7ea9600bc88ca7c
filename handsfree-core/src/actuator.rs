//! Output side: the `OutputActuator` contract and the executor that maps the
//! action vocabulary onto it.
//!
//! Both input loops call `ActionExecutor::execute`. Input injection sits
//! behind one `parking_lot::Mutex`, so a voice click and a gesture drag can
//! never interleave half-way through an OS call sequence. Screen captures go
//! through a second handle with its own lock and never hold the input lock.
//!
//! Key combinations follow macOS conventions:
//!
//! | Action | Keys |
//! |--------|------|
//! | `MaximizeWindow` | Cmd + Ctrl + F |
//! | `MinimizeWindow` | Cmd + M |
//! | `ShowDesktop` | F11 |
//! | `Undo` / `Redo` | Cmd + Z / Cmd + Shift + Z |
//! | `Copy` / `Paste` / `Cut` / `SelectAll` | Cmd + C / V / X / A |

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    action::{ActionEvent, EditKind},
    error::Result,
    ipc::{events::ActionSource, EventHub},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

/// Keys used in shortcut combinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Cmd on macOS.
    Meta,
    Control,
    Shift,
    Alt,
    F11,
    Char(char),
}

/// OS input-injection primitives.
pub trait OutputActuator: Send + 'static {
    fn move_cursor_to(&mut self, x: i32, y: i32) -> Result<()>;

    /// Press the left button and keep it down.
    fn mouse_down(&mut self) -> Result<()>;

    fn mouse_up(&mut self) -> Result<()>;

    fn click(&mut self, button: MouseButton) -> Result<()>;

    fn double_click(&mut self) -> Result<()> {
        self.click(MouseButton::Left)?;
        self.click(MouseButton::Left)
    }

    /// Positive scrolls up, in wheel notches.
    fn scroll(&mut self, delta: i32) -> Result<()>;

    /// Press `keys` in order, then release them in reverse.
    fn press_key_combo(&mut self, keys: &[Key]) -> Result<()>;

    fn capture_screen_to_file(&mut self, path: &Path) -> Result<()>;
}

/// Keys for the shortcut-type actions; `None` for everything else.
pub fn key_combo(action: &ActionEvent) -> Option<&'static [Key]> {
    use Key::*;
    let keys: &'static [Key] = match action {
        ActionEvent::MaximizeWindow => &[Meta, Control, Char('f')],
        ActionEvent::MinimizeWindow => &[Meta, Char('m')],
        ActionEvent::ShowDesktop => &[F11],
        ActionEvent::EditAction { kind } => match kind {
            EditKind::Undo => &[Meta, Char('z')],
            EditKind::Redo => &[Meta, Shift, Char('z')],
            EditKind::Copy => &[Meta, Char('c')],
            EditKind::Paste => &[Meta, Char('v')],
            EditKind::Cut => &[Meta, Char('x')],
            EditKind::SelectAll => &[Meta, Char('a')],
        },
        _ => return None,
    };
    Some(keys)
}

/// `<dir>/screenshot_YYYYmmdd_HHMMSS.png`, with `_N` appended if that file
/// already exists.
pub fn screenshot_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    let stem = now.format("screenshot_%Y%m%d_%H%M%S").to_string();
    let mut path = dir.join(format!("{stem}.png"));
    let mut n = 1;
    while path.exists() {
        path = dir.join(format!("{stem}_{n}.png"));
        n += 1;
    }
    path
}

/// Thread-safe handle to any `OutputActuator`.
///
/// Holds two clones of the actuator: `input` for pointer and keyboard calls,
/// `screen` for captures. Clones of `A` must drive the same device.
#[derive(Clone)]
pub struct ActuatorHandle {
    input: Arc<Mutex<dyn OutputActuator>>,
    screen: Arc<Mutex<dyn OutputActuator>>,
}

impl ActuatorHandle {
    pub fn new<A: OutputActuator + Clone>(actuator: A) -> Self {
        Self {
            screen: Arc::new(Mutex::new(actuator.clone())),
            input: Arc::new(Mutex::new(actuator)),
        }
    }
}

impl std::fmt::Debug for ActuatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActuatorHandle").finish_non_exhaustive()
    }
}

/// Executes actions and publishes an `ActionRecord` for each non-move one.
#[derive(Clone)]
pub struct ActionExecutor {
    actuator: ActuatorHandle,
    screenshot_dir: PathBuf,
    hub: EventHub,
}

impl ActionExecutor {
    pub fn new(actuator: ActuatorHandle, screenshot_dir: PathBuf, hub: EventHub) -> Self {
        Self {
            actuator,
            screenshot_dir,
            hub,
        }
    }

    pub fn screenshot_dir(&self) -> &Path {
        &self.screenshot_dir
    }

    /// Run one action. Failures are returned and also published on the
    /// action record; callers treat them as recoverable.
    pub fn execute(
        &self,
        source: ActionSource,
        action: ActionEvent,
        phrase: Option<&str>,
    ) -> Result<()> {
        let result = self.apply(action);
        if matches!(action, ActionEvent::MoveCursor { .. }) {
            return result;
        }

        match &result {
            Ok(()) => info!(?source, action = %action.label(), "action"),
            Err(e) => warn!(?source, action = %action.label(), error = %e, "action failed"),
        }
        self.hub.action(
            source,
            action,
            phrase,
            result.as_ref().err().map(ToString::to_string),
        );
        result
    }

    fn apply(&self, action: ActionEvent) -> Result<()> {
        if action == ActionEvent::CaptureScreenshot {
            let path = screenshot_path(&self.screenshot_dir, Local::now());
            self.actuator.screen.lock().capture_screen_to_file(&path)?;
            info!(path = %path.display(), "screenshot saved");
            return Ok(());
        }

        let mut actuator = self.actuator.input.lock();
        match action {
            ActionEvent::MoveCursor { x, y } => actuator.move_cursor_to(x, y),
            ActionEvent::PressLeft => actuator.mouse_down(),
            ActionEvent::ReleaseLeft => actuator.mouse_up(),
            ActionEvent::ClickLeft => actuator.click(MouseButton::Left),
            ActionEvent::DoubleClickLeft => actuator.double_click(),
            ActionEvent::ClickRight => actuator.click(MouseButton::Right),
            ActionEvent::ScrollBy { delta } => actuator.scroll(delta),
            ActionEvent::ShowDesktop
            | ActionEvent::MaximizeWindow
            | ActionEvent::MinimizeWindow
            | ActionEvent::EditAction { .. } => match key_combo(&action) {
                Some(keys) => actuator.press_key_combo(keys),
                None => Ok(()),
            },
            ActionEvent::CaptureScreenshot
            | ActionEvent::ToggleEnabled
            | ActionEvent::ToggleVoice
            | ActionEvent::NoOp => {
                debug!(action = %action.label(), "state-only action");
                Ok(())
            }
        }
    }
}

/// One call made on a `RecordingActuator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuatorCall {
    MoveTo(i32, i32),
    MouseDown,
    MouseUp,
    Click(MouseButton),
    DoubleClick,
    Scroll(i32),
    Keys(Vec<Key>),
    Screenshot(PathBuf),
}

/// Records calls instead of touching the OS. Backs `--dry-run` and tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    calls: Arc<Mutex<Vec<ActuatorCall>>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls so far; clones share one log.
    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.calls.lock().clone()
    }

    fn record(&self, call: ActuatorCall) -> Result<()> {
        debug!(?call, "actuator (recording)");
        self.calls.lock().push(call);
        Ok(())
    }
}

impl OutputActuator for RecordingActuator {
    fn move_cursor_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.record(ActuatorCall::MoveTo(x, y))
    }

    fn mouse_down(&mut self) -> Result<()> {
        self.record(ActuatorCall::MouseDown)
    }

    fn mouse_up(&mut self) -> Result<()> {
        self.record(ActuatorCall::MouseUp)
    }

    fn click(&mut self, button: MouseButton) -> Result<()> {
        self.record(ActuatorCall::Click(button))
    }

    fn double_click(&mut self) -> Result<()> {
        self.record(ActuatorCall::DoubleClick)
    }

    fn scroll(&mut self, delta: i32) -> Result<()> {
        self.record(ActuatorCall::Scroll(delta))
    }

    fn press_key_combo(&mut self, keys: &[Key]) -> Result<()> {
        self.record(ActuatorCall::Keys(keys.to_vec()))
    }

    fn capture_screen_to_file(&mut self, path: &Path) -> Result<()> {
        self.record(ActuatorCall::Screenshot(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandsfreeError;
    use chrono::TimeZone;
    use std::time::{Duration, Instant};

    fn executor(actuator: &RecordingActuator) -> (ActionExecutor, EventHub) {
        let hub = EventHub::new();
        let exec = ActionExecutor::new(
            ActuatorHandle::new(actuator.clone()),
            std::env::temp_dir(),
            hub.clone(),
        );
        (exec, hub)
    }

    #[test]
    fn shortcut_actions_use_mac_combos() {
        assert_eq!(
            key_combo(&ActionEvent::MaximizeWindow),
            Some(&[Key::Meta, Key::Control, Key::Char('f')][..])
        );
        assert_eq!(key_combo(&ActionEvent::ShowDesktop), Some(&[Key::F11][..]));
        assert_eq!(
            key_combo(&ActionEvent::EditAction {
                kind: EditKind::Redo
            }),
            Some(&[Key::Meta, Key::Shift, Key::Char('z')][..])
        );
        assert_eq!(key_combo(&ActionEvent::ClickLeft), None);
    }

    #[test]
    fn executor_maps_actions_onto_actuator_calls() {
        let actuator = RecordingActuator::new();
        let (exec, _hub) = executor(&actuator);

        for action in [
            ActionEvent::MoveCursor { x: 5, y: 6 },
            ActionEvent::PressLeft,
            ActionEvent::ReleaseLeft,
            ActionEvent::DoubleClickLeft,
            ActionEvent::ClickRight,
            ActionEvent::ScrollBy { delta: -3 },
            ActionEvent::EditAction {
                kind: EditKind::Copy,
            },
            ActionEvent::ToggleEnabled,
        ] {
            exec.execute(ActionSource::Gesture, action, None)
                .expect("recording actuator never fails");
        }

        assert_eq!(
            actuator.calls(),
            vec![
                ActuatorCall::MoveTo(5, 6),
                ActuatorCall::MouseDown,
                ActuatorCall::MouseUp,
                ActuatorCall::DoubleClick,
                ActuatorCall::Click(MouseButton::Right),
                ActuatorCall::Scroll(-3),
                ActuatorCall::Keys(vec![Key::Meta, Key::Char('c')]),
            ]
        );
    }

    #[test]
    fn moves_are_not_published_but_other_actions_are() {
        let actuator = RecordingActuator::new();
        let (exec, hub) = executor(&actuator);
        let mut rx = hub.subscribe_actions();

        exec.execute(ActionSource::Gesture, ActionEvent::MoveCursor { x: 1, y: 1 }, None)
            .expect("move");
        exec.execute(ActionSource::Voice, ActionEvent::ClickLeft, Some("click"))
            .expect("click");

        let record = rx.try_recv().expect("one record");
        assert_eq!(record.action, ActionEvent::ClickLeft);
        assert_eq!(record.source, ActionSource::Voice);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn screenshot_goes_into_the_configured_directory() {
        let actuator = RecordingActuator::new();
        let (exec, _hub) = executor(&actuator);
        exec.execute(ActionSource::Keyboard, ActionEvent::CaptureScreenshot, None)
            .expect("screenshot");

        match actuator.calls().as_slice() {
            [ActuatorCall::Screenshot(path)] => {
                assert_eq!(path.parent(), Some(std::env::temp_dir().as_path()));
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                assert!(name.starts_with("screenshot_") && name.ends_with(".png"), "{name}");
            }
            other => panic!("unexpected calls: {other:?}"),
        }
    }

    #[test]
    fn screenshot_names_use_local_timestamp_and_avoid_collisions() {
        let dir = std::env::temp_dir().join(format!("handsfree-shots-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("create dir");
        let now = Local
            .with_ymd_and_hms(2024, 3, 9, 14, 5, 7)
            .single()
            .expect("unambiguous time");

        let first = screenshot_path(&dir, now);
        assert_eq!(
            first.file_name().and_then(|n| n.to_str()),
            Some("screenshot_20240309_140507.png")
        );
        std::fs::write(&first, b"png").expect("write");
        let second = screenshot_path(&dir, now);
        assert_eq!(
            second.file_name().and_then(|n| n.to_str()),
            Some("screenshot_20240309_140507_1.png")
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[derive(Clone)]
    struct FailingActuator;

    impl OutputActuator for FailingActuator {
        fn move_cursor_to(&mut self, _x: i32, _y: i32) -> Result<()> {
            Ok(())
        }
        fn mouse_down(&mut self) -> Result<()> {
            Ok(())
        }
        fn mouse_up(&mut self) -> Result<()> {
            Ok(())
        }
        fn click(&mut self, _button: MouseButton) -> Result<()> {
            Err(HandsfreeError::Actuator("permission denied".into()))
        }
        fn scroll(&mut self, _delta: i32) -> Result<()> {
            Ok(())
        }
        fn press_key_combo(&mut self, _keys: &[Key]) -> Result<()> {
            Ok(())
        }
        fn capture_screen_to_file(&mut self, _path: &Path) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failures_are_returned_and_published() {
        let hub = EventHub::new();
        let mut rx = hub.subscribe_actions();
        let exec = ActionExecutor::new(
            ActuatorHandle::new(FailingActuator),
            std::env::temp_dir(),
            hub,
        );
        assert!(exec
            .execute(ActionSource::Gesture, ActionEvent::ClickRight, None)
            .is_err());
        let record = rx.try_recv().expect("record");
        assert_eq!(
            record.error.as_deref(),
            Some("actuator error: permission denied")
        );
    }

    /// Input calls return at once; captures take `capture_time`.
    #[derive(Clone)]
    struct SlowCaptureActuator {
        capture_time: Duration,
        capture_started: std::sync::mpsc::SyncSender<()>,
    }

    impl OutputActuator for SlowCaptureActuator {
        fn move_cursor_to(&mut self, _x: i32, _y: i32) -> Result<()> {
            Ok(())
        }
        fn mouse_down(&mut self) -> Result<()> {
            Ok(())
        }
        fn mouse_up(&mut self) -> Result<()> {
            Ok(())
        }
        fn click(&mut self, _button: MouseButton) -> Result<()> {
            Ok(())
        }
        fn scroll(&mut self, _delta: i32) -> Result<()> {
            Ok(())
        }
        fn press_key_combo(&mut self, _keys: &[Key]) -> Result<()> {
            Ok(())
        }
        fn capture_screen_to_file(&mut self, _path: &Path) -> Result<()> {
            let _ = self.capture_started.try_send(());
            std::thread::sleep(self.capture_time);
            Ok(())
        }
    }

    #[test]
    fn slow_screen_capture_does_not_block_cursor_moves() {
        let (started_tx, started_rx) = std::sync::mpsc::sync_channel(1);
        let exec = ActionExecutor::new(
            ActuatorHandle::new(SlowCaptureActuator {
                capture_time: Duration::from_millis(600),
                capture_started: started_tx,
            }),
            std::env::temp_dir(),
            EventHub::new(),
        );

        let voice = exec.clone();
        let capture = std::thread::spawn(move || {
            voice.execute(ActionSource::Voice, ActionEvent::CaptureScreenshot, Some("screenshot"))
        });
        started_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("capture started");

        let t0 = Instant::now();
        exec.execute(ActionSource::Gesture, ActionEvent::MoveCursor { x: 10, y: 20 }, None)
            .expect("move");
        let waited = t0.elapsed();
        assert!(waited < Duration::from_millis(100), "cursor move waited {waited:?}");

        capture.join().expect("capture thread").expect("capture");
    }
}
