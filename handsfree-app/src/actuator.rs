//! OS input injection with enigo.
//!
//! `Enigo` holds platform handles that must stay on the thread that created
//! them, so a dedicated "enigo" thread owns it and `EnigoActuator` forwards
//! each call over a channel and waits for the result.

use std::path::Path;
use std::process::Command;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use enigo::{Axis, Button, Coordinate, Direction, Enigo, Keyboard, Mouse, Settings};
use handsfree_core::{HandsfreeError, Key, MouseButton, OutputActuator, Result, ScreenSize};
use tracing::{debug, info};

/// Gap between the two clicks of a double click.
const DOUBLE_CLICK_GAP: Duration = Duration::from_millis(40);
/// Modifier settle time before and after the main key of a combo.
const MODIFIER_SETTLE: Duration = Duration::from_millis(10);

type Job = Box<dyn FnOnce(&mut Enigo) -> std::result::Result<(), String> + Send>;

struct Request {
    job: Job,
    reply: mpsc::Sender<std::result::Result<(), String>>,
}

/// Clones share the input thread. Screen captures run on the caller's thread.
#[derive(Clone)]
pub struct EnigoActuator {
    jobs: Sender<Request>,
}

impl EnigoActuator {
    /// Start the input thread. Returns the actuator and the main display size.
    pub fn open() -> Result<(Self, ScreenSize)> {
        let (jobs, job_rx) = crossbeam_channel::unbounded::<Request>();
        let (open_tx, open_rx) = mpsc::channel::<std::result::Result<(i32, i32), String>>();

        thread::Builder::new()
            .name("enigo".into())
            .spawn(move || {
                let mut enigo = match Enigo::new(&Settings::default()) {
                    Ok(enigo) => enigo,
                    Err(e) => {
                        let _ = open_tx.send(Err(format!("failed to initialize enigo: {e}")));
                        return;
                    }
                };
                let _ = open_tx.send(enigo.main_display().map_err(|e| e.to_string()));
                // Exits once every sender is gone.
                for request in job_rx {
                    let _ = request.reply.send((request.job)(&mut enigo));
                }
                debug!("enigo thread stopped");
            })?;

        let (width, height) = open_rx
            .recv()
            .map_err(|_| HandsfreeError::Actuator("enigo thread died during startup".into()))?
            .map_err(HandsfreeError::Actuator)?;
        info!(width, height, "input injection ready");
        Ok((Self { jobs }, ScreenSize::new(width as f32, height as f32)))
    }

    fn run<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce(&mut Enigo) -> std::result::Result<(), String> + Send + 'static,
    {
        let (reply, reply_rx) = mpsc::channel();
        self.jobs
            .send(Request {
                job: Box::new(job),
                reply,
            })
            .map_err(|_| HandsfreeError::Actuator("input thread is gone".into()))?;
        reply_rx
            .recv()
            .map_err(|_| HandsfreeError::Actuator("input thread is gone".into()))?
            .map_err(HandsfreeError::Actuator)
    }
}

fn button(button: MouseButton) -> Button {
    match button {
        MouseButton::Left => Button::Left,
        MouseButton::Right => Button::Right,
    }
}

fn enigo_key(key: Key) -> enigo::Key {
    match key {
        Key::Meta => enigo::Key::Meta,
        Key::Control => enigo::Key::Control,
        Key::Shift => enigo::Key::Shift,
        Key::Alt => enigo::Key::Alt,
        Key::F11 => enigo::Key::F11,
        Key::Char(c) => enigo::Key::Unicode(c),
    }
}

impl OutputActuator for EnigoActuator {
    fn move_cursor_to(&mut self, x: i32, y: i32) -> Result<()> {
        self.run(move |enigo| {
            enigo
                .move_mouse(x, y, Coordinate::Abs)
                .map_err(|e| format!("move cursor: {e}"))
        })
    }

    fn mouse_down(&mut self) -> Result<()> {
        self.run(|enigo| {
            enigo
                .button(Button::Left, Direction::Press)
                .map_err(|e| format!("mouse down: {e}"))
        })
    }

    fn mouse_up(&mut self) -> Result<()> {
        self.run(|enigo| {
            enigo
                .button(Button::Left, Direction::Release)
                .map_err(|e| format!("mouse up: {e}"))
        })
    }

    fn click(&mut self, which: MouseButton) -> Result<()> {
        self.run(move |enigo| {
            enigo
                .button(button(which), Direction::Click)
                .map_err(|e| format!("click: {e}"))
        })
    }

    fn double_click(&mut self) -> Result<()> {
        self.run(|enigo| {
            enigo
                .button(Button::Left, Direction::Click)
                .map_err(|e| format!("double click: {e}"))?;
            thread::sleep(DOUBLE_CLICK_GAP);
            enigo
                .button(Button::Left, Direction::Click)
                .map_err(|e| format!("double click: {e}"))
        })
    }

    fn scroll(&mut self, delta: i32) -> Result<()> {
        // enigo scrolls down for positive lengths.
        self.run(move |enigo| {
            enigo
                .scroll(-delta, Axis::Vertical)
                .map_err(|e| format!("scroll: {e}"))
        })
    }

    fn press_key_combo(&mut self, keys: &[Key]) -> Result<()> {
        let keys: Vec<enigo::Key> = keys.iter().copied().map(enigo_key).collect();
        self.run(move |enigo| {
            let Some((main, modifiers)) = keys.split_last() else {
                return Ok(());
            };
            for modifier in modifiers {
                enigo
                    .key(*modifier, Direction::Press)
                    .map_err(|e| format!("press modifier: {e}"))?;
            }
            thread::sleep(MODIFIER_SETTLE);
            let clicked = enigo
                .key(*main, Direction::Click)
                .map_err(|e| format!("press key: {e}"));
            thread::sleep(MODIFIER_SETTLE);
            // Release even if the main key failed so no modifier sticks.
            for modifier in modifiers.iter().rev() {
                enigo
                    .key(*modifier, Direction::Release)
                    .map_err(|e| format!("release modifier: {e}"))?;
            }
            clicked
        })
    }

    fn capture_screen_to_file(&mut self, path: &Path) -> Result<()> {
        capture_screen(path)
    }
}

#[cfg(target_os = "macos")]
fn capture_screen(path: &Path) -> Result<()> {
    let status = Command::new("screencapture").arg("-x").arg(path).status()?;
    if status.success() {
        Ok(())
    } else {
        Err(HandsfreeError::Actuator(format!("screencapture exited with {status}")))
    }
}

#[cfg(not(target_os = "macos"))]
fn capture_screen(path: &Path) -> Result<()> {
    // ImageMagick's `import` is the most widely installed X11 grabber.
    let status = Command::new("import")
        .args(["-window", "root"])
        .arg(path)
        .status()
        .map_err(|e| HandsfreeError::Actuator(format!("screen capture tool unavailable: {e}")))?;
    if status.success() {
        Ok(())
    } else {
        Err(HandsfreeError::Actuator(format!("import exited with {status}")))
    }
}
