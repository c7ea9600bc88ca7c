//! Terminal key controls: M / V / S / Q (and Ctrl+C, Esc).
//!
//! Raw mode is needed to see single key presses, which also swallows the
//! terminal's own Ctrl+C handling; the reader maps it to `Quit`.

use std::io::Write;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Sender;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use handsfree_core::KeyCommand;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Restores cooked mode when dropped.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> std::io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("failed to restore terminal mode: {e}");
        }
    }
}

pub fn map_key(key: &KeyEvent) -> Option<KeyCommand> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyCommand::Quit)
        }
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'm' => Some(KeyCommand::ToggleMouse),
            'v' => Some(KeyCommand::ToggleVoice),
            's' => Some(KeyCommand::Screenshot),
            'q' => Some(KeyCommand::Quit),
            _ => None,
        },
        KeyCode::Esc => Some(KeyCommand::Quit),
        _ => None,
    }
}

/// Read keys on a background thread until `running` goes false or `Quit`
/// is pressed.
pub fn spawn_reader(
    keys: Sender<KeyCommand>,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("key-reader".into())
        .spawn(move || {
            let _raw = match RawModeGuard::enable() {
                Ok(guard) => guard,
                Err(e) => {
                    warn!("key controls unavailable: {e}");
                    return;
                }
            };
            while running.load(Ordering::Relaxed) {
                match event::poll(POLL_INTERVAL) {
                    Ok(false) => continue,
                    Ok(true) => {}
                    Err(e) => {
                        warn!("key poll failed: {e}");
                        break;
                    }
                }
                let Ok(Event::Key(key)) = event::read() else {
                    continue;
                };
                let Some(command) = map_key(&key) else {
                    continue;
                };
                debug!(?command, "key pressed");
                if keys.send(command).is_err() || command == KeyCommand::Quit {
                    break;
                }
            }
        })
}

/// Log writer for raw mode, where a bare `\n` does not return the carriage.
pub struct CrlfWriter<W: Write>(pub W);

impl<W: Write> Write for CrlfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut out = Vec::with_capacity(buf.len() + 8);
        for &byte in buf {
            if byte == b'\n' {
                out.push(b'\r');
            }
            out.push(byte);
        }
        self.0.write_all(&out)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}
