//! `CommandRouter`: maps a recognised phrase onto the action vocabulary.
//!
//! Matching is substring containment against `COMMAND_TABLE`, scanned top to
//! bottom; the first intent with a matching variant wins. The table is the
//! whole whitelist: text that matches nothing produces no action.

use tracing::{debug, info};

use crate::{
    action::{ActionEvent, EditKind},
    recognition::VoicePhrase,
    state::SharedControlState,
};

/// Canonical voice intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    VoiceOn,
    VoiceOff,
    RightClick,
    DoubleClick,
    LeftClick,
    ScrollUp,
    ScrollDown,
    Screenshot,
    EnableMouse,
    DisableMouse,
    Maximize,
    Minimize,
    ShowDesktop,
    Undo,
    Redo,
    Copy,
    Paste,
    Cut,
    SelectAll,
}

/// Intents in priority order with their accepted phrase variants.
///
/// Longer, more specific phrases sit above the short words they contain
/// ("right click" above "click", "voice off" above "disable").
pub const COMMAND_TABLE: &[(Intent, &[&str])] = &[
    (Intent::VoiceOn, &["voice on", "enable voice", "start voice"]),
    (Intent::VoiceOff, &["voice off", "disable voice", "stop voice", "mute voice"]),
    (Intent::RightClick, &["right click", "context menu"]),
    (Intent::DoubleClick, &["double click", "double tap"]),
    (Intent::LeftClick, &["left click", "click", "tap"]),
    (Intent::ScrollUp, &["scroll up"]),
    (Intent::ScrollDown, &["scroll down"]),
    (Intent::Screenshot, &["screenshot", "screen shot", "take picture", "snap"]),
    (Intent::EnableMouse, &["enable", "start", "activate"]),
    (Intent::DisableMouse, &["disable", "stop", "pause"]),
    (Intent::Maximize, &["maximize", "maximise"]),
    (Intent::Minimize, &["minimize", "minimise"]),
    (Intent::ShowDesktop, &["show desktop", "desktop"]),
    (Intent::Undo, &["undo"]),
    (Intent::Redo, &["redo"]),
    (Intent::Copy, &["copy"]),
    (Intent::Paste, &["paste"]),
    (Intent::Cut, &["cut"]),
    (Intent::SelectAll, &["select all", "select everything"]),
];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '\''
}

/// Lowercase, turn punctuation (hyphens included) into spaces and collapse
/// runs of whitespace. Transcribers write "Right-click." for "right click".
pub fn normalize_phrase(text: &str) -> String {
    let spaced: String = text
        .chars()
        .map(|c| if is_word_char(c) { c } else { ' ' })
        .collect();
    spaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// First intent whose variant occurs in `text` after normalisation.
pub fn match_intent(text: &str) -> Option<Intent> {
    let text = normalize_phrase(text);
    if text.is_empty() {
        return None;
    }
    COMMAND_TABLE
        .iter()
        .find(|(_, variants)| variants.iter().any(|v| text.contains(v)))
        .map(|(intent, _)| *intent)
}

/// What the router did with one phrase.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RouteOutcome {
    /// Execute this action.
    Action(Intent, ActionEvent),
    /// A control intent that found the state already as requested.
    Unchanged(Intent),
    /// Voice commands are off and this was not "voice on".
    VoiceDisabled(Intent),
    /// A pointer-button intent while a gesture drag holds the button.
    SuppressedByDrag(Intent),
    /// No whitelist entry matched.
    Unrecognized,
}

impl RouteOutcome {
    pub fn action(&self) -> Option<ActionEvent> {
        match self {
            RouteOutcome::Action(_, action) => Some(*action),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandRouter {
    state: SharedControlState,
    scroll_step: i32,
}

impl CommandRouter {
    pub fn new(state: SharedControlState, scroll_step: i32) -> Self {
        Self {
            state,
            scroll_step: scroll_step.max(1),
        }
    }

    pub fn route(&self, phrase: &VoicePhrase) -> RouteOutcome {
        self.route_text(phrase.text())
    }

    /// Route raw lowercase text. Control intents mutate the shared state
    /// here; everything else is returned for the caller to execute.
    pub fn route_text(&self, text: &str) -> RouteOutcome {
        let Some(intent) = match_intent(text) else {
            debug!(text, "no voice command matched");
            return RouteOutcome::Unrecognized;
        };

        if intent != Intent::VoiceOn && !self.state.voice_enabled() {
            debug!(?intent, "voice commands disabled, ignoring");
            return RouteOutcome::VoiceDisabled(intent);
        }

        let action = match intent {
            Intent::VoiceOn | Intent::VoiceOff => {
                let enable = intent == Intent::VoiceOn;
                if !self.state.set_voice_enabled(enable) {
                    return RouteOutcome::Unchanged(intent);
                }
                info!(enabled = enable, "voice commands toggled by voice");
                ActionEvent::ToggleVoice
            }
            Intent::EnableMouse | Intent::DisableMouse => {
                let enable = intent == Intent::EnableMouse;
                if !self.state.set_mouse_enabled(enable) {
                    return RouteOutcome::Unchanged(intent);
                }
                info!(enabled = enable, "mouse control toggled by voice");
                ActionEvent::ToggleEnabled
            }
            Intent::RightClick => ActionEvent::ClickRight,
            Intent::DoubleClick => ActionEvent::DoubleClickLeft,
            Intent::LeftClick => ActionEvent::ClickLeft,
            Intent::ScrollUp => ActionEvent::ScrollBy {
                delta: self.scroll_step,
            },
            Intent::ScrollDown => ActionEvent::ScrollBy {
                delta: -self.scroll_step,
            },
            Intent::Screenshot => ActionEvent::CaptureScreenshot,
            Intent::Maximize => ActionEvent::MaximizeWindow,
            Intent::Minimize => ActionEvent::MinimizeWindow,
            Intent::ShowDesktop => ActionEvent::ShowDesktop,
            Intent::Undo => edit(EditKind::Undo),
            Intent::Redo => edit(EditKind::Redo),
            Intent::Copy => edit(EditKind::Copy),
            Intent::Paste => edit(EditKind::Paste),
            Intent::Cut => edit(EditKind::Cut),
            Intent::SelectAll => edit(EditKind::SelectAll),
        };

        if action.is_button_click() && self.state.dragging() {
            debug!(?intent, "button click suppressed during gesture drag");
            return RouteOutcome::SuppressedByDrag(intent);
        }
        RouteOutcome::Action(intent, action)
    }
}

fn edit(kind: EditKind) -> ActionEvent {
    ActionEvent::EditAction { kind }
}
