//! The closed action vocabulary both input paths produce.

use serde::{Deserialize, Serialize};

/// Clipboard / history edit shortcuts reachable by voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditKind {
    Undo,
    Redo,
    Copy,
    Paste,
    Cut,
    SelectAll,
}

/// One host action. Produced by the gesture dispatcher, the voice router, or
/// the keyboard controls, and executed by `ActionExecutor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionEvent {
    MoveCursor { x: i32, y: i32 },
    PressLeft,
    ReleaseLeft,
    ClickLeft,
    DoubleClickLeft,
    ClickRight,
    /// Positive scrolls up.
    ScrollBy { delta: i32 },
    CaptureScreenshot,
    ShowDesktop,
    MaximizeWindow,
    MinimizeWindow,
    EditAction { kind: EditKind },
    /// Mouse control was switched on or off. State already updated.
    ToggleEnabled,
    /// Voice commands were switched on or off. State already updated.
    ToggleVoice,
    NoOp,
}

impl ActionEvent {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionEvent::MoveCursor { .. } => ActionKind::MoveCursor,
            ActionEvent::PressLeft => ActionKind::PressLeft,
            ActionEvent::ReleaseLeft => ActionKind::ReleaseLeft,
            ActionEvent::ClickLeft => ActionKind::ClickLeft,
            ActionEvent::DoubleClickLeft => ActionKind::DoubleClickLeft,
            ActionEvent::ClickRight => ActionKind::ClickRight,
            ActionEvent::ScrollBy { .. } => ActionKind::ScrollBy,
            ActionEvent::CaptureScreenshot => ActionKind::CaptureScreenshot,
            ActionEvent::ShowDesktop => ActionKind::ShowDesktop,
            ActionEvent::MaximizeWindow => ActionKind::MaximizeWindow,
            ActionEvent::MinimizeWindow => ActionKind::MinimizeWindow,
            ActionEvent::EditAction { .. } => ActionKind::EditAction,
            ActionEvent::ToggleEnabled => ActionKind::ToggleEnabled,
            ActionEvent::ToggleVoice => ActionKind::ToggleVoice,
            ActionEvent::NoOp => ActionKind::NoOp,
        }
    }

    /// Click-type events that must not fire while a drag holds the button.
    pub fn is_button_click(&self) -> bool {
        matches!(
            self,
            ActionEvent::ClickLeft | ActionEvent::DoubleClickLeft | ActionEvent::ClickRight
        )
    }

    /// Short text for status lines.
    pub fn label(&self) -> String {
        match self {
            ActionEvent::MoveCursor { x, y } => format!("move to ({x}, {y})"),
            ActionEvent::PressLeft => "drag start".into(),
            ActionEvent::ReleaseLeft => "drag end".into(),
            ActionEvent::ClickLeft => "left click".into(),
            ActionEvent::DoubleClickLeft => "double click".into(),
            ActionEvent::ClickRight => "right click".into(),
            ActionEvent::ScrollBy { delta } if *delta >= 0 => format!("scroll up {delta}"),
            ActionEvent::ScrollBy { delta } => format!("scroll down {}", delta.unsigned_abs()),
            ActionEvent::CaptureScreenshot => "screenshot".into(),
            ActionEvent::ShowDesktop => "show desktop".into(),
            ActionEvent::MaximizeWindow => "maximize".into(),
            ActionEvent::MinimizeWindow => "minimize".into(),
            ActionEvent::EditAction { kind } => format!("{kind:?}").to_lowercase(),
            ActionEvent::ToggleEnabled => "mouse toggled".into(),
            ActionEvent::ToggleVoice => "voice toggled".into(),
            ActionEvent::NoOp => "no-op".into(),
        }
    }
}

/// Payload-free discriminant, used as the cooldown map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    MoveCursor,
    PressLeft,
    ReleaseLeft,
    ClickLeft,
    DoubleClickLeft,
    ClickRight,
    ScrollBy,
    CaptureScreenshot,
    ShowDesktop,
    MaximizeWindow,
    MinimizeWindow,
    EditAction,
    ToggleEnabled,
    ToggleVoice,
    NoOp,
}

impl ActionKind {
    /// Gesture shortcuts that share one cooldown.
    pub const SHORTCUTS: [ActionKind; 3] = [
        ActionKind::CaptureScreenshot,
        ActionKind::ShowDesktop,
        ActionKind::MaximizeWindow,
    ];
}
