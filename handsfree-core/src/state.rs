//! `SharedControlState`: the one mutable record both input loops touch.
//!
//! Everything lives behind a single `parking_lot::Mutex` so readers always see
//! a consistent `(mouse_enabled, dragging)` pair. The gesture dispatcher holds
//! the lock for its whole per-frame evaluation; toggles coming from the voice
//! loop or the keyboard therefore land strictly between two frames.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};

use crate::action::ActionKind;

/// The shared fields. Only reachable through `SharedControlState`.
#[derive(Debug, Default)]
pub struct ControlFlags {
    pub mouse_enabled: bool,
    pub voice_enabled: bool,
    /// `true` between an emitted `PressLeft` and its `ReleaseLeft`.
    pub dragging: bool,
    /// Start of the current open-palm hold, if one is being timed.
    pub palm_hold_started_at: Option<Instant>,
    /// The current open-palm hold already toggled; re-arms once fewer than
    /// five fingers are up.
    pub palm_hold_consumed: bool,
    /// A quick left pinch waiting for a possible second tap.
    pub last_click_at: Option<Instant>,
    /// Most recent time each action kind fired, for cooldowns.
    pub last_action_at: HashMap<ActionKind, Instant>,
    /// An external disable interrupted a drag; the frame path owes a
    /// `ReleaseLeft`.
    pub release_pending: bool,
    /// Bumped on every external toggle so the frame path can drop its
    /// frame-local timers.
    pub control_epoch: u64,
}

impl ControlFlags {
    pub fn cooled_down(&self, kind: ActionKind, now: Instant, cooldown: std::time::Duration) -> bool {
        self.last_action_at
            .get(&kind)
            .map_or(true, |at| now.saturating_duration_since(*at) >= cooldown)
    }

    pub fn mark(&mut self, kind: ActionKind, now: Instant) {
        self.last_action_at.insert(kind, now);
    }

    /// Flip `mouse_enabled` from outside the frame path and clear in-progress
    /// gesture timers. A drag in progress becomes a pending release so the
    /// button is never left down.
    fn set_mouse_enabled(&mut self, enabled: bool) -> bool {
        if self.mouse_enabled == enabled {
            return false;
        }
        self.mouse_enabled = enabled;
        if !enabled && self.dragging {
            self.dragging = false;
            self.release_pending = true;
        }
        self.palm_hold_started_at = None;
        self.last_click_at = None;
        self.control_epoch = self.control_epoch.wrapping_add(1);
        true
    }
}

/// Point-in-time copy for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSnapshot {
    pub mouse_enabled: bool,
    pub voice_enabled: bool,
    pub dragging: bool,
}

/// Cheaply cloneable handle; every clone refers to the same record.
#[derive(Debug, Clone, Default)]
pub struct SharedControlState(Arc<Mutex<ControlFlags>>);

impl SharedControlState {
    /// Everything off: mouse control and voice commands both disabled.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_voice_enabled(self, enabled: bool) -> Self {
        self.0.lock().voice_enabled = enabled;
        self
    }

    pub fn snapshot(&self) -> ControlSnapshot {
        let flags = self.0.lock();
        ControlSnapshot {
            mouse_enabled: flags.mouse_enabled,
            voice_enabled: flags.voice_enabled,
            dragging: flags.dragging,
        }
    }

    pub fn mouse_enabled(&self) -> bool {
        self.0.lock().mouse_enabled
    }

    pub fn voice_enabled(&self) -> bool {
        self.0.lock().voice_enabled
    }

    pub fn dragging(&self) -> bool {
        self.0.lock().dragging
    }

    /// Returns `true` when the value actually changed.
    pub fn set_mouse_enabled(&self, enabled: bool) -> bool {
        self.0.lock().set_mouse_enabled(enabled)
    }

    /// Returns the new value.
    pub fn toggle_mouse_enabled(&self) -> bool {
        let mut flags = self.0.lock();
        let next = !flags.mouse_enabled;
        flags.set_mouse_enabled(next);
        next
    }

    /// Returns `true` when the value actually changed.
    pub fn set_voice_enabled(&self, enabled: bool) -> bool {
        let mut flags = self.0.lock();
        if flags.voice_enabled == enabled {
            return false;
        }
        flags.voice_enabled = enabled;
        true
    }

    /// Returns the new value.
    pub fn toggle_voice_enabled(&self) -> bool {
        let mut flags = self.0.lock();
        flags.voice_enabled = !flags.voice_enabled;
        flags.voice_enabled
    }

    /// Exclusive access for one evaluation step. Keep the guard short-lived.
    pub(crate) fn lock(&self) -> MutexGuard<'_, ControlFlags> {
        self.0.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_all_disabled() {
        let state = SharedControlState::new();
        assert_eq!(
            state.snapshot(),
            ControlSnapshot {
                mouse_enabled: false,
                voice_enabled: false,
                dragging: false
            }
        );
    }

    #[test]
    fn clones_share_one_record() {
        let a = SharedControlState::new();
        let b = a.clone();
        assert!(a.toggle_mouse_enabled());
        assert!(b.mouse_enabled());
        assert!(!b.toggle_mouse_enabled());
        assert!(!a.mouse_enabled());
    }

    #[test]
    fn disabling_mid_drag_owes_a_release_and_clears_timers() {
        let state = SharedControlState::new();
        let now = Instant::now();
        {
            let mut flags = state.lock();
            flags.mouse_enabled = true;
            flags.dragging = true;
            flags.palm_hold_started_at = Some(now);
            flags.last_click_at = Some(now);
        }

        assert!(state.set_mouse_enabled(false));

        let flags = state.lock();
        assert!(!flags.dragging);
        assert!(flags.release_pending);
        assert!(flags.palm_hold_started_at.is_none());
        assert!(flags.last_click_at.is_none());
        assert_eq!(flags.control_epoch, 1);
    }

    #[test]
    fn setting_the_same_value_is_idempotent() {
        let state = SharedControlState::new();
        assert!(!state.set_mouse_enabled(false));
        assert!(state.set_voice_enabled(true));
        assert!(!state.set_voice_enabled(true));
        assert_eq!(state.lock().control_epoch, 0);
    }

    #[test]
    fn cooldowns_are_tracked_per_kind() {
        let state = SharedControlState::new();
        let t0 = Instant::now();
        let mut flags = state.lock();
        assert!(flags.cooled_down(ActionKind::ClickRight, t0, Duration::from_millis(250)));
        flags.mark(ActionKind::ClickRight, t0);
        assert!(!flags.cooled_down(
            ActionKind::ClickRight,
            t0 + Duration::from_millis(100),
            Duration::from_millis(250)
        ));
        assert!(flags.cooled_down(
            ActionKind::ClickLeft,
            t0 + Duration::from_millis(100),
            Duration::from_millis(250)
        ));
        assert!(flags.cooled_down(
            ActionKind::ClickRight,
            t0 + Duration::from_millis(250),
            Duration::from_millis(250)
        ));
    }
}
