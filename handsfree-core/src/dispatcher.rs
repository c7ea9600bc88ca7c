//! `ActionDispatcher`: the per-frame gesture state machine.
//!
//! ## Rule order (evaluated once per camera frame)
//!
//! ```text
//! 0. owed release (external disable mid-drag)      → ReleaseLeft
//! 1. no hand      → ReleaseLeft if dragging, else flush an expired click
//! 2. open palm held ≥ auth_hold while disabled     → ToggleEnabled
//! 3. disabled     → nothing else
//! 4. pointer pose / pinch engaged                  → MoveCursor
//! 5. left pinch   → PressLeft / ReleaseLeft / ClickLeft / DoubleClickLeft
//! 6. right pinch  → ClickRight            (only when 5 is not engaged)
//! 7. scroll pose  → ScrollBy;  shortcuts  → CaptureScreenshot > ShowDesktop
//!                                           > MaximizeWindow
//! ```
//!
//! A frame yields at most one cursor move and at most one discrete action;
//! `FrameActions` cannot hold more. Every timer runs on the frame timestamp,
//! never on frame counts.
//!
//! ## Clicks
//!
//! A quick pinch (released before `drag_hold`) is held back as a pending click
//! for `double_click_window`. A second quick pinch inside the window turns it
//! into one `DoubleClickLeft`; otherwise the pending click goes out as
//! `ClickLeft` once the window lapses.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::{
    action::{ActionEvent, ActionKind},
    config::ControlConfig,
    cursor::{CursorMapper, ScreenPoint, ScreenSize},
    gesture::HandPose,
    landmark::FrameSize,
    state::{ControlFlags, SharedControlState},
};

/// Vertical middle-tip motion (px per frame) below which scrolling is ignored.
const SCROLL_DEADBAND_PX: f32 = 1.0;

/// Output of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameActions {
    pub cursor: Option<ScreenPoint>,
    pub action: Option<ActionEvent>,
}

impl FrameActions {
    fn only(action: ActionEvent) -> Self {
        Self {
            cursor: None,
            action: Some(action),
        }
    }

    /// Cursor move first, then the discrete action.
    pub fn events(&self) -> impl Iterator<Item = ActionEvent> {
        self.cursor
            .map(|p| {
                let (x, y) = p.rounded();
                ActionEvent::MoveCursor { x, y }
            })
            .into_iter()
            .chain(self.action)
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.is_none() && self.action.is_none()
    }
}

/// Result of the left-pinch rule.
struct LeftPinch {
    action: Option<ActionEvent>,
    /// The pinch owns this frame; lower-priority rules are skipped.
    engaged: bool,
}

pub struct ActionDispatcher {
    config: ControlConfig,
    state: SharedControlState,
    mapper: CursorMapper,
    pinch_started_at: Option<Instant>,
    /// Right pinch fired and has not been released yet.
    right_latched: bool,
    scroll_anchor_y: Option<f32>,
    seen_epoch: u64,
}

impl ActionDispatcher {
    pub fn new(config: &ControlConfig, screen: ScreenSize, state: SharedControlState) -> Self {
        Self {
            mapper: CursorMapper::new(
                screen,
                config.frame_reduction_margin,
                config.smoothing_factor,
            ),
            config: config.clone(),
            state,
            pinch_started_at: None,
            right_latched: false,
            scroll_anchor_y: None,
            seen_epoch: 0,
        }
    }

    pub fn state(&self) -> &SharedControlState {
        &self.state
    }

    /// Evaluate one frame. `hand` is `None` when no hand was detected.
    pub fn process(&mut self, hand: Option<&HandPose>, frame: FrameSize, now: Instant) -> FrameActions {
        let state = self.state.clone();
        let mut flags = state.lock();

        if flags.control_epoch != self.seen_epoch {
            self.seen_epoch = flags.control_epoch;
            self.clear_frame_timers();
            self.mapper.reset();
        }

        if flags.release_pending {
            flags.release_pending = false;
            info!("releasing left button after external disable");
            return FrameActions::only(ActionEvent::ReleaseLeft);
        }

        let Some(pose) = hand else {
            return self.on_hand_lost(&mut flags, now);
        };

        if let Some(toggle) = self.palm_hold(&mut flags, pose, now) {
            return FrameActions::only(toggle);
        }

        if !flags.mouse_enabled {
            self.clear_frame_timers();
            flags.last_click_at = None;
            return FrameActions::default();
        }

        let pinched = pose.distances.thumb_index < self.config.pinch_threshold;
        let cursor = if pose.fingers.is_pointer()
            || pinched
            || self.pinch_started_at.is_some()
            || flags.dragging
        {
            Some(self.mapper.map(pose.index_tip, frame))
        } else {
            None
        };

        // Scroll tracking runs every frame so the anchor stays fresh even
        // when a higher-priority rule claims the action slot.
        let scroll = self.track_scroll(pose);

        let left = self.left_pinch(&mut flags, pinched, now);
        let action = if left.engaged || left.action.is_some() {
            left.action
        } else {
            self.right_pinch(&mut flags, pose, now)
                .or(scroll)
                .or_else(|| self.shortcut(&mut flags, pose, now))
        };

        if let Some(action) = action {
            debug!(action = ?action, "gesture action");
        }
        FrameActions { cursor, action }
    }

    /// Release a held button, if any. Called when the frame loop exits.
    pub fn shutdown(&mut self) -> Option<ActionEvent> {
        let mut flags = self.state.lock();
        self.pinch_started_at = None;
        if flags.dragging || flags.release_pending {
            flags.dragging = false;
            flags.release_pending = false;
            return Some(ActionEvent::ReleaseLeft);
        }
        None
    }

    fn clear_frame_timers(&mut self) {
        self.pinch_started_at = None;
        self.right_latched = false;
        self.scroll_anchor_y = None;
    }

    fn on_hand_lost(&mut self, flags: &mut ControlFlags, now: Instant) -> FrameActions {
        self.clear_frame_timers();
        flags.palm_hold_started_at = None;
        flags.palm_hold_consumed = false;

        if flags.dragging {
            flags.dragging = false;
            info!("hand lost while dragging, releasing left button");
            return FrameActions::only(ActionEvent::ReleaseLeft);
        }
        if !flags.mouse_enabled {
            flags.last_click_at = None;
            return FrameActions::default();
        }
        FrameActions {
            cursor: None,
            action: self.flush_pending_click(flags, now),
        }
    }

    /// Open-palm hold that switches mouse control on. While enabled the open
    /// palm belongs to the maximize shortcut instead.
    fn palm_hold(
        &mut self,
        flags: &mut ControlFlags,
        pose: &HandPose,
        now: Instant,
    ) -> Option<ActionEvent> {
        if !pose.fingers.is_open_palm() {
            flags.palm_hold_started_at = None;
            flags.palm_hold_consumed = false;
            return None;
        }
        if flags.mouse_enabled || flags.palm_hold_consumed {
            flags.palm_hold_started_at = None;
            return None;
        }

        let started = *flags.palm_hold_started_at.get_or_insert(now);
        if elapsed(started, now) < self.config.auth_hold() {
            return None;
        }

        flags.palm_hold_started_at = None;
        flags.palm_hold_consumed = true;
        flags.mouse_enabled = true;
        flags.mark(ActionKind::ToggleEnabled, now);
        self.clear_frame_timers();
        self.mapper.reset();
        info!(
            held_ms = elapsed(started, now).as_millis() as u64,
            "open palm hold enabled mouse control"
        );
        Some(ActionEvent::ToggleEnabled)
    }

    fn left_pinch(&mut self, flags: &mut ControlFlags, pinched: bool, now: Instant) -> LeftPinch {
        let engaged = |action| LeftPinch {
            action,
            engaged: true,
        };

        if pinched {
            let started = *self.pinch_started_at.get_or_insert(now);
            if !flags.dragging && elapsed(started, now) >= self.config.drag_hold() {
                // A pending single click goes out first; the press follows on
                // the next frame while the pinch is still held.
                if flags.last_click_at.take().is_some() {
                    return engaged(Some(ActionEvent::ClickLeft));
                }
                flags.dragging = true;
                return engaged(Some(ActionEvent::PressLeft));
            }
            return engaged(self.flush_pending_click(flags, now));
        }

        let Some(started) = self.pinch_started_at.take() else {
            return LeftPinch {
                action: self.flush_pending_click(flags, now),
                engaged: false,
            };
        };

        if flags.dragging {
            flags.dragging = false;
            return engaged(Some(ActionEvent::ReleaseLeft));
        }
        if elapsed(started, now) >= self.config.drag_hold() {
            return engaged(None);
        }

        let mut flushed = None;
        if let Some(first) = flags.last_click_at.take() {
            if elapsed(first, now) <= self.config.double_click_window() {
                flags.mark(ActionKind::ClickLeft, now);
                return engaged(Some(ActionEvent::DoubleClickLeft));
            }
            flushed = Some(ActionEvent::ClickLeft);
        }

        if flags.cooled_down(ActionKind::ClickLeft, now, self.config.click_cooldown()) {
            flags.mark(ActionKind::ClickLeft, now);
            flags.last_click_at = Some(now);
        } else {
            debug!("quick pinch inside click cooldown ignored");
        }
        engaged(flushed)
    }

    fn flush_pending_click(&self, flags: &mut ControlFlags, now: Instant) -> Option<ActionEvent> {
        let first = flags.last_click_at?;
        if elapsed(first, now) > self.config.double_click_window() {
            flags.last_click_at = None;
            Some(ActionEvent::ClickLeft)
        } else {
            None
        }
    }

    fn right_pinch(
        &mut self,
        flags: &mut ControlFlags,
        pose: &HandPose,
        now: Instant,
    ) -> Option<ActionEvent> {
        if pose.distances.thumb_middle >= self.config.right_click_threshold() {
            self.right_latched = false;
            return None;
        }
        if self.right_latched
            || !flags.cooled_down(ActionKind::ClickRight, now, self.config.click_cooldown())
        {
            return None;
        }
        self.right_latched = true;
        flags.mark(ActionKind::ClickRight, now);
        Some(ActionEvent::ClickRight)
    }

    fn track_scroll(&mut self, pose: &HandPose) -> Option<ActionEvent> {
        if !pose.fingers.is_scroll() {
            self.scroll_anchor_y = None;
            return None;
        }
        let y = pose.middle_tip.y;
        let previous = self.scroll_anchor_y.replace(y)?;
        // Image y grows downward; moving the hand up scrolls up.
        let delta = previous - y;
        if delta.abs() <= SCROLL_DEADBAND_PX {
            return None;
        }
        let amount = (delta * self.config.scroll_sensitivity).round() as i32;
        (amount != 0).then_some(ActionEvent::ScrollBy { delta: amount })
    }

    fn shortcut(
        &mut self,
        flags: &mut ControlFlags,
        pose: &HandPose,
        now: Instant,
    ) -> Option<ActionEvent> {
        let fingers = &pose.fingers;
        let candidate = if fingers.is_screenshot() {
            ActionEvent::CaptureScreenshot
        } else if fingers.is_show_desktop() {
            ActionEvent::ShowDesktop
        } else if fingers.is_open_palm() && !flags.palm_hold_consumed {
            ActionEvent::MaximizeWindow
        } else {
            return None;
        };

        let cooldown = self.config.shortcut_cooldown();
        let ready = ActionKind::SHORTCUTS
            .iter()
            .all(|kind| flags.cooled_down(*kind, now, cooldown));
        if !ready {
            return None;
        }
        flags.mark(candidate.kind(), now);
        Some(candidate)
    }
}

fn elapsed(since: Instant, now: Instant) -> Duration {
    now.saturating_duration_since(since)
}
