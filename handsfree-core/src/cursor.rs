//! Camera-space → screen-space cursor mapping with exponential smoothing.
//!
//! ```text
//!  camera frame (w × h)             screen (W × H)
//!  ┌──────────────────┐            ┌────────────────────────┐
//!  │  margin          │            │                        │
//!  │   ┌──────────┐   │   linear   │                        │
//!  │   │  active  │───┼──────────► │        target          │
//!  │   └──────────┘   │            │                        │
//!  └──────────────────┘            └────────────────────────┘
//!
//!  smoothed = previous + (target - previous) / smoothing_factor
//! ```
//!
//! The inset rectangle lets the user reach the screen edges without moving
//! the hand to the very border of the camera image, where detection degrades.

use serde::{Deserialize, Serialize};

use crate::landmark::{FrameSize, Point};

/// Screen dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: f32,
    pub height: f32,
}

impl ScreenSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    fn max_x(&self) -> f32 {
        (self.width - 1.0).max(0.0)
    }

    fn max_y(&self) -> f32 {
        (self.height - 1.0).max(0.0)
    }
}

/// A cursor position in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    /// Whole-pixel coordinates for the actuator.
    pub fn rounded(self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

/// Owned by the frame path only; never shared with the voice loop.
#[derive(Debug, Clone)]
pub struct CursorMapper {
    screen: ScreenSize,
    margin: f32,
    smoothing: f32,
    previous: Option<ScreenPoint>,
}

impl CursorMapper {
    pub fn new(screen: ScreenSize, margin: f32, smoothing_factor: f32) -> Self {
        Self {
            screen,
            margin: margin.max(0.0),
            // Below 1 the filter would overshoot the target.
            smoothing: if smoothing_factor.is_finite() {
                smoothing_factor.max(1.0)
            } else {
                1.0
            },
            previous: None,
        }
    }

    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    /// Map a raw fingertip position to the next smoothed cursor position.
    pub fn map(&mut self, raw: Point, frame: FrameSize) -> ScreenPoint {
        let target = self.target(raw, frame);
        let next = match self.previous {
            None => target,
            Some(prev) => ScreenPoint {
                x: prev.x + (target.x - prev.x) / self.smoothing,
                y: prev.y + (target.y - prev.y) / self.smoothing,
            },
        };
        let next = ScreenPoint {
            x: next.x.clamp(0.0, self.screen.max_x()),
            y: next.y.clamp(0.0, self.screen.max_y()),
        };
        self.previous = Some(next);
        next
    }

    /// Last emitted position, if any.
    pub fn current(&self) -> Option<ScreenPoint> {
        self.previous
    }

    /// Forget the previous sample; the next `map` snaps straight to its target.
    pub fn reset(&mut self) {
        self.previous = None;
    }

    fn target(&self, raw: Point, frame: FrameSize) -> ScreenPoint {
        ScreenPoint {
            x: interpolate(raw.x, frame.width, self.margin, self.screen.max_x()),
            y: interpolate(raw.y, frame.height, self.margin, self.screen.max_y()),
        }
    }
}

/// Clip `value` into `[margin, extent - margin]` and scale onto `[0, out_max]`.
/// A margin that leaves no active span falls back to the full extent.
fn interpolate(value: f32, extent: f32, margin: f32, out_max: f32) -> f32 {
    let (lo, hi) = if extent - 2.0 * margin > 1.0 {
        (margin, extent - margin)
    } else {
        (0.0, extent.max(1.0))
    };
    let value = if value.is_finite() { value } else { lo };
    let t = (value.clamp(lo, hi) - lo) / (hi - lo);
    t * out_max
}
