//! Frame-local hand pose classification.
//!
//! ## Extension test
//!
//! ```text
//!   tip ●          axis = normalize(middle_mcp - wrist)
//!       │
//!   pip ●          extended ⇔ (tip - wrist)·axis > (pip - wrist)·axis + margin
//!       │          margin   = extension_margin × |middle_mcp - wrist|
//!   mcp ●
//!       ╲
//!        ● wrist
//! ```
//!
//! Projecting on the wrist → middle-MCP axis keeps the test stable when the
//! hand is tilted. The thumb uses its IP joint in place of a PIP. Nothing here
//! keeps state between frames.

use crate::landmark::{index, Finger, LandmarkFrame, Point};

/// Default margin as a fraction of palm length (wrist → middle MCP).
pub const DEFAULT_EXTENSION_MARGIN: f32 = 0.1;

/// Which fingers are extended in the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FingerState {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

impl FingerState {
    /// Build from `[thumb, index, middle, ring, pinky]`.
    pub const fn from_array(fingers: [bool; 5]) -> Self {
        Self {
            thumb: fingers[0],
            index: fingers[1],
            middle: fingers[2],
            ring: fingers[3],
            pinky: fingers[4],
        }
    }

    pub fn is_extended(&self, finger: Finger) -> bool {
        match finger {
            Finger::Thumb => self.thumb,
            Finger::Index => self.index,
            Finger::Middle => self.middle,
            Finger::Ring => self.ring,
            Finger::Pinky => self.pinky,
        }
    }

    pub fn count(&self) -> usize {
        Finger::ALL.iter().filter(|f| self.is_extended(**f)).count()
    }

    /// All five fingers up.
    pub fn is_open_palm(&self) -> bool {
        self.count() == 5
    }

    /// Index up, middle/ring/pinky folded. The thumb is free so a pinch can
    /// form while pointing.
    pub fn is_pointer(&self) -> bool {
        self.index && !self.middle && !self.ring && !self.pinky
    }

    /// Index and middle up, ring and pinky folded.
    pub fn is_scroll(&self) -> bool {
        self.index && self.middle && !self.ring && !self.pinky
    }

    /// Index, middle and ring up; thumb and pinky folded.
    pub fn is_screenshot(&self) -> bool {
        !self.thumb && self.index && self.middle && self.ring && !self.pinky
    }

    /// Four fingers up with the thumb folded.
    pub fn is_show_desktop(&self) -> bool {
        !self.thumb && self.index && self.middle && self.ring && self.pinky
    }
}

/// Pixel distances between the fingertips the click gestures care about.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometricDistances {
    pub thumb_index: f32,
    pub thumb_middle: f32,
}

/// Classifier output for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct HandPose {
    pub fingers: FingerState,
    pub distances: GeometricDistances,
    /// Raw index fingertip; drives the cursor.
    pub index_tip: Point,
    /// Raw middle fingertip; drives scrolling.
    pub middle_tip: Point,
}

#[derive(Debug, Clone, Copy)]
pub struct GestureClassifier {
    extension_margin: f32,
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSION_MARGIN)
    }
}

impl GestureClassifier {
    pub fn new(extension_margin: f32) -> Self {
        Self {
            extension_margin: extension_margin.max(0.0),
        }
    }

    pub fn classify(&self, frame: &LandmarkFrame) -> HandPose {
        let wrist = frame.wrist();
        let middle_mcp = frame.point(index::MIDDLE_MCP);
        let (ax, ay) = (middle_mcp.x - wrist.x, middle_mcp.y - wrist.y);
        let palm_len = ax.hypot(ay);
        // Degenerate palm: fall back to image-up.
        let axis = if palm_len > f32::EPSILON {
            (ax / palm_len, ay / palm_len)
        } else {
            (0.0, -1.0)
        };
        let margin = self.extension_margin * palm_len;
        let project = |p: Point| (p.x - wrist.x) * axis.0 + (p.y - wrist.y) * axis.1;

        let extended = |finger: Finger| {
            project(frame.tip(finger)) > project(frame.proximal(finger)) + margin
        };

        let thumb_tip = frame.tip(Finger::Thumb);
        let index_tip = frame.tip(Finger::Index);
        let middle_tip = frame.tip(Finger::Middle);

        HandPose {
            fingers: FingerState {
                thumb: extended(Finger::Thumb),
                index: extended(Finger::Index),
                middle: extended(Finger::Middle),
                ring: extended(Finger::Ring),
                pinky: extended(Finger::Pinky),
            },
            distances: GeometricDistances {
                thumb_index: thumb_tip.distance(index_tip),
                thumb_middle: thumb_tip.distance(middle_tip),
            },
            index_tip,
            middle_tip,
        }
    }
}

/// Synthetic upright hands for unit tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use crate::landmark::{index, Finger, LandmarkFrame, Point, LANDMARK_COUNT};

    /// An upright hand whose middle MCP sits at `(cx, cy)`, palm length 100 px.
    pub fn hand_at(cx: f32, cy: f32, up: [bool; 5]) -> LandmarkFrame {
        let mut pts = [Point::default(); LANDMARK_COUNT];
        pts[index::WRIST] = Point::new(cx, cy + 100.0);

        pts[index::THUMB_CMC] = Point::new(cx - 30.0, cy + 70.0);
        pts[index::THUMB_MCP] = Point::new(cx - 40.0, cy + 45.0);
        pts[index::THUMB_IP] = Point::new(cx - 45.0, cy + 20.0);
        pts[index::THUMB_TIP] = if up[0] {
            Point::new(cx - 55.0, cy - 20.0)
        } else {
            Point::new(cx - 20.0, cy + 40.0)
        };

        let columns = [
            (Finger::Index, -20.0),
            (Finger::Middle, 0.0),
            (Finger::Ring, 20.0),
            (Finger::Pinky, 40.0),
        ];
        for (slot, (finger, dx)) in columns.into_iter().enumerate() {
            let x = cx + dx;
            let mcp = finger.proximal() - 1;
            pts[mcp] = Point::new(x, cy);
            pts[finger.proximal()] = Point::new(x, cy - 30.0);
            pts[finger.proximal() + 1] = Point::new(x, cy - 55.0);
            pts[finger.tip()] = if up[slot + 1] {
                Point::new(x, cy - 80.0)
            } else {
                Point::new(x, cy - 10.0)
            };
        }
        LandmarkFrame::new(pts)
    }

    /// Pointer hand with the thumb tip moved onto the index tip.
    pub fn pinch_at(cx: f32, cy: f32) -> LandmarkFrame {
        let mut pts = *hand_at(cx, cy, [false, true, false, false, false]).points();
        let tip = pts[index::INDEX_TIP];
        pts[index::THUMB_TIP] = Point::new(tip.x - 5.0, tip.y + 5.0);
        LandmarkFrame::new(pts)
    }

    /// Pointer hand with the thumb tip moved onto the middle tip.
    pub fn right_pinch_at(cx: f32, cy: f32) -> LandmarkFrame {
        let mut pts = *hand_at(cx, cy, [false, true, false, false, false]).points();
        let tip = pts[index::MIDDLE_TIP];
        pts[index::THUMB_TIP] = Point::new(tip.x + 3.0, tip.y + 3.0);
        LandmarkFrame::new(pts)
    }
}
