//! Hand landmark frames and the contract for whatever produces them.
//!
//! A `LandmarkFrame` holds the 21 keypoints of one detected hand in camera
//! pixel space, using the MediaPipe hand model's anatomical indices. Frames
//! are immutable once built and are consumed within the frame that produced
//! them.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{HandsfreeError, Result};

/// Number of keypoints in one hand.
pub const LANDMARK_COUNT: usize = 21;

/// Landmark indices (MediaPipe hand landmark model convention).
pub mod index {
    pub const WRIST: usize = 0;
    pub const THUMB_CMC: usize = 1;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_IP: usize = 3;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_DIP: usize = 7;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_DIP: usize = 11;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_DIP: usize = 15;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_DIP: usize = 19;
    pub const PINKY_TIP: usize = 20;
}

/// A 2-D position in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    pub fn tip(self) -> usize {
        match self {
            Finger::Thumb => index::THUMB_TIP,
            Finger::Index => index::INDEX_TIP,
            Finger::Middle => index::MIDDLE_TIP,
            Finger::Ring => index::RING_TIP,
            Finger::Pinky => index::PINKY_TIP,
        }
    }

    /// The proximal joint the tip is compared against: IP for the thumb,
    /// PIP for the others.
    pub fn proximal(self) -> usize {
        match self {
            Finger::Thumb => index::THUMB_IP,
            Finger::Index => index::INDEX_PIP,
            Finger::Middle => index::MIDDLE_PIP,
            Finger::Ring => index::RING_PIP,
            Finger::Pinky => index::PINKY_PIP,
        }
    }
}

/// The 21 keypoints of one hand for one camera frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkFrame {
    points: [Point; LANDMARK_COUNT],
}

impl LandmarkFrame {
    pub fn new(points: [Point; LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    /// Build a frame from a detector's point list.
    ///
    /// # Errors
    /// `HandsfreeError::MalformedFrame` when the slice is not exactly 21 long.
    pub fn from_slice(points: &[Point]) -> Result<Self> {
        let points: [Point; LANDMARK_COUNT] =
            points
                .try_into()
                .map_err(|_| HandsfreeError::MalformedFrame {
                    expected: LANDMARK_COUNT,
                    got: points.len(),
                })?;
        Ok(Self { points })
    }

    pub fn point(&self, idx: usize) -> Point {
        self.points[idx]
    }

    pub fn points(&self) -> &[Point; LANDMARK_COUNT] {
        &self.points
    }

    pub fn wrist(&self) -> Point {
        self.points[index::WRIST]
    }

    pub fn tip(&self, finger: Finger) -> Point {
        self.points[finger.tip()]
    }

    pub fn proximal(&self, finger: Finger) -> Point {
        self.points[finger.proximal()]
    }
}

/// Camera frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: f32,
    pub height: f32,
}

impl FrameSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// One hand reported by the detector together with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct HandDetection {
    pub landmarks: LandmarkFrame,
    /// Detector score in [0, 1].
    pub confidence: f32,
}

/// Everything the frame loop receives for one camera frame.
#[derive(Debug, Clone)]
pub struct SourceFrame {
    /// When the frame was captured. All gesture timers run on this clock.
    pub captured_at: Instant,
    pub size: FrameSize,
    /// `None` when no hand was found in the frame.
    pub hand: Option<HandDetection>,
}

/// Contract for the camera + landmark model pair.
///
/// Implementations own the camera. Dropping the source must release it.
pub trait LandmarkSource: Send {
    /// Block until the next frame is available.
    ///
    /// Returns `Ok(None)` when the stream has ended normally.
    ///
    /// # Errors
    /// `HandsfreeError::CameraUnavailable` when the camera disappears; the
    /// frame loop treats this as fatal for the gesture subsystem.
    fn next_frame(&mut self) -> Result<Option<SourceFrame>>;
}
