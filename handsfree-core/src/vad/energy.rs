//! Energy-based VAD using an RMS threshold plus a hangover counter.
//!
//! ## Algorithm
//!
//! 1. Compute RMS of the incoming window.
//! 2. If RMS ≥ `threshold` → `Speech`, reload the hangover counter.
//! 3. If RMS < `threshold` and hangover remains → `Speech`, decrement.
//! 4. Otherwise → `Silence`.
//!
//! `calibrate` raises the threshold above the measured room noise but never
//! lowers it below the configured floor.

use tracing::info;

use super::{VadDecision, VoiceActivityDetector};
use crate::buffering::chunk::{rms, AudioChunk};

/// Threshold is at least this multiple of the ambient RMS after calibration.
pub const AMBIENT_HEADROOM: f32 = 1.5;

#[derive(Debug, Clone)]
pub struct EnergyVad {
    /// Configured minimum threshold.
    floor: f32,
    /// Effective threshold (floor, possibly raised by calibration).
    threshold: f32,
    hangover_windows: u32,
    hangover_counter: u32,
}

impl EnergyVad {
    /// `threshold` is an RMS level in the f32 sample range; `hangover_windows`
    /// is how many quiet windows still count as speech after real speech.
    pub fn new(threshold: f32, hangover_windows: u32) -> Self {
        let threshold = threshold.max(0.0);
        Self {
            floor: threshold,
            threshold,
            hangover_windows,
            hangover_counter: 0,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(0.02, 8)
    }
}

impl VoiceActivityDetector for EnergyVad {
    fn classify(&mut self, chunk: &AudioChunk) -> VadDecision {
        if rms(&chunk.samples) >= self.threshold && !chunk.is_empty() {
            self.hangover_counter = self.hangover_windows;
            VadDecision::Speech
        } else if self.hangover_counter > 0 {
            self.hangover_counter -= 1;
            VadDecision::Speech
        } else {
            VadDecision::Silence
        }
    }

    fn calibrate(&mut self, ambient: &AudioChunk) {
        let ambient_rms = ambient.rms();
        self.threshold = self.floor.max(ambient_rms * AMBIENT_HEADROOM);
        info!(
            ambient_rms,
            threshold = self.threshold,
            "energy threshold calibrated"
        );
    }

    fn reset(&mut self) {
        self.hangover_counter = 0;
    }
}
