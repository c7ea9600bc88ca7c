//! Voice Activity Detection (VAD) abstraction.
//!
//! The segmenter only needs a per-window speech/silence decision, so the
//! detector is a trait and tests can script it.

pub mod energy;

pub use energy::EnergyVad;

use crate::buffering::chunk::AudioChunk;

/// Whether a given audio window contains speech or silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadDecision {
    Speech,
    /// Below threshold, hangover included.
    Silence,
}

impl VadDecision {
    pub fn is_speech(self) -> bool {
        self == VadDecision::Speech
    }
}

/// Implementors may be stateful (hangover counters, adaptive thresholds).
pub trait VoiceActivityDetector: Send + 'static {
    /// Analyse a window and return a speech/silence decision.
    fn classify(&mut self, chunk: &AudioChunk) -> VadDecision;

    /// Adapt to the room using a window known to contain no speech.
    /// Detectors without a notion of ambient level ignore it.
    fn calibrate(&mut self, _ambient: &AudioChunk) {}

    /// Reset any per-segment state (e.g. hangover counters).
    fn reset(&mut self);
}
