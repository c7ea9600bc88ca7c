//! Speech recognizer abstraction.
//!
//! The `SpeechRecognizer` trait decouples the voice listener from any
//! specific speech-to-text backend (scripted stub, HTTP transcription
//! service, a future on-device model).
//!
//! `&mut self` on `recognize` lets backends keep connection pools or decoder
//! caches; all calls are serialised through `RecognizerHandle`'s mutex.

pub mod stub;

#[cfg(feature = "http-recognizer")]
pub mod http;

#[cfg(feature = "http-recognizer")]
pub use http::{HttpRecognizer, HttpRecognizerConfig};
pub use stub::StubRecognizer;

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::buffering::chunk::AudioChunk;

/// Why a segment produced no phrase. Every variant is recoverable; the
/// listener logs it and keeps listening.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecognitionError {
    /// Audio was captured but contained no intelligible speech.
    #[error("no speech recognised")]
    NoSpeech,

    /// The recognizer could not be reached.
    #[error("recognizer unreachable: {0}")]
    Network(String),

    /// The recognizer answered but refused or failed the request.
    #[error("recognizer rejected the request: {0}")]
    Rejected(String),
}

/// Normalised recognizer output: lowercase, punctuation folded to single
/// spaces, never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct VoicePhrase {
    text: String,
    confidence: Option<f32>,
}

impl VoicePhrase {
    /// `None` when nothing but whitespace and punctuation remains.
    pub fn new(raw: &str, confidence: Option<f32>) -> Option<Self> {
        let text = crate::voice::router::normalize_phrase(raw);
        if text.is_empty() {
            return None;
        }
        Some(Self {
            text,
            confidence: confidence.filter(|c| c.is_finite()).map(|c| c.clamp(0.0, 1.0)),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn confidence(&self) -> Option<f32> {
        self.confidence
    }
}

/// Contract for speech-to-text backends.
pub trait SpeechRecognizer: Send + 'static {
    /// Turn one captured segment into a phrase.
    fn recognize(&mut self, chunk: &AudioChunk) -> Result<VoicePhrase, RecognitionError>;
}

/// Thread-safe handle to any `SpeechRecognizer`.
#[derive(Clone)]
pub struct RecognizerHandle(pub Arc<Mutex<dyn SpeechRecognizer>>);

impl RecognizerHandle {
    pub fn new<R: SpeechRecognizer>(recognizer: R) -> Self {
        Self(Arc::new(Mutex::new(recognizer)))
    }

    pub fn recognize(&self, chunk: &AudioChunk) -> Result<VoicePhrase, RecognitionError> {
        self.0.lock().recognize(chunk)
    }
}

impl std::fmt::Debug for RecognizerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognizerHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_is_trimmed_and_lowercased() {
        let phrase = VoicePhrase::new("  Scroll DOWN please \n", Some(0.8)).expect("non-empty");
        assert_eq!(phrase.text(), "scroll down please");
        assert_eq!(phrase.confidence(), Some(0.8));
    }

    #[test]
    fn blank_text_is_not_a_phrase() {
        assert!(VoicePhrase::new("   ", None).is_none());
        assert!(VoicePhrase::new("", Some(1.0)).is_none());
    }

    #[test]
    fn confidence_is_clamped_and_nan_dropped() {
        assert_eq!(
            VoicePhrase::new("copy", Some(1.7)).and_then(|p| p.confidence()),
            Some(1.0)
        );
        assert_eq!(
            VoicePhrase::new("copy", Some(f32::NAN)).and_then(|p| p.confidence()),
            None
        );
    }
}
