//! `StubRecognizer`: replays a fixed script instead of recognising audio.
//!
//! Used by tests and by the app's `recognizer = "stub"` mode so the voice
//! path can be exercised without a network service. Once the script runs
//! out every segment is reported as `NoSpeech`.

use std::collections::VecDeque;

use tracing::debug;

use super::{RecognitionError, SpeechRecognizer, VoicePhrase};
use crate::buffering::chunk::AudioChunk;

#[derive(Debug, Default)]
pub struct StubRecognizer {
    script: VecDeque<Result<String, RecognitionError>>,
    calls: usize,
}

impl StubRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recognise each of `phrases` in turn.
    pub fn with_phrases<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: phrases.into_iter().map(|p| Ok(p.into())).collect(),
            calls: 0,
        }
    }

    /// Queue an arbitrary outcome, including failures.
    pub fn push(&mut self, outcome: Result<String, RecognitionError>) {
        self.script.push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl SpeechRecognizer for StubRecognizer {
    fn recognize(&mut self, chunk: &AudioChunk) -> Result<VoicePhrase, RecognitionError> {
        self.calls += 1;
        debug!(
            samples = chunk.samples.len(),
            remaining = self.script.len(),
            "StubRecognizer::recognize"
        );
        let text = self.script.pop_front().unwrap_or(Err(RecognitionError::NoSpeech))?;
        VoicePhrase::new(&text, Some(1.0)).ok_or(RecognitionError::NoSpeech)
    }
}
