//! `HttpRecognizer`: uploads each segment as WAV to an OpenAI-compatible
//! `/v1/audio/transcriptions` endpoint and reads back `{"text": ...}`.
//!
//! Runs on the voice listener thread, so the blocking reqwest client is fine.

use std::time::Duration;

use reqwest::blocking::{multipart, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{RecognitionError, SpeechRecognizer, VoicePhrase};
use crate::buffering::chunk::AudioChunk;
use crate::error::{HandsfreeError, Result};

/// Longest error body echoed into a `Rejected` message.
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct HttpRecognizerConfig {
    pub endpoint: String,
    /// Sent as a bearer token when present.
    pub api_key: Option<String>,
    pub model: String,
    /// BCP-47 language hint; omitted from the request when `None`.
    pub language: Option<String>,
    pub timeout_secs: u64,
}

impl Default for HttpRecognizerConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/audio/transcriptions".into(),
            api_key: None,
            model: "gpt-4o-mini-transcribe".into(),
            language: Some("en".into()),
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

pub struct HttpRecognizer {
    config: HttpRecognizerConfig,
    client: Client,
}

impl HttpRecognizer {
    pub fn new(config: HttpRecognizerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| HandsfreeError::Recognizer(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn form(&self, wav: Vec<u8>) -> std::result::Result<multipart::Form, RecognitionError> {
        let file = multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| RecognitionError::Rejected(e.to_string()))?;
        let mut form = multipart::Form::new()
            .text("model", self.config.model.clone())
            .text("response_format", "json")
            .part("file", file);
        if let Some(language) = &self.config.language {
            form = form.text("language", language.clone());
        }
        Ok(form)
    }
}

impl SpeechRecognizer for HttpRecognizer {
    fn recognize(&mut self, chunk: &AudioChunk) -> std::result::Result<VoicePhrase, RecognitionError> {
        if chunk.is_empty() {
            return Err(RecognitionError::NoSpeech);
        }
        let wav = chunk
            .to_wav_bytes()
            .map_err(|e| RecognitionError::Rejected(e.to_string()))?;

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .multipart(self.form(wav)?);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(|e| {
            warn!(error = %e, "transcription request failed");
            RecognitionError::Network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            warn!(%status, "transcription request returned non-success status");
            return Err(RecognitionError::Rejected(format!("{status}: {body}")));
        }

        let payload: TranscriptionResponse = response
            .json()
            .map_err(|e| RecognitionError::Rejected(format!("invalid response: {e}")))?;
        debug!(chars = payload.text.len(), "transcription received");
        classify_transcript(&payload.text)
    }
}

/// Map transcript text onto a phrase; blank or bracketed non-speech markers
/// such as `[BLANK_AUDIO]` count as no speech.
fn classify_transcript(text: &str) -> std::result::Result<VoicePhrase, RecognitionError> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') && trimmed.ends_with(']') {
        return Err(RecognitionError::NoSpeech);
    }
    VoicePhrase::new(trimmed, None).ok_or(RecognitionError::NoSpeech)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transcript_text_becomes_a_phrase() {
        let phrase = classify_transcript(" Take a Screenshot. ").expect("phrase");
        assert_eq!(phrase.text(), "take a screenshot");
        let phrase = classify_transcript("Right-click.").expect("phrase");
        assert_eq!(phrase.text(), "right click");
    }

    #[test]
    fn blank_and_marker_transcripts_are_no_speech() {
        assert_eq!(classify_transcript("   "), Err(RecognitionError::NoSpeech));
        assert_eq!(classify_transcript(" ... "), Err(RecognitionError::NoSpeech));
        assert_eq!(
            classify_transcript("[BLANK_AUDIO]"),
            Err(RecognitionError::NoSpeech)
        );
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let cfg: HttpRecognizerConfig =
            serde_json::from_str(r#"{"endpoint":"http://127.0.0.1:9/v1/audio/transcriptions"}"#)
                .expect("parse config");
        assert_eq!(cfg.model, "gpt-4o-mini-transcribe");
        assert_eq!(cfg.timeout_secs, 20);
        assert!(cfg.api_key.is_none());
    }

    #[test]
    fn unreachable_endpoint_is_a_network_error() {
        let mut recognizer = HttpRecognizer::new(HttpRecognizerConfig {
            endpoint: "http://127.0.0.1:9/v1/audio/transcriptions".into(),
            timeout_secs: 2,
            ..HttpRecognizerConfig::default()
        })
        .expect("client");
        let chunk = AudioChunk::new(vec![0.1; 1600], 16_000);
        assert!(matches!(
            recognizer.recognize(&chunk),
            Err(RecognitionError::Network(_))
        ));
    }

    #[test]
    fn empty_chunk_short_circuits() {
        let mut recognizer = HttpRecognizer::new(HttpRecognizerConfig::default()).expect("client");
        assert_eq!(
            recognizer.recognize(&AudioChunk::new(vec![], 16_000)),
            Err(RecognitionError::NoSpeech)
        );
    }
}
