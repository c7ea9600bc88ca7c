//! Typed audio chunk passed from capture to the VAD and the recognizer.

use std::io::Cursor;

use crate::error::{HandsfreeError, Result};

/// A contiguous block of mono PCM samples at a known sample rate.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Mono f32 samples in [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g. 16000, 44100, 48000).
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Returns the duration of this chunk in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn rms(&self) -> f32 {
        rms(&self.samples)
    }

    /// Encode as a 16-bit mono WAV file in memory.
    pub fn to_wav_bytes(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::with_capacity(44 + self.samples.len() * 2));
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| HandsfreeError::Encoding(e.to_string()))?;
            for sample in &self.samples {
                let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                writer
                    .write_sample(pcm)
                    .map_err(|e| HandsfreeError::Encoding(e.to_string()))?;
            }
            writer
                .finalize()
                .map_err(|e| HandsfreeError::Encoding(e.to_string()))?;
        }
        Ok(cursor.into_inner())
    }
}

/// Root-mean-square of a sample slice; 0 for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Append `samples` to `buf`, keeping at most the newest `max_len` samples.
pub fn append_rolling_samples(buf: &mut Vec<f32>, samples: &[f32], max_len: usize) {
    if max_len == 0 || samples.is_empty() {
        return;
    }
    if samples.len() >= max_len {
        buf.clear();
        buf.extend_from_slice(&samples[samples.len() - max_len..]);
        return;
    }
    let needed = buf.len() + samples.len();
    if needed > max_len {
        buf.drain(..needed - max_len);
    }
    buf.extend_from_slice(samples);
}
