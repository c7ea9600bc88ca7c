//! Sample-rate conversion using a rubato `FastFixedIn` resampler.
//!
//! Microphones usually run at 44.1 or 48 kHz while recognizers want 16 kHz.
//! `RateConverter` bridges that on the listener thread, where allocation is
//! allowed. Equal rates take a passthrough path with no rubato session.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::{error, info};

use crate::error::{HandsfreeError, Result};

/// Sample rate handed to speech recognizers.
pub const RECOGNIZER_SAMPLE_RATE: u32 = 16_000;

pub struct RateConverter {
    /// `None` in passthrough mode.
    resampler: Option<FastFixedIn<f32>>,
    /// Input held back until a full `chunk_size` block is available.
    pending: Vec<f32>,
    chunk_size: usize,
    output_buf: Vec<Vec<f32>>,
    capture_rate: u32,
    target_rate: u32,
}

impl RateConverter {
    pub fn new(capture_rate: u32, target_rate: u32, chunk_size: usize) -> Result<Self> {
        if capture_rate == target_rate {
            return Ok(Self {
                resampler: None,
                pending: Vec::new(),
                chunk_size,
                output_buf: Vec::new(),
                capture_rate,
                target_rate,
            });
        }
        if capture_rate == 0 || target_rate == 0 || chunk_size == 0 {
            return Err(HandsfreeError::AudioDevice(format!(
                "invalid resampler setup: {capture_rate} Hz -> {target_rate} Hz, chunk {chunk_size}"
            )));
        }

        let ratio = target_rate as f64 / capture_rate as f64;
        let resampler =
            FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, chunk_size, 1)
                .map_err(|e| HandsfreeError::AudioDevice(format!("resampler init: {e}")))?;
        let output_buf = vec![vec![0f32; resampler.output_frames_max()]; 1];

        info!(capture_rate, target_rate, chunk_size, "resampling enabled");

        Ok(Self {
            resampler: Some(resampler),
            pending: Vec::new(),
            chunk_size,
            output_buf,
            capture_rate,
            target_rate,
        })
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    pub fn is_passthrough(&self) -> bool {
        self.resampler.is_none()
    }

    /// Convert `samples` and append the output to `out`. Input that does not
    /// fill a whole block is kept for the next call.
    pub fn process_into(&mut self, samples: &[f32], out: &mut Vec<f32>) {
        let Some(resampler) = self.resampler.as_mut() else {
            out.extend_from_slice(samples);
            return;
        };

        self.pending.extend_from_slice(samples);
        let mut consumed = 0;
        while self.pending.len() - consumed >= self.chunk_size {
            let block = &self.pending[consumed..consumed + self.chunk_size];
            match resampler.process_into_buffer(&[block], &mut self.output_buf, None) {
                Ok((_, produced)) => out.extend_from_slice(&self.output_buf[0][..produced]),
                Err(e) => error!("resampler process error: {e}"),
            }
            consumed += self.chunk_size;
        }
        self.pending.drain(..consumed);
    }

    /// Convert one complete clip. The tail is zero-padded to a whole block and
    /// the output trimmed back to the clip's length at the target rate.
    pub fn convert_all(&mut self, samples: &[f32]) -> Vec<f32> {
        if self.is_passthrough() {
            return samples.to_vec();
        }
        self.clear();
        let capture_rate = self.capture_rate;
        let expected = (samples.len() as f64 * self.target_rate as f64 / capture_rate as f64)
            .round() as usize;
        let mut out = Vec::with_capacity(expected + self.chunk_size);
        self.process_into(samples, &mut out);
        if !self.pending.is_empty() {
            let pad = vec![0.0; self.chunk_size - self.pending.len()];
            self.process_into(&pad, &mut out);
        }
        out.truncate(expected);
        self.clear();
        out
    }

    /// Drop held-back input, e.g. between voice segments.
    pub fn clear(&mut self) {
        self.pending.clear();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_identity() {
        let mut rc = RateConverter::new(16_000, 16_000, 960).expect("converter");
        assert!(rc.is_passthrough());
        let samples: Vec<f32> = (0..480).map(|i| i as f32 * 0.001).collect();
        let mut out = Vec::new();
        rc.process_into(&samples, &mut out);
        assert_eq!(out, samples);
    }

    #[test]
    fn downsampling_48k_produces_about_a_third() {
        let mut rc = RateConverter::new(48_000, 16_000, 960).expect("converter");
        let mut out = Vec::new();
        rc.process_into(&vec![0.0f32; 960], &mut out);
        assert!(
            (out.len() as isize - 320).unsigned_abs() <= 10,
            "output len={}",
            out.len()
        );
    }

    #[test]
    fn partial_blocks_accumulate_until_full() {
        let mut rc = RateConverter::new(48_000, 16_000, 960).expect("converter");
        let mut out = Vec::new();
        rc.process_into(&vec![0.0f32; 500], &mut out);
        assert!(out.is_empty());
        rc.process_into(&vec![0.0f32; 500], &mut out);
        assert!(!out.is_empty());
    }

    #[test]
    fn clear_discards_held_input() {
        let mut rc = RateConverter::new(48_000, 16_000, 960).expect("converter");
        let mut out = Vec::new();
        rc.process_into(&vec![0.0f32; 900], &mut out);
        rc.clear();
        rc.process_into(&vec![0.0f32; 100], &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn whole_clip_conversion_keeps_the_clip_length() {
        let mut rc = RateConverter::new(48_000, 16_000, 960).expect("converter");
        let out = rc.convert_all(&vec![0.1f32; 4_500]);
        // The resampler delay can eat into the tail; never overshoot.
        assert!(out.len() <= 1_500);
        assert!(out.len() >= 1_000, "output len={}", out.len());

        let mut same = RateConverter::new(16_000, 16_000, 960).expect("converter");
        assert_eq!(same.convert_all(&[0.5; 7]), vec![0.5; 7]);
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(RateConverter::new(0, 16_000, 960).is_err());
    }
}
