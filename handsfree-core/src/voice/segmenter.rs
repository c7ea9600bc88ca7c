//! Cut one spoken phrase out of a live sample stream.
//!
//! ```text
//!  waiting ──speech──► in phrase ──silence (after hangover)──► done
//!     │                    │
//!  listen_timeout     phrase_time_limit ──► done (truncated)
//!     ▼
//!  Timeout
//! ```
//!
//! Time is measured on the audio itself (samples consumed) and on the wall
//! clock; whichever runs out first wins, so a stalled device still times
//! out. The shutdown flag is checked after every bounded read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::{
    audio::AudioSource,
    buffering::chunk::{append_rolling_samples, rms, AudioChunk},
    error::Result,
    vad::VoiceActivityDetector,
};

/// Longest single blocking read.
const READ_WAIT: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentLimits {
    /// Give up if no speech starts within this long.
    pub listen_timeout: Duration,
    /// Cut the phrase off after this long.
    pub phrase_time_limit: Duration,
    /// VAD window length.
    pub window: Duration,
    /// Audio kept from before speech onset so the first syllable survives.
    pub pre_roll: Duration,
}

impl Default for SegmentLimits {
    fn default() -> Self {
        Self {
            listen_timeout: Duration::from_secs(5),
            phrase_time_limit: Duration::from_secs(10),
            window: Duration::from_millis(30),
            pre_roll: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Segment {
    /// Captured phrase at the source's sample rate.
    Speech { chunk: AudioChunk, peak_rms: f32 },
    /// No speech began within `listen_timeout`.
    Timeout,
    /// The shutdown flag was cleared.
    Cancelled,
}

fn samples_for(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * sample_rate as f64).round() as usize
}

/// Read `duration` of ambient audio for VAD calibration.
pub fn record_ambient(
    source: &mut dyn AudioSource,
    duration: Duration,
    running: &AtomicBool,
) -> Result<Option<AudioChunk>> {
    let rate = source.sample_rate();
    let wanted = samples_for(duration, rate);
    let deadline = Instant::now() + duration + READ_WAIT * 4;
    let mut samples = Vec::with_capacity(wanted);
    while samples.len() < wanted {
        if !running.load(Ordering::Relaxed) {
            return Ok(None);
        }
        if Instant::now() >= deadline {
            break;
        }
        let remaining = wanted - samples.len();
        source.read(&mut samples, remaining, READ_WAIT)?;
    }
    samples.truncate(wanted);
    Ok(Some(AudioChunk::new(samples, rate)))
}

/// Block until one phrase is captured, the listen timeout passes, or
/// `running` goes false.
pub fn capture_segment(
    source: &mut dyn AudioSource,
    vad: &mut dyn VoiceActivityDetector,
    limits: &SegmentLimits,
    running: &AtomicBool,
) -> Result<Segment> {
    let rate = source.sample_rate();
    let window_len = samples_for(limits.window, rate).max(1);
    let pre_roll_len = samples_for(limits.pre_roll, rate);
    let onset_budget = samples_for(limits.listen_timeout, rate);
    let phrase_budget = samples_for(limits.phrase_time_limit, rate);

    vad.reset();
    let started = Instant::now();
    let mut pending: Vec<f32> = Vec::with_capacity(window_len * 4);
    let mut pre_roll: Vec<f32> = Vec::with_capacity(pre_roll_len);
    let mut phrase: Vec<f32> = Vec::new();
    let mut phrase_started: Option<Instant> = None;
    let mut waited = 0usize;
    let mut peak = 0f32;

    loop {
        if !running.load(Ordering::Relaxed) {
            return Ok(Segment::Cancelled);
        }

        match phrase_started {
            None if waited >= onset_budget || started.elapsed() >= limits.listen_timeout => {
                return Ok(Segment::Timeout);
            }
            Some(at)
                if phrase.len() >= phrase_budget || at.elapsed() >= limits.phrase_time_limit =>
            {
                debug!(samples = phrase.len(), "phrase time limit reached");
                return Ok(finish(phrase, rate, peak));
            }
            _ => {}
        }

        source.read(&mut pending, window_len * 4, READ_WAIT)?;

        let mut offset = 0;
        while pending.len() - offset >= window_len {
            let window = &pending[offset..offset + window_len];
            offset += window_len;
            let decision = vad.classify(&AudioChunk::new(window.to_vec(), rate));

            if phrase_started.is_none() {
                if decision.is_speech() {
                    debug!("speech onset");
                    phrase_started = Some(Instant::now());
                    phrase.append(&mut pre_roll);
                    phrase.extend_from_slice(window);
                    peak = peak.max(rms(window));
                } else {
                    waited += window_len;
                    append_rolling_samples(&mut pre_roll, window, pre_roll_len);
                }
                continue;
            }

            phrase.extend_from_slice(window);
            peak = peak.max(rms(window));
            if !decision.is_speech() {
                return Ok(finish(phrase, rate, peak));
            }
            if phrase.len() >= phrase_budget {
                break;
            }
        }
        pending.drain(..offset);
    }
}

fn finish(samples: Vec<f32>, rate: u32, peak_rms: f32) -> Segment {
    Segment::Speech {
        chunk: AudioChunk::new(samples, rate),
        peak_rms,
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::time::Duration;

    use crate::audio::AudioSource;
    use crate::error::Result;

    /// Serves pre-recorded blocks, then silence (or nothing, if `starve`).
    pub struct ScriptedAudio {
        pub rate: u32,
        pub blocks: VecDeque<Vec<f32>>,
        pub starve: bool,
        pub reads: usize,
    }

    impl ScriptedAudio {
        pub fn new(rate: u32, blocks: Vec<Vec<f32>>) -> Self {
            Self {
                rate,
                blocks: blocks.into(),
                starve: false,
                reads: 0,
            }
        }
    }

    impl AudioSource for ScriptedAudio {
        fn sample_rate(&self) -> u32 {
            self.rate
        }

        fn read(&mut self, out: &mut Vec<f32>, max: usize, wait: Duration) -> Result<usize> {
            self.reads += 1;
            if let Some(block) = self.blocks.pop_front() {
                out.extend_from_slice(&block);
                return Ok(block.len());
            }
            if self.starve {
                std::thread::sleep(wait);
                return Ok(0);
            }
            out.extend(std::iter::repeat(0.0).take(max));
            Ok(max)
        }
    }
}
