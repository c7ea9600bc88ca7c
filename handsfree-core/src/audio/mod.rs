//! Microphone capture via cpal, exposed to the voice listener as an
//! `AudioSource`.
//!
//! # Design constraints
//!
//! The cpal input callback runs on an OS audio thread at elevated priority.
//! It must not allocate per call, block, or perform I/O, so it only
//! down-mixes into a reusable scratch buffer and pushes into the SPSC ring.
//!
//! # Threading note
//!
//! `cpal::Stream` is `!Send` on macOS and Windows. `MicrophoneSource` must be
//! opened and dropped on the same thread; the voice listener does both inside
//! its own worker thread via an `OpenAudio` factory.

pub mod resample;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

#[cfg(feature = "audio-cpal")]
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, SampleRate, SizedSample, Stream, StreamConfig,
};
#[cfg(feature = "audio-cpal")]
use tracing::error;
use tracing::{info, warn};

use crate::{
    buffering::{create_audio_ring, AudioConsumer, AudioProducer, Consumer},
    error::{HandsfreeError, Result},
};

/// Sleep between polls of an empty ring.
const EMPTY_POLL: Duration = Duration::from_millis(5);

/// A pull-based mono sample source.
pub trait AudioSource {
    fn sample_rate(&self) -> u32;

    /// Append up to `max` samples to `out`, waiting at most `wait` for the
    /// first one. Returns how many were appended; `0` means nothing arrived.
    fn read(&mut self, out: &mut Vec<f32>, max: usize, wait: Duration) -> Result<usize>;
}

/// Opens an `AudioSource` on the calling thread.
pub type OpenAudio = Arc<dyn Fn() -> Result<Box<dyn AudioSource>> + Send + Sync>;

/// Handle to an active cpal input stream feeding a ring buffer.
///
/// **Not `Send`**. Create and drop on the same OS thread.
pub struct AudioCapture {
    #[cfg(feature = "audio-cpal")]
    _stream: Stream,
    running: Arc<AtomicBool>,
    /// Actual capture sample rate reported by the device (Hz).
    pub sample_rate: u32,
}

#[cfg(feature = "audio-cpal")]
trait MonoSample: SizedSample + Send + 'static {
    fn to_f32(self) -> f32;
}

#[cfg(feature = "audio-cpal")]
impl MonoSample for f32 {
    fn to_f32(self) -> f32 {
        self
    }
}

#[cfg(feature = "audio-cpal")]
impl MonoSample for i16 {
    fn to_f32(self) -> f32 {
        self as f32 / 32768.0
    }
}

#[cfg(feature = "audio-cpal")]
impl MonoSample for u8 {
    fn to_f32(self) -> f32 {
        (self as f32 - 128.0) / 128.0
    }
}

#[cfg(feature = "audio-cpal")]
fn build_mono_stream<T: MonoSample>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut producer: AudioProducer,
    running: Arc<AtomicBool>,
) -> std::result::Result<Stream, cpal::BuildStreamError> {
    use crate::buffering::Producer;

    let channels = config.channels.max(1) as usize;
    let mut mono: Vec<f32> = Vec::new();
    device.build_input_stream(
        config,
        move |data: &[T], _info| {
            if !running.load(Ordering::Relaxed) {
                return;
            }
            let frames = data.len() / channels;
            mono.resize(frames, 0.0);
            for (f, slot) in mono.iter_mut().enumerate() {
                let base = f * channels;
                let sum: f32 = data[base..base + channels].iter().map(|s| s.to_f32()).sum();
                *slot = sum / channels as f32;
            }
            let written = producer.push_slice(&mono);
            if written < mono.len() {
                warn!(dropped = mono.len() - written, "microphone ring full");
            }
        },
        |err| error!("audio stream error: {err}"),
        None,
    )
}

impl AudioCapture {
    /// Open the input device named `preferred_device_name`, else the default
    /// input, else the first input the host lists.
    #[cfg(feature = "audio-cpal")]
    pub fn open_with_preference(
        producer: AudioProducer,
        running: Arc<AtomicBool>,
        preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        let host = cpal::default_host();

        let preferred = preferred_device_name.and_then(|wanted| {
            let found = host
                .input_devices()
                .ok()?
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false));
            if found.is_none() {
                warn!(wanted, "preferred microphone not found, falling back");
            }
            found
        });

        let device = match preferred.or_else(|| host.default_input_device()) {
            Some(device) => device,
            None => host
                .input_devices()
                .map_err(|e| HandsfreeError::AudioDevice(e.to_string()))?
                .next()
                .ok_or(HandsfreeError::NoDefaultInputDevice)?,
        };

        info!(
            device = device.name().unwrap_or_default().as_str(),
            "opening microphone"
        );

        let supported = device
            .default_input_config()
            .map_err(|e| HandsfreeError::AudioDevice(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let config = StreamConfig {
            channels: supported.channels(),
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        info!(sample_rate, channels = config.channels, "microphone config selected");

        let flag = Arc::clone(&running);
        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_mono_stream::<f32>(&device, &config, producer, flag),
            SampleFormat::I16 => build_mono_stream::<i16>(&device, &config, producer, flag),
            SampleFormat::U8 => build_mono_stream::<u8>(&device, &config, producer, flag),
            other => {
                return Err(HandsfreeError::AudioStream(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        }
        .map_err(|e| HandsfreeError::AudioStream(e.to_string()))?;

        stream
            .play()
            .map_err(|e| HandsfreeError::AudioStream(e.to_string()))?;

        Ok(Self {
            _stream: stream,
            running,
            sample_rate,
        })
    }

    #[cfg(not(feature = "audio-cpal"))]
    pub fn open_with_preference(
        _producer: AudioProducer,
        _running: Arc<AtomicBool>,
        _preferred_device_name: Option<&str>,
    ) -> Result<Self> {
        Err(HandsfreeError::AudioStream(
            "compiled without audio-cpal feature".into(),
        ))
    }

    /// Signal the callback to no-op on its next invocation.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// The system microphone as an `AudioSource`.
pub struct MicrophoneSource {
    capture: AudioCapture,
    consumer: AudioConsumer,
    scratch: Vec<f32>,
}

impl MicrophoneSource {
    pub fn open(preferred_device_name: Option<&str>) -> Result<Self> {
        let (producer, consumer) = create_audio_ring();
        let running = Arc::new(AtomicBool::new(true));
        let capture = AudioCapture::open_with_preference(producer, running, preferred_device_name)?;
        Ok(Self {
            capture,
            consumer,
            scratch: vec![0.0; 4096],
        })
    }

    /// Factory for the voice listener; the device is opened on its thread.
    pub fn opener(preferred_device_name: Option<String>) -> OpenAudio {
        Arc::new(move || {
            let source = MicrophoneSource::open(preferred_device_name.as_deref())?;
            Ok(Box::new(source) as Box<dyn AudioSource>)
        })
    }
}

impl AudioSource for MicrophoneSource {
    fn sample_rate(&self) -> u32 {
        self.capture.sample_rate
    }

    fn read(&mut self, out: &mut Vec<f32>, max: usize, wait: Duration) -> Result<usize> {
        let deadline = Instant::now() + wait;
        let want = max.min(self.scratch.len());
        loop {
            let n = self.consumer.pop_slice(&mut self.scratch[..want]);
            if n > 0 {
                out.extend_from_slice(&self.scratch[..n]);
                return Ok(n);
            }
            if Instant::now() >= deadline {
                return Ok(0);
            }
            std::thread::sleep(EMPTY_POLL);
        }
    }
}

impl Drop for MicrophoneSource {
    fn drop(&mut self) {
        self.capture.stop();
        info!("microphone released");
    }
}
