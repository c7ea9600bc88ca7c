//! Lock-free SPSC ring buffer for microphone samples.
//!
//! Uses `ringbuf::HeapRb<f32>` which provides a wait-free `push_slice`
//! safe to call from the real-time audio callback.

pub mod chunk;

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Producer};

/// Producer half, held by the audio callback.
pub type AudioProducer = ringbuf::HeapProd<f32>;

/// Consumer half, held by the voice listener thread.
pub type AudioConsumer = ringbuf::HeapCons<f32>;

/// 2^20 samples ≈ 21.8 s at 48 kHz; longer than the phrase time limit so a
/// slow recognizer round trip does not drop audio.
pub const RING_CAPACITY: usize = 1 << 20;

pub fn create_audio_ring() -> (AudioProducer, AudioConsumer) {
    HeapRb::<f32>::new(RING_CAPACITY).split()
}
