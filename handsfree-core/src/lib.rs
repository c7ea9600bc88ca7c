//! # handsfree-core
//!
//! Hands-free desktop control: hand gestures and spoken commands drive the
//! mouse and a handful of desktop shortcuts.
//!
//! ## Architecture
//!
//! ```text
//! LandmarkSource ─► GestureClassifier ─► ActionDispatcher ─┐
//!   (frame loop, caller's thread)          │ cursor         │
//!                                     CursorMapper          ├─► ActionExecutor ─► OutputActuator
//! Microphone ─► segmenter ─► SpeechRecognizer ─► CommandRouter ┘          │
//!   (voice listener thread)                                        EventHub (broadcast)
//!
//!                  SharedControlState: mouse / voice / drag flags
//! ```
//!
//! The audio callback is zero-alloc. All heap work happens on the listener
//! thread.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod action;
pub mod actuator;
pub mod audio;
pub mod buffering;
pub mod config;
pub mod cursor;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod gesture;
pub mod ipc;
pub mod landmark;
pub mod recognition;
pub mod state;
pub mod vad;
pub mod voice;

// Convenience re-exports for downstream crates
pub use action::{ActionEvent, EditKind};
pub use actuator::{ActionExecutor, ActuatorHandle, Key, MouseButton, OutputActuator, RecordingActuator};
pub use audio::{AudioSource, MicrophoneSource, OpenAudio};
pub use config::ControlConfig;
pub use cursor::{CursorMapper, ScreenPoint, ScreenSize};
pub use dispatcher::{ActionDispatcher, FrameActions};
pub use engine::{ControlEngine, KeyCommand};
pub use error::{HandsfreeError, Result};
pub use gesture::{FingerState, GestureClassifier, HandPose};
pub use ipc::events::{
    ActionRecord, ActionSource, StatusEvent, Subsystem, SubsystemStatus, VoiceActivityEvent,
};
pub use ipc::EventHub;
pub use landmark::{FrameSize, HandDetection, LandmarkFrame, LandmarkSource, Point, SourceFrame};
pub use recognition::{RecognitionError, RecognizerHandle, SpeechRecognizer, StubRecognizer, VoicePhrase};
pub use state::{ControlSnapshot, SharedControlState};
pub use voice::{CommandRouter, Intent, RouteOutcome, VoiceSegmentListener};

#[cfg(feature = "http-recognizer")]
pub use recognition::{HttpRecognizer, HttpRecognizerConfig};
