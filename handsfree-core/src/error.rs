use thiserror::Error;

/// All errors produced by handsfree-core.
#[derive(Debug, Error)]
pub enum HandsfreeError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("audio stream error: {0}")]
    AudioStream(String),

    #[error("no default input device found")]
    NoDefaultInputDevice,

    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("landmark source error: {0}")]
    LandmarkSource(String),

    #[error("malformed landmark frame: expected {expected} points, got {got}")]
    MalformedFrame { expected: usize, got: usize },

    #[error("actuator error: {0}")]
    Actuator(String),

    #[error("speech recognizer setup failed: {0}")]
    Recognizer(String),

    #[error("audio encoding error: {0}")]
    Encoding(String),

    #[error("voice listener is already running")]
    AlreadyRunning,

    #[error("voice listener is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, HandsfreeError>;
