//! Speech commands: cut phrases from the microphone, recognise them and map
//! the text onto actions.

pub mod listener;
pub mod router;
pub mod segmenter;

pub use listener::{VoiceDiagnosticsSnapshot, VoiceSegmentListener};
pub use router::{match_intent, CommandRouter, Intent, RouteOutcome};
pub use segmenter::{Segment, SegmentLimits};
