//! Events published on the engine's broadcast channels.
//!
//! | Event | Subscription |
//! |-------|--------------|
//! | `ActionRecord` | `ControlEngine::subscribe_actions` |
//! | `StatusEvent` | `ControlEngine::subscribe_status` |
//! | `VoiceActivityEvent` | `ControlEngine::subscribe_voice_activity` |
//!
//! Cursor moves are never published; at camera frame rate they would flood
//! every subscriber.

use serde::{Deserialize, Serialize};

use crate::action::ActionEvent;

// ---------------------------------------------------------------------------
// Action records
// ---------------------------------------------------------------------------

/// Which input path produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionSource {
    Gesture,
    Voice,
    Keyboard,
}

/// One executed (or attempted) non-move action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    /// Monotonically increasing across both input paths.
    pub seq: u64,
    pub source: ActionSource,
    pub action: ActionEvent,
    /// Recognised text, for voice actions.
    pub phrase: Option<String>,
    /// Actuator error text if execution failed.
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Voice activity
// ---------------------------------------------------------------------------

/// Emitted once per captured voice segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceActivityEvent {
    pub seq: u64,
    /// Peak window RMS of the segment in [0.0, 1.0].
    pub peak_rms: f32,
    pub duration_ms: u64,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subsystem {
    Camera,
    Voice,
    Actuator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubsystemStatus {
    Starting,
    Running,
    /// A recoverable failure; the loop keeps going.
    Degraded,
    Stopped,
    /// Startup failed; this subsystem stays down.
    Error,
}

/// Human-facing status line, the text an overlay would show.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEvent {
    pub subsystem: Subsystem,
    pub status: SubsystemStatus,
    pub detail: Option<String>,
}

impl StatusEvent {
    pub fn new(subsystem: Subsystem, status: SubsystemStatus, detail: Option<String>) -> Self {
        Self {
            subsystem,
            status,
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::EditKind;

    #[test]
    fn action_record_serializes_with_camel_case_and_tagged_action() {
        let record = ActionRecord {
            seq: 4,
            source: ActionSource::Voice,
            action: ActionEvent::EditAction {
                kind: EditKind::Paste,
            },
            phrase: Some("paste that".into()),
            error: None,
        };

        let json = serde_json::to_value(&record).expect("serialize action record");
        assert_eq!(json["seq"], 4);
        assert_eq!(json["source"], "voice");
        assert_eq!(json["action"]["type"], "editAction");
        assert_eq!(json["action"]["kind"], "paste");
        assert_eq!(json["phrase"], "paste that");
        assert!(json["error"].is_null());

        let back: ActionRecord = serde_json::from_value(json).expect("deserialize action record");
        assert_eq!(back.action, record.action);
        assert_eq!(back.source, ActionSource::Voice);
    }

    #[test]
    fn status_event_uses_lowercase_enums() {
        let event = StatusEvent::new(
            Subsystem::Voice,
            SubsystemStatus::Degraded,
            Some("recognizer unreachable".into()),
        );
        let json = serde_json::to_value(&event).expect("serialize status event");
        assert_eq!(json["subsystem"], "voice");
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["detail"], "recognizer unreachable");
    }

    #[test]
    fn subsystem_status_rejects_other_casing() {
        assert!(serde_json::from_str::<SubsystemStatus>(r#""Running""#).is_err());
        assert_eq!(
            serde_json::from_str::<SubsystemStatus>(r#""running""#).expect("lowercase"),
            SubsystemStatus::Running
        );
    }

    #[test]
    fn voice_activity_event_fields_are_camel_case() {
        let event = VoiceActivityEvent {
            seq: 2,
            peak_rms: 0.25,
            duration_ms: 1200,
        };
        let json = serde_json::to_value(&event).expect("serialize activity event");
        assert_eq!(json["durationMs"], 1200);
        let rms = json["peakRms"].as_f64().expect("number");
        assert!((rms - 0.25).abs() < 1e-6);
    }
}
