//! `EventHub`: the broadcast senders shared by both input loops.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tokio::sync::broadcast;

use super::events::{
    ActionRecord, ActionSource, StatusEvent, Subsystem, SubsystemStatus, VoiceActivityEvent,
};
use crate::action::ActionEvent;

/// Events buffered per channel for slow subscribers.
const BROADCAST_CAP: usize = 256;

/// Cheap to clone; every clone publishes into the same channels.
#[derive(Clone)]
pub struct EventHub {
    action_tx: broadcast::Sender<ActionRecord>,
    status_tx: broadcast::Sender<StatusEvent>,
    voice_tx: broadcast::Sender<VoiceActivityEvent>,
    seq: Arc<AtomicU64>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        let (action_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (status_tx, _) = broadcast::channel(BROADCAST_CAP);
        let (voice_tx, _) = broadcast::channel(BROADCAST_CAP);
        Self {
            action_tx,
            status_tx,
            voice_tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Publish a non-move action. Sending with no subscribers is not an error.
    pub fn action(
        &self,
        source: ActionSource,
        action: ActionEvent,
        phrase: Option<&str>,
        error: Option<String>,
    ) {
        let _ = self.action_tx.send(ActionRecord {
            seq: self.next_seq(),
            source,
            action,
            phrase: phrase.map(str::to_owned),
            error,
        });
    }

    pub fn status(&self, subsystem: Subsystem, status: SubsystemStatus, detail: Option<String>) {
        let _ = self
            .status_tx
            .send(StatusEvent::new(subsystem, status, detail));
    }

    pub fn voice_activity(&self, peak_rms: f32, duration_ms: u64) {
        let _ = self.voice_tx.send(VoiceActivityEvent {
            seq: self.next_seq(),
            peak_rms,
            duration_ms,
        });
    }

    pub fn subscribe_actions(&self) -> broadcast::Receiver<ActionRecord> {
        self.action_tx.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusEvent> {
        self.status_tx.subscribe()
    }

    pub fn subscribe_voice_activity(&self) -> broadcast::Receiver<VoiceActivityEvent> {
        self.voice_tx.subscribe()
    }
}
