use tokio::sync::broadcast;

use super::connection::ConnectionTier;

/// Notifications published by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The transmission loop started or stopped for `track`.
    StreamStateChanged { streaming: bool, track: String },
    BoostStateChanged(bool),
    LoopStateChanged(bool),
    /// A track ended for good: natural end without loop, skip, or abort,
    /// unless the stop came from a pause.
    EndOfFile,
    TierChanged(ConnectionTier),
}

/// Fan-out of [`EngineEvent`]s. Emitting with no subscribers is fine.
pub struct EventHub {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}
