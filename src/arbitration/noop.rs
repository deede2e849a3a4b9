use tokio::sync::broadcast;

use crate::arbitration::{ports::ArbitrationSink, types::ArbitrationEvent};

#[derive(Debug, Clone, Default)]
pub struct NoopArbitrationSink;

impl ArbitrationSink for NoopArbitrationSink {
    fn on_event(&self, _event: ArbitrationEvent) {}
}

/// Fans published events out to every live subscriber. Lagging subscribers
/// lose the oldest events; publishing never blocks a cycle.
#[derive(Debug, Clone)]
pub struct BroadcastArbitrationSink {
    tx: broadcast::Sender<ArbitrationEvent>,
}

impl BroadcastArbitrationSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ArbitrationEvent> {
        self.tx.subscribe()
    }
}

impl ArbitrationSink for BroadcastArbitrationSink {
    fn on_event(&self, event: ArbitrationEvent) {
        // No receivers is the normal idle state.
        let _ = self.tx.send(event);
    }
}
