use tether_proto::telemetry::FlightEvent;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Outbound side of the operator event channel. Never blocks: the
/// supervision task must not stall on a slow console.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: Option<mpsc::Sender<FlightEvent>>,
}

impl EventSink {
    pub fn channel(capacity: usize) -> (EventSink, mpsc::Receiver<FlightEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (EventSink { tx: Some(tx) }, rx)
    }

    /// Logs only.
    pub fn discard() -> EventSink {
        EventSink { tx: None }
    }

    pub fn emit(&self, ev: FlightEvent) {
        if ev.is_reconciliation() {
            warn!("{}", ev);
        } else {
            info!("{}", ev);
        }
        let Some(tx) = &self.tx else { return };
        if let Err(e) = tx.try_send(ev) {
            warn!("event dropped: {}", e);
        }
    }

    pub fn emit_all(&self, events: impl IntoIterator<Item = FlightEvent>) {
        for ev in events {
            self.emit(ev);
        }
    }
}
