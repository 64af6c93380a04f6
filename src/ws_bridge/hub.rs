use opcua::sync::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::events::{ConnectionState, MonitorEvent, ServerReading};

/// Fan-out point between the OPC UA pollers and WebSocket clients.
///
/// Keeps the latest connection state per port so a client that joins late
/// can ask for all of them at once.
#[derive(Clone)]
pub struct MonitorHub {
    tx: broadcast::Sender<MonitorEvent>,
    states: Arc<RwLock<BTreeMap<u16, ConnectionState>>>,
}

impl MonitorHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self {
            tx,
            states: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.tx.subscribe()
    }

    pub fn publish_reading(&self, reading: ServerReading) {
        // No subscribers is fine
        let _ = self.tx.send(MonitorEvent::Reading(reading));
    }

    pub fn publish_state(&self, state: ConnectionState) {
        self.states.write().insert(state.port, state.clone());
        let _ = self.tx.send(MonitorEvent::ConnectionStatus(state));
    }

    pub fn connection_states(&self) -> BTreeMap<u16, ConnectionState> {
        self.states.read().clone()
    }
}
