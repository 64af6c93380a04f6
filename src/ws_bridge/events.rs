use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One successful read of `MyObject` from a sample server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerReading {
    /// Port of the server the values came from.
    pub server_id: u16,
    pub server_name: String,
    pub temperature: f64,
    pub pressure: f64,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub message: String,
    pub port: u16,
}

impl ConnectionState {
    pub fn new(port: u16, status: ConnectionStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            port,
        }
    }
}

/// Messages sent to WebSocket clients, encoded as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum MonitorEvent {
    #[serde(rename = "opcua-data")]
    Reading(ServerReading),
    #[serde(rename = "server-connection-status")]
    ConnectionStatus(ConnectionState),
    #[serde(rename = "all-connection-status")]
    AllConnectionStatus(BTreeMap<u16, ConnectionState>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientRequest {
    ConnectionStatus,
}

impl ClientRequest {
    pub const CONNECTION_STATUS: &'static str = "request-connection-status";

    /// Accepts the bare event name or `{"event": "<name>"}`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let name = if text.starts_with('{') {
            #[derive(Deserialize)]
            struct Envelope {
                event: String,
            }
            serde_json::from_str::<Envelope>(text).ok()?.event
        } else {
            text.to_string()
        };

        match name.as_str() {
            Self::CONNECTION_STATUS => Some(ClientRequest::ConnectionStatus),
            _ => None,
        }
    }
}
