pub mod bridge;
pub mod events;
pub mod hub;

pub use bridge::{router, start_ws_server, DEFAULT_WS_PORT};
pub use events::{ClientRequest, ConnectionState, ConnectionStatus, MonitorEvent, ServerReading};
pub use hub::MonitorHub;
