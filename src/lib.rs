//! OPC UA sample server exposing a simulated `MyObject`, plus a monitor that
//! polls sample servers and relays their values to WebSocket clients.

pub mod error;
pub mod opcua_server;
pub mod simulator;
pub mod ws_bridge;

pub use error::{DemoError, Result};

use tracing_subscriber::EnvFilter;

/// Installs the fmt subscriber, honouring `RUST_LOG` and defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
