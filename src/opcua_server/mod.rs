pub mod backoff;
pub mod monitor_client;
pub mod server;
pub mod shutdown;

pub use backoff::ConnectionStrategy;
pub use monitor_client::{start_monitor_client, MonitorConfig, MonitorHandle, ServerTarget};
pub use server::{
    build_server, populate_address_space, publish, run_sample_server, RunningServer, SampleNodes,
    SampleServerConfig, DEFAULT_PORT,
};
pub use shutdown::ShutdownSignal;
