use clap::Parser;
use opcua_sample::opcua_server::{start_monitor_client, MonitorConfig, ServerTarget};
use opcua_sample::ws_bridge::{start_ws_server, MonitorHub, DEFAULT_WS_PORT};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "opcua-monitor")]
#[command(about = "Polls OPC UA sample servers and relays their values over WebSocket")]
struct Args {
    /// Host running the sample servers
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Ports of the sample servers to poll
    #[arg(long, value_delimiter = ',', default_value = "4840,4841,4842")]
    ports: Vec<u16>,

    /// WebSocket port
    #[arg(long, default_value_t = DEFAULT_WS_PORT)]
    ws_port: u16,

    /// Poll interval in milliseconds
    #[arg(long, default_value = "1000")]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    opcua_sample::init_tracing();

    tracing::info!("Starting OPC UA monitor");

    let hub = MonitorHub::new(100);

    let config = MonitorConfig {
        host: args.host,
        targets: ServerTarget::from_ports(&args.ports),
        poll_interval: Duration::from_millis(args.interval_ms),
        ..MonitorConfig::default()
    };
    for target in &config.targets {
        tracing::info!("  - {} at {}", target.name, target.endpoint_url(&config.host));
    }

    let pollers = start_monitor_client(config, hub.clone())?;

    let ws_hub = hub.clone();
    let ws_server = tokio::spawn(async move {
        if let Err(e) = start_ws_server(ws_hub, args.ws_port).await {
            tracing::error!("WebSocket server error: {}", e);
        }
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        _ = ws_server => {
            tracing::info!("WebSocket server terminated");
        }
    }

    tracing::info!("Shutting down");

    // Joining blocks until every poller has closed its session
    tokio::task::spawn_blocking(move || pollers.shutdown()).await?;

    Ok(())
}
