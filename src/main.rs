use clap::Parser;
use opcua_sample::opcua_server::{run_sample_server, SampleServerConfig, DEFAULT_PORT};

#[derive(Parser)]
#[command(name = "opcua-sample-server")]
#[command(about = "OPC UA sample server exposing a simulated MyObject")]
struct Args {
    /// TCP port of the listening endpoint
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    opcua_sample::init_tracing();

    let config = SampleServerConfig::with_port(args.port);
    tracing::info!("Endpoint: {}", config.endpoint_url());

    run_sample_server(config).await?;

    tracing::info!("Shutting down");
    Ok(())
}
