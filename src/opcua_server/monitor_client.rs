use opcua::client::prelude::*;
use opcua::sync::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::backoff::ConnectionStrategy;
use super::shutdown::ShutdownSignal;
use super::server::{ENDPOINT_PATH, OBJECT_NAME, PRESSURE_NAME, STATUS_NAME, TEMPERATURE_NAME};
use crate::error::{DemoError, Result};
use crate::ws_bridge::{ConnectionState, ConnectionStatus, MonitorHub, ServerReading};

/// One sample server to poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerTarget {
    pub name: String,
    pub port: u16,
}

impl ServerTarget {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
        }
    }

    /// Names targets `Server 1`, `Server 2`, ... in port order.
    pub fn from_ports(ports: &[u16]) -> Vec<Self> {
        ports
            .iter()
            .enumerate()
            .map(|(i, port)| Self::new(format!("Server {}", i + 1), *port))
            .collect()
    }

    pub fn endpoint_url(&self, host: &str) -> String {
        format!("opc.tcp://{}:{}{}", host, self.port, ENDPOINT_PATH)
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub host: String,
    pub targets: Vec<ServerTarget>,
    pub poll_interval: Duration,
    pub strategy: ConnectionStrategy,
    pub pki_dir: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            targets: ServerTarget::from_ports(&[4840, 4841, 4842]),
            poll_interval: Duration::from_secs(1),
            strategy: ConnectionStrategy::default(),
            pki_dir: PathBuf::from("./pki-monitor"),
        }
    }
}

/// Node ids found by browsing a server for `MyObject`.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleNodeIds {
    pub temperature: NodeId,
    pub pressure: NodeId,
    pub status: NodeId,
}

/// Running poller threads plus the signal that stops them.
pub struct MonitorHandle {
    shutdown: ShutdownSignal,
    threads: Vec<thread::JoinHandle<()>>,
}

impl MonitorHandle {
    /// Stops every poller and waits for them to close their sessions.
    pub fn shutdown(self) {
        self.shutdown.trigger();
        for handle in self.threads {
            if handle.join().is_err() {
                tracing::error!("Poller thread panicked");
            }
        }
        tracing::info!("Monitor client stopped");
    }
}

/// Starts one poller thread per target.
///
/// The `opcua` client is blocking, so pollers live on plain threads and
/// report through the hub.
pub fn start_monitor_client(config: MonitorConfig, hub: MonitorHub) -> Result<MonitorHandle> {
    tracing::info!("Starting monitor client for {} server(s)", config.targets.len());

    let shutdown = ShutdownSignal::new();
    let config = Arc::new(config);
    let threads = config
        .targets
        .iter()
        .cloned()
        .map(|target| {
            let config = config.clone();
            let hub = hub.clone();
            let shutdown = shutdown.clone();
            thread::Builder::new()
                .name(format!("poller-{}", target.port))
                .spawn(move || run_poller(target, &config, &hub, &shutdown))
                .map_err(DemoError::from)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MonitorHandle { shutdown, threads })
}

enum PollExit {
    ReadFailed,
    Shutdown,
}

fn run_poller(target: ServerTarget, config: &MonitorConfig, hub: &MonitorHub, shutdown: &ShutdownSignal) {
    if shutdown.is_triggered() {
        return;
    }

    let mut client = match build_client(&target, config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Cannot create client for {}: {}", target.name, e);
            publish_state(hub, &target, ConnectionStatus::Error, format!("Fatal error for {}: {}", target.name, e));
            return;
        }
    };

    while !shutdown.is_triggered() {
        publish_state(
            hub,
            &target,
            ConnectionStatus::Connecting,
            format!("Attempting to connect to {} (Port {})...", target.name, target.port),
        );

        let session = match connect_with_retry(&mut client, &target, config, hub, shutdown) {
            Ok(Some(session)) => session,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Connection failed for {}: {}", target.name, e);
                publish_state(hub, &target, ConnectionStatus::Error, format!("Failed to connect to {}", target.name));
                shutdown.wait(config.strategy.max_delay);
                continue;
            }
        };

        tracing::info!("Connected to {} on port {}", target.name, target.port);
        publish_state(hub, &target, ConnectionStatus::Connected, format!("Connected to {}", target.name));

        let located = locate_sample_nodes(&session.read());
        let nodes = match located {
            Ok(nodes) => nodes,
            Err(e) => {
                tracing::error!("Fatal error for {}: {}", target.name, e);
                publish_state(hub, &target, ConnectionStatus::Error, format!("Fatal error for {}: {}", target.name, e));
                session.write().disconnect();
                shutdown.wait(config.strategy.max_delay);
                continue;
            }
        };

        let exit = poll_until_error(&session, &nodes, &target, config, hub, shutdown);
        session.write().disconnect();

        match exit {
            PollExit::Shutdown => {
                tracing::info!("Closed session to {}", target.name);
                publish_state(hub, &target, ConnectionStatus::Disconnected, format!("Disconnected from {}", target.name));
            }
            PollExit::ReadFailed => publish_state(
                hub,
                &target,
                ConnectionStatus::Disconnected,
                format!("Connection to {} lost! Attempting to reconnect...", target.name),
            ),
        }
    }

    tracing::debug!("Poller for {} stopped", target.name);
}

fn poll_until_error(
    session: &Arc<RwLock<Session>>,
    nodes: &SampleNodeIds,
    target: &ServerTarget,
    config: &MonitorConfig,
    hub: &MonitorHub,
    shutdown: &ShutdownSignal,
) -> PollExit {
    loop {
        if shutdown.wait(config.poll_interval) {
            return PollExit::Shutdown;
        }

        let result = read_sample(&session.read(), nodes, target);
        match result {
            Ok(reading) => {
                tracing::debug!(
                    server = %target.name,
                    temperature = reading.temperature,
                    pressure = reading.pressure,
                    status = %reading.status,
                    "Read sample values"
                );
                hub.publish_reading(reading);
            }
            Err(e) => {
                tracing::error!("Error reading values from {}: {}", target.name, e);
                publish_state(
                    hub,
                    target,
                    ConnectionStatus::Error,
                    format!("Error reading values from {}: {}", target.name, e),
                );
                return PollExit::ReadFailed;
            }
        }
    }
}

fn build_client(target: &ServerTarget, config: &MonitorConfig) -> Result<Client> {
    ClientBuilder::new()
        .application_name(format!("OpcuaMonitor-{}", target.port))
        .application_uri("urn:OpcuaMonitor")
        .create_sample_keypair(true)
        .pki_dir(config.pki_dir.clone())
        .trust_server_certs(true)
        .session_retry_limit(0)
        .client()
        .ok_or(DemoError::ClientConfig)
}

fn connect(client: &mut Client, target: &ServerTarget, config: &MonitorConfig) -> Result<Arc<RwLock<Session>>> {
    let endpoint_url = target.endpoint_url(&config.host);
    tracing::debug!("Trying to connect to: {}", endpoint_url);

    let session = client.connect_to_endpoint(
        (
            endpoint_url.as_str(),
            SecurityPolicy::None.to_str(),
            MessageSecurityMode::None,
            UserTokenPolicy::anonymous(),
        ),
        IdentityToken::Anonymous,
    )?;

    Ok(session)
}

/// Connects with backoff. `Ok(None)` means shutdown was requested while waiting.
fn connect_with_retry(
    client: &mut Client,
    target: &ServerTarget,
    config: &MonitorConfig,
    hub: &MonitorHub,
    shutdown: &ShutdownSignal,
) -> Result<Option<Arc<RwLock<Session>>>> {
    let mut attempt = 0;
    loop {
        match connect(client, target, config) {
            Ok(session) => return Ok(Some(session)),
            Err(e) => {
                attempt += 1;
                let Some(delay) = config.strategy.delay(attempt) else {
                    return Err(e);
                };
                let message = format!(
                    "Retrying to connect to {} (attempt #{}, delay: {}ms)",
                    target.name,
                    attempt,
                    delay.as_millis()
                );
                tracing::info!("{}", message);
                publish_state(hub, target, ConnectionStatus::Connecting, message);
                if shutdown.wait(delay) {
                    return Ok(None);
                }
            }
        }
    }
}

/// Browses Objects for `MyObject` and then `MyObject` for its variables.
pub fn locate_sample_nodes(session: &Session) -> Result<SampleNodeIds> {
    let object = find_child(session, &NodeId::objects_folder_id(), OBJECT_NAME)?;
    Ok(SampleNodeIds {
        temperature: find_child(session, &object, TEMPERATURE_NAME)?,
        pressure: find_child(session, &object, PRESSURE_NAME)?,
        status: find_child(session, &object, STATUS_NAME)?,
    })
}

fn find_child(session: &Session, parent: &NodeId, name: &str) -> Result<NodeId> {
    let description = BrowseDescription {
        node_id: parent.clone(),
        browse_direction: BrowseDirection::Forward,
        reference_type_id: ReferenceTypeId::HierarchicalReferences.into(),
        include_subtypes: true,
        node_class_mask: 0,
        result_mask: BrowseResultMask::All as u32,
    };

    let results = session.browse(&[description])?;
    results
        .into_iter()
        .flatten()
        .flat_map(|result| result.references.unwrap_or_default())
        .find(|reference| reference.browse_name.name.to_string() == name)
        .map(|reference| reference.node_id.node_id)
        .ok_or_else(|| DemoError::NodeNotFound(format!("{name} under {parent}")))
}

fn read_sample(session: &Session, nodes: &SampleNodeIds, target: &ServerTarget) -> Result<ServerReading> {
    let to_read: Vec<ReadValueId> = [&nodes.temperature, &nodes.pressure, &nodes.status]
        .into_iter()
        .map(|node_id| ReadValueId::from(node_id.clone()))
        .collect();

    let values = session.read(&to_read, TimestampsToReturn::Neither, 0.0)?;
    reading_from_values(target, &values)
}

/// Builds a reading from Temperature, Pressure and Status values, in that order.
pub fn reading_from_values(target: &ServerTarget, values: &[DataValue]) -> Result<ServerReading> {
    let [temperature, pressure, status] = values else {
        return Err(DemoError::UnexpectedValue(format!("expected 3 values, got {}", values.len())));
    };

    Ok(ServerReading {
        server_id: target.port,
        server_name: target.name.clone(),
        temperature: as_f64(temperature, TEMPERATURE_NAME)?,
        pressure: as_f64(pressure, PRESSURE_NAME)?,
        status: as_string(status, STATUS_NAME)?,
        timestamp: chrono::Utc::now(),
    })
}

fn as_f64(value: &DataValue, name: &str) -> Result<f64> {
    match &value.value {
        Some(Variant::Double(v)) => Ok(*v),
        other => Err(DemoError::UnexpectedValue(format!("{name} is not a Double: {other:?}"))),
    }
}

fn as_string(value: &DataValue, name: &str) -> Result<String> {
    match &value.value {
        Some(Variant::String(v)) if !v.is_null() => Ok(v.to_string()),
        other => Err(DemoError::UnexpectedValue(format!("{name} is not a String: {other:?}"))),
    }
}

fn publish_state(hub: &MonitorHub, target: &ServerTarget, status: ConnectionStatus, message: String) {
    hub.publish_state(ConnectionState::new(target.port, status, message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn unused_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|listener| listener.local_addr())
            .map(|addr| addr.port())
            .unwrap()
    }

    fn spawn_poller(target: ServerTarget, config: MonitorConfig, hub: MonitorHub, shutdown: ShutdownSignal) -> mpsc::Receiver<()> {
        let (done_tx, done_rx) = mpsc::channel();
        thread::spawn(move || {
            run_poller(target, &config, &hub, &shutdown);
            let _ = done_tx.send(());
        });
        done_rx
    }

    #[test]
    fn poller_does_nothing_once_shut_down() {
        let hub = MonitorHub::new(8);
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        let done = spawn_poller(ServerTarget::new("Server 1", 4840), MonitorConfig::default(), hub.clone(), shutdown);

        assert!(done.recv_timeout(Duration::from_secs(5)).is_ok());
        assert!(hub.connection_states().is_empty());
    }

    #[test]
    fn poller_leaves_backoff_when_shut_down() {
        let port = unused_port();
        let hub = MonitorHub::new(64);
        let shutdown = ShutdownSignal::new();
        let config = MonitorConfig {
            host: "127.0.0.1".to_string(),
            targets: vec![ServerTarget::new("Server 1", port)],
            strategy: ConnectionStrategy {
                initial_delay: Duration::from_secs(120),
                max_delay: Duration::from_secs(120),
                ..ConnectionStrategy::default()
            },
            pki_dir: std::env::temp_dir().join(format!("opcua-monitor-test-{port}")),
            ..MonitorConfig::default()
        };

        let done = spawn_poller(ServerTarget::new("Server 1", port), config, hub.clone(), shutdown.clone());

        thread::sleep(Duration::from_millis(500));
        shutdown.trigger();

        // The first backoff alone is at least 60s
        assert!(done.recv_timeout(Duration::from_secs(30)).is_ok());
        assert_eq!(hub.connection_states()[&port].port, port);
    }

    #[test]
    fn names_targets_in_order() {
        let targets = ServerTarget::from_ports(&[4840, 4841]);
        assert_eq!(targets, vec![ServerTarget::new("Server 1", 4840), ServerTarget::new("Server 2", 4841)]);
        assert_eq!(
            targets[1].endpoint_url("localhost"),
            "opc.tcp://localhost:4841/freeopcua/server/"
        );
    }

    #[test]
    fn builds_reading_from_three_values() {
        let target = ServerTarget::new("Server 1", 4840);
        let values = vec![
            DataValue::value_only(26.5),
            DataValue::value_only(2.0),
            DataValue::value_only(UAString::from("Stopped")),
        ];

        let reading = reading_from_values(&target, &values).unwrap();
        assert_eq!(reading.server_id, 4840);
        assert_eq!(reading.server_name, "Server 1");
        assert_eq!(reading.temperature, 26.5);
        assert_eq!(reading.pressure, 2.0);
        assert_eq!(reading.status, "Stopped");
    }

    #[test]
    fn rejects_wrong_shapes() {
        let target = ServerTarget::new("Server 1", 4840);

        let short = vec![DataValue::value_only(26.5)];
        assert!(matches!(reading_from_values(&target, &short), Err(DemoError::UnexpectedValue(_))));

        let swapped = vec![
            DataValue::value_only(UAString::from("Running")),
            DataValue::value_only(2.0),
            DataValue::value_only(26.5),
        ];
        assert!(matches!(reading_from_values(&target, &swapped), Err(DemoError::UnexpectedValue(_))));
    }
}
