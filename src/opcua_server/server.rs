use opcua::server::prelude::*;
use opcua::sync::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::error::{DemoError, Result};
use crate::simulator::sample::{INITIAL_PRESSURE, INITIAL_TEMPERATURE};
use crate::simulator::{SampleObject, SampleStatus};

pub const SERVER_NAME: &str = "OPC-UA Sample Server";
pub const NAMESPACE_URI: &str = "http://examples.freeopcua.github.io";
pub const ENDPOINT_PATH: &str = "/freeopcua/server/";
pub const DEFAULT_PORT: u16 = 4840;

pub const OBJECT_NAME: &str = "MyObject";
pub const TEMPERATURE_NAME: &str = "Temperature";
pub const PRESSURE_NAME: &str = "Pressure";
pub const STATUS_NAME: &str = "Status";

#[derive(Debug, Clone)]
pub struct SampleServerConfig {
    pub host: String,
    pub port: u16,
    pub update_interval: Duration,
    pub pki_dir: PathBuf,
}

impl Default for SampleServerConfig {
    fn default() -> Self {
        Self::with_port(DEFAULT_PORT)
    }
}

impl SampleServerConfig {
    pub fn with_port(port: u16) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port,
            update_interval: Duration::from_secs(1),
            pki_dir: PathBuf::from(format!("./pki-server-{port}")),
        }
    }

    pub fn endpoint_url(&self) -> String {
        format!("opc.tcp://{}:{}{}", self.host, self.port, ENDPOINT_PATH)
    }
}

/// Node ids of `MyObject` and its variables inside the registered namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleNodes {
    pub namespace: u16,
    pub object: NodeId,
    pub temperature: NodeId,
    pub pressure: NodeId,
    pub status: NodeId,
}

impl SampleNodes {
    pub fn in_namespace(namespace: u16) -> Self {
        let child = |name: &str| NodeId::new(namespace, format!("{OBJECT_NAME}/{name}"));
        Self {
            namespace,
            object: NodeId::new(namespace, OBJECT_NAME),
            temperature: child(TEMPERATURE_NAME),
            pressure: child(PRESSURE_NAME),
            status: child(STATUS_NAME),
        }
    }
}

pub fn build_server(config: &SampleServerConfig) -> Result<Server> {
    let user_token_ids = [ANONYMOUS_USER_TOKEN_ID.to_string()];

    ServerBuilder::new()
        .application_name(SERVER_NAME)
        .application_uri("urn:freeopcua:sample-server")
        .product_uri("urn:freeopcua:sample-server")
        .discovery_urls(vec![ENDPOINT_PATH.into()])
        .create_sample_keypair(true)
        .pki_dir(config.pki_dir.clone())
        .discovery_server_url(None)
        .host_and_port(config.host.clone(), config.port)
        .endpoint("none", ServerEndpoint::new_none(ENDPOINT_PATH, &user_token_ids))
        .server()
        .ok_or(DemoError::ServerConfig)
}

/// Registers the sample namespace and creates `MyObject` with its writable
/// variables under the Objects folder.
pub fn populate_address_space(address_space: &mut AddressSpace) -> Result<SampleNodes> {
    let namespace = address_space.register_namespace(NAMESPACE_URI).map_err(|_| {
        DemoError::AddressSpace(format!("cannot register namespace {NAMESPACE_URI}"))
    })?;
    let nodes = SampleNodes::in_namespace(namespace);

    let inserted = ObjectBuilder::new(
        &nodes.object,
        QualifiedName::new(namespace, OBJECT_NAME),
        OBJECT_NAME,
    )
    .organized_by(NodeId::objects_folder_id())
    .has_type_definition(ObjectTypeId::BaseObjectType)
    .insert(address_space);
    if !inserted {
        return Err(DemoError::AddressSpace(format!("cannot create {OBJECT_NAME}")));
    }

    let variables = [
        (&nodes.temperature, TEMPERATURE_NAME, DataTypeId::Double, Variant::from(INITIAL_TEMPERATURE)),
        (&nodes.pressure, PRESSURE_NAME, DataTypeId::Double, Variant::from(INITIAL_PRESSURE)),
        (
            &nodes.status,
            STATUS_NAME,
            DataTypeId::String,
            Variant::from(UAString::from(SampleStatus::Running.as_str())),
        ),
    ];

    for (node_id, name, data_type, initial) in variables {
        let inserted = VariableBuilder::new(node_id, QualifiedName::new(namespace, name), name)
            .data_type(data_type)
            .value(initial)
            .writable()
            .component_of(nodes.object.clone())
            .has_type_definition(VariableTypeId::BaseDataVariableType)
            .insert(address_space);
        if !inserted {
            return Err(DemoError::AddressSpace(format!("cannot create {OBJECT_NAME}/{name}")));
        }
    }

    tracing::debug!(namespace, "Created {} with 3 variables", OBJECT_NAME);

    Ok(nodes)
}

/// Writes the current simulated values into the address space.
pub fn publish(address_space: &mut AddressSpace, nodes: &SampleNodes, sample: &SampleObject) -> Result<()> {
    let now = DateTime::now();
    let updates = [
        (&nodes.temperature, Variant::from(sample.temperature)),
        (&nodes.pressure, Variant::from(sample.pressure)),
        (&nodes.status, Variant::from(UAString::from(sample.status.as_str()))),
    ];

    for (node_id, value) in updates {
        if !address_space.set_variable_value(node_id.clone(), value, &now, &now) {
            return Err(DemoError::AddressSpace(format!("cannot write {node_id}")));
        }
    }

    Ok(())
}

/// A started server. Dropping it aborts the server.
pub struct RunningServer {
    server: Arc<RwLock<Server>>,
    task: JoinHandle<()>,
}

impl RunningServer {
    pub fn start(server: Server) -> Self {
        let server = Arc::new(RwLock::new(server));
        let task = tokio::spawn(Server::new_server_task(server.clone()));
        Self { server, task }
    }

    pub fn address_space(&self) -> Arc<RwLock<AddressSpace>> {
        self.server.read().address_space()
    }

    /// Shared handle to the underlying server. It outlives the guard.
    pub fn server(&self) -> Arc<RwLock<Server>> {
        self.server.clone()
    }

    pub fn is_running(&self) -> bool {
        let server_state = self.server.read().server_state();
        let is_running = server_state.read().is_running();
        is_running
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        tracing::info!("Stopping OPC UA server");
        self.server.write().abort();
    }
}

/// Runs the sample server and its update loop until Ctrl+C.
pub async fn run_sample_server(config: SampleServerConfig) -> Result<()> {
    tracing::info!("Starting {} on {}", SERVER_NAME, config.endpoint_url());

    let server = build_server(&config)?;
    let nodes = {
        let address_space = server.address_space();
        let mut address_space = address_space.write();
        populate_address_space(&mut address_space)?
    };

    let mut running = RunningServer::start(server);
    let address_space = running.address_space();

    let mut sample = SampleObject::new();
    let mut interval = tokio::time::interval(config.update_interval);
    // The first tick completes immediately.
    interval.tick().await;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tracing::info!("Update loop started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                sample.tick();
                {
                    let mut address_space = address_space.write();
                    publish(&mut address_space, &nodes, &sample)?;
                }
                tracing::info!(
                    tick = sample.tick,
                    temperature = sample.temperature,
                    pressure = sample.pressure,
                    status = %sample.status,
                    "Updated {}", OBJECT_NAME
                );
            }
            result = &mut shutdown => {
                result?;
                tracing::info!("Received Ctrl+C, shutting down");
                break;
            }
            result = &mut running.task => {
                tracing::warn!("OPC UA server terminated");
                result?;
                break;
            }
        }
    }

    Ok(())
}
