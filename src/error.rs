use opcua::types::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("server configuration is invalid")]
    ServerConfig,

    #[error("address space error: {0}")]
    AddressSpace(String),

    #[error("OPC UA service call failed: {0}")]
    Opcua(StatusCode),

    #[error("client configuration is invalid")]
    ClientConfig,

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("unexpected value: {0}")]
    UnexpectedValue(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Task(#[from] tokio::task::JoinError),
}

impl From<StatusCode> for DemoError {
    fn from(status: StatusCode) -> Self {
        DemoError::Opcua(status)
    }
}

pub type Result<T> = std::result::Result<T, DemoError>;
