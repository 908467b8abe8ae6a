//! Server error types.

use thiserror::Error;
use wirecall_protocol::{ErrorCode, Fault};

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] wirecall_protocol::ProtocolError),

    #[error("schema error: {0}")]
    Schema(#[from] wirecall_schema::SchemaError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("method name is reserved: {0}")]
    ReservedMethod(String),

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Converts to a wire-facing fault.
    pub fn fault(&self) -> Fault {
        match self {
            ServerError::Protocol(e) => e.fault(),
            ServerError::Schema(e) => e.fault(),
            ServerError::Io(e) => Fault::wrap(ErrorCode::ServerFatal, e),
            ServerError::Json(e) => Fault::wrap(ErrorCode::ServerFatal, e),
            ServerError::ReservedMethod(_) => Fault::wrap(ErrorCode::ServerFatal, self),
            ServerError::ShuttingDown => Fault::new(ErrorCode::ServerFatal)
                .with_detail("reason", "server shutting down"),
        }
    }
}
