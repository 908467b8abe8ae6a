//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use serde_json::{Map, Value};
use std::sync::Arc;
use wirecall_protocol::{Fault, Request, Response};

/// High-level client for wirecall.
pub struct Client {
    conn: Arc<Connection>,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Arc::new(Connection::new(config)),
        }
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.conn.connect().await
    }

    /// Returns whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> Arc<Connection> {
        self.conn.clone()
    }

    /// Calls a method and returns the response payload.
    ///
    /// Error responses come back as [`ClientError::Fault`] carrying the
    /// structured fault from the server.
    pub async fn call(
        &self,
        method_name: &str,
        payload: Map<String, Value>,
    ) -> Result<Map<String, Value>, ClientError> {
        let request = Request::new(method_name).with_payload(payload);
        let response = self.request(request).await?;
        Ok(response.payload)
    }

    /// Sends a fully built request, converting error responses to faults.
    pub async fn request(&self, request: Request) -> Result<Response, ClientError> {
        let response = self.conn.request(&request).await?;

        if !response.success {
            let fault = Fault::from_payload(&response.payload).unwrap_or_else(|| {
                Fault::new(wirecall_protocol::ErrorCode::ClientFatal)
                    .with_detail("reason", "unparseable error payload")
            });
            return Err(ClientError::Fault(fault));
        }

        Ok(response)
    }
}
