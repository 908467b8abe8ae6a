//! Connection management.
//!
//! The connection intentionally allows one request in flight at a time: a
//! single lock spans writing the request and reading its response, so
//! concurrent callers queue on the lock instead of interleaving frames on
//! the stream.

use crate::error::ClientError;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use wirecall_protocol::codec::{terminated, FrameDecoder};
use wirecall_protocol::{Request, Response, DEFAULT_MAX_MESSAGE_SIZE, ZERO_TRACE_ID};

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Request timeout.
    pub request_timeout: Duration,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
    /// Maximum accepted response frame size.
    pub max_message_size: usize,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}

struct Inner {
    stream: Option<TcpStream>,
    decoder: FrameDecoder,
}

/// A connection to a wirecall server.
pub struct Connection {
    config: ConnectionConfig,
    inner: Mutex<Inner>,
    connected: AtomicBool,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        let decoder = FrameDecoder::with_max_message_size(config.max_message_size);
        Self {
            config,
            inner: Mutex::new(Inner {
                stream: None,
                decoder,
            }),
            connected: AtomicBool::new(false),
        }
    }

    /// Connects to the server.
    pub async fn connect(&self) -> Result<(), ClientError> {
        tracing::debug!("Connecting to {}...", self.config.addr);

        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::Timeout
        })?
        .map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::Io(e)
        })?;

        stream.set_nodelay(true).ok();

        let mut inner = self.inner.lock().await;
        inner.stream = Some(stream);
        inner.decoder.clear();
        drop(inner);

        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!("Connected to {}", self.config.addr);
        Ok(())
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Closes the connection.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.connected.store(false, Ordering::SeqCst);
        let mut inner = self.inner.lock().await;
        if let Some(mut stream) = inner.stream.take() {
            stream.shutdown().await.ok();
        }
        inner.decoder.clear();
        Ok(())
    }

    /// Sends a request and waits for its response.
    ///
    /// The response must correlate: a response carrying a trace ID that is
    /// neither the request's nor the reserved zero value fails the call.
    /// A timeout tears the connection down, since the response may still
    /// arrive later and a reused stream would hand it to the next request.
    pub async fn request(&self, request: &Request) -> Result<Response, ClientError> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let encoded = terminated(request.encode()?);
        let mut inner = self.inner.lock().await;

        let result = tokio::time::timeout(self.config.request_timeout, async {
            let stream = inner.stream.as_mut().ok_or(ClientError::NotConnected)?;
            stream.write_all(&encoded).await.map_err(ClientError::Io)?;
            tracing::debug!(
                "Request {} sent ({} bytes, trace_id={})",
                request.method_name,
                encoded.len(),
                request.trace_id
            );

            let mut buf = vec![0u8; self.config.read_buffer_size];
            loop {
                if let Some(response) = inner.decoder.decode_response()? {
                    return Ok(response);
                }
                let stream = inner.stream.as_mut().ok_or(ClientError::NotConnected)?;
                let n = stream.read(&mut buf).await.map_err(ClientError::Io)?;
                if n == 0 {
                    return Err(ClientError::ConnectionClosed);
                }
                inner.decoder.extend(&buf[..n]);
            }
        })
        .await;

        let response = match result {
            Ok(inner_result) => inner_result?,
            Err(_) => {
                tracing::debug!("Request {} timed out", request.method_name);
                self.connected.store(false, Ordering::SeqCst);
                if let Some(mut stream) = inner.stream.take() {
                    stream.shutdown().await.ok();
                }
                inner.decoder.clear();
                return Err(ClientError::Timeout);
            }
        };

        tracing::debug!(
            "Response {} {} (trace_id={})",
            response.method_name,
            if response.success { "ok" } else { "err" },
            response.trace_id
        );

        if response.trace_id != request.trace_id && response.trace_id != ZERO_TRACE_ID {
            return Err(ClientError::TraceMismatch {
                sent: request.trace_id.clone(),
                received: response.trace_id,
            });
        }

        Ok(response)
    }
}
