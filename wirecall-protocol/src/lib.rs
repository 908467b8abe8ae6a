//! # wirecall-protocol
//!
//! Wire protocol implementation for wirecall.
//!
//! This crate provides:
//! - Delimiter-scanned text framing (method name + payload JSON + headers JSON)
//! - Request/Response envelope types with trace-id correlation
//! - Stream-level frame accumulation with size limits
//! - Error codes, severities, and structured fault payloads

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;

pub use codec::FrameDecoder;
pub use error::{ErrorCode, Fault, ProtocolError, Severity};
pub use frame::{RequestFrame, ResponseFrame};
pub use message::{Request, Response};

/// Byte terminating each frame on the stream (ASCII record separator).
///
/// Control bytes are always escaped by JSON string encoding, so this value
/// cannot occur inside an encoded frame.
pub const MESSAGE_SEPARATOR: u8 = 0x1E;

/// Trace ID used on error responses that have no originating request.
pub const ZERO_TRACE_ID: &str = "00000000-0000-0000-0000-000000000000";

/// Method name for error responses without request context (error/fatal severity).
pub const ERROR_METHOD: &str = "__error";

/// Method name for error responses without request context (warning severity).
pub const WARNING_METHOD: &str = "__warning";

/// Default maximum frame size accepted by the transport layer (1 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;
