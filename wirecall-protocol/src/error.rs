//! Protocol error types, error codes, and the fault taxonomy.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Protocol-level errors that can occur during framing or envelope handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid message format: expected <method><payload_json><headers_json>")]
    InvalidMessageFormat,

    #[error("invalid response status token: {0:?}")]
    InvalidStatusToken(String),

    #[error("trace_id must be set in response headers")]
    MissingTraceId,

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid UTF-8 in frame")]
    InvalidUtf8,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Converts this error into a wire-facing fault.
    pub fn fault(&self) -> Fault {
        match self {
            ProtocolError::MessageTooLarge { size, max } => {
                Fault::new(ErrorCode::MaxMessageSizeReceived)
                    .with_detail("size", *size)
                    .with_detail("max_message_size", *max)
            }
            ProtocolError::InvalidMessageFormat => Fault::new(ErrorCode::Validation)
                .with_detail("invalid_message_format", self.to_string()),
            ProtocolError::InvalidStatusToken(token) => Fault::new(ErrorCode::Validation)
                .with_detail("invalid_status_token", token.clone()),
            ProtocolError::MissingTraceId => {
                Fault::new(ErrorCode::Validation).with_detail("trace_id", "must be set")
            }
            other => Fault::wrap(ErrorCode::Validation, other),
        }
    }
}

/// How severe a fault is, and what the owning process must do about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Logged; the connection continues.
    Warning,
    /// Logged; the connection continues unless the caller opts into termination.
    Error,
    /// The owning process must stop after logging.
    Fatal,
}

/// Stable error codes returned in error responses.
///
/// These codes are part of the protocol contract and must remain stable
/// across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    // Per-request errors (recoverable)
    #[serde(rename = "ValidationError")]
    Validation,
    #[serde(rename = "UnknownMethod")]
    UnknownMethod,
    #[serde(rename = "MethodInternal")]
    MethodInternal,
    #[serde(rename = "MaxMessageSizeReceived")]
    MaxMessageSizeReceived,

    // Schema compile-time errors (fatal)
    #[serde(rename = "AnnotationCase")]
    AnnotationCase,
    #[serde(rename = "AnnotationNoMethod")]
    AnnotationNoMethod,
    #[serde(rename = "AnnotationUnknownFieldType")]
    AnnotationUnknownFieldType,
    #[serde(rename = "AnnotationValidation")]
    AnnotationValidation,

    // Transport setup errors (fatal)
    #[serde(rename = "ServerFatal")]
    ServerFatal,
    #[serde(rename = "ClientFatal")]
    ClientFatal,
}

impl ErrorCode {
    /// Default severity for faults carrying this code.
    pub fn severity(&self) -> Severity {
        match self {
            ErrorCode::Validation
            | ErrorCode::UnknownMethod
            | ErrorCode::MaxMessageSizeReceived => Severity::Warning,
            ErrorCode::MethodInternal => Severity::Error,
            ErrorCode::AnnotationCase
            | ErrorCode::AnnotationNoMethod
            | ErrorCode::AnnotationUnknownFieldType
            | ErrorCode::AnnotationValidation
            | ErrorCode::ServerFatal
            | ErrorCode::ClientFatal => Severity::Fatal,
        }
    }

    /// The stable wire string for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "ValidationError",
            ErrorCode::UnknownMethod => "UnknownMethod",
            ErrorCode::MethodInternal => "MethodInternal",
            ErrorCode::MaxMessageSizeReceived => "MaxMessageSizeReceived",
            ErrorCode::AnnotationCase => "AnnotationCase",
            ErrorCode::AnnotationNoMethod => "AnnotationNoMethod",
            ErrorCode::AnnotationUnknownFieldType => "AnnotationUnknownFieldType",
            ErrorCode::AnnotationValidation => "AnnotationValidation",
            ErrorCode::ServerFatal => "ServerFatal",
            ErrorCode::ClientFatal => "ClientFatal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured failure as reported to callers.
///
/// Every fault carries a stable error code, a details mapping, and a
/// severity. Faults are what error responses are built from; they never
/// expose raw stack state across the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    /// Stable error code.
    pub error_code: ErrorCode,

    /// Structured detail payload.
    #[serde(default)]
    pub details: Map<String, Value>,

    /// Severity level.
    #[serde(skip, default = "default_severity")]
    pub severity: Severity,
}

fn default_severity() -> Severity {
    Severity::Warning
}

impl Fault {
    /// Creates a fault with the code's default severity and empty details.
    pub fn new(error_code: ErrorCode) -> Self {
        Self {
            error_code,
            details: Map::new(),
            severity: error_code.severity(),
        }
    }

    /// Creates a fault wrapping another failure, recording its text in the
    /// details without leaking anything beyond the error message.
    pub fn wrap(error_code: ErrorCode, source: &dyn fmt::Display) -> Self {
        Self::new(error_code).with_detail("error", source.to_string())
    }

    /// Creates an `UnknownMethod` fault carrying the requested method name.
    pub fn unknown_method(method_name: &str) -> Self {
        Self::new(ErrorCode::UnknownMethod).with_detail("method", method_name)
    }

    /// Adds a detail entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Overrides the severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Whether the owning process must terminate after reporting this fault.
    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    /// Parses a fault back out of an error response payload, restoring the
    /// code's default severity (severity never travels on the wire).
    pub fn from_payload(payload: &Map<String, Value>) -> Option<Self> {
        let mut fault: Fault = serde_json::from_value(Value::Object(payload.clone())).ok()?;
        fault.severity = fault.error_code.severity();
        Some(fault)
    }

    /// The error payload shape sent on the wire:
    /// `{"error_code": <string>, "details": {...}}`.
    pub fn payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert(
            "error_code".to_string(),
            Value::String(self.error_code.as_str().to_string()),
        );
        payload.insert("details".to_string(), Value::Object(self.details.clone()));
        payload
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}",
            self.error_code,
            Value::Object(self.details.clone())
        )
    }
}
