//! Schema compiler error types.

use thiserror::Error;
use wirecall_protocol::{ErrorCode, Fault};

/// Errors from annotation schema compilation. All of these are fatal to the
/// compiling process: a broken schema must never start serving.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("name at {path} violates the case convention ({expected})")]
    Case {
        /// Offending path, e.g. `enums.myEnum` or `methods.BadName`.
        path: String,
        /// Expected convention, e.g. `UpperCamelCase` or `lower_case`.
        expected: &'static str,
    },

    #[error("unknown signature: {name}")]
    UnknownSignature { name: String },

    #[error("schema declares no methods")]
    NoMethods,

    #[error("request or response object not found in {method} method")]
    MissingDirection { method: String },

    #[error("invalid declaration at {path}: {reason}")]
    Invalid { path: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    /// Converts this error into a wire-facing fault (always fatal).
    pub fn fault(&self) -> Fault {
        match self {
            SchemaError::Case { path, .. } => {
                Fault::new(ErrorCode::AnnotationCase).with_detail("field", path.clone())
            }
            SchemaError::UnknownSignature { name } => {
                Fault::new(ErrorCode::AnnotationValidation)
                    .with_detail("unknown_signature", name.clone())
            }
            SchemaError::NoMethods => Fault::new(ErrorCode::AnnotationNoMethod),
            SchemaError::MissingDirection { method } => {
                Fault::new(ErrorCode::AnnotationValidation)
                    .with_detail("request_or_response_object", format!("not found in {method}"))
            }
            SchemaError::Invalid { path, reason } => {
                Fault::new(ErrorCode::AnnotationValidation)
                    .with_detail("field", path.clone())
                    .with_detail("reason", reason.clone())
            }
            SchemaError::Json(err) => Fault::wrap(ErrorCode::AnnotationValidation, err),
        }
    }
}
