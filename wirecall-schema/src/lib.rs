//! # wirecall-schema
//!
//! Annotation schema compiler for wirecall.
//!
//! This crate provides:
//! - Raw schema deserialization (enums, objects, methods)
//! - Naming-convention and reference-integrity validation
//! - Resolution of field type specs into a recursive typed model
//! - Runtime validation of JSON values against resolved types
//!
//! A schema compiles once at startup into an immutable [`CompiledSchema`]
//! that connection workers share read-only. Compilation failures are fatal
//! to the compiling process; they indicate a broken schema, not a runtime
//! condition.

pub mod compiler;
pub mod error;
pub mod schema;
pub mod types;

pub use compiler::{CompiledSchema, MethodTypes};
pub use error::SchemaError;
pub use schema::{AnnotationSchema, FieldTypeSpec, MethodSpec};
pub use types::{FieldType, Primitive};
