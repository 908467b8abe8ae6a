//! Raw annotation schema as received from configuration.
//!
//! Schemas use a JSON DSL:
//!
//! ```json
//! {
//!   "enums": {"Color": {"red": "red", "blue": "blue"}},
//!   "objects": {"User": {"name": "string", "favourite": "Color"}},
//!   "methods": {
//!     "get_user": {
//!       "request": {"user_id": "int"},
//!       "response": {"user": "User", "tags": [["string"]]}
//!     }
//!   }
//! }
//! ```
//!
//! A field type spec is a string (primitive tag or enum/object reference),
//! a sequence of specs (a type union), or a nested sequence (a list of the
//! inner union).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A declared field type, prior to resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldTypeSpec {
    /// A primitive tag or a reference to an enum/object by name.
    Name(String),
    /// A union of specs; elements that are themselves sequences denote
    /// lists.
    Seq(Vec<FieldTypeSpec>),
}

/// Raw request/response field maps for one method.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MethodSpec {
    pub request: Option<Map<String, Value>>,
    pub response: Option<Map<String, Value>>,
}

/// The raw schema: enum, object, and method declarations.
///
/// Maps keep declaration order (`serde_json` with `preserve_order`), which
/// the compiler relies on for its single top-to-bottom resolution pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationSchema {
    /// EnumName -> {member: value}.
    pub enums: Map<String, Value>,
    /// ObjectName -> {field: FieldTypeSpec}.
    pub objects: Map<String, Value>,
    /// method_name -> {request, response}.
    pub methods: Map<String, Value>,
}

impl AnnotationSchema {
    /// Deserializes a schema from a JSON value.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Deserializes a schema from JSON text.
    pub fn from_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
