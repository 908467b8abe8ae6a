//! Resolved field types and primitive value checks.

use std::fmt;

use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use uuid::Uuid;

/// Primitive wire types a field can declare directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Int,
    Float,
    Boolean,
    String,
    Date,
    Datetime,
    Uuid,
    Null,
}

impl Primitive {
    /// Parses a primitive tag, returning `None` for anything else.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "int" => Some(Primitive::Int),
            "float" => Some(Primitive::Float),
            "boolean" => Some(Primitive::Boolean),
            "string" => Some(Primitive::String),
            "date" => Some(Primitive::Date),
            "datetime" => Some(Primitive::Datetime),
            "uuid" => Some(Primitive::Uuid),
            "null" => Some(Primitive::Null),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::Int => "int",
            Primitive::Float => "float",
            Primitive::Boolean => "boolean",
            Primitive::String => "string",
            Primitive::Date => "date",
            Primitive::Datetime => "datetime",
            Primitive::Uuid => "uuid",
            Primitive::Null => "null",
        }
    }

    /// Checks a JSON value against this primitive.
    ///
    /// Dates are `YYYY-MM-DD`, datetimes RFC 3339, uuids any form
    /// `uuid::Uuid` parses. `float` accepts any JSON number, `int` only
    /// integral ones.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Primitive::Int => value.is_i64() || value.is_u64(),
            Primitive::Float => value.is_number(),
            Primitive::Boolean => value.is_boolean(),
            Primitive::String => value.is_string(),
            Primitive::Date => value
                .as_str()
                .is_some_and(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()),
            Primitive::Datetime => value
                .as_str()
                .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok()),
            Primitive::Uuid => value.as_str().is_some_and(|s| Uuid::parse_str(s).is_ok()),
            Primitive::Null => value.is_null(),
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved field type.
///
/// References carry the target name; membership checks go through the
/// compiled schema that owns the referenced declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Primitive(Primitive),
    /// Reference to a previously compiled enum.
    EnumRef(String),
    /// Reference to a previously compiled object.
    ObjectRef(String),
    /// Homogeneous list of the inner type.
    List(Box<FieldType>),
    /// Value matches any of the alternatives.
    Union(Vec<FieldType>),
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Primitive(p) => write!(f, "{}", p),
            FieldType::EnumRef(name) | FieldType::ObjectRef(name) => f.write_str(name),
            FieldType::List(inner) => write!(f, "[{}]", inner),
            FieldType::Union(alts) => {
                let mut first = true;
                for alt in alts {
                    if !first {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", alt)?;
                    first = false;
                }
                Ok(())
            }
        }
    }
}
