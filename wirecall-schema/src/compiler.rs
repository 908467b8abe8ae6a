//! Single-pass schema compilation and payload validation.
//!
//! Declarations compile strictly top to bottom: enums first, then objects,
//! then methods, each section in declaration order. A name reference only
//! resolves against declarations compiled before it, so forward references
//! fail with an unknown-signature error rather than being deferred.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use wirecall_protocol::{ErrorCode, Fault};

use crate::error::SchemaError;
use crate::schema::{AnnotationSchema, FieldTypeSpec, MethodSpec};
use crate::types::{FieldType, Primitive};

/// Resolved request and response shapes for one method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodTypes {
    /// Field name -> type, in declaration order.
    pub request: Vec<(String, FieldType)>,
    pub response: Vec<(String, FieldType)>,
}

/// An immutable compiled schema shared read-only by connection workers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledSchema {
    /// Enum name -> (member, value) pairs in declaration order.
    pub enums: BTreeMap<String, Vec<(String, String)>>,
    /// Object name -> (field, type) pairs in declaration order.
    pub objects: BTreeMap<String, Vec<(String, FieldType)>>,
    pub methods: BTreeMap<String, MethodTypes>,
}

impl CompiledSchema {
    /// Compiles a raw schema, validating naming conventions and reference
    /// integrity. Fails on the first broken declaration.
    pub fn compile(schema: &AnnotationSchema) -> Result<Self, SchemaError> {
        let mut compiled = CompiledSchema::default();

        for (name, raw) in &schema.enums {
            let path = format!("enums.{name}");
            check_upper_camel(name, &path)?;
            compiled
                .enums
                .insert(name.clone(), compile_enum(raw, &path)?);
        }

        for (name, raw) in &schema.objects {
            let path = format!("objects.{name}");
            check_upper_camel(name, &path)?;
            let fields = compiled.compile_fields(raw, &path)?;
            compiled.objects.insert(name.clone(), fields);
        }

        if schema.methods.is_empty() {
            return Err(SchemaError::NoMethods);
        }
        for (name, raw) in &schema.methods {
            let path = format!("methods.{name}");
            check_lower(name, &path)?;
            let spec: MethodSpec = serde_json::from_value(raw.clone())?;
            let request = spec
                .request
                .ok_or_else(|| SchemaError::MissingDirection {
                    method: name.clone(),
                })?;
            let response = spec
                .response
                .ok_or_else(|| SchemaError::MissingDirection {
                    method: name.clone(),
                })?;
            let types = MethodTypes {
                request: compiled
                    .compile_fields(&Value::Object(request), &format!("{path}.request"))?,
                response: compiled
                    .compile_fields(&Value::Object(response), &format!("{path}.response"))?,
            };
            compiled.methods.insert(name.clone(), types);
        }

        Ok(compiled)
    }

    pub fn method(&self, name: &str) -> Option<&MethodTypes> {
        self.methods.get(name)
    }

    /// Checks a payload object against resolved fields. Every declared
    /// field must be present and match; undeclared keys are rejected.
    /// Returns the offending field name on failure.
    pub fn check_fields(
        &self,
        fields: &[(String, FieldType)],
        payload: &Map<String, Value>,
    ) -> Result<(), String> {
        for (name, ty) in fields {
            match payload.get(name) {
                Some(value) if self.accepts(ty, value) => {}
                _ => return Err(name.clone()),
            }
        }
        for key in payload.keys() {
            if !fields.iter().any(|(name, _)| name == key) {
                return Err(key.clone());
            }
        }
        Ok(())
    }

    /// Validates a request payload against a method's request shape,
    /// producing a wire-facing fault on mismatch.
    pub fn validate_request(&self, method: &str, payload: &Value) -> Result<(), Fault> {
        let types = self
            .method(method)
            .ok_or_else(|| Fault::unknown_method(method))?;
        let object = payload
            .as_object()
            .ok_or_else(|| {
                Fault::new(ErrorCode::Validation)
                    .with_detail("method", method)
                    .with_detail("reason", "payload is not an object")
            })?;
        self.check_fields(&types.request, object).map_err(|field| {
            Fault::new(ErrorCode::Validation)
                .with_detail("method", method)
                .with_detail("field", field)
        })
    }

    /// Whether a JSON value matches a resolved type.
    pub fn accepts(&self, ty: &FieldType, value: &Value) -> bool {
        match ty {
            FieldType::Primitive(prim) => prim.accepts(value),
            FieldType::EnumRef(name) => match (self.enums.get(name), value.as_str()) {
                (Some(members), Some(s)) => members.iter().any(|(_, v)| v == s),
                _ => false,
            },
            FieldType::ObjectRef(name) => match (self.objects.get(name), value.as_object()) {
                (Some(fields), Some(object)) => self.check_fields(fields, object).is_ok(),
                _ => false,
            },
            FieldType::List(inner) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|item| self.accepts(inner, item))),
            FieldType::Union(alts) => alts.iter().any(|alt| self.accepts(alt, value)),
        }
    }

    fn compile_fields(
        &self,
        raw: &Value,
        path: &str,
    ) -> Result<Vec<(String, FieldType)>, SchemaError> {
        let object = raw.as_object().ok_or_else(|| SchemaError::Invalid {
            path: path.to_string(),
            reason: "expected an object of field declarations".to_string(),
        })?;
        let mut fields = Vec::with_capacity(object.len());
        for (field, value) in object {
            let field_path = format!("{path}.{field}");
            let spec: FieldTypeSpec =
                serde_json::from_value(value.clone()).map_err(|_| SchemaError::Invalid {
                    path: field_path.clone(),
                    reason: "expected a type name or a sequence of type names".to_string(),
                })?;
            fields.push((field.clone(), self.resolve(&spec, &field_path)?));
        }
        Ok(fields)
    }

    /// Resolves one declared spec. A bare name resolves to a primitive,
    /// then an already-compiled enum, then an already-compiled object. A
    /// sequence resolves each element (nested sequences become lists of
    /// their inner resolution) and collapses to the single element or a
    /// deduplicated union.
    fn resolve(&self, spec: &FieldTypeSpec, path: &str) -> Result<FieldType, SchemaError> {
        match spec {
            FieldTypeSpec::Name(name) => {
                if let Some(prim) = Primitive::parse(name) {
                    Ok(FieldType::Primitive(prim))
                } else if self.enums.contains_key(name) {
                    Ok(FieldType::EnumRef(name.clone()))
                } else if self.objects.contains_key(name) {
                    Ok(FieldType::ObjectRef(name.clone()))
                } else {
                    Err(SchemaError::UnknownSignature { name: name.clone() })
                }
            }
            FieldTypeSpec::Seq(elements) => {
                if elements.is_empty() {
                    return Err(SchemaError::Invalid {
                        path: path.to_string(),
                        reason: "empty type union".to_string(),
                    });
                }
                let mut alternatives: Vec<FieldType> = Vec::with_capacity(elements.len());
                for element in elements {
                    let resolved = match element {
                        FieldTypeSpec::Seq(_) => {
                            FieldType::List(Box::new(self.resolve(element, path)?))
                        }
                        FieldTypeSpec::Name(_) => self.resolve(element, path)?,
                    };
                    if !alternatives.contains(&resolved) {
                        alternatives.push(resolved);
                    }
                }
                if alternatives.len() == 1 {
                    Ok(alternatives.remove(0))
                } else {
                    Ok(FieldType::Union(alternatives))
                }
            }
        }
    }
}

fn compile_enum(raw: &Value, path: &str) -> Result<Vec<(String, String)>, SchemaError> {
    let object = raw.as_object().ok_or_else(|| SchemaError::Invalid {
        path: path.to_string(),
        reason: "expected an object of string members".to_string(),
    })?;
    let mut members = Vec::with_capacity(object.len());
    for (member, value) in object {
        let value = value.as_str().ok_or_else(|| SchemaError::Invalid {
            path: format!("{path}.{member}"),
            reason: "enum member value must be a string".to_string(),
        })?;
        members.push((member.clone(), value.to_string()));
    }
    Ok(members)
}

fn check_upper_camel(name: &str, path: &str) -> Result<(), SchemaError> {
    let leading_upper = name.chars().next().is_some_and(|c| c.is_ascii_uppercase());
    if leading_upper && name.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(SchemaError::Case {
            path: path.to_string(),
            expected: "UpperCamelCase",
        })
    }
}

fn check_lower(name: &str, path: &str) -> Result<(), SchemaError> {
    let has_lower = name.chars().any(|c| c.is_ascii_lowercase());
    if has_lower && !name.chars().any(|c| c.is_uppercase()) {
        Ok(())
    } else {
        Err(SchemaError::Case {
            path: path.to_string(),
            expected: "lower_case",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(value: Value) -> Result<CompiledSchema, SchemaError> {
        CompiledSchema::compile(&AnnotationSchema::from_value(value).unwrap())
    }

    #[test]
    fn test_compile_ping_schema() {
        let schema = compile(json!({
            "methods": {
                "ping": {
                    "request": {"n": "int"},
                    "response": {"n": "int"}
                }
            }
        }))
        .unwrap();
        let types = schema.method("ping").unwrap();
        assert_eq!(
            types.request,
            vec![("n".to_string(), FieldType::Primitive(Primitive::Int))]
        );
        assert!(schema.validate_request("ping", &json!({"n": 1})).is_ok());
        assert!(schema.validate_request("ping", &json!({"n": "1"})).is_err());
    }

    #[test]
    fn test_references_resolve_backwards_only() {
        let schema = compile(json!({
            "enums": {"Color": {"red": "red", "blue": "blue"}},
            "objects": {"Pixel": {"x": "int", "y": "int", "color": "Color"}},
            "methods": {
                "get_pixel": {
                    "request": {"x": "int", "y": "int"},
                    "response": {"pixel": "Pixel"}
                }
            }
        }))
        .unwrap();
        assert_eq!(
            schema.objects["Pixel"][2],
            ("color".to_string(), FieldType::EnumRef("Color".to_string()))
        );

        // An object may not reference one declared after it.
        let err = compile(json!({
            "objects": {
                "Outer": {"inner": "Inner"},
                "Inner": {"n": "int"}
            },
            "methods": {"noop": {"request": {}, "response": {}}}
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownSignature { ref name } if name == "Inner"));
    }

    #[test]
    fn test_case_conventions() {
        let err = compile(json!({
            "enums": {"myEnum": {"a": "a"}},
            "methods": {"m": {"request": {}, "response": {}}}
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::Case { ref path, .. } if path == "enums.myEnum"));

        let err = compile(json!({
            "methods": {"BadName": {"request": {}, "response": {}}}
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::Case { ref path, .. } if path == "methods.BadName"));
    }

    #[test]
    fn test_no_methods_is_fatal() {
        let err = compile(json!({"enums": {"Color": {"red": "red"}}})).unwrap_err();
        assert!(matches!(err, SchemaError::NoMethods));
        assert!(err.fault().is_fatal());
    }

    #[test]
    fn test_missing_direction() {
        let err = compile(json!({
            "methods": {"ping": {"request": {"n": "int"}}}
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::MissingDirection { ref method } if method == "ping"));
    }

    #[test]
    fn test_union_and_list_resolution() {
        let schema = compile(json!({
            "methods": {
                "probe": {
                    "request": {
                        "single": ["int"],
                        "union": ["int", "null"],
                        "list": [["string"]],
                        "list_union": [["int", "string"]]
                    },
                    "response": {}
                }
            }
        }))
        .unwrap();
        let request = &schema.method("probe").unwrap().request;
        let int = FieldType::Primitive(Primitive::Int);
        let string = FieldType::Primitive(Primitive::String);
        assert_eq!(request[0].1, int);
        assert_eq!(
            request[1].1,
            FieldType::Union(vec![int.clone(), FieldType::Primitive(Primitive::Null)])
        );
        assert_eq!(request[2].1, FieldType::List(Box::new(string.clone())));
        assert_eq!(
            request[3].1,
            FieldType::List(Box::new(FieldType::Union(vec![int, string])))
        );
    }

    #[test]
    fn test_union_deduplicates() {
        let schema = compile(json!({
            "methods": {
                "m": {"request": {"v": ["int", "int", "string"]}, "response": {}}
            }
        }))
        .unwrap();
        assert_eq!(
            schema.method("m").unwrap().request[0].1,
            FieldType::Union(vec![
                FieldType::Primitive(Primitive::Int),
                FieldType::Primitive(Primitive::String)
            ])
        );
    }

    #[test]
    fn test_empty_union_rejected() {
        let err = compile(json!({
            "methods": {"m": {"request": {"v": []}, "response": {}}}
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::Invalid { ref path, .. }
            if path == "methods.m.request.v"));
    }

    #[test]
    fn test_enum_and_object_acceptance() {
        let schema = compile(json!({
            "enums": {"Color": {"red": "red", "blue": "blue"}},
            "objects": {"Pixel": {"x": "int", "color": "Color"}},
            "methods": {
                "set_pixel": {"request": {"pixel": "Pixel"}, "response": {}}
            }
        }))
        .unwrap();
        assert!(schema
            .validate_request("set_pixel", &json!({"pixel": {"x": 1, "color": "red"}}))
            .is_ok());
        // Wrong enum value.
        assert!(schema
            .validate_request("set_pixel", &json!({"pixel": {"x": 1, "color": "green"}}))
            .is_err());
        // Undeclared key.
        assert!(schema
            .validate_request(
                "set_pixel",
                &json!({"pixel": {"x": 1, "color": "red", "z": 0}})
            )
            .is_err());
    }

    #[test]
    fn test_validate_request_unknown_method() {
        let schema = compile(json!({
            "methods": {"ping": {"request": {}, "response": {}}}
        }))
        .unwrap();
        let fault = schema.validate_request("pong", &json!({})).unwrap_err();
        assert_eq!(fault.error_code, wirecall_protocol::ErrorCode::UnknownMethod);
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let raw = json!({
            "enums": {"Color": {"red": "red"}},
            "objects": {"Pixel": {"x": "int", "color": "Color"}},
            "methods": {"noop": {"request": {}, "response": {"pixel": "Pixel"}}}
        });
        assert_eq!(compile(raw.clone()).unwrap(), compile(raw).unwrap());
    }
}
