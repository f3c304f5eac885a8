// typedef.rs — JSON type-definition shape
//
// The persistence layer describes port types as JSON:
//   {"type": "map"|"stream"|"generic"|<primitive>,
//    "map": {name: TypeDef}, "stream": TypeDef, "generic": string}
// This module parses that shape with serde, converts it to `ValueType`,
// and computes a stable SHA-256 fingerprint over the canonical compact
// JSON so the persistence layer can detect definition changes.
//
// Preconditions: input is valid JSON.
// Postconditions: conversion preserves map entry order (serde maps are
//   deserialized into an ordered list).
// Failure modes: unknown type tag, missing payload field → `TypeDefError`.
// Side effects: none.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::types::ValueType;

// ── JSON shape ──────────────────────────────────────────────────────────────

/// Raw type definition as stored in blueprint files.
///
/// `map` keeps entries as a JSON object; the `preserve_order` feature of
/// serde_json keeps declaration order, which `ValueType` map equality
/// depends on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDef {
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<Box<TypeDef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generic: Option<String>,
}

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum TypeDefError {
    UnknownTag { tag: String },
    MissingPayload { tag: &'static str, field: &'static str },
    MalformedEntry { name: String, source: serde_json::Error },
}

impl fmt::Display for TypeDefError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDefError::UnknownTag { tag } => write!(f, "unknown type tag '{}'", tag),
            TypeDefError::MissingPayload { tag, field } => {
                write!(f, "type '{}' requires a '{}' field", tag, field)
            }
            TypeDefError::MalformedEntry { name, source } => {
                write!(f, "malformed map entry '{}': {}", name, source)
            }
        }
    }
}

impl std::error::Error for TypeDefError {}

// ── Conversion ──────────────────────────────────────────────────────────────

impl TypeDef {
    /// Leaf definition for a primitive tag.
    pub fn primitive(tag: &str) -> Self {
        TypeDef {
            type_tag: tag.to_string(),
            map: None,
            stream: None,
            generic: None,
        }
    }

    /// Convert to the engine's structural type.
    pub fn to_value_type(&self) -> Result<ValueType, TypeDefError> {
        match self.type_tag.as_str() {
            "number" => Ok(ValueType::Number),
            "binary" => Ok(ValueType::Binary),
            "boolean" => Ok(ValueType::Boolean),
            "string" => Ok(ValueType::String),
            "trigger" => Ok(ValueType::Trigger),
            "primitive" => Ok(ValueType::Primitive),
            "generic" => {
                let id = self.generic.as_ref().ok_or(TypeDefError::MissingPayload {
                    tag: "generic",
                    field: "generic",
                })?;
                Ok(ValueType::Generic(id.clone()))
            }
            "stream" => {
                let sub = self.stream.as_ref().ok_or(TypeDefError::MissingPayload {
                    tag: "stream",
                    field: "stream",
                })?;
                Ok(ValueType::Stream(Box::new(sub.to_value_type()?)))
            }
            "map" => {
                let entries = self.map.as_ref().ok_or(TypeDefError::MissingPayload {
                    tag: "map",
                    field: "map",
                })?;
                let mut subs = Vec::with_capacity(entries.len());
                for (name, value) in entries {
                    let sub: TypeDef = serde_json::from_value(value.clone()).map_err(|e| {
                        TypeDefError::MalformedEntry {
                            name: name.clone(),
                            source: e,
                        }
                    })?;
                    subs.push((name.clone(), sub.to_value_type()?));
                }
                Ok(ValueType::Map(subs))
            }
            other => Err(TypeDefError::UnknownTag {
                tag: other.to_string(),
            }),
        }
    }

    /// Rebuild a definition from a structural type (inverse of
    /// `to_value_type`; used when writing definitions back out).
    pub fn from_value_type(ty: &ValueType) -> Self {
        match ty {
            ValueType::Number => TypeDef::primitive("number"),
            ValueType::Binary => TypeDef::primitive("binary"),
            ValueType::Boolean => TypeDef::primitive("boolean"),
            ValueType::String => TypeDef::primitive("string"),
            ValueType::Trigger => TypeDef::primitive("trigger"),
            ValueType::Primitive => TypeDef::primitive("primitive"),
            ValueType::Generic(id) => TypeDef {
                type_tag: "generic".to_string(),
                map: None,
                stream: None,
                generic: Some(id.clone()),
            },
            ValueType::Stream(sub) => TypeDef {
                type_tag: "stream".to_string(),
                map: None,
                stream: Some(Box::new(TypeDef::from_value_type(sub))),
                generic: None,
            },
            ValueType::Map(entries) => {
                let mut map = serde_json::Map::new();
                for (name, sub) in entries {
                    let def = TypeDef::from_value_type(sub);
                    map.insert(
                        name.clone(),
                        serde_json::to_value(def).expect("type definitions serialize"),
                    );
                }
                TypeDef {
                    type_tag: "map".to_string(),
                    map: Some(map),
                    stream: None,
                    generic: None,
                }
            }
        }
    }

    /// Compact canonical JSON, independent of display formatting.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("type definitions serialize")
    }
}

// ── Fingerprint ─────────────────────────────────────────────────────────────

/// Compute a stable fingerprint over a set of named type definitions.
///
/// Hash key: `name + "\0" + canonical_json`, entries joined by `"\0"`,
/// in the iteration order given. Output: first 8 bytes of SHA-256 as a
/// 16-char hex string.
pub fn definition_fingerprint<'a>(
    definitions: impl IntoIterator<Item = (&'a str, &'a TypeDef)>,
) -> String {
    let mut hasher = Sha256::new();
    for (i, (name, def)) in definitions.into_iter().enumerate() {
        if i > 0 {
            hasher.update(b"\0");
        }
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(def.canonical_json().as_bytes());
    }
    let hash = hasher.finalize();
    let mut s = String::with_capacity(16);
    for b in &hash[..8] {
        use std::fmt::Write;
        let _ = write!(s, "{:02x}", b);
    }
    s
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> TypeDef {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn primitive_defs_convert() {
        for tag in ["number", "binary", "boolean", "string", "trigger", "primitive"] {
            let def = parse(&format!(r#"{{"type": "{}"}}"#, tag));
            let ty = def.to_value_type().unwrap();
            assert!(ty.is_primitive());
        }
    }

    #[test]
    fn nested_def_converts() {
        let def = parse(
            r#"{"type": "stream", "stream":
                {"type": "map", "map": {
                    "value": {"type": "number"},
                    "items": {"type": "stream", "stream": {"type": "generic", "generic": "T"}}
                }}}"#,
        );
        let ty = def.to_value_type().unwrap();
        let inner = ty.stream_sub().unwrap();
        let entries = inner.map_subs().unwrap();
        assert_eq!(entries[0].1, ValueType::Number);
        assert_eq!(
            entries[1].1,
            ValueType::stream(ValueType::generic("T"))
        );
    }

    #[test]
    fn unknown_tag_rejected() {
        let def = parse(r#"{"type": "complex"}"#);
        assert!(matches!(
            def.to_value_type(),
            Err(TypeDefError::UnknownTag { .. })
        ));
    }

    #[test]
    fn missing_payload_rejected() {
        assert!(matches!(
            parse(r#"{"type": "stream"}"#).to_value_type(),
            Err(TypeDefError::MissingPayload { .. })
        ));
        assert!(matches!(
            parse(r#"{"type": "generic"}"#).to_value_type(),
            Err(TypeDefError::MissingPayload { .. })
        ));
        assert!(matches!(
            parse(r#"{"type": "map"}"#).to_value_type(),
            Err(TypeDefError::MissingPayload { .. })
        ));
    }

    #[test]
    fn round_trip_preserves_structure() {
        let mut ty = ValueType::map();
        ty.add_map_sub("a", ValueType::Number).unwrap();
        ty.add_map_sub("b", ValueType::stream(ValueType::Boolean))
            .unwrap();
        let def = TypeDef::from_value_type(&ty);
        assert_eq!(def.to_value_type().unwrap(), ty);
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let number = TypeDef::primitive("number");
        let string = TypeDef::primitive("string");

        let a = definition_fingerprint([("in", &number), ("out", &string)]);
        let b = definition_fingerprint([("in", &number), ("out", &string)]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);

        let c = definition_fingerprint([("in", &string), ("out", &number)]);
        assert_ne!(a, c);
    }
}
