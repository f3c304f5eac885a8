// types.rs — Structural value types for blueprint ports
//
// A `ValueType` describes the shape of the data flowing through a port:
// leaf primitives, named generics, maps of named sub-types, and streams
// wrapping one sub-type. Pure value type — no graph awareness.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: `TypeError` on unification failures; `StructuralError`
//   on builder calls against the wrong tag (programming-contract breach).
// Side effects: none.

use std::collections::HashMap;
use std::fmt;

// ── Tags ────────────────────────────────────────────────────────────────────

/// Discriminant of a `ValueType`, used in contract-violation reports and
/// compatibility checks that only need the shape class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Number,
    Binary,
    Boolean,
    String,
    Trigger,
    Primitive,
    Generic,
    Map,
    Stream,
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeTag::Number => "number",
            TypeTag::Binary => "binary",
            TypeTag::Boolean => "boolean",
            TypeTag::String => "string",
            TypeTag::Trigger => "trigger",
            TypeTag::Primitive => "primitive",
            TypeTag::Generic => "generic",
            TypeTag::Map => "map",
            TypeTag::Stream => "stream",
        };
        write!(f, "{}", name)
    }
}

// ── ValueType ───────────────────────────────────────────────────────────────

/// Recursive structural type of a port.
///
/// `Map` entries keep declaration order; names are unique within one map.
/// Equality is structural: same tag and, recursively, equal map entry
/// names/sub-types, equal stream sub-types, or equal generic identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueType {
    Number,
    Binary,
    Boolean,
    String,
    Trigger,
    /// The universal primitive: compatible with every primitive kind.
    Primitive,
    /// Named placeholder resolved later via a generic-specification map.
    Generic(String),
    /// Ordered named sub-types; names unique.
    Map(Vec<(String, ValueType)>),
    /// One level of implicit iteration around a sub-type.
    Stream(Box<ValueType>),
}

// ── Errors ──────────────────────────────────────────────────────────────────

/// Unification failure — surfaced to callers, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    /// Two types have no structural merge (mismatched tags or generics).
    NotUnifiable { left: TypeTag, right: TypeTag },
    /// Two generics with different identifiers cannot unify.
    GenericMismatch { left: String, right: String },
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::NotUnifiable { left, right } => {
                write!(f, "types not unifiable: {} vs {}", left, right)
            }
            TypeError::GenericMismatch { left, right } => {
                write!(f, "generic identifiers differ: '{}' vs '{}'", left, right)
            }
        }
    }
}

impl std::error::Error for TypeError {}

/// Contract violation — a builder or accessor was called against the wrong
/// tag. Indicates a bug in the caller, not user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralError {
    WrongTag {
        operation: &'static str,
        expected: TypeTag,
        actual: TypeTag,
    },
    DuplicateMapEntry { name: String },
}

impl fmt::Display for StructuralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralError::WrongTag {
                operation,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "{} requires a {} type, got {}",
                    operation, expected, actual
                )
            }
            StructuralError::DuplicateMapEntry { name } => {
                write!(f, "duplicate map entry '{}'", name)
            }
        }
    }
}

impl std::error::Error for StructuralError {}

// ── Operations ──────────────────────────────────────────────────────────────

impl ValueType {
    /// Empty map builder target.
    pub fn map() -> Self {
        ValueType::Map(Vec::new())
    }

    /// Stream of the given sub-type.
    pub fn stream(sub: ValueType) -> Self {
        ValueType::Stream(Box::new(sub))
    }

    pub fn generic(identifier: impl Into<String>) -> Self {
        ValueType::Generic(identifier.into())
    }

    pub fn tag(&self) -> TypeTag {
        match self {
            ValueType::Number => TypeTag::Number,
            ValueType::Binary => TypeTag::Binary,
            ValueType::Boolean => TypeTag::Boolean,
            ValueType::String => TypeTag::String,
            ValueType::Trigger => TypeTag::Trigger,
            ValueType::Primitive => TypeTag::Primitive,
            ValueType::Generic(_) => TypeTag::Generic,
            ValueType::Map(_) => TypeTag::Map,
            ValueType::Stream(_) => TypeTag::Stream,
        }
    }

    /// Primitive kinds: number, binary, boolean, string, trigger, primitive.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            ValueType::Number
                | ValueType::Binary
                | ValueType::Boolean
                | ValueType::String
                | ValueType::Trigger
                | ValueType::Primitive
        )
    }

    /// A map with no non-void entries is void; a stream of a void type is
    /// void. Everything else carries data.
    pub fn is_void(&self) -> bool {
        match self {
            ValueType::Map(entries) => entries.iter().all(|(_, sub)| sub.is_void()),
            ValueType::Stream(sub) => sub.is_void(),
            _ => false,
        }
    }

    /// Add a named entry to a `Map` type. Keeps declaration order.
    pub fn add_map_sub(
        &mut self,
        name: impl Into<String>,
        sub: ValueType,
    ) -> Result<(), StructuralError> {
        let tag = self.tag();
        match self {
            ValueType::Map(entries) => {
                let name = name.into();
                if entries.iter().any(|(n, _)| *n == name) {
                    return Err(StructuralError::DuplicateMapEntry { name });
                }
                entries.push((name, sub));
                Ok(())
            }
            _ => Err(StructuralError::WrongTag {
                operation: "add_map_sub",
                expected: TypeTag::Map,
                actual: tag,
            }),
        }
    }

    /// Replace the sub-type of a `Stream` type.
    pub fn set_stream_sub(&mut self, sub: ValueType) -> Result<(), StructuralError> {
        let tag = self.tag();
        match self {
            ValueType::Stream(inner) => {
                *inner = Box::new(sub);
                Ok(())
            }
            _ => Err(StructuralError::WrongTag {
                operation: "set_stream_sub",
                expected: TypeTag::Stream,
                actual: tag,
            }),
        }
    }

    /// Rename a `Generic` type's identifier.
    pub fn set_generic_identifier(
        &mut self,
        identifier: impl Into<String>,
    ) -> Result<(), StructuralError> {
        let tag = self.tag();
        match self {
            ValueType::Generic(id) => {
                *id = identifier.into();
                Ok(())
            }
            _ => Err(StructuralError::WrongTag {
                operation: "set_generic_identifier",
                expected: TypeTag::Generic,
                actual: tag,
            }),
        }
    }

    /// Entries of a `Map` type.
    pub fn map_subs(&self) -> Option<&[(String, ValueType)]> {
        match self {
            ValueType::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Sub-type of a `Stream` type.
    pub fn stream_sub(&self) -> Option<&ValueType> {
        match self {
            ValueType::Stream(sub) => Some(sub),
            _ => None,
        }
    }

    /// Structural merge of two types.
    ///
    /// Maps union their entry sets (recursing where names coincide; entries
    /// whose union is void are dropped). Streams union their sub-types.
    /// Generics must carry the same identifier. Equal primitive tags merge
    /// to a copy. Every other pairing has no merge.
    pub fn union(&self, other: &ValueType) -> Result<ValueType, TypeError> {
        match (self, other) {
            (ValueType::Map(left), ValueType::Map(right)) => {
                let mut merged: Vec<(String, ValueType)> = Vec::new();
                for (name, sub) in left {
                    let entry = match right.iter().find(|(n, _)| n == name) {
                        Some((_, other_sub)) => sub.union(other_sub)?,
                        None => sub.clone(),
                    };
                    if !entry.is_void() {
                        merged.push((name.clone(), entry));
                    }
                }
                for (name, sub) in right {
                    if left.iter().any(|(n, _)| n == name) {
                        continue;
                    }
                    if !sub.is_void() {
                        merged.push((name.clone(), sub.clone()));
                    }
                }
                Ok(ValueType::Map(merged))
            }
            (ValueType::Stream(left), ValueType::Stream(right)) => {
                Ok(ValueType::Stream(Box::new(left.union(right)?)))
            }
            (ValueType::Generic(left), ValueType::Generic(right)) => {
                if left == right {
                    Ok(ValueType::Generic(left.clone()))
                } else {
                    Err(TypeError::GenericMismatch {
                        left: left.clone(),
                        right: right.clone(),
                    })
                }
            }
            _ => {
                if self.tag() == other.tag() {
                    Ok(self.clone())
                } else {
                    Err(TypeError::NotUnifiable {
                        left: self.tag(),
                        right: other.tag(),
                    })
                }
            }
        }
    }

    /// Replace every reachable `Generic(id)` with its assigned concrete
    /// type. Identifiers absent from the assignment are kept, so partial
    /// specialization composes.
    pub fn specify_generics(&self, assignment: &HashMap<String, ValueType>) -> ValueType {
        match self {
            ValueType::Generic(id) => match assignment.get(id) {
                Some(concrete) => concrete.clone(),
                None => ValueType::Generic(id.clone()),
            },
            ValueType::Map(entries) => ValueType::Map(
                entries
                    .iter()
                    .map(|(name, sub)| (name.clone(), sub.specify_generics(assignment)))
                    .collect(),
            ),
            ValueType::Stream(sub) => {
                ValueType::Stream(Box::new(sub.specify_generics(assignment)))
            }
            other => other.clone(),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Generic(id) => write!(f, "generic<{}>", id),
            ValueType::Map(entries) => {
                write!(f, "{{")?;
                for (i, (name, sub)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, sub)?;
                }
                write!(f, "}}")
            }
            ValueType::Stream(sub) => write!(f, "stream<{}>", sub),
            other => write!(f, "{}", other.tag()),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn pair_map(a: ValueType, b: ValueType) -> ValueType {
        let mut m = ValueType::map();
        m.add_map_sub("a", a).unwrap();
        m.add_map_sub("b", b).unwrap();
        m
    }

    #[test]
    fn structural_equality() {
        assert_eq!(
            pair_map(ValueType::Number, ValueType::String),
            pair_map(ValueType::Number, ValueType::String)
        );
        assert_ne!(
            pair_map(ValueType::Number, ValueType::String),
            pair_map(ValueType::String, ValueType::Number)
        );
        assert_eq!(ValueType::generic("T"), ValueType::generic("T"));
        assert_ne!(ValueType::generic("T"), ValueType::generic("U"));
    }

    #[test]
    fn deep_copy_is_independent() {
        let original = ValueType::stream(pair_map(ValueType::Number, ValueType::Boolean));
        let mut copy = original.clone();
        copy.set_stream_sub(ValueType::Trigger).unwrap();
        assert_ne!(original, copy);
    }

    #[test]
    fn empty_map_is_void() {
        assert!(ValueType::map().is_void());
        assert!(ValueType::stream(ValueType::map()).is_void());
        assert!(!ValueType::Number.is_void());
        assert!(!pair_map(ValueType::Number, ValueType::String).is_void());
    }

    #[test]
    fn map_of_void_entries_is_void() {
        let mut m = ValueType::map();
        m.add_map_sub("x", ValueType::map()).unwrap();
        m.add_map_sub("y", ValueType::stream(ValueType::map())).unwrap();
        assert!(m.is_void());
    }

    #[test]
    fn builder_wrong_tag_rejected() {
        let mut n = ValueType::Number;
        assert!(matches!(
            n.add_map_sub("x", ValueType::Number),
            Err(StructuralError::WrongTag { .. })
        ));
        assert!(matches!(
            n.set_stream_sub(ValueType::Number),
            Err(StructuralError::WrongTag { .. })
        ));
        assert!(matches!(
            n.set_generic_identifier("T"),
            Err(StructuralError::WrongTag { .. })
        ));
    }

    #[test]
    fn duplicate_map_entry_rejected() {
        let mut m = ValueType::map();
        m.add_map_sub("x", ValueType::Number).unwrap();
        assert!(matches!(
            m.add_map_sub("x", ValueType::String),
            Err(StructuralError::DuplicateMapEntry { .. })
        ));
    }

    #[test]
    fn union_maps_merges_entries() {
        let mut left = ValueType::map();
        left.add_map_sub("a", ValueType::Number).unwrap();
        left.add_map_sub("b", ValueType::String).unwrap();
        let mut right = ValueType::map();
        right.add_map_sub("b", ValueType::String).unwrap();
        right.add_map_sub("c", ValueType::Boolean).unwrap();

        let merged = left.union(&right).unwrap();
        let entries = merged.map_subs().unwrap();
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn union_drops_void_entries() {
        let mut left = ValueType::map();
        left.add_map_sub("a", ValueType::Number).unwrap();
        left.add_map_sub("empty", ValueType::map()).unwrap();
        let merged = left.union(&ValueType::map()).unwrap();
        let names: Vec<&str> = merged
            .map_subs()
            .unwrap()
            .iter()
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn union_generics_must_match() {
        assert!(ValueType::generic("T").union(&ValueType::generic("T")).is_ok());
        assert!(matches!(
            ValueType::generic("T").union(&ValueType::generic("U")),
            Err(TypeError::GenericMismatch { .. })
        ));
    }

    #[test]
    fn union_mismatched_tags_rejected() {
        assert!(matches!(
            ValueType::Number.union(&ValueType::String),
            Err(TypeError::NotUnifiable { .. })
        ));
        assert!(matches!(
            ValueType::map().union(&ValueType::Number),
            Err(TypeError::NotUnifiable { .. })
        ));
    }

    #[test]
    fn union_streams_recurses() {
        let left = ValueType::stream(pair_map(ValueType::Number, ValueType::String));
        let right = ValueType::stream(pair_map(ValueType::Number, ValueType::String));
        assert_eq!(left.union(&right).unwrap(), left);
    }

    #[test]
    fn specify_generics_replaces_reachable() {
        let mut m = ValueType::map();
        m.add_map_sub("value", ValueType::generic("T")).unwrap();
        m.add_map_sub("items", ValueType::stream(ValueType::generic("T")))
            .unwrap();
        m.add_map_sub("tag", ValueType::String).unwrap();

        let mut assignment = HashMap::new();
        assignment.insert("T".to_string(), ValueType::Number);
        let specified = m.specify_generics(&assignment);

        let entries = specified.map_subs().unwrap();
        assert_eq!(entries[0].1, ValueType::Number);
        assert_eq!(entries[1].1, ValueType::stream(ValueType::Number));
        assert_eq!(entries[2].1, ValueType::String);
    }

    #[test]
    fn specify_generics_keeps_unassigned() {
        let g = ValueType::generic("U");
        let specified = g.specify_generics(&HashMap::new());
        assert_eq!(specified, ValueType::generic("U"));
    }

    #[test]
    fn display_forms() {
        assert_eq!(format!("{}", ValueType::Number), "number");
        assert_eq!(format!("{}", ValueType::generic("T")), "generic<T>");
        assert_eq!(
            format!("{}", ValueType::stream(ValueType::Trigger)),
            "stream<trigger>"
        );
        assert_eq!(
            format!("{}", pair_map(ValueType::Number, ValueType::String)),
            "{a: number, b: string}"
        );
    }
}
