// port.rs — Port tree nodes
//
// A port is an arena node congruent to its `ValueType`: a map port has one
// child per entry, a stream port exactly one sub-port, everything else is
// a leaf. Ports hold the connection edges and the per-port stream state.
// Tree construction and connection mechanics live in `graph`.

use std::fmt;

use crate::owner::OwnerId;
use crate::stream::StreamId;
use crate::types::ValueType;

// ── Identifiers ─────────────────────────────────────────────────────────────

/// Stable arena index of a port node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub u32);

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

// ── Direction ───────────────────────────────────────────────────────────────

/// Port direction, relative to the owning blackbox.
///
/// Whether a port acts as a data source or destination depends on the
/// owner kind: an operator's `Out` port is a source, while a blueprint
/// boundary's `In` port is (data entering the blueprint flows out of the
/// boundary's in-port into the graph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn opposite(self) -> Direction {
        match self {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => write!(f, "in"),
            Direction::Out => write!(f, "out"),
        }
    }
}

// ── Children ────────────────────────────────────────────────────────────────

/// Substructure of a port, mirroring its type's tag.
#[derive(Debug, Clone, PartialEq)]
pub enum PortChildren {
    /// Primitive or generic port — carries edges directly.
    Leaf,
    /// One sub-port per map entry, in declaration order.
    Map(Vec<(String, PortId)>),
    /// The single stream sub-port.
    Stream(PortId),
}

impl PortChildren {
    pub fn is_leaf(&self) -> bool {
        matches!(self, PortChildren::Leaf)
    }
}

// ── Node ────────────────────────────────────────────────────────────────────

/// One node of a port tree.
#[derive(Debug, Clone)]
pub struct PortNode {
    /// Entry name under a map parent, `"~"` under a stream parent, or the
    /// root port's declared name.
    pub name: String,
    pub ty: ValueType,
    pub direction: Direction,
    pub owner: OwnerId,
    pub parent: Option<PortId>,
    pub children: PortChildren,
    /// Connected peer ports. Destination ports hold at most one entry.
    pub connected: Vec<PortId>,
    /// Optional service tag on the root port of a tree (`None` = main).
    pub service: Option<String>,
    /// Current stream assignment. Set to the owner's context during
    /// `initialize_owner`; placeholder until then.
    pub stream: StreamId,
}

impl PortNode {
    /// Sub-port for a named map entry.
    pub fn map_child(&self, name: &str) -> Option<PortId> {
        match &self.children {
            PortChildren::Map(entries) => entries
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, id)| *id),
            _ => None,
        }
    }

    /// The stream sub-port, if this is a stream port.
    pub fn stream_child(&self) -> Option<PortId> {
        match &self.children {
            PortChildren::Stream(id) => Some(*id),
            _ => None,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_opposite() {
        assert_eq!(Direction::In.opposite(), Direction::Out);
        assert_eq!(Direction::Out.opposite(), Direction::In);
    }

    #[test]
    fn children_lookup() {
        let node = PortNode {
            name: "root".to_string(),
            ty: ValueType::map(),
            direction: Direction::In,
            owner: OwnerId(0),
            parent: None,
            children: PortChildren::Map(vec![
                ("a".to_string(), PortId(1)),
                ("b".to_string(), PortId(2)),
            ]),
            connected: Vec::new(),
            service: None,
            stream: StreamId(0),
        };
        assert_eq!(node.map_child("b"), Some(PortId(2)));
        assert_eq!(node.map_child("c"), None);
        assert_eq!(node.stream_child(), None);
    }
}
