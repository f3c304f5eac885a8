// owner.rs — Port owners (blackboxes)
//
// Every port tree belongs to a blackbox: an operator instance, a delegate
// attached to an operator, or the blueprint's own boundary. Owner kind is
// a closed variant — connection-role and cycle-walk logic match on it
// exhaustively instead of downcasting.

use std::fmt;

use crate::port::PortId;
use crate::stream::StreamId;

// ── Identifiers ─────────────────────────────────────────────────────────────

/// Stable arena index of a port owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(pub u32);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "o{}", self.0)
    }
}

// ── Kind ────────────────────────────────────────────────────────────────────

/// What a blackbox is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnerKind {
    /// An operator instance placed in the blueprint.
    Operator { name: String },
    /// A delegate (callback boundary) attached to a parent operator.
    Delegate { name: String, parent: OwnerId },
    /// The blueprint's own boundary; one per graph.
    BlueprintBoundary,
}

impl OwnerKind {
    /// Display name used in port references and reports.
    pub fn label(&self) -> &str {
        match self {
            OwnerKind::Operator { name } => name,
            OwnerKind::Delegate { name, .. } => name,
            OwnerKind::BlueprintBoundary => "",
        }
    }
}

// ── Node ────────────────────────────────────────────────────────────────────

/// Per-blackbox stream state.
#[derive(Debug, Clone)]
pub struct OwnerNode {
    pub kind: OwnerKind,
    /// Iteration context the owner's ports inherit. Absent until
    /// `initialize_owner` runs.
    pub base_stream: Option<StreamId>,
    /// True for generator-like blackboxes whose out-ports introduce a new
    /// stream level.
    pub is_stream_source: bool,
    /// Set during phase 1 of the reset protocol, cleared in phase 2.
    pub marked_for_reset: bool,
    /// Root ports of the trees this owner holds, in creation order.
    pub ports: Vec<PortId>,
}

impl OwnerNode {
    pub fn new(kind: OwnerKind, is_stream_source: bool) -> Self {
        OwnerNode {
            kind,
            base_stream: None,
            is_stream_source,
            marked_for_reset: false,
            ports: Vec::new(),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
