// compat.rs — Connection compatibility checks
//
// Decides whether a prospective edge is legal: structural type
// compatibility, stream compatibility of the two ports' resolved stream
// types, and absence of a dataflow cycle through already-connected
// ports. Rejections are ordinary control flow — `check_connect` returns
// a typed denial, `can_connect*` are its boolean views.
//
// Preconditions: both ports belong to an initialized graph.
// Postconditions: none (pure queries).
// Failure modes: asymmetric connection bookkeeping panics (engine bug).
// Side effects: none.

use std::fmt;

use crate::graph::BlueprintGraph;
use crate::owner::{OwnerId, OwnerKind};
use crate::port::PortId;
use crate::stream::StreamId;
use crate::types::{TypeTag, ValueType};

// ── Denial reasons ──────────────────────────────────────────────────────────

/// Why a prospective connection was rejected. Not an error — rejected
/// attempts are part of the normal control-flow contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectDenial {
    /// Neither orientation of the pair yields (source, destination).
    RolePairing { a: PortId, b: PortId },
    /// The destination subtree already holds an incoming edge.
    DestinationOccupied { dst: PortId },
    /// This exact pair is already connected.
    AlreadyConnected { src: PortId, dst: PortId },
    TypesIncompatible { src: TypeTag, dst: TypeTag },
    StreamsIncompatible { src_depth: u32, dst_depth: u32 },
    /// The edge would close a feedback loop through connected ports.
    DataflowCycle { through: OwnerId },
}

impl fmt::Display for ConnectDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectDenial::RolePairing { a, b } => {
                write!(f, "{} and {} have no source/destination pairing", a, b)
            }
            ConnectDenial::DestinationOccupied { dst } => {
                write!(f, "destination {} already has an incoming edge", dst)
            }
            ConnectDenial::AlreadyConnected { src, dst } => {
                write!(f, "{} and {} are already connected", src, dst)
            }
            ConnectDenial::TypesIncompatible { src, dst } => {
                write!(f, "type {} does not satisfy {}", src, dst)
            }
            ConnectDenial::StreamsIncompatible {
                src_depth,
                dst_depth,
            } => {
                write!(
                    f,
                    "stream contexts disagree (source depth {}, destination depth {})",
                    src_depth, dst_depth
                )
            }
            ConnectDenial::DataflowCycle { through } => {
                write!(f, "edge would close a dataflow cycle through {}", through)
            }
        }
    }
}

// ── Structural compatibility ────────────────────────────────────────────────

/// Whether data of type `src` can feed a port of type `dst`.
///
/// Generics defer to later specialization. A trigger destination accepts
/// anything. The universal primitive pairs with every primitive kind in
/// either direction. Maps require every destination entry to exist in the
/// source with a compatible type (extra source entries are ignored);
/// streams recurse on their sub-types. Everything else needs equal tags.
pub fn types_compatible(src: &ValueType, dst: &ValueType) -> bool {
    match (src, dst) {
        (ValueType::Generic(_), _) | (_, ValueType::Generic(_)) => true,
        (_, ValueType::Trigger) => true,
        (ValueType::Primitive, other) if other.is_primitive() => true,
        (other, ValueType::Primitive) if other.is_primitive() => true,
        (ValueType::Map(src_entries), ValueType::Map(dst_entries)) => {
            dst_entries.iter().all(|(name, dst_sub)| {
                src_entries
                    .iter()
                    .find(|(n, _)| n == name)
                    .is_some_and(|(_, src_sub)| types_compatible(src_sub, dst_sub))
            })
        }
        (ValueType::Stream(src_sub), ValueType::Stream(dst_sub)) => {
            types_compatible(src_sub, dst_sub)
        }
        _ => src.tag() == dst.tag(),
    }
}

impl BlueprintGraph {
    // ── Stream compatibility ──

    /// Whether two stream assignments can describe one iteration context.
    ///
    /// Identity is always compatible. Two fixed-rooted chains are pinned
    /// to distinct origins and never unify. A fluent (placeholder-rooted)
    /// chain adapts to a fixed one as long as the fixed chain is at least
    /// as deep. Two fluent chains unify unless their shared nodes appear
    /// out of order, which would close a loop on merge.
    pub fn streams_compatible(&self, a: StreamId, b: StreamId) -> bool {
        if a == b {
            return true;
        }
        match (self.streams.is_fluent(a), self.streams.is_fluent(b)) {
            (false, false) => false,
            (true, false) => self.streams.depth(b) >= self.streams.depth(a),
            (false, true) => self.streams.depth(a) >= self.streams.depth(b),
            (true, true) => {
                !self.streams.contains_misplaced(a, b)
                    && !self.streams.contains_misplaced(b, a)
            }
        }
    }

    // ── Cycle rejection ──

    /// Whether adding `src → dst` keeps the dataflow acyclic.
    ///
    /// Searches backward from the source's owner through the connected
    /// input ports of upstream owners. Stream sources are generation
    /// boundaries — the walk checks but never crosses them — and the
    /// blueprint boundary's two sides face the external world, so edges
    /// touching it cannot loop.
    pub fn cycle_compatible_to(&self, src: PortId, dst: PortId) -> bool {
        let start = self.port(src).owner;
        let target = self.port(dst).owner;
        if matches!(self.owner(start).kind, OwnerKind::BlueprintBoundary)
            || matches!(self.owner(target).kind, OwnerKind::BlueprintBoundary)
        {
            return true;
        }
        if start == target {
            // An operator feeding itself is the smallest feedback loop.
            return false;
        }

        let mut visited = vec![start];
        let mut frontier = vec![start];
        while let Some(owner) = frontier.pop() {
            if owner == target {
                return false;
            }
            if matches!(self.owner(owner).kind, OwnerKind::BlueprintBoundary) {
                continue;
            }
            for upstream in self.upstream_owners(owner) {
                if !visited.contains(&upstream) {
                    visited.push(upstream);
                    frontier.push(upstream);
                }
            }
        }
        true
    }

    /// Owners feeding any destination port of `owner` through an edge.
    /// Stream sources originate data rather than depending on it, so
    /// edges out of them are not collected — the walk stops there.
    fn upstream_owners(&self, owner: OwnerId) -> Vec<OwnerId> {
        let mut upstream = Vec::new();
        for root in &self.owner(owner).ports {
            if !self.is_destination(*root) {
                continue;
            }
            let mut subtree = vec![*root];
            let mut index = 0;
            while index < subtree.len() {
                let port = subtree[index];
                index += 1;
                for peer in &self.port(port).connected {
                    let peer_owner = self.port(*peer).owner;
                    if self.owner(peer_owner).is_stream_source {
                        continue;
                    }
                    if !upstream.contains(&peer_owner) {
                        upstream.push(peer_owner);
                    }
                }
                match &self.port(port).children {
                    crate::port::PortChildren::Leaf => {}
                    crate::port::PortChildren::Map(entries) => {
                        subtree.extend(entries.iter().map(|(_, c)| *c));
                    }
                    crate::port::PortChildren::Stream(child) => subtree.push(*child),
                }
            }
        }
        upstream
    }

    // ── Composition ──

    /// Full connection check with a typed denial reason.
    pub fn check_connect(&self, src: PortId, dst: PortId) -> Result<(), ConnectDenial> {
        if !self.is_source(src) || !self.is_destination(dst) {
            return Err(ConnectDenial::RolePairing { a: src, b: dst });
        }
        if self.pair_connected(src, dst) {
            return Err(ConnectDenial::AlreadyConnected { src, dst });
        }
        if self.occupied(dst) {
            return Err(ConnectDenial::DestinationOccupied { dst });
        }
        let src_node = self.port(src);
        let dst_node = self.port(dst);
        if !types_compatible(&src_node.ty, &dst_node.ty) {
            return Err(ConnectDenial::TypesIncompatible {
                src: src_node.ty.tag(),
                dst: dst_node.ty.tag(),
            });
        }
        if !self.streams_compatible(src_node.stream, dst_node.stream) {
            return Err(ConnectDenial::StreamsIncompatible {
                src_depth: self.streams.depth(src_node.stream),
                dst_depth: self.streams.depth(dst_node.stream),
            });
        }
        if !self.cycle_compatible_to(src, dst) {
            return Err(ConnectDenial::DataflowCycle {
                through: dst_node.owner,
            });
        }
        Ok(())
    }

    /// Directed boolean view of `check_connect`.
    pub fn can_connect_to(&self, src: PortId, dst: PortId) -> bool {
        self.check_connect(src, dst).is_ok()
    }

    /// Symmetric wrapper: orients the pair and checks.
    pub fn can_connect(&self, a: PortId, b: PortId) -> bool {
        match self.resolve_roles(a, b) {
            Some((src, dst)) => self.can_connect_to(src, dst),
            None => false,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::Direction;

    fn map_of(entries: &[(&str, ValueType)]) -> ValueType {
        let mut m = ValueType::map();
        for (name, ty) in entries {
            m.add_map_sub(*name, ty.clone()).unwrap();
        }
        m
    }

    #[test]
    fn generic_is_compatible_with_anything() {
        assert!(types_compatible(&ValueType::generic("T"), &ValueType::Number));
        assert!(types_compatible(&ValueType::map(), &ValueType::generic("T")));
    }

    #[test]
    fn trigger_destination_accepts_anything() {
        assert!(types_compatible(&ValueType::Number, &ValueType::Trigger));
        assert!(types_compatible(
            &ValueType::stream(ValueType::Binary),
            &ValueType::Trigger
        ));
        // But a trigger source does not feed a number.
        assert!(!types_compatible(&ValueType::Trigger, &ValueType::Number));
    }

    #[test]
    fn primitive_pairs_with_primitive_kinds() {
        assert!(types_compatible(&ValueType::Primitive, &ValueType::Number));
        assert!(types_compatible(&ValueType::String, &ValueType::Primitive));
        assert!(!types_compatible(&ValueType::Primitive, &ValueType::map()));
    }

    #[test]
    fn map_requires_destination_entries() {
        let src = map_of(&[("a", ValueType::Number), ("b", ValueType::String)]);
        let dst = map_of(&[("a", ValueType::Number)]);
        // Extra source entries are ignored.
        assert!(types_compatible(&src, &dst));
        // A destination entry missing from the source fails.
        assert!(!types_compatible(&dst, &src));
    }

    #[test]
    fn stream_compatibility_recurses() {
        let src = ValueType::stream(ValueType::Number);
        assert!(types_compatible(&src, &ValueType::stream(ValueType::Number)));
        assert!(!types_compatible(&src, &ValueType::stream(ValueType::Binary)));
        assert!(!types_compatible(&src, &ValueType::Number));
    }

    #[test]
    fn fluent_streams_unify_when_independent() {
        let mut g = BlueprintGraph::new("test");
        let a_root = g.streams.create_placeholder_root();
        let a = g.streams.create_sub_stream(a_root, None);
        let b_root = g.streams.create_placeholder_root();
        let b_mid = g.streams.create_sub_stream(b_root, None);
        let b = g.streams.create_sub_stream(b_mid, None);
        assert!(g.streams_compatible(a, b));
    }

    #[test]
    fn fixed_streams_never_unify() {
        let mut g = BlueprintGraph::new("test");
        let a = g.streams.create(None, Some(PortId(0)));
        let b = g.streams.create(None, Some(PortId(1)));
        assert!(!g.streams_compatible(a, b));
        assert!(g.streams_compatible(a, a));
    }

    #[test]
    fn fluent_adapts_to_deep_enough_fixed() {
        let mut g = BlueprintGraph::new("test");
        let fixed_root = g.streams.create(None, Some(PortId(0)));
        let fixed = g.streams.create_sub_stream(fixed_root, None);
        let fluent_shallow = g.streams.create_placeholder_root();
        assert!(g.streams_compatible(fluent_shallow, fixed));

        let fluent_root = g.streams.create_placeholder_root();
        let fluent_mid = g.streams.create_sub_stream(fluent_root, None);
        let fluent_deep = g.streams.create_sub_stream(fluent_mid, None);
        assert!(!g.streams_compatible(fluent_deep, fixed));
    }

    #[test]
    fn self_edge_on_operator_is_a_cycle() {
        let mut g = BlueprintGraph::new("test");
        let op = g.add_operator("op", false);
        let input = g.create_port(op, "in", &ValueType::Number, Direction::In);
        let output = g.create_port(op, "out", &ValueType::Number, Direction::Out);
        g.initialize_owner(op).unwrap();
        assert!(!g.cycle_compatible_to(output, input));
    }

    #[test]
    fn boundary_pass_through_is_not_a_cycle() {
        let mut g = BlueprintGraph::new("test");
        let b_in = g.create_port(g.boundary(), "in", &ValueType::Number, Direction::In);
        let b_out = g.create_port(g.boundary(), "out", &ValueType::Number, Direction::Out);
        g.initialize_owner(g.boundary()).unwrap();
        assert!(g.cycle_compatible_to(b_in, b_out));
    }
}
