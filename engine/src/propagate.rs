// propagate.rs — Stream propagation across port trees and owners
//
// Two directions of flow: parent→child pushes an assigned stream down a
// port tree (map children share it, stream children descend one level);
// child→parent merges an observed stream upward and re-enters the
// downward direction at the tree root. Changed ports forward their
// streams across existing edges, and tree roots feed their owner's base
// stream, which is how inferred depths cross blackbox boundaries.
//
// Preconditions: owners are initialized before their ports see edges.
// Postconditions: propagation runs to a fixpoint before returning — the
//   merge policy is monotone (deeper/more-fixed wins), so every assign
//   either changes nothing or moves toward the fixpoint.
// Failure modes: none surfaced; chain corruption panics in `stream`.
// Side effects: refresh events for changed ports while refresh is active.

use crate::event::{EngineEvent, ResetListener};
use crate::graph::{BlueprintGraph, GraphError};
use crate::owner::{OwnerId, OwnerKind};
use crate::port::{Direction, PortChildren, PortId};
use crate::stream::StreamId;

impl BlueprintGraph {
    // ── Owner initialization ──

    /// Seed the owner's base stream and push it through every port tree.
    ///
    /// A stream source seeds a fixed root sourced at its first out port;
    /// everything else seeds a placeholder root immediately.
    pub fn initialize_owner(&mut self, owner: OwnerId) -> Result<(), GraphError> {
        if self.owner(owner).base_stream.is_some() {
            return Err(GraphError::AlreadyInitialized { owner });
        }
        let base = if self.owner(owner).is_stream_source {
            let first_out = self
                .owner(owner)
                .ports
                .iter()
                .copied()
                .find(|p| self.port(*p).direction == Direction::Out)
                .ok_or(GraphError::MissingSourcePort { owner })?;
            self.streams.create(None, Some(first_out))
        } else {
            self.streams.create_placeholder_root()
        };
        self.owner_mut(owner).base_stream = Some(base);
        self.streams.subscribe(base, ResetListener::Owner(owner));
        for root in self.owner(owner).ports.clone() {
            self.push_parent_to_child(root, base, true);
        }
        Ok(())
    }

    // ── Raw assignment ──

    /// Set a port's stream, moving its reset subscription. Returns true
    /// if the value changed.
    pub(crate) fn assign_stream(&mut self, port: PortId, new: StreamId) -> bool {
        let old = self.port(port).stream;
        if old == new {
            return false;
        }
        self.streams.unsubscribe(old, ResetListener::Port(port));
        self.streams.subscribe(new, ResetListener::Port(port));
        self.port_mut(port).stream = new;
        if self.refresh_active {
            self.events.publish(EngineEvent::RefreshRequested { port });
        }
        true
    }

    /// Merge (or force) a stream into a port. Returns true if changed.
    pub(crate) fn merge_into_port(
        &mut self,
        port: PortId,
        stream: StreamId,
        override_flag: bool,
    ) -> bool {
        let old = self.port(port).stream;
        let new = if override_flag {
            stream
        } else {
            self.streams.merge(old, stream)
        };
        self.assign_stream(port, new)
    }

    // ── Parent → child ──

    /// Assign a stream at a port and push it through the subtree.
    pub(crate) fn push_parent_to_child(
        &mut self,
        port: PortId,
        stream: StreamId,
        override_flag: bool,
    ) {
        let changed = self.merge_into_port(port, stream, override_flag);
        self.push_to_children(port, override_flag);
        if changed {
            self.forward_across_edges(port);
            self.sync_owner_from_port(port);
        }
    }

    /// Push a port's current stream into its children: map children share
    /// it, the stream child descends one level. The sub-stream's source is
    /// the composite port itself when that port has the source role.
    fn push_to_children(&mut self, port: PortId, override_flag: bool) {
        let current = self.port(port).stream;
        match self.port(port).children.clone() {
            PortChildren::Leaf => {}
            PortChildren::Map(entries) => {
                for (_, child) in entries {
                    self.push_parent_to_child(child, current, override_flag);
                }
            }
            PortChildren::Stream(child) => {
                let source = if self.is_source(port) { Some(port) } else { None };
                let child_stream = self.port(child).stream;
                // A child already derived from this level can keep its
                // node: a fresh placeholder candidate would lose the
                // merge, and a fixed candidate only wins if the child
                // does not carry that pin yet.
                let reusable = {
                    let node = self.streams.node(child_stream);
                    node.base == Some(current) && (source.is_none() || node.source == source)
                };
                let sub = if reusable {
                    child_stream
                } else {
                    self.streams.create_sub_stream(current, source)
                };
                self.push_parent_to_child(child, sub, override_flag);
            }
        }
    }

    // ── Child → parent ──

    /// Merge an observed stream into a port and propagate it upward.
    /// At the tree root the flow re-enters the downward direction so
    /// siblings and children see the merged result.
    pub(crate) fn push_child_to_parent(&mut self, port: PortId, stream: StreamId) {
        let changed = self.merge_into_port(port, stream, false);
        if changed {
            self.forward_across_edges(port);
        }
        let current = self.port(port).stream;
        match self.port(port).parent {
            Some(parent) => {
                // A stream parent sits one level out: lazily extend the
                // chain if the observed stream is still a root.
                let parent_is_stream =
                    matches!(self.port(parent).children, PortChildren::Stream(_));
                let upward = if parent_is_stream {
                    self.streams.base_stream_of(current)
                } else {
                    current
                };
                self.push_child_to_parent(parent, upward);
            }
            None => {
                self.push_to_children(port, false);
                self.sync_owner_from_port(port);
            }
        }
    }

    // ── Edge forwarding ──

    /// Forward a source port's stream to every connected destination.
    pub(crate) fn forward_across_edges(&mut self, port: PortId) {
        if !self.is_source(port) {
            return;
        }
        let stream = self.port(port).stream;
        for peer in self.port(port).connected.clone() {
            self.push_child_to_parent(peer, stream);
        }
    }

    // ── Owner synchronization ──

    /// Fold a non-source root port's observed stream into its owner's
    /// base. Stream sources keep their fixed base.
    pub(crate) fn sync_owner_from_port(&mut self, port: PortId) {
        let owner = self.port(port).owner;
        if self.owner(owner).is_stream_source {
            return;
        }
        let root = self.tree_root(port);
        if self.is_source(root) {
            return;
        }
        let root_stream = self.port(root).stream;
        self.observe_base(owner, root_stream);
    }

    /// Merge an observed stream into the owner's base; apply on change.
    pub(crate) fn observe_base(&mut self, owner: OwnerId, stream: StreamId) {
        let current = self.owner(owner).base_stream;
        let merged = match current {
            Some(base) => self.streams.merge(base, stream),
            None => stream,
        };
        if current != Some(merged) {
            self.set_base_stream(owner, merged);
        }
    }

    /// Replace the owner's base, re-subscribe its reset listener, push
    /// the base through every port tree, and exchange it with delegate
    /// parents/children so inference crosses delegate boundaries.
    pub(crate) fn set_base_stream(&mut self, owner: OwnerId, stream: StreamId) {
        if let Some(old) = self.owner(owner).base_stream {
            self.streams.unsubscribe(old, ResetListener::Owner(owner));
        }
        self.owner_mut(owner).base_stream = Some(stream);
        self.streams.subscribe(stream, ResetListener::Owner(owner));
        for root in self.owner(owner).ports.clone() {
            self.push_parent_to_child(root, stream, false);
        }
        match self.owner(owner).kind.clone() {
            OwnerKind::Delegate { parent, .. } => {
                if !self.owner(parent).is_stream_source {
                    self.observe_base(parent, stream);
                }
            }
            OwnerKind::Operator { .. } => {
                for delegate in self.delegates_of(owner) {
                    self.observe_base(delegate, stream);
                }
            }
            OwnerKind::BlueprintBoundary => {}
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
