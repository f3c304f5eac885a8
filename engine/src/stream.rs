// stream.rs — Stream stacks
//
// A stream node represents one level of implicit iteration nesting. Nodes
// form singly-rooted chains through `base` links ("stream stacks"); a node
// with no originating port is a placeholder whose depth is pinned later by
// unification. The arena owns every node and all chain walks, so cyclic
// back-references never exist — the "cycle detection" of the chain
// invariant is a bounded index walk.
//
// Preconditions: `StreamId`s handed in were allocated by this arena.
// Postconditions: chain walks terminate; `replace_base` never introduces
//   a cycle.
// Failure modes: a corrupted chain (revisited node) panics — graph
//   consistency bug, never user error. `replace_base` returns
//   `CircularStreamError` instead when the requested link would close a
//   cycle.
// Side effects: none beyond arena mutation.

use std::fmt;

use crate::event::ResetListener;
use crate::port::PortId;

// ── Identifiers ─────────────────────────────────────────────────────────────

/// Stable arena index of a stream node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u32);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

// ── Reset state ─────────────────────────────────────────────────────────────

/// Per-root reset state machine: `Stable → Marking → Resetting → Stable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetState {
    Stable,
    Marking,
    Resetting,
}

// ── Node ────────────────────────────────────────────────────────────────────

/// One level of a stream stack.
#[derive(Debug, Clone)]
pub struct StreamNode {
    /// Next-outer level. Absent at the root (depth 1).
    pub base: Option<StreamId>,
    /// Originating port. Absent ⇒ placeholder ("fluent").
    pub source: Option<PortId>,
    /// Sub-streams created with this node as their base.
    pub derived: Vec<StreamId>,
    /// Ports and owners currently holding this node; notified by the
    /// reset protocol.
    pub listeners: Vec<ResetListener>,
    pub reset_state: ResetState,
}

// ── Errors ──────────────────────────────────────────────────────────────────

/// A requested base re-link would make a stream its own ancestor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircularStreamError {
    pub stream: StreamId,
    pub base: StreamId,
}

impl fmt::Display for CircularStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "linking {} under {} would close a stream chain cycle",
            self.stream, self.base
        )
    }
}

impl std::error::Error for CircularStreamError {}

// ── Arena ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct StreamArena {
    nodes: Vec<StreamNode>,
}

impl StreamArena {
    pub fn new() -> Self {
        StreamArena::default()
    }

    pub fn node(&self, id: StreamId) -> &StreamNode {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: StreamId) -> &mut StreamNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a new stream level. A fresh node cannot close a cycle, so
    /// no chain check is needed here.
    pub fn create(&mut self, base: Option<StreamId>, source: Option<PortId>) -> StreamId {
        let id = StreamId(self.nodes.len() as u32);
        self.nodes.push(StreamNode {
            base,
            source,
            derived: Vec::new(),
            listeners: Vec::new(),
            reset_state: ResetState::Stable,
        });
        if let Some(base) = base {
            self.node_mut(base).derived.push(id);
        }
        id
    }

    /// Placeholder root: no base, no source.
    pub fn create_placeholder_root(&mut self) -> StreamId {
        self.create(None, None)
    }

    /// New inner level below `base`.
    pub fn create_sub_stream(&mut self, base: StreamId, source: Option<PortId>) -> StreamId {
        self.create(Some(base), source)
    }

    /// Re-link `stream` under `new_base`, refusing cycles.
    pub fn replace_base(
        &mut self,
        stream: StreamId,
        new_base: StreamId,
    ) -> Result<(), CircularStreamError> {
        if new_base == stream || self.has_ancestor(new_base, stream) {
            return Err(CircularStreamError {
                stream,
                base: new_base,
            });
        }
        if let Some(old) = self.node(stream).base {
            let derived = &mut self.node_mut(old).derived;
            derived.retain(|d| *d != stream);
        }
        self.node_mut(stream).base = Some(new_base);
        self.node_mut(new_base).derived.push(stream);
        Ok(())
    }

    /// Base of `stream`, lazily creating a placeholder root above it.
    pub fn base_stream_of(&mut self, stream: StreamId) -> StreamId {
        if let Some(base) = self.node(stream).base {
            return base;
        }
        let base = self.create(None, None);
        self.node_mut(stream).base = Some(base);
        self.node_mut(base).derived.push(stream);
        base
    }

    /// Walk one step toward the root, guarding against corrupted chains.
    fn step(&self, id: StreamId, steps_taken: usize) -> Option<StreamId> {
        if steps_taken > self.nodes.len() {
            panic!("circular stream chain detected at {}", id);
        }
        self.node(id).base
    }

    /// The chain from `id` to its root, innermost first.
    pub fn chain_of(&self, id: StreamId) -> Vec<StreamId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(base) = self.step(current, chain.len()) {
            chain.push(base);
            current = base;
        }
        chain
    }

    /// Outermost node of the chain containing `id`.
    pub fn root_of(&self, id: StreamId) -> StreamId {
        *self.chain_of(id).last().expect("chain contains id itself")
    }

    /// Nesting depth: root = 1, one more per inner level.
    pub fn depth(&self, id: StreamId) -> u32 {
        self.chain_of(id).len() as u32
    }

    /// True if `ancestor` appears strictly above `id` in its chain.
    pub fn has_ancestor(&self, id: StreamId, ancestor: StreamId) -> bool {
        self.chain_of(id).iter().skip(1).any(|s| *s == ancestor)
    }

    /// Placeholder ⇔ no originating port.
    pub fn is_placeholder(&self, id: StreamId) -> bool {
        self.node(id).source.is_none()
    }

    /// A chain is "fluent" when its root is still a placeholder.
    pub fn is_fluent(&self, id: StreamId) -> bool {
        self.is_placeholder(self.root_of(id))
    }

    /// Tie-break weight: for every fixed node in the chain, add
    /// `2^(distance from id)` — fixed nodes nearer the root weigh more.
    /// Saturates for chains deeper than 64 levels; depth alone decides
    /// long before the weight matters there.
    pub fn fixed_depth(&self, id: StreamId) -> u64 {
        let mut sum: u64 = 0;
        for (distance, node) in self.chain_of(id).into_iter().enumerate() {
            if self.node(node).source.is_some() {
                let weight = if distance >= 64 {
                    u64::MAX
                } else {
                    1u64 << distance
                };
                sum = sum.saturating_add(weight);
            }
        }
        sum
    }

    /// Merge policy: keep the strictly deeper stream; on a depth tie the
    /// greater fixed-depth wins; a full tie keeps `old` (idempotent).
    pub fn merge(&self, old: StreamId, new: StreamId) -> StreamId {
        if old == new {
            return old;
        }
        let (old_depth, new_depth) = (self.depth(old), self.depth(new));
        if new_depth > old_depth {
            return new;
        }
        if new_depth < old_depth {
            return old;
        }
        if self.fixed_depth(new) > self.fixed_depth(old) {
            new
        } else {
            old
        }
    }

    /// True if nodes shared between the two chains appear in a different
    /// relative order — merging such chains would close a loop, so they
    /// cannot describe one iteration context.
    pub fn contains_misplaced(&self, a: StreamId, b: StreamId) -> bool {
        misplaced_order(&self.chain_of(a), &self.chain_of(b))
    }

    // ── Listener bookkeeping ──

    pub fn subscribe(&mut self, id: StreamId, listener: ResetListener) {
        let listeners = &mut self.node_mut(id).listeners;
        if !listeners.contains(&listener) {
            listeners.push(listener);
        }
    }

    pub fn unsubscribe(&mut self, id: StreamId, listener: ResetListener) {
        self.node_mut(id).listeners.retain(|l| *l != listener);
    }
}

/// Order check behind `contains_misplaced`: nodes present in both chains
/// (each listed innermost first) must appear in the same relative order.
///
/// In a well-formed arena two chains sharing a node share its whole outer
/// suffix, so a conflict here means unification drifted toward a latent
/// cycle — the caller treats the pair as incompatible rather than merging.
pub fn misplaced_order(chain_a: &[StreamId], chain_b: &[StreamId]) -> bool {
    let mut last_position: Option<usize> = None;
    for node in chain_b {
        if let Some(position) = chain_a.iter().position(|n| n == node) {
            if let Some(last) = last_position {
                if position <= last {
                    return true;
                }
            }
            last_position = Some(position);
        }
    }
    false
}

// ── Tests ───────────────────────────────────────────────────────────────────
