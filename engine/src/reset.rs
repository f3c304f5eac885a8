// reset.rs — Two-phase reset protocol
//
// Stream values are shared across the graph, so changing a root's
// concrete origin (a disconnect) must invalidate every derived stream.
// The protocol is a per-root state machine, `Stable → Marking →
// Resetting → Stable`, driven by `begin_reset` / `finish_reset`:
//
//   Phase 1 (`begin_reset`): walk the root's derived closure and flag
//   every listening owner (`marked_for_reset`) — no other mutation.
//   Phase 2 (`finish_reset`): three strictly ordered sweeps over the
//   collected dependents — mark (rebuild fresh placeholders, clear
//   flags), repropagate (owners re-seed trees, destination leaves
//   re-pull surviving edges), refresh (one request per dependent port).
//
// `refresh_active` is held false for phases 1–2 so refresh side effects
// triggered mid-reset are suppressed; only the final sweep emits.
//
// Preconditions: `root` is the outermost node of an affected chain.
// Postconditions: every dependent observed exactly one mark, one
//   repropagate, then one refresh; all reset flags cleared.
// Failure modes: re-entrant reset on the same root panics.
// Side effects: rebuilds stream assignments; emits protocol events.

use crate::event::{EngineEvent, ResetListener};
use crate::graph::BlueprintGraph;
use crate::owner::OwnerId;
use crate::port::Direction;
use crate::stream::{ResetState, StreamId};

impl BlueprintGraph {
    /// Phase 1: mark every dependent of `root` as unreachable.
    pub(crate) fn begin_reset(&mut self, root: StreamId) {
        if self.streams.node(root).reset_state != ResetState::Stable {
            panic!("re-entrant reset on {}", root);
        }
        self.refresh_active = false;
        let closure = self.stream_closure(root);
        for stream in &closure {
            self.streams.node_mut(*stream).reset_state = ResetState::Marking;
        }
        for listener in self.listeners_of(&closure) {
            if let ResetListener::Owner(owner) = listener {
                self.owner_mut(owner).marked_for_reset = true;
            }
        }
    }

    /// Phase 2: rebuild, repropagate, refresh — strictly in that order.
    pub(crate) fn finish_reset(&mut self, root: StreamId) {
        if self.streams.node(root).reset_state != ResetState::Marking {
            panic!("finish_reset without begin_reset on {}", root);
        }
        let closure = self.stream_closure(root);
        let listeners = self.listeners_of(&closure);
        for stream in &closure {
            self.streams.node_mut(*stream).reset_state = ResetState::Resetting;
        }

        // Sweep 1 — mark: every dependent rebuilds a fresh placeholder
        // and clears its reset flag.
        for listener in &listeners {
            match *listener {
                ResetListener::Owner(owner) => {
                    self.rebuild_owner_base(owner);
                    self.owner_mut(owner).marked_for_reset = false;
                }
                ResetListener::Port(port) => {
                    let fresh = self.streams.create_placeholder_root();
                    self.assign_stream(port, fresh);
                }
            }
            self.events.publish(EngineEvent::ResetMarked {
                listener: *listener,
                root,
            });
        }

        // Sweep 2 — repropagate: owners first, so their override push
        // cannot clobber a destination's re-pulled stream afterwards.
        for listener in &listeners {
            if let ResetListener::Owner(owner) = *listener {
                let base = self
                    .owner(owner)
                    .base_stream
                    .expect("owner base present after rebuild");
                for port in self.owner(owner).ports.clone() {
                    self.push_parent_to_child(port, base, true);
                }
                self.events.publish(EngineEvent::Repropagated {
                    listener: *listener,
                    root,
                });
            }
        }
        for listener in &listeners {
            if let ResetListener::Port(port) = *listener {
                if self.is_destination(port) {
                    for peer in self.port(port).connected.clone() {
                        let peer_stream = self.port(peer).stream;
                        self.push_child_to_parent(port, peer_stream);
                    }
                }
                self.events.publish(EngineEvent::Repropagated {
                    listener: *listener,
                    root,
                });
            }
        }

        // The old chain is garbage now; settle its state machine.
        for stream in &closure {
            self.streams.node_mut(*stream).reset_state = ResetState::Stable;
        }

        // Sweep 3 — refresh: the only broadcast that takes effect.
        self.refresh_active = true;
        for listener in &listeners {
            if let ResetListener::Port(port) = *listener {
                self.events.publish(EngineEvent::RefreshRequested { port });
            }
        }
    }

    /// The derived closure of `root`: the root, its sub-streams, their
    /// sub-streams, and so on, in breadth-first order.
    pub(crate) fn stream_closure(&self, root: StreamId) -> Vec<StreamId> {
        let mut closure = vec![root];
        let mut index = 0;
        while index < closure.len() {
            let current = closure[index];
            index += 1;
            for derived in &self.streams.node(current).derived {
                if !closure.contains(derived) {
                    closure.push(*derived);
                }
            }
        }
        closure
    }

    /// Listeners of every node in the closure, deduplicated, in closure
    /// order then subscription order — the protocol's broadcast order.
    pub(crate) fn listeners_of(&self, closure: &[StreamId]) -> Vec<ResetListener> {
        let mut listeners = Vec::new();
        for stream in closure {
            for listener in &self.streams.node(*stream).listeners {
                if !listeners.contains(listener) {
                    listeners.push(*listener);
                }
            }
        }
        listeners
    }

    /// Fresh base after a reset: stream sources re-pin to their first out
    /// port, everything else returns to a placeholder root.
    fn rebuild_owner_base(&mut self, owner: OwnerId) {
        let base = if self.owner(owner).is_stream_source {
            let first_out = self
                .owner(owner)
                .ports
                .iter()
                .copied()
                .find(|p| self.port(*p).direction == Direction::Out)
                .expect("initialized stream source has an out port");
            self.streams.create(None, Some(first_out))
        } else {
            self.streams.create_placeholder_root()
        };
        if let Some(old) = self.owner(owner).base_stream {
            self.streams.unsubscribe(old, ResetListener::Owner(owner));
        }
        self.owner_mut(owner).base_stream = Some(base);
        self.streams.subscribe(base, ResetListener::Owner(owner));
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;

    #[test]
    fn closure_covers_derived_streams() {
        let mut g = BlueprintGraph::new("test");
        let root = g.streams.create_placeholder_root();
        let a = g.streams.create_sub_stream(root, None);
        let b = g.streams.create_sub_stream(root, None);
        let inner = g.streams.create_sub_stream(a, None);
        let closure = g.stream_closure(root);
        assert_eq!(closure, vec![root, a, b, inner]);
    }

    #[test]
    #[should_panic(expected = "re-entrant reset")]
    fn double_begin_panics() {
        let mut g = BlueprintGraph::new("test");
        let root = g.streams.create_placeholder_root();
        g.begin_reset(root);
        g.begin_reset(root);
    }

    #[test]
    fn reset_restores_placeholder_state() {
        let mut g = BlueprintGraph::new("test");
        let op = g.add_operator("op", false);
        let input = g.create_port(op, "in", &ValueType::Number, Direction::In);
        g.initialize_owner(op).unwrap();

        let root = g.streams.root_of(g.port(input).stream);
        g.begin_reset(root);
        assert!(g.owner(op).marked_for_reset);
        g.finish_reset(root);
        assert!(!g.owner(op).marked_for_reset);
        assert!(g.refresh_active);
        let base = g.owner(op).base_stream.unwrap();
        assert!(g.streams.is_placeholder(base));
        assert_eq!(g.port(input).stream, base);
    }
}
