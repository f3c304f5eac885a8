// event.rs — Engine events
//
// Notifications the presentation layer consumes: connection changes,
// reset-protocol progress, and refresh requests. The bus is an explicit
// queue owned by the graph — consumers drain it after a mutation
// completes, so no subscriber code runs inside a propagation or reset
// cycle.

use std::fmt;

use crate::owner::OwnerId;
use crate::port::PortId;
use crate::stream::StreamId;

// ── Events ──────────────────────────────────────────────────────────────────

/// A dependent participating in a reset cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetListener {
    Port(PortId),
    Owner(OwnerId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A leaf edge was registered; emitted once per side.
    Connected { port: PortId, peer: PortId },
    /// A leaf edge was removed; emitted once per side.
    Disconnected { port: PortId, peer: PortId },
    /// Phase 2 sweep 1: the dependent rebuilt a fresh placeholder stream.
    ResetMarked { listener: ResetListener, root: StreamId },
    /// Phase 2 sweep 2: the dependent re-propagated its stream assignment.
    Repropagated { listener: ResetListener, root: StreamId },
    /// A port's stream assignment changed and its visuals should redraw.
    RefreshRequested { port: PortId },
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEvent::Connected { port, peer } => write!(f, "connected {} <- {}", port, peer),
            EngineEvent::Disconnected { port, peer } => {
                write!(f, "disconnected {} -/- {}", port, peer)
            }
            EngineEvent::ResetMarked { listener, root } => {
                write!(f, "reset-marked {:?} (root {:?})", listener, root)
            }
            EngineEvent::Repropagated { listener, root } => {
                write!(f, "repropagated {:?} (root {:?})", listener, root)
            }
            EngineEvent::RefreshRequested { port } => write!(f, "refresh {}", port),
        }
    }
}

// ── Bus ─────────────────────────────────────────────────────────────────────

/// Queue of pending events, drained by the consumer.
#[derive(Debug, Default)]
pub struct EventBus {
    queue: Vec<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        EventBus::default()
    }

    pub fn publish(&mut self, event: EngineEvent) {
        self.queue.push(event);
    }

    /// Take all pending events, oldest first.
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.queue)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
