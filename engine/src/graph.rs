// graph.rs — Blueprint graph arena
//
// Owns every port owner, port tree, and stream node, addressed by stable
// indices. Construction (operators, delegates, port trees from value
// types) and connection mechanics live here; stream propagation, the
// reset protocol, and compatibility checks are separate impl modules
// (`propagate`, `reset`, `compat`).
//
// Preconditions: owners are initialized (`initialize_owner`) before their
//   ports participate in connections.
// Postconditions: connection bookkeeping stays symmetric; every port
//   always holds a valid stream id.
// Failure modes: asymmetric connection state panics (engine bug);
//   `GraphError` for construction misuse.
// Side effects: emits events on the owned bus.

use std::fmt;

use crate::compat::ConnectDenial;
use crate::event::{EngineEvent, EventBus, ResetListener};
use crate::owner::{OwnerId, OwnerKind, OwnerNode};
use crate::port::{Direction, PortChildren, PortId, PortNode};
use crate::stream::StreamArena;
use crate::types::ValueType;

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum GraphError {
    /// A stream-source owner was initialized without any out-direction port.
    MissingSourcePort { owner: OwnerId },
    /// Owner was initialized twice.
    AlreadyInitialized { owner: OwnerId },
    /// Disconnect was requested for a pair that holds no edge.
    NotConnected { a: PortId, b: PortId },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::MissingSourcePort { owner } => {
                write!(f, "stream source {} has no out-direction port", owner)
            }
            GraphError::AlreadyInitialized { owner } => {
                write!(f, "owner {} is already initialized", owner)
            }
            GraphError::NotConnected { a, b } => {
                write!(f, "no edge between {} and {}", a, b)
            }
        }
    }
}

impl std::error::Error for GraphError {}

// ── Graph ───────────────────────────────────────────────────────────────────

pub struct BlueprintGraph {
    name: String,
    owners: Vec<OwnerNode>,
    ports: Vec<PortNode>,
    pub(crate) streams: StreamArena,
    pub(crate) events: EventBus,
    /// Held false for the duration of a reset cycle so refresh requests
    /// triggered mid-reset are suppressed.
    pub(crate) refresh_active: bool,
}

impl BlueprintGraph {
    /// Fresh graph with its blueprint-boundary owner pre-created.
    pub fn new(name: impl Into<String>) -> Self {
        let mut graph = BlueprintGraph {
            name: name.into(),
            owners: Vec::new(),
            ports: Vec::new(),
            streams: StreamArena::new(),
            events: EventBus::new(),
            refresh_active: true,
        };
        graph
            .owners
            .push(OwnerNode::new(OwnerKind::BlueprintBoundary, false));
        graph
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The blueprint's own boundary owner.
    pub fn boundary(&self) -> OwnerId {
        OwnerId(0)
    }

    // ── Accessors ──

    pub fn owner(&self, id: OwnerId) -> &OwnerNode {
        &self.owners[id.0 as usize]
    }

    pub(crate) fn owner_mut(&mut self, id: OwnerId) -> &mut OwnerNode {
        &mut self.owners[id.0 as usize]
    }

    pub fn port(&self, id: PortId) -> &PortNode {
        &self.ports[id.0 as usize]
    }

    pub(crate) fn port_mut(&mut self, id: PortId) -> &mut PortNode {
        &mut self.ports[id.0 as usize]
    }

    pub fn owner_count(&self) -> usize {
        self.owners.len()
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub(crate) fn owner_ids(&self) -> impl Iterator<Item = OwnerId> {
        (0..self.owners.len() as u32).map(OwnerId)
    }

    /// Take all pending events, oldest first.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain()
    }

    /// Current stream assignment of a port.
    pub fn stream_of(&self, port: PortId) -> crate::stream::StreamId {
        self.port(port).stream
    }

    /// Nesting depth of a port's stream assignment (root context = 1).
    pub fn stream_depth_of(&self, port: PortId) -> u32 {
        self.streams.depth(self.port(port).stream)
    }

    /// Whether a port's stream chain is still placeholder-rooted.
    pub fn is_fluent_at(&self, port: PortId) -> bool {
        self.streams.is_fluent(self.port(port).stream)
    }

    // ── Owner construction ──

    pub fn add_operator(&mut self, name: impl Into<String>, is_stream_source: bool) -> OwnerId {
        let id = OwnerId(self.owners.len() as u32);
        self.owners.push(OwnerNode::new(
            OwnerKind::Operator { name: name.into() },
            is_stream_source,
        ));
        id
    }

    pub fn add_delegate(&mut self, name: impl Into<String>, parent: OwnerId) -> OwnerId {
        let id = OwnerId(self.owners.len() as u32);
        self.owners.push(OwnerNode::new(
            OwnerKind::Delegate {
                name: name.into(),
                parent,
            },
            false,
        ));
        id
    }

    pub fn find_operator(&self, name: &str) -> Option<OwnerId> {
        self.owner_ids().find(|id| {
            matches!(&self.owner(*id).kind, OwnerKind::Operator { name: n } if n.as_str() == name)
        })
    }

    pub fn find_delegate(&self, parent: OwnerId, name: &str) -> Option<OwnerId> {
        self.owner_ids().find(|id| {
            matches!(&self.owner(*id).kind,
                OwnerKind::Delegate { name: n, parent: p } if n.as_str() == name && *p == parent)
        })
    }

    /// Delegates attached to `parent`, in creation order.
    pub(crate) fn delegates_of(&self, parent: OwnerId) -> Vec<OwnerId> {
        self.owner_ids()
            .filter(|id| {
                matches!(&self.owner(*id).kind, OwnerKind::Delegate { parent: p, .. } if *p == parent)
            })
            .collect()
    }

    // ── Port construction ──

    /// Build a port tree congruent to `ty` under the main service.
    pub fn create_port(
        &mut self,
        owner: OwnerId,
        name: impl Into<String>,
        ty: &ValueType,
        direction: Direction,
    ) -> PortId {
        self.create_service_port(owner, name, ty, direction, None)
    }

    /// Build a port tree congruent to `ty` under a named service.
    pub fn create_service_port(
        &mut self,
        owner: OwnerId,
        name: impl Into<String>,
        ty: &ValueType,
        direction: Direction,
        service: Option<&str>,
    ) -> PortId {
        let root = self.build_port_node(
            owner,
            name.into(),
            ty,
            direction,
            None,
            service.map(str::to_string),
        );
        self.owner_mut(owner).ports.push(root);
        root
    }

    fn build_port_node(
        &mut self,
        owner: OwnerId,
        name: String,
        ty: &ValueType,
        direction: Direction,
        parent: Option<PortId>,
        service: Option<String>,
    ) -> PortId {
        let id = PortId(self.ports.len() as u32);
        // Every port starts on its own placeholder root; initialization
        // and propagation replace it with the owner's context.
        let stream = self.streams.create_placeholder_root();
        self.ports.push(PortNode {
            name,
            ty: ty.clone(),
            direction,
            owner,
            parent,
            children: PortChildren::Leaf,
            connected: Vec::new(),
            service,
            stream,
        });
        self.streams.subscribe(stream, ResetListener::Port(id));

        let children = match ty {
            ValueType::Map(entries) => {
                let mut subs = Vec::with_capacity(entries.len());
                for (entry_name, sub_ty) in entries.clone() {
                    let child = self.build_port_node(
                        owner,
                        entry_name.clone(),
                        &sub_ty,
                        direction,
                        Some(id),
                        None,
                    );
                    subs.push((entry_name, child));
                }
                PortChildren::Map(subs)
            }
            ValueType::Stream(sub_ty) => {
                let sub_ty = (**sub_ty).clone();
                let child = self.build_port_node(
                    owner,
                    "~".to_string(),
                    &sub_ty,
                    direction,
                    Some(id),
                    None,
                );
                PortChildren::Stream(child)
            }
            _ => PortChildren::Leaf,
        };
        self.port_mut(id).children = children;
        id
    }

    /// Root port of the owner's tree matching direction and service.
    pub fn root_port(
        &self,
        owner: OwnerId,
        direction: Direction,
        service: Option<&str>,
    ) -> Option<PortId> {
        self.owner(owner)
            .ports
            .iter()
            .copied()
            .find(|p| {
                let node = self.port(*p);
                node.direction == direction && node.service.as_deref() == service
            })
    }

    /// Walk to the root of a port's tree.
    pub fn tree_root(&self, port: PortId) -> PortId {
        let mut current = port;
        while let Some(parent) = self.port(current).parent {
            current = parent;
        }
        current
    }

    /// All leaf ports of a subtree, in declaration order.
    pub fn leaves_of(&self, port: PortId) -> Vec<PortId> {
        let mut leaves = Vec::new();
        self.collect_leaves(port, &mut leaves);
        leaves
    }

    fn collect_leaves(&self, port: PortId, out: &mut Vec<PortId>) {
        match &self.port(port).children {
            PortChildren::Leaf => out.push(port),
            PortChildren::Map(entries) => {
                for (_, child) in entries.clone() {
                    self.collect_leaves(child, out);
                }
            }
            PortChildren::Stream(child) => self.collect_leaves(*child, out),
        }
    }

    // ── Connection roles ──

    /// Whether a port acts as a data source. Direction semantics are
    /// owner-relative: an operator or delegate emits through `Out` ports,
    /// the blueprint boundary emits inward through its `In` ports.
    pub fn is_source(&self, port: PortId) -> bool {
        let node = self.port(port);
        match self.owner(node.owner).kind {
            OwnerKind::Operator { .. } | OwnerKind::Delegate { .. } => {
                node.direction == Direction::Out
            }
            OwnerKind::BlueprintBoundary => node.direction == Direction::In,
        }
    }

    pub fn is_destination(&self, port: PortId) -> bool {
        !self.is_source(port)
    }

    /// Orient an unordered pair into (source, destination).
    pub fn resolve_roles(&self, a: PortId, b: PortId) -> Option<(PortId, PortId)> {
        if self.is_source(a) && self.is_destination(b) {
            Some((a, b))
        } else if self.is_source(b) && self.is_destination(a) {
            Some((b, a))
        } else {
            None
        }
    }

    // ── Connection bookkeeping ──

    /// True if any port in the subtree holds an edge.
    pub(crate) fn occupied(&self, port: PortId) -> bool {
        if !self.port(port).connected.is_empty() {
            return true;
        }
        match &self.port(port).children {
            PortChildren::Leaf => false,
            PortChildren::Map(entries) => entries.iter().any(|(_, c)| self.occupied(*c)),
            PortChildren::Stream(child) => self.occupied(*child),
        }
    }

    fn subtree_ids(&self, port: PortId, out: &mut Vec<PortId>) {
        out.push(port);
        match &self.port(port).children {
            PortChildren::Leaf => {}
            PortChildren::Map(entries) => {
                for (_, child) in entries.clone() {
                    self.subtree_ids(child, out);
                }
            }
            PortChildren::Stream(child) => self.subtree_ids(*child, out),
        }
    }

    /// True if any edge links the two subtrees. Panics if one side's
    /// bookkeeping disagrees with the other's.
    pub(crate) fn pair_connected(&self, a: PortId, b: PortId) -> bool {
        let mut a_ids = Vec::new();
        self.subtree_ids(a, &mut a_ids);
        let mut b_ids = Vec::new();
        self.subtree_ids(b, &mut b_ids);

        let mut found = false;
        for a_port in &a_ids {
            for peer in &self.port(*a_port).connected {
                if b_ids.contains(peer) {
                    if !self.port(*peer).connected.contains(a_port) {
                        panic!(
                            "asymmetric connection bookkeeping between {} and {}",
                            a_port, peer
                        );
                    }
                    found = true;
                }
            }
        }
        found
    }

    // ── Connect / disconnect ──

    /// Validate and establish a connection between an unordered port pair.
    pub fn connect(&mut self, a: PortId, b: PortId) -> Result<(), ConnectDenial> {
        let (src, dst) = self
            .resolve_roles(a, b)
            .ok_or(ConnectDenial::RolePairing { a, b })?;
        self.check_connect(src, dst)?;
        self.connect_recursive(src, dst);
        Ok(())
    }

    fn connect_recursive(&mut self, src: PortId, dst: PortId) {
        let src_children = self.port(src).children.clone();
        let dst_children = self.port(dst).children.clone();
        match (&src_children, &dst_children) {
            (PortChildren::Map(_), PortChildren::Map(dst_entries)) => {
                for (name, dst_child) in dst_entries {
                    let src_child = self.port(src).map_child(name).unwrap_or_else(|| {
                        panic!("map entry '{}' missing on validated source {}", name, src)
                    });
                    self.connect_recursive(src_child, *dst_child);
                }
            }
            (PortChildren::Stream(src_sub), PortChildren::Stream(dst_sub)) => {
                self.connect_recursive(*src_sub, *dst_sub);
            }
            // Leaf-to-leaf, and the generic/trigger pairings where one
            // side has no congruent substructure: a direct edge.
            _ => self.connect_leaf(src, dst),
        }
    }

    fn connect_leaf(&mut self, src: PortId, dst: PortId) {
        self.port_mut(src).connected.push(dst);
        self.port_mut(dst).connected.push(src);
        self.events.publish(EngineEvent::Connected {
            port: dst,
            peer: src,
        });
        self.events.publish(EngineEvent::Connected {
            port: src,
            peer: dst,
        });
        // Stream inference: the destination adopts the source's context,
        // propagating through its tree and on to its owner.
        let src_stream = self.port(src).stream;
        self.push_child_to_parent(dst, src_stream);
    }

    /// Remove the edges between an unordered port pair, then run the
    /// two-phase reset protocol on the destination side.
    pub fn disconnect(&mut self, a: PortId, b: PortId) -> Result<(), GraphError> {
        let (src, dst) = match self.resolve_roles(a, b) {
            Some(pair) => pair,
            None => return Err(GraphError::NotConnected { a, b }),
        };
        if !self.pair_connected(src, dst) {
            return Err(GraphError::NotConnected { a, b });
        }
        self.disconnect_recursive(src, dst);

        let root = {
            let dst_root = self.tree_root(dst);
            self.streams.root_of(self.port(dst_root).stream)
        };
        self.begin_reset(root);
        self.finish_reset(root);
        Ok(())
    }

    fn disconnect_recursive(&mut self, src: PortId, dst: PortId) {
        let src_children = self.port(src).children.clone();
        let dst_children = self.port(dst).children.clone();
        match (&src_children, &dst_children) {
            (PortChildren::Map(_), PortChildren::Map(dst_entries)) => {
                for (name, dst_child) in dst_entries {
                    if let Some(src_child) = self.port(src).map_child(name) {
                        self.disconnect_recursive(src_child, *dst_child);
                    }
                }
            }
            (PortChildren::Stream(src_sub), PortChildren::Stream(dst_sub)) => {
                self.disconnect_recursive(*src_sub, *dst_sub);
            }
            _ => self.disconnect_leaf(src, dst),
        }
    }

    fn disconnect_leaf(&mut self, src: PortId, dst: PortId) {
        let had_edge = self.port(src).connected.contains(&dst);
        let had_reverse = self.port(dst).connected.contains(&src);
        if had_edge != had_reverse {
            panic!(
                "asymmetric connection bookkeeping between {} and {}",
                src, dst
            );
        }
        if !had_edge {
            return;
        }
        self.port_mut(src).connected.retain(|p| *p != dst);
        self.port_mut(dst).connected.retain(|p| *p != src);
        self.events.publish(EngineEvent::Disconnected {
            port: dst,
            peer: src,
        });
        self.events.publish(EngineEvent::Disconnected {
            port: src,
            peer: dst,
        });
    }

    /// Dotted path of a port inside its tree (map descents by name,
    /// stream descents as `~`), used in displays and reports.
    pub fn port_path(&self, port: PortId) -> String {
        let mut segments = Vec::new();
        let mut current = port;
        loop {
            let node = self.port(current);
            match node.parent {
                Some(parent) => {
                    segments.push(node.name.clone());
                    current = parent;
                }
                None => break,
            }
        }
        segments.reverse();
        let mut path = String::new();
        for segment in segments {
            if segment == "~" {
                path.push('~');
            } else {
                if !path.is_empty() && !path.ends_with('~') {
                    path.push('.');
                }
                path.push_str(&segment);
            }
        }
        path
    }
}

// ── Display ─────────────────────────────────────────────────────────────────

impl fmt::Display for BlueprintGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "blueprint '{}' ({} owners, {} ports, {} streams)",
            self.name,
            self.owners.len(),
            self.ports.len(),
            self.streams.len()
        )?;
        for id in self.owner_ids() {
            let owner = self.owner(id);
            let label = match &owner.kind {
                OwnerKind::Operator { name } => format!("operator '{}'", name),
                OwnerKind::Delegate { name, parent } => {
                    format!("delegate '{}' of {}", name, parent)
                }
                OwnerKind::BlueprintBoundary => "boundary".to_string(),
            };
            let source = if owner.is_stream_source {
                " (stream source)"
            } else {
                ""
            };
            writeln!(f, "  {} {}{}", id, label, source)?;
            for root in &owner.ports {
                let node = self.port(*root);
                let depth = self.streams.depth(node.stream);
                writeln!(
                    f,
                    "    {} {} '{}': {} @ depth {}",
                    root, node.direction, node.name, node.ty, depth
                )?;
            }
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
