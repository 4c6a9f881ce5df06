// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The pipeline graph manager.
//!
//! [`Graph`] exclusively owns its nodes and their ports, keeps both ends of every
//! link consistent, and enforces the run-state machine from [`crate::state`].
//! It is a plain synchronous data structure: serialising access to it is the job of
//! the single owner (the pipeline actor in `padlink-engine`).

use crate::error::LinkError;
use crate::node::{Node, NodeSpec};
use crate::ports::{PortDirection, PortId, PortSpec};
use crate::media_type::MediaType;
use crate::snapshot::GraphSnapshot;
use crate::state::GraphState;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A data-flow edge from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub from: PortId,
    pub to: PortId,
}

impl Link {
    pub const fn new(from: PortId, to: PortId) -> Self {
        Self { from, to }
    }

    pub fn touches(&self, port: &PortId) -> bool {
        &self.from == port || &self.to == port
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Nodes, links and run state of one pipeline.
#[derive(Debug, Clone)]
pub struct Graph {
    name: Arc<str>,
    nodes: IndexMap<Arc<str>, Node>,
    /// Links in creation order. Peers are mirrored on both ports for O(1) lookups.
    links: Vec<Link>,
    state: GraphState,
}

impl Graph {
    /// Creates an empty, stopped graph.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into(), nodes: IndexMap::new(), links: Vec::new(), state: GraphState::Stopped }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn state(&self) -> &GraphState {
        &self.state
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Name of the graph owning `node`, resolved through the node's back-reference.
    pub fn owner_of(&self, node: &str) -> Option<&str> {
        self.node(node).map(Node::graph)
    }

    pub fn port(&self, id: &PortId) -> Option<&crate::ports::Port> {
        self.nodes.get(&*id.node)?.port(&id.port)
    }

    pub fn peer_of(&self, id: &PortId) -> Option<&PortId> {
        self.port(id)?.peer()
    }

    pub fn is_linked(&self, id: &PortId) -> bool {
        self.peer_of(id).is_some()
    }

    /// Registers a node and its declared ports.
    ///
    /// # Errors
    ///
    /// - [`LinkError::DuplicateNode`] if the name is taken
    /// - [`LinkError::DuplicatePort`] if the spec declares the same port twice
    pub fn add_node(&mut self, spec: NodeSpec) -> Result<(), LinkError> {
        if self.nodes.contains_key(spec.name.as_str()) {
            return Err(LinkError::DuplicateNode(spec.name));
        }
        let node = Node::from_spec(spec, self.name.clone())?;
        tracing::debug!(graph = %self.name, node = %node.name(), kind = %node.kind(), "Node added");
        self.nodes.insert(node.name_arc(), node);
        Ok(())
    }

    /// Removes a node, dropping every link that touches one of its ports.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::UnknownNode`] if the node is not registered.
    pub fn remove_node(&mut self, name: &str) -> Result<Node, LinkError> {
        let port_ids: Vec<PortId> = self
            .nodes
            .get(name)
            .ok_or_else(|| LinkError::UnknownNode(name.to_string()))?
            .ports()
            .map(|p| PortId::new(name, p.name()))
            .collect();
        for id in &port_ids {
            self.unlink(id);
        }
        let node =
            self.nodes.shift_remove(name).ok_or_else(|| LinkError::UnknownNode(name.to_string()))?;
        tracing::debug!(graph = %self.name, node = %name, "Node removed");
        Ok(node)
    }

    /// Registers a port that appeared at runtime on an existing node.
    ///
    /// # Errors
    ///
    /// - [`LinkError::UnknownNode`] if the node is not registered
    /// - [`LinkError::DuplicatePort`] if the node already has a port with that name
    pub fn add_port(&mut self, node: &str, spec: PortSpec) -> Result<PortId, LinkError> {
        let owner =
            self.nodes.get_mut(node).ok_or_else(|| LinkError::UnknownNode(node.to_string()))?;
        let id = owner.add_port(spec)?;
        tracing::debug!(graph = %self.name, port = %id, "Port added");
        Ok(id)
    }

    /// Records the media type decided for a port.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::UnknownPort`] if the port is not registered.
    pub fn set_media_type(&mut self, id: &PortId, media_type: MediaType) -> Result<(), LinkError> {
        let port = self
            .nodes
            .get_mut(&*id.node)
            .and_then(|n| n.port_mut(&id.port))
            .ok_or_else(|| LinkError::UnknownPort(id.clone()))?;
        port.set_media_type(media_type);
        Ok(())
    }

    /// Marks a static port as fed at runtime, exempting it from the "linked before
    /// play" check. Used for the target of a dynamic binder.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::UnknownPort`] if the port is not registered.
    pub fn defer_link(&mut self, id: &PortId) -> Result<(), LinkError> {
        let port = self
            .nodes
            .get_mut(&*id.node)
            .and_then(|n| n.port_mut(&id.port))
            .ok_or_else(|| LinkError::UnknownPort(id.clone()))?;
        port.deferred = true;
        Ok(())
    }

    fn require_port(&self, id: &PortId, direction: PortDirection) -> Result<(), LinkError> {
        match self.port(id) {
            Some(port) if port.direction() == direction => Ok(()),
            _ => Err(LinkError::UnknownPort(id.clone())),
        }
    }

    /// Links an output port to an input port.
    ///
    /// # Errors
    ///
    /// - [`LinkError::UnknownPort`] if `from` is not a registered output or `to` is
    ///   not a registered input
    /// - [`LinkError::PortAlreadyLinked`] if either side already has a peer
    pub fn link(&mut self, from: &PortId, to: &PortId) -> Result<(), LinkError> {
        self.require_port(from, PortDirection::Output)?;
        self.require_port(to, PortDirection::Input)?;

        if let Some(peer) = self.peer_of(to) {
            return Err(LinkError::PortAlreadyLinked { port: to.clone(), peer: peer.clone() });
        }
        if let Some(peer) = self.peer_of(from) {
            return Err(LinkError::PortAlreadyLinked { port: from.clone(), peer: peer.clone() });
        }

        self.set_peer(from, Some(to.clone()));
        self.set_peer(to, Some(from.clone()));
        self.links.push(Link::new(from.clone(), to.clone()));
        tracing::debug!(graph = %self.name, from = %from, to = %to, "Ports linked");
        Ok(())
    }

    /// Links the first unlinked output of `src` to the first unlinked input of `dst`.
    ///
    /// # Errors
    ///
    /// - [`LinkError::UnknownNode`] if either node is missing
    /// - [`LinkError::UnknownPort`] if no free port exists on one side
    pub fn link_nodes(&mut self, src: &str, dst: &str) -> Result<Link, LinkError> {
        let src_node = self.node(src).ok_or_else(|| LinkError::UnknownNode(src.to_string()))?;
        let dst_node = self.node(dst).ok_or_else(|| LinkError::UnknownNode(dst.to_string()))?;

        let from = src_node
            .outputs()
            .find(|p| !p.is_linked())
            .map(|p| src_node.port_id(p.name()))
            .ok_or_else(|| LinkError::UnknownPort(PortId::new(src, "<free output>")))?;
        let to = dst_node
            .inputs()
            .find(|p| !p.is_linked())
            .map(|p| dst_node.port_id(p.name()))
            .ok_or_else(|| LinkError::UnknownPort(PortId::new(dst, "<free input>")))?;

        self.link(&from, &to)?;
        Ok(Link::new(from, to))
    }

    /// Removes the link touching `port`, if any. Unlinked or unknown ports are a no-op.
    pub fn unlink(&mut self, port: &PortId) -> Option<Link> {
        let index = self.links.iter().position(|l| l.touches(port))?;
        let link = self.links.remove(index);
        self.set_peer(&link.from, None);
        self.set_peer(&link.to, None);
        tracing::debug!(graph = %self.name, link = %link, "Ports unlinked");
        Some(link)
    }

    fn set_peer(&mut self, id: &PortId, peer: Option<PortId>) {
        if let Some(port) = self.nodes.get_mut(&*id.node).and_then(|n| n.port_mut(&id.port)) {
            port.peer = peer;
        }
    }

    /// Static ports that still lack a peer, in node and port order.
    pub fn unlinked_static_ports(&self) -> Vec<PortId> {
        self.nodes
            .values()
            .flat_map(|node| {
                node.ports().filter(|p| p.blocks_playing()).map(|p| node.port_id(p.name()))
            })
            .collect()
    }

    /// Moves the graph to `target`, returning the previous state.
    ///
    /// Entering `Stopped` from any other state tears the graph down: every link and
    /// node is released.
    ///
    /// # Errors
    ///
    /// - [`LinkError::InvalidTransition`] if the state machine forbids the move
    /// - [`LinkError::MissingStaticLinks`] when starting with unlinked static ports
    pub fn set_state(&mut self, target: GraphState) -> Result<GraphState, LinkError> {
        if self.state.same_kind(&target) {
            return Ok(self.state.clone());
        }
        if !self.state.can_transition_to(&target) {
            return Err(LinkError::InvalidTransition { from: self.state.name(), to: target.name() });
        }
        if target == GraphState::Playing {
            let missing = self.unlinked_static_ports();
            if !missing.is_empty() {
                return Err(LinkError::MissingStaticLinks(missing));
            }
        }
        if target == GraphState::Stopped {
            tracing::debug!(
                graph = %self.name,
                nodes = self.nodes.len(),
                links = self.links.len(),
                "Tearing down graph"
            );
            self.links.clear();
            self.nodes.clear();
        }

        tracing::info!(graph = %self.name, from = %self.state, to = %target, "Graph state changed");
        Ok(std::mem::replace(&mut self.state, target))
    }

    /// Immutable point-in-time copy of the topology for diagnostics.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::capture(self)
    }
}
