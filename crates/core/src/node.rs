// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Nodes: named processing units with ordered ports.

use crate::error::LinkError;
use crate::ports::{Port, PortDirection, PortId, PortSpec};
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Declarative description of a node, used to add it to a graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NodeSpec {
    /// Unique name within the graph.
    pub name: String,
    /// Factory name of the node implementation (e.g. "videoconvert").
    pub kind: String,
    /// Free-form properties handed to the media engine (e.g. `uri`).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub properties: IndexMap<String, String>,
    /// Ports known at construction time, in order.
    #[serde(default)]
    pub ports: Vec<PortSpec>,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self { name: name.into(), kind: kind.into(), properties: IndexMap::new(), ports: Vec::new() }
    }

    #[must_use]
    pub fn with_port(mut self, port: PortSpec) -> Self {
        self.ports.push(port);
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// A node owned by a [`crate::graph::Graph`].
#[derive(Debug, Clone)]
pub struct Node {
    name: Arc<str>,
    kind: String,
    properties: IndexMap<String, String>,
    /// Name of the owning graph. Non-owning: the graph owns the node, never the reverse.
    graph: Arc<str>,
    ports: IndexMap<Arc<str>, Port>,
}

impl Node {
    pub(crate) fn from_spec(spec: NodeSpec, graph: Arc<str>) -> Result<Self, LinkError> {
        let mut node = Self {
            name: Arc::from(spec.name),
            kind: spec.kind,
            properties: spec.properties,
            graph,
            ports: IndexMap::new(),
        };
        for port in spec.ports {
            node.add_port(port)?;
        }
        Ok(node)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub const fn properties(&self) -> &IndexMap<String, String> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Name of the graph this node belongs to.
    pub fn graph(&self) -> &str {
        &self.graph
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.get(name)
    }

    pub(crate) fn port_mut(&mut self, name: &str) -> Option<&mut Port> {
        self.ports.get_mut(name)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &Port> {
        self.ports().filter(|p| p.direction() == PortDirection::Input)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &Port> {
        self.ports().filter(|p| p.direction() == PortDirection::Output)
    }

    pub fn port_id(&self, port: &str) -> PortId {
        PortId::new(self.name.clone(), port)
    }

    pub(crate) fn add_port(&mut self, spec: PortSpec) -> Result<PortId, LinkError> {
        let id = self.port_id(&spec.name);
        if self.ports.contains_key(spec.name.as_str()) {
            return Err(LinkError::DuplicatePort(id));
        }
        self.ports.insert(id.port.clone(), Port::from_spec(spec));
        Ok(id)
    }
}
