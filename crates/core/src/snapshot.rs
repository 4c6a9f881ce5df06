// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Immutable graph snapshots and their Graphviz DOT rendering.
//!
//! A [`GraphSnapshot`] is a plain copy of the topology at one instant. It can be
//! shared freely with readers (see the engine's snapshot watch channel) and handed
//! to a diagnostics sink without holding on to the live [`Graph`].

use crate::graph::{Graph, Link};
use crate::media_type::MediaType;
use crate::ports::{PortDirection, PortId, PortPresence};
use crate::state::GraphState;
use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSnapshot {
    pub name: String,
    pub direction: PortDirection,
    pub presence: PortPresence,
    pub media_type: Option<MediaType>,
    pub peer: Option<PortId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub name: String,
    pub kind: String,
    pub properties: IndexMap<String, String>,
    pub ports: Vec<PortSnapshot>,
}

/// Point-in-time copy of a graph's nodes, ports, links and state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub graph: String,
    pub state: GraphState,
    pub nodes: Vec<NodeSnapshot>,
    pub links: Vec<Link>,
}

/// How much detail a DOT rendering includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum DotDetails {
    /// Node names, kinds and ports only.
    Minimal,
    /// Adds negotiated media types on ports and links.
    MediaTypes,
    /// Adds node properties and the graph state.
    #[default]
    All,
}

impl DotDetails {
    const fn media_types(self) -> bool {
        matches!(self, Self::MediaTypes | Self::All)
    }

    const fn all(self) -> bool {
        matches!(self, Self::All)
    }
}

impl GraphSnapshot {
    pub(crate) fn capture(graph: &Graph) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| NodeSnapshot {
                name: node.name().to_string(),
                kind: node.kind().to_string(),
                properties: node.properties().clone(),
                ports: node
                    .ports()
                    .map(|port| PortSnapshot {
                        name: port.name().to_string(),
                        direction: port.direction(),
                        presence: port.presence(),
                        media_type: port.media_type().cloned(),
                        peer: port.peer().cloned(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            graph: graph.name().to_string(),
            state: graph.state().clone(),
            nodes,
            links: graph.links().to_vec(),
        }
    }

    /// Snapshot of a graph that has no nodes yet.
    pub fn empty(graph: impl Into<String>) -> Self {
        Self { graph: graph.into(), state: GraphState::Stopped, nodes: Vec::new(), links: Vec::new() }
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn node(&self, name: &str) -> Option<&NodeSnapshot> {
        self.nodes.iter().find(|n| n.name == name)
    }

    fn media_type_of(&self, id: &PortId) -> Option<&MediaType> {
        self.node(&id.node)?.ports.iter().find(|p| *p.name == *id.port)?.media_type.as_ref()
    }

    /// Renders the snapshot as a Graphviz digraph.
    ///
    /// Each node becomes a cluster, each port a box inside it (inputs blue, outputs
    /// red, dashed when the port appeared at runtime), and each link an edge.
    pub fn to_dot(&self, details: DotDetails) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = self.write_dot(&mut out, details);
        out
    }

    fn write_dot(&self, out: &mut String, details: DotDetails) -> std::fmt::Result {
        writeln!(out, "digraph pipeline {{")?;
        writeln!(out, "  rankdir=LR;")?;
        writeln!(out, "  fontname=\"sans\";")?;
        writeln!(out, "  fontsize=\"10\";")?;
        writeln!(out, "  labelloc=t;")?;
        writeln!(out, "  nodesep=\".1\";")?;
        writeln!(out, "  ranksep=\".2\";")?;
        let mut label = self.graph.clone();
        if details.all() {
            let _ = write!(label, "\n[{}]", self.state);
        }
        writeln!(out, "  label=\"{}\";", escape(&label))?;
        writeln!(
            out,
            "  node [style=\"filled,rounded\", shape=box, fontsize=\"9\", fontname=\"sans\", margin=\"0.0,0.0\"];"
        )?;
        writeln!(out, "  edge [labelfontsize=\"6\", fontsize=\"9\", fontname=\"monospace\"];")?;
        writeln!(out)?;

        let ids = DotIds::assign(&self.nodes);
        for (node, node_id) in self.nodes.iter().zip(&ids.nodes) {
            writeln!(out, "  subgraph cluster_{node_id} {{")?;
            let mut node_label = format!("{}\n{}", node.kind, node.name);
            if details.all() {
                for (key, value) in &node.properties {
                    let _ = write!(node_label, "\n{key}=\"{value}\"");
                }
            }
            writeln!(out, "    label=\"{}\";", escape(&node_label))?;
            writeln!(out, "    style=\"filled,rounded\";")?;
            writeln!(out, "    color=black;")?;
            writeln!(out, "    fillcolor=\"#aaffaa\";")?;

            if node.ports.is_empty() {
                // Graphviz drops empty clusters; keep the node visible.
                writeln!(out, "    {node_id}_placeholder [label=\"\", style=invis, height=0, width=0];")?;
            }
            for port in &node.ports {
                let fill = match port.direction {
                    PortDirection::Input => "#aaaaff",
                    PortDirection::Output => "#ffaaaa",
                };
                let style = match port.presence {
                    PortPresence::Always => "filled,solid",
                    PortPresence::Sometimes => "filled,dashed",
                };
                let mut port_label = port.name.clone();
                if details.media_types() {
                    if let Some(media_type) = &port.media_type {
                        let _ = write!(port_label, "\n{}", media_type.category());
                    }
                }
                writeln!(
                    out,
                    "    {} [color=black, fillcolor=\"{fill}\", label=\"{}\", height=\"0.2\", style=\"{style}\"];",
                    ids.port(&node.name, &port.name),
                    escape(&port_label)
                )?;
            }
            writeln!(out, "  }}")?;
            writeln!(out)?;
        }

        for link in &self.links {
            let mut attrs = String::new();
            if details.media_types() {
                if let Some(media_type) = self.media_type_of(&link.from) {
                    attrs = format!(" [label=\"{}\"]", escape(media_type.as_str()));
                }
            }
            writeln!(
                out,
                "  {} -> {}{attrs};",
                ids.port(&link.from.node, &link.from.port),
                ids.port(&link.to.node, &link.to.port)
            )?;
        }
        writeln!(out, "}}")
    }
}

/// Graphviz identifier: anything outside `[A-Za-z0-9_]` becomes `_`.
fn ident(name: &str) -> String {
    name.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }).collect()
}

fn port_ident(node: &str, port: &str) -> String {
    format!("{}_{}", ident(node), ident(port))
}

/// Graphviz identifiers for one rendering. Distinct names that sanitise to the same
/// identifier, such as `my-src` and `my_src`, get a numeric suffix in snapshot order.
struct DotIds {
    /// Index-aligned with the snapshot's nodes; clusters are `cluster_<id>`.
    nodes: Vec<String>,
    ports: HashMap<(String, String), String>,
}

impl DotIds {
    fn assign(nodes: &[NodeSnapshot]) -> Self {
        let mut taken = HashSet::new();
        let node_ids: Vec<String> =
            nodes.iter().map(|node| reserve(&mut taken, "cluster_", &ident(&node.name))).collect();

        for (node, node_id) in nodes.iter().zip(&node_ids) {
            if node.ports.is_empty() {
                taken.insert(format!("{node_id}_placeholder"));
            }
        }

        let mut ports = HashMap::new();
        for (node, node_id) in nodes.iter().zip(&node_ids) {
            for port in &node.ports {
                let id = reserve(&mut taken, "", &format!("{node_id}_{}", ident(&port.name)));
                ports.insert((node.name.clone(), port.name.clone()), id);
            }
        }
        Self { nodes: node_ids, ports }
    }

    fn port(&self, node: &str, port: &str) -> String {
        self.ports
            .get(&(node.to_string(), port.to_string()))
            .cloned()
            .unwrap_or_else(|| port_ident(node, port))
    }
}

/// Claims `prefix + base`, or the first free `prefix + base_N`. Returns the id without
/// the prefix.
fn reserve(taken: &mut HashSet<String>, prefix: &str, base: &str) -> String {
    let mut id = base.to_string();
    let mut suffix = 1;
    while !taken.insert(format!("{prefix}{id}")) {
        id = format!("{base}_{suffix}");
        suffix += 1;
    }
    id
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}
