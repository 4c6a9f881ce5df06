// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Turns the `[pipeline]` config section into graph requests.
//!
//! Parsing happens up front in [`plan`], so a malformed address fails before any
//! node is created. [`TopologyPlan::apply`] then replays the plan against a running
//! pipeline actor.

use crate::config::{LinkConfig, PipelineSection};
use padlink_core::{LinkError, NodeSpec, PortId};
use padlink_engine::{DynamicPortBinder, PipelineHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid port address '{0}', expected 'node.port'")]
    InvalidPort(String),

    #[error("Link '{from}' -> '{to}' mixes a node name with a port address")]
    MixedLink { from: String, to: String },

    #[error("Binding target '{0}' has no media type filter")]
    EmptyFilter(String),

    #[error(transparent)]
    Link(#[from] LinkError),
}

/// A validated static link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaticLink {
    /// First free output of one node to first free input of another.
    Nodes { src: String, dst: String },
    Ports { from: PortId, to: PortId },
}

impl StaticLink {
    fn parse(link: &LinkConfig) -> Result<Self, ConfigError> {
        match (link.from.contains('.'), link.to.contains('.')) {
            (false, false) => Ok(Self::Nodes { src: link.from.clone(), dst: link.to.clone() }),
            (true, true) => Ok(Self::Ports { from: parse_port(&link.from)?, to: parse_port(&link.to)? }),
            _ => Err(ConfigError::MixedLink { from: link.from.clone(), to: link.to.clone() }),
        }
    }
}

fn parse_port(address: &str) -> Result<PortId, ConfigError> {
    PortId::parse(address).ok_or_else(|| ConfigError::InvalidPort(address.to_string()))
}

#[derive(Debug, Clone)]
pub struct TopologyPlan {
    pub nodes: Vec<NodeSpec>,
    pub links: Vec<StaticLink>,
    pub binders: Vec<DynamicPortBinder>,
}

/// Validates the topology section.
///
/// # Errors
///
/// Returns a [`ConfigError`] for malformed port addresses, links mixing node names
/// with port addresses, or bindings without a filter.
pub fn plan(section: &PipelineSection) -> Result<TopologyPlan, ConfigError> {
    let links = section.links.iter().map(StaticLink::parse).collect::<Result<Vec<_>, _>>()?;

    let binders = section
        .bindings
        .iter()
        .map(|binding| {
            if binding.accepts.trim().is_empty() {
                return Err(ConfigError::EmptyFilter(binding.target.clone()));
            }
            let target = parse_port(&binding.target)?;
            let binder = DynamicPortBinder::new(binding.source.as_str(), target, binding.accepts.as_str());
            Ok(match &binding.snapshot_label {
                Some(label) => binder.with_snapshot_label(label.as_str()),
                None => binder,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TopologyPlan { nodes: section.nodes.clone(), links, binders })
}

impl TopologyPlan {
    /// Creates nodes, static links and binders, in that order.
    ///
    /// # Errors
    ///
    /// Returns the first [`LinkError`] the actor reports.
    pub async fn apply(self, handle: &PipelineHandle) -> Result<(), ConfigError> {
        for node in self.nodes {
            handle.add_node(node).await?;
        }
        for link in self.links {
            match link {
                StaticLink::Nodes { src, dst } => {
                    let link = handle.link_nodes(src, dst).await?;
                    tracing::debug!(link = %link, "Static link created");
                },
                StaticLink::Ports { from, to } => handle.link(from, to).await?,
            }
        }
        for binder in self.binders {
            handle.add_binder(binder).await?;
        }
        Ok(())
    }
}
