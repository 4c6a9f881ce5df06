// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Port system for graph validation and linking.
//!
//! ## Key concepts:
//! - [`PortId`]: Address of a port inside a graph (`node.port`)
//! - [`PortDirection`]: Whether data flows into or out of the node
//! - [`PortPresence`]: Whether the port exists up front or appears at runtime
//! - [`PortSpec`]: Declarative description used when adding nodes or discovering ports
//! - [`Port`]: A registered port, including its current peer

use crate::media_type::MediaType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Unique identifier for a port inside a graph: owning node name plus port name.
///
/// Stored as `Arc<str>` so ids can be cloned into links, binders and messages cheaply.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId {
    pub node: Arc<str>,
    pub port: Arc<str>,
}

impl PortId {
    pub fn new(node: impl Into<Arc<str>>, port: impl Into<Arc<str>>) -> Self {
        Self { node: node.into(), port: port.into() }
    }

    /// Parses `node.port`. The split happens at the first `.` so port names may
    /// contain dots while node names may not.
    pub fn parse(value: &str) -> Option<Self> {
        let (node, port) = value.split_once('.')?;
        if node.is_empty() || port.is_empty() {
            return None;
        }
        Some(Self::new(node, port))
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

/// When a port exists during the node's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum PortPresence {
    /// Present from construction. Must be linked before the graph can play.
    #[default]
    Always,

    /// Created by the node at runtime, typically once it has inspected its input.
    /// Exempt from the "linked before play" requirement.
    Sometimes,
}

/// Describes a port when adding a node or when a node announces a new port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PortSpec {
    pub name: String,
    pub direction: PortDirection,
    #[serde(default)]
    pub presence: PortPresence,
    /// Media type, if already decided. Dynamic ports usually start without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
}

impl PortSpec {
    pub fn input(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            presence: PortPresence::Always,
            media_type: None,
        }
    }

    pub fn output(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            presence: PortPresence::Always,
            media_type: None,
        }
    }

    #[must_use]
    pub const fn sometimes(mut self) -> Self {
        self.presence = PortPresence::Sometimes;
        self
    }

    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<MediaType>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }
}

/// A port registered in a graph.
///
/// The peer is only ever changed by [`crate::graph::Graph`], which keeps both ends of
/// a link consistent.
#[derive(Debug, Clone)]
pub struct Port {
    name: Arc<str>,
    direction: PortDirection,
    presence: PortPresence,
    media_type: Option<MediaType>,
    pub(crate) peer: Option<PortId>,
    /// Set when a dynamic binder will feed this port after the graph starts.
    pub(crate) deferred: bool,
}

impl Port {
    pub(crate) fn from_spec(spec: PortSpec) -> Self {
        Self {
            name: Arc::from(spec.name),
            direction: spec.direction,
            presence: spec.presence,
            media_type: spec.media_type,
            peer: None,
            deferred: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn direction(&self) -> PortDirection {
        self.direction
    }

    pub const fn presence(&self) -> PortPresence {
        self.presence
    }

    /// Current media type, `None` while undecided.
    pub const fn media_type(&self) -> Option<&MediaType> {
        self.media_type.as_ref()
    }

    pub(crate) fn set_media_type(&mut self, media_type: MediaType) {
        self.media_type = Some(media_type);
    }

    pub const fn peer(&self) -> Option<&PortId> {
        self.peer.as_ref()
    }

    pub const fn is_linked(&self) -> bool {
        self.peer.is_some()
    }

    /// True when the port's link is expected to be made at runtime.
    pub const fn is_deferred(&self) -> bool {
        self.deferred
    }

    /// A static port that still needs a peer before the graph may play.
    pub const fn blocks_playing(&self) -> bool {
        matches!(self.presence, PortPresence::Always) && !self.deferred && self.peer.is_none()
    }
}
