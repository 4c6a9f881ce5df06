// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Late linking of output ports that appear while the graph is running.
//!
//! A [`DynamicPortBinder`] watches one source node and feeds one waiting input port.
//! Each time the source announces an output, the binder decides whether that port is
//! the one the target wants and links it. The binder owns nothing in the graph: it
//! holds port addresses and borrows the graph for the duration of one evaluation.

use crate::diagnostics::SnapshotSink;
use padlink_core::{CategoryFilter, Graph, Link, LinkError, PortId};
use std::sync::Arc;

/// Result of a discovery that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindOutcome {
    /// The discovered port is now linked to the target.
    Linked(Link),
    /// The target already had a peer; the discovered port was left alone.
    TargetAlreadyLinked,
}

/// Links the first compatible output announced by `source` to `target`.
#[derive(Debug, Clone)]
pub struct DynamicPortBinder {
    source: Arc<str>,
    target: PortId,
    accepts: CategoryFilter,
    snapshot_label: Option<String>,
}

impl DynamicPortBinder {
    pub fn new(source: impl Into<Arc<str>>, target: PortId, accepts: impl Into<CategoryFilter>) -> Self {
        Self { source: source.into(), target, accepts: accepts.into(), snapshot_label: None }
    }

    /// Requests a timestamped snapshot named `label` after each successful link.
    #[must_use]
    pub fn with_snapshot_label(mut self, label: impl Into<String>) -> Self {
        self.snapshot_label = Some(label.into());
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub const fn target(&self) -> &PortId {
        &self.target
    }

    pub const fn accepts(&self) -> &CategoryFilter {
        &self.accepts
    }

    /// True when `port` belongs to the node this binder watches.
    pub fn watches(&self, port: &PortId) -> bool {
        port.node == self.source
    }

    /// Evaluates one newly discovered output port.
    ///
    /// Checks run in a fixed order: target already linked, media type known, category
    /// matches, link. Only the last step mutates the graph.
    ///
    /// # Errors
    ///
    /// - [`LinkError::TypeNotReady`] if the port's media type is undecided
    /// - [`LinkError::IncompatibleType`] if the category does not match
    /// - [`LinkError::LinkFailed`] if the graph refused the link
    pub fn on_port_discovered(
        &self,
        graph: &mut Graph,
        port: &PortId,
        sink: &dyn SnapshotSink,
    ) -> Result<BindOutcome, LinkError> {
        tracing::info!(port = %port.port, node = %port.node, "Received new port '{}' from '{}'", port.port, port.node);

        if let Some(peer) = graph.peer_of(&self.target) {
            tracing::info!(target = %self.target, peer = %peer, "We are already linked, ignoring");
            return Ok(BindOutcome::TargetAlreadyLinked);
        }

        let Some(media_type) = graph.port(port).and_then(|p| p.media_type()).cloned() else {
            tracing::debug!(port = %port, "Media type not decided yet");
            return Err(LinkError::TypeNotReady(port.clone()));
        };

        if !self.accepts.matches(&media_type) {
            tracing::info!(
                port = %port,
                media_type = %media_type,
                accepts = %self.accepts,
                "It has type '{}' which is not '{}', ignoring",
                media_type.category(),
                self.accepts
            );
            return Err(LinkError::IncompatibleType {
                port: port.clone(),
                actual: media_type.to_string(),
                expected: self.accepts.to_string(),
            });
        }

        if let Err(e) = graph.link(port, &self.target) {
            tracing::warn!(port = %port, target = %self.target, error = %e, "Type is '{}' but link failed", media_type.category());
            return Err(LinkError::LinkFailed {
                from: port.clone(),
                to: self.target.clone(),
                source: Box::new(e),
            });
        }

        tracing::info!(port = %port, target = %self.target, "Link succeeded (type '{}')", media_type.category());
        if let Some(label) = &self.snapshot_label {
            sink.snapshot(&graph.snapshot(), label, true);
        }
        Ok(BindOutcome::Linked(Link::new(port.clone(), self.target.clone())))
    }
}
