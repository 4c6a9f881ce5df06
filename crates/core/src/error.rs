// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Structured error types for graph construction and dynamic linking.
//!
//! Errors fall into three groups, and callers are expected to treat them differently:
//!
//! - **Structural** ([`LinkError::DuplicateNode`], [`LinkError::UnknownNode`],
//!   [`LinkError::DuplicatePort`], [`LinkError::UnknownPort`],
//!   [`LinkError::PortAlreadyLinked`], [`LinkError::MissingStaticLinks`],
//!   [`LinkError::InvalidTransition`]): abort the specific setup call and are returned
//!   to the caller synchronously.
//! - **Per-port** ([`LinkError::TypeNotReady`], [`LinkError::IncompatibleType`],
//!   [`LinkError::LinkFailed`]): reported and skipped, they never abort a pipeline.
//! - **Fatal** ([`LinkError::EngineFault`]): moves the graph to the error state and ends
//!   the run loop.

use crate::ports::PortId;
use thiserror::Error;

/// Main error type for graph and linking operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// A node with the same name is already registered in the graph.
    #[error("Node '{0}' already exists in the graph")]
    DuplicateNode(String),

    /// The named node is not part of the graph.
    #[error("Node '{0}' not found")]
    UnknownNode(String),

    /// A port with the same name already exists on the node.
    #[error("Port '{0}' already exists")]
    DuplicatePort(PortId),

    /// The port is not registered, or it is registered with the wrong direction
    /// for the requested operation (linking an input as the upstream side, etc.).
    #[error("Port '{0}' not found")]
    UnknownPort(PortId),

    /// The port already has a peer and must be unlinked first.
    #[error("Port '{port}' is already linked to '{peer}'")]
    PortAlreadyLinked { port: PortId, peer: PortId },

    /// The port exists but its media type has not been decided yet.
    ///
    /// Transient: the caller may retry once the media type is known, or give up.
    #[error("Media type of port '{0}' is not negotiated yet")]
    TypeNotReady(PortId),

    /// The port's media type category does not match what the target accepts.
    ///
    /// Expected during dynamic linking: sources routinely expose ports nobody wants.
    #[error("Port '{port}' has type '{actual}' which does not match '{expected}'")]
    IncompatibleType { port: PortId, actual: String, expected: String },

    /// A compatible link could not be established.
    #[error("Link {from} -> {to} failed: {source}")]
    LinkFailed {
        from: PortId,
        to: PortId,
        #[source]
        source: Box<LinkError>,
    },

    /// Static ports that must be linked before playing are still unlinked.
    #[error("Cannot start playing, static ports not linked: {}", join_ports(.0))]
    MissingStaticLinks(Vec<PortId>),

    /// The requested run-state transition is not allowed from the current state.
    #[error("Invalid state transition {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    /// Unrecoverable failure reported by the media engine.
    #[error("Engine fault: {0}")]
    EngineFault(String),

    /// The pipeline actor is no longer running.
    #[error("Pipeline actor has shut down")]
    ActorStopped,
}

impl LinkError {
    /// Returns true for errors a caller may resolve by retrying later.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::TypeNotReady(_))
    }

    /// Returns true for errors scoped to a single discovered port.
    ///
    /// These are logged and skipped; they never abort the pipeline.
    pub const fn is_per_port(&self) -> bool {
        matches!(self, Self::TypeNotReady(_) | Self::IncompatibleType { .. } | Self::LinkFailed { .. })
    }
}

fn join_ports(ports: &[PortId]) -> String {
    ports.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// Convenience type alias for Results using `LinkError`.
pub type Result<T> = std::result::Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LinkError::DuplicateNode("convert".to_string());
        assert_eq!(err.to_string(), "Node 'convert' already exists in the graph");

        let err = LinkError::PortAlreadyLinked {
            port: PortId::new("convert", "sink"),
            peer: PortId::new("source", "src_0"),
        };
        assert_eq!(err.to_string(), "Port 'convert.sink' is already linked to 'source.src_0'");
    }

    #[test]
    fn test_missing_static_links_lists_ports() {
        let err = LinkError::MissingStaticLinks(vec![
            PortId::new("convert", "src"),
            PortId::new("sink", "sink"),
        ]);
        assert_eq!(
            err.to_string(),
            "Cannot start playing, static ports not linked: convert.src, sink.sink"
        );
    }

    #[test]
    fn test_link_failed_keeps_source() {
        use std::error::Error as _;

        let inner = LinkError::UnknownPort(PortId::new("convert", "sink"));
        let err = LinkError::LinkFailed {
            from: PortId::new("source", "src_0"),
            to: PortId::new("convert", "sink"),
            source: Box::new(inner.clone()),
        };
        assert!(err.to_string().contains("source.src_0 -> convert.sink"));
        assert_eq!(err.source().map(ToString::to_string), Some(inner.to_string()));
    }

    #[test]
    fn test_error_classification() {
        let port = PortId::new("source", "src_0");
        assert!(LinkError::TypeNotReady(port.clone()).is_transient());
        assert!(LinkError::TypeNotReady(port.clone()).is_per_port());
        assert!(LinkError::IncompatibleType {
            port: port.clone(),
            actual: "audio/x-raw".to_string(),
            expected: "video/x-raw".to_string(),
        }
        .is_per_port());
        assert!(!LinkError::UnknownPort(port).is_per_port());
        assert!(!LinkError::EngineFault("boom".to_string()).is_transient());
    }
}
