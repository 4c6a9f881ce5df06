// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Message types exchanged with the pipeline actor.

use crate::binder::DynamicPortBinder;
use padlink_core::{GraphState, GraphStateUpdate, Link, LinkError, MediaType, NodeSpec, PortId, PortSpec};
use tokio::sync::{mpsc, oneshot};

type Reply<T> = oneshot::Sender<Result<T, LinkError>>;

/// Graph mutations, applied by the actor in the order they are received.
///
/// Every request carries a oneshot reply so structural errors reach the caller.
pub enum ControlMessage {
    AddNode { spec: NodeSpec, reply: Reply<()> },
    RemoveNode { name: String, reply: Reply<()> },
    Link { from: PortId, to: PortId, reply: Reply<()> },
    LinkNodes { src: String, dst: String, reply: Reply<Link> },
    Unlink { port: PortId, reply: oneshot::Sender<Option<Link>> },
    AddBinder { binder: DynamicPortBinder, reply: Reply<()> },
    SetState { target: GraphState, reply: Reply<GraphState> },
    /// Hands the current topology to the snapshot sink under `label`.
    Dump { label: String, timestamped: bool, reply: oneshot::Sender<()> },
    Shutdown,
}

/// Query messages for retrieving information without modifying the graph.
pub enum QueryMessage {
    SubscribeState { response_tx: mpsc::Sender<mpsc::Receiver<GraphStateUpdate>> },
}

/// Notifications from the media engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A node exposed a new output port. The media type may still be undecided.
    PortAdded { node: String, port: PortSpec },
    /// Negotiation finished for a previously announced port.
    MediaTypeDecided { port: PortId, media_type: MediaType },
    EndOfStream,
    /// Unrecoverable failure inside a node.
    Fault { node: String, reason: String },
}

/// Why a running pipeline stopped waiting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    EndOfStream,
    /// `stop()` was called or the stop token was cancelled.
    Stopped,
    Fault(String),
}

impl Termination {
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Fault(_))
    }
}
