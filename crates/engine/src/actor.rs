// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Pipeline actor implementation (control plane).
//!
//! The actor is the single owner of the [`Graph`]. Control requests from handles,
//! queries and media engine events all arrive on channels and are applied one at a
//! time, so no two discovery handlers for a graph ever run concurrently. After every
//! mutation the actor republishes an immutable snapshot for concurrent readers.

use crate::binder::{BindOutcome, DynamicPortBinder};
use crate::constants::DEFAULT_SUBSCRIBER_CHANNEL_CAPACITY;
use crate::diagnostics::SnapshotSink;
use crate::media_engine::MediaEngine;
use crate::messages::{ControlMessage, EngineEvent, QueryMessage, Termination};
use opentelemetry::metrics::Counter;
use opentelemetry::KeyValue;
use padlink_core::{Graph, GraphSnapshot, GraphState, GraphStateUpdate, LinkError, PortDirection, PortId, PortPresence};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

/// The state for the long-running pipeline actor.
pub(crate) struct PipelineActor {
    pub(crate) graph: Graph,
    pub(crate) engine: Box<dyn MediaEngine>,
    pub(crate) sink: Arc<dyn SnapshotSink>,
    pub(crate) binders: Vec<DynamicPortBinder>,
    /// Discovered ports whose media type was undecided when a binder looked at them.
    pub(crate) pending: Vec<PortId>,
    pub(crate) control_rx: mpsc::Receiver<ControlMessage>,
    pub(crate) query_rx: mpsc::Receiver<QueryMessage>,
    pub(crate) events_rx: mpsc::Receiver<EngineEvent>,
    pub(crate) snapshot_tx: watch::Sender<Arc<GraphSnapshot>>,
    pub(crate) state_tx: watch::Sender<GraphState>,
    pub(crate) termination_tx: watch::Sender<Option<Termination>>,
    pub(crate) state_subscribers: Vec<mpsc::Sender<GraphStateUpdate>>,
    pub(crate) stop_token: CancellationToken,
    // Metrics
    pub(crate) operations_counter: Counter<u64>,
    pub(crate) dynamic_links_counter: Counter<u64>,
}

impl PipelineActor {
    /// The main actor loop. Ends on `Shutdown` or once every handle is dropped.
    pub(crate) async fn run(mut self) {
        tracing::info!(graph = %self.graph.name(), "Pipeline actor started");

        loop {
            tokio::select! {
                msg = self.control_rx.recv() => {
                    let Some(msg) = msg else {
                        tracing::debug!("All pipeline handles dropped");
                        break;
                    };
                    if !self.handle_control(msg).await {
                        break; // Shutdown requested
                    }
                },
                Some(query) = self.query_rx.recv() => {
                    self.handle_query(query).await;
                },
                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event).await;
                },
                () = self.stop_token.cancelled(), if !self.is_terminated() => {
                    tracing::info!(graph = %self.graph.name(), "Stop requested");
                    self.terminate(Termination::Stopped);
                },
            }
        }

        self.teardown().await;
        tracing::info!(graph = %self.graph.name(), "Pipeline actor shutting down");
    }

    /// Applies one control request. Returns `false` when the actor should exit.
    async fn handle_control(&mut self, msg: ControlMessage) -> bool {
        match msg {
            ControlMessage::AddNode { spec, reply } => {
                self.count_operation("add_node");
                let result = self.graph.add_node(spec);
                if result.is_ok() {
                    self.publish_snapshot();
                }
                let _ = reply.send(result);
            },
            ControlMessage::RemoveNode { name, reply } => {
                self.count_operation("remove_node");
                let result = match self.graph.remove_node(&name) {
                    Ok(node) => {
                        // A running node keeps producing events until the engine stops it.
                        if *self.graph.state() != GraphState::Stopped {
                            if let Err(e) = self.engine.request_state_change(&node, &GraphState::Stopped).await {
                                tracing::warn!(node = %name, error = %e, "Removed node did not stop cleanly");
                            }
                        }
                        self.binders.retain(|b| b.source() != name && *b.target().node != *name);
                        self.pending.retain(|p| *p.node != *name);
                        self.publish_snapshot();
                        Ok(())
                    },
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            },
            ControlMessage::Link { from, to, reply } => {
                self.count_operation("link");
                let result = self.graph.link(&from, &to);
                if result.is_ok() {
                    self.publish_snapshot();
                }
                let _ = reply.send(result);
            },
            ControlMessage::LinkNodes { src, dst, reply } => {
                self.count_operation("link_nodes");
                let result = self.graph.link_nodes(&src, &dst);
                if result.is_ok() {
                    self.publish_snapshot();
                }
                let _ = reply.send(result);
            },
            ControlMessage::Unlink { port, reply } => {
                self.count_operation("unlink");
                let removed = self.graph.unlink(&port);
                if removed.is_some() {
                    self.publish_snapshot();
                }
                let _ = reply.send(removed);
            },
            ControlMessage::AddBinder { binder, reply } => {
                self.count_operation("add_binder");
                let result = self.add_binder(binder);
                let _ = reply.send(result);
            },
            ControlMessage::SetState { target, reply } => {
                self.count_operation("set_state");
                let result = self.set_state(target).await;
                let _ = reply.send(result);
            },
            ControlMessage::Dump { label, timestamped, reply } => {
                self.count_operation("dump");
                self.sink.snapshot(&self.graph.snapshot(), &label, timestamped);
                self.sink.flush().await;
                let _ = reply.send(());
            },
            ControlMessage::Shutdown => {
                tracing::info!("Received shutdown signal");
                return false;
            },
        }
        true
    }

    async fn handle_query(&mut self, msg: QueryMessage) {
        match msg {
            QueryMessage::SubscribeState { response_tx } => {
                let (tx, rx) = mpsc::channel(DEFAULT_SUBSCRIBER_CHANNEL_CAPACITY);
                self.state_subscribers.push(tx);
                let _ = response_tx.send(rx).await;
            },
        }
    }

    async fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::PortAdded { node, port } => {
                self.count_operation("port_added");
                match self.graph.add_port(&node, port) {
                    Ok(id) => {
                        self.publish_snapshot();
                        self.bind_discovered(&id);
                    },
                    Err(e) => {
                        // Late announcements after teardown land here.
                        tracing::warn!(node = %node, error = %e, "Ignoring port announcement");
                    },
                }
            },
            EngineEvent::MediaTypeDecided { port, media_type } => {
                tracing::debug!(port = %port, media_type = %media_type, "Media type decided");
                if let Err(e) = self.graph.set_media_type(&port, media_type) {
                    tracing::warn!(port = %port, error = %e, "Ignoring media type for unknown port");
                    return;
                }
                self.publish_snapshot();
                if let Some(index) = self.pending.iter().position(|p| *p == port) {
                    self.pending.swap_remove(index);
                    self.bind_discovered(&port);
                }
            },
            EngineEvent::EndOfStream => {
                tracing::info!(graph = %self.graph.name(), "End-Of-Stream reached");
                self.terminate(Termination::EndOfStream);
            },
            EngineEvent::Fault { node, reason } => {
                tracing::error!(node = %node, reason = %reason, "Error received from node '{}'", node);
                let reason = format!("{node}: {reason}");
                self.fail(&reason).await;
                self.terminate(Termination::Fault(reason));
            },
        }
    }

    fn add_binder(&mut self, binder: DynamicPortBinder) -> Result<(), LinkError> {
        let Some(source) = self.graph.node(binder.source()) else {
            return Err(LinkError::UnknownNode(binder.source().to_string()));
        };
        if !self.graph.port(binder.target()).is_some_and(|p| p.direction() == PortDirection::Input) {
            return Err(LinkError::UnknownPort(binder.target().clone()));
        }

        // Ports the source announced before the binder existed are evaluated now.
        let announced: Vec<PortId> = source
            .outputs()
            .filter(|p| p.presence() == PortPresence::Sometimes && !p.is_linked())
            .map(|p| source.port_id(p.name()))
            .collect();

        self.graph.defer_link(binder.target())?;
        tracing::info!(
            source = %binder.source(),
            target = %binder.target(),
            accepts = %binder.accepts(),
            "Dynamic binder registered"
        );
        self.binders.push(binder);
        self.publish_snapshot();

        let index = self.binders.len() - 1;
        for port in &announced {
            self.evaluate(index, port);
        }
        Ok(())
    }

    /// Offers a discovered port to every binder watching its node.
    fn bind_discovered(&mut self, port: &PortId) {
        for index in 0..self.binders.len() {
            if self.binders[index].watches(port) {
                self.evaluate(index, port);
            }
        }
    }

    fn evaluate(&mut self, index: usize, port: &PortId) {
        let Some(binder) = self.binders.get(index) else {
            return;
        };
        let result = binder.on_port_discovered(&mut self.graph, port, self.sink.as_ref());

        let outcome = match &result {
            Ok(BindOutcome::Linked(_)) => "linked",
            Ok(BindOutcome::TargetAlreadyLinked) => "already_linked",
            Err(LinkError::TypeNotReady(_)) => "type_not_ready",
            Err(LinkError::IncompatibleType { .. }) => "incompatible",
            Err(_) => "failed",
        };
        self.dynamic_links_counter.add(1, &[KeyValue::new("outcome", outcome)]);

        match result {
            Ok(BindOutcome::Linked(_)) => self.publish_snapshot(),
            Err(LinkError::TypeNotReady(port)) => {
                if !self.pending.contains(&port) {
                    self.pending.push(port);
                }
            },
            Ok(BindOutcome::TargetAlreadyLinked) | Err(_) => {},
        }
    }

    async fn set_state(&mut self, target: GraphState) -> Result<GraphState, LinkError> {
        if self.graph.state().same_kind(&target) {
            return Ok(self.graph.state().clone());
        }

        match target {
            GraphState::Playing => {
                let previous = self.graph.set_state(GraphState::Playing)?;
                self.publish_state();

                let mut failure = None;
                for node in self.graph.nodes() {
                    if let Err(e) = self.engine.request_state_change(node, &GraphState::Playing).await {
                        tracing::error!(node = %node.name(), error = %e, "Unable to set the node to the playing state");
                        failure = Some(e);
                        break;
                    }
                }
                if let Some(e) = failure {
                    let reason = e.to_string();
                    self.fail(&reason).await;
                    self.terminate(Termination::Fault(reason));
                    return Err(e);
                }
                Ok(previous)
            },
            GraphState::Stopped => {
                self.stop_nodes(&GraphState::Stopped).await;
                let previous = self.graph.set_state(GraphState::Stopped)?;
                self.binders.clear();
                self.pending.clear();
                self.publish_state();
                self.publish_snapshot();
                Ok(previous)
            },
            GraphState::Error { .. } => {
                let previous = self.graph.set_state(target.clone())?;
                self.stop_nodes(&target).await;
                self.publish_state();
                Ok(previous)
            },
        }
    }

    /// Moves a playing graph to the error state. Other states only log.
    async fn fail(&mut self, reason: &str) {
        if *self.graph.state() != GraphState::Playing {
            tracing::warn!(state = %self.graph.state(), reason, "Failure outside of playing state");
            return;
        }
        let target = GraphState::Error { reason: reason.to_string() };
        if let Err(e) = self.graph.set_state(target.clone()) {
            tracing::error!(error = %e, "Failed to enter error state");
            return;
        }
        self.stop_nodes(&target).await;
        self.publish_state();
        self.publish_snapshot();
    }

    async fn stop_nodes(&mut self, target: &GraphState) {
        for node in self.graph.nodes() {
            if let Err(e) = self.engine.request_state_change(node, target).await {
                tracing::warn!(node = %node.name(), error = %e, "Node did not stop cleanly");
            }
        }
    }

    /// Releases everything still held once the loop has ended.
    async fn teardown(&mut self) {
        if *self.graph.state() != GraphState::Stopped {
            if let Err(e) = self.set_state(GraphState::Stopped).await {
                tracing::error!(error = %e, "Teardown failed");
            }
        }
        self.sink.flush().await;
        self.terminate(Termination::Stopped);
    }

    fn is_terminated(&self) -> bool {
        self.termination_tx.borrow().is_some()
    }

    /// Records why the pipeline ended. Only the first reason is kept.
    fn terminate(&self, termination: Termination) {
        let changed = self.termination_tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            tracing::debug!(termination = ?termination, "Pipeline terminated");
            *current = Some(termination);
            true
        });
        if !changed {
            tracing::trace!("Termination already recorded");
        }
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(Arc::new(self.graph.snapshot()));
    }

    fn publish_state(&mut self) {
        let state = self.graph.state().clone();
        self.state_tx.send_replace(state.clone());

        let update = GraphStateUpdate::new(self.graph.name().to_string(), state);
        self.state_subscribers.retain(|subscriber| {
            // Keep subscribers on transient backpressure (Full); remove only when Closed.
            match subscriber.try_send(update.clone()) {
                Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    fn count_operation(&self, operation: &'static str) {
        self.operations_counter.add(1, &[KeyValue::new("operation", operation)]);
    }
}
