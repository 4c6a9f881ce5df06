// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Public client handle for controlling a running pipeline actor.

use crate::binder::DynamicPortBinder;
use crate::constants::SHUTDOWN_TIMEOUT_SECS;
use crate::messages::{ControlMessage, QueryMessage, Termination};
use padlink_core::{GraphSnapshot, GraphState, GraphStateUpdate, Link, LinkError, NodeSpec, PortId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

/// A handle to communicate with a running pipeline actor.
///
/// Mutations are forwarded to the actor and answered once applied. Reads
/// ([`Self::snapshot`], [`Self::state`]) are served from the last published copy and
/// never wait on the actor.
#[derive(Clone)]
pub struct PipelineHandle {
    control_tx: mpsc::Sender<ControlMessage>,
    query_tx: mpsc::Sender<QueryMessage>,
    snapshot_rx: watch::Receiver<Arc<GraphSnapshot>>,
    state_rx: watch::Receiver<GraphState>,
    termination_rx: watch::Receiver<Option<Termination>>,
    stop_token: CancellationToken,
    actor_task: Arc<tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>>,
}

impl PipelineHandle {
    pub(crate) fn new(
        control_tx: mpsc::Sender<ControlMessage>,
        query_tx: mpsc::Sender<QueryMessage>,
        snapshot_rx: watch::Receiver<Arc<GraphSnapshot>>,
        state_rx: watch::Receiver<GraphState>,
        termination_rx: watch::Receiver<Option<Termination>>,
        stop_token: CancellationToken,
        actor_task: tokio::task::JoinHandle<()>,
    ) -> Self {
        Self {
            control_tx,
            query_tx,
            snapshot_rx,
            state_rx,
            termination_rx,
            stop_token,
            actor_task: Arc::new(tokio::sync::Mutex::new(Some(actor_task))),
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> ControlMessage + Send,
    ) -> Result<T, LinkError> {
        let (reply, response) = oneshot::channel();
        self.control_tx.send(build(reply)).await.map_err(|_| LinkError::ActorStopped)?;
        response.await.map_err(|_| LinkError::ActorStopped)
    }

    /// Adds a node with its declared ports.
    ///
    /// # Errors
    ///
    /// [`LinkError::DuplicateNode`], [`LinkError::DuplicatePort`] or
    /// [`LinkError::ActorStopped`].
    pub async fn add_node(&self, spec: NodeSpec) -> Result<(), LinkError> {
        self.request(|reply| ControlMessage::AddNode { spec, reply }).await?
    }

    /// Removes a node and every link touching it.
    ///
    /// # Errors
    ///
    /// [`LinkError::UnknownNode`] or [`LinkError::ActorStopped`].
    pub async fn remove_node(&self, name: impl Into<String>) -> Result<(), LinkError> {
        let name = name.into();
        self.request(|reply| ControlMessage::RemoveNode { name, reply }).await?
    }

    /// Links an output port to an input port.
    ///
    /// # Errors
    ///
    /// [`LinkError::UnknownPort`], [`LinkError::PortAlreadyLinked`] or
    /// [`LinkError::ActorStopped`].
    pub async fn link(&self, from: PortId, to: PortId) -> Result<(), LinkError> {
        self.request(|reply| ControlMessage::Link { from, to, reply }).await?
    }

    /// Links the first free output of `src` to the first free input of `dst`.
    ///
    /// # Errors
    ///
    /// [`LinkError::UnknownNode`], [`LinkError::UnknownPort`] or
    /// [`LinkError::ActorStopped`].
    pub async fn link_nodes(&self, src: impl Into<String>, dst: impl Into<String>) -> Result<Link, LinkError> {
        let (src, dst) = (src.into(), dst.into());
        self.request(|reply| ControlMessage::LinkNodes { src, dst, reply }).await?
    }

    /// Removes the link touching `port`, returning it if there was one.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::ActorStopped`] if the actor has shut down.
    pub async fn unlink(&self, port: PortId) -> Result<Option<Link>, LinkError> {
        self.request(|reply| ControlMessage::Unlink { port, reply }).await
    }

    /// Registers a binder. Its target no longer has to be linked before playing.
    ///
    /// # Errors
    ///
    /// [`LinkError::UnknownNode`] for an unknown source, [`LinkError::UnknownPort`]
    /// if the target is not a registered input, or [`LinkError::ActorStopped`].
    pub async fn add_binder(&self, binder: DynamicPortBinder) -> Result<(), LinkError> {
        self.request(|reply| ControlMessage::AddBinder { binder, reply }).await?
    }

    /// Requests a run-state transition, returning the previous state.
    ///
    /// # Errors
    ///
    /// [`LinkError::MissingStaticLinks`], [`LinkError::InvalidTransition`],
    /// [`LinkError::EngineFault`] or [`LinkError::ActorStopped`].
    pub async fn set_state(&self, target: GraphState) -> Result<GraphState, LinkError> {
        self.request(|reply| ControlMessage::SetState { target, reply }).await?
    }

    /// Hands the current topology to the snapshot sink under `label`. Returns once the
    /// sink has persisted it.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::ActorStopped`] if the actor has shut down.
    pub async fn dump(&self, label: impl Into<String>, timestamped: bool) -> Result<(), LinkError> {
        let label = label.into();
        self.request(|reply| ControlMessage::Dump { label, timestamped, reply }).await
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        self.snapshot_rx.borrow().clone()
    }

    /// Receiver that observes every snapshot the actor publishes.
    pub fn watch_snapshots(&self) -> watch::Receiver<Arc<GraphSnapshot>> {
        self.snapshot_rx.clone()
    }

    pub fn state(&self) -> GraphState {
        self.state_rx.borrow().clone()
    }

    /// Subscribes to graph state updates.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::ActorStopped`] if the actor has shut down or fails to respond.
    pub async fn subscribe_state(&self) -> Result<mpsc::Receiver<GraphStateUpdate>, LinkError> {
        let (response_tx, mut response_rx) = mpsc::channel(1);
        self.query_tx
            .send(QueryMessage::SubscribeState { response_tx })
            .await
            .map_err(|_| LinkError::ActorStopped)?;

        response_rx.recv().await.ok_or(LinkError::ActorStopped)
    }

    /// Ends [`Self::wait_for_termination`] with [`Termination::Stopped`].
    pub fn stop(&self) {
        self.stop_token.cancel();
    }

    /// Token that stops the pipeline when cancelled, e.g. from a signal handler.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop_token.clone()
    }

    /// Blocks until end-of-stream, an engine fault or a stop request.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::ActorStopped`] if the actor exited without recording a reason.
    pub async fn wait_for_termination(&self) -> Result<Termination, LinkError> {
        let mut termination_rx = self.termination_rx.clone();
        let termination = termination_rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| LinkError::ActorStopped)?;
        (*termination).clone().ok_or(LinkError::ActorStopped)
    }

    /// Sends a shutdown signal to the actor and waits for it to complete.
    ///
    /// The actor tears the graph down before exiting. Calling this more than once is
    /// harmless.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor does not exit within the timeout or panicked.
    pub async fn shutdown_and_wait(&self) -> Result<(), String> {
        // A closed channel means the actor already exited; still join it below.
        let _ = self.control_tx.send(ControlMessage::Shutdown).await;

        let join_handle = {
            let mut task_guard = self.actor_task.lock().await;
            task_guard.take()
        };

        let Some(handle) = join_handle else {
            tracing::debug!("shutdown_and_wait called multiple times, actor already shut down");
            return Ok(());
        };

        match tokio::time::timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), handle).await {
            Ok(Ok(())) => {
                tracing::debug!("Pipeline actor shut down gracefully");
                Ok(())
            },
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Pipeline actor panicked during shutdown");
                Err(format!("Pipeline actor panicked: {e}"))
            },
            Err(_) => {
                tracing::warn!("Pipeline actor did not shut down within {SHUTDOWN_TIMEOUT_SECS}s");
                Err("Pipeline shutdown timeout".to_string())
            },
        }
    }
}
