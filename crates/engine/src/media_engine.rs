// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! The seam between the graph and whatever actually moves media.
//!
//! The actor never decodes anything. It asks a [`MediaEngine`] to move nodes between
//! run states and listens for [`EngineEvent`]s describing what the engine found.

use crate::messages::EngineEvent;
use async_trait::async_trait;
use padlink_core::{GraphState, LinkError, Node};
use tokio::sync::mpsc;

#[async_trait]
pub trait MediaEngine: Send + 'static {
    /// Gives the engine the channel it reports events on. Called once, before any
    /// state change is requested.
    fn start(&mut self, events: mpsc::Sender<EngineEvent>);

    /// Moves one node to `target`.
    ///
    /// Called for every node after the graph accepted the transition to `Playing`,
    /// and before teardown when the graph goes back to `Stopped`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::EngineFault`] if the node cannot change state.
    async fn request_state_change(&mut self, node: &Node, target: &GraphState) -> Result<(), LinkError>;
}
