// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! engine: Runs PadLink graphs and links ports that appear at runtime.
//!
//! A [`Pipeline`] is started into a background actor that owns the graph; the
//! returned [`PipelineHandle`] sends it requests and reads its published snapshots.

use opentelemetry::global;
use padlink_core::{Graph, GraphSnapshot, GraphState};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

// --- Public Modules ---

pub mod binder;
pub mod constants;
pub mod diagnostics;
pub mod media_engine;
pub mod scripted;

mod actor;
mod config;
mod handle;
mod messages;

// Re-exports
pub use binder::{BindOutcome, DynamicPortBinder};
pub use config::PipelineConfig;
pub use diagnostics::{DotFileSink, SnapshotSink};
pub use handle::PipelineHandle;
pub use media_engine::MediaEngine;
pub use messages::{EngineEvent, Termination};
pub use scripted::{EngineScript, ScriptedEngine, ScriptedFault, ScriptedPort};

use actor::PipelineActor;
use constants::DEFAULT_QUERY_CAPACITY;

/// Builder for a pipeline actor.
pub struct Pipeline {
    name: String,
    config: PipelineConfig,
    engine: Box<dyn MediaEngine>,
    sink: Arc<dyn SnapshotSink>,
}

impl Pipeline {
    /// A pipeline with an idle [`ScriptedEngine`] and snapshots disabled.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: PipelineConfig::default(),
            engine: Box::new(ScriptedEngine::default()),
            sink: Arc::new(DotFileSink::disabled()),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: impl MediaEngine) -> Self {
        self.engine = Box::new(engine);
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Starts the actor in the background, returning a handle to control it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> PipelineHandle {
        let Self { name, config, mut engine, sink } = self;

        let (control_tx, control_rx) = mpsc::channel(config.control_capacity.max(1));
        let (query_tx, query_rx) = mpsc::channel(DEFAULT_QUERY_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(config.event_capacity.max(1));
        engine.start(events_tx);

        tracing::info!(
            pipeline = %name,
            control_capacity = config.control_capacity,
            event_capacity = config.event_capacity,
            "Starting pipeline actor"
        );

        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(GraphSnapshot::empty(name.clone())));
        let (state_tx, state_rx) = watch::channel(GraphState::Stopped);
        let (termination_tx, termination_rx) = watch::channel(None);
        let stop_token = CancellationToken::new();

        let meter = global::meter("padlink_engine");
        let actor = PipelineActor {
            graph: Graph::new(name.as_str()),
            engine,
            sink,
            binders: Vec::new(),
            pending: Vec::new(),
            control_rx,
            query_rx,
            events_rx,
            snapshot_tx,
            state_tx,
            termination_tx,
            state_subscribers: Vec::new(),
            stop_token: stop_token.clone(),
            operations_counter: meter
                .u64_counter("pipeline.operations")
                .with_description("Pipeline control operations and engine events")
                .build(),
            dynamic_links_counter: meter
                .u64_counter("pipeline.dynamic_links")
                .with_description("Dynamic port evaluations by outcome")
                .build(),
        };

        let span = tracing::info_span!("pipeline", name = %name);
        let actor_task = tokio::spawn(actor.run().instrument(span));

        PipelineHandle::new(control_tx, query_tx, snapshot_rx, state_rx, termination_rx, stop_token, actor_task)
    }
}

#[cfg(test)]
mod tests;
