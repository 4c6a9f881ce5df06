// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

use anyhow::Context;
use padlink_core::GraphState;
use padlink_engine::{DotFileSink, Pipeline, ScriptedEngine, Termination};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::topology;

/// Builds the configured topology, plays it and waits for it to finish.
///
/// The graph is always torn down to Stopped before returning, including after a fault.
///
/// # Errors
///
/// Returns an error if the topology is invalid or the pipeline cannot start playing.
pub async fn run_pipeline(config: &Config) -> anyhow::Result<Termination> {
    let plan = topology::plan(&config.pipeline).context("Invalid pipeline topology")?;

    let dot_dir = config.diagnostics.dot_dir.as_ref().map(PathBuf::from);
    if dot_dir.is_none() {
        info!("Graph snapshots disabled; set diagnostics.dot_dir to enable them");
    }
    let sink = DotFileSink::new(dot_dir, config.diagnostics.details);

    let handle = Pipeline::new(config.pipeline.name.clone())
        .with_config(config.engine.clone())
        .with_engine(ScriptedEngine::new(config.pipeline.script.clone()))
        .with_sink(Arc::new(sink))
        .start();

    let played = async {
        plan.apply(&handle).await.context("Not all elements could be created or linked")?;
        if let Some(label) = &config.pipeline.initial_snapshot {
            handle.dump(label.as_str(), false).await?;
        }
        handle
            .set_state(GraphState::Playing)
            .await
            .context("Unable to set the pipeline to the playing state")?;
        anyhow::Ok(())
    }
    .await;

    let outcome = match played {
        Ok(()) => {
            let stop_token = handle.stop_token();
            let ctrl_c = tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Received Ctrl-C, stopping pipeline");
                    stop_token.cancel();
                }
            });

            let termination = handle.wait_for_termination().await;
            ctrl_c.abort();
            termination.map_err(anyhow::Error::from)
        },
        Err(e) => Err(e),
    };

    match &outcome {
        Ok(Termination::EndOfStream) => info!("End-Of-Stream reached"),
        Ok(Termination::Stopped) => info!("Pipeline stopped"),
        Ok(Termination::Fault(reason)) => error!(%reason, "Pipeline failed"),
        Err(e) => error!(error = %e, "Pipeline did not run"),
    }

    if let Err(e) = handle.set_state(GraphState::Stopped).await {
        warn!(error = %e, "Failed to stop pipeline");
    }
    if let Err(e) = handle.shutdown_and_wait().await {
        warn!(error = %e, "Pipeline actor did not shut down cleanly");
    }

    outcome
}
