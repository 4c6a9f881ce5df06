// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

use super::init_tracing;
use crate::{EngineScript, Pipeline, PipelineHandle, ScriptedEngine, ScriptedFault, Termination};
use padlink_core::{GraphState, LinkError, NodeSpec, PortId, PortSpec};
use std::time::Duration;

async fn linear(handle: &PipelineHandle) {
    let setup = async {
        handle.add_node(NodeSpec::new("src", "videotestsrc").with_port(PortSpec::output("src"))).await?;
        handle.add_node(NodeSpec::new("sink", "fakesink").with_port(PortSpec::input("sink"))).await?;
        handle.link_nodes("src", "sink").await?;
        Ok::<(), LinkError>(())
    };
    if let Err(e) = setup.await {
        panic!("failed to set up pipeline: {e}");
    }
}

async fn wait(handle: &PipelineHandle) -> Termination {
    match tokio::time::timeout(Duration::from_secs(5), handle.wait_for_termination()).await {
        Ok(Ok(termination)) => termination,
        Ok(Err(e)) => panic!("pipeline actor failed: {e}"),
        Err(_) => panic!("pipeline did not terminate"),
    }
}

#[tokio::test]
async fn test_structural_errors_reach_caller() {
    init_tracing();
    let handle = Pipeline::new("errors").start();
    linear(&handle).await;

    assert_eq!(
        handle.add_node(NodeSpec::new("src", "videotestsrc")).await,
        Err(LinkError::DuplicateNode("src".to_string()))
    );
    assert_eq!(
        handle.link(PortId::new("src", "missing"), PortId::new("sink", "sink")).await,
        Err(LinkError::UnknownPort(PortId::new("src", "missing")))
    );
    assert!(matches!(
        handle.link(PortId::new("src", "src"), PortId::new("sink", "sink")).await,
        Err(LinkError::PortAlreadyLinked { .. })
    ));
    assert_eq!(handle.remove_node("ghost").await, Err(LinkError::UnknownNode("ghost".to_string())));
}

#[tokio::test]
async fn test_play_requires_static_links() {
    init_tracing();
    let handle = Pipeline::new("unlinked").start();
    if let Err(e) = handle.add_node(NodeSpec::new("sink", "fakesink").with_port(PortSpec::input("sink"))).await {
        panic!("{e}");
    }

    assert_eq!(
        handle.set_state(GraphState::Playing).await,
        Err(LinkError::MissingStaticLinks(vec![PortId::new("sink", "sink")]))
    );
    assert_eq!(handle.state(), GraphState::Stopped);
}

#[tokio::test]
async fn test_unlink_and_relink() {
    init_tracing();
    let handle = Pipeline::new("relink").start();
    linear(&handle).await;

    let removed = handle.unlink(PortId::new("sink", "sink")).await;
    assert!(matches!(removed, Ok(Some(_))));
    assert_eq!(handle.unlink(PortId::new("sink", "sink")).await, Ok(None));
    assert_eq!(handle.snapshot().link_count(), 0);

    assert_eq!(handle.link(PortId::new("src", "src"), PortId::new("sink", "sink")).await, Ok(()));
    assert_eq!(handle.snapshot().link_count(), 1);
}

#[tokio::test]
async fn test_fault_moves_graph_to_error() {
    init_tracing();
    let script = EngineScript {
        fault: Some(ScriptedFault {
            node: "src".to_string(),
            reason: "Internal data stream error".to_string(),
            after_ms: 10,
        }),
        ..EngineScript::default()
    };
    let handle = Pipeline::new("faulty").with_engine(ScriptedEngine::new(script)).start();
    linear(&handle).await;
    assert_eq!(handle.set_state(GraphState::Playing).await, Ok(GraphState::Stopped));

    let termination = wait(&handle).await;
    assert_eq!(termination, Termination::Fault("src: Internal data stream error".to_string()));
    assert!(termination.is_failure());
    assert!(matches!(handle.state(), GraphState::Error { .. }));

    assert_eq!(
        handle.set_state(GraphState::Playing).await,
        Err(LinkError::InvalidTransition { from: "error", to: "playing" })
    );
    assert!(handle.set_state(GraphState::Stopped).await.is_ok());
    assert_eq!(handle.state(), GraphState::Stopped);
    assert!(handle.snapshot().nodes.is_empty());
}

#[tokio::test]
async fn test_node_that_cannot_start_faults_pipeline() {
    init_tracing();
    let script = EngineScript { failing_nodes: vec!["sink".to_string()], ..EngineScript::default() };
    let handle = Pipeline::new("refusing").with_engine(ScriptedEngine::new(script)).start();
    linear(&handle).await;

    let result = handle.set_state(GraphState::Playing).await;
    assert!(matches!(result, Err(LinkError::EngineFault(_))));
    assert!(matches!(wait(&handle).await, Termination::Fault(_)));
    assert!(matches!(handle.state(), GraphState::Error { .. }));
}

#[tokio::test]
async fn test_stop_ends_wait() {
    init_tracing();
    let handle = Pipeline::new("stoppable").start();
    linear(&handle).await;
    assert!(handle.set_state(GraphState::Playing).await.is_ok());

    let token = handle.stop_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
    });

    assert_eq!(wait(&handle).await, Termination::Stopped);
    // Stopping only ends the wait; teardown is up to the caller.
    assert_eq!(handle.state(), GraphState::Playing);
}

#[tokio::test]
async fn test_state_subscribers_see_transitions() {
    init_tracing();
    let handle = Pipeline::new("observed").start();
    linear(&handle).await;
    let mut updates = match handle.subscribe_state().await {
        Ok(rx) => rx,
        Err(e) => panic!("failed to subscribe: {e}"),
    };

    assert!(handle.set_state(GraphState::Playing).await.is_ok());
    assert!(handle.set_state(GraphState::Stopped).await.is_ok());

    let first = updates.recv().await.map(|u| u.state);
    let second = updates.recv().await.map(|u| u.state);
    assert_eq!(first, Some(GraphState::Playing));
    assert_eq!(second, Some(GraphState::Stopped));
}

#[tokio::test]
async fn test_shutdown_tears_down_and_closes_handle() {
    init_tracing();
    let handle = Pipeline::new("shutdown").start();
    linear(&handle).await;
    assert!(handle.set_state(GraphState::Playing).await.is_ok());

    if let Err(e) = handle.shutdown_and_wait().await {
        panic!("failed to shutdown pipeline: {e}");
    }
    assert_eq!(handle.state(), GraphState::Stopped);
    assert!(handle.snapshot().nodes.is_empty());
    assert_eq!(wait(&handle).await, Termination::Stopped);
    assert_eq!(handle.add_node(NodeSpec::new("late", "fakesink")).await, Err(LinkError::ActorStopped));
    assert!(handle.shutdown_and_wait().await.is_ok());
}

#[tokio::test]
async fn test_same_state_is_noop() {
    init_tracing();
    let handle = Pipeline::new("noop").start();
    assert_eq!(handle.set_state(GraphState::Stopped).await, Ok(GraphState::Stopped));
    linear(&handle).await;
    assert_eq!(handle.set_state(GraphState::Playing).await, Ok(GraphState::Stopped));
    assert_eq!(handle.set_state(GraphState::Playing).await, Ok(GraphState::Playing));
    assert_eq!(handle.snapshot().link_count(), 1);
}

#[tokio::test]
async fn test_removed_node_stops_producing_events() {
    init_tracing();
    let script = EngineScript {
        fault: Some(ScriptedFault { node: "src".to_string(), reason: "Late failure".to_string(), after_ms: 40 }),
        ..EngineScript::default()
    };
    let handle = Pipeline::new("pruned").with_engine(ScriptedEngine::new(script)).start();
    linear(&handle).await;
    assert!(handle.set_state(GraphState::Playing).await.is_ok());

    assert_eq!(handle.remove_node("src").await, Ok(()));
    tokio::time::sleep(Duration::from_millis(120)).await;

    assert_eq!(handle.state(), GraphState::Playing);
    assert!(tokio::time::timeout(Duration::from_millis(10), handle.wait_for_termination()).await.is_err());
}

#[tokio::test]
async fn test_no_end_of_stream_after_teardown() {
    init_tracing();
    let script = EngineScript { end_of_stream_after_ms: Some(60), ..EngineScript::default() };
    let handle = Pipeline::new("released").with_engine(ScriptedEngine::new(script)).start();
    linear(&handle).await;
    assert!(handle.set_state(GraphState::Playing).await.is_ok());

    assert_eq!(handle.remove_node("src").await, Ok(()));
    assert!(handle.set_state(GraphState::Stopped).await.is_ok());
    assert!(handle.snapshot().nodes.is_empty());

    let late = tokio::time::timeout(Duration::from_millis(200), handle.wait_for_termination()).await;
    assert!(late.is_err(), "engine reported {late:?} after teardown");
}
