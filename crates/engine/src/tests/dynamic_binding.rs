// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

use super::{init_tracing, RecordingSink};
use crate::{DynamicPortBinder, EngineScript, Pipeline, PipelineHandle, ScriptedEngine, ScriptedPort, Termination};
use padlink_core::{GraphState, LinkError, NodeSpec, PortId, PortSpec};
use std::sync::Arc;
use std::time::Duration;

fn discovery(port: &str, media_type: Option<&str>, delay_ms: u64) -> ScriptedPort {
    ScriptedPort {
        node: "source".to_string(),
        port: port.to_string(),
        media_type: media_type.map(str::to_string),
        delay_ms,
        negotiate_after_ms: None,
    }
}

fn script(discoveries: Vec<ScriptedPort>) -> EngineScript {
    EngineScript { discoveries, end_of_stream_after_ms: Some(150), ..EngineScript::default() }
}

/// source (no static ports) -> convert (sink, src) -> sink (sink), with a binder
/// feeding convert.sink from whatever video port the source exposes.
async fn start_tutorial(script: EngineScript, sink: Arc<RecordingSink>) -> PipelineHandle {
    init_tracing();
    let handle = Pipeline::new("test-pipeline")
        .with_engine(ScriptedEngine::new(script))
        .with_sink(sink)
        .start();

    let setup = async {
        handle.add_node(NodeSpec::new("source", "uridecodebin").with_property("uri", "file:///sintel.webm")).await?;
        handle
            .add_node(
                NodeSpec::new("convert", "videoconvert")
                    .with_port(PortSpec::input("sink"))
                    .with_port(PortSpec::output("src")),
            )
            .await?;
        handle.add_node(NodeSpec::new("sink", "autovideosink").with_port(PortSpec::input("sink"))).await?;
        handle.link_nodes("convert", "sink").await?;
        handle
            .add_binder(
                DynamicPortBinder::new("source", PortId::new("convert", "sink"), "video/x-raw")
                    .with_snapshot_label("pad_linked_state"),
            )
            .await?;
        handle.dump("initial_state", false).await?;
        handle.set_state(GraphState::Playing).await?;
        Ok::<(), LinkError>(())
    };
    if let Err(e) = setup.await {
        panic!("failed to set up pipeline: {e}");
    }
    handle
}

async fn wait(handle: &PipelineHandle) -> Termination {
    match tokio::time::timeout(Duration::from_secs(5), handle.wait_for_termination()).await {
        Ok(Ok(termination)) => termination,
        Ok(Err(e)) => panic!("pipeline actor failed: {e}"),
        Err(_) => panic!("pipeline did not terminate"),
    }
}

#[tokio::test]
async fn test_video_port_linked_audio_port_ignored() {
    let sink = Arc::new(RecordingSink::default());
    let handle = start_tutorial(
        script(vec![
            discovery("src_0", Some("video/x-raw, format=I420, width=854, height=480"), 10),
            discovery("src_1", Some("audio/x-raw, format=F32LE, rate=48000"), 20),
        ]),
        sink.clone(),
    )
    .await;

    assert_eq!(wait(&handle).await, Termination::EndOfStream);

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.link_count(), 2);
    let source = snapshot.node("source").unwrap_or_else(|| panic!("source missing"));
    assert_eq!(source.ports.len(), 2);
    assert_eq!(source.ports[0].peer, Some(PortId::new("convert", "sink")));
    assert_eq!(source.ports[1].peer, None);
    assert_eq!(handle.state(), GraphState::Playing);

    assert_eq!(sink.labels(), vec!["initial_state", "pad_linked_state"]);
    assert_eq!(sink.calls()[0], ("initial_state".to_string(), false, 1));
    assert_eq!(sink.calls()[1], ("pad_linked_state".to_string(), true, 2));

    if let Err(e) = handle.shutdown_and_wait().await {
        panic!("failed to shutdown pipeline: {e}");
    }
}

#[tokio::test]
async fn test_audio_first_does_not_block_video() {
    let sink = Arc::new(RecordingSink::default());
    let handle = start_tutorial(
        script(vec![
            discovery("src_0", Some("audio/x-raw"), 5),
            discovery("src_1", Some("video/x-raw"), 15),
        ]),
        sink.clone(),
    )
    .await;

    assert_eq!(wait(&handle).await, Termination::EndOfStream);
    let snapshot = handle.snapshot();
    let source = snapshot.node("source").unwrap_or_else(|| panic!("source missing"));
    assert_eq!(source.ports[0].peer, None);
    assert_eq!(source.ports[1].peer, Some(PortId::new("convert", "sink")));
}

#[tokio::test]
async fn test_only_first_video_port_is_linked() {
    let sink = Arc::new(RecordingSink::default());
    let handle = start_tutorial(
        script(vec![discovery("src_0", Some("video/x-raw"), 5), discovery("src_1", Some("video/x-raw"), 15)]),
        sink.clone(),
    )
    .await;

    assert_eq!(wait(&handle).await, Termination::EndOfStream);
    assert_eq!(handle.snapshot().link_count(), 2);
    assert_eq!(sink.labels().iter().filter(|l| *l == "pad_linked_state").count(), 1);
}

#[tokio::test]
async fn test_port_linked_once_media_type_is_decided() {
    let mut late = discovery("src_0", Some("video/x-raw"), 5);
    late.negotiate_after_ms = Some(20);
    let sink = Arc::new(RecordingSink::default());
    let handle = start_tutorial(script(vec![late]), sink.clone()).await;

    assert_eq!(wait(&handle).await, Termination::EndOfStream);
    let snapshot = handle.snapshot();
    let source = snapshot.node("source").unwrap_or_else(|| panic!("source missing"));
    assert_eq!(source.ports[0].peer, Some(PortId::new("convert", "sink")));
    assert_eq!(sink.labels(), vec!["initial_state", "pad_linked_state"]);
}

#[tokio::test]
async fn test_undecided_port_stays_unlinked() {
    let sink = Arc::new(RecordingSink::default());
    let handle = start_tutorial(script(vec![discovery("src_0", None, 5)]), sink.clone()).await;

    assert_eq!(wait(&handle).await, Termination::EndOfStream);
    assert_eq!(handle.snapshot().link_count(), 1);
    assert_eq!(sink.labels(), vec!["initial_state"]);
}

#[tokio::test]
async fn test_binder_picks_up_ports_announced_before_registration() {
    init_tracing();
    let handle = Pipeline::new("early")
        .with_engine(ScriptedEngine::new(EngineScript {
            discoveries: vec![discovery("src_0", Some("video/x-raw"), 5)],
            ..EngineScript::default()
        }))
        .start();
    let setup = async {
        handle.add_node(NodeSpec::new("source", "uridecodebin")).await?;
        // A request-style input, so the graph may play before anything feeds it.
        handle
            .add_node(NodeSpec::new("mixer", "compositor").with_port(PortSpec::input("sink_0").sometimes()))
            .await?;
        handle.set_state(GraphState::Playing).await?;
        Ok::<(), LinkError>(())
    };
    if let Err(e) = setup.await {
        panic!("setup failed: {e}");
    }

    let mut snapshots = handle.watch_snapshots();
    let announced = tokio::time::timeout(
        Duration::from_secs(5),
        snapshots.wait_for(|s| s.node("source").is_some_and(|n| !n.ports.is_empty())),
    )
    .await
    .is_ok_and(|result| result.is_ok());
    assert!(announced, "source never announced its port");

    let binder = DynamicPortBinder::new("source", PortId::new("mixer", "sink_0"), "video/*");
    assert_eq!(handle.add_binder(binder).await, Ok(()));

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.link_count(), 1);
    assert_eq!(snapshot.links[0].from, PortId::new("source", "src_0"));
}

#[tokio::test]
async fn test_binder_registration_errors() {
    init_tracing();
    let handle = Pipeline::new("errors").start();
    if let Err(e) = handle.add_node(NodeSpec::new("convert", "videoconvert").with_port(PortSpec::output("src"))).await {
        panic!("setup failed: {e}");
    }

    let unknown_source = DynamicPortBinder::new("ghost", PortId::new("convert", "src"), "video/x-raw");
    assert_eq!(handle.add_binder(unknown_source).await, Err(LinkError::UnknownNode("ghost".to_string())));

    // Output ports cannot be binder targets.
    handle.add_node(NodeSpec::new("source", "uridecodebin")).await.unwrap_or_else(|e| panic!("{e}"));
    let wrong_direction = DynamicPortBinder::new("source", PortId::new("convert", "src"), "video/x-raw");
    assert_eq!(
        handle.add_binder(wrong_direction).await,
        Err(LinkError::UnknownPort(PortId::new("convert", "src")))
    );
}
