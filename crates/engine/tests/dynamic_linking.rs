// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! End-to-end dynamic linking: a decoder-like source exposes audio and video ports
//! after playback starts, and only the video port ends up feeding the converter.

use padlink_core::{DotDetails, GraphState, NodeSpec, PortId, PortSpec};
use padlink_engine::{
    DotFileSink, DynamicPortBinder, EngineScript, Pipeline, PipelineConfig, ScriptedEngine, ScriptedPort,
    Termination,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

fn discovery(port: &str, media_type: &str, delay_ms: u64) -> ScriptedPort {
    ScriptedPort {
        node: "source".to_string(),
        port: port.to_string(),
        media_type: Some(media_type.to_string()),
        delay_ms,
        negotiate_after_ms: None,
    }
}

#[tokio::test]
#[allow(clippy::expect_used)]
async fn test_tutorial_pipeline_writes_snapshots() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_max_level(tracing::Level::DEBUG).try_init();

    let dot_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let script = EngineScript {
        discoveries: vec![
            discovery("src_0", "audio/x-raw, format=F32LE, layout=interleaved, rate=48000, channels=2", 10),
            discovery("src_1", "video/x-raw, format=I420, width=854, height=480", 20),
        ],
        end_of_stream_after_ms: Some(150),
        ..EngineScript::default()
    };

    let handle = Pipeline::new("test-pipeline")
        .with_config(PipelineConfig { control_capacity: 8, event_capacity: 8 })
        .with_engine(ScriptedEngine::new(script))
        .with_sink(Arc::new(DotFileSink::new(Some(dot_dir.path().to_path_buf()), DotDetails::All)))
        .start();

    handle
        .add_node(
            NodeSpec::new("source", "uridecodebin")
                .with_property("uri", "https://example.org/media/sintel_trailer-480p.webm"),
        )
        .await
        .expect("Failed to add source");
    handle
        .add_node(
            NodeSpec::new("convert", "videoconvert")
                .with_port(PortSpec::input("sink"))
                .with_port(PortSpec::output("src")),
        )
        .await
        .expect("Failed to add convert");
    handle
        .add_node(NodeSpec::new("sink", "autovideosink").with_port(PortSpec::input("sink")))
        .await
        .expect("Failed to add sink");
    handle.link_nodes("convert", "sink").await.expect("Failed to link convert to sink");
    handle
        .add_binder(
            DynamicPortBinder::new("source", PortId::new("convert", "sink"), "video/x-raw")
                .with_snapshot_label("pad_linked_state"),
        )
        .await
        .expect("Failed to register binder");

    handle.dump("initial_state", false).await.expect("Failed to dump initial state");
    handle.set_state(GraphState::Playing).await.expect("Failed to play");

    let termination = timeout(Duration::from_secs(5), handle.wait_for_termination())
        .await
        .expect("Pipeline did not terminate")
        .expect("Pipeline actor stopped unexpectedly");
    assert_eq!(termination, Termination::EndOfStream);

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.link_count(), 2);
    let source = snapshot.node("source").expect("source missing");
    assert_eq!(source.ports[0].peer, None, "audio port must stay unlinked");
    assert_eq!(source.ports[1].peer, Some(PortId::new("convert", "sink")));

    handle.set_state(GraphState::Stopped).await.expect("Failed to stop");
    assert!(handle.snapshot().nodes.is_empty());
    handle.shutdown_and_wait().await.expect("Failed to shut down");

    let initial =
        std::fs::read_to_string(dot_dir.path().join("initial_state.dot")).expect("initial_state.dot missing");
    assert!(initial.contains("convert_src -> sink_sink"));
    assert!(!initial.contains("source_src_1"));

    let linked: Vec<_> = std::fs::read_dir(dot_dir.path())
        .expect("Failed to list dot dir")
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with("-pad_linked_state.dot"))
        .collect();
    assert_eq!(linked.len(), 1, "expected one timestamped snapshot, found {linked:?}");

    let dot = std::fs::read_to_string(dot_dir.path().join(&linked[0])).expect("Failed to read snapshot");
    assert!(dot.contains("source_src_1 -> convert_sink [label=\"video/x-raw, format=I420, width=854, height=480\"];"));
    assert!(dot.contains("source_src_0 [color=black"));
    assert!(!dot.contains("source_src_0 -> "));
}
