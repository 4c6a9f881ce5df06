// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! A media engine that replays a fixed script of discoveries.
//!
//! Each node that starts playing gets its own timeline task which emits the
//! scripted [`EngineEvent`]s at their offsets from the moment the node started.
//! Timelines stop as soon as the node is stopped or the engine is dropped.

use crate::media_engine::MediaEngine;
use crate::messages::EngineEvent;
use async_trait::async_trait;
use padlink_core::{GraphState, LinkError, MediaType, Node, PortId, PortSpec};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// One output port a node will announce after it starts playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScriptedPort {
    /// Node that exposes the port.
    pub node: String,
    /// Port name, e.g. `src_0`.
    pub port: String,
    /// Media type the port carries. `None` leaves the type undecided forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    /// Delay after the node starts playing.
    #[serde(default)]
    pub delay_ms: u64,
    /// Announce the port without a type and decide it this much later.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negotiate_after_ms: Option<u64>,
}

/// An unrecoverable failure injected into a node's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ScriptedFault {
    pub node: String,
    pub reason: String,
    #[serde(default)]
    pub after_ms: u64,
}

/// What the scripted engine will do once the graph plays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EngineScript {
    pub discoveries: Vec<ScriptedPort>,
    /// Send end-of-stream this long after the first node starts. `None` plays forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_of_stream_after_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<ScriptedFault>,
    /// Nodes that refuse to start, as if their implementation were missing.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failing_nodes: Vec<String>,
}

#[derive(Debug)]
struct Timed {
    at: Duration,
    event: EngineEvent,
}

impl EngineScript {
    fn timeline(&self, node: &str) -> Vec<Timed> {
        let mut timeline = Vec::new();
        for discovery in self.discoveries.iter().filter(|d| d.node == node) {
            let at = Duration::from_millis(discovery.delay_ms);
            let mut spec = PortSpec::output(discovery.port.clone()).sometimes();
            match (&discovery.media_type, discovery.negotiate_after_ms) {
                (Some(media_type), Some(after)) => {
                    timeline.push(Timed {
                        at: at + Duration::from_millis(after),
                        event: EngineEvent::MediaTypeDecided {
                            port: PortId::new(node, discovery.port.as_str()),
                            media_type: MediaType::new(media_type.clone()),
                        },
                    });
                },
                (Some(media_type), None) => spec = spec.with_media_type(media_type.as_str()),
                (None, _) => {},
            }
            timeline.push(Timed { at, event: EngineEvent::PortAdded { node: node.to_string(), port: spec } });
        }
        if let Some(fault) = self.fault.as_ref().filter(|f| f.node == node) {
            timeline.push(Timed {
                at: Duration::from_millis(fault.after_ms),
                event: EngineEvent::Fault { node: fault.node.clone(), reason: fault.reason.clone() },
            });
        }
        // Announcements sort before negotiations sharing the same offset.
        timeline.sort_by_key(|t| (t.at, !matches!(t.event, EngineEvent::PortAdded { .. })));
        timeline
    }
}

/// [`MediaEngine`] driven by an [`EngineScript`].
pub struct ScriptedEngine {
    script: EngineScript,
    events: Option<mpsc::Sender<EngineEvent>>,
    root: CancellationToken,
    timelines: HashMap<String, CancellationToken>,
    end_of_stream: Option<CancellationToken>,
}

impl ScriptedEngine {
    pub fn new(script: EngineScript) -> Self {
        Self {
            script,
            events: None,
            root: CancellationToken::new(),
            timelines: HashMap::new(),
            end_of_stream: None,
        }
    }

    pub const fn script(&self) -> &EngineScript {
        &self.script
    }

    fn play(&mut self, node: &Node, events: mpsc::Sender<EngineEvent>) {
        if self.timelines.contains_key(node.name()) {
            return;
        }
        let token = self.root.child_token();
        self.timelines.insert(node.name().to_string(), token.clone());

        let timeline = self.script.timeline(node.name());
        if !timeline.is_empty() {
            tracing::debug!(node = %node.name(), events = timeline.len(), "Starting scripted timeline");
            tokio::spawn(run_timeline(timeline, events.clone(), token));
        }

        if self.end_of_stream.is_none() {
            if let Some(after) = self.script.end_of_stream_after_ms {
                let token = self.root.child_token();
                self.end_of_stream = Some(token.clone());
                let timeline = vec![Timed { at: Duration::from_millis(after), event: EngineEvent::EndOfStream }];
                tokio::spawn(run_timeline(timeline, events, token));
            }
        }
    }

    fn stop(&mut self, node: &Node) {
        if let Some(token) = self.timelines.remove(node.name()) {
            token.cancel();
        }
        if self.timelines.is_empty() {
            if let Some(token) = self.end_of_stream.take() {
                token.cancel();
            }
        }
    }
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new(EngineScript::default())
    }
}

impl Drop for ScriptedEngine {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

#[async_trait]
impl MediaEngine for ScriptedEngine {
    fn start(&mut self, events: mpsc::Sender<EngineEvent>) {
        self.events = Some(events);
    }

    async fn request_state_change(&mut self, node: &Node, target: &GraphState) -> Result<(), LinkError> {
        match target {
            GraphState::Playing => {
                if self.script.failing_nodes.iter().any(|n| n == node.name()) {
                    return Err(LinkError::EngineFault(format!(
                        "node '{}' ({}) failed to start",
                        node.name(),
                        node.kind()
                    )));
                }
                let events = self
                    .events
                    .clone()
                    .ok_or_else(|| LinkError::EngineFault("scripted engine was not started".to_string()))?;
                self.play(node, events);
            },
            GraphState::Stopped | GraphState::Error { .. } => self.stop(node),
        }
        Ok(())
    }
}

async fn run_timeline(timeline: Vec<Timed>, events: mpsc::Sender<EngineEvent>, token: CancellationToken) {
    let start = Instant::now();
    for Timed { at, event } in timeline {
        tokio::select! {
            () = token.cancelled() => return,
            () = tokio::time::sleep_until(start + at) => {},
        }
        if events.send(event).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(node: &str, port: &str, media_type: &str, delay_ms: u64) -> ScriptedPort {
        ScriptedPort {
            node: node.to_string(),
            port: port.to_string(),
            media_type: Some(media_type.to_string()),
            delay_ms,
            negotiate_after_ms: None,
        }
    }

    #[test]
    fn test_timeline_orders_by_offset() {
        let script = EngineScript {
            discoveries: vec![
                port("source", "src_1", "audio/x-raw", 20),
                port("source", "src_0", "video/x-raw", 10),
                port("other", "src_0", "video/x-raw", 0),
            ],
            ..EngineScript::default()
        };

        let names: Vec<_> = script
            .timeline("source")
            .into_iter()
            .map(|t| match t.event {
                EngineEvent::PortAdded { port, .. } => port.name,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(names, vec!["src_0", "src_1"]);
    }

    #[test]
    fn test_negotiation_follows_announcement() {
        let mut discovery = port("source", "src_0", "video/x-raw", 5);
        discovery.negotiate_after_ms = Some(0);
        let script = EngineScript { discoveries: vec![discovery], ..EngineScript::default() };

        let timeline = script.timeline("source");
        assert_eq!(timeline.len(), 2);
        assert!(matches!(
            &timeline[0].event,
            EngineEvent::PortAdded { port, .. } if port.media_type.is_none()
        ));
        assert!(matches!(&timeline[1].event, EngineEvent::MediaTypeDecided { .. }));
    }

    #[test]
    fn test_script_deserializes_with_defaults() {
        let script: EngineScript = serde_json::from_str(
            r#"{"discoveries":[{"node":"source","port":"src_0","media_type":"video/x-raw"}]}"#,
        )
        .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(script.discoveries[0].delay_ms, 0);
        assert_eq!(script.end_of_stream_after_ms, None);
        assert!(script.failing_nodes.is_empty());
    }
}
