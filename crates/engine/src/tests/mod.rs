// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Unit tests for the engine crate.

use crate::diagnostics::SnapshotSink;
use padlink_core::GraphSnapshot;
use std::sync::Mutex;

mod dynamic_binding;
mod lifecycle;

/// Sink that remembers which snapshots were requested.
#[derive(Default)]
pub(super) struct RecordingSink {
    calls: Mutex<Vec<(String, bool, usize)>>,
}

impl RecordingSink {
    /// `(label, timestamped, link_count)` per request, in order.
    pub(super) fn calls(&self) -> Vec<(String, bool, usize)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub(super) fn labels(&self) -> Vec<String> {
        self.calls().into_iter().map(|(label, _, _)| label).collect()
    }
}

impl SnapshotSink for RecordingSink {
    fn snapshot(&self, snapshot: &GraphSnapshot, label: &str, timestamped: bool) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((label.to_string(), timestamped, snapshot.link_count()));
        }
    }
}

pub(super) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
