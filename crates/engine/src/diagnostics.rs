// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Snapshot sinks: where graph snapshots go when someone asks for one.
//!
//! Writing diagnostics must never affect the pipeline, so sinks have no error
//! return. Failures are logged and dropped.

use async_trait::async_trait;
use padlink_core::{DotDetails, GraphSnapshot};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio_util::task::TaskTracker;

/// Receives named graph snapshots.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Records `snapshot` under `label`. When `timestamped` is set, the output name is
    /// prefixed with the time elapsed since the sink was created.
    fn snapshot(&self, snapshot: &GraphSnapshot, label: &str, timestamped: bool);

    /// Waits until every snapshot recorded so far has been persisted.
    async fn flush(&self) {}
}

/// Writes snapshots as Graphviz DOT files into a configured directory.
///
/// Rendering happens on the caller; the file itself is written on tokio's blocking
/// pool when a runtime is available. Without a directory the sink is disabled and
/// every call is a no-op.
#[derive(Debug, Clone)]
pub struct DotFileSink {
    dir: Option<PathBuf>,
    details: DotDetails,
    started: Instant,
    writes: TaskTracker,
}

impl DotFileSink {
    pub fn new(dir: Option<PathBuf>, details: DotDetails) -> Self {
        Self { dir, details, started: Instant::now(), writes: TaskTracker::new() }
    }

    pub fn disabled() -> Self {
        Self::new(None, DotDetails::default())
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// File name for a snapshot, e.g. `initial_state.dot` or
    /// `0.00.01.250000000-pad_linked_state.dot`.
    pub fn file_name(&self, label: &str, timestamped: bool) -> String {
        if timestamped {
            format!("{}-{label}.dot", format_elapsed(self.started.elapsed()))
        } else {
            format!("{label}.dot")
        }
    }
}

impl Default for DotFileSink {
    fn default() -> Self {
        Self::disabled()
    }
}

/// One rendered snapshot waiting to be written.
struct DotWrite {
    dir: PathBuf,
    file_name: String,
    dot: String,
    graph: String,
    label: String,
}

impl DotWrite {
    fn run(self) {
        let result = std::fs::create_dir_all(&self.dir).and_then(|()| {
            let path = self.dir.join(&self.file_name);
            std::fs::write(&path, &self.dot).map(|()| path)
        });
        match result {
            Ok(path) => {
                tracing::info!(
                    graph = %self.graph,
                    path = %path.display(),
                    "Wrote pipeline snapshot, render it with `dot -Tpng {} -o {}.png`",
                    path.display(),
                    self.label
                );
            },
            Err(e) => {
                tracing::warn!(
                    graph = %self.graph,
                    dir = %self.dir.display(),
                    label = %self.label,
                    error = %e,
                    "Failed to write pipeline snapshot"
                );
            },
        }
    }
}

#[async_trait]
impl SnapshotSink for DotFileSink {
    fn snapshot(&self, snapshot: &GraphSnapshot, label: &str, timestamped: bool) {
        let Some(dir) = self.dir.as_deref() else {
            tracing::trace!(label, "Snapshot directory not configured, skipping dump");
            return;
        };
        let write = DotWrite {
            dir: dir.to_path_buf(),
            file_name: self.file_name(label, timestamped),
            dot: snapshot.to_dot(self.details),
            graph: snapshot.graph.clone(),
            label: label.to_string(),
        };

        if tokio::runtime::Handle::try_current().is_ok() {
            let span = tracing::Span::current();
            self.writes.spawn_blocking(move || {
                let _entered = span.enter();
                write.run();
            });
        } else {
            write.run();
        }
    }

    async fn flush(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }
}

/// `H.MM.SS.nnnnnnnnn`, safe for file names on every platform.
fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{}.{:02}.{:02}.{:09}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        elapsed.subsec_nanos()
    )
}
