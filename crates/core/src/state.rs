// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Graph run-state machine.
//!
//! ```text
//!     Stopped ──► Playing ──► Stopped (teardown)
//!                    │
//!                    ▼
//!                  Error ──► Stopped (explicit reset)
//! ```
//!
//! ### Valid Transitions:
//! - `Stopped` → `Playing` (all static ports linked)
//! - `Playing` → `Stopped` (teardown, releases all nodes)
//! - `Playing` → `Error` (unrecoverable engine or link failure)
//! - `Error` → `Stopped` (explicit reset, releases all nodes)
//! - Any state → the same state (no-op)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Run state of a graph.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphState {
    #[default]
    Stopped,
    Playing,
    /// Entered after an unrecoverable failure. Only `Stopped` leaves it.
    Error { reason: String },
}

impl GraphState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Playing => "playing",
            Self::Error { .. } => "error",
        }
    }

    /// True when `self` and `other` are the same variant, ignoring error reasons.
    pub const fn same_kind(&self, other: &Self) -> bool {
        matches!(
            (self, other),
            (Self::Stopped, Self::Stopped)
                | (Self::Playing, Self::Playing)
                | (Self::Error { .. }, Self::Error { .. })
        )
    }

    /// Whether the state machine allows moving from `self` to `target`.
    pub const fn can_transition_to(&self, target: &Self) -> bool {
        if self.same_kind(target) {
            return true;
        }
        matches!(
            (self, target),
            (Self::Stopped, Self::Playing)
                | (Self::Playing, Self::Stopped | Self::Error { .. })
                | (Self::Error { .. }, Self::Stopped)
        )
    }
}

impl fmt::Display for GraphState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error { reason } => write!(f, "error ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// A state change published by the pipeline actor.
#[derive(Debug, Clone)]
pub struct GraphStateUpdate {
    pub graph: String,
    pub state: GraphState,
    pub timestamp: SystemTime,
}

impl GraphStateUpdate {
    /// Creates a new state update with the current timestamp.
    #[inline]
    pub fn new(graph: String, state: GraphState) -> Self {
        Self { graph, state, timestamp: SystemTime::now() }
    }
}
