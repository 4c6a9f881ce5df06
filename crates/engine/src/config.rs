// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Configuration for the pipeline actor.

use crate::constants::{DEFAULT_CONTROL_CAPACITY, DEFAULT_EVENT_CAPACITY};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Channel sizing for a pipeline actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PipelineConfig {
    /// Buffer size for control requests (default: 64).
    pub control_capacity: usize,
    /// Buffer size for media engine events (default: 128).
    /// Discoveries beyond this apply backpressure to the engine.
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { control_capacity: DEFAULT_CONTROL_CAPACITY, event_capacity: DEFAULT_EVENT_CAPACITY }
    }
}
