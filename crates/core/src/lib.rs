// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! PadLink Core - Graph model for dynamically linked media pipelines.
//!
//! This crate defines the data structures the engine mutates:
//!
//! ## Core Modules
//!
//! - [`graph`]: The owning container of nodes and links, plus the run-state gate
//! - [`node`]: Nodes and their declarative specs
//! - [`ports`]: Port identity, direction, presence and peers
//! - [`media_type`]: Media type descriptors and category filters
//! - [`state`]: Graph run-state machine
//! - [`snapshot`]: Detached topology copies and DOT rendering
//! - [`error`]: Link error taxonomy
//!
//! ## Quick Start
//!
//! ```
//! use padlink_core::{Graph, GraphState, NodeSpec, PortId, PortSpec};
//!
//! let mut graph = Graph::new("demo");
//! graph.add_node(NodeSpec::new("convert", "videoconvert")
//!     .with_port(PortSpec::input("sink"))
//!     .with_port(PortSpec::output("src")))?;
//! graph.add_node(NodeSpec::new("sink", "autovideosink").with_port(PortSpec::input("sink")))?;
//! graph.link_nodes("convert", "sink")?;
//!
//! // convert.sink will be fed at runtime.
//! graph.defer_link(&PortId::new("convert", "sink"))?;
//! graph.set_state(GraphState::Playing)?;
//! # Ok::<(), padlink_core::LinkError>(())
//! ```

pub mod error;
pub mod graph;
pub mod media_type;
pub mod node;
pub mod ports;
pub mod snapshot;
pub mod state;

pub use error::{LinkError, Result};
pub use graph::{Graph, Link};
pub use media_type::{CategoryFilter, MediaType};
pub use node::{Node, NodeSpec};
pub use ports::{Port, PortDirection, PortId, PortPresence, PortSpec};
pub use snapshot::{DotDetails, GraphSnapshot, NodeSnapshot, PortSnapshot};
pub use state::{GraphState, GraphStateUpdate};
