// SPDX-FileCopyrightText: © 2025 PadLink Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Shared channel capacities for the pipeline actor.
//!
//! The application config references these as its defaults so that library and
//! binary agree on the out-of-the-box values.

/// Default buffer size for the control channel (add/link/state requests).
///
/// Setup traffic comes in short bursts while the host builds the graph.
pub const DEFAULT_CONTROL_CAPACITY: usize = 64;

/// Default buffer size for the media engine event channel.
///
/// Port discoveries and negotiation results queue here until the actor
/// processes them in arrival order.
pub const DEFAULT_EVENT_CAPACITY: usize = 128;

/// Default buffer size for the query channel.
pub const DEFAULT_QUERY_CAPACITY: usize = 16;

/// Default buffer size for state subscriber channels.
pub const DEFAULT_SUBSCRIBER_CHANNEL_CAPACITY: usize = 32;

/// How long `shutdown_and_wait` waits for the actor before giving up.
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;
