// Skyweave: Scheduling Beams and Routes Across Constellation Networks
// Copyright (C) 2021  Tibor Schneider
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! # Agent control plane
//!
//! One long-lived bidirectional stream per agent. The first inbound message must be a
//! [`AgentMessage::Hello`](message::AgentMessage); after the handshake, the controller pushes
//! time-stamped configuration commands through a bounded per-agent queue while a dedicated
//! forwarder thread delivers them to the stream. Every command is stamped with the session's
//! manipulation token and a strictly increasing sequence number; a server-side
//! [`AcpServer::reset`](session::AcpServer) rotates the token and restarts numbering.
//!
//! The scheduler consumes the control plane through the narrow [`CommandSink`] capability so
//! that tests can substitute a fake.

pub mod message;
pub mod session;
pub mod transport;

pub use message::{
    AgentMessage, BeamSpec, ControllerCommand, EntryAction, ExportMetricsRequest,
    InterfaceMetrics, ResponseStatus, RouteSpec, Token,
};
pub use session::AcpServer;
pub use transport::{channel_pair, AgentConnection, AgentEndpoint, CommandWriter};

use crate::model::{AgentId, EntryId};
use crate::time::Timestamp;

use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Errors of the agent control plane.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum AcpError {
    /// A malformed message: wrong first message, duplicate Hello, or empty agent id.
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The agent has no open session.
    #[error("Agent is not connected: {0}")]
    NotFound(AgentId),
    /// The agent's outgoing queue is full.
    #[error("Outgoing queue of {0} is full")]
    QueueFull(AgentId),
    /// A command carries a token that has been rotated away.
    #[error("Command carries a stale token")]
    StaleToken,
    /// The underlying stream is closed.
    #[error("Stream is closed")]
    ConnectionClosed,
    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Narrow capability set the scheduler uses to talk to agents.
pub trait CommandSink: Send + Sync {
    /// Schedule an entry at an agent.
    fn send_create_entry(
        &self,
        agent: &AgentId,
        entry: &EntryId,
        at: Timestamp,
        action: EntryAction,
    ) -> Result<(), AcpError>;

    /// Withdraw an entry from an agent.
    fn send_delete_entry(&self, agent: &AgentId, entry: &EntryId) -> Result<(), AcpError>;

    /// Send a finalize watermark to an agent.
    fn send_finalize(&self, agent: &AgentId, up_to: Timestamp) -> Result<(), AcpError>;

    /// Whether the agent currently has an open session.
    fn has_agent(&self, agent: &AgentId) -> bool;

    /// All agents with an open session, sorted by id.
    fn connected_agents(&self) -> Vec<AgentId>;
}

/// Counters exposed by the control plane.
#[derive(Debug, Default)]
pub struct AcpMetrics {
    responses_ok: AtomicU64,
    responses_err: AtomicU64,
    metric_exports: AtomicU64,
}

impl AcpMetrics {
    pub(crate) fn count_response(&self, ok: bool) {
        if ok {
            self.responses_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.responses_err.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn count_export(&self) {
        self.metric_exports.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of successful agent responses seen.
    pub fn responses_ok(&self) -> u64 {
        self.responses_ok.load(Ordering::Relaxed)
    }

    /// Number of failed agent responses seen.
    pub fn responses_err(&self) -> u64 {
        self.responses_err.load(Ordering::Relaxed)
    }

    /// Number of telemetry export calls accepted.
    pub fn metric_exports(&self) -> u64 {
        self.metric_exports.load(Ordering::Relaxed)
    }
}
