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

//! Messages exchanged on the agent control stream.
//!
//! The stream is bidirectional: agents send [`AgentMessage`]s upward, the controller sends
//! [`ControllerCommand`]s downward. Every command carries the session's manipulation token and a
//! strictly increasing sequence number; an agent whose token has rotated discards commands
//! bearing the old token.

use crate::model::{AgentId, EntryId, InterfaceId, LinkId, NodeId, PolicyId};
use crate::time::Timestamp;

use rand::Rng;
use std::fmt;

/// Opaque per-session nonce versioning the command stream. Rotating the token invalidates every
/// prior entry at the agent.
#[derive(PartialEq, Eq, Hash, Debug, Clone)]
pub struct Token(pub String);

impl Token {
    /// Generate a fresh 128-bit token, hex encoded.
    pub fn generate() -> Token {
        let bits: u128 = rand::thread_rng().gen();
        Token(format!("{:032x}", bits))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution result reported by an agent. Code zero means success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseStatus {
    /// Numeric status code; zero on success.
    pub code: u32,
    /// Human-readable detail.
    pub message: String,
}

impl ResponseStatus {
    /// A success status.
    pub fn ok() -> Self {
        Self { code: 0, message: String::new() }
    }

    /// An error status with the given code and message.
    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// Whether the status reports success.
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Messages sent by an agent to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentMessage {
    /// Handshake. Must be the first message of a stream, exactly once.
    Hello {
        /// The agent identifying itself.
        agent: AgentId,
    },
    /// Execution response for one previously received command.
    Response {
        /// The entry the response refers to.
        request_id: EntryId,
        /// The execution result.
        status: ResponseStatus,
    },
}

/// Parameters of a beam to point between two link endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamSpec {
    /// The link the beam establishes.
    pub link: LinkId,
    /// The executing agent's node.
    pub local_node: NodeId,
    /// The executing agent's interface.
    pub local_interface: InterfaceId,
    /// The remote node.
    pub remote_node: NodeId,
    /// The remote interface.
    pub remote_interface: InterfaceId,
    /// Transmit power in dBW, read from the transceiver model.
    pub power_dbw: f64,
}

/// Parameters of a route to install or remove.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteSpec {
    /// Destination prefix, in the synthetic `"node:X/32"` form.
    pub prefix: String,
    /// Next-hop node.
    pub next_hop: NodeId,
    /// Local interface to send through.
    pub device: InterfaceId,
}

/// The configuration action carried by a [`ControllerCommand::CreateEntry`].
#[derive(Debug, Clone, PartialEq)]
pub enum EntryAction {
    /// Point a beam.
    UpdateBeam(BeamSpec),
    /// Tear a beam down.
    DeleteBeam(BeamSpec),
    /// Install a route.
    SetRoute(RouteSpec),
    /// Remove a route.
    DeleteRoute(RouteSpec),
    /// Install an SR-policy, referenced by id.
    SetSrPolicy {
        /// The policy to install.
        policy: PolicyId,
    },
    /// Remove an SR-policy.
    DeleteSrPolicy {
        /// The policy to remove.
        policy: PolicyId,
    },
}

impl EntryAction {
    /// Short action name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            EntryAction::UpdateBeam(_) => "update-beam",
            EntryAction::DeleteBeam(_) => "delete-beam",
            EntryAction::SetRoute(_) => "set-route",
            EntryAction::DeleteRoute(_) => "delete-route",
            EntryAction::SetSrPolicy { .. } => "set-sr-policy",
            EntryAction::DeleteSrPolicy { .. } => "delete-sr-policy",
        }
    }
}

/// Commands sent by the controller to an agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerCommand {
    /// Schedule a configuration entry for execution at a given time.
    CreateEntry {
        /// Deterministic entry identifier.
        entry: EntryId,
        /// When the agent executes the action.
        at: Timestamp,
        /// The action to execute.
        action: EntryAction,
        /// The session token.
        token: Token,
        /// The sequence number of this command.
        seqno: u64,
    },
    /// Withdraw a previously scheduled entry.
    DeleteEntry {
        /// The entry to withdraw.
        entry: EntryId,
        /// The session token.
        token: Token,
        /// The sequence number of this command.
        seqno: u64,
    },
    /// Watermark: no further commands with execution time `<= up_to` will arrive.
    Finalize {
        /// The watermark time.
        up_to: Timestamp,
        /// The session token.
        token: Token,
        /// The sequence number of this command.
        seqno: u64,
    },
}

impl ControllerCommand {
    /// The sequence number of the command.
    pub fn seqno(&self) -> u64 {
        match self {
            ControllerCommand::CreateEntry { seqno, .. } => *seqno,
            ControllerCommand::DeleteEntry { seqno, .. } => *seqno,
            ControllerCommand::Finalize { seqno, .. } => *seqno,
        }
    }

    /// The token the command carries.
    pub fn token(&self) -> &Token {
        match self {
            ControllerCommand::CreateEntry { token, .. } => token,
            ControllerCommand::DeleteEntry { token, .. } => token,
            ControllerCommand::Finalize { token, .. } => token,
        }
    }
}

/// One sampled operational-state series of an interface, pushed by telemetry exporters.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceMetrics {
    /// The interface the samples belong to.
    pub interface: InterfaceId,
    /// `(time, value)` samples of the operational state.
    pub operational_state: Vec<(Timestamp, f64)>,
}

/// Payload of the telemetry export endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportMetricsRequest {
    /// The exported series, one per interface.
    pub interfaces: Vec<InterfaceMetrics>,
}
