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

//! Transport abstraction for agent control streams.
//!
//! The control plane is written against [`AgentConnection`] and [`CommandWriter`] so that the
//! actual wire (an RPC stream in production) stays outside the core. [`channel_pair`] provides
//! the in-process transport used by tests and by embedded deployments.

use crate::acp::message::{AgentMessage, ControllerCommand};
use crate::acp::AcpError;

use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};

/// Outbound half of a control stream. Owned by the session's forwarder.
pub trait CommandWriter: Send {
    /// Write one command to the stream. An error means the stream is gone and the session must
    /// be torn down.
    fn send(&mut self, command: ControllerCommand) -> Result<(), AcpError>;
}

/// A single agent control stream as seen by the controller.
pub trait AgentConnection: Send {
    /// Block until the next inbound message. `Ok(None)` means the agent closed the stream.
    fn recv(&mut self) -> Result<Option<AgentMessage>, AcpError>;

    /// Split off the outbound half. Called exactly once, before the first `recv`.
    fn writer(&mut self) -> Box<dyn CommandWriter>;
}

/// In-process [`CommandWriter`] backed by an unbounded channel.
#[derive(Debug)]
pub struct ChannelWriter {
    tx: Sender<ControllerCommand>,
}

impl CommandWriter for ChannelWriter {
    fn send(&mut self, command: ControllerCommand) -> Result<(), AcpError> {
        self.tx.send(command).map_err(|_| AcpError::ConnectionClosed)
    }
}

/// In-process [`AgentConnection`] backed by a pair of unbounded channels.
#[derive(Debug)]
pub struct ChannelConnection {
    inbound: Receiver<AgentMessage>,
    outbound: Sender<ControllerCommand>,
}

impl AgentConnection for ChannelConnection {
    fn recv(&mut self) -> Result<Option<AgentMessage>, AcpError> {
        match self.inbound.recv() {
            Ok(msg) => Ok(Some(msg)),
            // agent endpoint dropped: clean close
            Err(_) => Ok(None),
        }
    }

    fn writer(&mut self) -> Box<dyn CommandWriter> {
        Box::new(ChannelWriter { tx: self.outbound.clone() })
    }
}

/// The agent's end of an in-process control stream.
#[derive(Debug)]
pub struct AgentEndpoint {
    tx: Sender<AgentMessage>,
    rx: Receiver<ControllerCommand>,
}

impl AgentEndpoint {
    /// Send a message to the controller.
    pub fn send(&self, msg: AgentMessage) -> Result<(), AcpError> {
        self.tx.send(msg).map_err(|_| AcpError::ConnectionClosed)
    }

    /// Block until the next command from the controller arrives, or the stream closes.
    pub fn recv(&self) -> Option<ControllerCommand> {
        self.rx.recv().ok()
    }

    /// Fetch the next command without blocking.
    pub fn try_recv(&self) -> Option<ControllerCommand> {
        match self.rx.try_recv() {
            Ok(cmd) => Some(cmd),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Drain every command currently queued on the stream.
    pub fn drain(&self) -> Vec<ControllerCommand> {
        let mut commands = Vec::new();
        while let Some(cmd) = self.try_recv() {
            commands.push(cmd);
        }
        commands
    }
}

/// Create a connected in-process stream: the controller side and the agent side.
pub fn channel_pair() -> (ChannelConnection, AgentEndpoint) {
    let (agent_tx, controller_rx) = channel();
    let (controller_tx, agent_rx) = channel();
    (
        ChannelConnection { inbound: controller_rx, outbound: controller_tx },
        AgentEndpoint { tx: agent_tx, rx: agent_rx },
    )
}
