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

//! Agent sessions: handshake, registry, bounded outgoing queues and token rotation.

use crate::acp::message::{
    AgentMessage, ControllerCommand, EntryAction, ExportMetricsRequest, Token,
};
use crate::acp::transport::AgentConnection;
use crate::acp::{AcpError, AcpMetrics, CommandSink};
use crate::config::ControllerConfig;
use crate::model::{AgentId, EntryId, NodeId};
use crate::repository::Repository;
use crate::time::Timestamp;

use log::*;
use std::collections::HashMap;
use std::sync::mpsc::{sync_channel, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug)]
struct SequenceState {
    token: Token,
    seqno: u64,
}

/// The controller-side state of one agent session.
#[derive(Debug)]
pub struct AgentHandle {
    agent: AgentId,
    node: NodeId,
    /// Outgoing queue sender. `None` once the session is torn down; taking it closes the queue
    /// exactly once and lets the forwarder drain and exit.
    queue: Mutex<Option<SyncSender<ControllerCommand>>>,
    sequence: Mutex<SequenceState>,
}

impl AgentHandle {
    fn new(agent: AgentId, node: NodeId, queue: SyncSender<ControllerCommand>) -> Self {
        Self {
            agent,
            node,
            queue: Mutex::new(Some(queue)),
            sequence: Mutex::new(SequenceState { token: Token::generate(), seqno: 0 }),
        }
    }

    /// The node this agent manages.
    pub fn node(&self) -> &NodeId {
        &self.node
    }

    /// The session's current token.
    pub fn token(&self) -> Token {
        self.sequence.lock().unwrap().token.clone()
    }

    /// Rotate the token and restart sequence numbering.
    fn rotate(&self) -> Token {
        let mut sequence = self.sequence.lock().unwrap();
        sequence.token = Token::generate();
        sequence.seqno = 0;
        sequence.token.clone()
    }

    /// Stamp and enqueue one command. The sequence number is taken under the sequence lock,
    /// immediately before the non-blocking push onto the queue.
    fn enqueue(
        &self,
        build: impl FnOnce(Token, u64) -> ControllerCommand,
    ) -> Result<(), AcpError> {
        let queue = self.queue.lock().unwrap();
        let sender = queue.as_ref().ok_or(AcpError::ConnectionClosed)?;
        let command = {
            let mut sequence = self.sequence.lock().unwrap();
            sequence.seqno += 1;
            build(sequence.token.clone(), sequence.seqno)
        };
        match sender.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(AcpError::QueueFull(self.agent.clone())),
            Err(TrySendError::Disconnected(_)) => Err(AcpError::ConnectionClosed),
        }
    }

    /// Close the outgoing queue. Idempotent.
    fn close_queue(&self) {
        self.queue.lock().unwrap().take();
    }
}

/// The agent control plane: session registry and command fan-out.
pub struct AcpServer {
    repo: Arc<dyn Repository>,
    queue_depth: usize,
    agents: Mutex<HashMap<AgentId, Arc<AgentHandle>>>,
    metrics: Arc<AcpMetrics>,
}

impl AcpServer {
    /// Create a control plane over the given repository.
    pub fn new(repo: Arc<dyn Repository>, config: &ControllerConfig) -> Self {
        Self {
            repo,
            queue_depth: config.agent_queue_depth,
            agents: Mutex::new(HashMap::new()),
            metrics: Arc::new(AcpMetrics::default()),
        }
    }

    /// The control plane's counters.
    pub fn metrics(&self) -> Arc<AcpMetrics> {
        self.metrics.clone()
    }

    /// The current token of an agent's session, if one is open.
    pub fn current_token(&self, agent: &AgentId) -> Option<Token> {
        self.agents.lock().unwrap().get(agent).map(|h| h.token())
    }

    fn handle(&self, agent: &AgentId) -> Result<Arc<AgentHandle>, AcpError> {
        self.agents
            .lock()
            .unwrap()
            .get(agent)
            .cloned()
            .ok_or_else(|| AcpError::NotFound(agent.clone()))
    }

    /// Drive one agent stream until it closes. Blocks the calling thread; the embedding server
    /// dedicates one task per stream.
    ///
    /// The first message must be a `Hello` naming a registered agent. A second session for the
    /// same agent replaces the first one. On any exit path the handle is deregistered, the
    /// outgoing queue is closed exactly once, and the forwarder is joined.
    pub fn serve_connection(&self, mut conn: Box<dyn AgentConnection>) -> Result<(), AcpError> {
        let agent = match conn.recv()? {
            Some(AgentMessage::Hello { agent }) => {
                if agent.0.is_empty() {
                    return Err(AcpError::InvalidArgument("empty agent id in Hello"));
                }
                agent
            }
            Some(_) => return Err(AcpError::InvalidArgument("first message must be Hello")),
            None => return Ok(()),
        };
        let node = self
            .repo
            .agent_node(&agent)
            .map_err(|_| AcpError::NotFound(agent.clone()))?;

        let (queue_tx, queue_rx) = sync_channel(self.queue_depth);
        let handle = Arc::new(AgentHandle::new(agent.clone(), node, queue_tx));
        let prior = self
            .agents
            .lock()
            .unwrap()
            .insert(agent.clone(), handle.clone());
        if let Some(prior) = prior {
            debug!("Replacing prior session of {}", agent);
            prior.close_queue();
        }
        info!("Agent session opened: {} -> {}", agent, handle.node());

        let mut writer = conn.writer();
        let forwarder_agent = agent.clone();
        let forwarder = thread::spawn(move || {
            while let Ok(command) = queue_rx.recv() {
                if let Err(e) = writer.send(command) {
                    warn!("Stream send to {} failed: {}", forwarder_agent, e);
                    break;
                }
            }
        });

        let result = loop {
            match conn.recv() {
                Ok(Some(AgentMessage::Hello { .. })) => {
                    break Err(AcpError::InvalidArgument("duplicate Hello"));
                }
                Ok(Some(AgentMessage::Response { request_id, status })) => {
                    self.metrics.count_response(status.is_ok());
                    if status.is_ok() {
                        debug!("Agent {} executed {}", agent, request_id);
                    } else {
                        warn!(
                            "Agent {} failed {}: {} ({})",
                            agent, request_id, status.message, status.code
                        );
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        // teardown: deregister (unless already replaced), close the queue, drain the forwarder
        {
            let mut agents = self.agents.lock().unwrap();
            if let Some(current) = agents.get(&agent) {
                if Arc::ptr_eq(current, &handle) {
                    agents.remove(&agent);
                }
            }
        }
        handle.close_queue();
        let _ = forwarder.join();
        info!("Agent session closed: {}", agent);
        result
    }

    /// Rotate the token of an agent's session and restart its sequence numbers at zero. The
    /// agent must discard in-flight commands bearing the old token.
    pub fn reset(&self, agent: &AgentId) -> Result<(), AcpError> {
        let handle = self.handle(agent)?;
        let token = handle.rotate();
        info!("Reset {}: new token {}", agent, token);
        Ok(())
    }

    /// Telemetry export endpoint. Accepts any well-formed request and counts it; the samples do
    /// not feed the scheduler.
    pub fn export_metrics(&self, request: ExportMetricsRequest) -> Result<(), AcpError> {
        for series in &request.interfaces {
            if series.interface.0.is_empty() {
                return Err(AcpError::InvalidArgument("empty interface id in metrics export"));
            }
        }
        self.metrics.count_export();
        debug!("Accepted metrics export for {} interfaces", request.interfaces.len());
        Ok(())
    }
}

impl CommandSink for AcpServer {
    fn send_create_entry(
        &self,
        agent: &AgentId,
        entry: &EntryId,
        at: Timestamp,
        action: EntryAction,
    ) -> Result<(), AcpError> {
        let handle = self.handle(agent)?;
        debug!("-> {} create {} ({} at {})", agent, entry, action.name(), at);
        handle.enqueue(|token, seqno| ControllerCommand::CreateEntry {
            entry: entry.clone(),
            at,
            action,
            token,
            seqno,
        })
    }

    fn send_delete_entry(&self, agent: &AgentId, entry: &EntryId) -> Result<(), AcpError> {
        let handle = self.handle(agent)?;
        debug!("-> {} delete {}", agent, entry);
        handle.enqueue(|token, seqno| ControllerCommand::DeleteEntry {
            entry: entry.clone(),
            token,
            seqno,
        })
    }

    fn send_finalize(&self, agent: &AgentId, up_to: Timestamp) -> Result<(), AcpError> {
        let handle = self.handle(agent)?;
        handle.enqueue(|token, seqno| ControllerCommand::Finalize { up_to, token, seqno })
    }

    fn has_agent(&self, agent: &AgentId) -> bool {
        self.agents.lock().unwrap().contains_key(agent)
    }

    fn connected_agents(&self) -> Vec<AgentId> {
        let mut agents: Vec<AgentId> = self.agents.lock().unwrap().keys().cloned().collect();
        agents.sort();
        agents
    }
}
