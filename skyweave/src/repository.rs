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

//! # Scenario repository
//!
//! The repository holds the scenario state the controller plans against: nodes, interfaces,
//! links, transceiver models, service requests, SR-policies, regions, domains and the raw
//! bandwidth, power and storage counters. The scheduler consumes it through the [`Repository`]
//! trait only; [`MemoryRepository`] is the in-process implementation used by tests and
//! single-process deployments.

use crate::model::{
    AgentId, Domain, DomainId, EntryId, Interface, InterfaceId, Link, LinkId, ModelId, Node,
    NodeId, PolicyId, Region, RegionId, ServiceRequest, SrId, SrPolicy, SrStatus,
    TransceiverModel,
};

use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

/// Errors returned by repository accessors.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum RepositoryError {
    /// The node does not exist.
    #[error("Node was not found: {0}")]
    NodeNotFound(NodeId),
    /// The link does not exist.
    #[error("Link was not found: {0}")]
    LinkNotFound(LinkId),
    /// No interface matches the given identifier.
    #[error("Interface was not found: {0}")]
    InterfaceNotFound(String),
    /// A bare interface identifier matches interfaces on several nodes.
    #[error("Interface identifier is ambiguous: {0}")]
    AmbiguousInterface(String),
    /// The service request does not exist.
    #[error("Service request was not found: {0}")]
    RequestNotFound(SrId),
    /// The SR-policy does not exist.
    #[error("SR-policy was not found: {0}")]
    PolicyNotFound(PolicyId),
    /// The region does not exist.
    #[error("Region was not found: {0}")]
    RegionNotFound(RegionId),
    /// The domain does not exist.
    #[error("Domain was not found: {0}")]
    DomainNotFound(DomainId),
    /// No node is registered for the agent.
    #[error("Agent is not registered: {0}")]
    AgentNotFound(AgentId),
}

/// Read-mostly snapshot of the interface and transceiver tables, with identifier resolution.
///
/// Interface identifiers may be stored bare (`"wl0"`) or parent-qualified (`"sat-1/wl0"`).
/// [`NetworkKb::resolve_interface`] accepts either form: it tries an exact match first, then the
/// parent-qualified form (when a parent node is given), then an unambiguous bare match across all
/// nodes.
#[derive(Debug, Clone)]
pub struct NetworkKb {
    interfaces: HashMap<InterfaceId, Interface>,
    models: HashMap<ModelId, TransceiverModel>,
}

impl NetworkKb {
    /// The transceiver model driving the given interface, if one is referenced.
    pub fn model_for(&self, iface: &Interface) -> Option<&TransceiverModel> {
        iface.transceiver_model.as_ref().and_then(|m| self.models.get(m))
    }

    /// Resolve an interface identifier: exact match, then parent-qualified, then unambiguous
    /// bare local id.
    pub fn resolve_interface(
        &self,
        raw: &str,
        parent: Option<&NodeId>,
    ) -> Result<&Interface, RepositoryError> {
        let exact = InterfaceId(raw.to_string());
        if let Some(iface) = self.interfaces.get(&exact) {
            return Ok(iface);
        }
        if let Some(node) = parent {
            let qualified = InterfaceId::qualified(node, raw);
            if let Some(iface) = self.interfaces.get(&qualified) {
                return Ok(iface);
            }
        }
        let mut matches = self.interfaces.values().filter(|i| i.id.local() == raw);
        match (matches.next(), matches.next()) {
            (Some(iface), None) => Ok(iface),
            (Some(_), Some(_)) => Err(RepositoryError::AmbiguousInterface(raw.to_string())),
            (None, _) => Err(RepositoryError::InterfaceNotFound(raw.to_string())),
        }
    }

    /// The two endpoint interfaces of a link, in (A, B) order.
    pub fn link_endpoints(&self, link: &Link) -> Result<(&Interface, &Interface), RepositoryError> {
        let a = self.resolve_interface(&link.iface_a.0, None)?;
        let b = self.resolve_interface(&link.iface_b.0, None)?;
        Ok((a, b))
    }
}

/// Typed accessors over the scenario state, consumed by the scheduler and the control plane.
///
/// All methods take `&self`; implementations are internally synchronized. The bandwidth, power
/// and storage methods are *raw counters*; capacity policy (caps, rollback, preemption) lives in
/// the [resource ledger](crate::ledger::ResourceLedger).
pub trait Repository: Send + Sync {
    /// All links of the scenario.
    fn list_links(&self) -> Vec<Link>;
    /// Look up one link.
    fn get_link(&self, id: &LinkId) -> Result<Link, RepositoryError>;
    /// Replace a link.
    fn update_link(&self, link: Link) -> Result<(), RepositoryError>;

    /// All service requests of the scenario.
    fn list_service_requests(&self) -> Vec<ServiceRequest>;
    /// Look up one service request.
    fn get_service_request(&self, id: &SrId) -> Result<ServiceRequest, RepositoryError>;
    /// Replace a service request (typically to update its status block).
    fn update_service_request(&self, sr: ServiceRequest) -> Result<(), RepositoryError>;
    /// The status block of a service request.
    fn get_service_request_status(&self, id: &SrId) -> Result<SrStatus, RepositoryError>;

    /// All nodes of the scenario.
    fn list_nodes(&self) -> Vec<Node>;
    /// Look up one node.
    fn get_node(&self, id: &NodeId) -> Result<Node, RepositoryError>;
    /// The interfaces exposed by a node.
    fn interfaces_by_node(&self, node: &NodeId) -> Vec<Interface>;
    /// Snapshot of the interface and transceiver tables.
    fn network_kb(&self) -> NetworkKb;

    /// Remaining bandwidth of a link: `None` for unlimited links, `Some(max - used)` otherwise.
    fn get_available_bandwidth(&self, link: &LinkId) -> Result<Option<u64>, RepositoryError>;
    /// Add to a link's used-bandwidth counter.
    fn reserve_bandwidth(&self, link: &LinkId, bps: u64) -> Result<(), RepositoryError>;
    /// Subtract from a link's used-bandwidth counter.
    fn release_bandwidth(&self, link: &LinkId, bps: u64) -> Result<(), RepositoryError>;

    /// Record an RF-power allocation on an interface, keyed by entry id.
    fn allocate_power(
        &self,
        iface: &InterfaceId,
        entry: &EntryId,
        watts: f64,
    ) -> Result<(), RepositoryError>;
    /// Remove an RF-power allocation.
    fn release_power(
        &self,
        iface: &InterfaceId,
        entry: &EntryId,
    ) -> Result<(), RepositoryError>;

    /// Add to a node's used-storage counter.
    fn reserve_storage(&self, node: &NodeId, bytes: u64) -> Result<(), RepositoryError>;
    /// Subtract from a node's used-storage counter.
    fn release_storage(&self, node: &NodeId, bytes: u64) -> Result<(), RepositoryError>;
    /// Bytes of storage currently in use on a node.
    fn get_storage_usage(&self, node: &NodeId) -> Result<u64, RepositoryError>;

    /// Look up an SR-policy.
    fn get_sr_policy(&self, id: &PolicyId) -> Result<SrPolicy, RepositoryError>;
    /// Record that a policy has been installed at a node.
    fn install_sr_policy(&self, node: &NodeId, policy: &SrPolicy) -> Result<(), RepositoryError>;
    /// Create a region.
    fn create_region(&self, region: Region) -> Result<(), RepositoryError>;
    /// Look up a region.
    fn get_region(&self, id: &RegionId) -> Result<Region, RepositoryError>;
    /// The domain a node belongs to, if any.
    fn get_domain_for_node(&self, node: &NodeId) -> Result<Option<Domain>, RepositoryError>;
    /// Look up a domain.
    fn get_domain(&self, id: &DomainId) -> Result<Domain, RepositoryError>;

    /// The node managed by an agent.
    fn agent_node(&self, agent: &AgentId) -> Result<NodeId, RepositoryError>;
    /// The agent managing a node, if one is registered.
    fn agent_for_node(&self, node: &NodeId) -> Option<AgentId>;
}

#[derive(Debug, Default)]
struct RepoState {
    nodes: HashMap<NodeId, Node>,
    interfaces: HashMap<InterfaceId, Interface>,
    links: HashMap<LinkId, Link>,
    models: HashMap<ModelId, TransceiverModel>,
    requests: HashMap<SrId, ServiceRequest>,
    policies: HashMap<PolicyId, SrPolicy>,
    installed_policies: HashMap<NodeId, Vec<PolicyId>>,
    regions: HashMap<RegionId, Region>,
    domains: HashMap<DomainId, Domain>,
    node_domains: HashMap<NodeId, DomainId>,
    agents: HashMap<AgentId, NodeId>,
    bandwidth_used: HashMap<LinkId, u64>,
    power: HashMap<InterfaceId, HashMap<EntryId, f64>>,
    storage_used: HashMap<NodeId, u64>,
}

/// In-memory [`Repository`] backed by hash maps under a single mutex.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    state: Mutex<RepoState>,
}

impl MemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node.
    pub fn add_node(&self, node: Node) {
        self.state.lock().unwrap().nodes.insert(node.id.clone(), node);
    }

    /// Insert an interface.
    pub fn add_interface(&self, iface: Interface) {
        self.state.lock().unwrap().interfaces.insert(iface.id.clone(), iface);
    }

    /// Insert a link.
    pub fn add_link(&self, link: Link) {
        self.state.lock().unwrap().links.insert(link.id.clone(), link);
    }

    /// Insert a transceiver model.
    pub fn add_model(&self, model: TransceiverModel) {
        self.state.lock().unwrap().models.insert(model.id.clone(), model);
    }

    /// Insert a service request.
    pub fn add_service_request(&self, sr: ServiceRequest) {
        self.state.lock().unwrap().requests.insert(sr.id.clone(), sr);
    }

    /// Insert an SR-policy.
    pub fn add_sr_policy(&self, policy: SrPolicy) {
        self.state.lock().unwrap().policies.insert(policy.id.clone(), policy);
    }

    /// Insert a domain.
    pub fn add_domain(&self, domain: Domain) {
        self.state.lock().unwrap().domains.insert(domain.id.clone(), domain);
    }

    /// Assign a node to a domain.
    pub fn assign_domain(&self, node: NodeId, domain: DomainId) {
        self.state.lock().unwrap().node_domains.insert(node, domain);
    }

    /// Register an agent as the manager of a node.
    pub fn register_agent(&self, agent: AgentId, node: NodeId) {
        self.state.lock().unwrap().agents.insert(agent, node);
    }

    /// The policies recorded as installed on a node, in installation order.
    pub fn installed_policies(&self, node: &NodeId) -> Vec<PolicyId> {
        self.state.lock().unwrap().installed_policies.get(node).cloned().unwrap_or_default()
    }
}

impl Repository for MemoryRepository {
    fn list_links(&self) -> Vec<Link> {
        let mut links: Vec<Link> = self.state.lock().unwrap().links.values().cloned().collect();
        links.sort_by(|a, b| a.id.cmp(&b.id));
        links
    }

    fn get_link(&self, id: &LinkId) -> Result<Link, RepositoryError> {
        self.state
            .lock()
            .unwrap()
            .links
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::LinkNotFound(id.clone()))
    }

    fn update_link(&self, link: Link) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if !state.links.contains_key(&link.id) {
            return Err(RepositoryError::LinkNotFound(link.id));
        }
        state.links.insert(link.id.clone(), link);
        Ok(())
    }

    fn list_service_requests(&self) -> Vec<ServiceRequest> {
        let mut srs: Vec<ServiceRequest> =
            self.state.lock().unwrap().requests.values().cloned().collect();
        srs.sort_by(|a, b| a.id.cmp(&b.id));
        srs
    }

    fn get_service_request(&self, id: &SrId) -> Result<ServiceRequest, RepositoryError> {
        self.state
            .lock()
            .unwrap()
            .requests
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::RequestNotFound(id.clone()))
    }

    fn update_service_request(&self, sr: ServiceRequest) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if !state.requests.contains_key(&sr.id) {
            return Err(RepositoryError::RequestNotFound(sr.id));
        }
        state.requests.insert(sr.id.clone(), sr);
        Ok(())
    }

    fn get_service_request_status(&self, id: &SrId) -> Result<SrStatus, RepositoryError> {
        Ok(self.get_service_request(id)?.status)
    }

    fn list_nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self.state.lock().unwrap().nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    fn get_node(&self, id: &NodeId) -> Result<Node, RepositoryError> {
        self.state
            .lock()
            .unwrap()
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::NodeNotFound(id.clone()))
    }

    fn interfaces_by_node(&self, node: &NodeId) -> Vec<Interface> {
        let mut ifaces: Vec<Interface> = self
            .state
            .lock()
            .unwrap()
            .interfaces
            .values()
            .filter(|i| &i.node == node)
            .cloned()
            .collect();
        ifaces.sort_by(|a, b| a.id.cmp(&b.id));
        ifaces
    }

    fn network_kb(&self) -> NetworkKb {
        let state = self.state.lock().unwrap();
        NetworkKb { interfaces: state.interfaces.clone(), models: state.models.clone() }
    }

    fn get_available_bandwidth(&self, link: &LinkId) -> Result<Option<u64>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let l = state.links.get(link).ok_or_else(|| RepositoryError::LinkNotFound(link.clone()))?;
        match l.capacity() {
            None => Ok(None),
            Some(max) => {
                let used = state.bandwidth_used.get(link).copied().unwrap_or(0);
                Ok(Some(max.saturating_sub(used)))
            }
        }
    }

    fn reserve_bandwidth(&self, link: &LinkId, bps: u64) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if !state.links.contains_key(link) {
            return Err(RepositoryError::LinkNotFound(link.clone()));
        }
        *state.bandwidth_used.entry(link.clone()).or_insert(0) += bps;
        Ok(())
    }

    fn release_bandwidth(&self, link: &LinkId, bps: u64) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if !state.links.contains_key(link) {
            return Err(RepositoryError::LinkNotFound(link.clone()));
        }
        let used = state.bandwidth_used.entry(link.clone()).or_insert(0);
        *used = used.saturating_sub(bps);
        Ok(())
    }

    fn allocate_power(
        &self,
        iface: &InterfaceId,
        entry: &EntryId,
        watts: f64,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if !state.interfaces.contains_key(iface) {
            return Err(RepositoryError::InterfaceNotFound(iface.0.clone()));
        }
        state.power.entry(iface.clone()).or_default().insert(entry.clone(), watts);
        Ok(())
    }

    fn release_power(
        &self,
        iface: &InterfaceId,
        entry: &EntryId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if let Some(allocations) = state.power.get_mut(iface) {
            allocations.remove(entry);
        }
        Ok(())
    }

    fn reserve_storage(&self, node: &NodeId, bytes: u64) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if !state.nodes.contains_key(node) {
            return Err(RepositoryError::NodeNotFound(node.clone()));
        }
        *state.storage_used.entry(node.clone()).or_insert(0) += bytes;
        Ok(())
    }

    fn release_storage(&self, node: &NodeId, bytes: u64) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if !state.nodes.contains_key(node) {
            return Err(RepositoryError::NodeNotFound(node.clone()));
        }
        let used = state.storage_used.entry(node.clone()).or_insert(0);
        *used = used.saturating_sub(bytes);
        Ok(())
    }

    fn get_storage_usage(&self, node: &NodeId) -> Result<u64, RepositoryError> {
        let state = self.state.lock().unwrap();
        if !state.nodes.contains_key(node) {
            return Err(RepositoryError::NodeNotFound(node.clone()));
        }
        Ok(state.storage_used.get(node).copied().unwrap_or(0))
    }

    fn get_sr_policy(&self, id: &PolicyId) -> Result<SrPolicy, RepositoryError> {
        self.state
            .lock()
            .unwrap()
            .policies
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::PolicyNotFound(id.clone()))
    }

    fn install_sr_policy(&self, node: &NodeId, policy: &SrPolicy) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if !state.nodes.contains_key(node) {
            return Err(RepositoryError::NodeNotFound(node.clone()));
        }
        let installed = state.installed_policies.entry(node.clone()).or_default();
        if !installed.contains(&policy.id) {
            installed.push(policy.id.clone());
        }
        Ok(())
    }

    fn create_region(&self, region: Region) -> Result<(), RepositoryError> {
        self.state.lock().unwrap().regions.insert(region.id.clone(), region);
        Ok(())
    }

    fn get_region(&self, id: &RegionId) -> Result<Region, RepositoryError> {
        self.state
            .lock()
            .unwrap()
            .regions
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::RegionNotFound(id.clone()))
    }

    fn get_domain_for_node(&self, node: &NodeId) -> Result<Option<Domain>, RepositoryError> {
        let state = self.state.lock().unwrap();
        if !state.nodes.contains_key(node) {
            return Err(RepositoryError::NodeNotFound(node.clone()));
        }
        Ok(state
            .node_domains
            .get(node)
            .and_then(|d| state.domains.get(d))
            .cloned())
    }

    fn get_domain(&self, id: &DomainId) -> Result<Domain, RepositoryError> {
        self.state
            .lock()
            .unwrap()
            .domains
            .get(id)
            .cloned()
            .ok_or_else(|| RepositoryError::DomainNotFound(id.clone()))
    }

    fn agent_node(&self, agent: &AgentId) -> Result<NodeId, RepositoryError> {
        self.state
            .lock()
            .unwrap()
            .agents
            .get(agent)
            .cloned()
            .ok_or_else(|| RepositoryError::AgentNotFound(agent.clone()))
    }

    fn agent_for_node(&self, node: &NodeId) -> Option<AgentId> {
        let state = self.state.lock().unwrap();
        let mut agents: Vec<&AgentId> =
            state.agents.iter().filter(|(_, n)| *n == node).map(|(a, _)| a).collect();
        agents.sort();
        agents.first().map(|a| (*a).clone())
    }
}
