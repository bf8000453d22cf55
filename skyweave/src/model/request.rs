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

//! Service requests, SR-policies, regions, domains and preemption records.

use crate::model::types::{DomainId, NodeId, PolicyId, RegionId, SrId};
use crate::time::{TimeInterval, Timestamp};

/// Bandwidth and validity requirements of a service request.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRequirements {
    /// Requested bandwidth in bit/s.
    pub requested_bps: u64,
    /// Minimum acceptable bandwidth in bit/s.
    pub min_bps: u64,
    /// Interval during which the request wants connectivity.
    pub validity: TimeInterval,
}

/// Provisioning status of a service request, maintained by the scheduler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SrStatus {
    /// Whether the request currently has a provisioned path.
    pub provisioned_now: bool,
    /// History of intervals during which the request was (or will be) provisioned.
    pub provisioned_intervals: Vec<TimeInterval>,
}

/// A demand for end-to-end connectivity between two nodes.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    /// Unique request identifier.
    pub id: SrId,
    /// Source node.
    pub src: NodeId,
    /// Destination node.
    pub dst: NodeId,
    /// Priority. Larger values are more important and may preempt smaller ones.
    pub priority: i32,
    /// Bandwidth and validity requirements.
    pub flow: FlowRequirements,
    /// Whether the request tolerates store-and-forward delivery.
    pub disruption_tolerant: bool,
    /// SR-policy the path must follow, if any.
    pub policy: Option<PolicyId>,
    /// Domain of the source node, for cross-domain requests.
    pub source_domain: Option<DomainId>,
    /// Domain of the destination node, for cross-domain requests.
    pub dest_domain: Option<DomainId>,
    /// Opaque token presented to the peer domain when requesting a federated path segment.
    pub federation_token: Option<String>,
    /// Current provisioning status.
    pub status: SrStatus,
}

impl ServiceRequest {
    /// Returns true if source and destination lie in different domains.
    pub fn is_cross_domain(&self) -> bool {
        match (&self.source_domain, &self.dest_domain) {
            (Some(src), Some(dst)) => src != dst,
            (None, Some(_)) => true,
            _ => false,
        }
    }
}

/// An explicit ordered list of waypoints that a service request's path must follow.
#[derive(Debug, Clone)]
pub struct SrPolicy {
    /// Unique policy identifier.
    pub id: PolicyId,
    /// The node at which the policy terminates. Must equal the final segment and the service
    /// request's destination.
    pub endpoint: NodeId,
    /// Ordered waypoint nodes. Each segment names the next waypoint to reach.
    pub segments: Vec<NodeId>,
}

/// A named set of nodes used as a path endpoint ("any node in this region").
#[derive(Debug, Clone)]
pub struct Region {
    /// Unique region identifier.
    pub id: RegionId,
    /// Member nodes.
    pub members: Vec<NodeId>,
}

/// A scheduling domain. A single controller is authoritative per domain; traffic to another
/// domain is handed over at the domain's border node.
#[derive(Debug, Clone)]
pub struct Domain {
    /// Unique domain identifier.
    pub id: DomainId,
    /// The node at which cross-domain traffic enters or leaves this domain.
    pub border_node: NodeId,
}

/// Audit record written whenever a request loses its resources to a higher-priority request.
#[derive(Debug, Clone, PartialEq)]
pub struct PreemptionRecord {
    /// The request that was preempted.
    pub sr: SrId,
    /// The higher-priority request that displaced it.
    pub preempted_by: SrId,
    /// When the preemption happened.
    pub at: Timestamp,
    /// Human-readable reason.
    pub reason: String,
}
