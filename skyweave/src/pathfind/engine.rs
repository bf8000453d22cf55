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

//! The path engine proper: multi-hop, store-and-forward, SR-policy and region searches.

use crate::contact::ContactWindowIndex;
use crate::model::{DtnHop, DtnPath, Node, NodeId, Path, PathHop, Region, SrPolicy};
use crate::pathfind::graph::{EdgeKind, TimeExpandedGraph};
use crate::pathfind::PathError;
use crate::repository::Repository;
use crate::time::TimeInterval;

use log::*;
use petgraph::graph::EdgeIndex;
use std::sync::Arc;

/// Stateless facade over the time-expanded search. Cheap to clone; path computations for
/// independent service requests may run on separate worker threads.
#[derive(Clone)]
pub struct PathEngine {
    repo: Arc<dyn Repository>,
}

impl PathEngine {
    /// Create an engine reading topology from the given repository.
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    fn check_endpoints(
        &self,
        src: &NodeId,
        dst: &NodeId,
        range: &TimeInterval,
    ) -> Result<(), PathError> {
        if range.is_empty() {
            return Err(PathError::InvalidWindow);
        }
        for node in &[src, dst] {
            if self.repo.get_node(*node).is_err() {
                return Err(PathError::UnknownNode((*node).clone()));
            }
        }
        Ok(())
    }

    /// Shortest multi-hop path from `src` to `dst` within `range`.
    ///
    /// Cost is accumulated traversal and wait seconds; the search starts from every `(src, t)`
    /// vertex with distance zero, so waiting at the source before the first hop is free. A path
    /// with `src == dst` is trivial (no hops).
    pub fn find_path(
        &self,
        contacts: &ContactWindowIndex,
        src: &NodeId,
        dst: &NodeId,
        range: TimeInterval,
    ) -> Result<Path, PathError> {
        self.check_endpoints(src, dst, &range)?;
        if src == dst {
            return Ok(Path::trivial(range.start));
        }

        let kb = self.repo.network_kb();
        let graph = TimeExpandedGraph::build(&*self.repo, &kb, contacts, range, &|_| true);
        let sources = graph.column(src);
        let target_node = dst.clone();
        let found = graph.shortest_path(sources, &|v| v.node == target_node);
        let (edges, cost) = found.ok_or_else(|| PathError::NotFound {
            src: src.clone(),
            dst: dst.clone(),
        })?;

        let hops = self.hops_from_edges(&graph, &edges);
        let valid_from = hops.first().map(|h| h.interval.start).unwrap_or(range.start);
        let valid_until = hops.last().map(|h| h.interval.end).unwrap_or(range.start);
        Ok(Path { hops, total_latency: cost as i64, valid_from, valid_until })
    }

    /// Store-and-forward path from `src` to `dst` for a message of `msg_size` bytes.
    ///
    /// Identical to [`PathEngine::find_path`], except that waiting at a node requires the node
    /// to have at least `msg_size` bytes of free storage, and the result records where and for
    /// how long the message is held before each hop.
    pub fn find_dtn_path(
        &self,
        contacts: &ContactWindowIndex,
        src: &NodeId,
        dst: &NodeId,
        msg_size: u64,
        range: TimeInterval,
    ) -> Result<DtnPath, PathError> {
        self.check_endpoints(src, dst, &range)?;
        if src == dst {
            return Ok(DtnPath { hops: Vec::new(), storage_nodes: Vec::new(), total_delay: 0 });
        }

        let kb = self.repo.network_kb();
        let repo = &self.repo;
        let wait_admitted = |node: &NodeId| -> bool {
            let capacity = match repo.get_node(node) {
                Ok(n) => n.storage_capacity.unwrap_or(0),
                Err(_) => return false,
            };
            let used = repo.get_storage_usage(node).unwrap_or(0);
            capacity.saturating_sub(used) >= msg_size
        };
        let graph =
            TimeExpandedGraph::build(&*self.repo, &kb, contacts, range, &wait_admitted);
        let sources = graph.column(src);
        let target_node = dst.clone();
        let found = graph.shortest_path(sources, &|v| v.node == target_node);
        let (edges, _) = found.ok_or_else(|| PathError::NotFound {
            src: src.clone(),
            dst: dst.clone(),
        })?;

        let mut hops: Vec<DtnHop> = Vec::new();
        let mut pending: Option<(NodeId, crate::time::Timestamp, i64)> = None;
        for edge in &edges {
            let (tail, head) = match graph.graph.edge_endpoints(*edge) {
                Some(endpoints) => endpoints,
                None => continue,
            };
            let tail_v = &graph.graph[tail];
            let head_v = &graph.graph[head];
            match &graph.graph[*edge].kind {
                EdgeKind::Wait => {
                    let held = head_v.time - tail_v.time;
                    match pending {
                        Some((_, _, ref mut duration)) => *duration += held,
                        None => pending = Some((tail_v.node.clone(), tail_v.time, held)),
                    }
                }
                EdgeKind::Traverse(link) => {
                    let hop = PathHop {
                        from: tail_v.node.clone(),
                        to: head_v.node.clone(),
                        link: link.clone(),
                        interval: TimeInterval::new(tail_v.time, head_v.time),
                    };
                    let (storage_node, storage_start, storage_duration) = match pending.take() {
                        Some((node, start, duration)) => (Some(node), Some(start), duration),
                        None => (None, None, 0),
                    };
                    hops.push(DtnHop { hop, storage_node, storage_start, storage_duration });
                }
            }
        }

        let mut storage_nodes: Vec<NodeId> =
            hops.iter().filter_map(|h| h.storage_node.clone()).collect();
        storage_nodes.sort();
        storage_nodes.dedup();
        let arrival = hops.last().map(|h| h.hop.interval.end).unwrap_or(range.start);
        Ok(DtnPath { hops, storage_nodes, total_delay: arrival - range.start })
    }

    /// Path following an SR-policy: the concatenation of per-segment shortest paths.
    ///
    /// The final waypoint must equal both the policy endpoint and `dst`, otherwise the search
    /// fails with [`PathError::PolicyMismatch`]. Each segment search starts where the previous
    /// segment ends.
    pub fn find_policy_path(
        &self,
        contacts: &ContactWindowIndex,
        src: &NodeId,
        dst: &NodeId,
        policy: &SrPolicy,
        range: TimeInterval,
    ) -> Result<Path, PathError> {
        self.check_endpoints(src, dst, &range)?;
        let last = policy.segments.last().ok_or_else(|| {
            PathError::PolicyMismatch(policy.id.clone())
        })?;
        if last != &policy.endpoint || last != dst {
            return Err(PathError::PolicyMismatch(policy.id.clone()));
        }

        let mut hops: Vec<PathHop> = Vec::new();
        let mut total_latency = 0;
        let mut cursor = src.clone();
        let mut window_start = range.start;
        for waypoint in &policy.segments {
            let segment = self.find_path(
                contacts,
                &cursor,
                waypoint,
                TimeInterval::new(window_start, range.end),
            )?;
            total_latency += segment.total_latency;
            window_start = segment.hops.last().map(|h| h.interval.end).unwrap_or(window_start);
            hops.extend(segment.hops);
            cursor = waypoint.clone();
        }
        debug!("Policy {} expanded to {} hops", policy.id, hops.len());

        let valid_from = hops.first().map(|h| h.interval.start).unwrap_or(range.start);
        let valid_until = hops.last().map(|h| h.interval.end).unwrap_or(range.start);
        Ok(Path { hops, total_latency, valid_from, valid_until })
    }

    /// Pick the region member nearest to `other` (by configured coordinates) and return the
    /// shortest path between them. With `toward_region`, the path runs from `other` into the
    /// region; otherwise from the region to `other`.
    pub fn find_region_path(
        &self,
        contacts: &ContactWindowIndex,
        region: &Region,
        other: &NodeId,
        toward_region: bool,
        range: TimeInterval,
    ) -> Result<Path, PathError> {
        let member = self.nearest_member(region, other)?;
        if toward_region {
            self.find_path(contacts, other, &member, range)
        } else {
            self.find_path(contacts, &member, other, range)
        }
    }

    /// The region member nearest to `other` by Euclidean distance on node coordinates. Members
    /// without coordinates sort last; ties and coordinate-free scenarios fall back to id order.
    pub fn nearest_member(&self, region: &Region, other: &NodeId) -> Result<NodeId, PathError> {
        if region.members.is_empty() {
            return Err(PathError::EmptyRegion(region.id.clone()));
        }
        let reference = self.repo.get_node(other).map_err(|_| {
            PathError::UnknownNode(other.clone())
        })?;
        let mut members: Vec<Node> = Vec::new();
        for member in &region.members {
            match self.repo.get_node(member) {
                Ok(node) => members.push(node),
                Err(_) => return Err(PathError::UnknownNode(member.clone())),
            }
        }
        members.sort_by(|a, b| {
            let da = distance(&reference, a);
            let db = distance(&reference, b);
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal).then(a.id.cmp(&b.id))
        });
        Ok(members[0].id.clone())
    }

    fn hops_from_edges(&self, graph: &TimeExpandedGraph, edges: &[EdgeIndex]) -> Vec<PathHop> {
        let mut hops = Vec::new();
        for edge in edges {
            if let EdgeKind::Traverse(link) = &graph.graph[*edge].kind {
                if let Some((tail, head)) = graph.graph.edge_endpoints(*edge) {
                    let tail_v = &graph.graph[tail];
                    let head_v = &graph.graph[head];
                    hops.push(PathHop {
                        from: tail_v.node.clone(),
                        to: head_v.node.clone(),
                        link: link.clone(),
                        interval: TimeInterval::new(tail_v.time, head_v.time),
                    });
                }
            }
        }
        hops
    }
}

fn distance(a: &Node, b: &Node) -> f64 {
    match (a.coordinates, b.coordinates) {
        (Some(ca), Some(cb)) => {
            let dx = ca[0] - cb[0];
            let dy = ca[1] - cb[1];
            let dz = ca[2] - cb[2];
            (dx * dx + dy * dy + dz * dz).sqrt()
        }
        _ => f64::INFINITY,
    }
}
