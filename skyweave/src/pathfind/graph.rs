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

//! Construction of the time-expanded graph and the shortest-path search over it.

use crate::contact::ContactWindowIndex;
use crate::model::{LinkId, NodeId};
use crate::repository::{NetworkKb, Repository};
use crate::time::{TimeInterval, Timestamp};

use log::*;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

/// What an edge of the time-expanded graph represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EdgeKind {
    /// Staying at the same node between two consecutive time points.
    Wait,
    /// Traversing a link during one of its contact windows.
    Traverse(LinkId),
}

/// Edge payload: traversal or wait cost in seconds (at least 1), and what the edge represents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Edge {
    pub cost: u64,
    pub kind: EdgeKind,
}

/// Vertex payload: a node at a specific point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Vertex {
    pub node: NodeId,
    pub time: Timestamp,
}

/// The expanded graph for one search window.
///
/// Built per query and discarded afterwards; the scheduler never holds one across ticks.
#[derive(Debug)]
pub(crate) struct TimeExpandedGraph {
    pub graph: DiGraph<Vertex, Edge>,
    by_node: HashMap<NodeId, Vec<NodeIndex>>,
}

impl TimeExpandedGraph {
    /// Expand the topology over `range`.
    ///
    /// Every node gets a vertex at `range.start`, at `range.end`, and at the clamped bounds of
    /// each contact window of its links. Wait edges connect consecutive time points of one node;
    /// `wait_admitted` can veto them (the store-and-forward storage gate). Each window yields
    /// one link edge per direction, from the departure vertex at the window start to the arrival
    /// vertex at the window end.
    pub fn build(
        repo: &dyn Repository,
        kb: &NetworkKb,
        contacts: &ContactWindowIndex,
        range: TimeInterval,
        wait_admitted: &dyn Fn(&NodeId) -> bool,
    ) -> Self {
        let mut time_points: HashMap<NodeId, BTreeSet<Timestamp>> = HashMap::new();
        for node in repo.list_nodes() {
            let points = time_points.entry(node.id).or_default();
            points.insert(range.start);
            points.insert(range.end);
        }

        // Collect the link edges to create: (from-node, to-node, link, clamped window).
        let mut traversals: Vec<(NodeId, NodeId, LinkId, TimeInterval)> = Vec::new();
        for link in repo.list_links() {
            let (iface_a, iface_b) = match kb.link_endpoints(&link) {
                Ok(endpoints) => endpoints,
                Err(e) => {
                    debug!("Skipping link {} in graph construction: {}", link.id, e);
                    continue;
                }
            };
            let (node_a, node_b) = (iface_a.node.clone(), iface_b.node.clone());
            if !time_points.contains_key(&node_a) || !time_points.contains_key(&node_b) {
                continue;
            }
            for window in contacts.windows(&link.id) {
                let clamped = match window.interval.clamp_to(&range) {
                    Some(clamped) => clamped,
                    None => continue,
                };
                for node in &[&node_a, &node_b] {
                    let points = time_points.entry((*node).clone()).or_default();
                    points.insert(clamped.start);
                    points.insert(clamped.end);
                }
                traversals.push((node_a.clone(), node_b.clone(), link.id.clone(), clamped));
                traversals.push((node_b.clone(), node_a.clone(), link.id.clone(), clamped));
            }
        }

        let mut graph: DiGraph<Vertex, Edge> = DiGraph::new();
        let mut index: HashMap<(NodeId, Timestamp), NodeIndex> = HashMap::new();
        let mut by_node: HashMap<NodeId, Vec<NodeIndex>> = HashMap::new();
        // deterministic vertex numbering, so equal-cost searches resolve the same way
        let mut nodes: Vec<&NodeId> = time_points.keys().collect();
        nodes.sort();
        for node in nodes {
            let points = &time_points[node];
            let mut column = Vec::with_capacity(points.len());
            for t in points {
                let v = graph.add_node(Vertex { node: node.clone(), time: *t });
                index.insert((node.clone(), *t), v);
                column.push(v);
            }
            // wait edges between consecutive time points
            if wait_admitted(node) {
                for pair in column.windows(2) {
                    let dt = graph[pair[1]].time - graph[pair[0]].time;
                    let cost = (dt.max(1)) as u64;
                    graph.add_edge(pair[0], pair[1], Edge { cost, kind: EdgeKind::Wait });
                }
            }
            by_node.insert(node.clone(), column);
        }

        for (from, to, link, window) in traversals {
            let tail = index[&(from, window.start)];
            let head = index[&(to, window.end)];
            let cost = (window.duration().max(1)) as u64;
            graph.add_edge(tail, head, Edge { cost, kind: EdgeKind::Traverse(link) });
        }

        Self { graph, by_node }
    }

    /// All vertices of one node, ordered by time.
    pub fn column(&self, node: &NodeId) -> &[NodeIndex] {
        self.by_node.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Dijkstra from all `sources` (each at distance 0) until the first vertex satisfying
    /// `is_target` is popped. Returns the traversed edges in forward order and the distance.
    pub fn shortest_path(
        &self,
        sources: &[NodeIndex],
        is_target: &dyn Fn(&Vertex) -> bool,
    ) -> Option<(Vec<EdgeIndex>, u64)> {
        let mut dist: HashMap<NodeIndex, u64> = HashMap::new();
        let mut prev: HashMap<NodeIndex, (NodeIndex, EdgeIndex)> = HashMap::new();
        let mut heap: BinaryHeap<Reverse<(u64, NodeIndex)>> = BinaryHeap::new();

        for source in sources {
            dist.insert(*source, 0);
            heap.push(Reverse((0, *source)));
        }

        while let Some(Reverse((d, v))) = heap.pop() {
            if dist.get(&v).map(|best| d > *best).unwrap_or(true) {
                continue;
            }
            if is_target(&self.graph[v]) {
                let mut edges = Vec::new();
                let mut cursor = v;
                while let Some((parent, edge)) = prev.get(&cursor) {
                    edges.push(*edge);
                    cursor = *parent;
                }
                edges.reverse();
                return Some((edges, d));
            }
            let mut neighbors = self.graph.edges(v).collect::<Vec<_>>();
            // deterministic expansion order
            neighbors.sort_by_key(|e| e.id());
            for edge in neighbors {
                let next = edge.target();
                let candidate = d + edge.weight().cost;
                if dist.get(&next).map(|best| candidate < *best).unwrap_or(true) {
                    dist.insert(next, candidate);
                    prev.insert(next, (v, edge.id()));
                    heap.push(Reverse((candidate, next)));
                }
            }
        }
        None
    }
}
