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

//! Paths through the time-varying topology.
//!
//! A [`Path`] is an immutable product of the path engine: an ordered list of time-bounded link
//! traversals. Replanning never mutates a path; it produces a new one and a [`PathDiff`]
//! describing the hops to remove and to add.

use crate::model::types::{AgentId, EntryId, LinkId, NodeId, SrId};
use crate::time::{TimeInterval, Timestamp};

use std::collections::BTreeSet;

/// One link traversal in a path, time-bounded by a contact window of its link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathHop {
    /// Node the hop leaves from.
    pub from: NodeId,
    /// Node the hop arrives at.
    pub to: NodeId,
    /// The link traversed.
    pub link: LinkId,
    /// Traversal window. Lies within one contact window of the link.
    pub interval: TimeInterval,
}

/// An ordered list of hops from a source to a destination.
///
/// Invariants: consecutive hops chain in node ids (`hops[i].to == hops[i+1].from`), and each
/// hop's interval lies within a contact window of its link at the time the path was computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    /// The hops, in traversal order. Empty for a trivial (src == dst) path.
    pub hops: Vec<PathHop>,
    /// Accumulated traversal and wait cost in seconds.
    pub total_latency: i64,
    /// Start of the first hop, or the query start for trivial paths.
    pub valid_from: Timestamp,
    /// End of the last hop, or the query start for trivial paths.
    pub valid_until: Timestamp,
}

impl Path {
    /// A path with no hops, used when source and destination coincide.
    pub fn trivial(at: Timestamp) -> Self {
        Self { hops: Vec::new(), total_latency: 0, valid_from: at, valid_until: at }
    }

    /// Returns true if the path has no hops.
    pub fn is_trivial(&self) -> bool {
        self.hops.is_empty()
    }

    /// The distinct links traversed, in hop order.
    pub fn links(&self) -> Vec<LinkId> {
        let mut seen = BTreeSet::new();
        let mut links = Vec::new();
        for hop in &self.hops {
            if seen.insert(hop.link.clone()) {
                links.push(hop.link.clone());
            }
        }
        links
    }
}

/// One hop of a store-and-forward path, together with the storage episode preceding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtnHop {
    /// The link traversal itself.
    pub hop: PathHop,
    /// The node holding the message before this hop, if the message waited anywhere.
    pub storage_node: Option<NodeId>,
    /// When the storage episode began.
    pub storage_start: Option<Timestamp>,
    /// How long the message was held before this hop, in seconds.
    pub storage_duration: i64,
}

/// A store-and-forward path. Unlike [`Path`], a message following it may wait at
/// storage-equipped nodes between hops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtnPath {
    /// The hops with their storage records.
    pub hops: Vec<DtnHop>,
    /// Sorted, distinct set of nodes that carry the message while it waits.
    pub storage_nodes: Vec<NodeId>,
    /// Seconds from the query start until final delivery.
    pub total_delay: i64,
}

impl DtnPath {
    /// The plain path underneath, discarding storage records.
    pub fn to_path(&self) -> Path {
        let hops: Vec<PathHop> = self.hops.iter().map(|h| h.hop.clone()).collect();
        let valid_from = hops.first().map(|h| h.interval.start).unwrap_or_default();
        let valid_until = hops.last().map(|h| h.interval.end).unwrap_or_default();
        Path { hops, total_latency: self.total_delay, valid_from, valid_until }
    }
}

/// Health of a provisioned path, re-evaluated on every scheduler tick.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum PathHealth {
    /// Every hop is still covered by a contact window.
    Healthy,
    /// Some future hop is no longer fully covered by a window.
    Degraded,
    /// A hop has expired, lost its window entirely, or its link is gone.
    Broken,
}

/// Reference to one scheduled entry materializing a path hop at an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRef {
    /// The scheduled entry.
    pub entry: EntryId,
    /// The agent holding the entry.
    pub agent: AgentId,
    /// Index of the hop this entry belongs to.
    pub hop_index: usize,
}

/// Bookkeeping for the provisioned path of a service request.
#[derive(Debug, Clone)]
pub struct ActivePath {
    /// The owning service request.
    pub sr: SrId,
    /// The provisioned path.
    pub path: Path,
    /// When the path was last installed or surgically updated.
    pub updated_at: Timestamp,
    /// Health as of the last evaluation.
    pub health: PathHealth,
    /// The entries materializing the path, one group of four per hop.
    pub entries: Vec<EntryRef>,
}

/// Difference between an old and a new path: the longest common prefix of hops, the suffix to
/// tear down, and the suffix to install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathDiff {
    /// Hops present in both paths, `old.hops[..k] == new.hops[..k]`.
    pub shared: Vec<PathHop>,
    /// Hops of the old path past the common prefix, to be uninstalled.
    pub removed: Vec<PathHop>,
    /// Hops of the new path past the common prefix, to be installed.
    pub added: Vec<PathHop>,
}

impl PathDiff {
    /// Compute the diff between two paths. Hops compare equal on link id, endpoints and times.
    pub fn between(old: &Path, new: &Path) -> PathDiff {
        let k = old
            .hops
            .iter()
            .zip(new.hops.iter())
            .take_while(|(a, b)| a == b)
            .count();
        PathDiff {
            shared: old.hops[..k].to_vec(),
            removed: old.hops[k..].to_vec(),
            added: new.hops[k..].to_vec(),
        }
    }
}
