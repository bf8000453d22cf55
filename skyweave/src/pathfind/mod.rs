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

//! # Path engine
//!
//! Shortest paths over a time-varying topology. The engine expands the topology over time: every
//! node becomes a column of `(node, t)` vertices, one per relevant time point, connected by
//! *wait edges*; every contact window of a link becomes a pair of directed *link edges* between
//! the endpoint columns. A plain Dijkstra over this graph then yields the earliest cheap path,
//! where cost is accumulated traversal plus wait seconds.
//!
//! The store-and-forward variant ([`PathEngine::find_dtn_path`]) admits a wait edge at a node
//! only if the node can buffer the message, and reports where and for how long the message is
//! held.

mod engine;
mod graph;

pub use engine::PathEngine;

use crate::model::{NodeId, PolicyId, RegionId};
use crate::repository::RepositoryError;
use thiserror::Error;

/// Errors returned by the path engine.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum PathError {
    /// No path exists between the two nodes within the search window.
    #[error("No path from {src} to {dst} within the search window")]
    NotFound {
        /// Source node of the failed search.
        src: NodeId,
        /// Destination node of the failed search.
        dst: NodeId,
    },
    /// An endpoint node is not part of the scenario.
    #[error("Node is not known: {0}")]
    UnknownNode(NodeId),
    /// The search window ends before it starts.
    #[error("Search window ends before it starts")]
    InvalidWindow,
    /// The region has no member nodes.
    #[error("Region has no members: {0}")]
    EmptyRegion(RegionId),
    /// The SR-policy's final waypoint does not match its endpoint and the request destination.
    #[error("SR-policy {0} does not terminate at the request destination")]
    PolicyMismatch(PolicyId),
    /// Error propagated from the repository.
    #[error("Repository Error: {0}")]
    Repository(#[from] RepositoryError),
}
