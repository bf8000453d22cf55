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

//! Topology elements: nodes, interfaces, links and transceiver models.

use crate::model::types::{InterfaceId, LinkId, ModelId, NodeId};

/// Physical medium of an interface or link.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum Medium {
    /// Radio link, subject to visibility windows and beam scheduling.
    Wireless,
    /// Cabled link, always connectable.
    Wired,
}

/// Lifecycle status of a link.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum LinkStatus {
    /// The link may be established during its contact windows, but is not up yet. The scheduler
    /// drives beams and routes for potential links.
    Potential,
    /// The link is currently established.
    Active,
}

/// A network node. Nodes expose interfaces; a node with a storage capacity can carry
/// store-and-forward traffic.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique node identifier.
    pub id: NodeId,
    /// Reference to the platform (spacecraft bus, ground site, ...) this node runs on.
    pub platform: String,
    /// Bytes of store-and-forward buffer available on this node, if any.
    pub storage_capacity: Option<u64>,
    /// Cartesian coordinates used by region pathfinding, if configured.
    pub coordinates: Option<[f64; 3]>,
}

/// A single interface of a node.
#[derive(Debug, Clone)]
pub struct Interface {
    /// Interface identifier, bare or parent-qualified (see [`InterfaceId`]).
    pub id: InterfaceId,
    /// The node exposing this interface.
    pub node: NodeId,
    /// Physical medium.
    pub medium: Medium,
    /// The transceiver model driving this interface, for wireless interfaces.
    pub transceiver_model: Option<ModelId>,
    /// Whether the interface is operational.
    pub operational: bool,
}

/// An undirected link between two interfaces. The scheduler materializes links as bidirectional
/// command pairs.
#[derive(Debug, Clone)]
pub struct Link {
    /// Unique link identifier.
    pub id: LinkId,
    /// First endpoint.
    pub iface_a: InterfaceId,
    /// Second endpoint.
    pub iface_b: InterfaceId,
    /// Physical medium.
    pub medium: Medium,
    /// Lifecycle status.
    pub status: LinkStatus,
    /// Maximum bandwidth in bit/s. Zero means unlimited.
    pub max_bandwidth_bps: u64,
}

impl Link {
    /// Returns `None` for unlimited links, `Some(bps)` otherwise.
    pub fn capacity(&self) -> Option<u64> {
        if self.max_bandwidth_bps == 0 {
            None
        } else {
            Some(self.max_bandwidth_bps)
        }
    }
}

/// Capabilities of a transceiver, shared by all interfaces referencing the model.
#[derive(Debug, Clone)]
pub struct TransceiverModel {
    /// Unique model identifier.
    pub id: ModelId,
    /// Center frequency band in GHz.
    pub band_ghz: f64,
    /// Maximum number of concurrently pointed beams.
    pub max_beams: usize,
    /// Transmit power in dBW.
    pub tx_power_dbw: f64,
    /// Interference threshold in dBW above which a neighboring beam is considered disturbing.
    /// `None` means the engine default applies.
    pub interference_threshold_dbw: Option<f64>,
    /// Maximum usable range in km.
    pub max_range_km: f64,
}

impl TransceiverModel {
    /// Transmit power converted from dBW to watts.
    pub fn tx_power_watts(&self) -> f64 {
        10f64.powf(self.tx_power_dbw / 10.0)
    }
}
