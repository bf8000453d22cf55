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

//! # Resource ledger
//!
//! Keyed bookkeeping of everything the scheduler hands out: link bandwidth per service request,
//! RF power per scheduled entry, and store-and-forward bytes per service request. The ledger
//! enforces capacity policy and rollback; the raw counters live in the repository so that other
//! controller subsystems observe the same totals.
//!
//! Every operation is locally atomic. [`ResourceLedger::reserve_path`] is the one compound
//! operation: it reserves every link of a path and rolls all of them back if any link refuses.

use crate::model::{EntryId, FlowRequirements, InterfaceId, LinkId, NodeId, SrId};
use crate::repository::{Repository, RepositoryError};

use log::*;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors returned by ledger operations.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum LedgerError {
    /// A bandwidth reservation would exceed the link's capacity.
    #[error("Link {link} cannot fit {requested_bps} bit/s ({available_bps} bit/s available)")]
    InsufficientCapacity {
        /// The constrained link.
        link: LinkId,
        /// The requested bandwidth.
        requested_bps: u64,
        /// The bandwidth still available.
        available_bps: u64,
    },
    /// A power allocation would exceed the interface's configured cap.
    #[error("Power allocation on {0} exceeds the transceiver cap")]
    PowerLimitExceeded(InterfaceId),
    /// A storage reservation would exceed the node's capacity.
    #[error("Node {node} cannot hold {requested} B ({available} B available)")]
    InsufficientStorage {
        /// The storage node.
        node: NodeId,
        /// The requested bytes.
        requested: u64,
        /// The bytes still available.
        available: u64,
    },
    /// Error propagated from the repository.
    #[error("Repository Error: {0}")]
    Repository(#[from] RepositoryError),
}

/// The scheduler's bandwidth, power and storage bookkeeping.
pub struct ResourceLedger {
    repo: Arc<dyn Repository>,
    /// Bandwidth reservations, per service request and link.
    bandwidth: HashMap<SrId, HashMap<LinkId, u64>>,
    /// RF-power allocations, keyed by the entry that caused them.
    power: HashMap<EntryId, (InterfaceId, f64)>,
    /// Storage reservations, per service request.
    storage: HashMap<SrId, Vec<(NodeId, u64)>>,
}

impl ResourceLedger {
    /// Create an empty ledger on top of the given repository.
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo, bandwidth: HashMap::new(), power: HashMap::new(), storage: HashMap::new() }
    }

    // ------------------------------------------------------------------------------------------
    // Bandwidth
    // ------------------------------------------------------------------------------------------

    /// Reserve `bps` on `link` for `sr`.
    ///
    /// Re-reserving an existing `(sr, link)` pair is idempotent: the reservation is adjusted to
    /// the new amount rather than accumulated. Fails with
    /// [`LedgerError::InsufficientCapacity`] if the link is finite and the sum of all
    /// reservations would exceed its capacity.
    pub fn reserve_bandwidth(
        &mut self,
        sr: &SrId,
        link: &LinkId,
        bps: u64,
    ) -> Result<(), LedgerError> {
        let existing = self
            .bandwidth
            .get(sr)
            .and_then(|links| links.get(link))
            .copied()
            .unwrap_or(0);
        if existing == bps {
            return Ok(());
        }
        if bps > existing {
            let needed = bps - existing;
            if let Some(available) = self.repo.get_available_bandwidth(link)? {
                if needed > available {
                    return Err(LedgerError::InsufficientCapacity {
                        link: link.clone(),
                        requested_bps: bps,
                        available_bps: available + existing,
                    });
                }
            }
            self.repo.reserve_bandwidth(link, needed)?;
        } else {
            self.repo.release_bandwidth(link, existing - bps)?;
        }
        self.bandwidth.entry(sr.clone()).or_default().insert(link.clone(), bps);
        Ok(())
    }

    /// Reserve `bps` on every link of a path, rolling back all successful reservations if any
    /// link refuses.
    pub fn reserve_path(
        &mut self,
        sr: &SrId,
        links: &[LinkId],
        bps: u64,
    ) -> Result<(), LedgerError> {
        let mut done: Vec<LinkId> = Vec::new();
        for link in links {
            match self.reserve_bandwidth(sr, link, bps) {
                Ok(()) => done.push(link.clone()),
                Err(e) => {
                    for undo in done {
                        self.release_bandwidth_on(sr, &undo);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Drop the reservation of `sr` on a single link, if one exists.
    pub fn release_bandwidth_on(&mut self, sr: &SrId, link: &LinkId) {
        if let Some(links) = self.bandwidth.get_mut(sr) {
            if let Some(bps) = links.remove(link) {
                if let Err(e) = self.repo.release_bandwidth(link, bps) {
                    warn!("Could not release {} bit/s on {}: {}", bps, link, e);
                }
            }
            if links.is_empty() {
                self.bandwidth.remove(sr);
            }
        }
    }

    /// Drop all bandwidth reservations of a service request.
    pub fn release_bandwidth(&mut self, sr: &SrId) {
        if let Some(links) = self.bandwidth.remove(sr) {
            for (link, bps) in links {
                if let Err(e) = self.repo.release_bandwidth(&link, bps) {
                    warn!("Could not release {} bit/s on {}: {}", bps, link, e);
                }
            }
        }
    }

    /// Remaining bandwidth of a link: `None` for unlimited links.
    pub fn available(&self, link: &LinkId) -> Result<Option<u64>, LedgerError> {
        Ok(self.repo.get_available_bandwidth(link)?)
    }

    /// Total bandwidth this ledger holds on a link, across all service requests.
    pub fn reserved_on_link(&self, link: &LinkId) -> u64 {
        self.bandwidth
            .values()
            .filter_map(|links| links.get(link))
            .sum()
    }

    /// The service requests holding a reservation on `link`, with the reserved amount.
    pub fn holders(&self, link: &LinkId) -> Vec<(SrId, u64)> {
        let mut holders: Vec<(SrId, u64)> = self
            .bandwidth
            .iter()
            .filter_map(|(sr, links)| links.get(link).map(|bps| (sr.clone(), *bps)))
            .collect();
        holders.sort_by(|a, b| a.0.cmp(&b.0));
        holders
    }

    /// The links a service request holds reservations on.
    pub fn links_of(&self, sr: &SrId) -> Vec<LinkId> {
        let mut links: Vec<LinkId> = self
            .bandwidth
            .get(sr)
            .map(|l| l.keys().cloned().collect())
            .unwrap_or_default();
        links.sort();
        links
    }

    // ------------------------------------------------------------------------------------------
    // RF power
    // ------------------------------------------------------------------------------------------

    /// Allocate `watts` on `iface`, keyed by the entry that scheduled the beam.
    ///
    /// If `cap_watts` is given and the interface total would exceed it, the allocation is
    /// rejected with [`LedgerError::PowerLimitExceeded`].
    pub fn allocate_power(
        &mut self,
        iface: &InterfaceId,
        entry: &EntryId,
        watts: f64,
        cap_watts: Option<f64>,
    ) -> Result<(), LedgerError> {
        if let Some(cap) = cap_watts {
            let current = self.power_on_interface(iface);
            if current + watts > cap {
                return Err(LedgerError::PowerLimitExceeded(iface.clone()));
            }
        }
        self.repo.allocate_power(iface, entry, watts)?;
        self.power.insert(entry.clone(), (iface.clone(), watts));
        Ok(())
    }

    /// Release the allocation of `entry`, if one exists.
    pub fn release_power(&mut self, entry: &EntryId) {
        if let Some((iface, _)) = self.power.remove(entry) {
            if let Err(e) = self.repo.release_power(&iface, entry) {
                warn!("Could not release power of {} on {}: {}", entry, iface, e);
            }
        }
    }

    /// Watts currently allocated on an interface by this ledger.
    pub fn power_on_interface(&self, iface: &InterfaceId) -> f64 {
        self.power
            .values()
            .filter(|(i, _)| i == iface)
            .map(|(_, w)| w)
            .sum()
    }

    // ------------------------------------------------------------------------------------------
    // DTN storage
    // ------------------------------------------------------------------------------------------

    /// Bytes of store-and-forward buffer still available on a node. Zero for nodes without a
    /// configured capacity.
    pub fn storage_available(&self, node: &NodeId) -> Result<u64, LedgerError> {
        let capacity = self.repo.get_node(node)?.storage_capacity.unwrap_or(0);
        let used = self.repo.get_storage_usage(node)?;
        Ok(capacity.saturating_sub(used))
    }

    /// Reserve `bytes` on `node` for `sr`, failing if the node cannot hold them.
    pub fn reserve_storage(
        &mut self,
        sr: &SrId,
        node: &NodeId,
        bytes: u64,
    ) -> Result<(), LedgerError> {
        let available = self.storage_available(node)?;
        if bytes > available {
            return Err(LedgerError::InsufficientStorage {
                node: node.clone(),
                requested: bytes,
                available,
            });
        }
        self.repo.reserve_storage(node, bytes)?;
        self.storage.entry(sr.clone()).or_default().push((node.clone(), bytes));
        Ok(())
    }

    /// Drop all storage reservations of a service request.
    pub fn release_storage(&mut self, sr: &SrId) {
        if let Some(reservations) = self.storage.remove(sr) {
            for (node, bytes) in reservations {
                if let Err(e) = self.repo.release_storage(&node, bytes) {
                    warn!("Could not release {} B on {}: {}", bytes, node, e);
                }
            }
        }
    }

    /// Drop every reservation (bandwidth and storage) of a service request.
    pub fn release_request(&mut self, sr: &SrId) {
        self.release_bandwidth(sr);
        self.release_storage(sr);
    }

    /// Bytes of storage a DTN flow needs while waiting at a node: the flow's bandwidth (at least
    /// 1 Mbit/s) buffered for `hold_s` seconds.
    pub fn dtn_storage_requirement(flow: &FlowRequirements, hold_s: i64) -> u64 {
        let bps = flow.requested_bps.max(flow.min_bps).max(1_000_000);
        bps * hold_s as u64 / 8
    }
}
