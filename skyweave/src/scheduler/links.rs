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

//! Link-driven scheduling: beams and static routes for every potential link, following its
//! contact windows.
//!
//! Both passes reconcile against the live-entry set: entries recorded for a link that no longer
//! match any current window are withdrawn, and entries whose deterministic id is already live
//! are not re-emitted. Running a pass twice in one tick therefore emits every command exactly
//! once.

use crate::acp::{BeamSpec, EntryAction, RouteSpec};
use crate::model::{Interface, Link, LinkStatus, NodeId};
use crate::scheduler::{derive_entry_id, EntryScope, Scheduler};
use crate::time::Timestamp;

use log::*;
use std::collections::HashSet;

const KIND_BEAM_UP: &str = "beam-up";
const KIND_BEAM_DOWN: &str = "beam-down";

impl Scheduler {
    /// Drive beams for every potential link: one UpdateBeam at each window start (clamped to
    /// now) and one DeleteBeam at each window end, owned by the agent of interface A's node.
    /// RF power is allocated when the UpdateBeam entry is emitted and released when the entry is
    /// withdrawn.
    pub fn schedule_link_beams(&mut self) {
        let now = self.clock.now();
        let kb = self.repo.network_kb();
        for link in self.repo.list_links() {
            if link.status != LinkStatus::Potential {
                continue;
            }
            let (iface_a, iface_b) = match kb.link_endpoints(&link) {
                Ok((a, b)) => (a.clone(), b.clone()),
                Err(e) => {
                    warn!("Skipping beams of {}: {}", link.id, e);
                    continue;
                }
            };
            let agent = match self.repo.agent_for_node(&iface_a.node) {
                Some(agent) => agent,
                None => {
                    debug!("No agent registered for {}, skipping beams of {}", iface_a.node, link.id);
                    continue;
                }
            };
            let power_dbw =
                kb.model_for(&iface_a).map(|m| m.tx_power_dbw).unwrap_or(0.0);
            let power_watts =
                kb.model_for(&iface_a).map(|m| m.tx_power_watts()).unwrap_or(0.0);

            let windows = self.contacts.windows(&link.id).to_vec();
            let scope = EntryScope::Link(link.id.clone());

            // the entries this link should have, given the current windows
            let mut desired = HashSet::new();
            for (i, window) in windows.iter().enumerate() {
                if window.interval.end < now {
                    continue;
                }
                desired.insert(derive_entry_id(&scope, i, KIND_BEAM_UP, window.interval.start));
                desired.insert(derive_entry_id(&scope, i, KIND_BEAM_DOWN, window.interval.end));
            }

            // cancel prior beam entries that no longer match a window
            for record in self.entries.for_link(&link.id) {
                if !record.kind.starts_with("beam") || desired.contains(&record.entry) {
                    continue;
                }
                if self.entries.remove(&record.entry).is_some() {
                    self.cancel_entry(&record);
                }
            }

            let spec = BeamSpec {
                link: link.id.clone(),
                local_node: iface_a.node.clone(),
                local_interface: iface_a.id.clone(),
                remote_node: iface_b.node.clone(),
                remote_interface: iface_b.id.clone(),
                power_dbw,
            };
            for (i, window) in windows.iter().enumerate() {
                if window.interval.end < now {
                    continue;
                }
                let up_at = window.interval.start.max(now);
                match self.emit_entry(
                    &agent,
                    scope.clone(),
                    i,
                    KIND_BEAM_UP,
                    window.interval.start,
                    up_at,
                    EntryAction::UpdateBeam(spec.clone()),
                ) {
                    Ok((entry, true)) => {
                        if let Err(e) =
                            self.ledger.allocate_power(&iface_a.id, &entry, power_watts, None)
                        {
                            warn!("Could not allocate power for {}: {}", entry, e);
                        }
                    }
                    Ok((_, false)) => {}
                    Err(e) => {
                        warn!("Could not schedule beam of {}: {}", link.id, e);
                        continue;
                    }
                }
                if let Err(e) = self.emit_entry(
                    &agent,
                    scope.clone(),
                    i,
                    KIND_BEAM_DOWN,
                    window.interval.end,
                    window.interval.end,
                    EntryAction::DeleteBeam(spec.clone()),
                ) {
                    warn!("Could not schedule beam teardown of {}: {}", link.id, e);
                }
            }
        }
    }

    /// Drive static routes for every potential link: per window, a SetRoute on each endpoint
    /// toward the opposite node at the window start, and a DeleteRoute on each endpoint at the
    /// window end.
    pub fn schedule_link_routes(&mut self) {
        let now = self.clock.now();
        let kb = self.repo.network_kb();
        for link in self.repo.list_links() {
            if link.status != LinkStatus::Potential {
                continue;
            }
            let (iface_a, iface_b) = match kb.link_endpoints(&link) {
                Ok((a, b)) => (a.clone(), b.clone()),
                Err(e) => {
                    warn!("Skipping routes of {}: {}", link.id, e);
                    continue;
                }
            };

            let windows = self.contacts.windows(&link.id).to_vec();
            let scope = EntryScope::Link(link.id.clone());

            let mut desired = HashSet::new();
            for (i, window) in windows.iter().enumerate() {
                if window.interval.end < now {
                    continue;
                }
                for direction in &["ab", "ba"] {
                    desired.insert(derive_entry_id(
                        &scope,
                        i,
                        &format!("route-set-{}", direction),
                        window.interval.start,
                    ));
                    desired.insert(derive_entry_id(
                        &scope,
                        i,
                        &format!("route-del-{}", direction),
                        window.interval.end,
                    ));
                }
            }
            for record in self.entries.for_link(&link.id) {
                if !record.kind.starts_with("route") || desired.contains(&record.entry) {
                    continue;
                }
                if self.entries.remove(&record.entry).is_some() {
                    self.cancel_entry(&record);
                }
            }

            for (i, window) in windows.iter().enumerate() {
                if window.interval.end < now {
                    continue;
                }
                let set_at = window.interval.start.max(now);
                let endpoints: [(&Interface, &Interface, &str); 2] =
                    [(&iface_a, &iface_b, "ab"), (&iface_b, &iface_a, "ba")];
                for &(local, remote, direction) in &endpoints {
                    self.emit_link_route(
                        &link,
                        local,
                        remote,
                        direction,
                        i,
                        window.interval.start,
                        set_at,
                        window.interval.end,
                    );
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_link_route(
        &mut self,
        link: &Link,
        local: &Interface,
        remote: &Interface,
        direction: &str,
        window_index: usize,
        window_start: Timestamp,
        set_at: Timestamp,
        window_end: Timestamp,
    ) {
        let agent = match self.repo.agent_for_node(&local.node) {
            Some(agent) => agent,
            None => {
                debug!("No agent registered for {}, skipping routes of {}", local.node, link.id);
                return;
            }
        };
        let spec = RouteSpec {
            prefix: node_prefix(&remote.node),
            next_hop: remote.node.clone(),
            device: local.id.clone(),
        };
        let scope = EntryScope::Link(link.id.clone());
        if let Err(e) = self.emit_entry(
            &agent,
            scope.clone(),
            window_index,
            &format!("route-set-{}", direction),
            window_start,
            set_at,
            EntryAction::SetRoute(spec.clone()),
        ) {
            warn!("Could not schedule route of {}: {}", link.id, e);
            return;
        }
        if let Err(e) = self.emit_entry(
            &agent,
            scope,
            window_index,
            &format!("route-del-{}", direction),
            window_end,
            window_end,
            EntryAction::DeleteRoute(spec),
        ) {
            warn!("Could not schedule route teardown of {}: {}", link.id, e);
        }
    }
}

/// The synthetic destination prefix routing toward a node.
pub fn node_prefix(node: &NodeId) -> String {
    format!("node:{}/32", node)
}
