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

//! Health evaluation of provisioned paths and surgical replanning.
//!
//! Replanning never reinstalls a whole path. [`Scheduler::update_path`] computes the diff
//! against the provisioned path (longest common prefix of hops) and touches only the suffix:
//! added hops are reserved and materialized first, removed hops are withdrawn after. A failure
//! while adding rolls back everything the call added, leaving the old path fully intact.

use crate::model::{
    ActivePath, EntryId, EntryRef, LinkId, NodeId, Path, PathDiff, PathHealth, SrId,
};
use crate::scheduler::admission::PlannedPath;
use crate::scheduler::Scheduler;
use crate::time::{TimeInterval, Timestamp};
use crate::Error;

use log::*;
use std::collections::{HashMap, HashSet};

/// Why a replan was triggered.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum ReplanReason {
    /// The path is broken; bypasses the per-request throttle.
    Broken,
    /// The path is degraded.
    Degraded,
    /// A window covering a hop has grown enough to be worth extending onto.
    BetterWindow,
    /// A higher-priority request now shares this path's links.
    Overlap,
}

impl Scheduler {
    /// Evaluate every provisioned path and replan the ones that need it.
    pub fn evaluate_active_paths(&mut self) {
        let now = self.clock.now();
        let mut sr_ids: Vec<SrId> = self.active.keys().cloned().collect();
        sr_ids.sort();
        for sr_id in sr_ids {
            let (health, reason) = match self.active.get(&sr_id) {
                Some(active) => {
                    let health = self.evaluate_health(&active.path, now);
                    let reason = match health {
                        PathHealth::Broken => Some(ReplanReason::Broken),
                        PathHealth::Degraded => Some(ReplanReason::Degraded),
                        PathHealth::Healthy => {
                            if self.better_window_available(&active.path) {
                                Some(ReplanReason::BetterWindow)
                            } else if self.higher_priority_overlap(&sr_id) {
                                Some(ReplanReason::Overlap)
                            } else {
                                None
                            }
                        }
                    };
                    (health, reason)
                }
                None => continue,
            };
            if let Some(active) = self.active.get_mut(&sr_id) {
                active.health = health;
            }
            let reason = match reason {
                Some(reason) => reason,
                None => continue,
            };
            if reason != ReplanReason::Broken {
                if let Some(last) = self.last_replan.get(&sr_id) {
                    if now - *last < self.config.min_replan_interval_s {
                        debug!("Replan of {} throttled", sr_id);
                        continue;
                    }
                }
            }
            self.replan(&sr_id, reason, now);
        }
    }

    /// Health of a path under the current contact windows.
    ///
    /// Broken: a hop has expired, its link has no windows (or is gone), or the hop no longer
    /// touches any window. Degraded: a hop still overlaps a window but is no longer fully
    /// covered, and its end lies in the future. Healthy otherwise.
    pub fn evaluate_health(&self, path: &Path, now: Timestamp) -> PathHealth {
        let mut degraded = false;
        for hop in &path.hops {
            if hop.interval.end < now {
                return PathHealth::Broken;
            }
            if self.repo.get_link(&hop.link).is_err() {
                return PathHealth::Broken;
            }
            let windows = self.contacts.windows(&hop.link);
            if windows.is_empty() {
                return PathHealth::Broken;
            }
            if windows.iter().any(|w| w.interval.contains_interval(&hop.interval)) {
                continue;
            }
            if !windows.iter().any(|w| w.interval.overlaps(&hop.interval)) {
                return PathHealth::Broken;
            }
            degraded = true;
        }
        if degraded {
            PathHealth::Degraded
        } else {
            PathHealth::Healthy
        }
    }

    /// True if some hop's covering window now extends past the hop's end by at least the
    /// configured threshold.
    fn better_window_available(&self, path: &Path) -> bool {
        for hop in &path.hops {
            if let Some(window) = self.contacts.window_containing(&hop.link, &hop.interval) {
                if window.interval.end - hop.interval.end >= self.config.better_window_extension_s
                {
                    return true;
                }
            }
        }
        false
    }

    /// True if a strictly-higher-priority request holds bandwidth on any of this request's
    /// links.
    fn higher_priority_overlap(&self, sr: &SrId) -> bool {
        let priority = match self.repo.get_service_request(sr) {
            Ok(request) => request.priority,
            Err(_) => return false,
        };
        for link in self.ledger.links_of(sr) {
            for (holder, _) in self.ledger.holders(&link) {
                if &holder == sr {
                    continue;
                }
                if let Ok(other) = self.repo.get_service_request(&holder) {
                    if other.priority > priority {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Recompute the path of one request and apply it surgically. A broken path with no
    /// replacement is torn down; a degraded one is kept until a replacement appears.
    fn replan(&mut self, sr_id: &SrId, reason: ReplanReason, now: Timestamp) {
        info!("Replanning {} ({:?})", sr_id, reason);
        self.last_replan.insert(sr_id.clone(), now);
        let sr = match self.repo.get_service_request(sr_id) {
            Ok(sr) => sr,
            Err(e) => {
                warn!("Request {} vanished, tearing its path down: {}", sr_id, e);
                self.teardown_request(sr_id);
                return;
            }
        };
        let horizon = TimeInterval::new(now, now + self.contacts.horizon());
        let target = sr.dst.clone();
        let planned = match self.compute_path(&sr, &target, horizon, &HashMap::new()) {
            Ok(planned) => planned,
            Err(e) => {
                if reason == ReplanReason::Broken {
                    warn!("No replacement path for broken {}: {}", sr_id, e);
                    self.teardown_request(sr_id);
                    self.mark_unprovisioned(sr_id);
                } else {
                    debug!("No better path for {}: {}", sr_id, e);
                }
                return;
            }
        };
        let new_path = match planned {
            PlannedPath::Plain(path) => path,
            PlannedPath::Dtn(path, _) => path,
        };
        if let Err(e) = self.apply_path_update(&sr.id, sr.flow.requested_bps, new_path, now) {
            warn!("Could not apply replan of {}: {}", sr_id, e);
        } else {
            self.metrics.count_replan();
        }
    }

    /// Public entry point for applying a new path to a provisioned request: computes the diff
    /// against the current path and installs/uninstalls only the changed suffix.
    pub fn update_path(&mut self, sr_id: &SrId, new_path: Path) -> Result<(), Error> {
        let now = self.clock.now();
        let sr = self.repo.get_service_request(sr_id)?;
        self.apply_path_update(&sr.id, sr.flow.requested_bps, new_path, now)
    }

    fn apply_path_update(
        &mut self,
        sr_id: &SrId,
        bps: u64,
        new_path: Path,
        now: Timestamp,
    ) -> Result<(), Error> {
        let old_path = match self.active.get(sr_id) {
            Some(active) => active.path.clone(),
            None => Path::trivial(now),
        };
        let diff = PathDiff::between(&old_path, &new_path);
        let shared_len = diff.shared.len();
        debug!(
            "Path diff for {}: {} shared, {} removed, {} added",
            sr_id,
            shared_len,
            diff.removed.len(),
            diff.added.len()
        );

        let reserved_before: HashSet<LinkId> = self.ledger.links_of(sr_id).into_iter().collect();
        // unused when the diff adds no hops
        let route_target = match new_path.hops.last().or_else(|| old_path.hops.last()) {
            Some(hop) => hop.to.clone(),
            None => NodeId(String::new()),
        };

        // install the added suffix, rolling everything back on the first failure
        let mut added_refs: Vec<EntryRef> = Vec::new();
        let mut emitted: Vec<EntryId> = Vec::new();
        let mut newly_reserved: Vec<LinkId> = Vec::new();
        let mut failure: Option<Error> = None;
        for (offset, hop) in diff.added.iter().enumerate() {
            let index = shared_len + offset;
            if !reserved_before.contains(&hop.link)
                && !newly_reserved.contains(&hop.link)
            {
                match self.ledger.reserve_bandwidth(sr_id, &hop.link, bps) {
                    Ok(()) => newly_reserved.push(hop.link.clone()),
                    Err(e) => {
                        failure = Some(e.into());
                        break;
                    }
                }
            }
            match self.install_hop(sr_id, hop, index, &route_target, now) {
                Ok(install) => {
                    added_refs.extend(install.refs);
                    emitted.extend(install.emitted);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = failure {
            for entry in emitted {
                if let Some(record) = self.entries.remove(&entry) {
                    self.cancel_entry(&record);
                }
            }
            for link in newly_reserved {
                self.ledger.release_bandwidth_on(sr_id, &link);
            }
            return Err(e);
        }

        // withdraw the removed suffix
        let old_entries = match self.active.get(sr_id) {
            Some(active) => active.entries.clone(),
            None => Vec::new(),
        };
        let mut kept_entries: Vec<EntryRef> = Vec::new();
        for entry_ref in old_entries {
            if entry_ref.hop_index < shared_len {
                kept_entries.push(entry_ref);
                continue;
            }
            if let Some(record) = self.entries.remove(&entry_ref.entry) {
                self.cancel_entry(&record);
            }
        }
        let new_links: HashSet<LinkId> = new_path.links().into_iter().collect();
        for hop in &diff.removed {
            if !new_links.contains(&hop.link) {
                self.ledger.release_bandwidth_on(sr_id, &hop.link);
            }
        }

        kept_entries.extend(added_refs);
        let interval = TimeInterval::new(new_path.valid_from, new_path.valid_until);
        self.active.insert(
            sr_id.clone(),
            ActivePath {
                sr: sr_id.clone(),
                path: new_path,
                updated_at: now,
                health: PathHealth::Healthy,
                entries: kept_entries,
            },
        );
        self.update_sr_status(sr_id, true, Some(interval));
        Ok(())
    }

    /// Withdraw everything a request holds: entries, bandwidth, storage and its active path.
    pub(crate) fn teardown_request(&mut self, sr_id: &SrId) {
        if let Some(active) = self.active.remove(sr_id) {
            for entry_ref in active.entries {
                if let Some(record) = self.entries.remove(&entry_ref.entry) {
                    self.cancel_entry(&record);
                }
            }
        }
        self.cancel_request_entries(sr_id);
        self.ledger.release_request(sr_id);
    }
}
