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

//! Service-request admission: priority ordering, pathfinding, capacity checks with preemption,
//! resource reservation and per-hop command emission.

use crate::acp::{BeamSpec, EntryAction, RouteSpec};
use crate::federation::PathSegmentRequest;
use crate::ledger::ResourceLedger;
use crate::model::{
    ActivePath, DomainId, EntryId, EntryRef, LinkId, NodeId, Path, PathHealth, PathHop, PolicyId,
    PreemptionRecord, ServiceRequest, SrId,
};
use crate::pathfind::PathError;
use crate::scheduler::links::node_prefix;
use crate::scheduler::{EntryScope, Scheduler, SrQueue};
use crate::time::{TimeInterval, Timestamp};
use crate::Error;

use log::*;
use std::collections::{HashMap, HashSet};
use std::sync::mpsc::channel;
use std::sync::{Arc, Mutex};
use std::thread;

/// A computed plan for one request: either a connected path or a store-and-forward path with
/// its storage stops.
pub(crate) enum PlannedPath {
    /// All hops are directly chained in time.
    Plain(Path),
    /// The message waits at the listed nodes between hops.
    Dtn(Path, Vec<NodeId>),
}

impl PlannedPath {
    pub(crate) fn path(&self) -> &Path {
        match self {
            PlannedPath::Plain(path) => path,
            PlannedPath::Dtn(path, _) => path,
        }
    }
}

/// The four entries of one installed hop, plus the subset actually emitted by this call (for
/// rollback).
pub(crate) struct HopInstall {
    pub refs: Vec<EntryRef>,
    pub emitted: Vec<EntryId>,
}

impl Scheduler {
    /// Admit all service requests in priority order. Per-request failures are logged and mark
    /// the request not provisioned; the pass never aborts as a whole.
    pub fn admit_requests(&mut self) {
        let now = self.clock.now();
        let horizon = TimeInterval::new(now, now + self.contacts.horizon());
        let queue = SrQueue::new();
        for sr in self.repo.list_service_requests() {
            queue.push(sr);
        }
        queue.sort_by_priority();

        let precomputed = self.precompute_paths(&queue, horizon);

        while let Some(sr) = queue.pop() {
            if let Err(e) = self.admit_one(&sr, now, horizon, &precomputed) {
                warn!("Could not admit {}: {}", sr.id, e);
                self.mark_unprovisioned(&sr.id);
            }
        }
    }

    /// Parallel pathfinding for the plain requests of this tick, using the configured worker
    /// count (0 means one worker per CPU). Policy, store-and-forward and cross-domain requests
    /// are planned inline, where their extra context lives.
    fn precompute_paths(
        &self,
        queue: &SrQueue,
        horizon: TimeInterval,
    ) -> HashMap<SrId, Result<Path, PathError>> {
        let workers = match self.config.path_worker_count {
            None => return HashMap::new(),
            Some(0) => num_cpus::get(),
            Some(n) => n,
        };
        let jobs: Vec<(SrId, NodeId, NodeId)> = {
            let mut jobs = Vec::new();
            let snapshot = SrQueue::new();
            while let Some(sr) = queue.pop() {
                if sr.policy.is_none()
                    && !sr.disruption_tolerant
                    && !sr.is_cross_domain()
                    && sr.src != sr.dst
                {
                    jobs.push((sr.id.clone(), sr.src.clone(), sr.dst.clone()));
                }
                snapshot.push(sr);
            }
            while let Some(sr) = snapshot.pop() {
                queue.push(sr);
            }
            jobs
        };
        if jobs.is_empty() {
            return HashMap::new();
        }

        let todo = Arc::new(Mutex::new(jobs));
        let (sender, receiver) = channel();
        let workers: Vec<_> = (0..workers)
            .map(|_| {
                let engine = self.engine.clone();
                let contacts = self.contacts.clone();
                let todo = todo.clone();
                let tx = sender.clone();
                thread::spawn(move || loop {
                    let job = match todo.lock().unwrap().pop() {
                        Some(job) => job,
                        None => break,
                    };
                    let result = engine.find_path(&contacts, &job.1, &job.2, horizon);
                    if tx.send((job.0, result)).is_err() {
                        break;
                    }
                })
            })
            .collect();
        drop(sender);

        let mut results = HashMap::new();
        for (sr, result) in receiver {
            results.insert(sr, result);
        }
        for worker in workers {
            let _ = worker.join();
        }
        results
    }

    fn admit_one(
        &mut self,
        sr: &ServiceRequest,
        now: Timestamp,
        horizon: TimeInterval,
        precomputed: &HashMap<SrId, Result<Path, PathError>>,
    ) -> Result<(), Error> {
        // 1. drop the existing path and its bandwidth; the old entries stay live until step 7
        //    so that an unchanged path re-derives the same ids and stays untouched
        let old = self.active.remove(&sr.id);
        self.ledger.release_bandwidth(&sr.id);

        // expired requests are torn down entirely
        if sr.flow.validity.end < now {
            debug!("{} expired, releasing its resources", sr.id);
            self.release_obsolete(old, &HashSet::new());
            self.ledger.release_request(&sr.id);
            self.mark_unprovisioned(&sr.id);
            return Ok(());
        }

        // 2a. a self-loop request is trivially provisioned, zero hops
        if sr.src == sr.dst {
            self.release_obsolete(old, &HashSet::new());
            self.update_sr_status(&sr.id, true, Some(TimeInterval::new(now, now)));
            return Ok(());
        }

        // 2b. resolve the planning target; cross-domain requests end at the peer's border node
        let target = match self.resolve_target(sr, horizon) {
            Ok(target) => target,
            Err(e) => {
                warn!("Cross-domain segment for {} refused: {}", sr.id, e);
                self.release_obsolete(old, &HashSet::new());
                self.mark_unprovisioned(&sr.id);
                return Ok(());
            }
        };

        // 2c. compute the path
        let planned = match self.compute_path(sr, &target, horizon, precomputed) {
            Ok(planned) => planned,
            Err(e) => {
                info!("No path for {}: {}", sr.id, e);
                self.release_obsolete(old, &HashSet::new());
                self.ledger.release_storage(&sr.id);
                self.mark_unprovisioned(&sr.id);
                if sr.disruption_tolerant {
                    self.reserve_source_storage(sr);
                }
                return Ok(());
            }
        };

        // 3. validate against the current windows and topology
        if let Err(e) = self.validate_path(planned.path()) {
            warn!("Computed path for {} is invalid: {}", sr.id, e);
            self.release_obsolete(old, &HashSet::new());
            self.mark_unprovisioned(&sr.id);
            return Ok(());
        }

        // 4. capacity check, preempting lower-priority requests one at a time
        let bps = sr.flow.requested_bps;
        let links = planned.path().links();
        if !self.ensure_capacity(sr, &links, bps, now) {
            info!("Insufficient capacity for {}, not provisioned", sr.id);
            self.release_obsolete(old, &HashSet::new());
            self.mark_unprovisioned(&sr.id);
            return Ok(());
        }

        // 5. reserve bandwidth atomically, and storage for store-and-forward stops
        self.ledger.reserve_path(&sr.id, &links, bps)?;
        self.ledger.release_storage(&sr.id);
        if let PlannedPath::Dtn(_, storage_nodes) = &planned {
            let bytes =
                ResourceLedger::dtn_storage_requirement(&sr.flow, self.config.default_dtn_hold_s);
            for node in storage_nodes {
                if let Err(e) = self.ledger.reserve_storage(&sr.id, node, bytes) {
                    warn!("Could not reserve storage for {} at {}: {}", sr.id, node, e);
                    self.ledger.release_request(&sr.id);
                    self.release_obsolete(old, &HashSet::new());
                    self.mark_unprovisioned(&sr.id);
                    return Ok(());
                }
            }
        }

        // 6. materialize the hops
        let path = planned.path().clone();
        let mut refs: Vec<EntryRef> = Vec::new();
        let mut emitted: Vec<EntryId> = Vec::new();
        let route_target = path.hops.last().map(|h| h.to.clone()).unwrap_or_else(|| target.clone());
        for (index, hop) in path.hops.iter().enumerate() {
            match self.install_hop(&sr.id, hop, index, &route_target, now) {
                Ok(install) => {
                    refs.extend(install.refs);
                    emitted.extend(install.emitted);
                }
                Err(e) => {
                    warn!("Could not materialize hop {} of {}: {}", index, sr.id, e);
                    for entry in emitted {
                        if let Some(record) = self.entries.remove(&entry) {
                            self.cancel_entry(&record);
                        }
                    }
                    self.ledger.release_request(&sr.id);
                    self.release_obsolete(old, &HashSet::new());
                    self.mark_unprovisioned(&sr.id);
                    return Ok(());
                }
            }
        }

        // 6b. a policy request additionally installs its SR-policy at the source node, bracketed
        // by the path validity
        if let Some(policy_id) = &sr.policy {
            self.install_policy(sr, policy_id, &path, now, &mut refs);
        }

        // 7. install the new active path and drop whatever the old one still held
        let kept: HashSet<EntryId> = refs.iter().map(|r| r.entry.clone()).collect();
        self.release_obsolete(old, &kept);
        let interval = TimeInterval::new(path.valid_from, path.valid_until);
        self.active.insert(
            sr.id.clone(),
            ActivePath {
                sr: sr.id.clone(),
                path,
                updated_at: now,
                health: PathHealth::Healthy,
                entries: refs,
            },
        );
        self.update_sr_status(&sr.id, true, Some(interval));
        debug!("Provisioned {} over {} links", sr.id, links.len());
        Ok(())
    }

    /// Withdraw the entries of a replaced active path, except those shared with the new one.
    pub(crate) fn release_obsolete(&mut self, old: Option<ActivePath>, kept: &HashSet<EntryId>) {
        if let Some(old) = old {
            for entry_ref in old.entries {
                if kept.contains(&entry_ref.entry) {
                    continue;
                }
                if let Some(record) = self.entries.remove(&entry_ref.entry) {
                    self.cancel_entry(&record);
                }
            }
        }
    }

    /// The node the local plan must reach: the destination itself, or the border node granted by
    /// the destination domain for cross-domain requests.
    fn resolve_target(
        &self,
        sr: &ServiceRequest,
        horizon: TimeInterval,
    ) -> Result<NodeId, Error> {
        if !sr.is_cross_domain() {
            return Ok(sr.dst.clone());
        }
        let dest_domain_id = match &sr.dest_domain {
            Some(domain) => domain.clone(),
            None => return Ok(sr.dst.clone()),
        };
        let dest_domain = self.repo.get_domain(&dest_domain_id)?;
        let source_domain = match &sr.source_domain {
            Some(domain) => domain.clone(),
            None => self
                .repo
                .get_domain_for_node(&sr.src)?
                .map(|d| d.id)
                .unwrap_or_else(|| DomainId("local".to_string())),
        };
        let request = PathSegmentRequest {
            sr: sr.id.clone(),
            source_domain,
            dest_domain: dest_domain_id,
            entry_node: dest_domain.border_node,
            dst: sr.dst.clone(),
            window: horizon,
            token: sr.federation_token.clone(),
        };
        let grant = self.federation.request_path_segment(&request)?;
        Ok(grant.entry_node)
    }

    /// Compute the plan for one request: policy path, store-and-forward path, or plain shortest
    /// path (possibly precomputed by the worker pool).
    pub(crate) fn compute_path(
        &self,
        sr: &ServiceRequest,
        target: &NodeId,
        horizon: TimeInterval,
        precomputed: &HashMap<SrId, Result<Path, PathError>>,
    ) -> Result<PlannedPath, PathError> {
        if let Some(policy_id) = &sr.policy {
            let policy = self.repo.get_sr_policy(policy_id)?;
            let path =
                self.engine.find_policy_path(&self.contacts, &sr.src, target, &policy, horizon)?;
            return Ok(PlannedPath::Plain(path));
        }
        if sr.disruption_tolerant {
            let msg_size =
                ResourceLedger::dtn_storage_requirement(&sr.flow, self.config.default_dtn_hold_s);
            let dtn =
                self.engine.find_dtn_path(&self.contacts, &sr.src, target, msg_size, horizon)?;
            let storage_nodes = dtn.storage_nodes.clone();
            return Ok(PlannedPath::Dtn(dtn.to_path(), storage_nodes));
        }
        if let Some(result) = precomputed.get(&sr.id) {
            return match result {
                Ok(path) => Ok(PlannedPath::Plain(path.clone())),
                Err(e) => Err(e.clone()),
            };
        }
        let path = self.engine.find_path(&self.contacts, &sr.src, target, horizon)?;
        Ok(PlannedPath::Plain(path))
    }

    /// Check that every hop's link exists, both hop endpoints exist, and the hop window lies
    /// within a current contact window of its link.
    pub(crate) fn validate_path(&self, path: &Path) -> Result<(), Error> {
        for hop in &path.hops {
            self.repo.get_link(&hop.link)?;
            self.repo.get_node(&hop.from)?;
            self.repo.get_node(&hop.to)?;
            if self.contacts.window_containing(&hop.link, &hop.interval).is_none() {
                return Err(Error::Path(PathError::NotFound {
                    src: hop.from.clone(),
                    dst: hop.to.clone(),
                }));
            }
        }
        Ok(())
    }

    /// Make room for `bps` on every link, preempting strictly-lower-priority holders one at a
    /// time (lowest priority first, then id order). Returns false if capacity cannot be found.
    fn ensure_capacity(
        &mut self,
        sr: &ServiceRequest,
        links: &[LinkId],
        bps: u64,
        now: Timestamp,
    ) -> bool {
        loop {
            let constrained = match self.constrained_links(links, bps) {
                Ok(constrained) => constrained,
                Err(e) => {
                    warn!("Capacity check for {} failed: {}", sr.id, e);
                    return false;
                }
            };
            if constrained.is_empty() {
                return true;
            }

            let mut victims: Vec<(i32, SrId)> = Vec::new();
            let mut seen: HashSet<SrId> = HashSet::new();
            for link in &constrained {
                for (holder, _) in self.ledger.holders(link) {
                    if holder == sr.id || !seen.insert(holder.clone()) {
                        continue;
                    }
                    match self.repo.get_service_request(&holder) {
                        Ok(other) if other.priority < sr.priority => {
                            victims.push((other.priority, holder));
                        }
                        Ok(_) => {}
                        Err(e) => debug!("Holder {} has no request record: {}", holder, e),
                    }
                }
            }
            if victims.is_empty() {
                return false;
            }
            victims.sort();
            let (_, victim) = victims.remove(0);
            self.preempt(&victim, &sr.id, now);
        }
    }

    fn constrained_links(
        &self,
        links: &[LinkId],
        bps: u64,
    ) -> Result<Vec<LinkId>, Error> {
        let mut constrained = Vec::new();
        for link in links {
            if let Some(available) = self.ledger.available(link)? {
                if available < bps {
                    constrained.push(link.clone());
                }
            }
        }
        Ok(constrained)
    }

    /// Displace one request: release its resources, withdraw its entries, clear its provisioned
    /// status and write an audit record.
    pub(crate) fn preempt(&mut self, victim: &SrId, by: &SrId, now: Timestamp) {
        info!("Preempting {} in favor of {}", victim, by);
        self.ledger.release_request(victim);
        if let Some(active) = self.active.remove(victim) {
            for entry_ref in active.entries {
                if let Some(record) = self.entries.remove(&entry_ref.entry) {
                    self.cancel_entry(&record);
                }
            }
        }
        self.cancel_request_entries(victim);
        self.mark_unprovisioned(victim);
        self.preemptions.entry(victim.clone()).or_default().push(PreemptionRecord {
            sr: victim.clone(),
            preempted_by: by.clone(),
            at: now,
            reason: format!("displaced by higher-priority request {}", by),
        });
        self.metrics.count_preemption();
    }

    /// Emit the four commands of one hop to the agent of the hop's source node. On any failure
    /// the commands already emitted for this hop are withdrawn before the error is returned, so
    /// callers only roll back whole hops.
    pub(crate) fn install_hop(
        &mut self,
        sr: &SrId,
        hop: &PathHop,
        index: usize,
        route_target: &NodeId,
        now: Timestamp,
    ) -> Result<HopInstall, Error> {
        let kb = self.repo.network_kb();
        let link = self.repo.get_link(&hop.link)?;
        let (iface_a, iface_b) = kb.link_endpoints(&link)?;
        let (local, remote) = if iface_a.node == hop.from {
            (iface_a.clone(), iface_b.clone())
        } else {
            (iface_b.clone(), iface_a.clone())
        };
        let agent = self
            .repo
            .agent_for_node(&hop.from)
            .ok_or_else(|| crate::acp::AcpError::NotFound(crate::model::AgentId(hop.from.0.clone())))?;
        let power_dbw = kb.model_for(&local).map(|m| m.tx_power_dbw).unwrap_or(0.0);
        let power_watts = kb.model_for(&local).map(|m| m.tx_power_watts()).unwrap_or(0.0);

        let beam = BeamSpec {
            link: hop.link.clone(),
            local_node: local.node.clone(),
            local_interface: local.id.clone(),
            remote_node: remote.node.clone(),
            remote_interface: remote.id.clone(),
            power_dbw,
        };
        let route = RouteSpec {
            prefix: node_prefix(route_target),
            next_hop: hop.to.clone(),
            device: local.id.clone(),
        };

        let scope = EntryScope::Request(sr.clone());
        let start_at = hop.interval.start.max(now);
        let plan: [(&str, Timestamp, Timestamp, EntryAction); 4] = [
            (
                "beam-up",
                hop.interval.start,
                start_at,
                EntryAction::UpdateBeam(beam.clone()),
            ),
            (
                "beam-down",
                hop.interval.end,
                hop.interval.end,
                EntryAction::DeleteBeam(beam.clone()),
            ),
            ("route-set", hop.interval.start, start_at, EntryAction::SetRoute(route.clone())),
            ("route-del", hop.interval.end, hop.interval.end, EntryAction::DeleteRoute(route)),
        ];

        let mut install = HopInstall { refs: Vec::new(), emitted: Vec::new() };
        for (kind, id_time, at, action) in plan.iter().cloned() {
            match self.emit_entry(&agent, scope.clone(), index, kind, id_time, at, action) {
                Ok((entry, emitted_now)) => {
                    if emitted_now {
                        if kind == "beam-up" {
                            if let Err(e) =
                                self.ledger.allocate_power(&local.id, &entry, power_watts, None)
                            {
                                warn!("Could not allocate power for {}: {}", entry, e);
                            }
                        }
                        install.emitted.push(entry.clone());
                    }
                    install.refs.push(EntryRef { entry, agent: agent.clone(), hop_index: index });
                }
                Err(e) => {
                    for entry in install.emitted {
                        if let Some(record) = self.entries.remove(&entry) {
                            self.cancel_entry(&record);
                        }
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(install)
    }

    /// Record the SR-policy as installed at the source node and emit the policy entry pair
    /// (install at the path start, removal at the path end) to the source agent.
    fn install_policy(
        &mut self,
        sr: &ServiceRequest,
        policy_id: &PolicyId,
        path: &Path,
        now: Timestamp,
        refs: &mut Vec<EntryRef>,
    ) {
        let policy = match self.repo.get_sr_policy(policy_id) {
            Ok(policy) => policy,
            Err(e) => {
                warn!("Policy {} of {} vanished: {}", policy_id, sr.id, e);
                return;
            }
        };
        if let Err(e) = self.repo.install_sr_policy(&sr.src, &policy) {
            warn!("Could not record policy install for {}: {}", sr.id, e);
        }
        let agent = match self.repo.agent_for_node(&sr.src) {
            Some(agent) => agent,
            None => {
                debug!("No agent for {}, skipping policy entries of {}", sr.src, sr.id);
                return;
            }
        };
        let scope = EntryScope::Request(sr.id.clone());
        let index = path.hops.len();
        let plan = [
            (
                "policy-set",
                path.valid_from,
                path.valid_from.max(now),
                EntryAction::SetSrPolicy { policy: policy_id.clone() },
            ),
            (
                "policy-del",
                path.valid_until,
                path.valid_until,
                EntryAction::DeleteSrPolicy { policy: policy_id.clone() },
            ),
        ];
        for (kind, id_time, at, action) in plan.iter().cloned() {
            match self.emit_entry(&agent, scope.clone(), index, kind, id_time, at, action) {
                Ok((entry, _)) => {
                    refs.push(EntryRef { entry, agent: agent.clone(), hop_index: index })
                }
                Err(e) => warn!("Could not emit policy entry for {}: {}", sr.id, e),
            }
        }
    }

    /// Reserve the request's storage requirement at its source node, so traffic can buffer until
    /// connectivity appears.
    fn reserve_source_storage(&mut self, sr: &ServiceRequest) {
        let bytes =
            ResourceLedger::dtn_storage_requirement(&sr.flow, self.config.default_dtn_hold_s);
        match self.ledger.reserve_storage(&sr.id, &sr.src, bytes) {
            Ok(()) => debug!("Reserved {} B at {} for disconnected {}", bytes, sr.src, sr.id),
            Err(e) => warn!("Could not reserve source storage for {}: {}", sr.id, e),
        }
    }

    /// Clear the provisioned flag of a request in the repository.
    pub(crate) fn mark_unprovisioned(&mut self, sr: &SrId) {
        self.update_sr_status(sr, false, None);
    }

    /// Update a request's status block in the repository.
    pub(crate) fn update_sr_status(
        &mut self,
        sr: &SrId,
        provisioned: bool,
        interval: Option<TimeInterval>,
    ) {
        match self.repo.get_service_request(sr) {
            Ok(mut request) => {
                request.status.provisioned_now = provisioned;
                if let Some(interval) = interval {
                    if request.status.provisioned_intervals.last() != Some(&interval) {
                        request.status.provisioned_intervals.push(interval);
                    }
                }
                if let Err(e) = self.repo.update_service_request(request) {
                    warn!("Could not update status of {}: {}", sr, e);
                }
            }
            Err(e) => warn!("Could not load {} for status update: {}", sr, e),
        }
    }
}
