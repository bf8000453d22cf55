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

//! # Scheduler
//!
//! The orchestration loop of the controller. On every tick it refreshes the contact-window
//! index, drives beams and static routes for potential links, admits service requests by
//! priority (preempting lower-priority requests when capacity runs out), and re-evaluates every
//! provisioned path, surgically replacing the hops that changed.
//!
//! The loop is a single driver thread. Ticks run to completion; cancellation via the
//! [`Stopper`](crate::Stopper) is observed between ticks, and a wake request (coalesced) forces
//! the next tick early. Pathfinding for independent requests may fan out onto worker threads,
//! but every mutation of the ledger, the entry registry and the active-path table happens on the
//! driver thread.

mod admission;
mod entries;
mod links;
mod queue;
mod replan;

pub use entries::{derive_entry_id, EntryRecord, EntryRegistry, EntryScope};
pub use links::node_prefix;
pub use queue::SrQueue;
pub use replan::ReplanReason;

use crate::acp::{AcpError, CommandSink, EntryAction};
use crate::config::ControllerConfig;
use crate::contact::{ContactOracle, ContactWindowIndex};
use crate::federation::{DenyAllFederation, FederationClient};
use crate::ledger::ResourceLedger;
use crate::model::{ActivePath, AgentId, EntryId, PreemptionRecord, SrId};
use crate::pathfind::PathEngine;
use crate::repository::Repository;
use crate::time::{Clock, Timestamp};
use crate::Stopper;

use log::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;

/// Counters exposed by the scheduler.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    entries_sent: AtomicU64,
    entries_deleted: AtomicU64,
    replans: AtomicU64,
    preemptions: AtomicU64,
    ticks: AtomicU64,
}

impl SchedulerMetrics {
    fn count_entry_sent(&self) {
        self.entries_sent.fetch_add(1, Ordering::Relaxed);
    }

    fn count_entry_deleted(&self) {
        self.entries_deleted.fetch_add(1, Ordering::Relaxed);
    }

    fn count_replan(&self) {
        self.replans.fetch_add(1, Ordering::Relaxed);
    }

    fn count_preemption(&self) {
        self.preemptions.fetch_add(1, Ordering::Relaxed);
    }

    fn count_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of CreateEntry commands emitted.
    pub fn entries_sent(&self) -> u64 {
        self.entries_sent.load(Ordering::Relaxed)
    }

    /// Number of DeleteEntry commands emitted.
    pub fn entries_deleted(&self) -> u64 {
        self.entries_deleted.load(Ordering::Relaxed)
    }

    /// Number of replans applied.
    pub fn replans(&self) -> u64 {
        self.replans.load(Ordering::Relaxed)
    }

    /// Number of preemptions performed.
    pub fn preemptions(&self) -> u64 {
        self.preemptions.load(Ordering::Relaxed)
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

/// Cloneable handle for waking the replanning loop early. Multiple wake requests while a tick is
/// running coalesce into a single early tick.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    wake: SyncSender<()>,
}

impl SchedulerHandle {
    /// Request an early tick. Never blocks; a pending wake absorbs the request.
    pub fn wake(&self) {
        let _ = self.wake.try_send(());
    }
}

/// The controller's orchestration loop. See the [module documentation](self).
pub struct Scheduler {
    repo: Arc<dyn Repository>,
    sink: Arc<dyn CommandSink>,
    clock: Arc<dyn Clock>,
    oracle: Box<dyn ContactOracle>,
    federation: Box<dyn FederationClient>,
    config: ControllerConfig,
    contacts: ContactWindowIndex,
    engine: PathEngine,
    ledger: ResourceLedger,
    entries: EntryRegistry,
    active: HashMap<SrId, ActivePath>,
    preemptions: HashMap<SrId, Vec<PreemptionRecord>>,
    last_replan: HashMap<SrId, Timestamp>,
    metrics: Arc<SchedulerMetrics>,
    wake_tx: SyncSender<()>,
    wake_rx: Receiver<()>,
}

impl Scheduler {
    /// Create a scheduler over the given collaborators.
    pub fn new(
        repo: Arc<dyn Repository>,
        sink: Arc<dyn CommandSink>,
        clock: Arc<dyn Clock>,
        oracle: Box<dyn ContactOracle>,
        config: ControllerConfig,
    ) -> Self {
        let (wake_tx, wake_rx) = sync_channel(1);
        Self {
            contacts: ContactWindowIndex::new(&config),
            engine: PathEngine::new(repo.clone()),
            ledger: ResourceLedger::new(repo.clone()),
            entries: EntryRegistry::new(),
            active: HashMap::new(),
            preemptions: HashMap::new(),
            last_replan: HashMap::new(),
            metrics: Arc::new(SchedulerMetrics::default()),
            federation: Box::new(DenyAllFederation),
            repo,
            sink,
            clock,
            oracle,
            config,
            wake_tx,
            wake_rx,
        }
    }

    /// Replace the federation client consulted for cross-domain requests.
    pub fn set_federation(&mut self, federation: Box<dyn FederationClient>) {
        self.federation = federation;
    }

    /// A handle for waking the loop early.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle { wake: self.wake_tx.clone() }
    }

    /// The scheduler's counters.
    pub fn metrics(&self) -> Arc<SchedulerMetrics> {
        self.metrics.clone()
    }

    /// The current contact-window index.
    pub fn contacts(&self) -> &ContactWindowIndex {
        &self.contacts
    }

    /// The resource ledger.
    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    /// The provisioned path of a service request, if any.
    pub fn active_path(&self, sr: &SrId) -> Option<&ActivePath> {
        self.active.get(sr)
    }

    /// The preemption records of a service request, oldest first.
    pub fn preemptions(&self, sr: &SrId) -> Vec<PreemptionRecord> {
        self.preemptions.get(sr).cloned().unwrap_or_default()
    }

    /// All live entry ids, sorted.
    pub fn live_entries(&self) -> Vec<EntryId> {
        self.entries.ids()
    }

    /// Run the replanning loop until `abort` is stopped. A tick that is already running when the
    /// stop arrives completes first.
    pub fn run(&mut self, abort: Stopper) {
        info!("Replanning loop started");
        loop {
            if abort.is_stop() {
                break;
            }
            self.tick();
            if abort.is_stop() {
                break;
            }
            match self.wake_rx.recv_timeout(self.config.replan_interval) {
                Ok(()) => {
                    // coalesce any further wake requests into this tick
                    while self.wake_rx.try_recv().is_ok() {}
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!("Replanning loop stopped");
    }

    /// Run one full tick: refresh windows, drive link beams and routes, admit requests, evaluate
    /// active paths, and send the finalize watermark.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        debug!("Tick at {}", now);
        self.refresh_contacts();
        self.schedule_link_beams();
        self.schedule_link_routes();
        self.admit_requests();
        self.evaluate_active_paths();
        self.finalize_agents(now);
        self.metrics.count_tick();
    }

    /// Rebuild the contact-window index from the oracle, as the first step of a tick.
    pub fn refresh_contacts(&mut self) {
        let now = self.clock.now();
        self.contacts.refresh(&*self.repo, &*self.oracle, now);
    }

    fn finalize_agents(&self, now: Timestamp) {
        for agent in self.sink.connected_agents() {
            if let Err(e) = self.sink.send_finalize(&agent, now) {
                debug!("Could not finalize {}: {}", agent, e);
            }
        }
    }

    /// Emit a CreateEntry unless the derived id is already live. Returns the id and whether a
    /// command was actually sent. On error nothing is tracked.
    pub(crate) fn emit_entry(
        &mut self,
        agent: &AgentId,
        scope: EntryScope,
        hop: usize,
        kind: &str,
        id_time: Timestamp,
        at: Timestamp,
        action: EntryAction,
    ) -> Result<(EntryId, bool), AcpError> {
        let entry = derive_entry_id(&scope, hop, kind, id_time);
        if self.entries.is_live(&entry) {
            return Ok((entry, false));
        }
        self.sink.send_create_entry(agent, &entry, at, action)?;
        self.entries.insert(EntryRecord {
            entry: entry.clone(),
            agent: agent.clone(),
            scope,
            kind: kind.to_string(),
        });
        self.metrics.count_entry_sent();
        Ok((entry, true))
    }

    /// Withdraw a previously emitted entry and release the power it held. The record must
    /// already be removed from the registry.
    pub(crate) fn cancel_entry(&mut self, record: &EntryRecord) {
        if self.sink.has_agent(&record.agent) {
            if let Err(e) = self.sink.send_delete_entry(&record.agent, &record.entry) {
                warn!("Could not delete {} at {}: {}", record.entry, record.agent, e);
            }
        } else {
            debug!("Agent {} is gone, dropping {}", record.agent, record.entry);
        }
        self.ledger.release_power(&record.entry);
        self.metrics.count_entry_deleted();
    }

    /// Remove and withdraw every live entry of a service request.
    pub(crate) fn cancel_request_entries(&mut self, sr: &SrId) {
        for record in self.entries.for_request(sr) {
            if self.entries.remove(&record.entry).is_some() {
                self.cancel_entry(&record);
            }
        }
    }
}
