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

#![deny(missing_docs)]

//! # Skyweave: Scheduling Beams and Routes Across Constellation Networks
//!
//! This is a library implementing the controller core of a constellation network orchestrator:
//! the subsystem deciding, per planning tick, which radio beams to point, which routes to
//! install, and which service requests to provision across a time-varying mesh of nodes
//! connected by intermittent wireless links. It drives one remote agent per node over a
//! long-lived bidirectional control stream, issuing time-stamped configuration entries and
//! ingesting execution responses.
//!
//! ## Structure
//!
//! This library is structured in the following way:
//!
//! - **[`model`]**: The shared data model: nodes, interfaces, links, transceiver models,
//!   service requests, SR-policies, regions, domains and paths.
//!
//! - **[`repository`]**: The scenario store the controller plans against, consumed through the
//!   [`Repository`](repository::Repository) trait. [`MemoryRepository`](repository::MemoryRepository)
//!   is the in-process implementation.
//!
//! - **[`contact`]**: The contact-window index: per-link visibility intervals from an external
//!   oracle, with a documented heuristic fallback, rebuilt every tick.
//!
//! - **[`pathfind`]**: The time-expanded shortest-path engine, with a store-and-forward
//!   variant gated by node storage, SR-policy segment concatenation and region pathfinding.
//!
//! - **[`ledger`]**: The resource ledger: link bandwidth per service request, RF power per
//!   entry, storage bytes per request, with capacity enforcement and rollback.
//!
//! - **[`beams`]**: The beam-conflict engine: concurrent-beams, power-limit and
//!   frequency-interference detection, and pluggable resolution strategies.
//!
//! - **[`scheduler`]**: The orchestration loop tying everything together, and the surgical
//!   path-diff replanner.
//!
//! - **[`acp`]**: The agent control plane: per-agent sessions with bounded outgoing queues,
//!   token-versioned, sequence-numbered commands, and the narrow
//!   [`CommandSink`](acp::CommandSink) capability the scheduler emits through.
//!
//! - **[`federation`]**: The stub interface toward peer scheduling domains.
//!
//! ## Usage
//!
//! Build a [`MemoryRepository`](repository::MemoryRepository), open agent sessions on an
//! [`AcpServer`](acp::AcpServer), and run a [`Scheduler`](scheduler::Scheduler):
//!
//! ```
//! use skyweave::acp::AcpServer;
//! use skyweave::config::ControllerConfig;
//! use skyweave::contact::NoOracle;
//! use skyweave::repository::MemoryRepository;
//! use skyweave::scheduler::Scheduler;
//! use skyweave::time::SystemClock;
//! use std::sync::Arc;
//!
//! let repo = Arc::new(MemoryRepository::new());
//! let config = ControllerConfig::default();
//! let acp = Arc::new(AcpServer::new(repo.clone(), &config));
//! let mut scheduler = Scheduler::new(
//!     repo,
//!     acp,
//!     Arc::new(SystemClock),
//!     Box::new(NoOracle),
//!     config,
//! );
//! scheduler.tick();
//! ```

pub mod acp;
pub mod beams;
pub mod config;
pub mod contact;
mod error;
pub mod federation;
pub mod ledger;
pub mod model;
pub mod pathfind;
pub mod repository;
pub mod scheduler;
pub mod time;

mod test;

pub use error::Error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stopper, to check when to stop, or to send the stop command
#[derive(Clone, Debug, Default)]
pub struct Stopper {
    flag: Arc<AtomicBool>,
}

impl Stopper {
    /// Create a new stopper
    pub fn new() -> Self {
        Self::default()
    }

    /// Send the stop command.
    pub fn send_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Checks if the stop flag is set.
    pub fn is_stop(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
