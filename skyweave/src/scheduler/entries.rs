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

//! Deterministic entry identifiers and the live-entry registry.
//!
//! Every command the scheduler emits is identified by a string derived from what the command
//! does and when. Re-running a pass therefore derives the same ids, and the registry turns the
//! duplicate emission into a no-op.

use crate::model::{AgentId, EntryId, LinkId, SrId};
use crate::time::Timestamp;

use std::collections::HashMap;

/// What a scheduled entry belongs to: a link's own lifecycle, or a provisioned service request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryScope {
    /// Link-driven entry (beam or static route of a potential link).
    Link(LinkId),
    /// Entry materializing a hop of a service request's path.
    Request(SrId),
}

/// Derive the deterministic identifier of an entry.
///
/// The id encodes scope, owner, hop (or window) index, the action kind with its direction, and
/// the nominal action time. The same logical action always derives the same id.
pub fn derive_entry_id(scope: &EntryScope, hop: usize, kind: &str, at: Timestamp) -> EntryId {
    let owner = match scope {
        EntryScope::Link(link) => format!("link:{}", link),
        EntryScope::Request(sr) => format!("sr:{}", sr),
    };
    EntryId(format!("{}:{}:{}:{}", owner, hop, kind, at.0))
}

/// One live entry: a command in flight or installed at an agent.
#[derive(Debug, Clone)]
pub struct EntryRecord {
    /// The entry id.
    pub entry: EntryId,
    /// The agent holding the entry.
    pub agent: AgentId,
    /// What the entry belongs to.
    pub scope: EntryScope,
    /// The action kind the id was derived with (e.g. `"beam-up"`).
    pub kind: String,
}

/// Index of all live entries, by id and by owner.
#[derive(Debug, Default)]
pub struct EntryRegistry {
    by_id: HashMap<EntryId, EntryRecord>,
    by_link: HashMap<LinkId, Vec<EntryId>>,
    by_sr: HashMap<SrId, Vec<EntryId>>,
}

impl EntryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the entry is currently live.
    pub fn is_live(&self, entry: &EntryId) -> bool {
        self.by_id.contains_key(entry)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether no entries are live.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// All live entry ids, sorted.
    pub fn ids(&self) -> Vec<EntryId> {
        let mut ids: Vec<EntryId> = self.by_id.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Track a new live entry.
    pub fn insert(&mut self, record: EntryRecord) {
        match &record.scope {
            EntryScope::Link(link) => {
                self.by_link.entry(link.clone()).or_default().push(record.entry.clone())
            }
            EntryScope::Request(sr) => {
                self.by_sr.entry(sr.clone()).or_default().push(record.entry.clone())
            }
        }
        self.by_id.insert(record.entry.clone(), record);
    }

    /// Remove an entry from the registry, returning its record.
    pub fn remove(&mut self, entry: &EntryId) -> Option<EntryRecord> {
        let record = self.by_id.remove(entry)?;
        match &record.scope {
            EntryScope::Link(link) => {
                if let Some(ids) = self.by_link.get_mut(link) {
                    ids.retain(|id| id != entry);
                }
            }
            EntryScope::Request(sr) => {
                if let Some(ids) = self.by_sr.get_mut(sr) {
                    ids.retain(|id| id != entry);
                }
            }
        }
        Some(record)
    }

    /// The live entries recorded for a link, in emission order.
    pub fn for_link(&self, link: &LinkId) -> Vec<EntryRecord> {
        self.by_link
            .get(link)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    /// The live entries recorded for a service request, in emission order.
    pub fn for_request(&self, sr: &SrId) -> Vec<EntryRecord> {
        self.by_sr
            .get(sr)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).cloned().collect())
            .unwrap_or_default()
    }
}
