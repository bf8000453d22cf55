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

//! # Beam-conflict engine
//!
//! Pure analysis over a set of beam assignments on one interface: which assignments cannot
//! coexist under a transceiver model, and which to cancel under a chosen
//! [`ResolutionStrategy`](resolution::ResolutionStrategy).
//!
//! Three conflict classes exist: more mutually overlapping beams than the transceiver can point,
//! a beam exceeding the transmit power of the model, and a pair of beams whose frequency
//! separation is too small for their bandwidths and powers.

pub mod resolution;

pub use resolution::{
    BeamAction, BeamVerdict, EarliestDeadlineResolution, FairnessResolution, PriorityResolution,
    ResolutionStrategy,
};

use crate::model::{InterfaceId, SrId, TransceiverModel};
use crate::time::{TimeInterval, Timestamp};

use itertools::Itertools;
use std::collections::HashSet;

/// Interference threshold applied when the transceiver model does not carry one, in dBW.
pub const DEFAULT_INTERFERENCE_THRESHOLD_DBW: f64 = 3.0;

/// One beam an interface is asked to point during a time window.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamAssignment {
    /// The transmitting interface.
    pub interface: InterfaceId,
    /// When the beam is up.
    pub window: TimeInterval,
    /// Center frequency in GHz.
    pub frequency_ghz: f64,
    /// Occupied bandwidth in GHz.
    pub bandwidth_ghz: f64,
    /// Transmit power in dBW.
    pub power_dbw: f64,
    /// The service request this beam serves, if any.
    pub sr: Option<SrId>,
    /// Priority inherited from the service request.
    pub priority: i32,
    /// Fairness score; lower values have received less service recently.
    pub fairness: f64,
    /// Latest completion time the beam's traffic tolerates.
    pub deadline: Timestamp,
}

/// Details of a frequency-interference conflict.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyDetails {
    /// Worst-case interference level seen by the reference assignment, in dB.
    pub interference_level_db: f64,
    /// The threshold that was exceeded, in dBW.
    pub threshold_dbw: f64,
}

/// What kind of conflict was detected.
#[derive(Debug, Clone, PartialEq)]
pub enum BeamConflictKind {
    /// More beams overlap in time than the transceiver can point concurrently.
    ConcurrentBeams {
        /// The number of beams the model allows.
        allowed: usize,
    },
    /// An assignment's transmit power exceeds the model's.
    PowerLimit {
        /// The model's transmit power in dBW.
        limit_dbw: f64,
    },
    /// Two or more assignments interfere in frequency.
    Frequency(FrequencyDetails),
}

/// A detected conflict and the assignments participating in it.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamConflict {
    /// What was detected.
    pub kind: BeamConflictKind,
    /// The participating assignments.
    pub assignments: Vec<BeamAssignment>,
}

/// Detect all conflicts in a set of assignments under a transceiver model.
pub fn detect_conflicts(
    assignments: &[BeamAssignment],
    model: &TransceiverModel,
) -> Vec<BeamConflict> {
    let mut conflicts = Vec::new();
    conflicts.extend(concurrent_conflicts(assignments, model));
    conflicts.extend(power_conflicts(assignments, model));
    conflicts.extend(frequency_conflicts(assignments, model));
    conflicts
}

/// Sweep over the assignments sorted by start: every maximal set of mutually overlapping
/// assignments larger than `model.max_beams` is one conflict.
fn concurrent_conflicts(
    assignments: &[BeamAssignment],
    model: &TransceiverModel,
) -> Vec<BeamConflict> {
    let order: Vec<usize> = (0..assignments.len())
        .sorted_by_key(|i| assignments[*i].window.start)
        .collect();

    let mut conflicts = Vec::new();
    let mut reported: HashSet<Vec<usize>> = HashSet::new();
    for (pos, i) in order.iter().enumerate() {
        // assignments overlapping the start of assignment i
        let mut group: Vec<usize> = order[..pos]
            .iter()
            .copied()
            .filter(|j| assignments[*j].window.overlaps(&assignments[*i].window))
            .collect();
        group.push(*i);
        // mutual overlap: everyone must cover the latest start in the group
        let latest_start = assignments[*i].window.start;
        group.retain(|j| assignments[*j].window.contains(latest_start));
        if group.len() > model.max_beams {
            let mut key = group.clone();
            key.sort_unstable();
            if reported.insert(key.clone()) {
                conflicts.push(BeamConflict {
                    kind: BeamConflictKind::ConcurrentBeams { allowed: model.max_beams },
                    assignments: key.iter().map(|j| assignments[*j].clone()).collect(),
                });
            }
        }
    }
    conflicts
}

/// All assignments whose power exceeds the model's transmit power form one conflict.
fn power_conflicts(
    assignments: &[BeamAssignment],
    model: &TransceiverModel,
) -> Vec<BeamConflict> {
    let offenders: Vec<BeamAssignment> = assignments
        .iter()
        .filter(|a| a.power_dbw > model.tx_power_dbw)
        .cloned()
        .collect();
    if offenders.is_empty() {
        return Vec::new();
    }
    vec![BeamConflict {
        kind: BeamConflictKind::PowerLimit { limit_dbw: model.tx_power_dbw },
        assignments: offenders,
    }]
}

/// Interference contributed by `peer` onto `subject`, in dB, or `None` if the two do not
/// overlap in time or frequency.
fn interference_contribution(subject: &BeamAssignment, peer: &BeamAssignment) -> Option<f64> {
    if !subject.window.overlaps(&peer.window) {
        return None;
    }
    let freq_sep = (subject.frequency_ghz - peer.frequency_ghz).abs();
    let sum_half_bw = (subject.bandwidth_ghz + peer.bandwidth_ghz) / 2.0;
    if sum_half_bw <= 0.0 || freq_sep >= sum_half_bw {
        return None;
    }
    let overlap_ratio = (sum_half_bw - freq_sep) / sum_half_bw;
    Some(peer.power_dbw + 10.0 * (overlap_ratio + 1.0).log10() - freq_sep / subject.bandwidth_ghz)
}

/// For each reference assignment, the worst interference over its time-overlapping peers. A
/// conflict is reported (once per participant set) when it exceeds the model threshold.
fn frequency_conflicts(
    assignments: &[BeamAssignment],
    model: &TransceiverModel,
) -> Vec<BeamConflict> {
    let threshold = model
        .interference_threshold_dbw
        .unwrap_or(DEFAULT_INTERFERENCE_THRESHOLD_DBW);

    let mut conflicts = Vec::new();
    let mut involved: HashSet<usize> = HashSet::new();
    for (i, subject) in assignments.iter().enumerate() {
        if involved.contains(&i) {
            continue;
        }
        let mut worst: f64 = f64::NEG_INFINITY;
        let mut peers: Vec<usize> = Vec::new();
        for (j, peer) in assignments.iter().enumerate() {
            if i == j {
                continue;
            }
            if let Some(level) = interference_contribution(subject, peer) {
                if level > worst {
                    worst = level;
                }
                if level > threshold {
                    peers.push(j);
                }
            }
        }
        if worst > threshold && !peers.is_empty() {
            let mut members = vec![i];
            members.extend(peers.iter().copied());
            for m in &members {
                involved.insert(*m);
            }
            conflicts.push(BeamConflict {
                kind: BeamConflictKind::Frequency(FrequencyDetails {
                    interference_level_db: worst,
                    threshold_dbw: threshold,
                }),
                assignments: members.iter().map(|m| assignments[*m].clone()).collect(),
            });
        }
    }
    conflicts
}
