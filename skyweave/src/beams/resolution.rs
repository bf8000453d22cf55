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

//! Resolution strategies for beam conflicts.
//!
//! A strategy looks at one conflict and decides which of its assignments survive. All strategies
//! keep exactly one assignment and cancel the rest; they differ in how the survivor is chosen.
//! The scheduler integrates a [`BeamVerdict::Cancel`] by withdrawing the corresponding entry.

use crate::beams::{BeamAssignment, BeamConflict};

use std::cmp::Ordering;

/// What to do with one assignment of a conflict.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum BeamVerdict {
    /// Withdraw the assignment.
    Cancel,
    /// Keep the assignment but shift it later in time.
    Delay,
    /// Keep the assignment with adjusted parameters (reduced power or bandwidth).
    Adjust,
}

/// One resolution decision.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamAction {
    /// The assignment the action applies to.
    pub assignment: BeamAssignment,
    /// The decision.
    pub verdict: BeamVerdict,
    /// Why the decision was taken.
    pub note: String,
}

/// Interface for choosing which assignments of a conflict to cancel.
pub trait ResolutionStrategy {
    /// Decide what happens to each assignment of the conflict. The returned actions cover only
    /// the assignments that do not survive.
    fn resolve(conflict: &BeamConflict) -> Vec<BeamAction>;
}

fn cancel_all_but(
    conflict: &BeamConflict,
    keep: usize,
    reason: &str,
) -> Vec<BeamAction> {
    conflict
        .assignments
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != keep)
        .map(|(_, a)| BeamAction {
            assignment: a.clone(),
            verdict: BeamVerdict::Cancel,
            note: reason.to_string(),
        })
        .collect()
}

/// Keep the highest-priority assignment; ties go to the earliest start.
#[derive(Debug, Clone, Copy)]
pub struct PriorityResolution;

impl ResolutionStrategy for PriorityResolution {
    fn resolve(conflict: &BeamConflict) -> Vec<BeamAction> {
        let keep = select(conflict, |a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.window.start.cmp(&b.window.start))
        });
        cancel_all_but(conflict, keep, "lost priority resolution")
    }
}

/// Keep the assignment with the earliest deadline.
#[derive(Debug, Clone, Copy)]
pub struct EarliestDeadlineResolution;

impl ResolutionStrategy for EarliestDeadlineResolution {
    fn resolve(conflict: &BeamConflict) -> Vec<BeamAction> {
        let keep = select(conflict, |a, b| a.deadline.cmp(&b.deadline));
        cancel_all_but(conflict, keep, "lost earliest-deadline resolution")
    }
}

/// Keep the assignment with the lowest fairness score; ties go to the earliest start.
#[derive(Debug, Clone, Copy)]
pub struct FairnessResolution;

impl ResolutionStrategy for FairnessResolution {
    fn resolve(conflict: &BeamConflict) -> Vec<BeamAction> {
        let keep = select(conflict, |a, b| {
            a.fairness
                .partial_cmp(&b.fairness)
                .unwrap_or(Ordering::Equal)
                .then(a.window.start.cmp(&b.window.start))
        });
        cancel_all_but(conflict, keep, "lost fairness resolution")
    }
}

/// Index of the assignment minimal under `order`.
fn select(
    conflict: &BeamConflict,
    order: impl Fn(&BeamAssignment, &BeamAssignment) -> Ordering,
) -> usize {
    let mut keep = 0;
    for (i, a) in conflict.assignments.iter().enumerate().skip(1) {
        if order(a, &conflict.assignments[keep]) == Ordering::Less {
            keep = i;
        }
    }
    keep
}
