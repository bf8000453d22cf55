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

//! Tests for the beam-conflict engine and its resolution strategies.

use crate::beams::{
    detect_conflicts, BeamAssignment, BeamConflict, BeamConflictKind, BeamVerdict,
    EarliestDeadlineResolution, FairnessResolution, PriorityResolution, ResolutionStrategy,
};
use crate::model::{InterfaceId, ModelId, SrId, TransceiverModel};
use crate::time::{TimeInterval, Timestamp};

use assert_approx_eq::assert_approx_eq;

fn model(max_beams: usize, tx_power_dbw: f64, threshold: Option<f64>) -> TransceiverModel {
    TransceiverModel {
        id: ModelId::from("m1"),
        band_ghz: 10.0,
        max_beams,
        tx_power_dbw,
        interference_threshold_dbw: threshold,
        max_range_km: 2000.0,
    }
}

fn assignment(start: i64, end: i64, freq_ghz: f64, power_dbw: f64) -> BeamAssignment {
    BeamAssignment {
        interface: InterfaceId::from("a/wl0"),
        window: TimeInterval::new(Timestamp(start), Timestamp(end)),
        frequency_ghz: freq_ghz,
        bandwidth_ghz: 1.0,
        power_dbw,
        sr: None,
        priority: 0,
        fairness: 0.0,
        deadline: Timestamp(end),
    }
}

#[test]
fn concurrent_beams_beyond_the_model_limit_conflict() {
    let model = model(2, 20.0, None);
    let assignments = vec![
        assignment(0, 100, 10.0, 5.0),
        assignment(50, 150, 20.0, 5.0),
        assignment(80, 200, 30.0, 5.0),
    ];
    let conflicts = detect_conflicts(&assignments, &model);
    assert_eq!(conflicts.len(), 1);
    match &conflicts[0].kind {
        BeamConflictKind::ConcurrentBeams { allowed } => assert_eq!(*allowed, 2),
        other => panic!("unexpected conflict kind: {:?}", other),
    }
    assert_eq!(conflicts[0].assignments.len(), 3);
}

#[test]
fn sequential_beams_do_not_conflict() {
    let model = model(1, 20.0, None);
    let assignments = vec![
        assignment(0, 100, 10.0, 5.0),
        assignment(101, 200, 20.0, 5.0),
        assignment(201, 300, 30.0, 5.0),
    ];
    assert!(detect_conflicts(&assignments, &model).is_empty());
}

#[test]
fn power_above_the_model_limit_conflicts() {
    let model = model(8, 10.0, None);
    let assignments = vec![
        assignment(0, 100, 10.0, 9.0),
        assignment(200, 300, 20.0, 12.5),
    ];
    let conflicts = detect_conflicts(&assignments, &model);
    assert_eq!(conflicts.len(), 1);
    match &conflicts[0].kind {
        BeamConflictKind::PowerLimit { limit_dbw } => assert_eq!(*limit_dbw, 10.0),
        other => panic!("unexpected conflict kind: {:?}", other),
    }
    assert_eq!(conflicts[0].assignments.len(), 1);
    assert_eq!(conflicts[0].assignments[0].power_dbw, 12.5);
}

#[test]
fn close_frequencies_interfere() {
    // 10.00 and 10.05 GHz, 1 GHz bandwidth each, 10 and 9 dBW, threshold 1 dBW
    let model = model(8, 20.0, Some(1.0));
    let assignments = vec![
        assignment(0, 100, 10.00, 10.0),
        assignment(0, 100, 10.05, 9.0),
    ];
    let conflicts = detect_conflicts(&assignments, &model);
    assert_eq!(conflicts.len(), 1);
    match &conflicts[0].kind {
        BeamConflictKind::Frequency(details) => {
            assert!(details.interference_level_db > 1.0);
            // 9 dBW + 10 log10(1.95) - 0.05
            assert_approx_eq!(details.interference_level_db, 11.85, 0.01);
            assert_eq!(details.threshold_dbw, 1.0);
        }
        other => panic!("unexpected conflict kind: {:?}", other),
    }
    assert_eq!(conflicts[0].assignments.len(), 2);
}

#[test]
fn distant_frequencies_do_not_interfere() {
    let model = model(8, 20.0, Some(1.0));
    let assignments = vec![
        assignment(0, 100, 10.0, 10.0),
        assignment(0, 100, 14.0, 10.0),
    ];
    assert!(detect_conflicts(&assignments, &model).is_empty());
}

#[test]
fn time_disjoint_beams_do_not_interfere() {
    let model = model(8, 20.0, Some(1.0));
    let assignments = vec![
        assignment(0, 100, 10.00, 10.0),
        assignment(200, 300, 10.05, 9.0),
    ];
    assert!(detect_conflicts(&assignments, &model).is_empty());
}

fn two_way_conflict() -> BeamConflict {
    let mut first = assignment(0, 100, 10.0, 5.0);
    first.sr = Some(SrId::from("sr-low"));
    first.priority = 1;
    first.fairness = 0.9;
    first.deadline = Timestamp(500);
    let mut second = assignment(10, 110, 10.05, 5.0);
    second.sr = Some(SrId::from("sr-high"));
    second.priority = 7;
    second.fairness = 0.1;
    second.deadline = Timestamp(200);
    BeamConflict {
        kind: BeamConflictKind::ConcurrentBeams { allowed: 1 },
        assignments: vec![first, second],
    }
}

#[test]
fn priority_resolution_keeps_the_highest_priority() {
    let conflict = two_way_conflict();
    let actions = PriorityResolution::resolve(&conflict);
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].verdict, BeamVerdict::Cancel);
    assert_eq!(actions[0].assignment.sr, Some(SrId::from("sr-low")));
}

#[test]
fn earliest_deadline_resolution_keeps_the_tightest_deadline() {
    let conflict = two_way_conflict();
    let actions = EarliestDeadlineResolution::resolve(&conflict);
    assert_eq!(actions.len(), 1);
    // the second assignment has the earlier deadline, so the first is cancelled
    assert_eq!(actions[0].assignment.sr, Some(SrId::from("sr-low")));
}

#[test]
fn fairness_resolution_keeps_the_least_served() {
    let conflict = two_way_conflict();
    let actions = FairnessResolution::resolve(&conflict);
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].assignment.sr, Some(SrId::from("sr-low")));
}

#[test]
fn priority_ties_break_on_earliest_start() {
    let mut first = assignment(50, 100, 10.0, 5.0);
    first.sr = Some(SrId::from("late"));
    first.priority = 5;
    let mut second = assignment(0, 100, 10.05, 5.0);
    second.sr = Some(SrId::from("early"));
    second.priority = 5;
    let conflict = BeamConflict {
        kind: BeamConflictKind::ConcurrentBeams { allowed: 1 },
        assignments: vec![first, second],
    };
    let actions = PriorityResolution::resolve(&conflict);
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].assignment.sr, Some(SrId::from("late")));
}
