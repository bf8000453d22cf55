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

//! Tests for timestamps, intervals and the manual clock.

use crate::time::{Clock, ManualClock, TimeInterval, Timestamp};

#[test]
fn timestamp_arithmetic() {
    let t = Timestamp(1000);
    assert_eq!(t + 60, Timestamp(1060));
    assert_eq!(Timestamp(1060) - t, 60);
    assert_eq!(t.seconds_since(Timestamp(400)), 600);
    assert_eq!(Timestamp(400).seconds_since(t), -600);
    assert_eq!(t.max(Timestamp(999)), t);
    assert_eq!(t.min(Timestamp(999)), Timestamp(999));
}

#[test]
fn interval_containment_and_overlap() {
    let iv = TimeInterval::new(Timestamp(100), Timestamp(200));
    assert_eq!(iv.duration(), 100);
    assert!(iv.contains(Timestamp(100)));
    assert!(iv.contains(Timestamp(200)));
    assert!(!iv.contains(Timestamp(201)));

    let inner = TimeInterval::new(Timestamp(120), Timestamp(180));
    assert!(iv.contains_interval(&inner));
    assert!(!inner.contains_interval(&iv));

    let touching = TimeInterval::new(Timestamp(200), Timestamp(300));
    assert!(iv.overlaps(&touching));
    let disjoint = TimeInterval::new(Timestamp(201), Timestamp(300));
    assert!(!iv.overlaps(&disjoint));
}

#[test]
fn empty_intervals_contain_nothing() {
    let empty = TimeInterval::new(Timestamp(200), Timestamp(100));
    assert!(empty.is_empty());
    assert_eq!(empty.duration(), 0);
    assert!(!empty.contains(Timestamp(150)));
    assert!(!empty.overlaps(&TimeInterval::new(Timestamp(0), Timestamp(1000))));
}

#[test]
fn interval_clamping() {
    let iv = TimeInterval::new(Timestamp(100), Timestamp(500));
    let bounds = TimeInterval::new(Timestamp(200), Timestamp(300));
    assert_eq!(
        iv.clamp_to(&bounds),
        Some(TimeInterval::new(Timestamp(200), Timestamp(300)))
    );
    let outside = TimeInterval::new(Timestamp(600), Timestamp(700));
    assert_eq!(iv.clamp_to(&outside), None);
}

#[test]
fn manual_clock_advances_deterministically() {
    let clock = ManualClock::starting_at(Timestamp(1000));
    assert_eq!(clock.now(), Timestamp(1000));
    clock.advance(15);
    assert_eq!(clock.now(), Timestamp(1015));
    clock.set(Timestamp(2000));
    assert_eq!(clock.now(), Timestamp(2000));
}
