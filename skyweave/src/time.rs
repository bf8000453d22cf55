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

//! # Time
//!
//! All planning arithmetic is done on [`Timestamp`], an integer number of seconds since the Unix
//! epoch. Contact windows, path hops and scheduled commands all operate at one-second granularity,
//! so integer seconds keep every comparison and cost exact.
//!
//! Every component reads the current time through the [`Clock`] trait, never directly from the
//! operating system. The production implementation is [`SystemClock`], while tests drive a
//! [`ManualClock`] forward deterministically.

use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// A point in time, in whole seconds since the Unix epoch.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone, Copy, Default)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Returns the number of seconds from `earlier` until `self`. The result is negative if
    /// `earlier` lies after `self`.
    pub fn seconds_since(self, earlier: Timestamp) -> i64 {
        self.0 - earlier.0
    }

    /// Returns the later of the two timestamps.
    pub fn max(self, other: Timestamp) -> Timestamp {
        if self.0 >= other.0 {
            self
        } else {
            other
        }
    }

    /// Returns the earlier of the two timestamps.
    pub fn min(self, other: Timestamp) -> Timestamp {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

impl Add<i64> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: i64) -> Timestamp {
        Timestamp(self.0 + rhs)
    }
}

impl AddAssign<i64> for Timestamp {
    fn add_assign(&mut self, rhs: i64) {
        self.0 += rhs;
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = i64;

    fn sub(self, rhs: Timestamp) -> i64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A closed time interval `[start, end]`.
///
/// Intervals with `end < start` are considered empty. They can be constructed (the path engine
/// rejects them with an error), but [`TimeInterval::contains`] and [`TimeInterval::overlaps`]
/// always return `false` for them.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub struct TimeInterval {
    /// Start of the interval (inclusive).
    pub start: Timestamp,
    /// End of the interval (inclusive).
    pub end: Timestamp,
}

impl TimeInterval {
    /// Create a new interval from start and end.
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// Length of the interval in seconds, zero for empty intervals.
    pub fn duration(&self) -> i64 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start
        }
    }

    /// Returns true if `end < start`.
    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Returns true if `t` lies within the interval.
    pub fn contains(&self, t: Timestamp) -> bool {
        !self.is_empty() && self.start <= t && t <= self.end
    }

    /// Returns true if `other` lies entirely within `self`.
    pub fn contains_interval(&self, other: &TimeInterval) -> bool {
        !self.is_empty() && !other.is_empty() && self.start <= other.start && other.end <= self.end
    }

    /// Returns true if the two intervals share at least one point.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        !self.is_empty() && !other.is_empty() && self.start <= other.end && other.start <= self.end
    }

    /// Clamp the interval to `bounds`, returning `None` if nothing remains.
    pub fn clamp_to(&self, bounds: &TimeInterval) -> Option<TimeInterval> {
        let clamped =
            TimeInterval::new(self.start.max(bounds.start), self.end.min(bounds.end));
        if clamped.is_empty() {
            None
        } else {
            Some(clamped)
        }
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Source of the current time.
///
/// The scheduler, the contact-window index and the agent control plane never call
/// [`SystemTime::now`] directly. They take an `Arc<dyn Clock>` so that tests can substitute a
/// [`ManualClock`] and advance it deterministically.
pub trait Clock: Send + Sync {
    /// The current wall-clock time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock backed [`Clock`] used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(since_epoch.as_secs() as i64)
    }
}

/// Deterministic [`Clock`] for tests, advanced explicitly.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    /// Create a manual clock starting at the given time.
    pub fn starting_at(start: Timestamp) -> Self {
        Self { now: Mutex::new(start) }
    }

    /// Advance the clock by `seconds`.
    pub fn advance(&self, seconds: i64) {
        *self.now.lock().unwrap() += seconds;
    }

    /// Set the clock to an absolute time.
    pub fn set(&self, t: Timestamp) {
        *self.now.lock().unwrap() = t;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap()
    }
}
