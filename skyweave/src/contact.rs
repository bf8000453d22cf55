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

//! # Contact-window index
//!
//! A contact window is a time interval during which the two endpoints of a link are mutually
//! visible. Windows come from an external visibility oracle (orbital geometry is out of scope
//! here); when the oracle cannot answer for a link, the index falls back to a heuristic single
//! window whose duration depends on the link status.
//!
//! The index is rebuilt wholesale on every scheduler tick and consulted read-only by the path
//! engine and the link-driven scheduling passes.

use crate::config::ControllerConfig;
use crate::model::{Link, LinkId, LinkStatus};
use crate::repository::Repository;
use crate::time::{TimeInterval, Timestamp};

use log::*;
use std::collections::HashMap;
use thiserror::Error;

/// Error returned by a [`ContactOracle`].
#[derive(Debug, Error, PartialEq, Clone)]
pub enum OracleError {
    /// The oracle cannot compute windows for this link right now.
    #[error("Oracle unavailable: {0}")]
    Unavailable(String),
}

/// A visibility interval of one link, with a quality score (an SNR proxy in `[0, 1]`).
#[derive(Debug, Clone, PartialEq)]
pub struct ContactWindow {
    /// The visibility interval.
    pub interval: TimeInterval,
    /// Link quality during the window.
    pub quality: f64,
}

impl ContactWindow {
    /// Create a window from start and end timestamps with the given quality.
    pub fn new(start: Timestamp, end: Timestamp, quality: f64) -> Self {
        Self { interval: TimeInterval::new(start, end), quality }
    }
}

/// Source of contact windows, typically backed by an orbital-geometry sampler.
///
/// Implementations return the windows of one link within `[now, now + horizon]`, sorted by start
/// and non-overlapping. A failure makes the index fall back to the documented heuristic.
pub trait ContactOracle: Send + Sync {
    /// The visibility windows of `link` within the look-ahead horizon.
    fn windows(
        &self,
        link: &Link,
        now: Timestamp,
        horizon: i64,
    ) -> Result<Vec<ContactWindow>, OracleError>;
}

/// Oracle returning scripted windows per link. Links without a script have no visibility.
/// Used by tests and replay scenarios.
#[derive(Debug, Default)]
pub struct FixedOracle {
    windows: HashMap<LinkId, Vec<ContactWindow>>,
}

impl FixedOracle {
    /// Create an oracle with no windows scripted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the windows of one link, replacing any previous script.
    pub fn set_windows(&mut self, link: LinkId, mut windows: Vec<ContactWindow>) {
        windows.sort_by_key(|w| w.interval.start);
        self.windows.insert(link, windows);
    }
}

impl ContactOracle for FixedOracle {
    fn windows(
        &self,
        link: &Link,
        _now: Timestamp,
        _horizon: i64,
    ) -> Result<Vec<ContactWindow>, OracleError> {
        Ok(self.windows.get(&link.id).cloned().unwrap_or_default())
    }
}

/// Oracle that never answers, forcing the heuristic fallback for every link.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOracle;

impl ContactOracle for NoOracle {
    fn windows(
        &self,
        _link: &Link,
        _now: Timestamp,
        _horizon: i64,
    ) -> Result<Vec<ContactWindow>, OracleError> {
        Err(OracleError::Unavailable("no oracle configured".to_string()))
    }
}

/// The per-link window map, rebuilt each tick.
#[derive(Debug, Clone)]
pub struct ContactWindowIndex {
    horizon: i64,
    active_window: i64,
    potential_window: i64,
    windows: HashMap<LinkId, Vec<ContactWindow>>,
}

impl ContactWindowIndex {
    /// Create an empty index using the horizon and fallback durations from the configuration.
    pub fn new(config: &ControllerConfig) -> Self {
        Self {
            horizon: config.contact_horizon_s,
            active_window: config.default_active_window_s,
            potential_window: config.default_potential_window_s,
            windows: HashMap::new(),
        }
    }

    /// The look-ahead horizon in seconds.
    pub fn horizon(&self) -> i64 {
        self.horizon
    }

    /// Rebuild the index from the repository and the oracle.
    ///
    /// Every potential or active link is queried; an oracle failure falls back to the single
    /// heuristic window `[now, min(now + horizon, now + duration(status))]` where the duration is
    /// 45 minutes for active and 20 minutes for potential links.
    pub fn refresh(&mut self, repo: &dyn Repository, oracle: &dyn ContactOracle, now: Timestamp) {
        let mut windows = HashMap::new();
        for link in repo.list_links() {
            let link_windows = match oracle.windows(&link, now, self.horizon) {
                Ok(mut w) => {
                    w.sort_by_key(|w| w.interval.start);
                    w
                }
                Err(e) => {
                    debug!("Oracle failed for {}, using heuristic window: {}", link.id, e);
                    vec![self.heuristic_window(&link, now)]
                }
            };
            windows.insert(link.id.clone(), link_windows);
        }
        self.windows = windows;
    }

    fn heuristic_window(&self, link: &Link, now: Timestamp) -> ContactWindow {
        let duration = match link.status {
            LinkStatus::Active => self.active_window,
            LinkStatus::Potential => self.potential_window,
        };
        let end = (now + self.horizon).min(now + duration);
        ContactWindow::new(now, end, 0.5)
    }

    /// The windows of a link, sorted by start. Empty for unknown links.
    pub fn windows(&self, link: &LinkId) -> &[ContactWindow] {
        self.windows.get(link).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The window of `link` that fully contains `interval`, if any.
    pub fn window_containing(
        &self,
        link: &LinkId,
        interval: &TimeInterval,
    ) -> Option<&ContactWindow> {
        self.windows(link).iter().find(|w| w.interval.contains_interval(interval))
    }

    /// True if no link has any window.
    pub fn is_empty(&self) -> bool {
        self.windows.values().all(Vec::is_empty)
    }
}
