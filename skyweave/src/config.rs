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

//! Controller configuration. All options carry defaults; loading them from files or flags is the
//! embedding process' concern.

use std::time::Duration;

/// Tunable options of the scheduler and the agent control plane.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Contact-window look-ahead horizon in seconds.
    pub contact_horizon_s: i64,
    /// Heuristic fallback window duration for active links, in seconds.
    pub default_active_window_s: i64,
    /// Heuristic fallback window duration for potential links, in seconds.
    pub default_potential_window_s: i64,
    /// Interval between scheduler ticks.
    pub replan_interval: Duration,
    /// Minimum spacing between consecutive replans of one service request, in seconds. A broken
    /// path bypasses this throttle.
    pub min_replan_interval_s: i64,
    /// Minimum window extension, in seconds, for a healthy path to be replanned onto a strictly
    /// better window.
    pub better_window_extension_s: i64,
    /// Depth of each agent's outgoing command queue.
    pub agent_queue_depth: usize,
    /// Default store-and-forward hold time used to size DTN storage reservations, in seconds.
    pub default_dtn_hold_s: i64,
    /// Number of worker threads for parallel path search within one tick. `None` disables
    /// parallel search; `Some(0)` uses one worker per CPU.
    pub path_worker_count: Option<usize>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            contact_horizon_s: 3600,
            default_active_window_s: 45 * 60,
            default_potential_window_s: 20 * 60,
            replan_interval: Duration::from_secs(15),
            min_replan_interval_s: 15,
            better_window_extension_s: 15,
            agent_queue_depth: 10,
            default_dtn_hold_s: 30,
            path_worker_count: None,
        }
    }
}
