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

//! Priority ordering of service requests.
//!
//! Not a long-lived heap: the admission pass rebuilds the queue from the repository on every
//! tick, sorts it once, and drains it.

use crate::model::ServiceRequest;

use std::sync::Mutex;

/// A mutex-guarded, stable, descending-priority queue of service requests.
#[derive(Debug, Default)]
pub struct SrQueue {
    inner: Mutex<Vec<ServiceRequest>>,
}

impl SrQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a request. Concurrent pushes are admitted; call
    /// [`SrQueue::sort_by_priority`] before draining.
    pub fn push(&self, sr: ServiceRequest) {
        self.inner.lock().unwrap().push(sr);
    }

    /// Remove and return the highest-priority request.
    pub fn pop(&self) -> Option<ServiceRequest> {
        let mut inner = self.inner.lock().unwrap();
        if inner.is_empty() {
            None
        } else {
            Some(inner.remove(0))
        }
    }

    /// The highest-priority request without removing it.
    pub fn peek(&self) -> Option<ServiceRequest> {
        self.inner.lock().unwrap().first().cloned()
    }

    /// Number of queued requests.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Stable sort by descending priority. Requests of equal priority keep their push order.
    pub fn sort_by_priority(&self) {
        self.inner.lock().unwrap().sort_by(|a, b| b.priority.cmp(&a.priority));
    }
}
