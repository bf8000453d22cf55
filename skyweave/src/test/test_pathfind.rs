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

//! Tests for the time-expanded path engine.
//!
//! The fixture is a three-node chain:
//!
//! ```text
//! A ==l-ab== B ==l-bc== C
//! ```
//!
//! with scripted contact windows per test.

use crate::config::ControllerConfig;
use crate::contact::{ContactWindow, ContactWindowIndex, FixedOracle};
use crate::model::{
    Interface, InterfaceId, Link, LinkId, LinkStatus, Medium, Node, NodeId, PolicyId, Region,
    RegionId, SrPolicy,
};
use crate::pathfind::{PathEngine, PathError};
use crate::repository::MemoryRepository;
use crate::time::{TimeInterval, Timestamp};

use std::sync::Arc;

const T0: Timestamp = Timestamp(100_000);

fn chain_repo(b_storage: Option<u64>) -> Arc<MemoryRepository> {
    let repo = MemoryRepository::new();
    for (name, storage, coords) in &[
        ("a", None, [0.0, 0.0, 0.0]),
        ("b", b_storage, [1.0, 0.0, 0.0]),
        ("c", None, [5.0, 0.0, 0.0]),
    ] {
        repo.add_node(Node {
            id: NodeId::from(*name),
            platform: "sat".to_string(),
            storage_capacity: *storage,
            coordinates: Some(*coords),
        });
    }
    for (node, local) in &[("a", "wl0"), ("b", "wl0"), ("b", "wl1"), ("c", "wl0")] {
        repo.add_interface(Interface {
            id: InterfaceId(format!("{}/{}", node, local)),
            node: NodeId::from(*node),
            medium: Medium::Wireless,
            transceiver_model: None,
            operational: true,
        });
    }
    for (id, a, b) in &[("l-ab", "a/wl0", "b/wl0"), ("l-bc", "b/wl1", "c/wl0")] {
        repo.add_link(Link {
            id: LinkId::from(*id),
            iface_a: InterfaceId::from(*a),
            iface_b: InterfaceId::from(*b),
            medium: Medium::Wireless,
            status: LinkStatus::Potential,
            max_bandwidth_bps: 0,
        });
    }
    Arc::new(repo)
}

fn index_with(windows: &[(&str, i64, i64)]) -> ContactWindowIndex {
    let mut oracle = FixedOracle::new();
    let mut per_link: std::collections::HashMap<&str, Vec<ContactWindow>> =
        std::collections::HashMap::new();
    for (link, start, end) in windows {
        per_link
            .entry(*link)
            .or_default()
            .push(ContactWindow::new(T0 + *start, T0 + *end, 0.8));
    }
    for (link, windows) in per_link {
        oracle.set_windows(LinkId::from(link), windows);
    }
    let mut index = ContactWindowIndex::new(&ControllerConfig::default());
    index.refresh(&*chain_repo(None), &oracle, T0);
    index
}

fn horizon() -> TimeInterval {
    TimeInterval::new(T0, T0 + 3600)
}

#[test]
fn single_hop_path() {
    let repo = chain_repo(None);
    let engine = PathEngine::new(repo);
    let contacts = index_with(&[("l-ab", 60, 240)]);

    let path = engine
        .find_path(&contacts, &NodeId::from("a"), &NodeId::from("b"), horizon())
        .unwrap();
    assert_eq!(path.hops.len(), 1);
    assert_eq!(path.hops[0].link, LinkId::from("l-ab"));
    assert_eq!(path.hops[0].interval, TimeInterval::new(T0 + 60, T0 + 240));
    assert_eq!(path.total_latency, 180);
    assert_eq!(path.valid_from, T0 + 60);
    assert_eq!(path.valid_until, T0 + 240);
}

#[test]
fn multi_hop_path_waits_between_windows() {
    let repo = chain_repo(None);
    let engine = PathEngine::new(repo);
    let contacts = index_with(&[("l-ab", 60, 120), ("l-bc", 300, 360)]);

    let path = engine
        .find_path(&contacts, &NodeId::from("a"), &NodeId::from("c"), horizon())
        .unwrap();
    assert_eq!(path.hops.len(), 2);
    assert_eq!(path.hops[0].to, path.hops[1].from);
    assert_eq!(path.hops[1].interval, TimeInterval::new(T0 + 300, T0 + 360));
    // 60 s traversal + 180 s wait at b + 60 s traversal
    assert_eq!(path.total_latency, 300);
}

#[test]
fn trivial_path_for_self_loop() {
    let repo = chain_repo(None);
    let engine = PathEngine::new(repo);
    let contacts = index_with(&[]);
    let path = engine
        .find_path(&contacts, &NodeId::from("a"), &NodeId::from("a"), horizon())
        .unwrap();
    assert!(path.is_trivial());
    assert_eq!(path.total_latency, 0);
}

#[test]
fn unknown_nodes_and_negative_windows_are_rejected() {
    let repo = chain_repo(None);
    let engine = PathEngine::new(repo);
    let contacts = index_with(&[]);

    let err = engine
        .find_path(&contacts, &NodeId::from("a"), &NodeId::from("zz"), horizon())
        .unwrap_err();
    assert_eq!(err, PathError::UnknownNode(NodeId::from("zz")));

    let negative = TimeInterval::new(T0 + 100, T0);
    let err = engine
        .find_path(&contacts, &NodeId::from("a"), &NodeId::from("b"), negative)
        .unwrap_err();
    assert_eq!(err, PathError::InvalidWindow);
}

#[test]
fn no_windows_means_no_path() {
    let repo = chain_repo(None);
    let engine = PathEngine::new(repo);
    let contacts = index_with(&[("l-ab", 60, 120)]);
    let err = engine
        .find_path(&contacts, &NodeId::from("a"), &NodeId::from("c"), horizon())
        .unwrap_err();
    assert_eq!(
        err,
        PathError::NotFound { src: NodeId::from("a"), dst: NodeId::from("c") }
    );
}

#[test]
fn store_and_forward_records_the_storage_stop() {
    // A reaches B during [60, 120], the message waits at B (500 B free) until [300, 360]
    let repo = chain_repo(Some(500));
    let engine = PathEngine::new(repo);
    let contacts = index_with(&[("l-ab", 60, 120), ("l-bc", 300, 360)]);

    let dtn = engine
        .find_dtn_path(&contacts, &NodeId::from("a"), &NodeId::from("c"), 100, horizon())
        .unwrap();
    assert_eq!(dtn.hops.len(), 2);
    assert_eq!(dtn.storage_nodes, vec![NodeId::from("b")]);
    assert!(dtn.hops[0].storage_node.is_none());
    assert_eq!(dtn.hops[1].storage_node, Some(NodeId::from("b")));
    assert!(dtn.hops[1].storage_duration >= 180);
    assert!(dtn.total_delay >= 300);
}

#[test]
fn store_and_forward_fails_without_storage() {
    let repo = chain_repo(Some(50));
    let engine = PathEngine::new(repo);
    let contacts = index_with(&[("l-ab", 60, 120), ("l-bc", 300, 360)]);

    let err = engine
        .find_dtn_path(&contacts, &NodeId::from("a"), &NodeId::from("c"), 100, horizon())
        .unwrap_err();
    assert_eq!(
        err,
        PathError::NotFound { src: NodeId::from("a"), dst: NodeId::from("c") }
    );
}

#[test]
fn policy_path_concatenates_segments() {
    let repo = chain_repo(None);
    let engine = PathEngine::new(repo);
    let contacts = index_with(&[("l-ab", 60, 120), ("l-bc", 300, 360)]);
    let policy = SrPolicy {
        id: PolicyId::from("p1"),
        endpoint: NodeId::from("c"),
        segments: vec![NodeId::from("b"), NodeId::from("c")],
    };

    let path = engine
        .find_policy_path(&contacts, &NodeId::from("a"), &NodeId::from("c"), &policy, horizon())
        .unwrap();
    assert_eq!(path.hops.len(), 2);
    assert_eq!(path.hops[0].link, LinkId::from("l-ab"));
    assert_eq!(path.hops[1].link, LinkId::from("l-bc"));
}

#[test]
fn policy_must_terminate_at_the_destination() {
    let repo = chain_repo(None);
    let engine = PathEngine::new(repo);
    let contacts = index_with(&[("l-ab", 60, 120), ("l-bc", 300, 360)]);
    let policy = SrPolicy {
        id: PolicyId::from("p1"),
        endpoint: NodeId::from("c"),
        segments: vec![NodeId::from("b")],
    };

    let err = engine
        .find_policy_path(&contacts, &NodeId::from("a"), &NodeId::from("c"), &policy, horizon())
        .unwrap_err();
    assert_eq!(err, PathError::PolicyMismatch(PolicyId::from("p1")));
}

#[test]
fn region_path_picks_the_nearest_member() {
    let repo = chain_repo(None);
    let engine = PathEngine::new(repo);
    let contacts = index_with(&[("l-ab", 60, 120), ("l-bc", 300, 360)]);
    let region = Region {
        id: RegionId::from("r1"),
        members: vec![NodeId::from("b"), NodeId::from("c")],
    };

    // b is nearest to a by coordinates
    let member = engine.nearest_member(&region, &NodeId::from("a")).unwrap();
    assert_eq!(member, NodeId::from("b"));

    let path = engine
        .find_region_path(&contacts, &region, &NodeId::from("a"), true, horizon())
        .unwrap();
    assert_eq!(path.hops.len(), 1);
    assert_eq!(path.hops[0].to, NodeId::from("b"));

    let empty = Region { id: RegionId::from("r0"), members: Vec::new() };
    let err = engine.nearest_member(&empty, &NodeId::from("a")).unwrap_err();
    assert_eq!(err, PathError::EmptyRegion(RegionId::from("r0")));
}
