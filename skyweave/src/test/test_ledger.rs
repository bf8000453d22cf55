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

//! Tests for the resource ledger: bandwidth caps, rollback, power and storage accounting.

use crate::ledger::{LedgerError, ResourceLedger};
use crate::model::{
    EntryId, FlowRequirements, Interface, InterfaceId, Link, LinkId, Medium, Node, NodeId, SrId,
};
use crate::model::LinkStatus;
use crate::repository::{MemoryRepository, Repository};
use crate::time::{TimeInterval, Timestamp};

use std::sync::Arc;

fn capped_link(id: &str, max_bps: u64) -> Link {
    Link {
        id: LinkId::from(id),
        iface_a: InterfaceId::from("a/wl0"),
        iface_b: InterfaceId::from("b/wl0"),
        medium: Medium::Wireless,
        status: LinkStatus::Potential,
        max_bandwidth_bps: max_bps,
    }
}

fn test_repo() -> Arc<MemoryRepository> {
    let repo = MemoryRepository::new();
    repo.add_node(Node {
        id: NodeId::from("a"),
        platform: "sat".to_string(),
        storage_capacity: Some(500),
        coordinates: None,
    });
    repo.add_node(Node {
        id: NodeId::from("b"),
        platform: "sat".to_string(),
        storage_capacity: None,
        coordinates: None,
    });
    repo.add_interface(Interface {
        id: InterfaceId::from("a/wl0"),
        node: NodeId::from("a"),
        medium: Medium::Wireless,
        transceiver_model: None,
        operational: true,
    });
    repo.add_interface(Interface {
        id: InterfaceId::from("b/wl0"),
        node: NodeId::from("b"),
        medium: Medium::Wireless,
        transceiver_model: None,
        operational: true,
    });
    repo.add_link(capped_link("l1", 1_000_000));
    repo.add_link(capped_link("l2", 0));
    repo.add_link(capped_link("l3", 1_000_000));
    Arc::new(repo)
}

#[test]
fn bandwidth_respects_the_link_cap() {
    let repo = test_repo();
    let mut ledger = ResourceLedger::new(repo);
    let l1 = LinkId::from("l1");

    ledger.reserve_bandwidth(&SrId::from("sr1"), &l1, 600_000).unwrap();
    let err = ledger.reserve_bandwidth(&SrId::from("sr2"), &l1, 600_000).unwrap_err();
    match err {
        LedgerError::InsufficientCapacity { available_bps, .. } => {
            assert_eq!(available_bps, 400_000)
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(ledger.available(&l1).unwrap(), Some(400_000));
}

#[test]
fn unlimited_links_always_have_room() {
    let repo = test_repo();
    let mut ledger = ResourceLedger::new(repo);
    let l2 = LinkId::from("l2");
    ledger.reserve_bandwidth(&SrId::from("sr1"), &l2, u64::max_value() / 4).unwrap();
    assert_eq!(ledger.available(&l2).unwrap(), None);
}

#[test]
fn re_reserving_the_same_pair_is_idempotent() {
    let repo = test_repo();
    let mut ledger = ResourceLedger::new(repo);
    let l1 = LinkId::from("l1");
    let sr = SrId::from("sr1");

    ledger.reserve_bandwidth(&sr, &l1, 800_000).unwrap();
    ledger.reserve_bandwidth(&sr, &l1, 800_000).unwrap();
    assert_eq!(ledger.reserved_on_link(&l1), 800_000);
    assert_eq!(ledger.available(&l1).unwrap(), Some(200_000));

    // adjusting the amount replaces the reservation instead of accumulating
    ledger.reserve_bandwidth(&sr, &l1, 300_000).unwrap();
    assert_eq!(ledger.available(&l1).unwrap(), Some(700_000));
}

#[test]
fn release_returns_bandwidth_to_the_pre_provisioning_value() {
    let repo = test_repo();
    let mut ledger = ResourceLedger::new(repo);
    let l1 = LinkId::from("l1");
    let before = ledger.available(&l1).unwrap();

    ledger.reserve_bandwidth(&SrId::from("sr1"), &l1, 1_000_000).unwrap();
    assert_eq!(ledger.available(&l1).unwrap(), Some(0));
    ledger.release_request(&SrId::from("sr1"));
    assert_eq!(ledger.available(&l1).unwrap(), before);
}

#[test]
fn reserve_path_rolls_back_on_failure() {
    let repo = test_repo();
    let mut ledger = ResourceLedger::new(repo);
    let l1 = LinkId::from("l1");
    let l3 = LinkId::from("l3");

    // occupy l3 so the second hop of the path fails
    ledger.reserve_bandwidth(&SrId::from("other"), &l3, 900_000).unwrap();

    let links = vec![l1.clone(), l3.clone()];
    let err = ledger.reserve_path(&SrId::from("sr1"), &links, 500_000);
    assert!(err.is_err());
    // the successful l1 reservation was undone
    assert_eq!(ledger.available(&l1).unwrap(), Some(1_000_000));
    assert!(ledger.links_of(&SrId::from("sr1")).is_empty());
}

#[test]
fn power_allocations_are_keyed_by_entry() {
    let repo = test_repo();
    let mut ledger = ResourceLedger::new(repo.clone());
    let iface = InterfaceId::from("a/wl0");
    let e1 = EntryId::from("e1");
    let e2 = EntryId::from("e2");

    ledger.allocate_power(&iface, &e1, 5.0, Some(12.0)).unwrap();
    ledger.allocate_power(&iface, &e2, 6.0, Some(12.0)).unwrap();
    let err = ledger.allocate_power(&iface, &EntryId::from("e3"), 2.0, Some(12.0)).unwrap_err();
    assert_eq!(err, LedgerError::PowerLimitExceeded(iface.clone()));

    ledger.release_power(&e1);
    assert!((ledger.power_on_interface(&iface) - 6.0).abs() < 1e-9);
    // releasing an unknown entry is a no-op
    ledger.release_power(&EntryId::from("unknown"));
}

#[test]
fn storage_respects_node_capacity() {
    let repo = test_repo();
    let mut ledger = ResourceLedger::new(repo.clone());
    let a = NodeId::from("a");
    let sr = SrId::from("sr1");

    assert_eq!(ledger.storage_available(&a).unwrap(), 500);
    ledger.reserve_storage(&sr, &a, 400).unwrap();
    let err = ledger.reserve_storage(&SrId::from("sr2"), &a, 200).unwrap_err();
    match err {
        LedgerError::InsufficientStorage { available, .. } => assert_eq!(available, 100),
        other => panic!("unexpected error: {}", other),
    }
    ledger.release_storage(&sr);
    assert_eq!(repo.get_storage_usage(&a).unwrap(), 0);

    // nodes without configured capacity hold nothing
    assert_eq!(ledger.storage_available(&NodeId::from("b")).unwrap(), 0);
}

#[test]
fn dtn_storage_requirement_has_a_floor() {
    let flow = |bps| FlowRequirements {
        requested_bps: bps,
        min_bps: 0,
        validity: TimeInterval::new(Timestamp(0), Timestamp(3600)),
    };
    // 1 Mbit/s floor, held 30 s, in bytes
    assert_eq!(ResourceLedger::dtn_storage_requirement(&flow(0), 30), 3_750_000);
    assert_eq!(ResourceLedger::dtn_storage_requirement(&flow(2_000_000), 30), 7_500_000);
}
