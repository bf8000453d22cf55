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

//! Tests for the scheduler's link-driven passes and the admission pass.
//!
//! The fixture is a three-node chain with one agent per node:
//!
//! ```text
//! A ==l-ab== B ==l-bc== C
//! ```

use crate::acp::{
    channel_pair, AcpServer, AgentEndpoint, AgentMessage, CommandSink, ControllerCommand,
    EntryAction,
};
use crate::config::ControllerConfig;
use crate::contact::{ContactWindow, FixedOracle};
use crate::federation::GrantAllFederation;
use crate::model::{
    AgentId, Domain, DomainId, FlowRequirements, Interface, InterfaceId, Link, LinkId,
    LinkStatus, Medium, ModelId, Node, NodeId, PolicyId, ServiceRequest, SrId, SrPolicy,
    SrStatus, TransceiverModel,
};
use crate::repository::{MemoryRepository, Repository};
use crate::scheduler::{Scheduler, SrQueue};
use crate::time::{ManualClock, TimeInterval, Timestamp};
use crate::Stopper;

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const T0: Timestamp = Timestamp(100_000);

lazy_static! {
    static ref L_AB: LinkId = LinkId::from("l-ab");
    static ref L_BC: LinkId = LinkId::from("l-bc");
}

struct Rig {
    repo: Arc<MemoryRepository>,
    server: Arc<AcpServer>,
    clock: Arc<ManualClock>,
    scheduler: Scheduler,
    endpoints: HashMap<String, AgentEndpoint>,
    sessions: Vec<JoinHandle<()>>,
}

impl Rig {
    /// Build the three-node chain with the given link capacities (0 = unlimited) and contact
    /// windows (relative to `T0`), and connect all three agents.
    fn new(caps: &[(&str, u64)], windows: &[(&str, i64, i64)]) -> Rig {
        Rig::with_workers(caps, windows, None)
    }

    fn with_workers(
        caps: &[(&str, u64)],
        windows: &[(&str, i64, i64)],
        path_workers: Option<usize>,
    ) -> Rig {
        let _ = pretty_env_logger::try_init();
        let repo = Arc::new(MemoryRepository::new());
        repo.add_model(TransceiverModel {
            id: ModelId::from("m1"),
            band_ghz: 10.0,
            max_beams: 4,
            tx_power_dbw: 10.0,
            interference_threshold_dbw: None,
            max_range_km: 2000.0,
        });
        for (node, storage) in &[("a", Some(10_000_000)), ("b", Some(10_000_000)), ("c", None)] {
            repo.add_node(Node {
                id: NodeId::from(*node),
                platform: "sat".to_string(),
                storage_capacity: *storage,
                coordinates: None,
            });
        }
        for (node, local) in &[("a", "wl0"), ("b", "wl0"), ("b", "wl1"), ("c", "wl0")] {
            repo.add_interface(Interface {
                id: InterfaceId(format!("{}/{}", node, local)),
                node: NodeId::from(*node),
                medium: Medium::Wireless,
                transceiver_model: Some(ModelId::from("m1")),
                operational: true,
            });
        }
        let caps: HashMap<&str, u64> = caps.iter().cloned().collect();
        for (id, a, b) in &[("l-ab", "a/wl0", "b/wl0"), ("l-bc", "b/wl1", "c/wl0")] {
            repo.add_link(Link {
                id: LinkId::from(*id),
                iface_a: InterfaceId::from(*a),
                iface_b: InterfaceId::from(*b),
                medium: Medium::Wireless,
                status: LinkStatus::Potential,
                max_bandwidth_bps: caps.get(id).copied().unwrap_or(0),
            });
        }
        for node in &["a", "b", "c"] {
            repo.register_agent(AgentId(format!("agent-{}", node)), NodeId::from(*node));
        }

        let mut config = ControllerConfig::default();
        config.agent_queue_depth = 64;
        config.path_worker_count = path_workers;
        let server = Arc::new(AcpServer::new(repo.clone(), &config));
        let clock = Arc::new(ManualClock::starting_at(T0));

        let mut oracle = FixedOracle::new();
        let mut per_link: HashMap<&str, Vec<ContactWindow>> = HashMap::new();
        for (link, start, end) in windows {
            per_link
                .entry(*link)
                .or_default()
                .push(ContactWindow::new(T0 + *start, T0 + *end, 0.8));
        }
        for (link, windows) in per_link {
            oracle.set_windows(LinkId::from(link), windows);
        }

        let scheduler = Scheduler::new(
            repo.clone(),
            server.clone(),
            clock.clone(),
            Box::new(oracle),
            config,
        );

        let mut rig = Rig {
            repo,
            server,
            clock,
            scheduler,
            endpoints: HashMap::new(),
            sessions: Vec::new(),
        };
        for node in &["a", "b", "c"] {
            rig.connect_agent(&format!("agent-{}", node));
        }
        rig
    }

    fn connect_agent(&mut self, agent: &str) {
        let (conn, endpoint) = channel_pair();
        let server = self.server.clone();
        self.sessions.push(thread::spawn(move || {
            let _ = server.serve_connection(Box::new(conn));
        }));
        endpoint.send(AgentMessage::Hello { agent: AgentId::from(agent) }).unwrap();
        let id = AgentId::from(agent);
        for _ in 0..500 {
            if self.server.has_agent(&id) {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert!(self.server.has_agent(&id));
        self.endpoints.insert(agent.to_string(), endpoint);
    }

    /// Drain every command currently delivered to an agent. Commands sit in the session queue
    /// only briefly (the forwarder copies them to the stream), so poll until quiet.
    fn drain(&self, agent: &str) -> Vec<ControllerCommand> {
        let endpoint = &self.endpoints[agent];
        let mut commands = Vec::new();
        let mut quiet = 0;
        while quiet < 5 {
            let batch = endpoint.drain();
            if batch.is_empty() {
                quiet += 1;
                thread::sleep(Duration::from_millis(2));
            } else {
                quiet = 0;
                commands.extend(batch);
            }
        }
        commands
    }

    fn drain_all(&self) -> Vec<ControllerCommand> {
        let mut commands = Vec::new();
        for agent in &["agent-a", "agent-b", "agent-c"] {
            commands.extend(self.drain(agent));
        }
        commands
    }

    fn add_sr(&self, id: &str, src: &str, dst: &str, priority: i32, bps: u64, dtn: bool) {
        self.repo.add_service_request(ServiceRequest {
            id: SrId::from(id),
            src: NodeId::from(src),
            dst: NodeId::from(dst),
            priority,
            flow: FlowRequirements {
                requested_bps: bps,
                min_bps: bps / 2,
                validity: TimeInterval::new(T0, T0 + 7200),
            },
            disruption_tolerant: dtn,
            policy: None,
            source_domain: None,
            dest_domain: None,
            federation_token: None,
            status: SrStatus::default(),
        });
    }

    fn status(&self, sr: &str) -> SrStatus {
        self.repo.get_service_request_status(&SrId::from(sr)).unwrap()
    }
}

fn creates(commands: &[ControllerCommand]) -> Vec<&ControllerCommand> {
    commands
        .iter()
        .filter(|c| matches!(c, ControllerCommand::CreateEntry { .. }))
        .collect()
}

fn deletes(commands: &[ControllerCommand]) -> Vec<&ControllerCommand> {
    commands
        .iter()
        .filter(|c| matches!(c, ControllerCommand::DeleteEntry { .. }))
        .collect()
}

#[test]
fn link_beams_emit_one_pair_per_window() {
    let mut rig = Rig::new(&[], &[("l-ab", 60, 240)]);
    let token = rig.server.current_token(&AgentId::from("agent-a")).unwrap();
    rig.scheduler.refresh_contacts();
    rig.scheduler.schedule_link_beams();

    let commands = rig.drain("agent-a");
    assert_eq!(commands.len(), 2);
    match &commands[0] {
        ControllerCommand::CreateEntry { at, action, token: t, seqno, .. } => {
            assert!(matches!(action, EntryAction::UpdateBeam(_)));
            assert_eq!(*at, T0 + 60);
            assert_eq!(*seqno, 1);
            assert_eq!(t, &token);
            if let EntryAction::UpdateBeam(spec) = action {
                assert_eq!(spec.link, *L_AB);
                assert_eq!(spec.local_node, NodeId::from("a"));
                assert_eq!(spec.remote_node, NodeId::from("b"));
                assert_eq!(spec.power_dbw, 10.0);
            }
        }
        other => panic!("expected CreateEntry, got {:?}", other),
    }
    match &commands[1] {
        ControllerCommand::CreateEntry { at, action, seqno, .. } => {
            assert!(matches!(action, EntryAction::DeleteBeam(_)));
            assert_eq!(*at, T0 + 240);
            assert_eq!(*seqno, 2);
        }
        other => panic!("expected CreateEntry, got {:?}", other),
    }
    // nothing for the windowless link, nothing at the other agents
    assert!(rig.drain("agent-b").is_empty());
    assert!(rig.drain("agent-c").is_empty());
}

#[test]
fn beam_pass_is_idempotent_within_a_tick() {
    let mut rig = Rig::new(&[], &[("l-ab", 60, 240)]);
    rig.scheduler.refresh_contacts();
    rig.scheduler.schedule_link_beams();
    let first = rig.drain("agent-a");
    assert_eq!(first.len(), 2);

    rig.scheduler.schedule_link_beams();
    assert!(rig.drain("agent-a").is_empty());
    assert_eq!(rig.scheduler.metrics().entries_sent(), 2);
}

#[test]
fn beam_start_is_clamped_to_now() {
    let mut rig = Rig::new(&[], &[("l-ab", -60, 240)]);
    rig.scheduler.refresh_contacts();
    rig.scheduler.schedule_link_beams();
    let commands = rig.drain("agent-a");
    match &commands[0] {
        ControllerCommand::CreateEntry { at, .. } => assert_eq!(*at, T0),
        other => panic!("expected CreateEntry, got {:?}", other),
    }
}

#[test]
fn link_routes_emit_four_commands_per_window() {
    let mut rig = Rig::new(&[], &[("l-ab", 60, 240)]);
    rig.scheduler.refresh_contacts();
    rig.scheduler.schedule_link_routes();

    let on_a = rig.drain("agent-a");
    assert_eq!(on_a.len(), 2);
    match &on_a[0] {
        ControllerCommand::CreateEntry { at, action, .. } => {
            assert_eq!(*at, T0 + 60);
            match action {
                EntryAction::SetRoute(route) => {
                    assert_eq!(route.prefix, "node:b/32");
                    assert_eq!(route.next_hop, NodeId::from("b"));
                    assert_eq!(route.device, InterfaceId::from("a/wl0"));
                }
                other => panic!("expected SetRoute, got {:?}", other),
            }
        }
        other => panic!("expected CreateEntry, got {:?}", other),
    }
    assert!(matches!(
        &on_a[1],
        ControllerCommand::CreateEntry { action: EntryAction::DeleteRoute(_), .. }
    ));

    let on_b = rig.drain("agent-b");
    assert_eq!(on_b.len(), 2);
    match &on_b[0] {
        ControllerCommand::CreateEntry { action: EntryAction::SetRoute(route), .. } => {
            assert_eq!(route.prefix, "node:a/32");
            assert_eq!(route.device, InterfaceId::from("b/wl0"));
        }
        other => panic!("expected SetRoute, got {:?}", other),
    }
}

#[test]
fn empty_contact_index_emits_nothing() {
    let mut rig = Rig::new(&[], &[]);
    rig.scheduler.refresh_contacts();
    rig.scheduler.schedule_link_beams();
    rig.scheduler.schedule_link_routes();
    assert!(rig.drain_all().is_empty());
    assert!(rig.scheduler.live_entries().is_empty());
}

#[test]
fn expired_window_entries_are_withdrawn() {
    let mut rig = Rig::new(&[], &[("l-ab", 60, 240)]);
    rig.scheduler.refresh_contacts();
    rig.scheduler.schedule_link_beams();
    assert_eq!(rig.drain("agent-a").len(), 2);

    // once the window has passed, the pass withdraws the stale pair and emits nothing new
    rig.clock.advance(300);
    rig.scheduler.refresh_contacts();
    rig.scheduler.schedule_link_beams();
    let commands = rig.drain("agent-a");
    assert_eq!(deletes(&commands).len(), 2);
    assert!(creates(&commands).is_empty());
    assert!(rig.scheduler.live_entries().is_empty());
}

#[test]
fn disconnected_agents_track_no_entries() {
    let mut rig = Rig::new(&[], &[("l-ab", 60, 240)]);
    // agent-a is registered in the repository but its session goes away
    rig.endpoints.remove("agent-a");
    let id = AgentId::from("agent-a");
    for _ in 0..500 {
        if !rig.server.has_agent(&id) {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }
    rig.scheduler.refresh_contacts();
    rig.scheduler.schedule_link_beams();
    assert!(rig.scheduler.live_entries().is_empty());
    assert_eq!(rig.scheduler.metrics().entries_sent(), 0);
}

#[test]
fn admission_provisions_a_request_end_to_end() {
    let mut rig = Rig::new(&[], &[("l-ab", 60, 120), ("l-bc", 300, 360)]);
    rig.add_sr("sr1", "a", "c", 5, 1_000_000, false);
    rig.scheduler.refresh_contacts();
    rig.scheduler.admit_requests();

    let active = rig.scheduler.active_path(&SrId::from("sr1")).unwrap();
    assert_eq!(active.path.hops.len(), 2);
    assert_eq!(active.entries.len(), 8);

    assert_eq!(rig.scheduler.ledger().reserved_on_link(&L_AB), 1_000_000);
    assert_eq!(rig.scheduler.ledger().reserved_on_link(&L_BC), 1_000_000);

    let status = rig.status("sr1");
    assert!(status.provisioned_now);
    assert_eq!(
        status.provisioned_intervals,
        vec![TimeInterval::new(T0 + 60, T0 + 360)]
    );

    // four commands per hop, addressed to the hop's source agent
    let on_a = rig.drain("agent-a");
    assert_eq!(creates(&on_a).len(), 4);
    let on_b = rig.drain("agent-b");
    assert_eq!(creates(&on_b).len(), 4);
    match &on_a[0] {
        ControllerCommand::CreateEntry { action: EntryAction::UpdateBeam(spec), .. } => {
            assert_eq!(spec.link, *L_AB);
        }
        other => panic!("expected UpdateBeam first, got {:?}", other),
    }
    // routes point at the path target
    let routed = on_a.iter().any(|c| match c {
        ControllerCommand::CreateEntry { action: EntryAction::SetRoute(route), .. } => {
            route.prefix == "node:c/32" && route.next_hop == NodeId::from("b")
        }
        _ => false,
    });
    assert!(routed);
}

#[test]
fn self_loop_requests_are_trivially_provisioned() {
    let mut rig = Rig::new(&[], &[]);
    rig.add_sr("sr1", "a", "a", 5, 1_000_000, false);
    rig.scheduler.refresh_contacts();
    rig.scheduler.admit_requests();

    assert!(rig.status("sr1").provisioned_now);
    assert!(rig.scheduler.live_entries().is_empty());
    assert!(rig.drain_all().is_empty());
}

#[test]
fn unreachable_requests_are_not_provisioned() {
    let mut rig = Rig::new(&[], &[("l-ab", 60, 120)]);
    rig.add_sr("sr1", "a", "c", 5, 1_000_000, false);
    rig.scheduler.refresh_contacts();
    rig.scheduler.admit_requests();

    assert!(!rig.status("sr1").provisioned_now);
    assert!(rig.scheduler.active_path(&SrId::from("sr1")).is_none());
    assert_eq!(rig.scheduler.ledger().reserved_on_link(&L_AB), 0);
}

#[test]
fn admission_preempts_lower_priority_requests() {
    let mut rig = Rig::new(&[("l-ab", 1_000_000)], &[("l-ab", 60, 240)]);
    rig.add_sr("sr-low", "a", "b", 1, 1_000_000, false);
    rig.scheduler.refresh_contacts();
    rig.scheduler.admit_requests();
    assert!(rig.status("sr-low").provisioned_now);
    rig.drain_all();

    rig.add_sr("sr-high", "a", "b", 10, 500_000, false);
    rig.scheduler.admit_requests();

    // the high-priority request displaced the low-priority one
    assert!(rig.status("sr-high").provisioned_now);
    assert!(!rig.status("sr-low").provisioned_now);
    assert!(rig.scheduler.active_path(&SrId::from("sr-low")).is_none());
    assert_eq!(rig.scheduler.ledger().reserved_on_link(&L_AB), 500_000);

    let records = rig.scheduler.preemptions(&SrId::from("sr-low"));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].preempted_by, SrId::from("sr-high"));
    assert_eq!(records[0].sr, SrId::from("sr-low"));

    // the low request's entries were withdrawn
    let commands = rig.drain("agent-a");
    assert!(!deletes(&commands).is_empty());
    assert_eq!(rig.scheduler.metrics().preemptions(), 1);
}

#[test]
fn preemption_cannot_displace_equal_or_higher_priority() {
    let mut rig = Rig::new(&[("l-ab", 1_000_000)], &[("l-ab", 60, 240)]);
    rig.add_sr("sr-one", "a", "b", 5, 1_000_000, false);
    rig.scheduler.refresh_contacts();
    rig.scheduler.admit_requests();

    rig.add_sr("sr-two", "a", "b", 5, 500_000, false);
    rig.scheduler.admit_requests();

    assert!(rig.status("sr-one").provisioned_now);
    assert!(!rig.status("sr-two").provisioned_now);
    assert!(rig.scheduler.preemptions(&SrId::from("sr-one")).is_empty());
}

#[test]
fn store_and_forward_requests_reserve_storage_at_the_stop() {
    let mut rig = Rig::new(&[], &[("l-ab", 60, 120), ("l-bc", 300, 360)]);
    rig.add_sr("sr1", "a", "c", 5, 1_000_000, true);
    rig.scheduler.refresh_contacts();
    rig.scheduler.admit_requests();

    assert!(rig.status("sr1").provisioned_now);
    // max(1 Mbit/s floor) * 30 s / 8 bytes, held at the storage stop b
    assert_eq!(rig.repo.get_storage_usage(&NodeId::from("b")).unwrap(), 3_750_000);
    assert_eq!(rig.repo.get_storage_usage(&NodeId::from("a")).unwrap(), 0);
}

#[test]
fn disconnected_dtn_requests_buffer_at_the_source() {
    let mut rig = Rig::new(&[], &[]);
    rig.add_sr("sr1", "a", "c", 5, 1_000_000, true);
    rig.scheduler.refresh_contacts();
    rig.scheduler.admit_requests();

    assert!(!rig.status("sr1").provisioned_now);
    assert_eq!(rig.repo.get_storage_usage(&NodeId::from("a")).unwrap(), 3_750_000);
}

#[test]
fn a_full_tick_finalizes_every_agent() {
    let mut rig = Rig::new(&[], &[("l-ab", 60, 240)]);
    rig.scheduler.tick();
    for agent in &["agent-a", "agent-b", "agent-c"] {
        let commands = rig.drain(agent);
        let finalizes: Vec<_> = commands
            .iter()
            .filter(|c| matches!(c, ControllerCommand::Finalize { .. }))
            .collect();
        assert_eq!(finalizes.len(), 1, "agent {} saw {:?}", agent, commands);
        match finalizes[0] {
            ControllerCommand::Finalize { up_to, .. } => assert_eq!(*up_to, T0),
            _ => unreachable!(),
        }
    }
    assert_eq!(rig.scheduler.metrics().ticks(), 1);
}

#[test]
fn policy_requests_install_their_policy_at_the_source() {
    let mut rig = Rig::new(&[], &[("l-ab", 60, 120), ("l-bc", 300, 360)]);
    rig.repo.add_sr_policy(SrPolicy {
        id: PolicyId::from("p1"),
        endpoint: NodeId::from("c"),
        segments: vec![NodeId::from("b"), NodeId::from("c")],
    });
    rig.add_sr("sr1", "a", "c", 5, 1_000_000, false);
    {
        let mut sr = rig.repo.get_service_request(&SrId::from("sr1")).unwrap();
        sr.policy = Some(PolicyId::from("p1"));
        rig.repo.update_service_request(sr).unwrap();
    }

    rig.scheduler.refresh_contacts();
    rig.scheduler.admit_requests();

    assert!(rig.status("sr1").provisioned_now);
    assert_eq!(rig.repo.installed_policies(&NodeId::from("a")), vec![PolicyId::from("p1")]);

    let on_a = rig.drain("agent-a");
    let policy_sets = on_a.iter().filter(|c| matches!(
        c,
        ControllerCommand::CreateEntry { action: EntryAction::SetSrPolicy { .. }, .. }
    ));
    let policy_dels = on_a.iter().filter(|c| matches!(
        c,
        ControllerCommand::CreateEntry { action: EntryAction::DeleteSrPolicy { .. }, .. }
    ));
    assert_eq!(policy_sets.count(), 1);
    assert_eq!(policy_dels.count(), 1);
}

#[test]
fn cross_domain_requests_plan_to_the_granted_border_node() {
    let mut rig = Rig::new(&[], &[("l-ab", 60, 240)]);
    rig.repo.add_domain(Domain { id: DomainId::from("d1"), border_node: NodeId::from("a") });
    rig.repo.add_domain(Domain { id: DomainId::from("d2"), border_node: NodeId::from("b") });
    rig.add_sr("sr1", "a", "c", 5, 1_000_000, false);
    {
        let mut sr = rig.repo.get_service_request(&SrId::from("sr1")).unwrap();
        sr.source_domain = Some(DomainId::from("d1"));
        sr.dest_domain = Some(DomainId::from("d2"));
        sr.federation_token = Some("tok".to_string());
        rig.repo.update_service_request(sr).unwrap();
    }
    rig.scheduler.set_federation(Box::new(GrantAllFederation));

    rig.scheduler.refresh_contacts();
    rig.scheduler.admit_requests();

    // the local segment runs to the destination domain's border node b
    assert!(rig.status("sr1").provisioned_now);
    let active = rig.scheduler.active_path(&SrId::from("sr1")).unwrap();
    assert_eq!(active.path.hops.len(), 1);
    assert_eq!(active.path.hops[0].to, NodeId::from("b"));
}

#[test]
fn refused_federation_marks_the_request_not_provisioned() {
    let mut rig = Rig::new(&[], &[("l-ab", 60, 240)]);
    rig.repo.add_domain(Domain { id: DomainId::from("d2"), border_node: NodeId::from("b") });
    rig.add_sr("sr1", "a", "c", 5, 1_000_000, false);
    {
        let mut sr = rig.repo.get_service_request(&SrId::from("sr1")).unwrap();
        sr.dest_domain = Some(DomainId::from("d2"));
        rig.repo.update_service_request(sr).unwrap();
    }
    // the default DenyAllFederation refuses every segment

    rig.scheduler.refresh_contacts();
    rig.scheduler.admit_requests();

    assert!(!rig.status("sr1").provisioned_now);
    assert!(rig.scheduler.active_path(&SrId::from("sr1")).is_none());
}

#[test]
fn the_queue_orders_by_descending_priority_and_is_stable() {
    let queue = SrQueue::new();
    assert!(queue.is_empty());
    for (id, priority) in &[("first", 3), ("second", 9), ("third", 3), ("fourth", 1)] {
        queue.push(ServiceRequest {
            id: SrId::from(*id),
            src: NodeId::from("a"),
            dst: NodeId::from("b"),
            priority: *priority,
            flow: FlowRequirements {
                requested_bps: 0,
                min_bps: 0,
                validity: TimeInterval::new(T0, T0 + 60),
            },
            disruption_tolerant: false,
            policy: None,
            source_domain: None,
            dest_domain: None,
            federation_token: None,
            status: SrStatus::default(),
        });
    }
    assert_eq!(queue.len(), 4);
    queue.sort_by_priority();
    assert_eq!(queue.peek().unwrap().id, SrId::from("second"));
    assert_eq!(queue.pop().unwrap().id, SrId::from("second"));
    // equal priorities keep their push order
    assert_eq!(queue.pop().unwrap().id, SrId::from("first"));
    assert_eq!(queue.pop().unwrap().id, SrId::from("third"));
    assert_eq!(queue.pop().unwrap().id, SrId::from("fourth"));
    assert!(queue.pop().is_none());
}

#[test]
fn the_queue_admits_concurrent_pushes() {
    let queue = Arc::new(SrQueue::new());
    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    queue.push(ServiceRequest {
                        id: SrId(format!("sr-{}-{}", worker, i)),
                        src: NodeId::from("a"),
                        dst: NodeId::from("b"),
                        priority: i,
                        flow: FlowRequirements {
                            requested_bps: 0,
                            min_bps: 0,
                            validity: TimeInterval::new(T0, T0 + 60),
                        },
                        disruption_tolerant: false,
                        policy: None,
                        source_domain: None,
                        dest_domain: None,
                        federation_token: None,
                        status: SrStatus::default(),
                    });
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(queue.len(), 100);
    queue.sort_by_priority();
    assert_eq!(queue.peek().unwrap().priority, 24);
}

#[test]
fn the_loop_ticks_until_stopped() {
    let rig = Rig::new(&[], &[]);
    let abort = Stopper::new();
    let stop = abort.clone();
    let handle = rig.scheduler.handle();
    let metrics = rig.scheduler.metrics();

    let driver = thread::spawn(move || {
        let mut rig = rig;
        rig.scheduler.run(abort);
        rig
    });

    // wake requests coalesce; the loop keeps ticking until the stop arrives
    handle.wake();
    handle.wake();
    for _ in 0..500 {
        if metrics.ticks() >= 2 {
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }
    assert!(metrics.ticks() >= 2);

    stop.send_stop();
    handle.wake();
    let rig = driver.join().unwrap();
    drop(rig);
}

#[test]
fn parallel_path_search_matches_the_inline_result() {
    let mut rig = Rig::with_workers(
        &[],
        &[("l-ab", 60, 120), ("l-bc", 300, 360)],
        Some(2),
    );
    rig.add_sr("sr1", "a", "c", 5, 1_000_000, false);
    rig.add_sr("sr2", "a", "b", 3, 1_000_000, false);
    rig.scheduler.refresh_contacts();
    rig.scheduler.admit_requests();

    assert!(rig.status("sr1").provisioned_now);
    assert!(rig.status("sr2").provisioned_now);
    let sr1 = rig.scheduler.active_path(&SrId::from("sr1")).unwrap();
    assert_eq!(sr1.path.hops.len(), 2);
    let sr2 = rig.scheduler.active_path(&SrId::from("sr2")).unwrap();
    assert_eq!(sr2.path.hops.len(), 1);
}
