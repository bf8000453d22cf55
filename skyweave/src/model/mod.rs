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

//! # Data model
//!
//! All data types shared between the repository, the path engine, the scheduler and the agent
//! control plane: topology elements ([`elements`]), service requests and their companions
//! ([`request`]) and paths ([`path`]).

pub mod elements;
pub mod path;
pub mod request;
pub mod types;

pub use elements::{Interface, Link, LinkStatus, Medium, Node, TransceiverModel};
pub use path::{ActivePath, DtnHop, DtnPath, EntryRef, Path, PathDiff, PathHealth, PathHop};
pub use request::{
    Domain, FlowRequirements, PreemptionRecord, Region, ServiceRequest, SrPolicy, SrStatus,
};
pub use types::{
    AgentId, DomainId, EntryId, InterfaceId, LinkId, ModelId, NodeId, PolicyId, RegionId, SrId,
};
