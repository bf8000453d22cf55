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

//! Identifier newtypes used throughout the crate.
//!
//! All identifiers are strings handed to the controller by the scenario store. Wrapping them in
//! distinct types keeps a node id from ever being used where a link id is expected.

use std::fmt;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Clone)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id! {
    /// Identifier of a network node (satellite, ground station, ...).
    NodeId
}

string_id! {
    /// Identifier of an interface. May be stored bare (`"lo0"`) or qualified (`"node-a/lo0"`).
    InterfaceId
}

string_id! {
    /// Identifier of a (potential or active) link between two interfaces.
    LinkId
}

string_id! {
    /// Identifier of a service request.
    SrId
}

string_id! {
    /// Identifier of a remote agent. Each agent manages exactly one node.
    AgentId
}

string_id! {
    /// Identifier of a scheduled configuration entry. Entry ids are derived deterministically so
    /// the same logical action collides with itself across scheduler reruns.
    EntryId
}

string_id! {
    /// Identifier of a transceiver model.
    ModelId
}

string_id! {
    /// Identifier of an SR-policy.
    PolicyId
}

string_id! {
    /// Identifier of a region (a named set of nodes).
    RegionId
}

string_id! {
    /// Identifier of a scheduling domain.
    DomainId
}

impl InterfaceId {
    /// The bare local part of the identifier (everything after the last `/`).
    pub fn local(&self) -> &str {
        match self.0.rfind('/') {
            Some(pos) => &self.0[pos + 1..],
            None => &self.0,
        }
    }

    /// Build the parent-qualified form `"node-id/local-id"` of this identifier.
    pub fn qualified(node: &NodeId, local: &str) -> InterfaceId {
        InterfaceId(format!("{}/{}", node.0, local))
    }
}
