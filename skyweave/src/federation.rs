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

//! # Cross-domain federation (stub)
//!
//! A single controller is authoritative per scheduling domain. For a service request whose
//! destination lies in another domain, the scheduler plans the local segment up to the
//! destination domain's border node and asks the peer controller for the remainder through
//! [`FederationClient`]. Only the interface exists here; a full inter-domain planner is a
//! separate system.

use crate::model::{DomainId, NodeId, SrId};
use crate::time::TimeInterval;

use thiserror::Error;

/// Errors returned by a federation peer.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum FederationError {
    /// The peer domain refused or cannot serve the segment.
    #[error("Peer domain refused the path segment: {0}")]
    Refused(String),
    /// No peer controller is reachable for the domain.
    #[error("No federation peer for domain {0}")]
    Unavailable(DomainId),
}

/// A request for a path segment inside a peer domain.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSegmentRequest {
    /// The service request the segment belongs to.
    pub sr: SrId,
    /// The requesting domain.
    pub source_domain: DomainId,
    /// The domain asked to provide the segment.
    pub dest_domain: DomainId,
    /// The border node at which traffic enters the peer domain.
    pub entry_node: NodeId,
    /// The final destination inside the peer domain.
    pub dst: NodeId,
    /// The interval the segment must cover.
    pub window: TimeInterval,
    /// Opaque authorization token, if the request carries one.
    pub token: Option<String>,
}

/// A granted path segment. The peer only confirms feasibility; its internal hops stay private.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSegmentGrant {
    /// The node inside the peer domain at which the segment starts.
    pub entry_node: NodeId,
    /// The interval the peer will cover.
    pub window: TimeInterval,
}

/// Client half of the federation interface.
pub trait FederationClient: Send + Sync {
    /// Ask the peer domain to provision a path segment.
    fn request_path_segment(
        &self,
        request: &PathSegmentRequest,
    ) -> Result<PathSegmentGrant, FederationError>;
}

/// Default client used when no federation is configured: every request is refused.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenyAllFederation;

impl FederationClient for DenyAllFederation {
    fn request_path_segment(
        &self,
        request: &PathSegmentRequest,
    ) -> Result<PathSegmentGrant, FederationError> {
        Err(FederationError::Unavailable(request.dest_domain.clone()))
    }
}

/// Client that grants every segment verbatim. Used by tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrantAllFederation;

impl FederationClient for GrantAllFederation {
    fn request_path_segment(
        &self,
        request: &PathSegmentRequest,
    ) -> Result<PathSegmentGrant, FederationError> {
        Ok(PathSegmentGrant { entry_node: request.entry_node.clone(), window: request.window })
    }
}
