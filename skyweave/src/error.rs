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

//! Module containing the top-level error type.

use crate::acp::AcpError;
use crate::contact::OracleError;
use crate::federation::FederationError;
use crate::ledger::LedgerError;
use crate::pathfind::PathError;
use crate::repository::RepositoryError;
use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// Error propagated from the scenario repository
    #[error("Repository Error: {0}")]
    Repository(#[from] RepositoryError),
    /// Error propagated from the path engine
    #[error("Path Error: {0}")]
    Path(#[from] PathError),
    /// Error propagated from the resource ledger
    #[error("Ledger Error: {0}")]
    Ledger(#[from] LedgerError),
    /// Error propagated from the agent control plane
    #[error("ACP Error: {0}")]
    Acp(#[from] AcpError),
    /// Error propagated from the contact oracle
    #[error("Contact Oracle Error: {0}")]
    Oracle(#[from] OracleError),
    /// Error propagated from a peer scheduling domain
    #[error("Federation Error: {0}")]
    Federation(#[from] FederationError),
}
