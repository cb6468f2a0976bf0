// FlowChain: Provisioning and verifying linear OpenFlow chains
// Copyright (C) 2022-2023 Tibor Schneider <sctibor@ethz.ch>
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

//! # FlowChain: Provisioning and verifying linear OpenFlow chains
//!
//! This library builds a linear chain of forwarding elements (Open vSwitch bridges) between two
//! hosts, installs bidirectional forwarding rules on every element, and verifies that the rules
//! installed on the elements match the intended policy:
//!
//! ```text
//! host-left --- elem-1 --- elem-2 --- ... --- elem-N --- host-right
//! ```
//!
//! Every element forwards port 1 to port 2 and port 2 to port 1.
//!
//! ## Structure
//! - The module [`topology`] derives the declarative chain from the hop count.
//! - The module [`control`] defines the interface to the control plane of the elements
//!   ([`control::ElementControl`]), and implements it for Open vSwitch
//!   ([`control::OvsControl`]).
//! - The module [`provision`] installs the required rules ([`rule::FlowRule`]) on every element.
//! - The module [`verify`] compares the installed rules against the required ones.
//! - The module [`report`] renders the verification outcome and the current state for operators.
//! - The module [`shell`] contains the command registry used by the interactive shell.
//! - The module [`emulator`] materializes the topology with bridges, namespaces and veth pairs.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use flowchain::{control::OvsControl, report::FlowReporter, topology::Topology, ChainHandle};
//! use ovs_lab::{Config, Session};
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let config = Config::default();
//! let topology = Arc::new(Topology::build(3)?);
//! let session = Session::local(config.ovs.sudo);
//! let control = Arc::new(OvsControl::new(&topology, &session, &config.ovs));
//! let handle = ChainHandle::new(topology, control, 3);
//!
//! handle.provision().await?;
//! let (result, report) = FlowReporter::new(handle).report_verification().await?;
//! println!("{report}");
//! assert!(result.all_ok);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs, missing_debug_implementations, rust_2018_idioms)]

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinError;

pub mod control;
pub mod emulator;
pub mod provision;
pub mod report;
pub mod rule;
pub mod shell;
pub mod topology;
pub mod verify;

#[cfg(test)]
mod test;

use control::ElementControl;
use provision::ProvisionReport;
use topology::{Topology, TopologyError};
use verify::VerificationResult;

/// Explicit handle to a chain: the topology, the control plane of its elements, and the number
/// of hops that are managed. Cloning the handle is cheap.
#[derive(Debug, Clone)]
pub struct ChainHandle {
    topology: Arc<Topology>,
    control: Arc<dyn ElementControl>,
    hop_count: i64,
}

impl ChainHandle {
    /// Create a new handle.
    pub fn new(topology: Arc<Topology>, control: Arc<dyn ElementControl>, hop_count: i64) -> Self {
        Self {
            topology,
            control,
            hop_count,
        }
    }

    /// The topology of the chain.
    pub fn topology(&self) -> &Arc<Topology> {
        &self.topology
    }

    /// The control plane of the elements.
    pub fn control(&self) -> &Arc<dyn ElementControl> {
        &self.control
    }

    /// The number of managed hops.
    pub fn hop_count(&self) -> i64 {
        self.hop_count
    }

    /// Install the required rules on all managed elements. See [`provision::provision`].
    pub async fn provision(&self) -> Result<ProvisionReport, ChainError> {
        provision::provision(self.topology.clone(), self.control.clone(), self.hop_count).await
    }

    /// Verify the rules of all managed elements. See [`verify::verify`].
    pub async fn verify(&self) -> Result<VerificationResult, ChainError> {
        verify::verify(self.topology.clone(), self.control.clone(), self.hop_count).await
    }
}

/// Error that aborts an operation on the whole chain. Failures of individual elements are not
/// errors, but recorded in the respective reports.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The topology or the hop count is invalid.
    #[error("Invalid topology: {0}")]
    Topology(#[from] TopologyError),
    /// A task operating on a single element panicked or was cancelled.
    #[error("Element task failed: {0}")]
    Join(#[from] JoinError),
}
