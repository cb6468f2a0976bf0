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

//! The control-plane interface used to install and query rules on forwarding elements.

use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use ovs_lab::{
    config::OvsConfig,
    session::Session,
    switch::{OvsSwitch, SwitchError},
};
use thiserror::Error;
use tokio::{sync::Mutex, time::timeout};

use crate::{rule::FlowRule, topology::Topology};

/// Interface to the control plane of the forwarding elements. Elements are addressed by name.
///
/// Implementations must allow concurrent calls for different elements.
#[async_trait]
pub trait ElementControl: fmt::Debug + Send + Sync {
    /// Install a rule on the element `rule.element`. Installing an identical rule twice must
    /// not create a duplicate entry.
    async fn issue_rule(&self, rule: &FlowRule) -> Result<(), ControlError>;

    /// Get the raw, textual rule table of an element. Returns `None` if the element answered
    /// with nothing.
    async fn query_rules(&self, element: &str) -> Result<Option<String>, ControlError>;
}

/// [`ElementControl`] backed by Open vSwitch bridges. Commands to the same bridge are
/// serialized, while different bridges are driven concurrently. Every command is bounded by the
/// configured timeout.
#[derive(Debug)]
pub struct OvsControl {
    switches: HashMap<String, Arc<Mutex<OvsSwitch>>>,
    timeout: Duration,
}

impl OvsControl {
    /// Create a handle for every element of the topology. This does not talk to the switches.
    pub fn new(topology: &Topology, session: &Session, ovs: &OvsConfig) -> Self {
        let switches = topology
            .elements()
            .map(|e| {
                (
                    e.name().to_string(),
                    Arc::new(Mutex::new(OvsSwitch::new(session.clone(), e.name(), ovs.clone()))),
                )
            })
            .collect();
        Self {
            switches,
            timeout: ovs.command_timeout,
        }
    }

    fn switch(&self, element: &str) -> Result<Arc<Mutex<OvsSwitch>>, ControlError> {
        self.switches
            .get(element)
            .cloned()
            .ok_or_else(|| ControlError::UnknownElement(element.to_string()))
    }
}

#[async_trait]
impl ElementControl for OvsControl {
    async fn issue_rule(&self, rule: &FlowRule) -> Result<(), ControlError> {
        let switch = self.switch(&rule.element)?;
        let switch = switch.lock().await;
        timeout(self.timeout, switch.add_flow(rule.in_port, rule.out_port))
            .await
            .map_err(|_| ControlError::Timeout(self.timeout))??;
        Ok(())
    }

    async fn query_rules(&self, element: &str) -> Result<Option<String>, ControlError> {
        let switch = self.switch(element)?;
        let switch = switch.lock().await;
        let dump = timeout(self.timeout, switch.dump_flows())
            .await
            .map_err(|_| ControlError::Timeout(self.timeout))??;
        Ok(Some(dump).filter(|d| !d.trim().is_empty()))
    }
}

/// Error while talking to the control plane of an element.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The element did not answer in time.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),
    /// The element is not part of the chain.
    #[error("Unknown element: {0}")]
    UnknownElement(String),
    /// Error talking to the switch
    #[error("{0}")]
    Switch(#[from] SwitchError),
    /// Any other error reported by a control backend.
    #[error("{0}")]
    Other(String),
}
