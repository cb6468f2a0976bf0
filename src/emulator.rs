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

//! Materializes the chain on a machine running Open vSwitch: one bridge per element, one
//! network namespace per host, and one veth pair per link.

use std::{collections::HashMap, sync::Arc};

use ipnet::Ipv4Net;
use ovs_lab::{
    config::{Config, ConfigError, EmulatorConfig},
    netns::Iproute,
    session::{Session, SessionError},
    switch::{OvsSwitch, SwitchError},
};
use thiserror::Error;

use crate::topology::{Endpoint, Topology, LEFT_HOST, RIGHT_HOST};

/// Longest interface name accepted by the kernel (`IFNAMSIZ` without the terminating zero).
pub const MAX_INTERFACE_NAME: usize = 15;

/// Name of the interface that realizes the endpoint of a link. Element interfaces are called
/// `elem-i-eth{port}`, host interfaces `host-*-eth0`.
pub fn interface_name(endpoint: &Endpoint) -> String {
    format!("{}-eth{}", endpoint.node, endpoint.port.unwrap_or(0))
}

/// Driver that builds and tears down the emulated chain.
#[derive(Debug)]
pub struct Emulator {
    topology: Arc<Topology>,
    iproute: Iproute,
    switches: HashMap<String, OvsSwitch>,
    config: EmulatorConfig,
}

impl Emulator {
    /// Create the driver. This does not touch the machine.
    pub fn new(topology: Arc<Topology>, session: Session, config: &Config) -> Self {
        let switches = topology
            .elements()
            .map(|e| {
                (
                    e.name().to_string(),
                    OvsSwitch::new(session.clone(), e.name(), config.ovs.clone()),
                )
            })
            .collect();
        Self {
            iproute: Iproute::new(session, config.emulator.ip.clone()),
            topology,
            switches,
            config: config.emulator.clone(),
        }
    }

    /// Build the network. Leftovers of a previous run are removed first. If any step fails, the
    /// parts that were already created are torn down again before the error is returned.
    pub async fn start(&self) -> Result<(), EmulatorError> {
        let (left_addr, right_addr) = self.config.host_addresses()?;
        self.check_interface_names()?;
        self.stop().await?;
        log::info!("Start network with {} elements", self.topology.hop_count());

        if let Err(e) = self.build(left_addr, right_addr).await {
            log::error!("Cannot start the network: {e}");
            if let Err(cleanup) = self.stop().await {
                log::warn!("Cannot tear down the partially started network: {cleanup}");
            }
            return Err(e);
        }

        log::info!("Network started");
        Ok(())
    }

    /// Check that all interface names fit into the kernel limit of [`MAX_INTERFACE_NAME`] bytes.
    pub fn check_interface_names(&self) -> Result<(), EmulatorError> {
        match self
            .topology
            .links()
            .flat_map(|l| [interface_name(&l.left), interface_name(&l.right)])
            .find(|iface| iface.len() > MAX_INTERFACE_NAME)
        {
            Some(iface) => Err(EmulatorError::InterfaceNameTooLong(iface)),
            None => Ok(()),
        }
    }

    async fn build(&self, left_addr: Ipv4Net, right_addr: Ipv4Net) -> Result<(), EmulatorError> {
        for element in self.topology.elements() {
            self.switch(element.name())?
                .create_bridge(self.config.fail_mode)
                .await?;
        }
        for host in self.topology.hosts() {
            self.iproute.add_namespace(host).await?;
        }

        for link in self.topology.links() {
            let left = interface_name(&link.left);
            let right = interface_name(&link.right);
            self.iproute.add_veth(&left, &right).await?;
            for (endpoint, iface) in [(&link.left, left), (&link.right, right)] {
                match endpoint.port {
                    Some(port) => self.switch(&endpoint.node)?.add_port(&iface, port).await?,
                    None => {
                        let addr = host_address(&endpoint.node, left_addr, right_addr)?;
                        self.iproute.attach(&endpoint.node, &iface, addr).await?
                    }
                }
            }
        }
        Ok(())
    }

    /// Tear down the network. Parts that do not exist are skipped, so this can be called at any
    /// time.
    pub async fn stop(&self) -> Result<(), EmulatorError> {
        log::info!("Stop network");
        // deleting the namespace also deletes the host interface and its peer.
        for host in self.topology.hosts() {
            self.iproute.delete_namespace(host).await?;
        }
        for link in self.topology.links() {
            if !self.iproute.delete_link(&interface_name(&link.left)).await? {
                self.iproute.delete_link(&interface_name(&link.right)).await?;
            }
        }
        for element in self.topology.elements() {
            self.switch(element.name())?.delete_bridge().await?;
        }
        Ok(())
    }

    fn switch(&self, element: &str) -> Result<&OvsSwitch, EmulatorError> {
        self.switches
            .get(element)
            .ok_or_else(|| EmulatorError::UnknownElement(element.to_string()))
    }
}

fn host_address(host: &str, left: Ipv4Net, right: Ipv4Net) -> Result<Ipv4Net, EmulatorError> {
    match host {
        LEFT_HOST => Ok(left),
        RIGHT_HOST => Ok(right),
        _ => Err(EmulatorError::UnknownElement(host.to_string())),
    }
}

/// Error while building or tearing down the emulated network.
#[derive(Debug, Error)]
pub enum EmulatorError {
    /// Error of the underlying session
    #[error("{0}")]
    Session(#[from] SessionError),
    /// Error while configuring a bridge
    #[error("{0}")]
    Switch(#[from] SwitchError),
    /// Invalid emulator configuration
    #[error("{0}")]
    Config(#[from] ConfigError),
    /// The interface name of a link endpoint exceeds [`MAX_INTERFACE_NAME`].
    #[error("Interface name {0} is longer than {MAX_INTERFACE_NAME} characters")]
    InterfaceNameTooLong(String),
    /// The node is not part of the topology.
    #[error("Unknown node: {0}")]
    UnknownElement(String),
}
