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

//! This module implements a session with a single Open vSwitch bridge.

use thiserror::Error;

use crate::{
    config::{FailMode, OvsConfig},
    session::{Session, SessionError},
};

mod flows;
pub use flows::{parse_flows, FlowEntry, FlowTable, ParseError, PortNo};

/// A handle to an Open vSwitch bridge. All commands are executed using `ovs-ofctl` (flows) and
/// `ovs-vsctl` (bridges and ports) through the [`Session`].
#[derive(Debug, Clone)]
pub struct OvsSwitch {
    session: Session,
    name: String,
    ovs: OvsConfig,
}

impl OvsSwitch {
    /// Create a handle to the bridge `name`. This does not create the bridge, nor does it talk to
    /// the switch.
    pub fn new(session: Session, name: impl Into<String>, ovs: OvsConfig) -> Self {
        Self {
            session,
            name: name.into(),
            ovs,
        }
    }

    /// Get the bridge name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Install a flow that forwards all packets arriving on `in_port` out of `out_port`. Adding
    /// the same flow twice replaces the existing entry instead of duplicating it.
    pub async fn add_flow(&self, in_port: PortNo, out_port: PortNo) -> Result<(), SwitchError> {
        check_port(in_port)?;
        check_port(out_port)?;
        let flow = format!("in_port={in_port},actions=output:{out_port}");
        log::debug!("[{}] add flow {flow}", self.name());
        let (stdout, stderr) = self.session.execute_cmd(&self.ofctl("add-flow", &[&flow])).await?;

        if !stdout.is_empty() || !stderr.is_empty() {
            log::trace!(
                "[{}] add-flow {} returned non-empty answer:{}{}",
                self.name(),
                flow,
                if stdout.is_empty() {
                    String::new()
                } else {
                    format!("\nSTDOUT:\n{}", String::from_utf8_lossy(&stdout))
                },
                if stderr.is_empty() {
                    String::new()
                } else {
                    format!("\nSTDERR:\n{}", String::from_utf8_lossy(&stderr))
                },
            );
        }
        Ok(())
    }

    /// Get the raw output of `ovs-ofctl dump-flows`.
    pub async fn dump_flows(&self) -> Result<String, SwitchError> {
        log::trace!("[{}] dump flows", self.name());
        Ok(self
            .session
            .execute_cmd_stdout(&self.ofctl("dump-flows", &[]))
            .await?)
    }

    /// Create the bridge (if it does not exist yet) and set its fail mode.
    pub async fn create_bridge(&self, fail_mode: FailMode) -> Result<(), SwitchError> {
        log::debug!("[{}] create bridge (fail-mode {fail_mode})", self.name());
        let fail_mode = fail_mode.to_string();
        self.session
            .execute_cmd(&[
                self.ovs.vsctl.as_str(),
                "--may-exist",
                "add-br",
                self.name(),
                "--",
                "set-fail-mode",
                self.name(),
                fail_mode.as_str(),
            ])
            .await?;
        Ok(())
    }

    /// Delete the bridge, if it exists.
    pub async fn delete_bridge(&self) -> Result<(), SwitchError> {
        log::debug!("[{}] delete bridge", self.name());
        self.session
            .execute_cmd(&[self.ovs.vsctl.as_str(), "--if-exists", "del-br", self.name()])
            .await?;
        Ok(())
    }

    /// Attach the interface `iface` to the bridge, using OpenFlow port number `port`.
    pub async fn add_port(&self, iface: &str, port: PortNo) -> Result<(), SwitchError> {
        check_port(port)?;
        log::debug!("[{}] add port {iface} as {port}", self.name());
        let ofport = format!("ofport_request={port}");
        self.session
            .execute_cmd(&[
                self.ovs.vsctl.as_str(),
                "--may-exist",
                "add-port",
                self.name(),
                iface,
                "--",
                "set",
                "interface",
                iface,
                ofport.as_str(),
            ])
            .await?;
        Ok(())
    }

    /// Arguments for calling `ovs-ofctl [-O protocol] <cmd> <bridge> <args>`.
    fn ofctl(&self, cmd: &str, args: &[&str]) -> Vec<String> {
        let mut a = vec![self.ovs.ofctl.clone()];
        if let Some(protocol) = &self.ovs.protocol {
            a.push(String::from("-O"));
            a.push(protocol.clone());
        }
        a.push(cmd.to_string());
        a.push(self.name.clone());
        a.extend(args.iter().map(|x| x.to_string()));
        a
    }
}

/// OpenFlow port 0 is reserved.
fn check_port(port: PortNo) -> Result<(), SwitchError> {
    if port == 0 {
        Err(SwitchError::InvalidPort(port))
    } else {
        Ok(())
    }
}

/// Error while talking to a switch.
#[derive(Debug, Error)]
pub enum SwitchError {
    /// Error of the underlying session
    #[error("{0}")]
    Session(#[from] SessionError),
    /// The port number cannot be used.
    #[error("Invalid OpenFlow port: {0}")]
    InvalidPort(PortNo),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ofctl_arguments() {
        let sw = OvsSwitch::new(Session::local(false), "elem-1", OvsConfig::default());
        assert_eq!(
            sw.ofctl("add-flow", &["in_port=1,actions=output:2"]),
            vec!["ovs-ofctl", "add-flow", "elem-1", "in_port=1,actions=output:2"]
        );

        let ovs = OvsConfig {
            protocol: Some(String::from("OpenFlow13")),
            ..Default::default()
        };
        let sw = OvsSwitch::new(Session::local(true), "elem-2", ovs);
        assert_eq!(
            sw.ofctl("dump-flows", &[]),
            vec!["ovs-ofctl", "-O", "OpenFlow13", "dump-flows", "elem-2"]
        );
    }
}
