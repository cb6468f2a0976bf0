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

//! This module manages the links and network namespaces that make up the emulated end hosts and
//! the wires between bridges, using `iproute2`.

use ipnet::Ipv4Net;

use crate::session::{Session, SessionError};

/// Wrapper around the `ip` command on the target machine.
#[derive(Debug, Clone)]
pub struct Iproute {
    session: Session,
    ip: String,
}

impl Iproute {
    /// Create a new wrapper, calling the program `ip` (usually just `"ip"`).
    pub fn new(session: Session, ip: impl Into<String>) -> Self {
        Self {
            session,
            ip: ip.into(),
        }
    }

    /// Create a pair of connected virtual ethernet interfaces `a` and `b`, and bring both up.
    pub async fn add_veth(&self, a: &str, b: &str) -> Result<(), SessionError> {
        log::debug!("[{}] create veth pair {a} -- {b}", self.session.name());
        if self.link_exists(a).await? {
            // the peer may already live in a different namespace
            log::debug!("[{}] interface {a} already exists", self.session.name());
            return self.ip(&["link", "set", a, "up"]).await;
        }
        self.ip(&["link", "add", a, "type", "veth", "peer", "name", b])
            .await?;
        self.ip(&["link", "set", a, "up"]).await?;
        self.ip(&["link", "set", b, "up"]).await?;
        Ok(())
    }

    /// Delete an interface. Deleting one end of a veth pair removes both ends. Returns `false` if
    /// the interface did not exist.
    pub async fn delete_link(&self, iface: &str) -> Result<bool, SessionError> {
        if !self.link_exists(iface).await? {
            return Ok(false);
        }
        log::debug!("[{}] delete interface {iface}", self.session.name());
        self.ip(&["link", "delete", iface]).await?;
        Ok(true)
    }

    /// Check if an interface exists in the root namespace.
    pub async fn link_exists(&self, iface: &str) -> Result<bool, SessionError> {
        Ok(self
            .session
            .execute_cmd_status(&[self.ip.as_str(), "link", "show", iface])
            .await?
            .success())
    }

    /// Create a network namespace, if it does not exist yet.
    pub async fn add_namespace(&self, ns: &str) -> Result<(), SessionError> {
        if self.namespace_exists(ns).await? {
            log::debug!("[{}] namespace {ns} already exists", self.session.name());
            return Ok(());
        }
        log::debug!("[{}] create namespace {ns}", self.session.name());
        self.ip(&["netns", "add", ns]).await
    }

    /// Delete a network namespace. Returns `false` if it did not exist.
    pub async fn delete_namespace(&self, ns: &str) -> Result<bool, SessionError> {
        if !self.namespace_exists(ns).await? {
            return Ok(false);
        }
        log::debug!("[{}] delete namespace {ns}", self.session.name());
        self.ip(&["netns", "delete", ns]).await?;
        Ok(true)
    }

    /// Check if a network namespace exists.
    pub async fn namespace_exists(&self, ns: &str) -> Result<bool, SessionError> {
        let (stdout, _) = self
            .session
            .execute_cmd(&[self.ip.as_str(), "netns", "list"])
            .await?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .filter_map(|l| l.split_whitespace().next())
            .any(|name| name == ns))
    }

    /// Move `iface` into the namespace `ns`, assign `addr`, and bring it (and the loopback) up.
    pub async fn attach(&self, ns: &str, iface: &str, addr: Ipv4Net) -> Result<(), SessionError> {
        log::debug!("[{}] attach {iface} to {ns} with {addr}", self.session.name());
        let addr = addr.to_string();
        self.ip(&["link", "set", iface, "netns", ns]).await?;
        self.ip(&["-n", ns, "addr", "replace", addr.as_str(), "dev", iface])
            .await?;
        self.ip(&["-n", ns, "link", "set", iface, "up"]).await?;
        self.ip(&["-n", ns, "link", "set", "lo", "up"]).await?;
        Ok(())
    }

    async fn ip(&self, args: &[&str]) -> Result<(), SessionError> {
        let cmd = std::iter::once(self.ip.as_str())
            .chain(args.iter().copied())
            .collect::<Vec<_>>();
        self.session.execute_cmd(&cmd).await?;
        Ok(())
    }
}
