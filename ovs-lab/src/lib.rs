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

//! This library is the control-plane client for emulated Open vSwitch networks. It runs commands
//! on the machine hosting the switches, either locally or via SSH, and wraps the tools that are
//! needed to build and inspect a network:
//!
//! - [`switch::OvsSwitch`]: create and delete bridges, attach ports, add flows and dump the flow
//!   table of a single bridge (`ovs-vsctl` and `ovs-ofctl`).
//! - [`switch::FlowTable`]: parse the output of `ovs-ofctl dump-flows` into a mapping from ingress
//!   port to egress ports.
//! - [`netns::Iproute`]: virtual ethernet pairs and network namespaces for the end hosts.
//! - [`config::Config`]: the TOML configuration of all of the above.
//!
//! # Sessions
//!
//! All commands are executed through a [`session::Session`]. A local session spawns the
//! programs directly. A remote session executes them with `ssh`, reusing a control master. Make
//! sure that `ssh $hostname` works without a password, and, if `sudo` is enabled, that `sudo -n`
//! does not ask for one either.
//!
//! ```rust,no_run
//! use ovs_lab::{config::Config, session::Session, switch::OvsSwitch};
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let config = Config::default();
//! let session = Session::local(config.ovs.sudo);
//! let switch = OvsSwitch::new(session, "elem-1", config.ovs.clone());
//! switch.add_flow(1, 2).await?;
//! let dump = switch.dump_flows().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod netns;
pub mod session;
pub mod switch;

#[cfg(test)]
mod test;

pub use config::{Config, ConfigError};
pub use session::{Session, SessionError};
pub use switch::{FlowTable, OvsSwitch, SwitchError};
