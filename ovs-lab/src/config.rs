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

//! This module contains the code for reading the configuration.
//!
//! The configuration is a TOML file with two sections, `[ovs]` and `[emulator]`. Every key is
//! optional:
//!
//! ```toml
//! [ovs]
//! ofctl = "ovs-ofctl"
//! vsctl = "ovs-vsctl"
//! protocol = "OpenFlow13"
//! sudo = true
//! command_timeout_ms = 5000
//! connect_timeout_ms = 10000
//!
//! [emulator]
//! ip = "ip"
//! fail_mode = "secure"
//! host_network = "10.0.0.0/24"
//! ```

use std::{fmt, fs::read_to_string, path::Path, time::Duration};

use ipnet::Ipv4Net;
use serde::{de::Error as _, Deserialize, Deserializer};
use thiserror::Error;

/// Configuration of the lab.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How to talk to Open vSwitch.
    pub ovs: OvsConfig,
    /// How to build the emulated network.
    pub emulator: EmulatorConfig,
}

impl Config {
    /// Load the configuration from `path`, or return the default configuration if no path is
    /// given.
    pub fn load(path: Option<impl AsRef<Path>>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Read and parse a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::debug!("Read configuration from {}", path.display());
        let content = read_to_string(path)
            .map_err(|e| ConfigError::Read(path.display().to_string(), e))?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Configuration for `ovs-ofctl` and `ovs-vsctl`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OvsConfig {
    /// Program used to manage flows.
    pub ofctl: String,
    /// Program used to manage bridges and ports.
    pub vsctl: String,
    /// OpenFlow version passed to `ovs-ofctl -O`. If `None`, use the default of `ovs-ofctl`.
    pub protocol: Option<String>,
    /// Execute all commands with `sudo -n`.
    pub sudo: bool,
    /// Upper bound for a single round trip with a switch.
    #[serde(rename = "command_timeout_ms", deserialize_with = "deserialize_millis")]
    pub command_timeout: Duration,
    /// Upper bound for establishing an SSH session.
    #[serde(rename = "connect_timeout_ms", deserialize_with = "deserialize_millis")]
    pub connect_timeout: Duration,
}

impl Default for OvsConfig {
    fn default() -> Self {
        Self {
            ofctl: String::from("ovs-ofctl"),
            vsctl: String::from("ovs-vsctl"),
            protocol: None,
            sudo: false,
            command_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Configuration of the emulated network.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    /// Program used to manage links and network namespaces (`iproute2`).
    pub ip: String,
    /// Fail mode of the created bridges.
    pub fail_mode: FailMode,
    /// Network from which the two end hosts get their addresses. It must contain at least two
    /// host addresses.
    #[serde(deserialize_with = "deserialize_host_network")]
    pub host_network: Ipv4Net,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            ip: String::from("ip"),
            fail_mode: FailMode::Secure,
            // the literal is a valid network
            host_network: Ipv4Net::new([10, 0, 0, 0].into(), 24).unwrap_or_default(),
        }
    }
}

impl EmulatorConfig {
    /// Addresses of the left and the right host, which are the first two host addresses of
    /// `host_network`.
    pub fn host_addresses(&self) -> Result<(Ipv4Net, Ipv4Net), ConfigError> {
        let prefix_len = self.host_network.prefix_len();
        let mut hosts = self.host_network.hosts();
        match (hosts.next(), hosts.next()) {
            (Some(left), Some(right)) => Ok((
                Ipv4Net::new(left, prefix_len)?,
                Ipv4Net::new(right, prefix_len)?,
            )),
            _ => Err(ConfigError::HostNetworkTooSmall(self.host_network)),
        }
    }
}

/// Behavior of a bridge that has no connection to a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    /// Only forward according to the installed flows.
    Secure,
    /// Act like a learning switch as long as no controller is connected.
    Standalone,
}

impl fmt::Display for FailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailMode::Secure => f.write_str("secure"),
            FailMode::Standalone => f.write_str("standalone"),
        }
    }
}

fn deserialize_millis<'de, D>(de: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let x = u64::deserialize(de)?;
    if x == 0 {
        Err(D::Error::custom("Timeout must be larger than 0 milliseconds"))
    } else {
        Ok(Duration::from_millis(x))
    }
}

fn deserialize_host_network<'de, D>(de: D) -> Result<Ipv4Net, D::Error>
where
    D: Deserializer<'de>,
{
    let net = Ipv4Net::deserialize(de)?;
    if net.prefix_len() > 30 {
        Err(D::Error::custom(format!(
            "Host network {net} must contain at least two host addresses"
        )))
    } else {
        Ok(net)
    }
}

/// Error while reading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Cannot read the file
    #[error("Cannot read '{0}': {1}")]
    Read(String, std::io::Error),
    /// Cannot parse the file
    #[error("Cannot parse the configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// Invalid prefix length
    #[error("Invalid prefix length: {0}")]
    PrefixLen(#[from] ipnet::PrefixLenError),
    /// The host network has less than two host addresses.
    #[error("Host network {0} must contain at least two host addresses")]
    HostNetworkTooSmall(Ipv4Net),
}
