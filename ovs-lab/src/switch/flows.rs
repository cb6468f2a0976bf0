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

//! Module for parsing the flow tables printed by `ovs-ofctl dump-flows`.
//!
//! A dump looks like this (the header line only exists for OpenFlow 1.0):
//!
//! ```text
//! NXST_FLOW reply (xid=0x4):
//!  cookie=0x0, duration=12.345s, table=0, n_packets=57, n_bytes=4218, idle_age=3, in_port=1 actions=output:2
//!  cookie=0x0, duration=12.301s, table=0, n_packets=42, n_bytes=3108, idle_age=3, in_port=2 actions=output:1
//! ```
//!
//! The parser does not rely on the field order, the whitespace, or on the presence of any of the
//! counters. It only extracts the ingress port of the match and the output ports of the actions.
//! Lines without an `in_port` match (headers, table-miss entries, ...) are ignored.

use std::collections::{BTreeMap, BTreeSet};

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// Port number on an OpenFlow switch.
pub type PortNo = u16;

lazy_static! {
    static ref IN_PORT_RE: Regex =
        Regex::new(r#"(?:^|[\s,])in_port="?([^\s,"]+)"?"#).unwrap();
    static ref ACTIONS_RE: Regex = Regex::new(r"(?:^|[\s,])actions=(\S*)").unwrap();
    static ref PRIORITY_RE: Regex = Regex::new(r"(?:^|[\s,])priority=(\d+)").unwrap();
    static ref N_PACKETS_RE: Regex = Regex::new(r"(?:^|[\s,])n_packets=(\d+)").unwrap();
}

/// A single entry of a flow table, matching on an ingress port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowEntry {
    /// Ingress port of the match.
    pub in_port: PortNo,
    /// All ports to which the actions send the packet, in the order of the actions.
    pub outputs: Vec<PortNo>,
    /// Priority of the entry, if printed.
    pub priority: Option<u32>,
    /// Number of packets that matched the entry, if printed.
    pub n_packets: Option<u64>,
}

impl FlowEntry {
    /// Parse a single line of the dump. Returns `Ok(None)` if the line does not describe a flow
    /// that matches on the ingress port.
    pub fn from_line(line: &str) -> Result<Option<Self>, ParseError> {
        let Some(in_port) = IN_PORT_RE.captures(line).and_then(|c| c.get(1)) else {
            return Ok(None);
        };
        let in_port = parse_port(in_port.as_str())?;

        let outputs = ACTIONS_RE
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|actions| parse_actions(actions.as_str()))
            .transpose()?
            .unwrap_or_default();

        let priority = PRIORITY_RE
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|p| p.as_str().parse())
            .transpose()?;
        let n_packets = N_PACKETS_RE
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|p| p.as_str().parse())
            .transpose()?;

        Ok(Some(Self {
            in_port,
            outputs,
            priority,
            n_packets,
        }))
    }
}

/// Parse all entries of a dump. Lines that look like a flow, but cannot be parsed (for instance,
/// because they match on a port name instead of a port number), are skipped.
pub fn parse_flows(dump: &str) -> Vec<FlowEntry> {
    dump.lines()
        .filter_map(|line| match FlowEntry::from_line(line) {
            Ok(entry) => entry,
            Err(e) => {
                log::debug!("Skip flow entry `{}`: {e}", line.trim());
                None
            }
        })
        .collect()
}

/// Parse the action list. Only `output:X` (and the shorthand `X`) is interpreted, all other
/// actions are ignored.
fn parse_actions(actions: &str) -> Result<Vec<PortNo>, ParseError> {
    actions
        .split(',')
        .map(str::trim)
        .filter_map(|action| {
            if let Some(port) = action.strip_prefix("output:") {
                Some(parse_port(port.trim_matches('"')))
            } else if action.chars().all(|c| c.is_ascii_digit()) && !action.is_empty() {
                Some(parse_port(action))
            } else {
                None
            }
        })
        .collect()
}

fn parse_port(port: &str) -> Result<PortNo, ParseError> {
    port.parse()
        .map_err(|_| ParseError::InvalidPort(port.to_string()))
}

/// Structured view of a flow table: for every ingress port, the set of egress ports that some
/// entry forwards to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowTable {
    ports: BTreeMap<PortNo, BTreeSet<PortNo>>,
}

impl FlowTable {
    /// Build the table from the raw output of `ovs-ofctl dump-flows`.
    pub fn from_dump(dump: &str) -> Self {
        parse_flows(dump).into_iter().collect()
    }

    /// Check if any entry forwards packets arriving at `in_port` out of `out_port`.
    pub fn forwards(&self, in_port: PortNo, out_port: PortNo) -> bool {
        self.ports
            .get(&in_port)
            .map(|outs| outs.contains(&out_port))
            .unwrap_or(false)
    }

    /// Get all egress ports of a given ingress port.
    pub fn egress(&self, in_port: PortNo) -> Option<&BTreeSet<PortNo>> {
        self.ports.get(&in_port)
    }

    /// Iterate over all ingress ports and their egress ports.
    pub fn iter(&self) -> impl Iterator<Item = (PortNo, &BTreeSet<PortNo>)> {
        self.ports.iter().map(|(p, outs)| (*p, outs))
    }

    /// Whether the table contains no entry that matches on an ingress port.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

impl FromIterator<FlowEntry> for FlowTable {
    fn from_iter<T: IntoIterator<Item = FlowEntry>>(iter: T) -> Self {
        let mut ports: BTreeMap<PortNo, BTreeSet<PortNo>> = BTreeMap::new();
        for entry in iter {
            ports.entry(entry.in_port).or_default().extend(entry.outputs);
        }
        Self { ports }
    }
}

/// Error while parsing the flow table.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The port is not a number
    #[error("Invalid port number: {0}")]
    InvalidPort(String),
    /// Cannot parse a counter
    #[error("Cannot parse integer: {0}")]
    IntParse(#[from] std::num::ParseIntError),
}
