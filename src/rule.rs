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

//! Forwarding rules required on every element of the chain.

use std::fmt;

use ovs_lab::switch::{FlowTable, PortNo};

use crate::topology::{ForwardingElement, LEFT_PORT, RIGHT_PORT};

/// A rule that forwards all packets arriving on `in_port` of `element` out of `out_port`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FlowRule {
    /// Name of the element on which the rule is installed.
    pub element: String,
    /// Ingress port to match.
    pub in_port: PortNo,
    /// Egress port of the output action.
    pub out_port: PortNo,
}

impl FlowRule {
    /// Create a new rule.
    pub fn new(element: impl Into<String>, in_port: PortNo, out_port: PortNo) -> Self {
        Self {
            element: element.into(),
            in_port,
            out_port,
        }
    }

    /// The two rules every element requires, in declaration order: first left to right, then
    /// right to left.
    pub fn required(element: &ForwardingElement) -> [FlowRule; 2] {
        [
            FlowRule::new(element.name(), LEFT_PORT, RIGHT_PORT),
            FlowRule::new(element.name(), RIGHT_PORT, LEFT_PORT),
        ]
    }

    /// Human-readable descriptor of the match and action, `in_port=X→out:Y`.
    pub fn descriptor(&self) -> String {
        format!("in_port={}→out:{}", self.in_port, self.out_port)
    }

    /// Check if the rule is present in the parsed flow table.
    pub fn is_satisfied_by(&self, table: &FlowTable) -> bool {
        table.forwards(self.in_port, self.out_port)
    }
}

impl fmt::Display for FlowRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.element, self.descriptor())
    }
}
