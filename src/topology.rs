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

//! Module that derives the linear chain topology.
//!
//! The chain for a hop count `N` consists of two hosts and `N` forwarding elements, connected by
//! `N + 1` links:
//!
//! ```text
//! host-left ---1[elem-1]2--- 1[elem-2]2 --- ... --- 1[elem-N]2--- host-right
//! ```
//!
//! Port 1 of every element faces the left host, port 2 faces the right host.

use std::{collections::HashSet, fmt};

use ovs_lab::switch::PortNo;
use petgraph::{
    graph::{NodeIndex, UnGraph},
    visit::EdgeRef,
};
use thiserror::Error;

/// Name of the host at the left end of the chain.
pub const LEFT_HOST: &str = "host-left";
/// Name of the host at the right end of the chain.
pub const RIGHT_HOST: &str = "host-right";
/// Port of every element that faces the left host.
pub const LEFT_PORT: PortNo = 1;
/// Port of every element that faces the right host.
pub const RIGHT_PORT: PortNo = 2;

/// Name of the element at position `index` (starting at 1).
pub fn element_name(index: usize) -> String {
    format!("elem-{index}")
}

/// Role of an end host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostRole {
    /// Host connected to port 1 of the first element.
    Left,
    /// Host connected to port 2 of the last element.
    Right,
}

impl HostRole {
    /// The fixed name of the host.
    pub fn name(&self) -> &'static str {
        match self {
            HostRole::Left => LEFT_HOST,
            HostRole::Right => RIGHT_HOST,
        }
    }
}

/// A forwarding element (switch) in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForwardingElement {
    index: usize,
    name: String,
}

impl ForwardingElement {
    fn new(index: usize) -> Self {
        Self {
            index,
            name: element_name(index),
        }
    }

    /// Position in the chain, starting at 1 next to the left host.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Name of the element, `elem-{index}`.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A node of the topology.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    /// One of the two end hosts
    Host(HostRole),
    /// A forwarding element
    Element(ForwardingElement),
}

impl Node {
    /// Name of the node.
    pub fn name(&self) -> &str {
        match self {
            Node::Host(role) => role.name(),
            Node::Element(e) => e.name(),
        }
    }
}

/// One end of a link. Hosts have a single interface and thus no port number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    /// Name of the node.
    pub node: String,
    /// Port on the forwarding element, or `None` for hosts.
    pub port: Option<PortNo>,
}

impl Endpoint {
    fn host(role: HostRole) -> Self {
        Self {
            node: role.name().to_string(),
            port: None,
        }
    }

    fn element(e: &ForwardingElement, port: PortNo) -> Self {
        Self {
            node: e.name().to_string(),
            port: Some(port),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}:{}", self.node, port),
            None => f.write_str(&self.node),
        }
    }
}

/// An (undirected) link. `left` is the endpoint closer to the left host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Link {
    /// Endpoint closer to the left host.
    pub left: Endpoint,
    /// Endpoint closer to the right host.
    pub right: Endpoint,
}

impl Link {
    /// Check if the link connects the two nodes (in any order).
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.left.node == a && self.right.node == b) || (self.left.node == b && self.right.node == a)
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -- {}", self.left, self.right)
    }
}

/// Declarative description of the linear chain. The topology is immutable once built.
#[derive(Debug, Clone)]
pub struct Topology {
    graph: UnGraph<Node, Link>,
    hosts: [NodeIndex; 2],
    elements: Vec<NodeIndex>,
}

impl Topology {
    /// Derive the chain with `hop_count` forwarding elements. Fails if `hop_count < 1`.
    pub fn build(hop_count: i64) -> Result<Self, TopologyError> {
        let n = usize::try_from(hop_count)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or(TopologyError::InvalidHopCount(hop_count))?;
        log::debug!("Build linear topology with {n} forwarding elements");

        let mut graph = UnGraph::with_capacity(n + 2, n + 1);
        let left = graph.add_node(Node::Host(HostRole::Left));
        let elements = (1..=n)
            .map(|i| graph.add_node(Node::Element(ForwardingElement::new(i))))
            .collect::<Vec<_>>();
        let right = graph.add_node(Node::Host(HostRole::Right));

        let elem = |graph: &UnGraph<Node, Link>, idx: NodeIndex| match &graph[idx] {
            Node::Element(e) => e.clone(),
            Node::Host(_) => unreachable!("element index points to a host"),
        };

        // host-left -- elem-1
        let first = elem(&graph, elements[0]);
        graph.add_edge(
            left,
            elements[0],
            Link {
                left: Endpoint::host(HostRole::Left),
                right: Endpoint::element(&first, LEFT_PORT),
            },
        );
        // elem-i -- elem-(i+1)
        for (a, b) in elements.iter().zip(elements.iter().skip(1)) {
            let link = Link {
                left: Endpoint::element(&elem(&graph, *a), RIGHT_PORT),
                right: Endpoint::element(&elem(&graph, *b), LEFT_PORT),
            };
            graph.add_edge(*a, *b, link);
        }
        // elem-N -- host-right
        let last = elem(&graph, elements[n - 1]);
        graph.add_edge(
            elements[n - 1],
            right,
            Link {
                left: Endpoint::element(&last, RIGHT_PORT),
                right: Endpoint::host(HostRole::Right),
            },
        );

        Ok(Self {
            graph,
            hosts: [left, right],
            elements,
        })
    }

    /// Number of forwarding elements.
    pub fn hop_count(&self) -> usize {
        self.elements.len()
    }

    /// Check that a requested hop count is valid for this topology, and return it.
    pub fn check_hop_count(&self, hop_count: i64) -> Result<usize, TopologyError> {
        let n = usize::try_from(hop_count)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or(TopologyError::InvalidHopCount(hop_count))?;
        if n > self.hop_count() {
            Err(TopologyError::HopCountExceedsTopology {
                requested: n,
                available: self.hop_count(),
            })
        } else {
            Ok(n)
        }
    }

    /// Names of the left and the right host.
    pub fn hosts(&self) -> [&str; 2] {
        self.hosts.map(|idx| self.graph[idx].name())
    }

    /// Iterate over all forwarding elements in chain order.
    pub fn elements(&self) -> impl Iterator<Item = &ForwardingElement> + '_ {
        self.elements.iter().map(|idx| match &self.graph[*idx] {
            Node::Element(e) => e,
            Node::Host(_) => unreachable!("element index points to a host"),
        })
    }

    /// Get the element at position `index` (starting at 1).
    pub fn element_at(&self, index: usize) -> Option<&ForwardingElement> {
        index.checked_sub(1).and_then(|i| self.elements().nth(i))
    }

    /// Find an element by its name.
    pub fn element(&self, name: &str) -> Option<&ForwardingElement> {
        self.elements().find(|e| e.name() == name)
    }

    /// Iterate over all nodes: the left host, all elements in chain order, and the right host.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.graph.node_weights()
    }

    /// Iterate over all links in chain order, starting at the left host.
    pub fn links(&self) -> impl Iterator<Item = &Link> + '_ {
        self.graph.edge_weights()
    }

    /// Number of links attached to the node with the given name.
    pub fn degree(&self, name: &str) -> Option<usize> {
        self.graph
            .node_indices()
            .find(|idx| self.graph[*idx].name() == name)
            .map(|idx| self.graph.edges(idx).count())
    }

    /// Walk the chain from the left host to the right host, returning the names of all visited
    /// nodes. Each node is visited at most once.
    pub fn path(&self) -> Vec<&str> {
        let [left, right] = self.hosts;
        let mut visited = HashSet::new();
        let mut path = Vec::with_capacity(self.graph.node_count());
        let mut current = Some(left);
        while let Some(node) = current {
            visited.insert(node);
            path.push(self.graph[node].name());
            if node == right {
                break;
            }
            current = self
                .graph
                .edges(node)
                .map(|e| if e.source() == node { e.target() } else { e.source() })
                .find(|n| !visited.contains(n));
        }
        path
    }
}

/// Error thrown when the topology cannot be built or used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// The hop count must be at least 1.
    #[error("Invalid hop count {0}: the chain needs at least one forwarding element")]
    InvalidHopCount(i64),
    /// More hops were requested than the topology has elements.
    #[error("Requested {requested} hops, but the topology only has {available} elements")]
    HopCountExceedsTopology {
        /// Number of requested hops
        requested: usize,
        /// Number of elements in the topology
        available: usize,
    },
}
