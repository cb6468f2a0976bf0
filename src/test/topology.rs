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

use pretty_assertions::assert_eq;

use crate::topology::{Endpoint, Topology, TopologyError};

fn endpoint(node: &str, port: Option<u16>) -> Endpoint {
    Endpoint {
        node: node.to_string(),
        port,
    }
}

#[test]
fn chain_of_three() {
    let topo = Topology::build(3).unwrap();
    assert_eq!(topo.hop_count(), 3);
    assert_eq!(topo.hosts(), ["host-left", "host-right"]);
    assert_eq!(
        topo.elements().map(|e| e.name()).collect::<Vec<_>>(),
        vec!["elem-1", "elem-2", "elem-3"]
    );
    assert_eq!(
        topo.path(),
        vec!["host-left", "elem-1", "elem-2", "elem-3", "host-right"]
    );
    assert_eq!(topo.links().count(), 4);
    assert_eq!(topo.nodes().count(), 5);
}

#[test]
fn single_hop() {
    let topo = Topology::build(1).unwrap();
    assert_eq!(topo.path(), vec!["host-left", "elem-1", "host-right"]);
    assert_eq!(
        topo.links().map(|l| l.to_string()).collect::<Vec<_>>(),
        vec!["host-left -- elem-1:1", "elem-1:2 -- host-right"]
    );
}

#[test]
fn ports_face_the_hosts() {
    let topo = Topology::build(2).unwrap();
    let links = topo.links().cloned().collect::<Vec<_>>();
    assert_eq!(links[0].left, endpoint("host-left", None));
    assert_eq!(links[0].right, endpoint("elem-1", Some(1)));
    assert_eq!(links[1].left, endpoint("elem-1", Some(2)));
    assert_eq!(links[1].right, endpoint("elem-2", Some(1)));
    assert_eq!(links[2].left, endpoint("elem-2", Some(2)));
    assert_eq!(links[2].right, endpoint("host-right", None));
    assert!(links[1].connects("elem-2", "elem-1"));
    assert!(!links[1].connects("elem-2", "host-right"));
}

#[test]
fn degrees() {
    for n in [1, 2, 7] {
        let topo = Topology::build(n).unwrap();
        assert_eq!(topo.links().count(), n as usize + 1);
        for e in topo.elements() {
            assert_eq!(topo.degree(e.name()), Some(2));
        }
        for h in topo.hosts() {
            assert_eq!(topo.degree(h), Some(1));
        }
        assert_eq!(topo.degree("elem-0"), None);
    }
}

#[test]
fn element_lookup() {
    let topo = Topology::build(4).unwrap();
    assert_eq!(topo.element("elem-3").map(|e| e.index()), Some(3));
    assert_eq!(topo.element_at(1).map(|e| e.name()), Some("elem-1"));
    assert_eq!(topo.element_at(0), None);
    assert_eq!(topo.element_at(5), None);
    assert_eq!(topo.element("elem-5"), None);
}

#[test]
fn deterministic() {
    let a = Topology::build(5).unwrap();
    let b = Topology::build(5).unwrap();
    assert_eq!(a.links().collect::<Vec<_>>(), b.links().collect::<Vec<_>>());
    assert_eq!(a.nodes().collect::<Vec<_>>(), b.nodes().collect::<Vec<_>>());
}

#[test]
fn invalid_hop_count() {
    assert_eq!(
        Topology::build(0).unwrap_err(),
        TopologyError::InvalidHopCount(0)
    );
    assert_eq!(
        Topology::build(-2).unwrap_err(),
        TopologyError::InvalidHopCount(-2)
    );
}

#[test]
fn check_hop_count() {
    let topo = Topology::build(3).unwrap();
    assert_eq!(topo.check_hop_count(2), Ok(2));
    assert_eq!(topo.check_hop_count(3), Ok(3));
    assert_eq!(
        topo.check_hop_count(4),
        Err(TopologyError::HopCountExceedsTopology {
            requested: 4,
            available: 3
        })
    );
    assert_eq!(
        topo.check_hop_count(0),
        Err(TopologyError::InvalidHopCount(0))
    );
}
