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

use maplit::btreemap;
use pretty_assertions::assert_eq;
use test_log::test;

use super::{chain, FakeControl};
use crate::{rule::FlowRule, topology::TopologyError, ChainError};

#[test(tokio::test)]
async fn both_directions_on_every_hop() {
    let (handle, control) = chain(3, FakeControl::default());
    let report = handle.provision().await.unwrap();
    assert!(report.all_ok());
    assert_eq!(report.failures().count(), 0);

    for elem in ["elem-1", "elem-2", "elem-3"] {
        assert_eq!(control.table(elem), btreemap! {1 => 2, 2 => 1});
        // the two rules of an element are issued in declaration order
        let issued = control
            .issued()
            .into_iter()
            .filter(|r| r.element == elem)
            .collect::<Vec<_>>();
        assert_eq!(
            issued,
            vec![FlowRule::new(elem, 1, 2), FlowRule::new(elem, 2, 1)]
        );
    }
    assert_eq!(control.issued().len(), 6);
}

#[test(tokio::test)]
async fn report_in_hop_order() {
    let (handle, _) = chain(4, FakeControl::default());
    let report = handle.provision().await.unwrap();
    assert_eq!(
        report.elements().iter().map(|e| e.name.as_str()).collect::<Vec<_>>(),
        vec!["elem-1", "elem-2", "elem-3", "elem-4"]
    );
    assert_eq!(
        report.to_string(),
        "Configured flows for elem-1\n\
         Configured flows for elem-2\n\
         Configured flows for elem-3\n\
         Configured flows for elem-4\n"
    );
}

#[test(tokio::test)]
async fn idempotent() {
    let (handle, control) = chain(2, FakeControl::default());
    handle.provision().await.unwrap();
    handle.provision().await.unwrap();
    assert_eq!(control.issued().len(), 8);
    assert_eq!(control.table("elem-1"), btreemap! {1 => 2, 2 => 1});
    assert_eq!(control.table("elem-2"), btreemap! {1 => 2, 2 => 1});
    assert!(handle.verify().await.unwrap().all_ok);
}

#[test(tokio::test)]
async fn failures_are_recorded() {
    let (handle, control) = chain(3, FakeControl::default().with_failing(["elem-2"]));
    let report = handle.provision().await.unwrap();
    assert!(!report.all_ok());

    // provisioning continues on all other elements
    assert_eq!(control.table("elem-1"), btreemap! {1 => 2, 2 => 1});
    assert_eq!(control.table("elem-3"), btreemap! {1 => 2, 2 => 1});
    assert_eq!(control.issued().len(), 6);

    let failures = report.failures().collect::<Vec<_>>();
    assert_eq!(failures.len(), 2);
    assert!(failures.iter().all(|f| f.element() == "elem-2"));
    assert_eq!(failures[0].rule, FlowRule::new("elem-2", 1, 2));
    assert_eq!(failures[1].rule, FlowRule::new("elem-2", 2, 1));

    let text = report.to_string();
    assert!(text.contains("⚠ Failed to configure flows for elem-2:\n"));
    assert!(text.contains("  - in_port=1→out:2: Connection refused\n"));
    assert!(text.contains("Configured flows for elem-3\n"));
}

#[test(tokio::test)]
async fn partial_hop_count() {
    let (handle, control) = chain(3, FakeControl::default());
    let topology = handle.topology().clone();
    let report = crate::provision::provision(topology, handle.control().clone(), 2)
        .await
        .unwrap();
    assert_eq!(report.elements().len(), 2);
    assert!(control.table("elem-3").is_empty());
}

#[test(tokio::test)]
async fn invalid_hop_count_touches_nothing() {
    let (handle, control) = chain(3, FakeControl::default());
    for hops in [0, -1, 4] {
        let result =
            crate::provision::provision(handle.topology().clone(), handle.control().clone(), hops)
                .await;
        match result {
            Err(ChainError::Topology(TopologyError::InvalidHopCount(n))) => assert_eq!(n, hops),
            Err(ChainError::Topology(TopologyError::HopCountExceedsTopology {
                requested,
                available,
            })) => {
                assert_eq!((requested, available), (4, 3));
            }
            r => panic!("Unexpected result: {r:?}"),
        }
    }
    assert!(control.issued().is_empty());
}
