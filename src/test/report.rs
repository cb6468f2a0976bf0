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
use test_log::test;

use super::{chain, FakeControl};
use crate::report::{FlowReporter, FAILURE_BANNER, SUCCESS_BANNER};

#[test(tokio::test)]
async fn three_hops_correct() {
    let (handle, _) = chain(3, FakeControl::default());
    handle.provision().await.unwrap();
    let reporter = FlowReporter::new(handle);

    let (result, text) = reporter.report_verification().await.unwrap();
    assert!(result.all_ok);
    assert_eq!(
        text,
        "\nVerifying network flows...\n\
         ✓ Flows correctly configured for elem-1\n\
         ✓ Flows correctly configured for elem-2\n\
         ✓ Flows correctly configured for elem-3\n\
         \n\
         ✓ All flows are correctly configured!\n"
    );

    // reports can be requested any number of times
    let (_, again) = reporter.report_verification().await.unwrap();
    assert_eq!(text, again);
}

#[test(tokio::test)]
async fn one_rule_missing() {
    let (handle, control) = chain(3, FakeControl::default());
    handle.provision().await.unwrap();
    control.remove_rule("elem-2", 2);

    let (_, text) = FlowReporter::new(handle)
        .report_verification()
        .await
        .unwrap();
    assert_eq!(
        text.lines()
            .filter(|l| l.starts_with("⚠ Missing flows"))
            .collect::<Vec<_>>(),
        vec!["⚠ Missing flows in elem-2:"]
    );
    assert!(text.contains("⚠ Missing flows in elem-2:\n  - in_port=2→out:1\n\nCurrent flows:\n"));
    assert!(text.contains("in_port=1 actions=output:2"));
    assert!(text.contains("✓ Flows correctly configured for elem-1\n"));
    assert!(text.contains("✓ Flows correctly configured for elem-3\n"));
    assert!(text.ends_with(&format!("\n{FAILURE_BANNER}\n")));
    assert!(!text.contains(SUCCESS_BANNER));
}

#[test(tokio::test)]
async fn unreachable_element() {
    let (handle, _) = chain(3, FakeControl::default().with_unreachable(["elem-3"]));
    handle.provision().await.unwrap();

    let (_, text) = FlowReporter::new(handle)
        .report_verification()
        .await
        .unwrap();
    assert!(text.contains("⚠ Could not retrieve flows for elem-3\n"));
    assert!(text.contains("✓ Flows correctly configured for elem-2\n"));
    assert!(text.ends_with(&format!("{FAILURE_BANNER}\n")));
}

#[test(tokio::test)]
async fn current_state() {
    let (handle, control) = chain(3, FakeControl::default().with_unreachable(["elem-2"]));
    handle.provision().await.unwrap();
    control.set_dump("elem-3", "");

    let text = FlowReporter::new(handle)
        .report_current_state()
        .await
        .unwrap();

    let pos = |s: &str| text.find(s).unwrap();
    assert!(pos("Flows for elem-1:") < pos("Flows for elem-2:"));
    assert!(pos("Flows for elem-2:") < pos("Flows for elem-3:"));
    assert!(text.contains("in_port=1 actions=output:2"));
    assert!(text.contains("in_port=2 actions=output:1"));
    assert!(text.contains("Flows for elem-2:\n(no flows retrieved)\n"));
    assert!(text.ends_with("Flows for elem-3:\n(no flows retrieved)\n"));
    // the raw table is not interpreted
    assert!(!text.contains('✓'));
    assert!(!text.contains('⚠'));
}
