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

use std::sync::Arc;

use ovs_lab::{
    config::{Config, EmulatorConfig, OvsConfig},
    session::Session,
};
use pretty_assertions::assert_eq;
use test_log::test;

use super::script;
use crate::{
    emulator::{interface_name, Emulator, EmulatorError, MAX_INTERFACE_NAME},
    topology::Topology,
};

#[test]
fn interface_names() {
    let topo = Topology::build(2).unwrap();
    let names = topo
        .links()
        .map(|l| (interface_name(&l.left), interface_name(&l.right)))
        .collect::<Vec<_>>();
    assert_eq!(
        names,
        vec![
            ("host-left-eth0".to_string(), "elem-1-eth1".to_string()),
            ("elem-1-eth2".to_string(), "elem-2-eth1".to_string()),
            ("elem-2-eth2".to_string(), "host-right-eth0".to_string()),
        ]
    );
}

#[test]
fn interface_names_fit_the_kernel_limit() {
    let topo = Topology::build(99_999).unwrap();
    for link in topo.links() {
        for endpoint in [&link.left, &link.right] {
            assert!(interface_name(endpoint).len() <= MAX_INTERFACE_NAME);
        }
    }
    let emulator = Emulator::new(
        Arc::new(topo),
        Session::local(false),
        &Config::default(),
    );
    assert!(emulator.check_interface_names().is_ok());
}

#[test(tokio::test)]
async fn failed_start_tears_down() {
    let dir = tempfile::tempdir().unwrap();
    let calls = dir.path().join("calls.log");
    let vsctl = script(
        dir.path(),
        "vsctl",
        &format!("echo \"vsctl $*\" >> {}", calls.display()),
    );
    let ip = script(
        dir.path(),
        "ip",
        &format!(
            "echo \"ip $*\" >> {}\n\
             case \"$1 $2\" in\n\
             \"netns list\") exit 0 ;;\n\
             \"link show\") exit 1 ;;\n\
             \"netns add\") echo 'Operation not permitted' >&2; exit 2 ;;\n\
             esac",
            calls.display()
        ),
    );
    let config = Config {
        ovs: OvsConfig {
            vsctl,
            ..Default::default()
        },
        emulator: EmulatorConfig {
            ip,
            ..Default::default()
        },
    };
    let topo = Arc::new(Topology::build(2).unwrap());
    let emulator = Emulator::new(topo, Session::local(false), &config);

    assert!(matches!(
        emulator.start().await,
        Err(EmulatorError::Session(_))
    ));

    let calls = std::fs::read_to_string(&calls).unwrap();
    let calls = calls.lines().collect::<Vec<_>>();
    let pos = |line: &str| calls.iter().rposition(|l| *l == line).unwrap();
    // the bridges were created, and deleted again after the failure
    for elem in ["elem-1", "elem-2"] {
        let created = pos(&format!(
            "vsctl --may-exist add-br {elem} -- set-fail-mode {elem} secure"
        ));
        let deleted = pos(&format!("vsctl --if-exists del-br {elem}"));
        assert!(created < deleted, "{elem} not deleted after creation:\n{calls:#?}");
    }
    assert!(calls.contains(&"ip netns add host-left"));
    assert!(!calls.iter().any(|l| l.starts_with("ip link add")));
}

#[test(tokio::test)]
async fn interface_names_are_checked_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let calls = dir.path().join("calls.log");
    let logger = script(
        dir.path(),
        "log",
        &format!("echo \"$*\" >> {}", calls.display()),
    );
    let config = Config {
        ovs: OvsConfig {
            vsctl: logger.clone(),
            ofctl: logger.clone(),
            ..Default::default()
        },
        emulator: EmulatorConfig {
            ip: logger,
            ..Default::default()
        },
    };
    let topo = Arc::new(Topology::build(100_000).unwrap());
    let emulator = Emulator::new(topo, Session::local(false), &config);

    match emulator.start().await {
        Err(EmulatorError::InterfaceNameTooLong(iface)) => {
            assert_eq!(iface, "elem-100000-eth1")
        }
        r => panic!("Unexpected result: {r:?}"),
    }
    // nothing was executed
    assert!(!calls.exists());
}
