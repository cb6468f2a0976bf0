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

//! Test module, including an in-memory control plane.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    os::unix::fs::PermissionsExt,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use ovs_lab::switch::PortNo;

use crate::{
    control::{ControlError, ElementControl},
    rule::FlowRule,
    topology::Topology,
    ChainHandle,
};

mod emulator;
mod provision;
mod report;
mod topology;

/// Control plane that keeps the flow tables in memory and renders them like
/// `ovs-ofctl dump-flows`.
#[derive(Debug, Default)]
pub(crate) struct FakeControl {
    tables: Mutex<HashMap<String, BTreeMap<PortNo, PortNo>>>,
    raw: Mutex<HashMap<String, String>>,
    unreachable: HashSet<String>,
    failing: HashSet<String>,
    issued: Mutex<Vec<FlowRule>>,
    queries: AtomicU64,
}

impl FakeControl {
    /// Elements that never answer a query.
    pub fn with_unreachable<'a>(mut self, elements: impl IntoIterator<Item = &'a str>) -> Self {
        self.unreachable
            .extend(elements.into_iter().map(String::from));
        self
    }

    /// Elements that refuse every rule.
    pub fn with_failing<'a>(mut self, elements: impl IntoIterator<Item = &'a str>) -> Self {
        self.failing.extend(elements.into_iter().map(String::from));
        self
    }

    /// Remove the rule matching `in_port` from an element.
    pub fn remove_rule(&self, element: &str, in_port: PortNo) {
        if let Some(table) = self.tables.lock().unwrap().get_mut(element) {
            table.remove(&in_port);
        }
    }

    /// Answer queries of `element` with `dump` instead of its table.
    pub fn set_dump(&self, element: &str, dump: &str) {
        self.raw
            .lock()
            .unwrap()
            .insert(element.to_string(), dump.to_string());
    }

    /// All rules issued so far, in the order in which they were received.
    pub fn issued(&self) -> Vec<FlowRule> {
        self.issued.lock().unwrap().clone()
    }

    /// Current table of an element (ingress to egress port).
    pub fn table(&self, element: &str) -> BTreeMap<PortNo, PortNo> {
        self.tables
            .lock()
            .unwrap()
            .get(element)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ElementControl for FakeControl {
    async fn issue_rule(&self, rule: &FlowRule) -> Result<(), ControlError> {
        self.issued.lock().unwrap().push(rule.clone());
        if self.failing.contains(&rule.element) {
            return Err(ControlError::Other(String::from("Connection refused")));
        }
        self.tables
            .lock()
            .unwrap()
            .entry(rule.element.clone())
            .or_default()
            .insert(rule.in_port, rule.out_port);
        Ok(())
    }

    async fn query_rules(&self, element: &str) -> Result<Option<String>, ControlError> {
        if self.unreachable.contains(element) {
            return Err(ControlError::Timeout(Duration::from_secs(5)));
        }
        if let Some(dump) = self.raw.lock().unwrap().get(element) {
            return Ok(Some(dump.clone()));
        }
        // the duration changes with every query, like on a real switch
        let n = self.queries.fetch_add(1, Ordering::SeqCst);
        let mut dump = String::from("NXST_FLOW reply (xid=0x4):\n");
        for (in_port, out_port) in self.table(element) {
            dump.push_str(&format!(
                " cookie=0x0, duration={n}.5s, table=0, n_packets={n}, n_bytes=0, idle_age=1, \
                 in_port={in_port} actions=output:{out_port}\n"
            ));
        }
        Ok(Some(dump))
    }
}

/// Chain with `hops` elements on top of a [`FakeControl`].
pub(crate) fn chain(hops: i64, control: FakeControl) -> (ChainHandle, Arc<FakeControl>) {
    let topology = Arc::new(Topology::build(hops).unwrap());
    let control = Arc::new(control);
    (ChainHandle::new(topology, control.clone(), hops), control)
}

/// Write an executable shell script with the given body into `dir`, and return its path.
pub(crate) fn script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().to_string()
}
