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

//! Installs the bidirectional forwarding rules on every element of the chain.

use std::{fmt, sync::Arc};

use thiserror::Error;

use crate::{
    control::{ControlError, ElementControl},
    rule::FlowRule,
    topology::{ForwardingElement, Topology},
    ChainError,
};

/// Install the two required rules on each of the first `hop_count` elements of the chain.
///
/// Elements are provisioned concurrently, while the two rules of the same element are issued
/// one after the other. A failing rule does not abort the provisioning; it is recorded in the
/// returned [`ProvisionReport`]. The function only fails if `hop_count` is not valid for the
/// topology, in which case no element is touched.
pub async fn provision(
    topology: Arc<Topology>,
    control: Arc<dyn ElementControl>,
    hop_count: i64,
) -> Result<ProvisionReport, ChainError> {
    let hop_count = topology.check_hop_count(hop_count)?;
    log::info!("Configure flows on {hop_count} elements");

    let jobs = topology
        .elements()
        .take(hop_count)
        .cloned()
        .map(|element| {
            let control = control.clone();
            tokio::spawn(async move { provision_element(&element, control.as_ref()).await })
        })
        .collect::<Vec<_>>();

    let mut elements = Vec::with_capacity(jobs.len());
    for job in jobs {
        elements.push(job.await?);
    }

    let report = ProvisionReport { elements };
    if report.all_ok() {
        log::info!("All flows configured");
    } else {
        log::warn!("{} flows could not be configured", report.failures().count());
    }
    Ok(report)
}

/// Issue both required rules on a single element, in declaration order.
pub async fn provision_element(
    element: &ForwardingElement,
    control: &dyn ElementControl,
) -> ElementProvision {
    let mut failures = Vec::new();
    for rule in FlowRule::required(element) {
        match control.issue_rule(&rule).await {
            Ok(()) => log::debug!("[{}] installed {}", element.name(), rule.descriptor()),
            Err(source) => {
                log::warn!("[{}] cannot install {}: {source}", element.name(), rule.descriptor());
                failures.push(ProvisionError { rule, source });
            }
        }
    }
    ElementProvision {
        name: element.name().to_string(),
        failures,
    }
}

/// Outcome of provisioning the chain, in hop order.
#[derive(Debug)]
pub struct ProvisionReport {
    elements: Vec<ElementProvision>,
}

impl ProvisionReport {
    /// Returns `true` if every rule was installed.
    pub fn all_ok(&self) -> bool {
        self.elements.iter().all(ElementProvision::ok)
    }

    /// Per-element outcome, in hop order.
    pub fn elements(&self) -> &[ElementProvision] {
        &self.elements
    }

    /// Iterate over all rules that could not be installed.
    pub fn failures(&self) -> impl Iterator<Item = &ProvisionError> {
        self.elements.iter().flat_map(|e| e.failures.iter())
    }
}

impl fmt::Display for ProvisionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.elements {
            if element.ok() {
                writeln!(f, "Configured flows for {}", element.name)?;
            } else {
                writeln!(f, "⚠ Failed to configure flows for {}:", element.name)?;
                for failure in &element.failures {
                    writeln!(f, "  - {}: {}", failure.rule.descriptor(), failure.source)?;
                }
            }
        }
        Ok(())
    }
}

/// Outcome of provisioning a single element.
#[derive(Debug)]
pub struct ElementProvision {
    /// Name of the element
    pub name: String,
    /// Rules that could not be installed, in declaration order.
    pub failures: Vec<ProvisionError>,
}

impl ElementProvision {
    /// Returns `true` if both rules were installed.
    pub fn ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A rule that could not be installed.
#[derive(Debug, Error)]
#[error("Cannot install {rule}: {source}")]
pub struct ProvisionError {
    /// The rule that failed
    pub rule: FlowRule,
    /// Reason reported by the control plane
    #[source]
    pub source: ControlError,
}

impl ProvisionError {
    /// Name of the element on which the rule failed.
    pub fn element(&self) -> &str {
        &self.rule.element
    }
}
