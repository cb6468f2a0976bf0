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

//! Compares the rules installed on the elements against the required policy.

use std::{fmt, sync::Arc};

use ovs_lab::switch::FlowTable;
use thiserror::Error;

use crate::{
    control::{ControlError, ElementControl},
    rule::FlowRule,
    topology::{ForwardingElement, Topology},
    ChainError,
};

/// Sentinel entry of the missing list for elements whose rules could not be retrieved.
pub const UNREACHABLE: &str = "unreachable";

/// Verify the rules on the first `hop_count` elements of the chain.
///
/// This never modifies any element. Elements are queried concurrently. An element that cannot
/// be queried is marked as failed with the [`MissingRule::Unreachable`] sentinel, but all other
/// elements are still evaluated. The function only fails if `hop_count` is not valid for the
/// topology.
pub async fn verify(
    topology: Arc<Topology>,
    control: Arc<dyn ElementControl>,
    hop_count: i64,
) -> Result<VerificationResult, ChainError> {
    let hop_count = topology.check_hop_count(hop_count)?;
    log::info!("Verify flows on {hop_count} elements");

    let jobs = topology
        .elements()
        .take(hop_count)
        .cloned()
        .map(|element| {
            let control = control.clone();
            tokio::spawn(async move { verify_element(&element, control.as_ref()).await })
        })
        .collect::<Vec<_>>();

    let mut elements = Vec::with_capacity(jobs.len());
    for job in jobs {
        elements.push(job.await?);
    }

    Ok(VerificationResult::new(elements))
}

/// Query and evaluate a single element.
pub async fn verify_element(
    element: &ForwardingElement,
    control: &dyn ElementControl,
) -> ElementVerification {
    match query(element, control).await {
        Ok(dump) => ElementVerification::evaluate(element, dump),
        Err(e) => {
            log::warn!("[{}] {e}", element.name());
            ElementVerification::unreachable(element, e)
        }
    }
}

async fn query(element: &ForwardingElement, control: &dyn ElementControl) -> Result<String, QueryError> {
    match control.query_rules(element.name()).await? {
        Some(dump) if !dump.trim().is_empty() => Ok(dump),
        _ => Err(QueryError::Empty),
    }
}

/// A required rule that was not found on an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(into = "String"))]
pub enum MissingRule {
    /// The rule is not installed.
    Rule(FlowRule),
    /// The rules of the element could not be retrieved at all.
    Unreachable,
}

impl fmt::Display for MissingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingRule::Rule(rule) => f.write_str(&rule.descriptor()),
            MissingRule::Unreachable => f.write_str(UNREACHABLE),
        }
    }
}

impl From<MissingRule> for String {
    fn from(m: MissingRule) -> Self {
        m.to_string()
    }
}

/// Verification outcome of a single element.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ElementVerification {
    /// Name of the element
    pub name: String,
    /// `true` if all required rules are present
    pub ok: bool,
    /// Missing rules in declaration order, or the unreachable sentinel.
    pub missing: Vec<MissingRule>,
    /// Reason why the rules could not be retrieved.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub error: Option<String>,
    /// The raw rule table this result was evaluated against.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub dump: Option<String>,
}

impl ElementVerification {
    /// Check every required rule independently against the raw dump.
    pub fn evaluate(element: &ForwardingElement, dump: String) -> Self {
        let table = FlowTable::from_dump(&dump);
        let missing = FlowRule::required(element)
            .into_iter()
            .filter(|rule| !rule.is_satisfied_by(&table))
            .map(MissingRule::Rule)
            .collect::<Vec<_>>();
        for m in &missing {
            log::debug!("[{}] missing flow {m}", element.name());
        }
        Self {
            name: element.name().to_string(),
            ok: missing.is_empty(),
            missing,
            error: None,
            dump: Some(dump),
        }
    }

    /// Result for an element whose rules could not be retrieved.
    pub fn unreachable(element: &ForwardingElement, error: QueryError) -> Self {
        Self {
            name: element.name().to_string(),
            ok: false,
            missing: vec![MissingRule::Unreachable],
            error: Some(error.to_string()),
            dump: None,
        }
    }

    /// Returns `true` if the rules could not be retrieved.
    pub fn is_unreachable(&self) -> bool {
        self.missing.contains(&MissingRule::Unreachable)
    }

    /// Descriptors of all missing rules, in declaration order.
    pub fn missing_descriptors(&self) -> Vec<String> {
        self.missing.iter().map(|m| m.to_string()).collect()
    }
}

/// The raw dump contains counters and durations that change between calls, so it is not
/// compared.
impl PartialEq for ElementVerification {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.ok == other.ok
            && self.missing == other.missing
            && self.error == other.error
    }
}

impl Eq for ElementVerification {}

/// Aggregated verification outcome of the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct VerificationResult {
    /// `true` if all elements are correctly configured
    pub all_ok: bool,
    /// Per-element results in hop order
    pub per_element: Vec<ElementVerification>,
}

impl VerificationResult {
    /// Aggregate the per-element results.
    pub fn new(per_element: Vec<ElementVerification>) -> Self {
        Self {
            all_ok: per_element.iter().all(|e| e.ok),
            per_element,
        }
    }

    /// Get the result of an element by its name.
    pub fn get(&self, name: &str) -> Option<&ElementVerification> {
        self.per_element.iter().find(|e| e.name == name)
    }

    /// Iterate over all elements that are not correctly configured.
    pub fn failed(&self) -> impl Iterator<Item = &ElementVerification> {
        self.per_element.iter().filter(|e| !e.ok)
    }
}

/// The rules of an element could not be retrieved.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The control plane returned an error.
    #[error("{0}")]
    Control(#[from] ControlError),
    /// The element returned no output.
    #[error("Empty response")]
    Empty,
}
