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

//! Human-readable reports for the operator.

use std::fmt::Write;

use crate::{
    verify::{ElementVerification, VerificationResult},
    ChainError, ChainHandle,
};

/// Banner printed if all elements are correctly configured.
pub const SUCCESS_BANNER: &str = "✓ All flows are correctly configured!";
/// Banner printed if at least one element is not correctly configured.
pub const FAILURE_BANNER: &str = "⚠ Warning: Some flows are not correctly configured!";

/// Renders verification outcomes and the current rule tables of a chain. All reports are
/// read-only and can be requested any number of times.
#[derive(Debug, Clone)]
pub struct FlowReporter {
    handle: ChainHandle,
}

impl FlowReporter {
    /// Create a reporter for the given chain.
    pub fn new(handle: ChainHandle) -> Self {
        Self { handle }
    }

    /// Verify the chain and render the outcome, see [`render_verification`].
    pub async fn report_verification(&self) -> Result<(VerificationResult, String), ChainError> {
        let result = self.handle.verify().await?;
        let report = render_verification(&result);
        Ok((result, report))
    }

    /// Render the raw rule table of every managed element, without interpreting it.
    pub async fn report_current_state(&self) -> Result<String, ChainError> {
        let topology = self.handle.topology();
        let hop_count = topology.check_hop_count(self.handle.hop_count())?;

        let jobs = topology
            .elements()
            .take(hop_count)
            .map(|e| {
                let name = e.name().to_string();
                let control = self.handle.control().clone();
                tokio::spawn(async move {
                    let dump = control.query_rules(&name).await;
                    (name, dump)
                })
            })
            .collect::<Vec<_>>();

        let mut out = String::from("\nCurrent network flows:\n");
        for job in jobs {
            let (name, dump) = job.await?;
            // writing to a string cannot fail
            let _ = writeln!(out, "\nFlows for {name}:");
            match dump {
                Ok(Some(dump)) if !dump.trim().is_empty() => {
                    out.push_str(&dump);
                    if !dump.ends_with('\n') {
                        out.push('\n');
                    }
                }
                Ok(_) => out.push_str("(no flows retrieved)\n"),
                Err(e) => {
                    log::warn!("[{name}] {e}");
                    out.push_str("(no flows retrieved)\n");
                }
            }
        }
        Ok(out)
    }
}

/// Render a verification result: one line per element, the missing rules and current flows of
/// failing elements, and finally the aggregate banner.
pub fn render_verification(result: &VerificationResult) -> String {
    let mut out = String::from("\nVerifying network flows...\n");
    for element in &result.per_element {
        render_element(&mut out, element);
    }
    out.push('\n');
    out.push_str(if result.all_ok {
        SUCCESS_BANNER
    } else {
        FAILURE_BANNER
    });
    out.push('\n');
    out
}

fn render_element(out: &mut String, element: &ElementVerification) {
    if element.ok {
        let _ = writeln!(out, "✓ Flows correctly configured for {}", element.name);
    } else if element.is_unreachable() {
        let _ = writeln!(out, "⚠ Could not retrieve flows for {}", element.name);
    } else {
        let _ = writeln!(out, "⚠ Missing flows in {}:", element.name);
        for missing in &element.missing {
            let _ = writeln!(out, "  - {missing}");
        }
        if let Some(dump) = &element.dump {
            out.push_str("\nCurrent flows:\n");
            out.push_str(dump);
            if !dump.ends_with('\n') {
                out.push('\n');
            }
        }
    }
}
