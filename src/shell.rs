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

//! Registry of the commands available in the interactive shell.

use std::{collections::BTreeMap, fmt, future::Future, pin::Pin};

use itertools::Itertools;
use thiserror::Error;

use crate::{report::FlowReporter, ChainError, ChainHandle};

/// Future returned by a command handler, yielding the text to print.
pub type CommandFuture = Pin<Box<dyn Future<Output = Result<String, ChainError>> + Send>>;

/// Handler of a command, called with the arguments following the command name.
pub type Handler = Box<dyn Fn(Vec<String>) -> CommandFuture + Send + Sync>;

struct Command {
    help: String,
    handler: Handler,
}

/// Mapping from command names to their help text and handler.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, Command>,
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CommandRegistry {
    /// Create an empty registry. Only the builtin `help` command is available.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the registry with all commands operating on a chain:
    /// - `verify_flows`: verify all elements and print the report.
    /// - `show_flows`: print the raw rule table of all elements.
    /// - `provision_flows`: install all required rules again.
    pub fn for_chain(handle: ChainHandle) -> Self {
        let mut registry = Self::new();
        let reporter = FlowReporter::new(handle.clone());

        let r = reporter.clone();
        registry.register(
            "verify_flows",
            "Verify the flows configured on all elements",
            move |_| {
                let r = r.clone();
                async move { Ok(r.report_verification().await?.1) }
            },
        );

        let r = reporter;
        registry.register(
            "show_flows",
            "Show the current flows of all elements",
            move |_| {
                let r = r.clone();
                async move { r.report_current_state().await }
            },
        );

        registry.register(
            "provision_flows",
            "Install the forwarding flows on all elements again",
            move |_| {
                let handle = handle.clone();
                async move { Ok(handle.provision().await?.to_string()) }
            },
        );

        registry
    }

    /// Register a command, replacing any existing command with the same name.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, help: impl Into<String>, handler: F)
    where
        F: Fn(Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ChainError>> + Send + 'static,
    {
        let name = name.into();
        log::trace!("register command {name}");
        self.commands.insert(
            name,
            Command {
                help: help.into(),
                handler: Box::new(move |args| Box::pin(handler(args))),
            },
        );
    }

    /// Iterate over all registered commands with their help text, sorted by name.
    pub fn commands(&self) -> impl Iterator<Item = (&str, &str)> {
        self.commands
            .iter()
            .map(|(name, cmd)| (name.as_str(), cmd.help.as_str()))
    }

    /// Check if a command is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// List of all commands with their help text, including `help` itself.
    pub fn help(&self) -> String {
        self.commands()
            .chain(std::iter::once(("help", "List the available commands")))
            .map(|(name, help)| format!("  {name:<16} {help}"))
            .join("\n")
    }

    /// Parse and execute a line of input. Returns `Ok(None)` for empty lines.
    pub async fn dispatch(&self, line: &str) -> Result<Option<String>, ShellError> {
        let mut words = line.split_whitespace().map(String::from);
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let args = words.collect::<Vec<_>>();
        if name == "help" && !self.contains("help") {
            return Ok(Some(self.help()));
        }
        let cmd = self
            .commands
            .get(&name)
            .ok_or_else(|| ShellError::UnknownCommand(name.clone()))?;
        log::debug!("execute command {name} {}", args.iter().join(" "));
        Ok(Some((cmd.handler)(args).await?))
    }
}

/// Error of a shell command.
#[derive(Debug, Error)]
pub enum ShellError {
    /// There exists no command with that name.
    #[error("Unknown command: {0}. Type `help` to list the available commands.")]
    UnknownCommand(String),
    /// The command failed.
    #[error("{0}")]
    Command(#[from] ChainError),
}
