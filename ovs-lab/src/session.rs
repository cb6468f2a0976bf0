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

//! Module for executing commands on the machine that hosts the emulated network. Commands are
//! either executed locally, or on a remote host through SSH.

use std::{
    ffi::OsStr,
    process::{Command as StdCommand, ExitStatus, Output},
    string::FromUtf8Error,
    time::Duration,
};

use itertools::Itertools;
use thiserror::Error;
use tokio::{process::Command, time::timeout};

/// A session with the machine running Open vSwitch.
///
/// A remote session is configured to automatically manage a control master using the following
/// arguments:
///
/// - `ControlMaster auto`
/// - `ControlPath /tmp/.ssh-%r@%h:%p`
/// - `ControlPersist 30m`
/// - `BatchMode yes`
///
/// **Warning** Make sure that the destination is properly configured in `~/.ssh/config`, such that
/// no password is required when logging in. The same holds for `sudo` if the session is created
/// with `sudo = true`: commands are executed with `sudo -n`, which fails instead of prompting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// SSH destination host. `None` executes all commands on the local machine.
    destination: Option<String>,
    /// Whether to prefix every command with `sudo -n`.
    sudo: bool,
}

impl Session {
    /// Create a session that executes all commands on the local machine.
    pub fn local(sudo: bool) -> Self {
        Self {
            destination: None,
            sudo,
        }
    }

    /// Create a new SSH Session with the destination. This function checks that the connection
    /// can be established within `connect_timeout`.
    pub async fn remote(
        destination: impl Into<String>,
        sudo: bool,
        connect_timeout: Duration,
    ) -> Result<Self, SessionError> {
        let destination = destination.into();

        log::trace!("[{}] connecting...", destination);

        let this = Self {
            destination: Some(destination),
            sudo: false,
        };

        match timeout(connect_timeout, this.execute_cmd(&["echo", "test"])).await {
            Ok(Ok((stdout, _))) => {
                let stdout = String::from_utf8_lossy(&stdout);
                if stdout.trim() == "test" {
                    log::trace!("[{}] connection established!", this.name());
                    Ok(Self { sudo, ..this })
                } else {
                    log::error!(
                        "[{}] Unexpected stdout! expected `test`, but got:\n{stdout}",
                        this.name()
                    );
                    Err(SessionError::Setup(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        format!("Expected `test`, but got {stdout}"),
                    )))
                }
            }
            Ok(Err(e)) => {
                log::error!(
                    "[{}] Error while connecting to the target: {e}",
                    this.name()
                );
                Err(e)
            }
            Err(_) => {
                log::error!("[{}] connection timeout!", this.name());
                Err(SessionError::Timeout)
            }
        }
    }

    /// Get the hostname for the session (`localhost` for local sessions).
    pub fn name(&self) -> &str {
        self.destination.as_deref().unwrap_or("localhost")
    }

    /// Whether commands are executed on a remote machine.
    pub fn is_remote(&self) -> bool {
        self.destination.is_some()
    }

    /// Create a command that executes `program` on the target machine, with `kill_on_drop` set
    /// such that the child is killed once the command (or its future) is dropped.
    pub fn command(&self, program: impl AsRef<OsStr>) -> Command {
        let mut cmd = Command::from(self.std_command(program));
        log::trace!("[tokio::process::Command] {:?}", cmd);
        cmd.kill_on_drop(true);
        cmd
    }

    /// Execute a command and return the bytes of both `STDOUT` and `STDERR`. This function call
    /// will check that the returned exit code is 0. The first element of `args` is the program.
    pub async fn execute_cmd(
        &self,
        args: &[impl AsRef<str> + Sync],
    ) -> Result<(Vec<u8>, Vec<u8>), SessionError> {
        let cmd_str = || args.iter().map(AsRef::as_ref).join(" ");

        log::trace!("[{}] `{}`", self.name(), cmd_str());
        let output = match self.build(args)?.output().await {
            Ok(out) => out,
            Err(e) => {
                log::error!("[{}] {} failed: {}", self.name(), cmd_str(), e);
                Err(e)?
            }
        };

        check_output(self.name(), output, cmd_str)
    }

    /// Execute a command. Then, check that the status is successful, and that STDERR is
    /// empty. Finally, return the parsed STDOUT.
    pub async fn execute_cmd_stdout(
        &self,
        args: &[impl AsRef<str> + Sync],
    ) -> Result<String, SessionError> {
        let (stdout, stderr) = self.execute_cmd(args).await?;

        if !stderr.is_empty() {
            log::trace!(
                "[{}] {} returned non-empty stderr:\nSTDERR:\n{}",
                self.name(),
                args.iter().map(AsRef::as_ref).join(" "),
                String::from_utf8_lossy(&stderr)
            );
            Err(SessionError::CommandError(
                self.name().to_string(),
                args.iter().map(AsRef::as_ref).join(" "),
                255,
            ))
        } else {
            Ok(String::from_utf8(stdout)?)
        }
    }

    /// Execute a command and return the status. This function will **not** check for the exit
    /// code, but simply return it.
    pub async fn execute_cmd_status(
        &self,
        args: &[impl AsRef<str> + Sync],
    ) -> Result<ExitStatus, SessionError> {
        log::trace!(
            "[{}] `{}`",
            self.name(),
            args.iter().map(AsRef::as_ref).join(" ")
        );
        match self.build(args)?.output().await {
            Ok(out) => Ok(out.status),
            Err(e) => {
                log::error!(
                    "[{}] {} failed: {}",
                    self.name(),
                    args.iter().map(AsRef::as_ref).join(" "),
                    e
                );
                Err(e)?
            }
        }
    }

    /// Build the command from a list of arguments, where the first one is the program.
    fn build(&self, args: &[impl AsRef<str>]) -> Result<Command, SessionError> {
        let (program, rest) = args.split_first().ok_or(SessionError::EmptyCommand)?;
        let mut cmd = self.command(program.as_ref());
        for arg in rest {
            cmd.arg(arg.as_ref());
        }
        Ok(cmd)
    }

    /// Create the raw command that executes `program`, either locally or using `ssh` with the
    /// following attributes set:
    /// - `oControlMaster=auto`
    /// - `oControlPath=/tmp/.ssh-%r@%h:%p`
    /// - `oControlPersist=30m`
    /// - `oBatchMode=yes`
    pub fn std_command(&self, program: impl AsRef<OsStr>) -> StdCommand {
        let mut cmd = match &self.destination {
            Some(destination) => {
                let mut cmd = StdCommand::new("ssh");
                cmd.arg("-oControlMaster=auto")
                    .arg("-oControlPath=/tmp/.ssh-%r@%h:%p")
                    .arg("-oControlPersist=30m")
                    .arg("-oBatchMode=yes")
                    .arg(destination);
                if self.sudo {
                    cmd.arg("sudo").arg("-n");
                }
                cmd.arg(program);
                return cmd;
            }
            None if self.sudo => {
                let mut cmd = StdCommand::new("sudo");
                cmd.arg("-n");
                cmd
            }
            None => return StdCommand::new(program),
        };
        cmd.arg(program);
        cmd
    }
}

/// Check the output for successful exit code
pub fn check_output<F, S>(
    host: &str,
    output: Output,
    cmd: F,
) -> Result<(Vec<u8>, Vec<u8>), SessionError>
where
    F: FnOnce() -> S,
    S: std::fmt::Display,
{
    if output.status.success() {
        Ok((output.stdout, output.stderr))
    } else {
        let cmd = cmd().to_string();
        log::error!(
            "[{}] {} exited with exit code {}{}{}",
            host,
            cmd,
            output.status.code().unwrap_or_default(),
            if !output.stdout.is_empty() {
                format!("\nSTDOUT:\n{}", String::from_utf8_lossy(&output.stdout))
            } else {
                String::new()
            },
            if !output.stderr.is_empty() {
                format!("\nSTDERR:\n{}", String::from_utf8_lossy(&output.stderr))
            } else {
                String::new()
            }
        );
        Err(SessionError::CommandError(
            host.to_string(),
            cmd,
            output.status.code().unwrap_or_default(),
        ))
    }
}

/// Error kind returned by [`Session`].
#[derive(Debug, Error)]
pub enum SessionError {
    /// Error while establishing the main connection
    #[error("Error while establishing the connection: {0}")]
    Setup(std::io::Error),
    /// Timeout while establishing the session
    #[error("Timeout while establishing the session.")]
    Timeout,
    /// Error while spawning or talking to the child process
    #[error("Client error: {0}")]
    Client(#[from] std::io::Error),
    /// Error while executing a command.
    #[error("Non-zero exit code of command {1} on {0}: {2}")]
    CommandError(String, String, i32),
    /// Cannot parse output as utf8
    #[error("Cannot parse output as UTF-8: {0}")]
    FromUtf8(#[from] FromUtf8Error),
    /// No program was given.
    #[error("Cannot execute an empty command")]
    EmptyCommand,
}

impl SessionError {
    /// Return the status code if the error was a [`SessionError::CommandError`]. Otherwise, return
    /// `None`.
    pub fn status(&self) -> Option<i32> {
        if let SessionError::CommandError(_, _, status) = self {
            Some(*status)
        } else {
            None
        }
    }
}
