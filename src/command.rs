//! Running external provisioning tools.
//!
//! Steps talk to the host through [CommandRunner], so that the
//! decision of *whether* to run a tool stays testable without
//! actually touching the host.

use std::process::{Command, Stdio};

use crate::config::HostCommand;
use crate::error::ProvisionError;

/// Result of a command that was launched and ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit code, or `None` if the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output. Never forwarded to our own stdout.
    pub stdout: Vec<u8>,
}

impl CommandOutcome {
    /// True only for a zero exit code.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Human-readable exit status, for logs and errors.
    pub fn status_display(&self) -> String {
        match self.code {
            Some(code) => code.to_string(),
            None => "signal".to_string(),
        }
    }
}

/// Executes a [HostCommand] synchronously.
pub trait CommandRunner {
    /// Blocks until the command finishes. A non-zero exit is still `Ok`;
    /// only failure to launch is an error.
    fn run(&self, cmd: &HostCommand) -> Result<CommandOutcome, ProvisionError>;

    /// Whether this runner actually touches the host.
    fn is_live(&self) -> bool {
        true
    }
}

/// Spawns real subprocesses. Stdout is captured, stdin and stderr are inherited.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &HostCommand) -> Result<CommandOutcome, ProvisionError> {
        let output = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| ProvisionError::Spawn {
                program: cmd.program.clone(),
                source,
            })?;
        if !output.stdout.is_empty() {
            debug!(
                "{} wrote: {}",
                cmd.program,
                String::from_utf8_lossy(&output.stdout).trim_end()
            );
        }
        Ok(CommandOutcome {
            code: output.status.code(),
            stdout: output.stdout,
        })
    }
}

/// Logs the command it would have run, and runs nothing.
#[derive(Debug, Default)]
pub struct DryRunRunner;

impl CommandRunner for DryRunRunner {
    fn run(&self, cmd: &HostCommand) -> Result<CommandOutcome, ProvisionError> {
        info!("[dry-run] would run: {}", cmd);
        Ok(CommandOutcome {
            code: Some(0),
            stdout: Vec::new(),
        })
    }

    fn is_live(&self) -> bool {
        false
    }
}
