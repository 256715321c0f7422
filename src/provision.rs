//! Boot-time provisioning steps, i.e. [ProvisioningRunner].
//!
//! Each step checks whether its files exist and, if any are
//! missing, hands off to the distro tool that creates them.
//! Nothing here generates key material itself.

use crate::command::{CommandOutcome, CommandRunner};
use crate::config::{
    FailurePolicy, HostCommand, ProvisionConfig, NGINX_GUARDED_PATHS, SSH_HOST_DSA_KEY,
};
use crate::error::ProvisionError;

/// What a single step ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// All guarded files were already in place; no command ran.
    Present,
    /// The command ran and exited zero.
    Generated(CommandOutcome),
    /// The command failed or could not be launched, and the failure was ignored.
    Failed(String),
    /// Dry run: the command would have run.
    Skipped,
}

impl StepOutcome {
    /// True if a command was (or in a dry run, would have been) invoked.
    pub fn invoked(&self) -> bool {
        !matches!(self, StepOutcome::Present)
    }
}

/// Outcome of a complete run, one entry per step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Outcome of [ProvisioningRunner::ensure_host_ssh_keys].
    pub ssh_keys: StepOutcome,
    /// Outcome of [ProvisioningRunner::ensure_nginx_certs].
    pub nginx_certs: StepOutcome,
}

impl RunReport {
    /// Number of steps whose failure was swallowed.
    pub fn failures(&self) -> usize {
        [&self.ssh_keys, &self.nginx_certs]
            .iter()
            .filter(|s| matches!(s, StepOutcome::Failed(_)))
            .count()
    }
}

/// Drives the provisioning steps against a root filesystem.
pub struct ProvisioningRunner<'a> {
    config: &'a ProvisionConfig,
    runner: &'a dyn CommandRunner,
}

impl<'a> ProvisioningRunner<'a> {
    /// Borrows the run options and the runner that executes commands.
    pub fn new(
        config: &'a ProvisionConfig,
        runner: &'a dyn CommandRunner,
    ) -> ProvisioningRunner<'a> {
        ProvisioningRunner { config, runner }
    }

    /// Generates SSH host keys unless the DSA host key is already present.
    pub fn ensure_host_ssh_keys(&self) -> Result<StepOutcome, ProvisionError> {
        if self.config.exists(SSH_HOST_DSA_KEY) {
            debug!("SSH host keys present, skipping");
            return Ok(StepOutcome::Present);
        }
        info!("No SSH host key at {}, regenerating", SSH_HOST_DSA_KEY);
        self.invoke(HostCommand::reconfigure_openssh())
    }

    /// Installs the nginx certificate pair and console password if any of them is missing.
    /// The install script runs at most once, however many files are absent.
    pub fn ensure_nginx_certs(&self) -> Result<StepOutcome, ProvisionError> {
        let missing: Vec<&str> = NGINX_GUARDED_PATHS
            .iter()
            .copied()
            .filter(|p| !self.config.exists(p))
            .collect();
        if missing.is_empty() {
            debug!("nginx certificates present, skipping");
            return Ok(StepOutcome::Present);
        }
        info!("Missing {}, installing nginx certificates", missing.join(", "));
        self.invoke(HostCommand::install_nginx_certs())
    }

    /// Runs the SSH step, then the nginx step. Both steps are always attempted;
    /// under [FailurePolicy::Strict] the first failure is returned afterwards.
    pub fn run(&self) -> Result<RunReport, ProvisionError> {
        let ssh_keys = self.ensure_host_ssh_keys();
        let nginx_certs = self.ensure_nginx_certs();
        Ok(RunReport {
            ssh_keys: ssh_keys?,
            nginx_certs: nginx_certs?,
        })
    }

    fn invoke(&self, cmd: HostCommand) -> Result<StepOutcome, ProvisionError> {
        if !self.runner.is_live() {
            self.runner.run(&cmd)?;
            return Ok(StepOutcome::Skipped);
        }
        let failure = match self.runner.run(&cmd) {
            Ok(outcome) if outcome.success() => {
                debug!("'{}' finished", cmd);
                return Ok(StepOutcome::Generated(outcome));
            }
            Ok(outcome) => ProvisionError::CommandFailure {
                command: cmd.to_string(),
                code: outcome.status_display(),
            },
            Err(e) => e,
        };
        match self.config.policy {
            FailurePolicy::Ignore => {
                warn!("{}; continuing", failure);
                Ok(StepOutcome::Failed(failure.to_string()))
            }
            FailurePolicy::Strict => Err(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::DryRunRunner;
    use crate::config::{ALL_GUARDED_PATHS, CONSOLE_PASSWORD, NGINX_CERT, NGINX_KEY};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::Path;

    // Records every command and answers with a canned exit code,
    // optionally pretending a program is not installed.
    #[derive(Default)]
    struct RecordingRunner {
        calls: RefCell<Vec<String>>,
        exit_codes: HashMap<String, i32>,
        not_installed: Vec<String>,
    }

    impl RecordingRunner {
        fn failing(program: &str, code: i32) -> RecordingRunner {
            let mut r = RecordingRunner::default();
            r.exit_codes.insert(program.to_string(), code);
            r
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, cmd: &HostCommand) -> Result<CommandOutcome, ProvisionError> {
            self.calls.borrow_mut().push(cmd.to_string());
            if self.not_installed.contains(&cmd.program) {
                return Err(ProvisionError::Spawn {
                    program: cmd.program.clone(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            Ok(CommandOutcome {
                code: Some(*self.exit_codes.get(&cmd.program).unwrap_or(&0)),
                stdout: Vec::new(),
            })
        }
    }

    const SSH_CMD: &str = "dpkg-reconfigure openssh-server";
    const NGINX_CMD: &str = "/opt/aws/deepracer/nginx/nginx_install_certs.sh";

    fn touch(root: &Path, host_path: &str) {
        let path = root.join(host_path.trim_start_matches('/'));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    fn root_with(paths: &[&str]) -> (tempfile::TempDir, ProvisionConfig) {
        let dir = tempfile::tempdir().unwrap();
        for p in paths {
            touch(dir.path(), p);
        }
        let config = ProvisionConfig::with_root(dir.path()).unwrap();
        (dir, config)
    }

    #[test]
    fn empty_root_runs_both_in_order() {
        let (_dir, config) = root_with(&[]);
        let runner = RecordingRunner::default();
        let report = ProvisioningRunner::new(&config, &runner).run().unwrap();
        assert_eq!(runner.calls(), vec![SSH_CMD, NGINX_CMD]);
        assert!(matches!(report.ssh_keys, StepOutcome::Generated(_)));
        assert!(matches!(report.nginx_certs, StepOutcome::Generated(_)));
    }

    #[test]
    fn fully_provisioned_root_runs_nothing() {
        let (_dir, config) = root_with(&ALL_GUARDED_PATHS);
        let runner = RecordingRunner::default();
        let report = ProvisioningRunner::new(&config, &runner).run().unwrap();
        assert!(runner.calls().is_empty());
        assert_eq!(report.ssh_keys, StepOutcome::Present);
        assert_eq!(report.nginx_certs, StepOutcome::Present);
    }

    #[test]
    fn missing_private_key_only_runs_cert_install() {
        let (_dir, config) = root_with(&[SSH_HOST_DSA_KEY, CONSOLE_PASSWORD, NGINX_CERT]);
        let runner = RecordingRunner::default();
        ProvisioningRunner::new(&config, &runner).run().unwrap();
        assert_eq!(runner.calls(), vec![NGINX_CMD]);
    }

    #[test]
    fn missing_ssh_key_only_runs_reconfigure() {
        let (_dir, config) = root_with(&[CONSOLE_PASSWORD, NGINX_CERT, NGINX_KEY]);
        let runner = RecordingRunner::default();
        ProvisioningRunner::new(&config, &runner).run().unwrap();
        assert_eq!(runner.calls(), vec![SSH_CMD]);
    }

    #[test]
    fn cert_install_runs_once_per_missing_combination() {
        let combos: [&[&str]; 4] = [
            &[],
            &[CONSOLE_PASSWORD],
            &[NGINX_CERT, NGINX_KEY],
            &[CONSOLE_PASSWORD, NGINX_KEY],
        ];
        for present in combos.iter() {
            let (_dir, config) = root_with(present);
            let runner = RecordingRunner::default();
            let outcome = ProvisioningRunner::new(&config, &runner)
                .ensure_nginx_certs()
                .unwrap();
            assert!(outcome.invoked());
            assert_eq!(runner.calls(), vec![NGINX_CMD], "present: {:?}", present);
        }
    }

    #[test]
    fn failures_are_swallowed_by_default() {
        let (_dir, config) = root_with(&[]);
        let runner = RecordingRunner::failing("dpkg-reconfigure", 1);
        let report = ProvisioningRunner::new(&config, &runner).run().unwrap();
        assert_eq!(runner.calls(), vec![SSH_CMD, NGINX_CMD]);
        match &report.ssh_keys {
            StepOutcome::Failed(msg) => assert!(msg.contains("exit status 1")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert!(matches!(report.nginx_certs, StepOutcome::Generated(_)));
        assert_eq!(report.failures(), 1);
    }

    #[test]
    fn uninstalled_tool_does_not_stop_the_run() {
        let (_dir, config) = root_with(&[]);
        let runner = RecordingRunner {
            not_installed: vec!["dpkg-reconfigure".to_string(), NGINX_CMD.to_string()],
            ..RecordingRunner::default()
        };
        let report = ProvisioningRunner::new(&config, &runner).run().unwrap();
        assert_eq!(runner.calls().len(), 2);
        assert_eq!(report.failures(), 2);
    }

    #[test]
    fn strict_policy_reports_first_failure_after_both_steps() {
        let (_dir, mut config) = root_with(&[]);
        config.policy = FailurePolicy::Strict;
        let runner = RecordingRunner::failing("dpkg-reconfigure", 100);
        let result = ProvisioningRunner::new(&config, &runner).run();
        assert_eq!(runner.calls(), vec![SSH_CMD, NGINX_CMD]);
        match result {
            Err(ProvisionError::CommandFailure { command, code }) => {
                assert_eq!(command, SSH_CMD);
                assert_eq!(code, "100");
            }
            other => panic!("expected command failure, got {:?}", other),
        }
    }

    #[test]
    fn strict_policy_passes_when_commands_succeed() {
        let (_dir, mut config) = root_with(&[SSH_HOST_DSA_KEY]);
        config.policy = FailurePolicy::Strict;
        let runner = RecordingRunner::default();
        let report = ProvisioningRunner::new(&config, &runner).run().unwrap();
        assert_eq!(report.failures(), 0);
        assert_eq!(runner.calls(), vec![NGINX_CMD]);
    }

    #[test]
    fn dry_run_skips_missing_steps() {
        let (_dir, mut config) = root_with(&[SSH_HOST_DSA_KEY]);
        config.dry_run = true;
        let report = ProvisioningRunner::new(&config, &DryRunRunner).run().unwrap();
        assert_eq!(report.ssh_keys, StepOutcome::Present);
        assert_eq!(report.nginx_certs, StepOutcome::Skipped);
    }
}
