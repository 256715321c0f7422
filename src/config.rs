//! Fixed host locations and run options for provisioning.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::ProvisionError;

/// DSA host key written by the openssh-server package scripts.
pub const SSH_HOST_DSA_KEY: &str = "/etc/ssh/ssh_host_dsa_key";
/// Console password consumed by the web management interface.
pub const CONSOLE_PASSWORD: &str = "/opt/aws/deepracer/password.txt";
/// Self-signed certificate served by nginx.
pub const NGINX_CERT: &str = "/etc/ssl/certs/nginx-selfsigned.crt";
/// Private key matching [NGINX_CERT].
pub const NGINX_KEY: &str = "/etc/ssl/private/nginx-selfsigned.key";

/// Files that must all exist for the nginx step to be skipped.
pub const NGINX_GUARDED_PATHS: [&str; 3] = [CONSOLE_PASSWORD, NGINX_CERT, NGINX_KEY];

/// Every file checked during a run, in check order.
pub const ALL_GUARDED_PATHS: [&str; 4] =
    [SSH_HOST_DSA_KEY, CONSOLE_PASSWORD, NGINX_CERT, NGINX_KEY];

const NGINX_INSTALL_CERTS: &str = "/opt/aws/deepracer/nginx/nginx_install_certs.sh";

/// An external program plus arguments, run without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    /// Program name, looked up on `PATH` unless absolute.
    pub program: String,
    /// Passed verbatim, no shell expansion.
    pub args: Vec<String>,
}

impl HostCommand {
    /// Builds a command from borrowed parts.
    pub fn new(program: &str, args: &[&str]) -> HostCommand {
        HostCommand {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Regenerates the host keys via the package's postinst logic.
    pub fn reconfigure_openssh() -> HostCommand {
        HostCommand::new("dpkg-reconfigure", &["openssh-server"])
    }

    /// Writes the console password and nginx certificate pair.
    pub fn install_nginx_certs() -> HostCommand {
        HostCommand::new(NGINX_INSTALL_CERTS, &[])
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// What to do when an external command exits non-zero or cannot be launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log and carry on; the run always succeeds.
    Ignore,
    /// Surface the failure to the caller once all steps have been attempted.
    Strict,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::Ignore
    }
}

/// Options for a single provisioning run.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
    /// Guarded paths are looked up beneath this directory.
    pub root: PathBuf,
    /// How command failures are treated.
    pub policy: FailurePolicy,
    /// Log commands instead of running them.
    pub dry_run: bool,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        ProvisionConfig {
            root: PathBuf::from("/"),
            policy: FailurePolicy::default(),
            dry_run: false,
        }
    }
}

impl ProvisionConfig {
    /// Builds a config for an alternate root, which must be an existing directory.
    pub fn with_root(root: &Path) -> Result<ProvisionConfig, ProvisionError> {
        if !root.is_dir() {
            return Err(ProvisionError::InvalidRoot {
                path: root.display().to_string(),
            });
        }
        Ok(ProvisionConfig {
            root: root.to_path_buf(),
            ..ProvisionConfig::default()
        })
    }

    /// Maps an absolute host path onto the configured root.
    pub fn resolve(&self, host_path: &str) -> PathBuf {
        self.root.join(host_path.trim_start_matches('/'))
    }

    /// Returns true if the host path exists beneath the root.
    pub fn exists(&self, host_path: &str) -> bool {
        self.resolve(host_path).exists()
    }
}
