//! Read-only health report for `deepracer-setup status`.

use std::path::Path;

use crate::config::{HostCommand, ProvisionConfig, ALL_GUARDED_PATHS};

/// Presence of one guarded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStatus {
    /// Host path, as checked (before root resolution).
    pub path: &'static str,
    /// Whether it exists beneath the root.
    pub present: bool,
}

/// Availability of one external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    /// Command line that provisioning would run.
    pub command: String,
    /// Whether the program could be found.
    pub available: bool,
}

/// Everything `status` found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// Guarded files, in check order.
    pub paths: Vec<PathStatus>,
    /// External tools, SSH first.
    pub tools: Vec<ToolStatus>,
}

impl StatusReport {
    /// True when a provisioning run would invoke nothing.
    pub fn is_provisioned(&self) -> bool {
        self.paths.iter().all(|p| p.present)
    }

    /// One line per path and tool, state first.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for p in &self.paths {
            let state = if p.present { "present" } else { "missing" };
            out.push_str(&format!("{:<8} {}\n", state, p.path));
        }
        for t in &self.tools {
            let state = if t.available { "found" } else { "absent" };
            out.push_str(&format!("{:<8} {}\n", state, t.command));
        }
        out
    }
}

/// Inspects the guarded files and tools without running anything.
pub fn status(config: &ProvisionConfig) -> StatusReport {
    let paths = ALL_GUARDED_PATHS
        .iter()
        .map(|&path| PathStatus {
            path,
            present: config.exists(path),
        })
        .collect();
    let tools = [
        HostCommand::reconfigure_openssh(),
        HostCommand::install_nginx_certs(),
    ]
    .iter()
    .map(|cmd| {
        let available = check_if_command_exists(&cmd.program);
        if !available {
            warn!("{} does not appear to be installed", cmd.program);
        }
        ToolStatus {
            command: cmd.to_string(),
            available,
        }
    })
    .collect();
    StatusReport { paths, tools }
}

/// Looks the program up without spawning it: absolute paths must be
/// executable files, bare names are searched on `PATH`.
pub fn check_if_command_exists(cmd: &str) -> bool {
    if Path::new(cmd).is_absolute() {
        return is_executable(Path::new(cmd));
    }
    which::which(cmd).is_ok()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
