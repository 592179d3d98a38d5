//! SSH client configuration for the fleet

use crate::models::ContainerRecord;
use crate::Result;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const SSH_CONFIG_FILE: &str = "config.orchestrator";
pub const DEFAULT_ALIAS_PREFIX: &str = "orch-";

/// Default location: `~/.ssh/config.orchestrator`
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ssh")
        .join(SSH_CONFIG_FILE)
}

/// Render one `Host` block per record
pub fn render(records: &[ContainerRecord], alias_prefix: &str) -> String {
    let mut out = String::new();
    out.push_str("# SSH Configuration for orchestrated containers\n");
    out.push_str("# Auto-generated by podmo\n\n");

    for record in records {
        let _ = writeln!(out, "# Container: {}", record.name);
        let _ = writeln!(out, "Host {}{}", alias_prefix, record.name);
        out.push_str("    HostName localhost\n");
        let _ = writeln!(out, "    Port {}", record.port);
        out.push_str("    User root\n");
        out.push_str("    PasswordAuthentication yes\n");
        out.push_str("    StrictHostKeyChecking no\n");
        out.push_str("    UserKnownHostsFile /dev/null\n");
        out.push_str("    LogLevel ERROR\n\n");
    }
    out
}

/// Overwrite `path` with the rendered config
pub fn write(path: &Path, records: &[ContainerRecord], alias_prefix: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, render(records, alias_prefix))?;
    tracing::info!(path = %path.display(), hosts = records.len(), "SSH configuration written");
    Ok(())
}

/// Line to add to `~/.ssh/config` so the generated file is picked up
pub fn include_line(path: &Path) -> String {
    format!("Include {}", path.display())
}
