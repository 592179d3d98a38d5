//! Typed podman operations on top of a [`CommandRunner`]

use super::runner::CommandRunner;
use crate::config::VolumeMount;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Capabilities granted to every fleet container
pub const ELEVATED_CAPABILITIES: [&str; 2] = ["NET_ADMIN", "NET_RAW"];

/// Port sshd listens on inside the container
pub const SSH_GUEST_PORT: u16 = 22;

/// Zero timestamp podman reports for containers that never started
const NEVER_STARTED: &str = "0001-01-01T00:00:00Z";

/// Live state from `inspect`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectState {
    #[serde(rename = "Status", default)]
    pub status: Option<String>,
    #[serde(rename = "StartedAt", default)]
    pub started_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InspectEntry {
    #[serde(rename = "State", default)]
    state: Option<InspectState>,
}

/// Arguments for launching one fleet container
#[derive(Debug, Clone)]
pub struct RunSpec {
    pub name: String,
    pub host_port: u16,
    pub cpus: String,
    pub memory: String,
    pub volumes: Vec<VolumeMount>,
    pub image: String,
}

impl RunSpec {
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            self.name.clone(),
            format!("--cpus={}", self.cpus),
            format!("--memory={}", self.memory),
            "-p".to_string(),
            format!("{}:{}", self.host_port, SSH_GUEST_PORT),
        ];
        for cap in ELEVATED_CAPABILITIES {
            args.push(format!("--cap-add={}", cap));
        }
        for volume in &self.volumes {
            args.push("-v".to_string());
            args.push(volume.to_arg());
        }
        args.push(self.image.clone());
        args
    }
}

/// Container engine operations
pub struct Engine<R> {
    runner: R,
}

impl<R: CommandRunner> Engine<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Pull an image from its registry
    pub fn pull(&self, image: &str) -> Result<()> {
        self.runner.run(&args(&["pull", image]))?;
        Ok(())
    }

    /// Build `context_dir/Dockerfile` into an image tagged `tag`
    pub fn build(&self, tag: &str, context_dir: &Path) -> Result<()> {
        let context = context_dir.to_string_lossy();
        self.runner.run(&args(&["build", "-t", tag, &context]))?;
        Ok(())
    }

    /// Start a detached container and return the engine-assigned id
    pub fn run(&self, spec: &RunSpec) -> Result<String> {
        let argv = spec.to_args();
        let output = self.runner.run(&argv)?;
        // Pull progress may precede the id on stdout; the id is the last line.
        let id = output.lines().last().unwrap_or("").trim();
        if id.is_empty() {
            return Err(Error::Parse(format!(
                "engine returned no container id for {}",
                spec.name
            )));
        }
        Ok(id.to_string())
    }

    pub fn stop(&self, id: &str) -> Result<()> {
        self.runner.run(&args(&["stop", id]))?;
        Ok(())
    }

    /// Query live status of a container
    pub fn inspect(&self, id: &str) -> Result<InspectState> {
        let output = self.runner.run(&args(&["inspect", id]))?;
        parse_inspect(id, &output)
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        self.runner.run(&args(&["rm", id]))?;
        Ok(())
    }
}

fn parse_inspect(id: &str, output: &str) -> Result<InspectState> {
    let entries: Vec<InspectEntry> = serde_json::from_str(output)
        .map_err(|e| Error::Parse(format!("inspect output for {}: {}", id, e)))?;
    let entry = entries
        .into_iter()
        .next()
        .ok_or_else(|| Error::Parse(format!("no inspect data for {}", id)))?;

    let mut state = entry.state.unwrap_or_default();
    if state.started_at.as_deref().is_some_and(|s| s.is_empty() || s.starts_with(NEVER_STARTED)) {
        state.started_at = None;
    }
    Ok(state)
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}
