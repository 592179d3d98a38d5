//! Provisioning configuration with builder pattern

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Request describing one provisioning batch. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    pub count: usize,
    pub image: String,
    pub packages: Vec<String>,
    pub port_start: u16,
    pub cpus: String,
    pub memory: String,
    pub scripts: Vec<PathBuf>,
    pub init_script: Option<PathBuf>,
    /// Raw Dockerfile text appended verbatim before `EXPOSE`. Not validated.
    pub dockerfile_instructions: Option<String>,
    pub volumes: Vec<VolumeMount>,
}

/// A `hostPath:containerPath` bind mount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub host_path: String,
    pub container_path: String,
}

pub const DEFAULT_IMAGE: &str = "ubuntu:20.04";
pub const DEFAULT_PORT_START: u16 = 2000;

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            count: 3,
            image: DEFAULT_IMAGE.to_string(),
            packages: vec!["vim".into(), "curl".into(), "wget".into()],
            port_start: DEFAULT_PORT_START,
            cpus: "1.0".to_string(),
            memory: "512m".to_string(),
            scripts: Vec::new(),
            init_script: None,
            dockerfile_instructions: None,
            volumes: Vec::new(),
        }
    }
}

impl ProvisioningConfig {
    pub fn builder() -> ProvisioningConfigBuilder {
        ProvisioningConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.count < 1 {
            return Err(Error::Config("count must be at least 1".into()));
        }
        if self.port_start == 0 {
            return Err(Error::Config("port_start must be a positive port number".into()));
        }
        if self.image.trim().is_empty() {
            return Err(Error::Config("image cannot be empty".into()));
        }
        if self.cpus.trim().is_empty() || self.memory.trim().is_empty() {
            return Err(Error::Config("cpu and memory quotas cannot be empty".into()));
        }
        for package in &self.packages {
            validate_package_name(package)?;
        }
        for volume in &self.volumes {
            volume.validate()?;
        }
        Ok(())
    }

    /// Space-joined package list for the install instruction
    pub fn package_list(&self) -> String {
        self.packages.join(" ")
    }
}

/// Package names end up inside a `RUN apt-get install` line, so only
/// characters Debian allows in package names (plus `=` for version pins)
/// are accepted.
fn validate_package_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || ".+-:=~_".contains(c));
    if first_ok && rest_ok {
        Ok(())
    } else {
        Err(Error::Config(format!("invalid package name: {:?}", name)))
    }
}

impl VolumeMount {
    pub fn new(host_path: impl Into<String>, container_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for segment in [&self.host_path, &self.container_path] {
            if segment.is_empty() {
                return Err(Error::Config(format!("volume {} has an empty path", self)));
            }
            if segment.contains(':') || segment.contains(',') || segment.chars().any(char::is_control) {
                return Err(Error::Config(format!("volume path {:?} contains a reserved character", segment)));
            }
        }
        if !self.container_path.starts_with('/') {
            return Err(Error::Config(format!(
                "container path {:?} must be absolute",
                self.container_path
            )));
        }
        Ok(())
    }

    /// Argument value for the engine's `-v` flag
    pub fn to_arg(&self) -> String {
        self.to_string()
    }
}

impl std::fmt::Display for VolumeMount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host_path, self.container_path)
    }
}

impl FromStr for VolumeMount {
    type Err = Error;

    fn from_str(spec: &str) -> Result<Self> {
        let parts: Vec<&str> = spec.trim().split(':').collect();
        let [host, container] = parts.as_slice() else {
            return Err(Error::Config(format!(
                "volume {:?} must have the form hostPath:containerPath",
                spec
            )));
        };
        let mount = VolumeMount::new(host.trim(), container.trim());
        mount.validate()?;
        Ok(mount)
    }
}

/// Split a comma-separated CLI list, dropping empty entries
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Default)]
pub struct ProvisioningConfigBuilder {
    config: ProvisioningConfig,
}

impl ProvisioningConfigBuilder {
    pub fn count(mut self, count: usize) -> Self {
        self.config.count = count;
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.config.image = image.into();
        self
    }

    pub fn packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.packages = packages.into_iter().map(Into::into).collect();
        self
    }

    pub fn port_start(mut self, port: u16) -> Self {
        self.config.port_start = port;
        self
    }

    pub fn cpus(mut self, cpus: impl Into<String>) -> Self {
        self.config.cpus = cpus.into();
        self
    }

    pub fn memory(mut self, memory: impl Into<String>) -> Self {
        self.config.memory = memory.into();
        self
    }

    pub fn script(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.scripts.push(path.into());
        self
    }

    pub fn init_script(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.init_script = Some(path.into());
        self
    }

    pub fn dockerfile_instructions(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.config.dockerfile_instructions = if text.trim().is_empty() { None } else { Some(text) };
        self
    }

    pub fn volume(mut self, mount: VolumeMount) -> Self {
        self.config.volumes.push(mount);
        self
    }

    pub fn build(self) -> ProvisioningConfig {
        self.config
    }

    pub fn build_validated(self) -> Result<ProvisioningConfig> {
        let config = self.build();
        config.validate()?;
        Ok(config)
    }
}
