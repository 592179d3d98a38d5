//! Custom image builds
//!
//! Extends the base image with an SSH server, user packages, staged
//! scripts and an optional init script. Inputs are staged into the build
//! context directory and removed again once the build finishes, whether it
//! succeeded or not.

use crate::config::ProvisioningConfig;
use crate::engine::{CommandRunner, Engine};
use crate::{Error, Result};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const DOCKERFILE_NAME: &str = "Dockerfile";
pub const INIT_SCRIPT_NAME: &str = "init_script.sh";
pub const ROOT_PASSWORD: &str = "orch123";

const SCRIPTS_DIR: &str = "/usr/local/scripts";
const INIT_PATH: &str = "/usr/local/bin/init.sh";
const STARTUP_PATH: &str = "/usr/local/bin/startup.sh";
const SSHD_CMD: &str = r#"["/usr/sbin/sshd", "-D"]"#;

/// An input file copied into the build context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    /// File name inside the build context
    pub staged_name: String,
    /// Source file name, used as the in-image file name
    pub base_name: String,
}

/// Everything staged for one build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedInputs {
    pub scripts: Vec<StagedFile>,
    pub init_script: Option<StagedFile>,
}

/// Removes the Dockerfile and staged inputs when dropped
struct BuildContext {
    dir: PathBuf,
    files: Vec<PathBuf>,
}

impl BuildContext {
    fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            files: Vec::new(),
        }
    }

    fn stage(&mut self, source: &Path, staged_name: String) -> Result<StagedFile> {
        let base_name = base_name(source)?;
        let dest = self.dir.join(&staged_name);
        std::fs::copy(source, &dest).map_err(|e| Error::Staging {
            path: source.to_path_buf(),
            source: e,
        })?;
        self.files.push(dest);
        tracing::info!(source = %source.display(), staged = %staged_name, "Staged build input");
        Ok(StagedFile { staged_name, base_name })
    }

    fn write_dockerfile(&mut self, contents: &str) -> Result<()> {
        let path = self.dir.join(DOCKERFILE_NAME);
        self.files.push(path.clone());
        std::fs::write(&path, contents)?;
        Ok(())
    }
}

impl Drop for BuildContext {
    fn drop(&mut self) {
        for file in &self.files {
            if let Err(e) = std::fs::remove_file(file) {
                tracing::debug!(file = %file.display(), error = %e, "Failed to remove build context file");
            }
        }
    }
}

fn base_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Staging {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        })
}

/// Builds the customized fleet image
pub struct ImageBuilder<'a, R> {
    engine: &'a Engine<R>,
    context_dir: PathBuf,
    tag_prefix: String,
}

impl<'a, R: CommandRunner> ImageBuilder<'a, R> {
    pub fn new(engine: &'a Engine<R>, context_dir: impl Into<PathBuf>, tag_prefix: impl Into<String>) -> Self {
        Self {
            engine,
            context_dir: context_dir.into(),
            tag_prefix: tag_prefix.into(),
        }
    }

    /// Stage inputs, pull the base image and build. Returns the new tag.
    pub fn build(&self, config: &ProvisioningConfig) -> Result<String> {
        let mut context = BuildContext::new(&self.context_dir);

        let mut staged = StagedInputs::default();
        for (i, script) in config.scripts.iter().enumerate() {
            let name = format!("script_{}_{}", i, base_name(script)?);
            staged.scripts.push(context.stage(script, name)?);
        }
        if let Some(init) = &config.init_script {
            staged.init_script = Some(context.stage(init, INIT_SCRIPT_NAME.to_string())?);
        }

        tracing::info!(image = %config.image, "Pulling base image");
        self.engine.pull(&config.image)?;

        context.write_dockerfile(&render_dockerfile(config, &staged))?;

        let tag = unique_tag(&self.tag_prefix);
        tracing::info!(tag = %tag, "Building custom image");
        self.engine.build(&tag, &self.context_dir)?;

        Ok(tag)
    }
}

/// Image tag unique per invocation
fn unique_tag(prefix: &str) -> String {
    format!("{}-{}", prefix, chrono::Utc::now().timestamp_millis())
}

/// Render the Dockerfile for a provisioning request
pub fn render_dockerfile(config: &ProvisioningConfig, staged: &StagedInputs) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "FROM {}", config.image);
    out.push('\n');
    out.push_str("RUN apt-get update && apt-get install -y sudo\n\n");

    out.push_str("# Install SSH server and additional packages\n");
    let packages = config.package_list();
    if packages.is_empty() {
        out.push_str("RUN apt-get update && apt-get install -y openssh-server && apt-get clean\n\n");
    } else {
        let _ = writeln!(
            out,
            "RUN apt-get update && apt-get install -y openssh-server {} && apt-get clean\n",
            packages
        );
    }

    out.push_str("# Create SSH directory\n");
    out.push_str("RUN mkdir -p /var/run/sshd /root/.ssh && chmod 700 /root/.ssh\n\n");
    out.push_str("# Configure SSH\n");
    out.push_str("RUN sed -i 's/#PermitRootLogin prohibit-password/PermitRootLogin yes/' /etc/ssh/sshd_config\n");
    out.push_str("RUN sed -i 's/#PasswordAuthentication yes/PasswordAuthentication yes/' /etc/ssh/sshd_config\n");
    let _ = writeln!(out, "RUN echo 'root:{}' | chpasswd\n", ROOT_PASSWORD);
    out.push_str("# Generate SSH host keys\n");
    out.push_str("RUN ssh-keygen -A\n");

    if !staged.scripts.is_empty() {
        out.push_str("\n# Copy custom scripts\n");
        let _ = writeln!(out, "RUN mkdir -p {}", SCRIPTS_DIR);
        for script in &staged.scripts {
            let _ = writeln!(out, "COPY ./{} {}/{}", script.staged_name, SCRIPTS_DIR, script.base_name);
            let _ = writeln!(out, "RUN chmod +x {}/{}", SCRIPTS_DIR, script.base_name);
        }
    }

    let mut startup = SSHD_CMD.to_string();
    if let Some(init) = &staged.init_script {
        out.push_str("\n# Copy and setup initialization script\n");
        let _ = writeln!(out, "COPY ./{} {}", init.staged_name, INIT_PATH);
        let _ = writeln!(out, "RUN chmod +x {}", INIT_PATH);
        out.push_str("\n# Create startup wrapper\n");
        let _ = writeln!(out, "RUN echo '#!/bin/bash' > {} && \\", STARTUP_PATH);
        let _ = writeln!(out, "    echo '{}' >> {} && \\", INIT_PATH, STARTUP_PATH);
        let _ = writeln!(out, "    echo 'exec /usr/sbin/sshd -D' >> {} && \\", STARTUP_PATH);
        let _ = writeln!(out, "    chmod +x {}", STARTUP_PATH);
        startup = format!(r#"["{}"]"#, STARTUP_PATH);
    }

    if let Some(custom) = &config.dockerfile_instructions {
        out.push_str("\n# Custom Dockerfile instructions\n");
        out.push_str(custom);
        out.push('\n');
    }

    out.push_str("\n# Expose SSH port\n");
    out.push_str("EXPOSE 22\n\n");
    out.push_str("# Start SSH daemon\n");
    let _ = writeln!(out, "CMD {}", startup);
    out
}
