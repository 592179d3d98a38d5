//! Subprocess execution for engine commands

use crate::{Error, Result};
use std::process::Command;

/// Executes a single engine invocation.
///
/// `args` never includes the program name. Implementations return the
/// trimmed standard output on success and an [`Error::Engine`] when the
/// process exits non-zero.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    fn run(&self, args: &[String]) -> Result<String>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, args: &[String]) -> Result<String> {
        (**self).run(args)
    }
}

/// Runs engine commands as child processes of the configured program
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new("podman")
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, args: &[String]) -> Result<String> {
        tracing::debug!(program = %self.program, args = ?args, "Running engine command");

        // Arguments are passed as a vector, never through a shell.
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|source| Error::EngineSpawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let mut command = vec![self.program.clone()];
            command.extend(args.iter().cloned());
            return Err(Error::engine(
                &command,
                format!(
                    "Exit code: {:?}\nStderr: {}\nStdout: {}",
                    output.status.code(),
                    stderr.trim(),
                    stdout.trim()
                ),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
