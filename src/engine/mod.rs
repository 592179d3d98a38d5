//! Container engine boundary
//!
//! Every interaction with podman goes through a [`CommandRunner`]. The
//! [`Engine`] wrapper turns the six operations podmo needs (pull, build,
//! run, stop, inspect, remove) into typed calls on top of it.

mod commands;
mod runner;

pub use commands::{Engine, InspectState, RunSpec, ELEVATED_CAPABILITIES, SSH_GUEST_PORT};
pub use runner::{CommandRunner, ProcessRunner};

#[cfg(test)]
pub use runner::MockCommandRunner;
