//! podmo - podman fleet orchestrator
//!
//! Provisions a fleet of SSH-reachable containers from one base image,
//! customized per run with packages, scripts and raw Dockerfile
//! instructions, and tracks them across invocations in a JSON state file.
//!
//! # Example
//!
//! ```no_run
//! use podmo::{Orchestrator, ProvisioningConfig};
//!
//! let mut orchestrator = Orchestrator::new();
//!
//! let config = ProvisioningConfig::builder()
//!     .count(2)
//!     .image("ubuntu:20.04")
//!     .packages(["curl"])
//!     .port_start(2000)
//!     .build();
//!
//! let started = orchestrator.start_containers(&config)?;
//! println!("started {} containers", started.len());
//!
//! let status = orchestrator.status();
//! println!("tracking {} containers", status.total);
//!
//! orchestrator.cleanup()?;
//! # Ok::<(), podmo::Error>(())
//! ```

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod ssh;
pub mod state;

pub use config::{ProvisioningConfig, VolumeMount};
pub use engine::{CommandRunner, Engine, ProcessRunner};
pub use error::{Error, Result};
pub use models::{CleanupReport, ContainerRecord, ContainerStatus, ContainerView, FleetStatus, StopReport};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use state::StateStore;
