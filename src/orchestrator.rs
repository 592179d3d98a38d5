//! Fleet orchestration: provisioning, status, stop and cleanup

use std::collections::HashSet;
use std::path::PathBuf;

use crate::builder::ImageBuilder;
use crate::config::ProvisioningConfig;
use crate::engine::{CommandRunner, Engine, ProcessRunner, RunSpec};
use crate::models::{
    container_name, CleanupReport, ContainerRecord, ContainerStatus, ContainerView, FleetStatus,
    StopReport,
};
use crate::state::{StateStore, DEFAULT_STATE_FILE};
use crate::{ssh, Error, Result};

/// Manages the tracked fleet of containers.
///
/// The state file is loaded once on construction and rewritten after every
/// structural change. All engine calls run sequentially and without a
/// timeout, so a hung engine call blocks the whole operation.
pub struct Orchestrator<R = ProcessRunner> {
    engine: Engine<R>,
    store: StateStore,
    containers: Vec<ContainerRecord>,
    config: OrchestratorConfig,
}

impl Orchestrator<ProcessRunner> {
    /// Create an orchestrator driving `podman` with default settings
    pub fn new() -> Self {
        let config = OrchestratorConfig::default();
        let runner = ProcessRunner::new(config.engine_program.clone());
        Self::with_config(config, runner)
    }

    /// Create an orchestrator driving the configured engine program
    pub fn from_config(config: OrchestratorConfig) -> Self {
        let runner = ProcessRunner::new(config.engine_program.clone());
        Self::with_config(config, runner)
    }
}

impl Default for Orchestrator<ProcessRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> Orchestrator<R> {
    /// Create an orchestrator on top of an arbitrary command runner
    pub fn with_config(config: OrchestratorConfig, runner: R) -> Self {
        let store = StateStore::new(&config.state_path);
        let containers = store.load();
        tracing::debug!(path = %store.path().display(), tracked = containers.len(), "Loaded fleet state");

        Self {
            engine: Engine::new(runner),
            store,
            containers,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn engine(&self) -> &Engine<R> {
        &self.engine
    }

    /// Tracked records, as last persisted
    pub fn containers(&self) -> &[ContainerRecord] {
        &self.containers
    }

    /// Build the custom image and launch `config.count` containers.
    ///
    /// Nothing is launched or persisted if validation, staging, pull or
    /// build fails. If launching container `k` fails, containers launched
    /// before it stay running and are persisted, then the error is
    /// returned. There is no rollback or retry.
    pub fn start_containers(&mut self, config: &ProvisioningConfig) -> Result<Vec<ContainerRecord>> {
        config.validate()?;
        let slots = self.allocate(config.count, config.port_start)?;

        tracing::info!(count = config.count, image = %config.image, "Starting containers");

        let builder = ImageBuilder::new(&self.engine, &self.config.context_dir, &self.config.image_prefix);
        let image = builder.build(config)?;

        let mut started = Vec::with_capacity(slots.len());
        for (name, port) in slots {
            tracing::info!(container = %name, port, "Starting container");

            let spec = RunSpec {
                name: name.clone(),
                host_port: port,
                cpus: config.cpus.clone(),
                memory: config.memory.clone(),
                volumes: config.volumes.clone(),
                image: image.clone(),
            };

            match self.engine.run(&spec) {
                Ok(id) => {
                    tracing::info!(container = %name, id = %id, "Container started");
                    started.push(ContainerRecord::new(id, name, port));
                }
                Err(e) => {
                    tracing::error!(
                        container = %name,
                        launched = started.len(),
                        error = %e,
                        "Container launch failed, earlier containers are left running"
                    );
                    self.containers.extend(started);
                    if let Err(save_err) = self.store.save(&self.containers) {
                        tracing::warn!(error = %save_err, "Failed to persist partially started fleet");
                    }
                    return Err(e);
                }
            }
        }

        self.containers.extend(started.iter().cloned());
        self.store.save(&self.containers)?;
        self.regenerate_ssh_config()?;

        tracing::info!(count = started.len(), "Containers started");
        Ok(started)
    }

    /// Pick names and host ports for a new batch.
    ///
    /// Ordinals continue after the highest tracked ordinal. Ports start at
    /// `port_start` and skip any port a tracked record already holds.
    fn allocate(&self, count: usize, port_start: u16) -> Result<Vec<(String, u16)>> {
        let prefix = &self.config.name_prefix;
        let mut ordinal = self
            .containers
            .iter()
            .filter_map(|c| c.ordinal(prefix))
            .max()
            .unwrap_or(0);
        let used: HashSet<u16> = self.containers.iter().map(|c| c.port).collect();

        let mut slots = Vec::with_capacity(count);
        let mut port = u32::from(port_start);
        for _ in 0..count {
            while port <= u32::from(u16::MAX) && used.contains(&(port as u16)) {
                tracing::warn!(port, "Port already held by a tracked container, skipping");
                port += 1;
            }
            if port > u32::from(u16::MAX) {
                return Err(Error::Config(format!(
                    "not enough free ports from {} for {} containers",
                    port_start, count
                )));
            }
            ordinal += 1;
            slots.push((container_name(prefix, ordinal), port as u16));
            port += 1;
        }
        Ok(slots)
    }

    /// Stop every tracked container and forget all of them.
    ///
    /// Individual stop failures are logged and counted; the tracked set is
    /// cleared regardless.
    pub fn stop_all(&mut self) -> Result<StopReport> {
        let mut report = StopReport::default();
        if self.containers.is_empty() {
            tracing::info!("No containers to stop");
            return Ok(report);
        }

        tracing::info!(count = self.containers.len(), "Stopping containers");
        for container in &self.containers {
            tracing::info!(container = %container.name, "Stopping container");
            match self.engine.stop(&container.id) {
                Ok(()) => report.stopped += 1,
                Err(e) => {
                    tracing::warn!(container = %container.name, error = %e, "Failed to stop container");
                    report.failed += 1;
                }
            }
        }

        self.containers.clear();
        self.store.save(&self.containers)?;
        Ok(report)
    }

    /// Merge live engine state into the tracked records.
    ///
    /// Never fails for an individual container and never writes state.
    pub fn status(&self) -> FleetStatus {
        let containers = self
            .containers
            .iter()
            .map(|record| match self.engine.inspect(&record.id) {
                Ok(state) => {
                    let status = ContainerStatus::from_engine(state.status.as_deref());
                    ContainerView::live(record, status, state.started_at)
                }
                Err(e) => {
                    tracing::debug!(container = %record.name, error = %e, "Inspect failed");
                    ContainerView::not_found(record)
                }
            })
            .collect();

        FleetStatus {
            total: self.containers.len(),
            containers,
        }
    }

    pub fn list_containers(&self) -> Vec<ContainerView> {
        self.status().containers
    }

    /// Remove terminated containers and drop records the engine no longer
    /// knows about, then persist once.
    pub fn cleanup(&mut self) -> Result<CleanupReport> {
        tracing::info!("Cleaning up stopped containers");

        let mut report = CleanupReport::default();
        let mut kept = Vec::with_capacity(self.containers.len());

        for record in std::mem::take(&mut self.containers) {
            let state = match self.engine.inspect(&record.id) {
                Ok(state) => state,
                Err(e) => {
                    tracing::info!(container = %record.name, error = %e, "Container gone, dropping from tracking");
                    report.dropped += 1;
                    continue;
                }
            };

            if !ContainerStatus::from_engine(state.status.as_deref()).is_terminated() {
                kept.push(record);
                continue;
            }

            tracing::info!(container = %record.name, "Removing stopped container");
            match self.engine.remove(&record.id) {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    tracing::warn!(container = %record.name, error = %e, "Failed to remove container");
                    kept.push(record);
                }
            }
        }

        report.kept = kept.len();
        self.containers = kept;
        self.store.save(&self.containers)?;
        Ok(report)
    }

    /// Rewrite the SSH client config from the tracked records
    pub fn regenerate_ssh_config(&self) -> Result<PathBuf> {
        let path = self.config.ssh_config_path.clone();
        ssh::write(&path, &self.containers, &self.config.ssh_alias_prefix)?;
        Ok(path)
    }
}

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Engine binary to invoke
    pub engine_program: String,
    /// Fleet state file
    pub state_path: PathBuf,
    /// Directory used as the image build context
    pub context_dir: PathBuf,
    /// Generated SSH client config
    pub ssh_config_path: PathBuf,
    /// Container names are `<name_prefix>-<ordinal>`
    pub name_prefix: String,
    /// Image tags are `<image_prefix>-<millis>`
    pub image_prefix: String,
    /// SSH aliases are `<ssh_alias_prefix><container name>`
    pub ssh_alias_prefix: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            engine_program: "podman".to_string(),
            state_path: PathBuf::from(DEFAULT_STATE_FILE),
            context_dir: PathBuf::from("."),
            ssh_config_path: ssh::default_config_path(),
            name_prefix: "orch-server".to_string(),
            image_prefix: "orchestrator".to_string(),
            ssh_alias_prefix: ssh::DEFAULT_ALIAS_PREFIX.to_string(),
        }
    }
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine_program(mut self, program: impl Into<String>) -> Self {
        self.engine_program = program.into();
        self
    }

    pub fn state_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_path = path.into();
        self
    }

    pub fn context_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.context_dir = path.into();
        self
    }

    pub fn ssh_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ssh_config_path = path.into();
        self
    }

    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn image_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.image_prefix = prefix.into();
        self
    }

    pub fn ssh_alias_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.ssh_alias_prefix = prefix.into();
        self
    }
}
