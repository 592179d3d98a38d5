//! podmo CLI - podman fleet orchestrator

use clap::{Parser, Subcommand};
use podmo::config::{split_list, DEFAULT_IMAGE};
use podmo::{Orchestrator, OrchestratorConfig, ProvisioningConfig, Result, VolumeMount};
use std::path::PathBuf;
use std::process::ExitCode;
use tabled::{Table, Tabled};

#[derive(Parser)]
#[command(name = "podmo")]
#[command(about = "CLI tool to orchestrate podman containers for server farm simulation")]
#[command(version)]
struct Cli {
    /// Fleet state file
    #[arg(long, global = true, env = "PODMO_STATE_FILE", default_value = podmo::state::DEFAULT_STATE_FILE)]
    state_file: PathBuf,

    /// Container engine binary
    #[arg(long, global = true, env = "PODMO_ENGINE", default_value = "podman")]
    engine: String,

    /// Directory used as the image build context
    #[arg(long, global = true, env = "PODMO_CONTEXT_DIR", default_value = ".")]
    context_dir: PathBuf,

    /// Generated SSH config path (default: ~/.ssh/config.orchestrator)
    #[arg(long, global = true, env = "PODMO_SSH_CONFIG")]
    ssh_config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start containers
    Start {
        /// Number of containers to start
        #[arg(short, long, default_value = "3")]
        count: usize,
        /// Base image to use
        #[arg(short, long, default_value = DEFAULT_IMAGE)]
        image: String,
        /// Additional packages to install (comma-separated)
        #[arg(short, long, default_value = "vim,curl,wget")]
        packages: String,
        /// Starting port number
        #[arg(long, default_value = "2000")]
        port_start: u16,
        /// CPU allocation per container
        #[arg(long, default_value = "1.0")]
        cpus: String,
        /// Memory allocation per container
        #[arg(long, default_value = "512m")]
        memory: String,
        /// Local scripts to copy into containers (comma-separated paths)
        #[arg(long, default_value = "")]
        scripts: String,
        /// Initialization script to run on container startup
        #[arg(long)]
        init_script: Option<PathBuf>,
        /// Custom Dockerfile instructions to add (inserted verbatim)
        #[arg(long)]
        dockerfile_instructions: Option<String>,
        /// Volumes to mount (format: /host/path:/container/path,...)
        #[arg(long, default_value = "")]
        volumes: String,
    },
    /// Stop all containers
    Stop,
    /// Check status of containers
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Clean up stopped containers
    Cleanup,
    /// Regenerate SSH configuration
    SshConfig,
}

#[derive(Tabled)]
struct ContainerRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Port")]
    port: u16,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Started")]
    started: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let directive = if cli.verbose { "podmo=debug" } else { "podmo=info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = OrchestratorConfig::new()
        .engine_program(cli.engine)
        .state_path(cli.state_file)
        .context_dir(cli.context_dir);
    if let Some(path) = cli.ssh_config {
        config = config.ssh_config_path(path);
    }

    let mut orch = Orchestrator::from_config(config);

    match cli.command {
        Commands::Start {
            count,
            image,
            packages,
            port_start,
            cpus,
            memory,
            scripts,
            init_script,
            dockerfile_instructions,
            volumes,
        } => {
            let mut builder = ProvisioningConfig::builder()
                .count(count)
                .image(image)
                .packages(split_list(&packages))
                .port_start(port_start)
                .cpus(cpus)
                .memory(memory);
            for script in split_list(&scripts) {
                builder = builder.script(script);
            }
            if let Some(init) = init_script.filter(|p| !p.as_os_str().is_empty()) {
                builder = builder.init_script(init);
            }
            if let Some(text) = dockerfile_instructions {
                builder = builder.dockerfile_instructions(text);
            }
            for spec in split_list(&volumes) {
                builder = builder.volume(spec.parse::<VolumeMount>()?);
            }
            cmd_start(&mut orch, &builder.build_validated()?)?;
        }
        Commands::Stop => {
            let report = orch.stop_all()?;
            if report.stopped + report.failed == 0 {
                println!("No containers to stop.");
            } else {
                println!("Stopped {} containers ({} failed).", report.stopped, report.failed);
            }
        }
        Commands::Status { json } => cmd_status(&orch, json)?,
        Commands::Cleanup => {
            let report = orch.cleanup()?;
            println!(
                "Removed {} stopped containers, dropped {} missing, {} still tracked.",
                report.removed, report.dropped, report.kept
            );
        }
        Commands::SshConfig => {
            if orch.containers().is_empty() {
                println!("No containers found. Start containers first.");
                return Ok(());
            }
            let path = orch.regenerate_ssh_config()?;
            println!("SSH configuration regenerated: {}", path.display());
            println!("Include it from ~/.ssh/config with:");
            println!("  {}", podmo::ssh::include_line(&path));
        }
    }

    Ok(())
}

fn cmd_start(orch: &mut Orchestrator, config: &ProvisioningConfig) -> Result<()> {
    println!("Starting {} containers from {}...", config.count, config.image);

    let started = orch.start_containers(config)?;

    for c in &started {
        println!("  {} -> localhost:{} ({})", c.name, c.port, c.short_id());
    }
    println!("\nStarted {} containers successfully!", started.len());

    let path = &orch.config().ssh_config_path;
    println!("SSH configuration written to: {}", path.display());
    println!("Include it from ~/.ssh/config with:");
    println!("  {}", podmo::ssh::include_line(path));
    Ok(())
}

fn cmd_status(orch: &Orchestrator, json: bool) -> Result<()> {
    let status = orch.status();

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Total containers: {}", status.total);
    if status.containers.is_empty() {
        return Ok(());
    }

    let rows: Vec<ContainerRow> = status
        .containers
        .iter()
        .map(|c| ContainerRow {
            name: c.name.clone(),
            id: c.id.chars().take(12).collect(),
            port: c.port,
            status: c.status.to_string(),
            created: c.created.to_rfc3339(),
            started: c.uptime.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();

    println!("{}", Table::new(rows));
    Ok(())
}
