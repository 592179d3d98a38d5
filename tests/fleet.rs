//! Fleet lifecycle tests against an in-memory engine

use podmo::{
    CommandRunner, ContainerStatus, Error, Orchestrator, OrchestratorConfig, ProvisioningConfig,
    Result, StateStore,
};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tempfile::TempDir;

/// Minimal stand-in for podman that keeps container state in memory
#[derive(Default)]
struct FakeEngine {
    calls: RefCell<Vec<Vec<String>>>,
    containers: RefCell<BTreeMap<String, String>>,
    next_id: Cell<u32>,
    dockerfiles: RefCell<Vec<String>>,
}

impl FakeEngine {
    fn verbs(&self, verb: &str) -> Vec<Vec<String>> {
        self.calls.borrow().iter().filter(|c| c[0] == verb).cloned().collect()
    }

    fn set_status(&self, id: &str, status: &str) {
        self.containers.borrow_mut().insert(id.to_string(), status.to_string());
    }

    fn forget(&self, id: &str) {
        self.containers.borrow_mut().remove(id);
    }
}

impl CommandRunner for FakeEngine {
    fn run(&self, args: &[String]) -> Result<String> {
        self.calls.borrow_mut().push(args.to_vec());
        match args[0].as_str() {
            "pull" => Ok(String::new()),
            "build" => {
                let dockerfile = PathBuf::from(&args[3]).join("Dockerfile");
                self.dockerfiles
                    .borrow_mut()
                    .push(std::fs::read_to_string(dockerfile).unwrap_or_default());
                Ok(String::new())
            }
            "run" => {
                let n = self.next_id.get() + 1;
                self.next_id.set(n);
                let id = format!("{:0>64}", n);
                self.set_status(&id, "running");
                Ok(id)
            }
            "stop" => match self.containers.borrow_mut().get_mut(&args[1]) {
                Some(status) => {
                    *status = "exited".to_string();
                    Ok(args[1].clone())
                }
                None => Err(Error::engine(args, "no such container")),
            },
            "inspect" => match self.containers.borrow().get(&args[1]) {
                Some(status) => Ok(format!(
                    r#"[{{"Id":"{}","State":{{"Status":"{}","StartedAt":"2024-05-01T10:00:00Z"}}}}]"#,
                    args[1], status
                )),
                None => Err(Error::engine(args, "no such object")),
            },
            "rm" => match self.containers.borrow_mut().remove(&args[1]) {
                Some(_) => Ok(args[1].clone()),
                None => Err(Error::engine(args, "no such container")),
            },
            other => Err(Error::engine(args, format!("unexpected verb {}", other))),
        }
    }
}

struct Env {
    temp: TempDir,
}

impl Env {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("ctx")).unwrap();
        Self { temp }
    }

    fn config(&self) -> OrchestratorConfig {
        OrchestratorConfig::new()
            .state_path(self.state_path())
            .context_dir(self.temp.path().join("ctx"))
            .ssh_config_path(self.temp.path().join("ssh_config"))
    }

    fn state_path(&self) -> PathBuf {
        self.temp.path().join("orchestrator-state.json")
    }

    /// A fresh orchestrator, as a new CLI invocation would create
    fn orchestrator<'a>(&self, engine: &'a FakeEngine) -> Orchestrator<&'a FakeEngine> {
        Orchestrator::with_config(self.config(), engine)
    }
}

#[test]
fn start_persists_one_record_per_container() {
    let env = Env::new();
    let engine = FakeEngine::default();

    for n in [1usize, 4] {
        let env = Env::new();
        let mut orch = env.orchestrator(&engine);
        let request = ProvisioningConfig::builder().count(n).port_start(4100).build();
        orch.start_containers(&request).unwrap();

        let persisted = StateStore::new(env.state_path()).load();
        assert_eq!(persisted.len(), n);
        for (i, record) in persisted.iter().enumerate() {
            assert_eq!(record.name, format!("orch-server-{}", i + 1));
            assert_eq!(record.port, 4100 + i as u16);
            assert_eq!(record.status, ContainerStatus::Running);
        }
    }

    // The first environment was never touched.
    assert!(!env.state_path().exists());
}

#[test]
fn state_survives_across_invocations() {
    let env = Env::new();
    let engine = FakeEngine::default();

    let started = env
        .orchestrator(&engine)
        .start_containers(&ProvisioningConfig::builder().count(2).build())
        .unwrap();

    let status = env.orchestrator(&engine).status();
    assert_eq!(status.total, 2);
    assert_eq!(status.containers[0].id, started[0].id);
    assert_eq!(status.count(ContainerStatus::Running), 2);

    let more = env
        .orchestrator(&engine)
        .start_containers(&ProvisioningConfig::builder().count(1).build())
        .unwrap();
    assert_eq!(more[0].name, "orch-server-3");
    assert_eq!(more[0].port, 2002);
}

#[test]
fn stop_then_status_reports_empty_fleet() {
    let env = Env::new();
    let engine = FakeEngine::default();
    env.orchestrator(&engine)
        .start_containers(&ProvisioningConfig::builder().count(3).build())
        .unwrap();

    let report = env.orchestrator(&engine).stop_all().unwrap();
    assert_eq!(report.stopped, 3);

    let status = env.orchestrator(&engine).status();
    assert_eq!(status.total, 0);
    assert!(status.containers.is_empty());
}

#[test]
fn cleanup_removes_exited_and_is_idempotent() {
    let env = Env::new();
    let engine = FakeEngine::default();
    let started = env
        .orchestrator(&engine)
        .start_containers(&ProvisioningConfig::builder().count(3).build())
        .unwrap();

    engine.set_status(&started[0].id, "exited");
    engine.forget(&started[1].id);

    let mut orch = env.orchestrator(&engine);
    let first = orch.cleanup().unwrap();
    assert_eq!(first.removed, 1);
    assert_eq!(first.dropped, 1);
    assert_eq!(first.kept, 1);

    let removed = engine.verbs("rm");
    assert_eq!(removed.len(), 1);
    assert_eq!(removed[0][1], started[0].id);

    let after_first = std::fs::read_to_string(env.state_path()).unwrap();
    let second = env.orchestrator(&engine).cleanup().unwrap();
    let after_second = std::fs::read_to_string(env.state_path()).unwrap();

    assert!(second.is_noop());
    assert_eq!(after_first, after_second);
    assert_eq!(engine.verbs("rm").len(), 1);
}

#[test]
fn cleanup_drops_uninspectable_record_without_remove() {
    let env = Env::new();
    let engine = FakeEngine::default();
    let started = env
        .orchestrator(&engine)
        .start_containers(&ProvisioningConfig::builder().count(1).build())
        .unwrap();
    engine.forget(&started[0].id);

    let report = env.orchestrator(&engine).cleanup().unwrap();

    assert_eq!(report.dropped, 1);
    assert!(engine.verbs("rm").is_empty());
    assert!(StateStore::new(env.state_path()).load().is_empty());
}

#[test]
fn malformed_state_file_is_recovered() {
    let env = Env::new();
    std::fs::write(env.state_path(), "this is not json").unwrap();
    let engine = FakeEngine::default();

    assert_eq!(env.orchestrator(&engine).status().total, 0);

    env.orchestrator(&engine).cleanup().unwrap();
    let data = std::fs::read_to_string(env.state_path()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&data).unwrap();
    assert_eq!(parsed, serde_json::json!([]));
}

#[test]
fn init_script_replaces_startup_command() {
    let env = Env::new();
    let init = env.temp.path().join("boot.sh");
    std::fs::write(&init, "#!/bin/sh\necho booting\n").unwrap();
    let engine = FakeEngine::default();

    let request = ProvisioningConfig::builder().count(1).init_script(&init).build();
    env.orchestrator(&engine).start_containers(&request).unwrap();

    let dockerfiles = engine.dockerfiles.borrow();
    let dockerfile = dockerfiles.last().unwrap();
    let cmd = dockerfile.lines().filter(|l| l.starts_with("CMD ")).collect::<Vec<_>>();
    assert_eq!(cmd, vec![r#"CMD ["/usr/local/bin/startup.sh"]"#]);

    let leftovers = std::fs::read_dir(env.temp.path().join("ctx")).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[test]
fn volumes_and_quotas_reach_the_engine() {
    let env = Env::new();
    let engine = FakeEngine::default();
    let request = ProvisioningConfig::builder()
        .count(1)
        .cpus("0.5")
        .memory("256m")
        .volume("/srv/shared:/shared".parse().unwrap())
        .build();

    env.orchestrator(&engine).start_containers(&request).unwrap();

    let run = &engine.verbs("run")[0];
    for expected in ["--cpus=0.5", "--memory=256m", "--cap-add=NET_ADMIN", "--cap-add=NET_RAW", "/srv/shared:/shared"] {
        assert!(run.contains(&expected.to_string()), "missing {expected} in {run:?}");
    }
}

#[test]
fn ssh_config_tracks_fleet() {
    let env = Env::new();
    let engine = FakeEngine::default();
    env.orchestrator(&engine)
        .start_containers(&ProvisioningConfig::builder().count(2).port_start(2200).build())
        .unwrap();

    let ssh = std::fs::read_to_string(env.temp.path().join("ssh_config")).unwrap();
    assert!(ssh.contains("Host orch-orch-server-1"));
    assert!(ssh.contains("Port 2200"));
    assert!(ssh.contains("Port 2201"));
    assert!(ssh.contains("User root"));
}
