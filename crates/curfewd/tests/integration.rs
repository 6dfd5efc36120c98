//! Integration tests for curfewd
//!
//! These tests run the startup checks and the supervisor end to end
//! against a fixture directory, the way the daemon wires them.

use chrono::{DateTime, Local, TimeZone};
use curfew_api::{EventPayload, ShutdownReason, SupervisorState};
use curfew_config::{
    EnvError, EnvSnapshot, Environment, Policy, load_config, load_env_file, scan_providers,
};
use curfew_consent::{ConsentDocument, ConsentGate, ConsentOutcome, ScriptedPrompt};
use curfew_core::{AvailabilityScheduler, Supervisor, SupervisorConfig};
use curfew_util::ManualClock;
use curfew_workload_process::ProcessWorkloadFactory;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const CONFIG: &str = r#"
config_version = 1

[service]
env_file = ".env"

[workload]
command = "sh"
args = ["-c", "echo \"$BOT_TOKEN\" > started.txt; exec sleep 30"]
stop_timeout_seconds = 2
"#;

fn monday(hour: u32, minute: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2025, 12, 29, hour, minute, 0)
        .single()
        .unwrap()
}

fn fixture(env: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), CONFIG).unwrap();
    std::fs::write(dir.path().join("EULA.md"), "# EULA\n").unwrap();
    std::fs::write(dir.path().join("PRIVACY.md"), "# Privacy\n").unwrap();
    std::fs::write(dir.path().join(".env"), env).unwrap();
    dir
}

fn load_policy(dir: &Path) -> Policy {
    load_config(dir.join("config.toml"))
        .unwrap()
        .resolve_paths(dir)
}

fn documents(policy: &Policy) -> Vec<ConsentDocument> {
    policy
        .consent
        .documents()
        .into_iter()
        .map(|doc| ConsentDocument::new(doc.kind, &doc.document, &doc.marker))
        .collect()
}

const COMPLETE_ENV: &str = "\
BOT_TOKEN=t0k3n
SILICONFLOW_BASE_URL=https://api.example.com/v1
SILICONFLOW_KEY=sk-test
";

#[tokio::test]
async fn test_startup_checks_pass_and_persist() {
    let dir = fixture(COMPLETE_ENV);
    let policy = load_policy(dir.path());

    let env_file = policy.service.env_file.clone().unwrap();
    let entries = load_env_file(&env_file).unwrap();

    let gate = ConsentGate::new(documents(&policy), ScriptedPrompt::new(["Confirmed"]));
    assert!(matches!(
        gate.check_and_maybe_block().await.unwrap(),
        ConsentOutcome::Accepted { .. }
    ));
    assert!(dir.path().join("eula.confirmed").exists());
    assert!(dir.path().join("privacy.confirmed").exists());

    // A restart with unchanged documents does not ask again
    let gate = ConsentGate::new(documents(&policy), ScriptedPrompt::default());
    assert_eq!(
        gate.check_and_maybe_block().await.unwrap(),
        ConsentOutcome::AlreadyAccepted
    );
    assert_eq!(gate.prompt().reads(), 0);

    let providers = scan_providers(&entries, &EnvSnapshot::default()).unwrap();
    assert_eq!(providers, vec!["SILICONFLOW"]);
}

#[test]
fn test_incomplete_provider_is_fatal() {
    let dir = fixture("DEEPSEEK_KEY=sk-test\nOPENAI_BASE_URL=https://a\nOPENAI_KEY=k\n");
    let policy = load_policy(dir.path());

    let entries = load_env_file(&policy.service.env_file.unwrap()).unwrap();
    match scan_providers(&entries, &EnvSnapshot::default()) {
        Err(EnvError::IncompleteProviders { names }) => assert_eq!(names, vec!["DEEPSEEK"]),
        other => panic!("expected incomplete providers, got {other:?}"),
    }
}

#[test]
fn test_missing_env_file_is_fatal() {
    let dir = fixture(COMPLETE_ENV);
    std::fs::remove_file(dir.path().join(".env")).unwrap();
    let policy = load_policy(dir.path());

    let err = load_env_file(&policy.service.env_file.unwrap()).unwrap_err();
    assert!(matches!(err, EnvError::FileMissing { .. }));
}

#[tokio::test]
async fn test_process_workload_follows_window() {
    let dir = fixture(COMPLETE_ENV);
    let policy = load_policy(dir.path());

    let entries = load_env_file(&policy.service.env_file.clone().unwrap()).unwrap();
    let environment = Environment::new(&EnvSnapshot::capture(), &entries);

    let clock = Arc::new(ManualClock::new(monday(12, 0)));
    let config = SupervisorConfig {
        poll_interval: Duration::from_millis(200),
        watchdog_initial_delay: Duration::from_millis(100),
        watchdog_interval: Duration::from_millis(100),
        shutdown_grace: Duration::from_secs(5),
    };
    let mut supervisor = Supervisor::new(
        config,
        AvailabilityScheduler::new(policy.schedule.clone()),
        clock.clone(),
        Arc::new(ProcessWorkloadFactory::new(policy.workload.clone(), environment)),
    );
    let mut events = supervisor.subscribe();

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let handle = tokio::spawn(async move {
        supervisor.run(token).await;
        supervisor
    });

    let wait = async {
        loop {
            let event = events.recv().await.unwrap();
            if matches!(
                event.payload,
                EventPayload::StateChanged {
                    to: SupervisorState::Online,
                    ..
                }
            ) {
                break;
            }
        }

        let marker = dir.path().join("started.txt");
        while !marker.exists() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        clock.set(monday(15, 0));

        loop {
            if let EventPayload::PeriodEnded { reason, report, .. } = events.recv().await.unwrap().payload {
                return (reason, report);
            }
        }
    };

    let (reason, report) = tokio::time::timeout(Duration::from_secs(20), wait)
        .await
        .expect("supervisor did not finish the period in time");

    assert_eq!(reason, ShutdownReason::WindowClosed);
    assert!(report.is_clean(), "{report:?}");
    let written = std::fs::read_to_string(dir.path().join("started.txt")).unwrap();
    assert_eq!(written.trim(), "t0k3n");

    shutdown.cancel();
    let supervisor = handle.await.unwrap();
    assert_eq!(supervisor.state(), SupervisorState::Offline);
}
