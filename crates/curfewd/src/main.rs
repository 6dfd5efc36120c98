//! curfewd - The curfew supervisor service
//!
//! This is the main entry point for the curfewd service.
//! It runs the startup checks in order, then hands over to the supervisor:
//! - Configuration loading
//! - Environment file loading
//! - Consent gate (may block on operator confirmation)
//! - Provider credential check
//! - Supervisor loop with the process workload

use anyhow::{Context, Result};
use clap::Parser;
use curfew_api::{Event, EventPayload};
use curfew_config::{
    EnvSnapshot, Environment, Policy, load_config, load_env_file, scan_providers,
};
use curfew_consent::{ConsentDocument, ConsentGate, ConsentOutcome, ConsolePrompt};
use curfew_core::{AvailabilityScheduler, Supervisor, SupervisorConfig};
use curfew_util::{SystemClock, default_config_path, is_mock_time_active};
use curfew_workload_process::ProcessWorkloadFactory;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// curfewd - Runs a service only inside its allowed time windows
#[derive(Parser, Debug)]
#[command(name = "curfewd")]
#[command(about = "Runs a service only inside its allowed time windows", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/curfew/config.toml)
    #[arg(short, long, env = "CURFEW_CONFIG", default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Environment file override (or set CURFEW_ENV_FILE env var)
    #[arg(short, long, env = "CURFEW_ENV_FILE")]
    env_file: Option<PathBuf>,

    /// Directory that relative document, marker and env paths resolve
    /// against (default: the config file's directory)
    #[arg(short, long, env = "CURFEW_WORKDIR")]
    workdir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    supervisor: Supervisor,
}

impl Service {
    /// Run every startup check. Any error here is fatal.
    async fn new(args: &Args) -> Result<Self> {
        // Taken before anything else so the env file can't leak into it
        let snapshot = EnvSnapshot::capture();

        let policy = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        let base = base_dir(args);
        let mut policy = policy.resolve_paths(&base);
        if let Some(env_file) = &args.env_file {
            policy.service.env_file = Some(env_file.clone());
        }

        info!(
            config_path = %args.config.display(),
            base_dir = %base.display(),
            windows = policy.schedule.len(),
            "Configuration loaded"
        );
        if policy.schedule.is_empty() {
            warn!("Schedule is empty; the workload will never be started");
        }

        // Consent overrides may be set in the env file, so it is read before the gate
        let file_entries = match &policy.service.env_file {
            Some(path) => load_env_file(path)
                .with_context(|| format!("Failed to load environment file {:?}", path))?,
            None => Vec::new(),
        };
        let environment = Environment::new(&snapshot, &file_entries);

        let gate = ConsentGate::new(consent_documents(&policy, &environment), ConsolePrompt);
        match gate
            .check_and_maybe_block()
            .await
            .context("Consent check failed")?
        {
            ConsentOutcome::AlreadyAccepted => info!("Consent check passed"),
            ConsentOutcome::Accepted { updated } => {
                info!(updated = ?updated, "Consent accepted")
            }
        }

        let providers = scan_providers(&file_entries, &snapshot)
            .context("Provider configuration check failed")?;
        info!(providers = ?providers, "Provider configuration checked");

        let factory = Arc::new(ProcessWorkloadFactory::new(
            policy.workload.clone(),
            environment,
        ));
        let supervisor = Supervisor::new(
            SupervisorConfig::from(&policy.service),
            AvailabilityScheduler::new(policy.schedule),
            Arc::new(SystemClock),
            factory,
        );

        Ok(Self { supervisor })
    }

    async fn run(mut self) -> Result<()> {
        // Set up signal handlers
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup =
            signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        let shutdown = CancellationToken::new();

        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
                _ = sighup.recv() => info!("Received SIGHUP, shutting down gracefully"),
            }
            signal_token.cancel();
        });

        let mut events = self.supervisor.subscribe();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                log_event(&event);
            }
        });

        info!("Service running");
        self.supervisor.run(shutdown).await;

        info!("Shutdown complete");
        Ok(())
    }
}

/// Where relative paths in the config resolve
fn base_dir(args: &Args) -> PathBuf {
    if let Some(dir) = &args.workdir {
        return dir.clone();
    }
    match args.config.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Consent documents from the policy, with override values looked up
/// in the loaded environment
fn consent_documents(policy: &Policy, environment: &Environment) -> Vec<ConsentDocument> {
    policy
        .consent
        .documents()
        .into_iter()
        .map(|doc| {
            let document = ConsentDocument::new(doc.kind, &doc.document, &doc.marker);
            match &doc.override_env {
                Some(name) => {
                    let value = environment.get(name).map(str::to_string);
                    document.with_override(name, value)
                }
                None => document,
            }
        })
        .collect()
}

fn log_event(event: &Event) {
    match serde_json::to_string(event) {
        Ok(json) => debug!(target: "curfew::events", event = %json, "Supervisor event"),
        Err(e) => warn!(error = %e, "Failed to serialize event"),
    }

    if let EventPayload::PeriodEnded { report, .. } = &event.payload
        && !report.is_clean()
    {
        warn!(
            failed = report.failed,
            aborted = report.aborted,
            panicked = report.panicked,
            "Previous period left tasks that did not stop cleanly"
        );
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn check_config_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!(
            "Configuration file {} not found; create it (see config.example.toml) or pass --config",
            path.display()
        );
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "curfewd starting");
    if is_mock_time_active() {
        warn!("Mock time is active; window decisions use the shifted clock");
    }

    check_config_exists(&args.config)?;

    // Create and run the service
    let service = Service::new(&args).await?;
    service.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use curfew_api::DocumentKind;
    use curfew_config::parse_config;

    fn args(config: &str, workdir: Option<&str>) -> Args {
        Args {
            config: PathBuf::from(config),
            env_file: None,
            workdir: workdir.map(PathBuf::from),
            log_level: "info".into(),
        }
    }

    #[test]
    fn base_dir_defaults_to_config_directory() {
        assert_eq!(base_dir(&args("/etc/curfew/config.toml", None)), PathBuf::from("/etc/curfew"));
        assert_eq!(base_dir(&args("config.toml", None)), PathBuf::from("."));
        assert_eq!(
            base_dir(&args("/etc/curfew/config.toml", Some("/srv/bot"))),
            PathBuf::from("/srv/bot")
        );
    }

    #[test]
    fn overrides_come_from_environment() {
        let policy = parse_config("config_version = 1\n[workload]\ncommand = \"bot\"\n").unwrap();
        let snapshot = EnvSnapshot::from_vars([("EULA_AGREE", "abc")]);
        let environment = Environment::new(&snapshot, &[("PRIVACY_AGREE".into(), "def".into())]);

        let docs = consent_documents(&policy, &environment);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].kind, DocumentKind::Eula);
        assert_eq!(docs[0].override_value.as_deref(), Some("abc"));
        assert_eq!(docs[1].override_value.as_deref(), Some("def"));
        assert_eq!(docs[1].override_name.as_deref(), Some("PRIVACY_AGREE"));
    }

    #[test]
    fn cli_parses() {
        let args = Args::try_parse_from([
            "curfewd",
            "--config",
            "/tmp/c.toml",
            "--env-file",
            "/tmp/.env",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("/tmp/c.toml"));
        assert_eq!(args.env_file, Some(PathBuf::from("/tmp/.env")));
        assert_eq!(args.log_level, "debug");
    }
}
