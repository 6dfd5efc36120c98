//! The supervised command as a [`Workload`]

use async_trait::async_trait;
use curfew_config::{Environment, WorkloadSpec};
use curfew_util::RunId;
use curfew_workload_api::{
    Workload, WorkloadContext, WorkloadError, WorkloadFactory, WorkloadResult,
};
use std::path::PathBuf;
use tracing::{info, warn};

use crate::{LaunchSpec, ManagedProcess, resolve_program};

/// Variable exported to the child naming its Online period
pub const RUN_ID_ENV_VAR: &str = "CURFEW_RUN_ID";

/// Runs the configured command for one Online period
pub struct ProcessWorkload {
    run_id: RunId,
    spec: WorkloadSpec,
    env: Vec<(String, String)>,
    program: Option<PathBuf>,
}

impl ProcessWorkload {
    pub fn new(run_id: RunId, spec: WorkloadSpec, environment: &Environment) -> Self {
        // Inherited and env-file variables first, then the workload's own
        let mut env: Vec<(String, String)> = environment
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        env.extend(spec.env.iter().map(|(k, v)| (k.clone(), v.clone())));
        env.push((RUN_ID_ENV_VAR.to_string(), run_id.to_string()));

        Self {
            run_id,
            spec,
            env,
            program: None,
        }
    }

    fn path_var(&self) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == "PATH")
            .map(|(_, v)| v.as_str())
    }
}

#[async_trait]
impl Workload for ProcessWorkload {
    fn name(&self) -> &str {
        &self.spec.command
    }

    async fn initialize(&mut self, _ctx: &WorkloadContext) -> WorkloadResult<()> {
        if let Some(cwd) = &self.spec.cwd
            && !cwd.is_dir()
        {
            return Err(WorkloadError::InitFailed(format!(
                "working directory {} does not exist",
                cwd.display()
            )));
        }

        let program = resolve_program(&self.spec.command, self.spec.cwd.as_deref(), self.path_var())
            .ok_or_else(|| {
                WorkloadError::InitFailed(format!("command '{}' not found", self.spec.command))
            })?;

        info!(run_id = %self.run_id, program = %program.display(), "Workload command resolved");
        self.program = Some(program);
        Ok(())
    }

    async fn run(&mut self, ctx: &WorkloadContext) -> WorkloadResult<()> {
        let program = self
            .program
            .as_deref()
            .ok_or_else(|| WorkloadError::Internal("run called before initialize".into()))?;

        let mut process = ManagedProcess::spawn(&LaunchSpec {
            program,
            args: &self.spec.args,
            env: &self.env,
            cwd: self.spec.cwd.as_deref(),
        })?;
        info!(run_id = %self.run_id, pid = ?process.id(), "Workload process started");

        tokio::select! {
            outcome = process.wait() => {
                let outcome = outcome?;
                if outcome.is_success() {
                    info!(run_id = %self.run_id, "Workload process exited");
                    Ok(())
                } else {
                    warn!(run_id = %self.run_id, outcome = %outcome, "Workload process failed");
                    Err(WorkloadError::Exited(outcome.to_string()))
                }
            }
            _ = ctx.cancelled() => {
                let outcome = process.stop(self.spec.stop_timeout).await?;
                info!(run_id = %self.run_id, outcome = %outcome, "Workload process stopped");
                Ok(())
            }
        }
    }
}

/// Creates a [`ProcessWorkload`] per Online period
pub struct ProcessWorkloadFactory {
    spec: WorkloadSpec,
    environment: Environment,
}

impl ProcessWorkloadFactory {
    pub fn new(spec: WorkloadSpec, environment: Environment) -> Self {
        Self { spec, environment }
    }
}

impl WorkloadFactory for ProcessWorkloadFactory {
    fn create(&self, run_id: RunId) -> WorkloadResult<Box<dyn Workload>> {
        Ok(Box::new(ProcessWorkload::new(
            run_id,
            self.spec.clone(),
            &self.environment,
        )))
    }
}
