//! Process management utilities

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use curfew_workload_api::{WorkloadError, WorkloadResult};

/// How a child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Code(i32),
    Signaled(i32),
}

impl ExitOutcome {
    fn from_status(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;
        match (status.code(), status.signal()) {
            (Some(code), _) => Self::Code(code),
            (None, Some(sig)) => Self::Signaled(sig),
            (None, None) => Self::Code(-1),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Code(0))
    }
}

impl std::fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit code {}", code),
            Self::Signaled(sig) => write!(f, "signal {}", sig),
        }
    }
}

/// What to launch
#[derive(Debug, Clone)]
pub struct LaunchSpec<'a> {
    pub program: &'a Path,
    pub args: &'a [String],
    pub env: &'a [(String, String)],
    pub cwd: Option<&'a Path>,
}

/// Managed child process with process group.
///
/// Dropping the handle before the leader has been reaped SIGKILLs the whole
/// group, so an aborted owner never leaves descendants behind.
pub struct ManagedProcess {
    child: Child,
    pgid: Option<u32>,
    reaped: bool,
}

impl ManagedProcess {
    /// Spawn a new process as the leader of its own session
    pub fn spawn(spec: &LaunchSpec<'_>) -> WorkloadResult<Self> {
        let mut cmd = Command::new(spec.program);
        cmd.args(spec.args);

        cmd.env_clear();
        cmd.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        if let Some(dir) = spec.cwd {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);

        // SAFETY: setsid is async-signal-safe and touches no parent state
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid().map_err(std::io::Error::other)?;
                Ok(())
            });
        }

        let child = cmd.spawn().map_err(|e| {
            WorkloadError::SpawnFailed(format!("Failed to spawn {}: {}", spec.program.display(), e))
        })?;

        // After setsid, pid == pgid
        let pgid = child.id();
        debug!(pgid = ?pgid, program = %spec.program.display(), "Process spawned");

        Ok(Self {
            child,
            pgid,
            reaped: false,
        })
    }

    pub fn id(&self) -> Option<u32> {
        self.pgid
    }

    fn signal_group(&self, sig: Signal) -> WorkloadResult<()> {
        let Some(pgid) = self.pgid else {
            return Ok(());
        };

        // Negative pid addresses the whole process group
        match signal::kill(Pid::from_raw(-(pgid as i32)), sig) {
            Ok(()) => {
                debug!(pgid, signal = %sig, "Signalled process group");
                Ok(())
            }
            Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(WorkloadError::Internal(format!("Failed to send {}: {}", sig, e))),
        }
    }

    /// Send SIGTERM to the process group
    pub fn terminate(&self) -> WorkloadResult<()> {
        self.signal_group(Signal::SIGTERM)
    }

    /// Send SIGKILL to the process group
    pub fn kill(&self) -> WorkloadResult<()> {
        self.signal_group(Signal::SIGKILL)
    }

    /// Wait for the process to exit
    pub async fn wait(&mut self) -> WorkloadResult<ExitOutcome> {
        let status = self.child.wait().await?;
        self.reaped = true;
        Ok(ExitOutcome::from_status(status))
    }

    /// SIGTERM, wait up to `timeout`, then SIGKILL.
    ///
    /// Once the leader is gone, anything still in its group is killed too.
    pub async fn stop(&mut self, timeout: Duration) -> WorkloadResult<ExitOutcome> {
        self.terminate()?;

        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(outcome) => {
                let outcome = outcome?;
                self.kill()?;
                Ok(outcome)
            }
            Err(_) => {
                warn!(
                    pgid = ?self.pgid,
                    timeout_secs = timeout.as_secs(),
                    "Process ignored SIGTERM; killing"
                );
                self.kill()?;
                self.wait().await
            }
        }
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        if let Err(e) = self.kill() {
            warn!(pgid = ?self.pgid, error = %e, "Failed to kill process group on drop");
        }
    }
}

/// Locate `command`.
///
/// A command containing `/` is taken relative to `cwd`; a bare name is
/// searched in the `PATH` entries.
pub fn resolve_program(command: &str, cwd: Option<&Path>, path_var: Option<&str>) -> Option<PathBuf> {
    if command.contains('/') {
        let path = Path::new(command);
        let candidate = match cwd {
            Some(cwd) if path.is_relative() => cwd.join(path),
            _ => path.to_path_buf(),
        };
        return is_executable(&candidate).then_some(candidate);
    }

    std::env::split_paths(path_var?)
        .map(|dir| dir.join(command))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(program: &str, args: &[&str]) -> ManagedProcess {
        let program = resolve_program(program, None, std::env::var("PATH").ok().as_deref()).unwrap();
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        ManagedProcess::spawn(&LaunchSpec {
            program: &program,
            args: &args,
            env: &[],
            cwd: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn exit_codes_are_observed() {
        assert_eq!(spawn("true", &[]).wait().await.unwrap(), ExitOutcome::Code(0));
        assert_eq!(spawn("false", &[]).wait().await.unwrap(), ExitOutcome::Code(1));
    }

    #[tokio::test]
    async fn stop_terminates_process_group() {
        let mut proc = spawn("sleep", &["60"]);
        let outcome = proc.stop(Duration::from_secs(5)).await.unwrap();
        assert_eq!(outcome, ExitOutcome::Signaled(Signal::SIGTERM as i32));
    }

    #[tokio::test]
    async fn stop_escalates_to_kill() {
        let mut proc = spawn("sh", &["-c", "trap '' TERM; sleep 60"]);
        // Give the shell time to install its trap
        tokio::time::sleep(Duration::from_millis(200)).await;

        let outcome = proc.stop(Duration::from_millis(200)).await.unwrap();
        assert_eq!(outcome, ExitOutcome::Signaled(Signal::SIGKILL as i32));
    }

    fn is_alive(pid: i32) -> bool {
        // Zombies count as gone: they only wait for their new parent to reap them
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .is_some_and(|state| state != "Z"),
            Err(_) => false,
        }
    }

    async fn wait_for_pid_file(path: &Path) -> i32 {
        for _ in 0..100 {
            if let Ok(text) = std::fs::read_to_string(path)
                && let Ok(pid) = text.trim().parse()
            {
                return pid;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("{} never appeared", path.display());
    }

    async fn wait_until_dead(pid: i32) -> bool {
        for _ in 0..100 {
            if !is_alive(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    const STUBBORN_TREE: &str = "trap '' TERM; sleep 120 & echo $! > child.pid; wait";

    fn spawn_in(dir: &Path, script: &str) -> ManagedProcess {
        let program = resolve_program("sh", None, std::env::var("PATH").ok().as_deref()).unwrap();
        let args = vec!["-c".to_string(), script.to_string()];
        ManagedProcess::spawn(&LaunchSpec {
            program: &program,
            args: &args,
            env: &[],
            cwd: Some(dir),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn dropping_unreaped_process_kills_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let proc = spawn_in(dir.path(), STUBBORN_TREE);
        let grandchild = wait_for_pid_file(&dir.path().join("child.pid")).await;
        assert!(is_alive(grandchild));

        drop(proc);

        assert!(wait_until_dead(grandchild).await, "pid {grandchild} survived");
    }

    #[tokio::test]
    async fn stop_sweeps_the_group_after_the_leader_exits() {
        let dir = tempfile::tempdir().unwrap();
        // The leader exits on TERM but its background child ignores it
        let mut proc = spawn_in(
            dir.path(),
            "(trap '' TERM; sleep 120) & echo $! > child.pid; wait",
        );
        let grandchild = wait_for_pid_file(&dir.path().join("child.pid")).await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        proc.stop(Duration::from_secs(5)).await.unwrap();

        assert!(wait_until_dead(grandchild).await, "pid {grandchild} survived");
    }

    #[test]
    fn resolve_relative_and_path() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("run.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(resolve_program("./run.sh", Some(dir.path()), None), Some(dir.path().join("./run.sh")));
        assert_eq!(
            resolve_program("run.sh", None, dir.path().to_str()),
            Some(script.clone())
        );
        assert_eq!(resolve_program("run.sh", None, None), None);
        assert_eq!(resolve_program("missing", None, dir.path().to_str()), None);

        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert_eq!(resolve_program("run.sh", None, dir.path().to_str()), None);
    }
}
