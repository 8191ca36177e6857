//! OS process backend

use super::{StopOutcome, UnitBackend, UnitHandle};
use crate::spec::Launch;
use crate::{Result, SupervisorError, UnitSpec};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// A spawned child process
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: u32,
}

impl ProcessHandle {
    /// OS process ID captured at spawn time
    pub fn pid(&self) -> u32 {
        self.pid
    }
}

/// Spawns units as child processes of the supervisor
#[derive(Debug, Default, Clone)]
pub struct ProcessBackend;

impl ProcessBackend {
    /// Create a process backend
    pub fn new() -> Self {
        Self
    }

    /// Ask the child to exit
    fn terminate(unit: &str, handle: &mut ProcessHandle) -> Result<()> {
        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            let pid = i32::try_from(handle.pid)
                .map_err(|_| SupervisorError::Process(format!("pid out of range: {}", handle.pid)))?;
            match signal::kill(Pid::from_raw(pid), Signal::SIGTERM) {
                // exited between the liveness check and the signal
                Ok(()) | Err(Errno::ESRCH) => Ok(()),
                Err(e) => Err(SupervisorError::Process(format!(
                    "failed to send SIGTERM to unit {} (pid {}): {}",
                    unit, handle.pid, e
                ))),
            }
        }

        #[cfg(not(unix))]
        {
            // no graceful request available; fall through to the timeout wait
            handle
                .child
                .start_kill()
                .map_err(|e| SupervisorError::Process(format!("failed to kill unit {}: {}", unit, e)))
        }
    }
}

#[async_trait]
impl UnitBackend for ProcessBackend {
    async fn start(&self, spec: &UnitSpec) -> Result<UnitHandle> {
        let Launch::Process(launch) = &spec.launch else {
            return Err(SupervisorError::InvalidSpec {
                unit: spec.id.clone(),
                reason: "process backend requires a process launch descriptor".to_string(),
            });
        };

        let mut cmd = Command::new(&launch.command);
        cmd.args(&launch.args)
            .envs(&launch.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(dir) = &launch.working_dir {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .map_err(|e| SupervisorError::spawn(&spec.id, format!("{}: {}", launch.command, e)))?;

        let pid = child
            .id()
            .ok_or_else(|| SupervisorError::spawn(&spec.id, "failed to get process ID"))?;

        info!(unit = %spec.id, pid, command = %launch.command, "spawned process");
        Ok(UnitHandle::Process(ProcessHandle { child, pid }))
    }

    fn probe(&self, unit: &str, handle: &mut UnitHandle) -> Result<bool> {
        let UnitHandle::Process(handle) = handle else {
            return Err(SupervisorError::probe(unit, "not a process handle"));
        };

        match handle.child.try_wait() {
            Ok(None) => Ok(true),
            Ok(Some(status)) => {
                warn!(unit = %unit, pid = handle.pid, %status, "process exited");
                Ok(false)
            }
            Err(e) => Err(SupervisorError::probe(unit, e)),
        }
    }

    async fn stop(&self, unit: &str, handle: UnitHandle, stop_timeout: Duration) -> Result<StopOutcome> {
        let UnitHandle::Process(mut handle) = handle else {
            return Err(SupervisorError::Process(format!(
                "unit {} does not hold a process handle",
                unit
            )));
        };

        if let Ok(Some(status)) = handle.child.try_wait() {
            debug!(unit = %unit, pid = handle.pid, %status, "process already exited");
            return Ok(StopOutcome::AlreadyExited);
        }

        Self::terminate(unit, &mut handle)?;

        match timeout(stop_timeout, handle.child.wait()).await {
            Ok(Ok(status)) => {
                info!(unit = %unit, pid = handle.pid, %status, "process stopped gracefully");
                Ok(StopOutcome::Graceful)
            }
            Ok(Err(e)) => Err(SupervisorError::Process(format!(
                "error waiting for unit {} (pid {}) to exit: {}",
                unit, handle.pid, e
            ))),
            Err(_) => {
                warn!(
                    unit = %unit,
                    pid = handle.pid,
                    timeout = ?stop_timeout,
                    "process did not exit in time, force killing"
                );
                handle.child.kill().await.map_err(|e| {
                    SupervisorError::Process(format!(
                        "failed to kill unit {} (pid {}): {}",
                        unit, handle.pid, e
                    ))
                })?;
                Ok(StopOutcome::Forced)
            }
        }
    }
}
