//! Unix process management

use async_trait::async_trait;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use tracing::debug;

use crate::{BotChild, BotHost, ExitStatus, HostError, HostResult};

/// Spawns bot processes in their own process group
#[derive(Debug, Default)]
pub struct UnixHost;

impl UnixHost {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BotHost for UnixHost {
    type Child = UnixProcess;

    async fn spawn(&self, argv: &[String], cwd: Option<&Path>) -> HostResult<UnixProcess> {
        UnixProcess::spawn(argv, cwd)
    }
}

/// Child process running as leader of its own process group
pub struct UnixProcess {
    child: Child,
    pid: u32,
}

impl UnixProcess {
    /// Spawn a new process in its own process group. The bot inherits
    /// stdout/stderr so its console output passes through.
    pub fn spawn(argv: &[String], cwd: Option<&Path>) -> HostResult<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| HostError::SpawnFailed("empty argv".into()))?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.stdin(Stdio::null());

        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        // The child becomes leader of a new process group so termination
        // signals reach anything it forks.
        // SAFETY: setsid is safe in the pre-exec context
        unsafe {
            cmd.pre_exec(|| {
                nix::unistd::setsid().map_err(|e| {
                    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
                })?;
                Ok(())
            });
        }

        let child = cmd
            .spawn()
            .map_err(|e| HostError::SpawnFailed(format!("failed to spawn {}: {}", program, e)))?;

        let pid = child.id();

        debug!(pid = pid, program = %program, "process spawned");

        Ok(Self { child, pid })
    }

    /// Signal the whole process group. ESRCH means the group is already
    /// gone, which callers treat as success.
    fn signal_group(&self, sig: Signal) -> HostResult<()> {
        let pgid = Pid::from_raw(-(self.pid as i32)); // negative addresses the group

        match signal::kill(pgid, sig) {
            Ok(()) => {
                debug!(pid = self.pid, signal = %sig, "signal sent to process group");
                Ok(())
            }
            Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(HostError::SignalFailed(format!(
                "failed to send {} to pid {}: {}",
                sig, self.pid, e
            ))),
        }
    }
}

impl BotChild for UnixProcess {
    fn id(&self) -> u32 {
        self.pid
    }

    fn try_wait(&mut self) -> HostResult<Option<ExitStatus>> {
        match self.child.try_wait() {
            Ok(Some(status)) => Ok(Some(convert_status(status))),
            Ok(None) => Ok(None),
            Err(e) => Err(HostError::WaitFailed(e.to_string())),
        }
    }

    fn terminate(&mut self) -> HostResult<()> {
        self.signal_group(Signal::SIGTERM)
    }

    fn kill(&mut self) -> HostResult<()> {
        self.signal_group(Signal::SIGKILL)
    }
}

fn convert_status(status: std::process::ExitStatus) -> ExitStatus {
    if let Some(code) = status.code() {
        ExitStatus::with_code(code)
    } else {
        use std::os::unix::process::ExitStatusExt;
        match status.signal() {
            Some(sig) => ExitStatus::signaled(sig),
            None => ExitStatus::with_code(-1),
        }
    }
}
