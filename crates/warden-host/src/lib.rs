//! Process-control seam between the supervisor and the operating system
//!
//! Defines the `BotHost`/`BotChild` traits, the Unix implementation
//! (process groups, SIGTERM/SIGKILL), and a mock for supervisor tests.
//! The supervisor accesses the child only through three operations:
//! launch, non-blocking liveness check, and terminate (graceful or forced).

mod mock;
mod process;

pub use mock::*;
pub use process::*;

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Errors from host operations
#[derive(Debug, Error)]
pub enum HostError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),

    #[error("signal failed: {0}")]
    SignalFailed(String),

    #[error("wait failed: {0}")]
    WaitFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type HostResult<T> = Result<T, HostError>;

/// Exit status of a bot process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code if the process exited normally
    pub code: Option<i32>,

    /// Signal number if the process was killed by a signal
    pub signal: Option<i32>,
}

impl ExitStatus {
    pub fn with_code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    pub fn signaled(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(signal)) => write!(f, "signal {signal}"),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

/// A launched bot process, exclusively owned by the supervisor
pub trait BotChild: Send {
    /// OS identifier for logging
    fn id(&self) -> u32;

    /// Non-blocking liveness check. Reaps the process and returns its
    /// status once it has exited; the status stays available afterwards.
    fn try_wait(&mut self) -> HostResult<Option<ExitStatus>>;

    /// Request graceful termination. Must be a no-op when the process is
    /// already gone.
    fn terminate(&mut self) -> HostResult<()>;

    /// Unconditional, immediate termination. Must be a no-op when the
    /// process is already gone.
    fn kill(&mut self) -> HostResult<()>;
}

/// Spawns bot processes
#[async_trait]
pub trait BotHost: Send + Sync {
    type Child: BotChild + 'static;

    /// Launch the bot with the given command line and working directory
    async fn spawn(&self, argv: &[String], cwd: Option<&Path>) -> HostResult<Self::Child>;
}

#[async_trait]
impl<T: BotHost> BotHost for std::sync::Arc<T> {
    type Child = T::Child;

    async fn spawn(&self, argv: &[String], cwd: Option<&Path>) -> HostResult<Self::Child> {
        (**self).spawn(argv, cwd).await
    }
}
