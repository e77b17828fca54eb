//! Raw configuration schema (as parsed from TOML)

use serde::Deserialize;
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    /// Trading window definition
    pub window: RawWindow,

    /// Bot subprocess definition
    pub bot: RawBot,

    /// Supervisor timing overrides
    #[serde(default)]
    pub supervisor: RawSupervisor,
}

/// Daily trading window
#[derive(Debug, Clone, Deserialize)]
pub struct RawWindow {
    /// Hour the window opens (0-23, inclusive boundary)
    pub start_hour: u8,

    /// Hour the window closes (0-23, exclusive boundary)
    pub end_hour: u8,

    /// IANA timezone identifier (e.g. "America/New_York")
    pub timezone: String,
}

/// Bot subprocess launch details
#[derive(Debug, Clone, Deserialize)]
pub struct RawBot {
    /// Command line, program first
    pub argv: Vec<String>,

    /// Working directory for the bot (default: inherit)
    pub working_dir: Option<PathBuf>,
}

/// Supervisor timing settings, all optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSupervisor {
    /// Poll interval while waiting for the window to open (default: 60)
    pub wait_poll_seconds: Option<u64>,

    /// Poll interval while the bot is running (default: 30)
    pub run_poll_seconds: Option<u64>,

    /// Grace period for voluntary exit after SIGTERM (default: 10)
    pub grace_seconds: Option<u64>,

    /// Pause after any stop before re-evaluating the window (default: 60)
    pub restart_pause_seconds: Option<u64>,
}
