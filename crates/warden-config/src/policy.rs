//! Validated configuration ready for use by the supervisor

use crate::schema::{RawBot, RawConfig, RawSupervisor, RawWindow};
use crate::ConfigError;
use chrono_tz::Tz;
use std::path::PathBuf;
use std::time::Duration;

/// Validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub window: WindowConfig,
    pub bot: BotConfig,
    pub timing: PollTiming,
}

impl Config {
    /// Convert from raw config, validating window bounds, timezone, and command
    pub fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            window: WindowConfig::from_raw(raw.window)?,
            bot: BotConfig::from_raw(raw.bot)?,
            timing: PollTiming::from_raw(raw.supervisor),
        })
    }
}

/// Daily trading window. Invariant: start_hour < end_hour, both 0-23.
#[derive(Debug, Clone, Copy)]
pub struct WindowConfig {
    pub start_hour: u8,
    pub end_hour: u8,
    pub timezone: Tz,
}

impl WindowConfig {
    fn from_raw(raw: RawWindow) -> Result<Self, ConfigError> {
        for hour in [raw.start_hour, raw.end_hour] {
            if hour > 23 {
                return Err(ConfigError::HourOutOfRange(hour));
            }
        }
        if raw.start_hour >= raw.end_hour {
            return Err(ConfigError::WindowBounds {
                start: raw.start_hour,
                end: raw.end_hour,
            });
        }
        let timezone = raw
            .timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::UnknownTimezone(raw.timezone))?;

        Ok(Self {
            start_hour: raw.start_hour,
            end_hour: raw.end_hour,
            timezone,
        })
    }
}

/// Bot subprocess launch details
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Command line, program first. Never empty.
    pub argv: Vec<String>,
    /// Working directory. None inherits the supervisor's.
    pub working_dir: Option<PathBuf>,
}

impl BotConfig {
    fn from_raw(raw: RawBot) -> Result<Self, ConfigError> {
        if raw.argv.is_empty() || raw.argv[0].is_empty() {
            return Err(ConfigError::EmptyCommand);
        }
        Ok(Self {
            argv: raw.argv,
            working_dir: raw.working_dir,
        })
    }
}

/// Supervisor poll intervals and grace period
#[derive(Debug, Clone, Copy)]
pub struct PollTiming {
    /// Between window checks while waiting
    pub wait_poll: Duration,
    /// Between window/liveness checks while the bot runs
    pub run_poll: Duration,
    /// Bounded wait for voluntary exit after SIGTERM
    pub grace: Duration,
    /// Pause after any stop before the window is re-evaluated
    pub restart_pause: Duration,
}

impl PollTiming {
    fn from_raw(raw: RawSupervisor) -> Self {
        let defaults = Self::default();
        Self {
            wait_poll: raw
                .wait_poll_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.wait_poll),
            run_poll: raw
                .run_poll_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.run_poll),
            grace: raw
                .grace_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.grace),
            restart_pause: raw
                .restart_pause_seconds
                .map(Duration::from_secs)
                .unwrap_or(defaults.restart_pause),
        }
    }
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            wait_poll: Duration::from_secs(60),
            run_poll: Duration::from_secs(30),
            grace: Duration::from_secs(10),
            restart_pause: Duration::from_secs(60),
        }
    }
}
