//! Trading window evaluation
//!
//! Pure function of the current time and the configured window. Only the
//! hour component in the configured timezone matters: the window opens at
//! the start hour (inclusive) and closes at the end hour (exclusive).

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use warden_config::WindowConfig;

/// Daily trading window in a fixed IANA timezone
#[derive(Debug, Clone, Copy)]
pub struct TradingWindow {
    start_hour: u8,
    end_hour: u8,
    timezone: Tz,
}

impl TradingWindow {
    /// Bounds are assumed validated (start < end, both 0-23); see
    /// `warden_config::WindowConfig`.
    pub fn new(start_hour: u8, end_hour: u8, timezone: Tz) -> Self {
        Self {
            start_hour,
            end_hour,
            timezone,
        }
    }

    /// True iff `now`, viewed in the configured timezone, falls inside
    /// `[start_hour, end_hour)`. Minutes and seconds are irrelevant.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        let hour = now.with_timezone(&self.timezone).hour();
        u32::from(self.start_hour) <= hour && hour < u32::from(self.end_hour)
    }

    /// Current time in the configured zone, for status lines
    pub fn local_time(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.timezone).format("%H:%M").to_string()
    }

    /// Human-readable window description, e.g. "04:00-23:00 America/New_York"
    pub fn describe(&self) -> String {
        format!(
            "{:02}:00-{:02}:00 {}",
            self.start_hour, self.end_hour, self.timezone
        )
    }
}

impl From<&WindowConfig> for TradingWindow {
    fn from(config: &WindowConfig) -> Self {
        Self::new(config.start_hour, config.end_hour, config.timezone)
    }
}
