//! Scheduler types.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{SchedulerError, parse_schedule_time};

/// A recurring daily trigger at a fixed wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TriggerSpec {
    pub(crate) hour: u32,
    pub(crate) minute: u32,
    pub(crate) second: u32,
}

impl TriggerSpec {
    /// Create a trigger firing every day at `hour:minute:00` (24-hour clock).
    pub fn daily(hour: u32, minute: u32) -> Result<Self, SchedulerError> {
        if hour >= 24 || minute >= 60 {
            return Err(SchedulerError::InvalidTime {
                input: format!("{}:{:02}", hour, minute),
                reason: "hour must be below 24 and minute below 60".to_string(),
            });
        }
        Ok(Self {
            hour,
            minute,
            second: 0,
        })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn second(&self) -> u32 {
        self.second
    }
}

impl fmt::Display for TriggerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Six-field cron notation: sec min hour day month weekday
        write!(f, "{} {} {} * * *", self.second, self.minute, self.hour)
    }
}

/// A schedule entry as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Time of day, e.g. "9:30 AM".
    pub time: String,
    /// Upper bound of the random extra delay before the session starts.
    #[serde(default)]
    pub max_delay_minutes: u32,
}

/// A recurring job derived 1:1 from a [`Schedule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronJob {
    /// Human-readable name, unique within one scheduler.
    pub name: String,
    /// When the job fires.
    pub trigger: TriggerSpec,
    /// Upper bound of the random delay applied after the trigger fires.
    pub max_delay: Duration,
}

impl CronJob {
    /// Create a job from a configured schedule entry.
    pub fn from_schedule(index: usize, schedule: &Schedule) -> Result<Self, SchedulerError> {
        let trigger = parse_schedule_time(&schedule.time)?;
        Ok(Self {
            name: format!("session-{}@{}", index, schedule.time.trim()),
            trigger,
            max_delay: Duration::from_secs(u64::from(schedule.max_delay_minutes) * 60),
        })
    }
}
