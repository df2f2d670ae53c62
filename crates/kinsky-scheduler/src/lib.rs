//! Daily cron planner and job scheduler for Kinsky.
//!
//! This crate provides:
//! - Parsing of 12-hour "H:MM AM|PM" schedule entries into daily triggers
//! - Next-occurrence computation in any time zone
//! - Earliest-upcoming lookup across jobs, with per-job fault isolation
//! - A scheduler loop that fires each job as an independent task
//! - The [`Isolate`] policy used at every failure-containment boundary

mod error;
mod isolate;
mod planner;
mod scheduler;
mod types;

pub use error::SchedulerError;
pub use isolate::Isolate;
pub use planner::{NextRun, earliest_upcoming, next_occurrence, parse_schedule_time};
pub use scheduler::{CronScheduler, JobExecutor, JobFuture};
pub use types::{CronJob, Schedule, TriggerSpec};
