//! Cron scheduler loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    CronJob, Isolate, NextRun, Schedule, SchedulerError, earliest_upcoming, next_occurrence,
};

/// Maximum sleep duration between scheduler checks.
const MAX_SLEEP_SECS: u64 = 300;

/// Future returned by a [`JobExecutor`].
pub type JobFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// Type alias for the job executor function.
pub type JobExecutor = Arc<dyn Fn(CronJob) -> JobFuture + Send + Sync>;

/// Fires daily jobs at their trigger times.
pub struct CronScheduler {
    jobs: Vec<CronJob>,
}

impl CronScheduler {
    /// Create a scheduler for the given jobs.
    pub fn new(jobs: Vec<CronJob>) -> Self {
        Self { jobs }
    }

    /// Create one job per configured schedule entry.
    pub fn from_schedules(schedules: &[Schedule]) -> Result<Self, SchedulerError> {
        let jobs = schedules
            .iter()
            .enumerate()
            .map(|(index, schedule)| CronJob::from_schedule(index, schedule))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(jobs))
    }

    /// List all jobs.
    pub fn jobs(&self) -> &[CronJob] {
        &self.jobs
    }

    /// The job that fires next in local time.
    pub fn next_run(&self) -> NextRun<'_, Local> {
        earliest_upcoming(&self.jobs, &Local::now())
    }

    /// Run the scheduler loop until shutdown is signalled.
    ///
    /// Each firing runs as its own task, so a slow or hung session never
    /// delays the next trigger.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>, executor: JobExecutor) {
        info!(jobs = self.jobs.len(), "scheduler starting");

        let mut slots = self.plan(&Local::now());
        if let NextRun::At { job, at } = earliest_upcoming(&self.jobs, &Local::now()) {
            info!(job = %job.name, at = %at.to_rfc3339(), "next scheduled run");
        }

        loop {
            if *shutdown_rx.borrow() {
                info!("scheduler shutting down");
                break;
            }

            let now = Local::now();
            let fired = self.fire_due(&mut slots, &now, &executor);
            if fired > 0 {
                debug!(fired, "fired due jobs");
            }
            self.replan_faulted(&mut slots, &now);

            let sleep_duration = sleep_duration(&slots, &now);

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        warn!("shutdown channel closed, stopping scheduler");
                        break;
                    }
                }
                _ = sleep(sleep_duration) => {}
            }
        }

        info!("scheduler shut down gracefully");
    }

    /// Compute the next run of every job. Faulting jobs get `None`.
    fn plan<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<Option<DateTime<Tz>>> {
        self.jobs
            .iter()
            .map(|job| Isolate.absorb("next-run", &job.name, next_occurrence(&job.trigger, now)))
            .collect()
    }

    /// Retry next-run computation for jobs that faulted earlier.
    fn replan_faulted<Tz: TimeZone>(&self, slots: &mut [Option<DateTime<Tz>>], now: &DateTime<Tz>) {
        for (job, slot) in self.jobs.iter().zip(slots.iter_mut()) {
            if slot.is_none() {
                *slot = Isolate.absorb("next-run", &job.name, next_occurrence(&job.trigger, now));
            }
        }
    }

    /// Spawn every job whose slot is due and advance its slot.
    ///
    /// Returns the number of jobs fired.
    fn fire_due<Tz: TimeZone>(
        &self,
        slots: &mut [Option<DateTime<Tz>>],
        now: &DateTime<Tz>,
        executor: &JobExecutor,
    ) -> usize {
        let mut fired = 0;
        for (job, slot) in self.jobs.iter().zip(slots.iter_mut()) {
            let due = slot.as_ref().is_some_and(|at| at <= now);
            if !due {
                continue;
            }

            self.spawn_job(job, executor);
            fired += 1;
            *slot = Isolate.absorb("next-run", &job.name, next_occurrence(&job.trigger, now));
        }
        fired
    }

    fn spawn_job(&self, job: &CronJob, executor: &JobExecutor) {
        info!(job = %job.name, trigger = %job.trigger, "triggering job");

        let name = job.name.clone();
        let fut = executor(job.clone());
        tokio::spawn(async move {
            if Isolate.contain("job", &name, fut).await.is_some() {
                info!(job = %name, "job completed");
            }
        });
    }
}

/// How long to sleep until the earliest slot, capped at [`MAX_SLEEP_SECS`].
fn sleep_duration<Tz: TimeZone>(slots: &[Option<DateTime<Tz>>], now: &DateTime<Tz>) -> Duration {
    let max = Duration::from_secs(MAX_SLEEP_SECS);
    slots
        .iter()
        .flatten()
        .min()
        .map(|next| {
            next.clone()
                .signed_duration_since(now.clone())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(max)
        })
        .unwrap_or(max)
}
