//! Daemon command for running Kinsky's scheduled sessions.
//!
//! The daemon runs two independent tasks until Ctrl-C:
//! - The cron scheduler, firing one session task per trigger
//! - A periodic health check logging in and fetching the profile

use std::sync::Arc;
use std::time::Duration;

use kinsky_engagement::Orchestrator;
use kinsky_scheduler::{CronJob, CronScheduler, JobExecutor, JobFuture};
use miette::Result;
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info, warn};

/// Run the daemon until a shutdown signal arrives.
pub async fn run(
    orchestrator: Arc<Orchestrator>,
    jobs: Vec<CronJob>,
    health_interval: Duration,
) -> Result<()> {
    info!("starting kinsky daemon");

    let scheduler = CronScheduler::new(jobs);

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Handle shutdown signals
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        let _ = shutdown_tx_clone.send(true);
    });

    let health_handle = spawn_health_checks(
        Arc::clone(&orchestrator),
        health_interval,
        shutdown_rx.clone(),
    );

    scheduler
        .run(shutdown_rx, session_executor(orchestrator))
        .await;

    if let Err(e) = health_handle.await {
        warn!(error = %e, "health check task ended abnormally");
    }
    drop(shutdown_tx);

    info!("kinsky daemon stopped");
    Ok(())
}

/// Executor running one session per fired job, after the job's random start delay.
pub fn session_executor(orchestrator: Arc<Orchestrator>) -> JobExecutor {
    Arc::new(move |job: CronJob| -> JobFuture {
        let orchestrator = Arc::clone(&orchestrator);
        let jitter = start_jitter(&job, &mut rand::thread_rng());

        Box::pin(async move {
            if !jitter.is_zero() {
                info!(job = %job.name, delay_secs = jitter.as_secs(), "delaying session start");
                sleep(jitter).await;
            }

            let report = orchestrator
                .run_session()
                .await
                .map_err(|e| format!("session failed: {}", e))?;

            info!(
                job = %job.name,
                succeeded = report.succeeded(),
                failed = report.failed(),
                posts = report.posts_published,
                "scheduled session finished"
            );
            Ok(())
        })
    })
}

/// Uniform delay in `0..=job.max_delay`, at millisecond resolution.
fn start_jitter<R: Rng + ?Sized>(job: &CronJob, rng: &mut R) -> Duration {
    let max_ms = u64::try_from(job.max_delay.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rng.gen_range(0..=max_ms))
}

fn spawn_health_checks(
    orchestrator: Arc<Orchestrator>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(period_secs = period.as_secs(), "health checks started");

        let mut interval = tokio::time::interval(period);

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = interval.tick() => {
                    if !orchestrator.health_check().await {
                        warn!("account health check failed");
                    }
                }
            }
        }

        info!("health checks stopped");
    })
}
