//! Kinsky: scheduled Bluesky engagement agent
//!
//! Main binary with subcommands:
//! - `daemon`: Run sessions on schedule, with periodic health checks
//! - `session`: Run one session now
//! - `health`: Log in once and fetch the account profile
//! - `schedule`: Show when each scheduled session fires next

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use kinsky_engagement::{BlueskyNetwork, Orchestrator};
use kinsky_kindroid::KindroidClient;
use kinsky_scheduler::{CronScheduler, next_occurrence};
use miette::{Result, miette};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, Secrets};

mod config;
mod daemon;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "kinsky=info,kinsky_engagement=info,kinsky_scheduler=info,kinsky_bluesky=info,kinsky_kindroid=info";

#[derive(Parser)]
#[command(name = "kinsky")]
#[command(about = "Scheduled Bluesky engagement agent", long_about = None)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, short, env = "KINSKY_CONFIG", default_value = "kinsky.json", global = true)]
    config: PathBuf,

    /// Bluesky app password
    #[arg(long, env = "BSKY_TOKEN", hide_env_values = true, global = true)]
    bsky_token: Option<String>,

    /// Kindroid API key
    #[arg(long, env = "KINDROID_API_KEY", hide_env_values = true, global = true)]
    kindroid_api_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scheduled sessions and health checks until Ctrl-C
    Daemon,

    /// Run a single session immediately
    Session,

    /// Check that the account can log in and fetch its profile
    Health,

    /// Print the next run of every scheduled session
    Schedule,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let Cli {
        config,
        bsky_token,
        kindroid_api_key,
        command,
    } = Cli::parse();

    let config = Config::load(&config).map_err(|e| miette!("{}", e))?;

    match command {
        Commands::Schedule => print_schedule(&config),

        Commands::Daemon => {
            let secrets =
                Secrets::resolve(bsky_token, kindroid_api_key).map_err(|e| miette!("{}", e))?;
            let orchestrator = build_orchestrator(&config, secrets)?;
            let jobs = config.jobs().map_err(|e| miette!("{}", e))?;
            daemon::run(Arc::new(orchestrator), jobs, config.health_check_interval()).await
        }

        Commands::Session => {
            let secrets =
                Secrets::resolve(bsky_token, kindroid_api_key).map_err(|e| miette!("{}", e))?;
            let orchestrator = build_orchestrator(&config, secrets)?;
            let report = orchestrator
                .run_session()
                .await
                .map_err(|e| miette!("session failed: {}", e))?;

            println!(
                "Session complete: {} succeeded, {} failed, {} followed, {} posts, {} mentions answered",
                report.succeeded(),
                report.failed(),
                report.followed(),
                report.posts_published,
                report.mentions_answered
            );
            Ok(())
        }

        Commands::Health => {
            let secrets =
                Secrets::resolve(bsky_token, kindroid_api_key).map_err(|e| miette!("{}", e))?;
            let orchestrator = build_orchestrator(&config, secrets)?;
            if orchestrator.health_check().await {
                println!("{} is healthy", config.handle);
                Ok(())
            } else {
                Err(miette!("health check failed for {}", config.handle))
            }
        }
    }
}

/// Wire the live Bluesky and Kindroid clients into an orchestrator.
fn build_orchestrator(config: &Config, secrets: Secrets) -> Result<Orchestrator> {
    let network = Arc::new(BlueskyNetwork::new(&config.pds_url));
    let generator = Arc::new(
        KindroidClient::with_base_url(secrets.kindroid_api_key, &config.kindroid_url)
            .map_err(|e| miette!("failed to create Kindroid client: {}", e))?,
    );
    let jobs = config.jobs().map_err(|e| miette!("{}", e))?;

    info!(
        handle = %config.handle,
        pds_url = %config.pds_url,
        jobs = jobs.len(),
        "configured orchestrator"
    );

    Ok(
        Orchestrator::new(network, generator, secrets.bsky_token, config.session_config())
            .with_jobs(jobs),
    )
}

fn print_schedule(config: &Config) -> Result<()> {
    let scheduler = CronScheduler::new(config.jobs().map_err(|e| miette!("{}", e))?);
    let now = Local::now();

    println!("Scheduled sessions:\n");
    for job in scheduler.jobs() {
        match next_occurrence(&job.trigger, &now) {
            Ok(at) => println!(
                "  {:<24} next {}  (cron {}, up to {} min delay)",
                job.name,
                at.format("%Y-%m-%d %H:%M %Z"),
                job.trigger,
                job.max_delay.as_secs() / 60
            ),
            Err(e) => println!("  {:<24} unavailable: {}", job.name, e),
        }
    }
    println!("\nNext: {}", scheduler.next_run());
    Ok(())
}
