//! Configuration file and secrets.

use std::path::Path;

use chrono::Duration;
use kinsky_bluesky::DEFAULT_PDS_URL;
use kinsky_engagement::{Pacing, SessionConfig, Topic};
use kinsky_kindroid::DEFAULT_BASE_URL as DEFAULT_KINDROID_URL;
use kinsky_scheduler::{CronJob, CronScheduler, Schedule, SchedulerError};
use serde::Deserialize;
use thiserror::Error;

/// Environment variable holding the Bluesky app password.
pub const BSKY_TOKEN_ENV: &str = "BSKY_TOKEN";

/// Environment variable holding the Kindroid API key.
pub const KINDROID_API_KEY_ENV: &str = "KINDROID_API_KEY";

/// Errors that make the configuration unusable. All are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("missing secret: set {0} or pass it on the command line")]
    MissingSecret(&'static str),

    #[error("invalid schedule: {0}")]
    Schedule(#[from] SchedulerError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_pds_url() -> String {
    DEFAULT_PDS_URL.to_string()
}

fn default_kindroid_url() -> String {
    DEFAULT_KINDROID_URL.to_string()
}

fn default_keyword_window() -> usize {
    2
}

fn default_search_limit() -> u8 {
    50
}

fn default_since_hours() -> u32 {
    4
}

fn default_true() -> bool {
    true
}

fn default_greeting() -> String {
    "Hi again! Let's start fresh.".to_string()
}

fn default_health_check_minutes() -> u64 {
    10
}

/// Contents of the JSON configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Bluesky handle to act as.
    pub handle: String,
    /// Kindroid persona writing posts and replies.
    pub persona_id: String,
    pub keywords: Vec<String>,
    /// Candidates interacted with per keyword window.
    pub interaction_count: usize,
    pub max_mentions: usize,
    pub post_count: usize,
    pub schedules: Vec<Schedule>,
    pub topics: Vec<Topic>,

    #[serde(default = "default_pds_url")]
    pub pds_url: String,
    #[serde(default = "default_kindroid_url")]
    pub kindroid_url: String,
    #[serde(default = "default_keyword_window")]
    pub keyword_window: usize,
    #[serde(default = "default_search_limit")]
    pub search_limit: u8,
    #[serde(default = "default_since_hours")]
    pub since_hours: u32,
    #[serde(default = "default_true")]
    pub reply_to_mentions: bool,
    #[serde(default = "default_greeting")]
    pub chat_break_greeting: String,
    #[serde(default = "default_health_check_minutes")]
    pub health_check_minutes: u64,
    #[serde(default)]
    pub pacing: Pacing,
    /// Fixed RNG seed, for reproducible runs.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Config {
    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config: Config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Check the constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.handle.trim().is_empty() {
            return Err(ConfigError::Invalid("handle must not be empty".to_string()));
        }
        if self.persona_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "persona_id must not be empty".to_string(),
            ));
        }
        if self.keyword_window == 0 {
            return Err(ConfigError::Invalid(
                "keyword_window must be at least 1".to_string(),
            ));
        }
        if !(1..=100).contains(&self.search_limit) {
            return Err(ConfigError::Invalid(
                "search_limit must be between 1 and 100".to_string(),
            ));
        }
        if self.post_count > 0 && self.topics.is_empty() {
            return Err(ConfigError::Invalid(
                "topics must not be empty when post_count is above 0".to_string(),
            ));
        }
        if self.health_check_minutes == 0 {
            return Err(ConfigError::Invalid(
                "health_check_minutes must be at least 1".to_string(),
            ));
        }

        let windows = [
            ("session_start", self.pacing.session_start),
            ("candidate", self.pacing.candidate),
            ("post", self.pacing.post),
        ];
        for (name, window) in windows {
            if !window.is_ordered() {
                return Err(ConfigError::Invalid(format!(
                    "pacing.{} has min_ms above max_ms",
                    name
                )));
            }
        }

        self.jobs()?;
        Ok(())
    }

    /// One cron job per schedule entry.
    pub fn jobs(&self) -> Result<Vec<CronJob>, ConfigError> {
        Ok(CronScheduler::from_schedules(&self.schedules)?
            .jobs()
            .to_vec())
    }

    /// Session settings derived from this file.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            handle: self.handle.clone(),
            persona_id: self.persona_id.clone(),
            keywords: self.keywords.clone(),
            keyword_window: self.keyword_window,
            search_limit: self.search_limit,
            since_window: Some(Duration::hours(i64::from(self.since_hours))),
            max_candidates: self.interaction_count,
            post_count: self.post_count,
            topics: self.topics.clone(),
            reply_to_mentions: self.reply_to_mentions,
            max_mentions: self.max_mentions,
            chat_break_greeting: self.chat_break_greeting.clone(),
            pacing: self.pacing,
            seed: self.seed,
        }
    }

    /// Interval between health checks.
    pub fn health_check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.health_check_minutes * 60)
    }
}

/// Credentials supplied through the environment or CLI flags.
#[derive(Clone)]
pub struct Secrets {
    pub bsky_token: String,
    pub kindroid_api_key: String,
}

impl Secrets {
    /// Require both secrets. Blank values count as missing.
    pub fn resolve(
        bsky_token: Option<String>,
        kindroid_api_key: Option<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            bsky_token: required(bsky_token, BSKY_TOKEN_ENV)?,
            kindroid_api_key: required(kindroid_api_key, KINDROID_API_KEY_ENV)?,
        })
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("bsky_token", &"<redacted>")
            .field("kindroid_api_key", &"<redacted>")
            .finish()
    }
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingSecret(name))
}
