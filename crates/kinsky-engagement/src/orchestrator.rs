//! Session orchestration: one full engagement run per trigger.

use std::sync::Arc;

use chrono::{Duration, Local, Utc};
use kinsky_scheduler::{CronJob, Isolate, NextRun, earliest_upcoming};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::sequencer::fit_post;
use crate::{
    Action, Aggregator, EngagementError, Network, Pacing, ReplyTarget, Sequencer, Session,
    SessionReport, TextGenerator,
};

/// Notifications fetched per session when looking for mentions.
const NOTIFICATION_FETCH_LIMIT: u8 = 50;

/// Subject and tone for an original post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub subject: String,
    pub tone: String,
}

impl Topic {
    /// Generator prompt for a new post on this topic.
    pub fn prompt(&self) -> String {
        format!("new post about {} in a {} tone", self.subject, self.tone)
    }
}

/// Everything that shapes a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Account handle to log in as.
    pub handle: String,
    /// Kindroid persona that writes posts and replies.
    pub persona_id: String,
    pub keywords: Vec<String>,
    /// Keywords searched together per candidate batch.
    pub keyword_window: usize,
    pub search_limit: u8,
    /// How far back searches reach; `None` uses the aggregator default.
    pub since_window: Option<Duration>,
    /// Candidates kept per keyword window.
    pub max_candidates: usize,
    pub post_count: usize,
    pub topics: Vec<Topic>,
    pub reply_to_mentions: bool,
    pub max_mentions: usize,
    pub chat_break_greeting: String,
    pub pacing: Pacing,
    /// Fixed seed for reproducible runs.
    pub seed: Option<u64>,
}

/// Runs sessions and health checks against the network and the generator.
pub struct Orchestrator {
    network: Arc<dyn Network>,
    generator: Arc<dyn TextGenerator>,
    token: String,
    config: SessionConfig,
    aggregator: Aggregator,
    sequencer: Sequencer,
    jobs: Vec<CronJob>,
}

impl Orchestrator {
    pub fn new(
        network: Arc<dyn Network>,
        generator: Arc<dyn TextGenerator>,
        token: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        let aggregator = Aggregator::new(config.search_limit, config.max_candidates);
        let sequencer = Sequencer::new(
            Arc::clone(&generator),
            config.persona_id.clone(),
            config.pacing.candidate,
        );
        Self {
            network,
            generator,
            token: token.into(),
            config,
            aggregator,
            sequencer,
            jobs: Vec::new(),
        }
    }

    /// Scheduled jobs, used to log the next run after each session.
    pub fn with_jobs(mut self, jobs: Vec<CronJob>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Log in and open a fresh session.
    pub async fn authenticate(&self) -> Result<Session, EngagementError> {
        let network = self
            .network
            .authenticate(&self.config.handle, &self.token)
            .await
            .map_err(EngagementError::Auth)?;
        Ok(Session::new(network, &self.config.handle, self.config.seed))
    }

    /// Run one full session.
    ///
    /// Authentication and search failures end the session with an error.
    /// Failures of individual candidates, posts, mentions and follows are
    /// logged and skipped.
    #[tracing::instrument(skip(self), fields(handle = %self.config.handle))]
    pub async fn run_session(&self) -> Result<SessionReport, EngagementError> {
        info!("starting session");
        let mut session = self.authenticate().await?;

        let delay = session.pause(self.config.pacing.session_start).await;
        debug!(delay_ms = delay.as_millis() as u64, "session start delay elapsed");

        let mut report = SessionReport::default();
        for window in self.config.keywords.chunks(self.config.keyword_window.max(1)) {
            let now = Utc::now();
            let since = self.config.since_window.map(|w| now - w);
            let candidates = self
                .aggregator
                .aggregate(&session, window, since, now)
                .await?;
            info!(keywords = ?window, candidates = candidates.len(), "ranked candidates");
            report.merge(self.sequencer.run(&mut session, &candidates).await);
        }

        report.posts_published = self.publish_posts(&mut session).await;

        if self.config.reply_to_mentions {
            report.mentions_answered = self.answer_mentions(&mut session).await;
        }

        self.reset_conversation().await;
        self.log_next_run();

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            followed = report.followed(),
            posts = report.posts_published,
            mentions = report.mentions_answered,
            "session complete"
        );
        Ok(report)
    }

    /// Log in and fetch the account's own profile. Never fails.
    #[tracing::instrument(skip(self), fields(handle = %self.config.handle))]
    pub async fn health_check(&self) -> bool {
        let session = match self.authenticate().await {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "health check failed");
                return false;
            }
        };

        match session.network().get_profile(&self.config.handle).await {
            Ok(profile) => {
                info!(
                    did = %profile.did,
                    followers = profile.followers_count.unwrap_or(0),
                    "health check passed"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "health check failed");
                false
            }
        }
    }

    /// Publish `post_count` original posts on random topics.
    ///
    /// Returns the number published.
    async fn publish_posts(&self, session: &mut Session) -> usize {
        if self.config.post_count > 0 && self.config.topics.is_empty() {
            warn!(
                post_count = self.config.post_count,
                "no topics configured, skipping posts"
            );
            return 0;
        }

        let mut published = 0;
        for slot in 0..self.config.post_count {
            session.pause(self.config.pacing.post).await;
            let topic = &self.config.topics[session.rng().gen_range(0..self.config.topics.len())];
            info!(slot, subject = %topic.subject, tone = %topic.tone, "writing post");

            let subject = format!("post-{}", slot);
            if Isolate
                .contain("post", &subject, self.publish(session, topic))
                .await
                .is_some()
            {
                published += 1;
            }
        }
        published
    }

    async fn publish(&self, session: &Session, topic: &Topic) -> Result<(), EngagementError> {
        let text = self
            .generator
            .generate(&self.config.persona_id, &topic.prompt())
            .await
            .map_err(EngagementError::GenerationFailed)?;

        let posted = session
            .network()
            .post(&fit_post(&text), None)
            .await
            .map_err(|source| EngagementError::ActionFailed {
                action: Action::Post,
                target: topic.subject.clone(),
                source,
            })?;

        info!(uri = %posted.uri, "published post");
        Ok(())
    }

    /// Reply to a random sample of unread mentions and replies, then mark
    /// notifications seen. Returns the number answered.
    async fn answer_mentions(&self, session: &mut Session) -> usize {
        let fetched = session
            .network()
            .list_notifications(NOTIFICATION_FETCH_LIMIT)
            .await
            .map_err(EngagementError::Notifications);
        let Some(notifications) = Isolate.absorb("mentions", "list", fetched) else {
            return 0;
        };

        let mut mentions: Vec<_> = notifications
            .into_iter()
            .filter(|n| !n.is_read && n.reason.expects_reply())
            .filter(|n| n.author_handle != session.handle())
            .collect();

        if mentions.len() > self.config.max_mentions {
            mentions = mentions
                .choose_multiple(session.rng(), self.config.max_mentions)
                .cloned()
                .collect();
        }
        info!(count = mentions.len(), "answering mentions");

        let mut answered = 0;
        for mention in &mentions {
            session.pause(self.config.pacing.candidate).await;
            let target = ReplyTarget::from(mention);
            let replied = Isolate
                .contain("mention", &mention.uri, self.sequencer.reply(session, &target))
                .await;
            if replied.is_some() {
                answered += 1;
                self.sequencer
                    .follow_author(session, &mention.author_handle)
                    .await;
            }
        }

        let seen = session
            .network()
            .mark_notifications_seen()
            .await
            .map_err(EngagementError::Notifications);
        Isolate.absorb("mentions", "mark-seen", seen);

        answered
    }

    /// Start the persona's next conversation from a clean slate.
    async fn reset_conversation(&self) {
        let result = self
            .generator
            .chat_break(&self.config.persona_id, &self.config.chat_break_greeting)
            .await
            .map_err(EngagementError::GenerationFailed);
        if Isolate
            .absorb("chat-break", &self.config.persona_id, result)
            .is_some()
        {
            debug!("reset persona conversation");
        }
    }

    fn log_next_run(&self) {
        match earliest_upcoming(&self.jobs, &Local::now()) {
            NextRun::At { job, at } => {
                info!(job = %job.name, at = %at.to_rfc3339(), "next scheduled session")
            }
            NextRun::FarFuture => info!("no upcoming scheduled session"),
        }
    }
}
