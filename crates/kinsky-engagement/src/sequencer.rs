//! Paced interaction with ranked candidates.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use kinsky_bluesky::{BlueskyError, BlueskyNotification, Embed, PostRef, ReplyRef};
use kinsky_scheduler::Isolate;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{DelayWindow, EngagementError, ScoredCandidate, Session, TextGenerator};

/// Maximum length of a published post, in characters.
const MAX_POST_CHARS: usize = 300;

/// Operations performed against the network, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Like,
    Repost,
    Reply,
    Follow,
    Post,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Like => "like",
            Action::Repost => "repost",
            Action::Reply => "reply",
            Action::Follow => "follow",
            Action::Post => "post",
        };
        f.write_str(name)
    }
}

/// What the account does with a candidate, chosen uniformly at random.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interaction {
    Like,
    Repost,
    Reply,
}

impl Interaction {
    pub const ALL: [Interaction; 3] = [Interaction::Like, Interaction::Repost, Interaction::Reply];

    /// Pick one interaction with equal probability.
    pub fn choose<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

impl From<Interaction> for Action {
    fn from(interaction: Interaction) -> Self {
        match interaction {
            Interaction::Like => Action::Like,
            Interaction::Repost => Action::Repost,
            Interaction::Reply => Action::Reply,
        }
    }
}

impl fmt::Display for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Action::from(*self).fmt(f)
    }
}

/// Progress of a single candidate through a session.
///
/// `Pending → Delayed → Acting → Succeeded | Failed`; no other moves exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateState {
    Pending,
    Delayed,
    Acting,
    Succeeded,
    Failed,
}

impl CandidateState {
    /// Returns true if `next` is a legal successor of this state.
    pub fn can_advance_to(self, next: CandidateState) -> bool {
        use CandidateState::*;
        matches!(
            (self, next),
            (Pending, Delayed) | (Delayed, Acting) | (Acting, Succeeded) | (Acting, Failed)
        )
    }

    /// Move to `next` if the transition is legal.
    ///
    /// An illegal move panics in debug builds and leaves the state unchanged
    /// in release builds.
    pub fn advance(&mut self, next: CandidateState) {
        debug_assert!(
            self.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self,
            next
        );
        if self.can_advance_to(next) {
            *self = next;
        }
    }

    /// Returns true once no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, CandidateState::Succeeded | CandidateState::Failed)
    }
}

/// One pre-drawn step of the sequence: how long to wait, then what to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub delay: Duration,
    pub interaction: Interaction,
}

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateOutcome {
    pub uri: String,
    pub interaction: Interaction,
    pub state: CandidateState,
    pub followed: bool,
}

/// Summary of a session's interactions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub outcomes: Vec<CandidateOutcome>,
    pub posts_published: usize,
    pub mentions_answered: usize,
}

impl SessionReport {
    /// Candidates whose action succeeded.
    pub fn succeeded(&self) -> usize {
        self.count(CandidateState::Succeeded)
    }

    /// Candidates whose action failed.
    pub fn failed(&self) -> usize {
        self.count(CandidateState::Failed)
    }

    /// Authors followed after a successful action.
    pub fn followed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.followed).count()
    }

    /// Append another report's outcomes and counters.
    pub fn merge(&mut self, other: SessionReport) {
        self.outcomes.extend(other.outcomes);
        self.posts_published += other.posts_published;
        self.mentions_answered += other.mentions_answered;
    }

    fn count(&self, state: CandidateState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }
}

/// A post to reply to, from search results or from a notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyTarget {
    pub uri: String,
    pub cid: String,
    pub author_handle: String,
    pub text: Option<String>,
    pub embed: Option<Embed>,
    /// Thread root, when the target is itself a reply.
    pub root: Option<PostRef>,
}

impl ReplyTarget {
    /// Thread references for replying to this target.
    pub fn reply_refs(&self) -> ReplyRef {
        let parent = PostRef {
            uri: self.uri.clone(),
            cid: self.cid.clone(),
        };
        ReplyRef {
            root: self.root.clone().unwrap_or_else(|| parent.clone()),
            parent,
        }
    }
}

impl From<&ScoredCandidate> for ReplyTarget {
    fn from(candidate: &ScoredCandidate) -> Self {
        Self {
            uri: candidate.post.uri.clone(),
            cid: candidate.post.cid.clone(),
            author_handle: candidate.author_handle.clone(),
            text: candidate.post.text.clone(),
            embed: candidate.post.embed.clone(),
            root: None,
        }
    }
}

impl From<&BlueskyNotification> for ReplyTarget {
    fn from(notification: &BlueskyNotification) -> Self {
        Self {
            uri: notification.uri.clone(),
            cid: notification.cid.clone(),
            author_handle: notification.author_handle.clone(),
            text: notification.text.clone(),
            embed: None,
            root: notification.root.clone(),
        }
    }
}

/// Build the generator prompt for replying to `target`.
pub fn reply_prompt(target: &ReplyTarget) -> String {
    let mut prompt = format!(
        "@{} wrote on Bluesky: \"{}\"",
        target.author_handle,
        target.text.as_deref().unwrap_or("").trim()
    );
    if let Some(embed) = &target.embed {
        prompt.push_str(&format!("\nThe post includes {}.", embed.describe()));
    }
    prompt.push_str(&format!(
        "\nWrite a short reply to them, under {} characters.",
        MAX_POST_CHARS
    ));
    prompt
}

/// Shorten generated text to fit in a single post.
pub(crate) fn fit_post(text: &str) -> String {
    if text.chars().count() <= MAX_POST_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(MAX_POST_CHARS - 3).collect();
    format!("{}...", truncated.trim_end())
}

/// Walks candidates one at a time: wait, act, then follow the author.
pub struct Sequencer {
    generator: Arc<dyn TextGenerator>,
    persona_id: String,
    delay: DelayWindow,
}

impl Sequencer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        persona_id: impl Into<String>,
        delay: DelayWindow,
    ) -> Self {
        Self {
            generator,
            persona_id: persona_id.into(),
            delay,
        }
    }

    /// Draw the next delay and action from `rng`.
    pub fn next_step<R: Rng + ?Sized>(&self, rng: &mut R) -> Step {
        let delay = self.delay.sample(rng);
        let interaction = Interaction::choose(rng);
        Step { delay, interaction }
    }

    /// Interact with every candidate in order.
    ///
    /// A failing candidate is recorded and skipped; it never stops the run.
    #[tracing::instrument(skip(self, session, candidates), fields(candidates = candidates.len()))]
    pub async fn run(&self, session: &mut Session, candidates: &[ScoredCandidate]) -> SessionReport {
        let mut report = SessionReport::default();

        for candidate in candidates {
            let mut state = CandidateState::Pending;
            let step = self.next_step(session.rng());
            if !step.delay.is_zero() {
                tokio::time::sleep(step.delay).await;
            }
            state.advance(CandidateState::Delayed);

            info!(
                interaction = %step.interaction,
                url = %candidate.url,
                score = candidate.value,
                "interacting with post"
            );
            state.advance(CandidateState::Acting);

            let target = ReplyTarget::from(candidate);
            let result = self.act(session, step.interaction, &target).await;

            let mut followed = false;
            match Isolate.absorb("candidate", &candidate.url, result) {
                Some(()) => {
                    state.advance(CandidateState::Succeeded);
                    followed = self.follow_author(session, &candidate.author_handle).await;
                }
                None => state.advance(CandidateState::Failed),
            }

            report.outcomes.push(CandidateOutcome {
                uri: candidate.post.uri.clone(),
                interaction: step.interaction,
                state,
                followed,
            });
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            "finished candidates"
        );
        report
    }

    async fn act(
        &self,
        session: &Session,
        interaction: Interaction,
        target: &ReplyTarget,
    ) -> Result<(), EngagementError> {
        let post_ref = PostRef {
            uri: target.uri.clone(),
            cid: target.cid.clone(),
        };
        let failed = |source: BlueskyError| EngagementError::ActionFailed {
            action: interaction.into(),
            target: target.uri.clone(),
            source,
        };

        match interaction {
            Interaction::Like => session.network().like(&post_ref).await.map_err(failed),
            Interaction::Repost => session.network().repost(&post_ref).await.map_err(failed),
            Interaction::Reply => self.reply(session, target).await.map(|_| ()),
        }
    }

    /// Generate a reply to `target` and publish it in the right thread.
    pub async fn reply(
        &self,
        session: &Session,
        target: &ReplyTarget,
    ) -> Result<PostRef, EngagementError> {
        let prompt = reply_prompt(target);
        let text = self
            .generator
            .generate(&self.persona_id, &prompt)
            .await
            .map_err(EngagementError::GenerationFailed)?;

        let refs = target.reply_refs();
        let posted = session
            .network()
            .post(&fit_post(&text), Some(&refs))
            .await
            .map_err(|source| EngagementError::ActionFailed {
                action: Action::Reply,
                target: target.uri.clone(),
                source,
            })?;

        debug!(parent = %target.uri, reply = %posted.uri, "posted reply");
        Ok(posted)
    }

    /// Resolve and follow `handle`. Never follows the session's own account.
    ///
    /// Failures are logged and reported as `false`.
    pub async fn follow_author(&self, session: &Session, handle: &str) -> bool {
        if handle == session.handle() {
            debug!(handle, "skipping follow of own account");
            return false;
        }

        let network = session.network();
        let followed = Isolate
            .contain("follow", handle, async {
                let did = network
                    .resolve_identity(handle)
                    .await
                    .map_err(|source| EngagementError::ActionFailed {
                        action: Action::Follow,
                        target: handle.to_string(),
                        source,
                    })?;
                network
                    .follow(&did)
                    .await
                    .map_err(|source| EngagementError::ActionFailed {
                        action: Action::Follow,
                        target: handle.to_string(),
                        source,
                    })
            })
            .await
            .is_some();

        if followed {
            info!(handle, "followed author");
        }
        followed
    }
}
