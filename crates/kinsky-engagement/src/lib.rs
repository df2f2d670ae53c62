//! Engagement pipeline for Kinsky.
//!
//! This crate provides:
//! - The engagement [`score`] used to rank posts
//! - Keyword search aggregation with de-duplication and ranking
//! - The interaction sequencer (paced like / repost / reply, then follow)
//! - The session orchestrator run by every scheduled trigger
//! - Collaborator traits for the social network and the text generator

mod aggregator;
mod collaborators;
mod error;
mod orchestrator;
mod scorer;
mod sequencer;
mod session;

pub use aggregator::{Aggregator, DEFAULT_SINCE_HOURS, ScoredCandidate, rank};
pub use collaborators::{BlueskyNetwork, Network, NetworkSession, TextGenerator};
pub use error::EngagementError;
pub use orchestrator::{Orchestrator, SessionConfig, Topic};
pub use scorer::{RECENCY_HORIZON_DAYS, score};
pub use sequencer::{
    Action, CandidateOutcome, CandidateState, Interaction, ReplyTarget, Sequencer, SessionReport,
    Step, reply_prompt,
};
pub use session::{DelayWindow, Pacing, Session};
