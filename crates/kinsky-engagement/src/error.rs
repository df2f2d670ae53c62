//! Error types for the engagement pipeline.

use kinsky_bluesky::BlueskyError;
use kinsky_kindroid::KindroidError;
use thiserror::Error;

use crate::Action;

/// Errors that can occur during an engagement session.
#[derive(Debug, Error)]
pub enum EngagementError {
    /// Logging in to the network failed; the session cannot start.
    #[error("authentication failed: {0}")]
    Auth(#[source] BlueskyError),

    /// A keyword search failed; the whole aggregation is aborted.
    #[error("search for {keyword:?} failed: {source}")]
    SearchFailed {
        keyword: String,
        #[source]
        source: BlueskyError,
    },

    /// A like, repost, reply, follow or post failed.
    #[error("{action} on {target} failed: {source}")]
    ActionFailed {
        action: Action,
        target: String,
        #[source]
        source: BlueskyError,
    },

    /// Fetching or acknowledging notifications failed.
    #[error("notification access failed: {0}")]
    Notifications(#[source] BlueskyError),

    /// The text generator failed.
    #[error("text generation failed: {0}")]
    GenerationFailed(#[source] KindroidError),
}
