//! Collaborator seams: the social network and the text generator.
//!
//! The pipeline only talks to these traits, so sessions can be driven by the
//! live Bluesky and Kindroid clients or by in-memory fakes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use kinsky_bluesky::{
    BlueskyClient, BlueskyError, BlueskyNotification, Post, PostRef, Profile, ReplyRef,
};
use kinsky_kindroid::{KindroidClient, KindroidError};

/// Opens authenticated sessions on the social network.
#[async_trait]
pub trait Network: Send + Sync {
    /// Log in and return a fresh session.
    async fn authenticate(
        &self,
        handle: &str,
        token: &str,
    ) -> Result<Arc<dyn NetworkSession>, BlueskyError>;
}

/// An authenticated connection to the social network.
#[async_trait]
pub trait NetworkSession: Send + Sync {
    /// Search posts matching `keyword` indexed after `since`.
    async fn search(
        &self,
        keyword: &str,
        limit: u8,
        since: DateTime<Utc>,
    ) -> Result<Vec<Post>, BlueskyError>;

    /// Like a post.
    async fn like(&self, target: &PostRef) -> Result<(), BlueskyError>;

    /// Repost a post.
    async fn repost(&self, target: &PostRef) -> Result<(), BlueskyError>;

    /// Publish a post, threaded under `reply` when given.
    async fn post(&self, text: &str, reply: Option<&ReplyRef>) -> Result<PostRef, BlueskyError>;

    /// Resolve a handle to a DID.
    async fn resolve_identity(&self, handle: &str) -> Result<String, BlueskyError>;

    /// Follow an account by DID.
    async fn follow(&self, did: &str) -> Result<(), BlueskyError>;

    /// Fetch recent notifications, read and unread.
    async fn list_notifications(&self, limit: u8)
    -> Result<Vec<BlueskyNotification>, BlueskyError>;

    /// Mark all notifications as seen.
    async fn mark_notifications_seen(&self) -> Result<(), BlueskyError>;

    /// Fetch a profile by handle or DID.
    async fn get_profile(&self, actor: &str) -> Result<Profile, BlueskyError>;
}

/// Generates text in the voice of a persona.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Send `prompt` to the persona and return its reply.
    async fn generate(&self, persona_id: &str, prompt: &str) -> Result<String, KindroidError>;

    /// Reset the persona's conversation with a greeting.
    async fn chat_break(&self, persona_id: &str, greeting: &str) -> Result<(), KindroidError>;
}

/// [`Network`] backed by a Bluesky PDS.
#[derive(Debug, Clone)]
pub struct BlueskyNetwork {
    pds_url: String,
}

impl BlueskyNetwork {
    /// Connect to the given PDS.
    pub fn new(pds_url: impl Into<String>) -> Self {
        Self {
            pds_url: pds_url.into(),
        }
    }
}

#[async_trait]
impl Network for BlueskyNetwork {
    async fn authenticate(
        &self,
        handle: &str,
        token: &str,
    ) -> Result<Arc<dyn NetworkSession>, BlueskyError> {
        let client = BlueskyClient::login(&self.pds_url, handle, token).await?;
        Ok(Arc::new(client))
    }
}

#[async_trait]
impl NetworkSession for BlueskyClient {
    async fn search(
        &self,
        keyword: &str,
        limit: u8,
        since: DateTime<Utc>,
    ) -> Result<Vec<Post>, BlueskyError> {
        let since = since.to_rfc3339_opts(SecondsFormat::Millis, true);
        self.search_posts(keyword, Some(&since), Some(limit)).await
    }

    async fn like(&self, target: &PostRef) -> Result<(), BlueskyError> {
        BlueskyClient::like(self, &target.uri, &target.cid).await?;
        Ok(())
    }

    async fn repost(&self, target: &PostRef) -> Result<(), BlueskyError> {
        BlueskyClient::repost(self, &target.uri, &target.cid).await?;
        Ok(())
    }

    async fn post(&self, text: &str, reply: Option<&ReplyRef>) -> Result<PostRef, BlueskyError> {
        BlueskyClient::post(self, text, reply).await
    }

    async fn resolve_identity(&self, handle: &str) -> Result<String, BlueskyError> {
        self.resolve_handle(handle).await
    }

    async fn follow(&self, did: &str) -> Result<(), BlueskyError> {
        BlueskyClient::follow(self, did).await?;
        Ok(())
    }

    async fn list_notifications(
        &self,
        limit: u8,
    ) -> Result<Vec<BlueskyNotification>, BlueskyError> {
        self.get_notifications(Some(limit)).await
    }

    async fn mark_notifications_seen(&self) -> Result<(), BlueskyError> {
        self.update_seen().await
    }

    async fn get_profile(&self, actor: &str) -> Result<Profile, BlueskyError> {
        BlueskyClient::get_profile(self, actor).await
    }
}

#[async_trait]
impl TextGenerator for KindroidClient {
    async fn generate(&self, persona_id: &str, prompt: &str) -> Result<String, KindroidError> {
        self.send_message(persona_id, prompt).await
    }

    async fn chat_break(&self, persona_id: &str, greeting: &str) -> Result<(), KindroidError> {
        KindroidClient::chat_break(self, persona_id, greeting).await
    }
}
