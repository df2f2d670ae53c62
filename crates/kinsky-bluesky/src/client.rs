//! Bluesky client implementation.

use atrium_api::app::bsky::feed::like::RecordData as LikeRecordData;
use atrium_api::app::bsky::feed::post::RecordData as PostRecordData;
use atrium_api::app::bsky::feed::repost::RecordData as RepostRecordData;
use atrium_api::com::atproto::repo::strong_ref::MainData as StrongRefData;
use atrium_api::types::string::{Cid, Datetime};
use bsky_sdk::BskyAgent;
use bsky_sdk::agent::config::Config as BskyConfig;
use bsky_sdk::rich_text::RichText;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use super::types::{
    BlueskyNotification, Embed, NotificationReason, Post, PostRef, Profile, ReplyRef,
};

/// Default PDS for bsky.social accounts.
pub const DEFAULT_PDS_URL: &str = "https://bsky.social";

/// Errors that can occur when interacting with Bluesky.
#[derive(Debug, Error)]
pub enum BlueskyError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("rate limited{}", endpoint.as_ref().map(|e| format!(" on {}", e)).unwrap_or_default())]
    RateLimited {
        /// The endpoint that was rate limited (optional).
        endpoint: Option<String>,
    },
}

/// Map an XRPC failure, recognising rate limits.
fn api_error(endpoint: &str, error: impl std::fmt::Display) -> BlueskyError {
    let error_str = error.to_string();
    if error_str.contains("RateLimitExceeded") || error_str.contains("429") {
        BlueskyError::RateLimited {
            endpoint: Some(endpoint.to_string()),
        }
    } else {
        BlueskyError::Api(error_str)
    }
}

/// An authenticated Bluesky session.
pub struct BlueskyClient {
    agent: BskyAgent,
}

impl BlueskyClient {
    /// Create a new Bluesky client and authenticate.
    pub async fn login(
        pds_url: &str,
        handle: &str,
        app_password: &str,
    ) -> Result<Self, BlueskyError> {
        // Build agent with custom PDS URL if provided
        let agent = if pds_url == DEFAULT_PDS_URL {
            BskyAgent::builder()
                .build()
                .await
                .map_err(|e| BlueskyError::Auth(e.to_string()))?
        } else {
            let config = BskyConfig {
                endpoint: pds_url.to_string(),
                ..Default::default()
            };
            BskyAgent::builder()
                .config(config)
                .build()
                .await
                .map_err(|e| BlueskyError::Auth(e.to_string()))?
        };

        agent
            .login(handle, app_password)
            .await
            .map_err(|e| BlueskyError::Auth(e.to_string()))?;

        info!(handle = %handle, pds = %pds_url, "authenticated with bluesky");

        Ok(Self { agent })
    }

    /// Search for posts across Bluesky.
    ///
    /// `since` is an RFC 3339 timestamp; only posts indexed after it are returned.
    pub async fn search_posts(
        &self,
        query: &str,
        since: Option<&str>,
        limit: Option<u8>,
    ) -> Result<Vec<Post>, BlueskyError> {
        let limit = limit
            .map(|l| l.clamp(1, 100).try_into())
            .transpose()
            .map_err(|e| BlueskyError::Api(format!("invalid limit: {}", e)))?;

        let params = atrium_api::app::bsky::feed::search_posts::ParametersData {
            author: None,
            cursor: None,
            domain: None,
            lang: None,
            limit,
            mentions: None,
            q: query.to_string(),
            since: since.map(|s| s.to_string()),
            sort: None,
            tag: None,
            until: None,
            url: None,
        };

        let output = self
            .agent
            .api
            .app
            .bsky
            .feed
            .search_posts(params.into())
            .await
            .map_err(|e| api_error("searchPosts", e))?;

        let posts: Vec<Post> = output
            .posts
            .iter()
            .map(|post| Post {
                uri: post.uri.clone(),
                cid: post.cid.as_ref().to_string(),
                author_did: post.author.did.to_string(),
                author_handle: post.author.handle.to_string(),
                text: extract_post_text(&post.record),
                like_count: post.like_count,
                reply_count: post.reply_count,
                repost_count: post.repost_count,
                view_count: None,
                author_followers: None,
                indexed_at: chrono::DateTime::parse_from_rfc3339(post.indexed_at.as_str())
                    .ok()
                    .map(|t| t.with_timezone(&Utc)),
                embed: post
                    .embed
                    .as_ref()
                    .and_then(|e| serde_json::to_value(e).ok())
                    .and_then(Embed::from_view_json),
            })
            .collect();

        debug!(query = %query, count = posts.len(), "searched posts");

        Ok(posts)
    }

    /// Like a post.
    pub async fn like(&self, uri: &str, cid: &str) -> Result<String, BlueskyError> {
        let record_data = LikeRecordData {
            created_at: Datetime::now(),
            subject: strong_ref(uri, cid)?.into(),
            via: None,
        };

        let output = self
            .agent
            .create_record(record_data)
            .await
            .map_err(|e| BlueskyError::Api(e.to_string()))?;

        debug!(like_uri = %output.uri, "liked bluesky post");

        Ok(output.uri.to_string())
    }

    /// Repost a post.
    pub async fn repost(&self, uri: &str, cid: &str) -> Result<String, BlueskyError> {
        let record_data = RepostRecordData {
            created_at: Datetime::now(),
            subject: strong_ref(uri, cid)?.into(),
            via: None,
        };

        let output = self
            .agent
            .create_record(record_data)
            .await
            .map_err(|e| BlueskyError::Api(e.to_string()))?;

        debug!(repost_uri = %output.uri, "reposted bluesky post");

        Ok(output.uri.to_string())
    }

    /// Create a post, optionally as a reply.
    ///
    /// Mentions (@handle) and URLs are automatically detected and linked.
    pub async fn post(&self, text: &str, reply: Option<&ReplyRef>) -> Result<PostRef, BlueskyError> {
        let rt = RichText::new_with_detect_facets(text)
            .await
            .map_err(|e| BlueskyError::Api(e.to_string()))?;

        let reply = match reply {
            Some(reply) => Some(
                atrium_api::app::bsky::feed::post::ReplyRefData {
                    parent: strong_ref(&reply.parent.uri, &reply.parent.cid)?.into(),
                    root: strong_ref(&reply.root.uri, &reply.root.cid)?.into(),
                }
                .into(),
            ),
            None => None,
        };

        let record_data = PostRecordData {
            created_at: Datetime::now(),
            embed: None,
            entities: None,
            facets: rt.facets,
            labels: None,
            langs: None,
            reply,
            tags: None,
            text: rt.text,
        };

        let output = self
            .agent
            .create_record(record_data)
            .await
            .map_err(|e| BlueskyError::Api(e.to_string()))?;

        debug!(uri = %output.uri, "created bluesky post");

        Ok(PostRef {
            uri: output.uri.to_string(),
            cid: output.cid.as_ref().to_string(),
        })
    }

    /// Resolve a handle to a DID.
    pub async fn resolve_handle(&self, handle: &str) -> Result<String, BlueskyError> {
        let resolved = self
            .agent
            .api
            .com
            .atproto
            .identity
            .resolve_handle(
                atrium_api::com::atproto::identity::resolve_handle::ParametersData {
                    handle: handle
                        .parse()
                        .map_err(|e| BlueskyError::Api(format!("invalid handle: {}", e)))?,
                }
                .into(),
            )
            .await
            .map_err(|e| api_error("resolveHandle", e))?;

        Ok(resolved.did.to_string())
    }

    /// Follow a user by DID.
    pub async fn follow(&self, did: &str) -> Result<String, BlueskyError> {
        let subject: atrium_api::types::string::Did = did
            .parse()
            .map_err(|e| BlueskyError::Api(format!("invalid DID: {}", e)))?;

        let record_data = atrium_api::app::bsky::graph::follow::RecordData {
            created_at: Datetime::now(),
            subject,
        };

        let output = self
            .agent
            .create_record(record_data)
            .await
            .map_err(|e| BlueskyError::Api(e.to_string()))?;

        debug!(follow_uri = %output.uri, subject = %did, "followed user");

        Ok(output.uri.to_string())
    }

    /// Get recent notifications, read and unread.
    pub async fn get_notifications(
        &self,
        limit: Option<u8>,
    ) -> Result<Vec<BlueskyNotification>, BlueskyError> {
        let limit = limit
            .unwrap_or(50)
            .clamp(1, 100)
            .try_into()
            .map_err(|e| BlueskyError::Api(format!("invalid limit: {}", e)))?;

        let params = atrium_api::app::bsky::notification::list_notifications::ParametersData {
            cursor: None,
            limit: Some(limit),
            priority: None,
            reasons: None,
            seen_at: None,
        };

        let output = self
            .agent
            .api
            .app
            .bsky
            .notification
            .list_notifications(params.into())
            .await
            .map_err(|e| api_error("listNotifications", e))?;

        let mut notifications = Vec::new();
        for notif in &output.notifications {
            let reason = match NotificationReason::parse(&notif.reason) {
                Some(r) => r,
                None => {
                    debug!(reason = %notif.reason, "unknown notification reason, skipping");
                    continue;
                }
            };

            let (text, root) = extract_post_data(&notif.record);

            notifications.push(BlueskyNotification {
                reason,
                author_did: notif.author.did.to_string(),
                author_handle: notif.author.handle.to_string(),
                text,
                uri: notif.uri.clone(),
                cid: notif.cid.as_ref().to_string(),
                root,
                is_read: notif.is_read,
            });
        }

        debug!(count = notifications.len(), "fetched notifications");

        Ok(notifications)
    }

    /// Mark all notifications up to now as seen.
    pub async fn update_seen(&self) -> Result<(), BlueskyError> {
        self.agent
            .api
            .app
            .bsky
            .notification
            .update_seen(
                atrium_api::app::bsky::notification::update_seen::InputData {
                    seen_at: Datetime::now(),
                }
                .into(),
            )
            .await
            .map_err(|e| api_error("updateSeen", e))?;

        debug!("marked notifications seen");
        Ok(())
    }

    /// Get a user's profile by DID or handle.
    pub async fn get_profile(&self, actor: &str) -> Result<Profile, BlueskyError> {
        let params = atrium_api::app::bsky::actor::get_profile::ParametersData {
            actor: actor
                .parse()
                .map_err(|e| BlueskyError::Api(format!("invalid actor: {}", e)))?,
        };

        let output = self
            .agent
            .api
            .app
            .bsky
            .actor
            .get_profile(params.into())
            .await
            .map_err(|e| api_error("getProfile", e))?;

        debug!(actor = %actor, handle = %output.handle.as_str(), "fetched profile");

        Ok(Profile {
            did: output.did.to_string(),
            handle: output.handle.to_string(),
            display_name: output.display_name.clone(),
            followers_count: output.followers_count,
            follows_count: output.follows_count,
            posts_count: output.posts_count,
        })
    }
}

/// Build a strong reference, validating the CID.
fn strong_ref(
    uri: &str,
    cid: &str,
) -> Result<atrium_api::com::atproto::repo::strong_ref::Main, BlueskyError> {
    let cid: Cid = cid
        .parse()
        .map_err(|e| BlueskyError::Api(format!("invalid CID: {}", e)))?;
    Ok(StrongRefData {
        cid,
        uri: uri.to_string(),
    }
    .into())
}

/// Extract post text from a record.
fn extract_post_text(record: &atrium_api::types::Unknown) -> Option<String> {
    serde_json::from_value::<DeserPostRecord>(
        serde_json::to_value(record).unwrap_or(serde_json::Value::Null),
    )
    .ok()
    .map(|p| p.text)
}

/// Extract post text and the thread root from a record.
fn extract_post_data(record: &atrium_api::types::Unknown) -> (Option<String>, Option<PostRef>) {
    match serde_json::from_value::<DeserPostRecord>(
        serde_json::to_value(record).unwrap_or(serde_json::Value::Null),
    ) {
        Ok(post) => {
            let root = post.reply.map(|reply| PostRef {
                uri: reply.root.uri,
                cid: reply.root.cid,
            });
            (Some(post.text), root)
        }
        Err(_) => (None, None),
    }
}

#[derive(Debug, serde::Deserialize)]
struct DeserPostRecord {
    text: String,
    reply: Option<DeserReplyRef>,
}

#[derive(Debug, serde::Deserialize)]
struct DeserReplyRef {
    root: DeserStrongRef,
}

#[derive(Debug, serde::Deserialize)]
struct DeserStrongRef {
    uri: String,
    cid: String,
}
