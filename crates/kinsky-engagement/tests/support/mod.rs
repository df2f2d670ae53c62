//! In-memory collaborators for driving sessions without a network.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use kinsky_bluesky::{
    BlueskyError, BlueskyNotification, NotificationReason, Post, PostRef, Profile, ReplyRef,
};
use kinsky_engagement::{Network, NetworkSession, TextGenerator};
use kinsky_kindroid::KindroidError;

/// Side effects observed by the fake network, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Search {
        keyword: String,
        limit: u8,
        since: DateTime<Utc>,
    },
    Like(String),
    Repost(String),
    Post {
        text: String,
        reply: Option<ReplyRef>,
    },
    Resolve(String),
    Follow(String),
    ListNotifications,
    MarkSeen,
    GetProfile(String),
}

#[derive(Default)]
pub struct FakeSession {
    pub results: HashMap<String, Vec<Post>>,
    pub failing_keywords: HashSet<String>,
    pub notifications: Vec<BlueskyNotification>,
    pub fail_likes: bool,
    pub fail_follows: bool,
    pub fail_profile: bool,
    pub fail_notifications: bool,
    pub calls: Mutex<Vec<Call>>,
}

impl FakeSession {
    pub fn with_results(mut self, keyword: &str, posts: Vec<Post>) -> Self {
        self.results.insert(keyword.to_string(), posts);
        self
    }

    pub fn failing(mut self, keyword: &str) -> Self {
        self.failing_keywords.insert(keyword.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn searches(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Search { keyword, .. } => Some(keyword),
                _ => None,
            })
            .collect()
    }

    pub fn posts(&self) -> Vec<(String, Option<ReplyRef>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Post { text, reply } => Some((text, reply)),
                _ => None,
            })
            .collect()
    }

    pub fn follows(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Follow(did) => Some(did),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matches(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

fn api_error(what: &str) -> BlueskyError {
    BlueskyError::Api(format!("{} unavailable", what))
}

#[async_trait]
impl NetworkSession for FakeSession {
    async fn search(
        &self,
        keyword: &str,
        limit: u8,
        since: DateTime<Utc>,
    ) -> Result<Vec<Post>, BlueskyError> {
        self.record(Call::Search {
            keyword: keyword.to_string(),
            limit,
            since,
        });
        if self.failing_keywords.contains(keyword) {
            return Err(api_error("search"));
        }
        Ok(self.results.get(keyword).cloned().unwrap_or_default())
    }

    async fn like(&self, target: &PostRef) -> Result<(), BlueskyError> {
        self.record(Call::Like(target.uri.clone()));
        if self.fail_likes {
            return Err(api_error("like"));
        }
        Ok(())
    }

    async fn repost(&self, target: &PostRef) -> Result<(), BlueskyError> {
        self.record(Call::Repost(target.uri.clone()));
        Ok(())
    }

    async fn post(&self, text: &str, reply: Option<&ReplyRef>) -> Result<PostRef, BlueskyError> {
        self.record(Call::Post {
            text: text.to_string(),
            reply: reply.cloned(),
        });
        Ok(PostRef {
            uri: "at://did:plc:me/app.bsky.feed.post/new".to_string(),
            cid: "cid-new".to_string(),
        })
    }

    async fn resolve_identity(&self, handle: &str) -> Result<String, BlueskyError> {
        self.record(Call::Resolve(handle.to_string()));
        Ok(format!("did:plc:{}", handle.split('.').next().unwrap_or(handle)))
    }

    async fn follow(&self, did: &str) -> Result<(), BlueskyError> {
        self.record(Call::Follow(did.to_string()));
        if self.fail_follows {
            return Err(api_error("follow"));
        }
        Ok(())
    }

    async fn list_notifications(
        &self,
        _limit: u8,
    ) -> Result<Vec<BlueskyNotification>, BlueskyError> {
        self.record(Call::ListNotifications);
        if self.fail_notifications {
            return Err(api_error("notifications"));
        }
        Ok(self.notifications.clone())
    }

    async fn mark_notifications_seen(&self) -> Result<(), BlueskyError> {
        self.record(Call::MarkSeen);
        Ok(())
    }

    async fn get_profile(&self, actor: &str) -> Result<Profile, BlueskyError> {
        self.record(Call::GetProfile(actor.to_string()));
        if self.fail_profile {
            return Err(api_error("profile"));
        }
        Ok(Profile {
            did: "did:plc:me".to_string(),
            handle: actor.to_string(),
            display_name: None,
            followers_count: Some(12),
            follows_count: Some(34),
            posts_count: Some(56),
        })
    }
}

/// Hands out the same [`FakeSession`] on every login.
pub struct FakeNetwork {
    pub session: Arc<FakeSession>,
    pub fail_auth: bool,
    pub logins: AtomicUsize,
}

impl FakeNetwork {
    pub fn new(session: FakeSession) -> Self {
        Self {
            session: Arc::new(session),
            fail_auth: false,
            logins: AtomicUsize::new(0),
        }
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn authenticate(
        &self,
        _handle: &str,
        token: &str,
    ) -> Result<Arc<dyn NetworkSession>, BlueskyError> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.fail_auth || token.is_empty() {
            return Err(BlueskyError::Auth("invalid app password".to_string()));
        }
        Ok(self.session.clone())
    }
}

/// Echoes prompts back, failing any prompt that contains a configured marker.
#[derive(Default)]
pub struct FakeGenerator {
    pub fail_markers: Vec<String>,
    pub prompts: Mutex<Vec<String>>,
    pub chat_breaks: AtomicUsize,
}

impl FakeGenerator {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_markers: vec![marker.to_string()],
            ..Self::default()
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn chat_breaks(&self) -> usize {
        self.chat_breaks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, _persona_id: &str, prompt: &str) -> Result<String, KindroidError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail_markers.iter().any(|m| prompt.contains(m.as_str())) {
            return Err(KindroidError::EmptyResponse("/send-message".to_string()));
        }
        Ok(format!("generated: {}", prompt.lines().next().unwrap_or("")))
    }

    async fn chat_break(&self, _persona_id: &str, _greeting: &str) -> Result<(), KindroidError> {
        self.chat_breaks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 15, 0, 0).single().unwrap()
}

pub fn post(rkey: &str, handle: &str, likes: i64) -> Post {
    Post {
        uri: format!("at://did:plc:{}/app.bsky.feed.post/{}", handle, rkey),
        cid: format!("cid-{}", rkey),
        author_did: format!("did:plc:{}", handle),
        author_handle: format!("{}.bsky.social", handle),
        text: Some(format!("post {} by {}", rkey, handle)),
        like_count: Some(likes),
        reply_count: Some(0),
        repost_count: Some(0),
        view_count: None,
        author_followers: Some(100),
        indexed_at: Some(now()),
        embed: None,
    }
}

pub fn notification(
    reason: NotificationReason,
    handle: &str,
    rkey: &str,
    is_read: bool,
) -> BlueskyNotification {
    BlueskyNotification {
        reason,
        author_did: format!("did:plc:{}", handle),
        author_handle: format!("{}.bsky.social", handle),
        text: Some(format!("hey @me, {} here", handle)),
        uri: format!("at://did:plc:{}/app.bsky.feed.post/{}", handle, rkey),
        cid: format!("cid-{}", rkey),
        root: None,
        is_read,
    }
}
