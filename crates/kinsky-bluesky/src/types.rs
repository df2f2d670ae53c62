//! Bluesky API types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to a Bluesky post (needed for likes, reposts and threading).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRef {
    /// AT URI (e.g., at://did:plc:xxx/app.bsky.feed.post/xxx)
    pub uri: String,
    /// Content hash
    pub cid: String,
}

/// Thread references for a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    /// Root of the thread.
    pub root: PostRef,
    /// Post being directly replied to.
    pub parent: PostRef,
}

/// Media attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Embed {
    /// Image attachments, described by their alt text.
    Images { alts: Vec<String> },
    /// An external link card.
    External {
        uri: String,
        title: String,
        description: String,
    },
}

impl Embed {
    /// Extract the media embed from a serialized `app.bsky.feed.defs#postView` embed.
    ///
    /// Record quotes carry no media and yield `None`; record-with-media quotes
    /// yield their media part.
    pub fn from_view_json(value: serde_json::Value) -> Option<Self> {
        match serde_json::from_value::<DeserEmbed>(value).ok()? {
            DeserEmbed::Images { images } => Some(Embed::Images {
                alts: images.into_iter().map(|i| i.alt).collect(),
            }),
            DeserEmbed::External { external } => Some(Embed::External {
                uri: external.uri,
                title: external.title,
                description: external.description,
            }),
            DeserEmbed::RecordWithMedia { media } => Self::from_view_json(media),
            DeserEmbed::Other => None,
        }
    }

    /// Plain-text description suitable for a prompt.
    pub fn describe(&self) -> String {
        match self {
            Embed::Images { alts } => {
                let described: Vec<&str> = alts
                    .iter()
                    .map(|a| a.trim())
                    .filter(|a| !a.is_empty())
                    .collect();
                if described.is_empty() {
                    format!("{} attached image(s) without descriptions", alts.len())
                } else {
                    format!("attached image(s): {}", described.join("; "))
                }
            }
            Embed::External {
                uri,
                title,
                description,
            } => {
                if description.is_empty() {
                    format!("linked page \"{}\" ({})", title, uri)
                } else {
                    format!("linked page \"{}\" ({}): {}", title, uri, description)
                }
            }
        }
    }
}

/// A post returned by search, with the engagement fields used for ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// AT URI of the post
    pub uri: String,
    /// Content hash
    pub cid: String,
    /// DID of the author
    pub author_did: String,
    /// Handle of the author
    pub author_handle: String,
    /// Post text
    pub text: Option<String>,
    /// Number of likes
    pub like_count: Option<i64>,
    /// Number of replies
    pub reply_count: Option<i64>,
    /// Number of reposts
    pub repost_count: Option<i64>,
    /// Number of views (Bluesky does not report views; kept for scoring)
    pub view_count: Option<i64>,
    /// Author follower count, when the view includes it
    pub author_followers: Option<i64>,
    /// When the post was indexed
    pub indexed_at: Option<DateTime<Utc>>,
    /// Attached media
    pub embed: Option<Embed>,
}

impl Post {
    /// Record key (last URI segment).
    pub fn rkey(&self) -> &str {
        self.uri.rsplit('/').next().unwrap_or(&self.uri)
    }

    /// Web URL of the post on bsky.app.
    pub fn web_url(&self) -> String {
        format!(
            "https://bsky.app/profile/{}/post/{}",
            self.author_handle,
            self.rkey()
        )
    }
}

/// A notification received from Bluesky.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueskyNotification {
    /// Type of notification
    pub reason: NotificationReason,
    /// DID of the notification author
    pub author_did: String,
    /// Handle of the notification author
    pub author_handle: String,
    /// Text content (for mentions, replies, quotes)
    pub text: Option<String>,
    /// AT URI of the notification subject
    pub uri: String,
    /// Content hash
    pub cid: String,
    /// Root post reference (for threading replies)
    pub root: Option<PostRef>,
    /// Whether the notification was already seen
    pub is_read: bool,
}

/// Reason for a Bluesky notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationReason {
    /// Someone mentioned this account
    Mention,
    /// Someone replied to this account's post
    Reply,
    /// Someone followed this account
    Follow,
    /// Someone liked this account's post
    Like,
    /// Someone reposted this account's post
    Repost,
    /// Someone quoted this account's post
    Quote,
}

impl NotificationReason {
    /// Parse from the Bluesky API reason string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mention" => Some(Self::Mention),
            "reply" => Some(Self::Reply),
            "follow" => Some(Self::Follow),
            "like" => Some(Self::Like),
            "repost" => Some(Self::Repost),
            "quote" => Some(Self::Quote),
            _ => None,
        }
    }

    /// Returns true if this notification addresses the account in text.
    pub fn expects_reply(&self) -> bool {
        matches!(self, Self::Mention | Self::Reply)
    }
}

/// A user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// DID of the user
    pub did: String,
    /// Handle of the user
    pub handle: String,
    /// Display name
    pub display_name: Option<String>,
    /// Number of followers
    pub followers_count: Option<i64>,
    /// Number of accounts followed
    pub follows_count: Option<i64>,
    /// Number of posts
    pub posts_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "$type")]
enum DeserEmbed {
    #[serde(rename = "app.bsky.embed.images#view")]
    Images { images: Vec<DeserImage> },
    #[serde(rename = "app.bsky.embed.external#view")]
    External { external: DeserExternal },
    #[serde(rename = "app.bsky.embed.recordWithMedia#view")]
    RecordWithMedia { media: serde_json::Value },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct DeserImage {
    #[serde(default)]
    alt: String,
}

#[derive(Debug, Deserialize)]
struct DeserExternal {
    uri: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
}
