//! Engagement scoring.

use chrono::{DateTime, Utc};
use kinsky_bluesky::Post;

/// Age at which the recency term reaches zero.
pub const RECENCY_HORIZON_DAYS: f64 = 30.0;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Rank a post by engagement, author reach and recency.
///
/// ```text
/// 2·likes + replies + 1.5·reposts
///   + 100·(likes + replies + reposts) / max(views, 1)
///   + ln(1 + followers)
///   + 100·(1 − age / 30 days)
/// ```
///
/// Missing counts are zero and a missing timestamp means age zero. Nothing is
/// clamped: posts older than the horizon get a negative recency term and posts
/// timestamped in the future get one above 100.
pub fn score(post: &Post, now: DateTime<Utc>) -> f64 {
    let likes = post.like_count.unwrap_or(0) as f64;
    let replies = post.reply_count.unwrap_or(0) as f64;
    let reposts = post.repost_count.unwrap_or(0) as f64;
    let views = post.view_count.unwrap_or(0).max(1) as f64;
    let followers = post.author_followers.unwrap_or(0) as f64;

    let engagement_rate = (likes + replies + reposts) / views;

    let age_ms = post
        .indexed_at
        .map(|indexed_at| (now - indexed_at).num_milliseconds() as f64)
        .unwrap_or(0.0);
    let recency = 1.0 - age_ms / (RECENCY_HORIZON_DAYS * MS_PER_DAY);

    2.0 * likes
        + replies
        + 1.5 * reposts
        + 100.0 * engagement_rate
        + followers.ln_1p()
        + 100.0 * recency
}
