//! Keyword search aggregation and ranking.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use kinsky_bluesky::Post;
use tracing::{debug, info};

use crate::{EngagementError, Session, score};

/// Default search window when no `since` timestamp is given.
pub const DEFAULT_SINCE_HOURS: i64 = 4;

/// A post selected for interaction, with its score and web address.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub post: Post,
    pub value: f64,
    pub url: String,
    pub author_handle: String,
}

impl ScoredCandidate {
    fn new(post: Post, now: DateTime<Utc>) -> Self {
        Self {
            value: score(&post, now),
            url: post.web_url(),
            author_handle: post.author_handle.clone(),
            post,
        }
    }
}

/// Searches keywords and ranks the union of their results.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    limit_per_keyword: u8,
    max_results: usize,
}

impl Aggregator {
    pub fn new(limit_per_keyword: u8, max_results: usize) -> Self {
        Self {
            limit_per_keyword,
            max_results,
        }
    }

    /// Search every keyword and return the top candidates, best first.
    ///
    /// Searches run one keyword at a time. Any failing search aborts the whole
    /// call with [`EngagementError::SearchFailed`]; callers that want partial
    /// results should call once per keyword.
    #[tracing::instrument(skip(self, session, keywords), fields(keyword_count = keywords.len()))]
    pub async fn aggregate(
        &self,
        session: &Session,
        keywords: &[String],
        since: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ScoredCandidate>, EngagementError> {
        let since = since.unwrap_or_else(|| now - Duration::hours(DEFAULT_SINCE_HOURS));

        let mut posts = Vec::new();
        for keyword in keywords {
            let found = session
                .network()
                .search(keyword, self.limit_per_keyword, since)
                .await
                .map_err(|source| EngagementError::SearchFailed {
                    keyword: keyword.clone(),
                    source,
                })?;
            debug!(keyword = %keyword, count = found.len(), "keyword search returned");
            posts.extend(found);
        }

        let ranked = rank(posts, now, self.max_results);
        info!(candidates = ranked.len(), "aggregated candidates");
        Ok(ranked)
    }
}

/// De-duplicate by URI (first seen wins), score, sort best first and truncate.
///
/// Equal scores keep their discovery order.
pub fn rank(posts: Vec<Post>, now: DateTime<Utc>, max_results: usize) -> Vec<ScoredCandidate> {
    let mut seen = HashSet::new();
    let mut candidates: Vec<ScoredCandidate> = posts
        .into_iter()
        .filter(|post| seen.insert(post.uri.clone()))
        .map(|post| ScoredCandidate::new(post, now))
        .collect();

    candidates.sort_by(|a, b| b.value.total_cmp(&a.value));
    candidates.truncate(max_results);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().unwrap()
    }

    fn post(rkey: &str, likes: i64) -> Post {
        Post {
            uri: format!("at://did:plc:a/app.bsky.feed.post/{}", rkey),
            cid: format!("cid-{}", rkey),
            author_did: "did:plc:a".to_string(),
            author_handle: "a.bsky.social".to_string(),
            text: Some(format!("post {}", rkey)),
            like_count: Some(likes),
            reply_count: None,
            repost_count: None,
            view_count: Some(1_000),
            author_followers: None,
            indexed_at: Some(now()),
            embed: None,
        }
    }

    fn rkeys(candidates: &[ScoredCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.post.rkey()).collect()
    }

    // === Unit Tests ===

    #[test]
    fn test_rank_sorts_descending() {
        let ranked = rank(vec![post("a", 1), post("b", 30), post("c", 7)], now(), 10);
        assert_eq!(rkeys(&ranked), vec!["b", "c", "a"]);
        assert!(ranked.windows(2).all(|w| w[0].value >= w[1].value));
    }

    #[test]
    fn test_rank_dedups_first_seen_wins() {
        let mut duplicate = post("a", 500);
        duplicate.text = Some("second copy".to_string());

        let ranked = rank(vec![post("a", 1), post("b", 2), duplicate], now(), 10);

        assert_eq!(ranked.len(), 2);
        let a = ranked.iter().find(|c| c.post.rkey() == "a").unwrap();
        assert_eq!(a.post.text.as_deref(), Some("post a"));
    }

    #[test]
    fn test_rank_truncates() {
        let posts = (0..8).map(|i| post(&i.to_string(), i)).collect();
        let ranked = rank(posts, now(), 3);
        assert_eq!(rkeys(&ranked), vec!["7", "6", "5"]);
    }

    #[test]
    fn test_rank_ties_keep_discovery_order() {
        let ranked = rank(vec![post("x", 5), post("y", 5), post("z", 5)], now(), 10);
        assert_eq!(rkeys(&ranked), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_rank_fills_url_and_handle() {
        let ranked = rank(vec![post("3kxyz", 1)], now(), 10);
        assert_eq!(
            ranked[0].url,
            "https://bsky.app/profile/a.bsky.social/post/3kxyz"
        );
        assert_eq!(ranked[0].author_handle, "a.bsky.social");
        assert_eq!(ranked[0].value, score(&ranked[0].post, now()));
    }

    #[test]
    fn test_rank_empty() {
        assert!(rank(Vec::new(), now(), 10).is_empty());
    }

    // === Property-Based Tests ===

    proptest! {
        #[test]
        fn rank_output_is_sorted_unique_and_bounded(
            entries in prop::collection::vec((0u8..20, 0i64..1_000), 0..60),
            max in 0usize..30,
        ) {
            let posts = entries
                .iter()
                .map(|(key, likes)| post(&key.to_string(), *likes))
                .collect();
            let ranked = rank(posts, now(), max);

            prop_assert!(ranked.len() <= max);
            prop_assert!(ranked.windows(2).all(|w| w[0].value >= w[1].value));

            let uris: HashSet<&str> = ranked.iter().map(|c| c.post.uri.as_str()).collect();
            prop_assert_eq!(uris.len(), ranked.len());
        }
    }
}
