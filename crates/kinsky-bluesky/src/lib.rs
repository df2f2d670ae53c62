//! Bluesky integration for Kinsky.
//!
//! Provides an authenticated client for the calls the engagement pipeline
//! makes: post search, likes, reposts, posts and replies, follows,
//! notifications, and profile lookups.

mod client;
mod types;

pub use client::{BlueskyClient, BlueskyError, DEFAULT_PDS_URL};
pub use types::*;
