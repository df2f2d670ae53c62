//! Kindroid conversational AI client for Kinsky.
//!
//! Kindroid exposes two calls: `send-message`, which returns the persona's
//! generated reply as plain text, and `chat-break`, which resets the
//! persona's short-term conversational context.

mod client;
mod error;

pub use client::{DEFAULT_BASE_URL, KindroidClient};
pub use error::KindroidError;
