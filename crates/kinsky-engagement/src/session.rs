//! Per-run session context and pacing.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::NetworkSession;

/// Inclusive range of milliseconds to pause between actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayWindow {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayWindow {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// No pause at all.
    pub const ZERO: Self = Self::new(0, 0);

    /// Returns true if the window is not inverted.
    pub fn is_ordered(&self) -> bool {
        self.min_ms <= self.max_ms
    }

    /// Draw a uniformly random delay. A degenerate window always yields its minimum.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }
}

/// Delay windows for each kind of paced step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    /// Before the first search of a session.
    pub session_start: DelayWindow,
    /// Before each interaction with a candidate or mention.
    pub candidate: DelayWindow,
    /// Before each original post.
    pub post: DelayWindow,
}

impl Pacing {
    /// Pacing with every pause disabled.
    pub const IMMEDIATE: Self = Self {
        session_start: DelayWindow::ZERO,
        candidate: DelayWindow::ZERO,
        post: DelayWindow::ZERO,
    };
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            session_start: DelayWindow::new(1_000, 5_000),
            candidate: DelayWindow::new(500, 2_000),
            post: DelayWindow::new(1_000, 5_000),
        }
    }
}

/// Everything a single run needs: the authenticated connection, the account
/// handle and the random source driving pacing and choices.
pub struct Session {
    network: Arc<dyn NetworkSession>,
    handle: String,
    rng: StdRng,
}

impl Session {
    /// Create a session. `seed` makes every random choice reproducible.
    pub fn new(
        network: Arc<dyn NetworkSession>,
        handle: impl Into<String>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            network,
            handle: handle.into(),
            rng,
        }
    }

    /// The authenticated network connection.
    pub fn network(&self) -> &dyn NetworkSession {
        self.network.as_ref()
    }

    /// Handle of the account this session acts as.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// The session's random source.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Sleep for a random delay drawn from `window`, returning it.
    pub async fn pause(&mut self, window: DelayWindow) -> Duration {
        let delay = window.sample(&mut self.rng);
        if !delay.is_zero() {
            sleep(delay).await;
        }
        delay
    }
}
