//! Failure containment at job and per-item boundaries.

use std::fmt::Display;
use std::future::Future;

use tracing::warn;

/// Containment policy: a failure is logged and turned into `None`.
///
/// Applied wherever one failing unit of work (a job, a candidate, a follow,
/// a post slot, a mention) must not abort its siblings. There is no retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct Isolate;

impl Isolate {
    /// Absorb the error of an already computed result.
    pub fn absorb<T, E: Display>(
        &self,
        boundary: &'static str,
        subject: &str,
        result: Result<T, E>,
    ) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(boundary, subject, error = %error, "contained failure");
                None
            }
        }
    }

    /// Await `fut` and absorb its error.
    pub async fn contain<T, E, F>(&self, boundary: &'static str, subject: &str, fut: F) -> Option<T>
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        self.absorb(boundary, subject, fut.await)
    }
}
