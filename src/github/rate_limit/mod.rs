
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

use super::{ChangedFile, ContentSource, FileContent, RepoEntry};
use crate::{DocsError, Result};

const DEFAULT_MIN_WAIT: Duration = Duration::from_secs(1);

/// Time left until `reset_at`, both in unix seconds; zero once passed
#[inline]
pub fn rate_limit_wait(reset_at: i64, now: i64) -> Duration {
    Duration::from_secs(u64::try_from(reset_at.saturating_sub(now)).unwrap_or(0))
}

/// Wraps a [`ContentSource`] so rate-limited calls wait for the quota reset
/// and are then retried unchanged
///
/// There is no attempt cap: each retry is paced by the reset time the
/// source reports. Every other error is returned as is.
#[derive(Debug, Clone)]
pub struct RateLimitRetry<S> {
    inner: S,
    min_wait: Duration,
}

impl<S: ContentSource> RateLimitRetry<S> {
    #[inline]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            min_wait: DEFAULT_MIN_WAIT,
        }
    }

    /// Lower bound on the pause between attempts
    #[inline]
    pub fn with_min_wait(mut self, min_wait: Duration) -> Self {
        self.min_wait = min_wait;
        self
    }

    #[inline]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, target: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mut attempt: u32 = 1;
        loop {
            match call().await {
                Err(DocsError::RateLimited { reset_at }) => {
                    let wait = rate_limit_wait(reset_at, chrono::Utc::now().timestamp())
                        .max(self.min_wait);
                    warn!(
                        "{} for {} rate limited (attempt {}); waiting {:?} until reset",
                        operation, target, attempt, wait
                    );
                    tokio::time::sleep(wait).await;
                    attempt = attempt.saturating_add(1);
                }
                result => {
                    if attempt > 1 {
                        info!(
                            "{} for {} resumed after {} attempts",
                            operation, target, attempt
                        );
                    }
                    return result;
                }
            }
        }
    }
}

#[async_trait]
impl<S: ContentSource> ContentSource for RateLimitRetry<S> {
    async fn list_directory(&self, path: &str) -> Result<Vec<RepoEntry>> {
        self.with_retry("Directory listing", path, || self.inner.list_directory(path))
            .await
    }

    async fn get_file_content(&self, path: &str) -> Result<FileContent> {
        self.with_retry("File fetch", path, || self.inner.get_file_content(path))
            .await
    }

    async fn list_changed_files(&self, number: u64) -> Result<Vec<ChangedFile>> {
        let target = format!("#{number}");
        self.with_retry("Change request listing", &target, || {
            self.inner.list_changed_files(number)
        })
        .await
    }
}
