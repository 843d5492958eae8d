//! Deadlines and bounded retry for store calls.
//!
//! Every store call made by the services goes through [`StorePolicy`]. Reads
//! are idempotent and may be retried on transient failures; writes are tried
//! exactly once. A call that exceeds its deadline becomes
//! [`AppError::Timeout`], which surfaces to callers as an internal error.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use crate::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct StorePolicy {
    pub timeout: Duration,
    /// Extra attempts after the first one, reads only.
    pub read_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            read_retries: 2,
            initial_backoff: Duration::from_millis(50),
        }
    }
}

impl StorePolicy {
    pub fn new(timeout: Duration, read_retries: u32) -> Self {
        Self {
            timeout,
            read_retries,
            ..Self::default()
        }
    }

    /// Runs a mutating store call once, bounded by the deadline.
    pub async fn write<T, Fut>(&self, op: &'static str, fut: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        match timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(op, timeout = ?self.timeout, "store call timed out");
                Err(AppError::Timeout(op))
            }
        }
    }

    /// Runs an idempotent store call, retrying transient failures with
    /// exponential backoff.
    pub async fn read<T, F, Fut>(&self, op: &'static str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match self.write(op, f()).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.read_retries => {
                    attempt += 1;
                    warn!(
                        op,
                        attempt,
                        max = self.read_retries,
                        "transient store failure, retrying in {:?}: {}",
                        backoff,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
