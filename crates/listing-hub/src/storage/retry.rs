use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::executor::{Database, Row, Statement};
use super::repository::RepositoryError;

/// Fixed-interval retry settings; every error is treated as retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub sleep: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, sleep: Duration) -> Self {
        Self { attempts, sleep }
    }

    /// Total number of calls made before giving up; never less than one.
    pub fn max_attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(200))
    }
}

/// Decorates a [`Database`] with bounded retries and a fixed sleep between attempts.
#[derive(Debug, Clone)]
pub struct RetryAdapter<D> {
    inner: D,
    policy: RetryPolicy,
}

impl<D> RetryAdapter<D> {
    pub fn new(inner: D, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    /// Call `attempt` until it succeeds or the policy is exhausted, returning the last error.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &'static str,
        mut attempt: F,
    ) -> Result<T, RepositoryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        let max_attempts = self.policy.max_attempts();
        let mut made = 1;

        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(err) if made >= max_attempts => {
                    warn!(operation, attempts = made, error = %err, "storage retries exhausted");
                    return Err(err);
                }
                Err(err) => {
                    debug!(operation, attempt = made, error = %err, "storage call failed, retrying");
                    tokio::time::sleep(self.policy.sleep).await;
                    made += 1;
                }
            }
        }
    }
}

#[async_trait]
impl<D: Database> Database for RetryAdapter<D> {
    async fn execute(&self, statement: &Statement) -> Result<u64, RepositoryError> {
        self.run("execute", || self.inner.execute(statement)).await
    }

    async fn fetch_one(&self, statement: &Statement) -> Result<Row, RepositoryError> {
        self.run("fetch_one", || self.inner.fetch_one(statement))
            .await
    }

    async fn fetch_all(&self, statement: &Statement) -> Result<Vec<Row>, RepositoryError> {
        self.run("fetch_all", || self.inner.fetch_all(statement))
            .await
    }

    async fn execute_atomic(&self, statements: &[Statement]) -> Result<Vec<u64>, RepositoryError> {
        self.run("execute_atomic", || self.inner.execute_atomic(statements))
            .await
    }
}
