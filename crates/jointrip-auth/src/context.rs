//! Per-request deadline and cancellation.
//!
//! Every collaborator call the [`AuthService`] makes (storage or identity
//! provider) runs through [`RequestContext::run`], so no operation blocks
//! past the caller's deadline or after the caller has gone away.
//!
//! [`AuthService`]: crate::service::AuthService

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::AuthResult;
use crate::error::AuthError;

/// Deadline and cancellation signal supplied by the caller of an operation.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// Creates a context with no deadline that is never cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().timeout(timeout)
    }

    /// Sets the deadline to `timeout` from now.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Ties the context to a cancellation token.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline_at(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns `true` once the caller has cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns this context, with `fallback` applied as a deadline if the
    /// caller did not set one.
    #[must_use]
    pub fn or_timeout(&self, fallback: Duration) -> Self {
        match self.deadline {
            Some(_) => self.clone(),
            None => self.clone().timeout(fallback),
        }
    }

    /// Runs `fut` bounded by this context.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Cancelled` if the caller cancels first and
    /// `AuthError::Timeout` if the deadline passes first. `operation` names
    /// the call in either error.
    pub async fn run<F>(&self, operation: &'static str, fut: F) -> AuthResult<F::Output>
    where
        F: Future,
    {
        if self.cancellation.is_cancelled() {
            return Err(AuthError::cancelled(operation));
        }

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    () = self.cancellation.cancelled() => Err(AuthError::cancelled(operation)),
                    result = tokio::time::timeout_at(deadline, fut) => {
                        result.map_err(|_| AuthError::timeout(operation))
                    }
                }
            }
            None => {
                tokio::select! {
                    biased;
                    () = self.cancellation.cancelled() => Err(AuthError::cancelled(operation)),
                    output = fut => Ok(output),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = RequestContext::with_timeout(Duration::from_secs(5));
        let value = ctx.run("noop", async { 42 }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let ctx = RequestContext::with_timeout(Duration::from_millis(20));
        let err = ctx
            .run("slow", tokio::time::sleep(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Timeout { operation: "slow" }));
    }

    #[tokio::test]
    async fn test_run_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let ctx = RequestContext::new().cancellation(token);

        let err = ctx.run("noop", async { 1 }).await.unwrap_err();
        assert!(matches!(err, AuthError::Cancelled { operation: "noop" }));
    }

    #[tokio::test]
    async fn test_run_cancelled_midway() {
        let token = CancellationToken::new();
        let ctx = RequestContext::new().cancellation(token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let err = ctx
            .run("slow", tokio::time::sleep(Duration::from_secs(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Cancelled { .. }));
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn test_or_timeout_keeps_caller_deadline() {
        let caller = RequestContext::with_timeout(Duration::from_millis(10));
        let effective = caller.or_timeout(Duration::from_secs(60));
        assert_eq!(effective.deadline_at(), caller.deadline_at());

        let unbounded = RequestContext::new();
        assert!(unbounded.or_timeout(Duration::from_secs(60)).deadline_at().is_some());
    }
}
