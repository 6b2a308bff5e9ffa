// ABOUTME: Deadline and cancellation bounds applied to every deployment step.
// ABOUTME: Wraps control-plane futures and delays with timeout and cancel checks.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use super::clock::Clock;
use super::error::DeployError;
use crate::config::DeployPolicy;

/// Resolves once the cancel flag is raised. Never resolves if the sender is
/// gone without having cancelled.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Bounds for one attempt: an overall deadline, a per-call timeout and a
/// cancellation signal.
#[derive(Debug, Clone)]
pub struct Guard {
    deadline: Instant,
    call_timeout: Duration,
    cancel: watch::Receiver<bool>,
}

impl Guard {
    pub fn new(policy: &DeployPolicy, cancel: watch::Receiver<bool>) -> Self {
        Self {
            deadline: Instant::now() + policy.deadline,
            call_timeout: policy.call_timeout,
            cancel,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// A single control-plane call, bounded by the call timeout and the
    /// remaining deadline.
    pub async fn call<T, E, F>(&self, step: &'static str, fut: F) -> Result<T, DeployError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<DeployError>,
    {
        self.bounded(step, Some(self.call_timeout), fut).await
    }

    /// A long-running wait that carries its own timeout. Only the deadline
    /// and cancellation apply.
    pub async fn wait<T, E, F>(&self, step: &'static str, fut: F) -> Result<T, DeployError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<DeployError>,
    {
        self.bounded(step, None, fut).await
    }

    /// Sleep on `clock`, aborting early on cancellation or deadline.
    pub async fn pause<K>(
        &self,
        clock: &K,
        step: &'static str,
        duration: Duration,
    ) -> Result<(), DeployError>
    where
        K: Clock + ?Sized,
    {
        self.bounded(step, None, async {
            clock.sleep(duration).await;
            Ok::<(), DeployError>(())
        })
        .await
    }

    /// Compensating action after a failure. Ignores cancellation and the
    /// deadline so a cancelled attempt can still clean up.
    pub async fn cleanup<T, E, F>(&self, step: &'static str, fut: F) -> Result<T, DeployError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<DeployError>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_elapsed) => Err(DeployError::StepTimeout {
                step,
                after: self.call_timeout,
            }),
        }
    }

    async fn bounded<T, E, F>(
        &self,
        step: &'static str,
        limit: Option<Duration>,
        fut: F,
    ) -> Result<T, DeployError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<DeployError>,
    {
        if self.is_cancelled() {
            return Err(DeployError::Cancelled { step });
        }

        let remaining = self.remaining();
        if remaining.is_zero() {
            return Err(DeployError::DeadlineExceeded { step });
        }

        let (bound, step_limited) = match limit {
            Some(limit) if limit < remaining => (limit, true),
            _ => (remaining, false),
        };

        let mut cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => Err(DeployError::Cancelled { step }),
            result = tokio::time::timeout(bound, fut) => match result {
                Ok(result) => result.map_err(Into::into),
                Err(_elapsed) if step_limited => Err(DeployError::StepTimeout { step, after: bound }),
                Err(_elapsed) => Err(DeployError::DeadlineExceeded { step }),
            },
        }
    }
}
